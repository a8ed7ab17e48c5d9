use std::path::PathBuf;

use invigil_core::detection::{
    DetectorThresholds, DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_NMS_THRESHOLD, DEFAULT_TARGET_CLASS,
};
use invigil_core::scheduler::{DEFAULT_EMOTION_INTERVAL, DEFAULT_OBJECT_INTERVAL};

/// Daemon configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory of still images consumed in lexical order as the video stream.
    pub frames_dir: PathBuf,
    /// JSON-lines file of recorded perception results.
    pub replay_path: PathBuf,
    /// Flip frames horizontally (selfie view) before processing.
    pub mirror: bool,
    /// Run object detection every N frames.
    pub object_interval: u64,
    /// Dispatch emotion classification every N frames.
    pub emotion_interval: u64,
    /// Object-detector confidence, NMS and target class.
    pub detector: DetectorThresholds,
    /// Sleep between frames, in milliseconds. Zero runs as fast as possible.
    pub frame_interval_ms: u64,
    /// Issue a calibration request when this frame index is reached.
    pub calibrate_at_frame: Option<u64>,
    /// Whether to expose the D-Bus calibration interface.
    pub dbus_enabled: bool,
    /// Whether the daemon is running on the session bus (development mode).
    pub session_bus: bool,
    /// Write one JSON render payload per frame to stdout.
    pub emit_payloads: bool,
}

impl Config {
    /// Load configuration from `INVIGIL_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let frames_dir = std::env::var("INVIGIL_FRAMES_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("frames"));

        let replay_path = std::env::var("INVIGIL_REPLAY_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| frames_dir.join("perception.jsonl"));

        Self {
            frames_dir,
            replay_path,
            mirror: env_flag("INVIGIL_MIRROR", true),
            object_interval: env_u64("INVIGIL_OBJECT_INTERVAL", DEFAULT_OBJECT_INTERVAL),
            emotion_interval: env_u64("INVIGIL_EMOTION_INTERVAL", DEFAULT_EMOTION_INTERVAL),
            detector: DetectorThresholds {
                confidence: env_f32("INVIGIL_CONFIDENCE_THRESHOLD", DEFAULT_CONFIDENCE_THRESHOLD),
                nms: env_f32("INVIGIL_NMS_THRESHOLD", DEFAULT_NMS_THRESHOLD),
                target_class: std::env::var("INVIGIL_TARGET_CLASS")
                    .unwrap_or_else(|_| DEFAULT_TARGET_CLASS.to_string()),
            },
            frame_interval_ms: env_u64("INVIGIL_FRAME_INTERVAL_MS", 0),
            calibrate_at_frame: std::env::var("INVIGIL_CALIBRATE_AT_FRAME")
                .ok()
                .and_then(|v| v.parse().ok()),
            dbus_enabled: env_flag("INVIGIL_DBUS_ENABLED", true),
            session_bus: std::env::var("INVIGIL_SESSION_BUS").is_ok(),
            emit_payloads: env_flag("INVIGIL_EMIT_PAYLOADS", true),
        }
    }
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key).map(|v| v != "0").unwrap_or(default)
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
