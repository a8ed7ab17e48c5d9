use serde::Serialize;

/// Neutral head orientation captured on request.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Baseline {
    pub yaw: f32,
    pub pitch: f32,
}

/// Difference between a smoothed signal and its baseline.
pub fn delta(signal: f32, baseline: f32) -> f32 {
    signal - baseline
}

/// Holds the calibration baseline.
///
/// Until the first calibration the baseline is `(0, 0)` and deltas equal the
/// smoothed values themselves; [`CalibrationStore::is_calibrated`] lets the
/// caller flag that classification is uncalibrated. Each calibration replaces
/// the previous baseline; no history is kept.
#[derive(Debug, Clone, Default)]
pub struct CalibrationStore {
    baseline: Baseline,
    calibrated: bool,
}

impl CalibrationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the current smoothed yaw and pitch as the neutral pose.
    pub fn calibrate(&mut self, smoothed_yaw: f32, smoothed_pitch: f32) -> Baseline {
        self.baseline = Baseline {
            yaw: smoothed_yaw,
            pitch: smoothed_pitch,
        };
        self.calibrated = true;
        tracing::info!(
            neutral_yaw = smoothed_yaw,
            neutral_pitch = smoothed_pitch,
            "calibrated"
        );
        self.baseline
    }

    pub fn baseline(&self) -> Baseline {
        self.baseline
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibrated
    }

    pub fn delta_yaw(&self, smoothed_yaw: f32) -> f32 {
        delta(smoothed_yaw, self.baseline.yaw)
    }

    pub fn delta_pitch(&self, smoothed_pitch: f32) -> f32 {
        delta(smoothed_pitch, self.baseline.pitch)
    }
}
