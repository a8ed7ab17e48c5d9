//! Invigil core: exam-proctoring signal fusion.
//!
//! Per frame, five facial landmarks become head yaw/pitch ratios, eye crops
//! become a horizontal gaze ratio, both are smoothed and offset by a calibration
//! baseline, and a debounced rule table fuses them with object-detection and
//! emotion results into a `Safe`/`Suspicious` alert state.
//!
//! Perception models are external; see [`perception`] for the interfaces.

pub mod calibration;
pub mod detection;
pub mod fusion;
pub mod gaze;
pub mod head_pose;
pub mod landmarks;
pub mod perception;
pub mod render;
pub mod scheduler;
pub mod session;
pub mod smoother;

pub use calibration::{Baseline, CalibrationStore};
pub use detection::{Candidate, DetectorThresholds, COCO_CLASSES};
pub use fusion::{AlertState, CheatReason, FrameSignals, SuspicionFusionEngine, Verdict};
pub use gaze::{estimate_eye, estimate_gaze, Gaze, GazeDirection};
pub use head_pose::{estimate_head_pose, HeadDirection, HeadPose};
pub use landmarks::{BoundingBox, FaceDetection, Landmarks, Point};
pub use perception::{
    EmotionClassifier, Frame, LandmarkDetector, ObjectDetection, ObjectDetector,
    PerceptionError, NEUTRAL_EMOTION,
};
pub use render::RenderPayload;
pub use scheduler::{FramePlan, FrameScheduler, SchedulerStats};
pub use session::{FrameReport, Session};
pub use smoother::{SignalId, SignalSmoother};
