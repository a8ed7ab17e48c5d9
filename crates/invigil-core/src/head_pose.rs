//! Geometric head pose from five facial landmarks.
//!
//! No 3D face model and no camera intrinsics are involved. Yaw and pitch are
//! plain ratios of landmark offsets, normalised by face geometry so they are
//! invariant to the subject's distance from the camera:
//!
//! - **yaw**: horizontal offset of the nose from the eye midpoint, divided by
//!   the inter-eye distance. In a mirrored (selfie-view) frame a positive value
//!   means the subject turned toward image-right.
//! - **pitch**: vertical offset of the nose below the eye line, divided by the
//!   eye-to-mouth distance. Smaller means the nose sits closer to the eye line,
//!   i.e. the subject is looking up.
//!
//! Two threshold sets exist. [`estimate_head_pose`] labels raw ratios with fixed
//! uncalibrated thresholds; that label is informational only. The label that
//! drives alerts comes from [`classify_deltas`], which works on smoothed values
//! minus the calibration baseline.

use serde::Serialize;
use std::fmt;

use crate::landmarks::Landmarks;

/// Uncalibrated yaw threshold applied to the raw ratio.
pub const RAW_YAW_THRESHOLD: f32 = 0.1;
/// Raw pitch ratio below which the head is labelled as looking up.
pub const RAW_PITCH_UP_THRESHOLD: f32 = 0.25;
/// Raw pitch ratio above which the head is labelled as looking down.
pub const RAW_PITCH_DOWN_THRESHOLD: f32 = 0.55;

/// Yaw delta (smoothed minus baseline) beyond which the head is turned.
pub const CALIBRATED_YAW_THRESHOLD: f32 = 0.25;
/// Pitch delta magnitude beyond which the head is tilted up or down.
pub const CALIBRATED_PITCH_THRESHOLD: f32 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HeadDirection {
    Forward,
    LookingLeft,
    LookingRight,
    LookingUp,
    LookingDown,
    /// No usable landmarks this frame; ratios must not be trusted.
    Unknown,
}

impl HeadDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Forward => "Forward",
            Self::LookingLeft => "Looking Left",
            Self::LookingRight => "Looking Right",
            Self::LookingUp => "Looking Up",
            Self::LookingDown => "Looking Down",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for HeadDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a single head pose estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HeadPose {
    /// Label from the fixed uncalibrated thresholds.
    pub direction: HeadDirection,
    pub pitch_ratio: f32,
    pub yaw_ratio: f32,
    /// Always zero; roll is not estimated.
    pub roll: f32,
}

impl HeadPose {
    pub const UNKNOWN: HeadPose = HeadPose {
        direction: HeadDirection::Unknown,
        pitch_ratio: 0.0,
        yaw_ratio: 0.0,
        roll: 0.0,
    };

    /// Whether the ratios came from real geometry and may be fed downstream.
    pub fn is_known(&self) -> bool {
        self.direction != HeadDirection::Unknown
    }
}

/// Estimate yaw and pitch ratios from landmarks.
///
/// Returns [`HeadPose::UNKNOWN`] when no landmarks are available or when the
/// geometry is degenerate (coincident eyes, or eye midpoint on the mouth
/// midpoint). Callers must check [`HeadPose::is_known`] before using the
/// ratios; an unknown pose is never reported as `Forward`.
pub fn estimate_head_pose(landmarks: Option<&Landmarks>) -> HeadPose {
    let Some(lm) = landmarks else {
        return HeadPose::UNKNOWN;
    };

    let eye_mid = lm.left_eye.midpoint(lm.right_eye);
    let eye_dist = lm.left_eye.distance(lm.right_eye);
    if eye_dist == 0.0 {
        return HeadPose::UNKNOWN;
    }

    let mouth_mid = lm.mouth_left.midpoint(lm.mouth_right);
    let face_height = eye_mid.distance(mouth_mid);
    if face_height == 0.0 {
        return HeadPose::UNKNOWN;
    }

    let yaw_ratio = (lm.nose.x - eye_mid.x) / eye_dist;
    let pitch_ratio = (lm.nose.y - eye_mid.y) / face_height;

    if !yaw_ratio.is_finite() || !pitch_ratio.is_finite() {
        return HeadPose::UNKNOWN;
    }

    HeadPose {
        direction: classify_raw(yaw_ratio, pitch_ratio),
        pitch_ratio,
        yaw_ratio,
        roll: 0.0,
    }
}

/// Label raw ratios with the fixed uncalibrated thresholds.
/// Pitch takes precedence over yaw when both fire.
fn classify_raw(yaw_ratio: f32, pitch_ratio: f32) -> HeadDirection {
    let mut direction = HeadDirection::Forward;

    if yaw_ratio > RAW_YAW_THRESHOLD {
        direction = HeadDirection::LookingRight;
    } else if yaw_ratio < -RAW_YAW_THRESHOLD {
        direction = HeadDirection::LookingLeft;
    }

    if pitch_ratio < RAW_PITCH_UP_THRESHOLD {
        direction = HeadDirection::LookingUp;
    } else if pitch_ratio > RAW_PITCH_DOWN_THRESHOLD {
        direction = HeadDirection::LookingDown;
    }

    direction
}

/// Label calibrated deltas (smoothed value minus baseline).
///
/// Same precedence as the raw classifier: a pitch verdict overrides a yaw one.
pub fn classify_deltas(delta_yaw: f32, delta_pitch: f32) -> HeadDirection {
    let mut direction = HeadDirection::Forward;

    if delta_yaw > CALIBRATED_YAW_THRESHOLD {
        direction = HeadDirection::LookingRight;
    } else if delta_yaw < -CALIBRATED_YAW_THRESHOLD {
        direction = HeadDirection::LookingLeft;
    }

    if delta_pitch < -CALIBRATED_PITCH_THRESHOLD {
        direction = HeadDirection::LookingUp;
    } else if delta_pitch > CALIBRATED_PITCH_THRESHOLD {
        direction = HeadDirection::LookingDown;
    }

    direction
}
