//! Per-subject processing context.
//!
//! A [`Session`] owns every piece of state that survives from one frame to the
//! next: smoothed signals, the calibration baseline, the suspicion buffer and
//! the most recent object-detection result. The frame loop owns the session
//! and hands it one frame at a time.

use serde::Serialize;

use crate::calibration::{Baseline, CalibrationStore};
use crate::fusion::{FrameSignals, SuspicionFusionEngine, Verdict};
use crate::gaze::{estimate_gaze, Gaze, GazeDirection};
use crate::head_pose::{classify_deltas, estimate_head_pose, HeadDirection, HeadPose};
use crate::landmarks::FaceDetection;
use crate::perception::{Frame, ObjectDetection};
use crate::smoother::{SignalId, SignalSmoother};

/// Everything computed for one frame.
#[derive(Debug, Clone, Serialize)]
pub struct FrameReport {
    pub frame: u64,
    /// Raw estimate with its informational uncalibrated label.
    pub head_pose: HeadPose,
    /// Calibrated head direction used for fusion.
    pub head: HeadDirection,
    /// Raw two-eye estimate.
    pub gaze_estimate: Gaze,
    /// Direction of the smoothed gaze ratio, used for fusion.
    pub gaze: GazeDirection,
    pub smoothed_yaw: f32,
    pub smoothed_pitch: f32,
    pub smoothed_gaze: f32,
    pub delta_yaw: f32,
    pub delta_pitch: f32,
    pub calibrated: bool,
    pub verdict: Verdict,
    pub face: Option<FaceDetection>,
    pub objects: ObjectDetection,
}

#[derive(Debug, Clone, Default)]
pub struct Session {
    smoother: SignalSmoother,
    calibration: CalibrationStore,
    fusion: SuspicionFusionEngine,
    objects: ObjectDetection,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the cached object-detection result. Frames that skip detection
    /// keep fusing the previous result.
    pub fn update_objects(&mut self, objects: ObjectDetection) {
        self.objects = objects;
    }

    pub fn objects(&self) -> &ObjectDetection {
        &self.objects
    }

    /// Run head pose, gaze, smoothing, calibration offsets and fusion for one
    /// frame. `face` is the first detected face, if any; `emotion` is the most
    /// recent emotion label, however stale.
    pub fn process(
        &mut self,
        frame: &Frame,
        face: Option<&FaceDetection>,
        emotion: &str,
    ) -> FrameReport {
        let landmarks = face.map(|f| &f.keypoints);

        let head_pose = estimate_head_pose(landmarks);
        let (smoothed_yaw, smoothed_pitch) = if head_pose.is_known() {
            (
                self.smoother.update(SignalId::Yaw, head_pose.yaw_ratio),
                self.smoother.update(SignalId::Pitch, head_pose.pitch_ratio),
            )
        } else {
            (
                self.smoother.value_or_neutral(SignalId::Yaw),
                self.smoother.value_or_neutral(SignalId::Pitch),
            )
        };

        let delta_yaw = self.calibration.delta_yaw(smoothed_yaw);
        let delta_pitch = self.calibration.delta_pitch(smoothed_pitch);
        let head = if head_pose.is_known() {
            classify_deltas(delta_yaw, delta_pitch)
        } else {
            HeadDirection::Unknown
        };

        let gaze_estimate = estimate_gaze(&frame.image, landmarks);
        let smoothed_gaze = self.smoother.update(SignalId::Gaze, gaze_estimate.ratio);
        // Without a face the ratio is the neutral 0.5 but the label stays Unknown
        let gaze = if landmarks.is_some() {
            GazeDirection::from_ratio(smoothed_gaze)
        } else {
            GazeDirection::Unknown
        };

        let verdict = self.fusion.update(&FrameSignals {
            phone_detected: self.objects.found,
            head,
            gaze,
            emotion,
        });

        tracing::trace!(
            frame = frame.index,
            smoothed_yaw,
            smoothed_pitch,
            smoothed_gaze,
            head = %head,
            gaze = %gaze,
            buffer = verdict.buffer,
            "frame fused"
        );

        FrameReport {
            frame: frame.index,
            head_pose,
            head,
            gaze_estimate,
            gaze,
            smoothed_yaw,
            smoothed_pitch,
            smoothed_gaze,
            delta_yaw,
            delta_pitch,
            calibrated: self.calibration.is_calibrated(),
            verdict,
            face: face.cloned(),
            objects: self.objects.clone(),
        }
    }

    /// Take the current smoothed yaw and pitch as the neutral pose.
    pub fn calibrate(&mut self) -> Baseline {
        let yaw = self.smoother.value_or_neutral(SignalId::Yaw);
        let pitch = self.smoother.value_or_neutral(SignalId::Pitch);
        self.calibration.calibrate(yaw, pitch)
    }

    pub fn calibration(&self) -> &CalibrationStore {
        &self.calibration
    }

    pub fn buffer(&self) -> u32 {
        self.fusion.buffer()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fusion::{AlertState, CheatReason};
    use crate::gaze::NO_INFORMATION;
    use crate::landmarks::{BoundingBox, Landmarks, Point};
    use image::{Rgb, RgbImage};

    fn face(nose_x: f32, nose_y: f32) -> FaceDetection {
        FaceDetection {
            bbox: BoundingBox::new(80, 60, 100, 120),
            keypoints: Landmarks {
                left_eye: Point::new(100.0, 100.0),
                right_eye: Point::new(140.0, 100.0),
                nose: Point::new(nose_x, nose_y),
                mouth_left: Point::new(105.0, 140.0),
                mouth_right: Point::new(135.0, 140.0),
            },
            confidence: 0.99,
        }
    }

    /// Uniformly bright frame: no pupils found, so gaze stays at 0.5.
    fn frame(index: u64) -> Frame {
        Frame::new(index, RgbImage::from_pixel(320, 240, Rgb([200, 200, 200])))
    }

    #[test]
    fn test_scenario_uncalibrated_turn_right() {
        let mut session = Session::new();
        let report = session.process(&frame(0), Some(&face(150.0, 115.0)), "Neutral");
        assert!((report.head_pose.yaw_ratio - 0.75).abs() < 1e-6);
        assert_eq!(report.head_pose.direction, HeadDirection::LookingRight);
        assert!(!report.calibrated);
        // Without a baseline the raw pitch ratio (0.375) is itself the delta,
        // which reads as looking down and masks the turn.
        assert_eq!(report.head, HeadDirection::LookingDown);
        assert_eq!(report.verdict.frame_reason, None);
    }

    #[test]
    fn test_calibrated_turn_is_looking_away() {
        let mut session = Session::new();
        session.process(&frame(0), Some(&face(120.0, 115.0)), "Neutral");
        session.calibrate();
        let report = session.process(&frame(1), Some(&face(150.0, 115.0)), "Neutral");
        // smoothed yaw = 0.4 * 0.75
        assert!((report.delta_yaw - 0.3).abs() < 1e-6);
        assert_eq!(report.head, HeadDirection::LookingRight);
        assert_eq!(report.verdict.frame_reason, Some(CheatReason::LookingAway));
    }

    #[test]
    fn test_calibration_absorbs_habitual_pose() {
        let mut session = Session::new();
        for i in 0..10 {
            session.process(&frame(i), Some(&face(150.0, 115.0)), "Neutral");
        }
        let baseline = session.calibrate();
        assert!((baseline.yaw - 0.75).abs() < 1e-3);

        let report = session.process(&frame(10), Some(&face(150.0, 115.0)), "Neutral");
        assert!(report.calibrated);
        assert_eq!(report.head, HeadDirection::Forward);
        assert_eq!(report.verdict.frame_reason, None);
    }

    #[test]
    fn test_missing_face_is_not_suspicious() {
        let mut session = Session::new();
        for i in 0..20 {
            let report = session.process(&frame(i), None, "Neutral");
            assert_eq!(report.head, HeadDirection::Unknown);
            assert_eq!(report.gaze, GazeDirection::Unknown);
            assert_eq!(report.gaze_estimate.ratio, NO_INFORMATION);
            assert_eq!(report.smoothed_gaze, NO_INFORMATION);
            assert_eq!(report.verdict.frame_reason, None);
            assert_eq!(report.verdict.state, AlertState::Safe);
        }
        assert_eq!(session.buffer(), 0);
    }

    #[test]
    fn test_missing_face_does_not_move_smoothed_pose() {
        let mut session = Session::new();
        session.process(&frame(0), Some(&face(150.0, 115.0)), "Neutral");
        let report = session.process(&frame(1), None, "Neutral");
        assert!((report.smoothed_yaw - 0.75).abs() < 1e-6);
        assert!((report.smoothed_pitch - 0.375).abs() < 1e-6);
    }

    #[test]
    fn test_cached_phone_drives_alert() {
        let mut session = Session::new();
        session.update_objects(ObjectDetection::from_boxes(vec![BoundingBox::new(
            10, 10, 40, 80,
        )]));
        let mut last = None;
        for i in 0..9 {
            last = Some(session.process(&frame(i), Some(&face(120.0, 115.0)), "Neutral"));
        }
        let report = last.unwrap();
        assert_eq!(report.verdict.buffer, 9);
        assert_eq!(
            report.verdict.state,
            AlertState::Suspicious(CheatReason::MobileDetected)
        );
        assert!(report.objects.found);
    }

    #[test]
    fn test_sustained_turn_alerts_and_recovers() {
        let mut session = Session::new();
        session.process(&frame(0), Some(&face(120.0, 115.0)), "Neutral");
        session.calibrate();

        let mut state = AlertState::Safe;
        for i in 1..=15 {
            state = session
                .process(&frame(i), Some(&face(140.0, 115.0)), "Neutral")
                .verdict
                .state;
        }
        assert_eq!(state, AlertState::Suspicious(CheatReason::LookingAway));

        for i in 16..=30 {
            state = session
                .process(&frame(i), Some(&face(120.0, 115.0)), "sad")
                .verdict
                .state;
        }
        assert_eq!(state, AlertState::Safe);
        assert_eq!(session.buffer(), 0);
    }

    #[test]
    fn test_nervous_emotion_annotates_status() {
        let mut session = Session::new();
        let report = session.process(&frame(0), Some(&face(120.0, 115.0)), "fear");
        assert!(report.verdict.nervous);
        assert_eq!(report.verdict.status_text(), "Safe (Nervous?)");
    }
}
