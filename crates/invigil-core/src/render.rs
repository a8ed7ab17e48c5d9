//! Per-frame payload for an external renderer.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::landmarks::BoundingBox;
use crate::session::FrameReport;

pub type Rgb = [u8; 3];

pub const SAFE_COLOR: Rgb = [0, 255, 0];
pub const ALERT_COLOR: Rgb = [255, 0, 0];

/// Shown until the first calibration.
pub const CALIBRATION_HINT: &str = "Uncalibrated: face the screen and request calibration";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderPayload {
    pub frame: u64,
    pub captured_at: DateTime<Utc>,
    pub status: String,
    pub color: Rgb,
    pub alert: bool,
    pub calibrated: bool,
    pub calibration_hint: Option<&'static str>,
    pub head_text: String,
    pub gaze_text: String,
    pub buffer_text: String,
    pub pose_debug: String,
    pub face_box: Option<BoundingBox>,
    pub keypoints: Option<[(f32, f32); 5]>,
    /// Always populated while a phone is detected, even below the alert threshold.
    pub phone_boxes: Vec<BoundingBox>,
}

impl RenderPayload {
    pub fn from_report(report: &FrameReport, captured_at: DateTime<Utc>) -> Self {
        let alert = report.verdict.state.is_suspicious();
        Self {
            frame: report.frame,
            captured_at,
            status: report.verdict.status_text(),
            color: if alert { ALERT_COLOR } else { SAFE_COLOR },
            alert,
            calibrated: report.calibrated,
            calibration_hint: (!report.calibrated).then_some(CALIBRATION_HINT),
            head_text: format!("Head: {} ({:.2})", report.head, report.delta_yaw),
            gaze_text: format!("Gaze: {} ({:.2})", report.gaze, report.smoothed_gaze),
            buffer_text: format!("Buffer: {}", report.verdict.buffer),
            pose_debug: format!(
                "Y:{:.2} P:{:.2} | D_Y:{:.2}",
                report.smoothed_yaw, report.smoothed_pitch, report.delta_yaw
            ),
            face_box: report.face.as_ref().map(|f| f.bbox),
            keypoints: report.face.as_ref().map(|f| f.keypoints.as_array()),
            phone_boxes: if report.objects.found {
                report.objects.boxes.clone()
            } else {
                Vec::new()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::{FaceDetection, Landmarks, Point};
    use crate::perception::{Frame, ObjectDetection};
    use crate::session::Session;
    use image::{Rgb as Pixel, RgbImage};

    fn frontal_face() -> FaceDetection {
        FaceDetection {
            bbox: BoundingBox::new(80, 60, 100, 120),
            keypoints: Landmarks {
                left_eye: Point::new(100.0, 100.0),
                right_eye: Point::new(140.0, 100.0),
                nose: Point::new(120.0, 115.0),
                mouth_left: Point::new(105.0, 140.0),
                mouth_right: Point::new(135.0, 140.0),
            },
            confidence: 0.9,
        }
    }

    fn frame(index: u64) -> Frame {
        Frame::new(index, RgbImage::from_pixel(320, 240, Pixel([200, 200, 200])))
    }

    #[test]
    fn test_safe_payload_text() {
        let mut session = Session::new();
        session.process(&frame(0), Some(&frontal_face()), "Neutral");
        session.calibrate();
        let report = session.process(&frame(1), Some(&frontal_face()), "Neutral");
        let payload = RenderPayload::from_report(&report, Utc::now());

        assert_eq!(payload.status, "Safe");
        assert_eq!(payload.color, SAFE_COLOR);
        assert!(!payload.alert);
        assert!(payload.calibrated);
        assert_eq!(payload.calibration_hint, None);
        assert_eq!(payload.head_text, "Head: Forward (0.00)");
        assert_eq!(payload.gaze_text, "Gaze: Center (0.50)");
        assert_eq!(payload.buffer_text, "Buffer: 0");
        assert!(payload.pose_debug.starts_with("Y:0.00 P:0.3"));
        assert!(payload.pose_debug.ends_with("| D_Y:0.00"));
        assert_eq!(payload.face_box, Some(BoundingBox::new(80, 60, 100, 120)));
        assert!(payload.phone_boxes.is_empty());
    }

    #[test]
    fn test_phone_boxes_shown_before_alert() {
        let mut session = Session::new();
        let phone = BoundingBox::new(5, 5, 30, 60);
        session.update_objects(ObjectDetection::from_boxes(vec![phone]));
        let report = session.process(&frame(0), None, "Neutral");
        let payload = RenderPayload::from_report(&report, Utc::now());

        assert!(!payload.alert);
        assert_eq!(payload.phone_boxes, vec![phone]);
        assert_eq!(payload.calibration_hint, Some(CALIBRATION_HINT));
        assert_eq!(payload.face_box, None);
    }

    #[test]
    fn test_alert_payload_is_red() {
        let mut session = Session::new();
        session.update_objects(ObjectDetection::from_boxes(vec![BoundingBox::new(
            5, 5, 30, 60,
        )]));
        let mut report = None;
        for i in 0..10 {
            report = Some(session.process(&frame(i), None, "sad"));
        }
        let payload = RenderPayload::from_report(&report.unwrap(), Utc::now());
        assert!(payload.alert);
        assert_eq!(payload.color, ALERT_COLOR);
        assert_eq!(payload.status, "Suspicious: Mobile Detected (Nervous?)");
    }

    #[test]
    fn test_payload_serializes() {
        let mut session = Session::new();
        let report = session.process(&frame(3), Some(&frontal_face()), "Neutral");
        let json = serde_json::to_value(RenderPayload::from_report(&report, Utc::now())).unwrap();
        assert_eq!(json["frame"], 3);
        assert_eq!(json["face_box"], serde_json::json!([80, 60, 100, 120]));
    }
}
