//! Five-point facial landmarks as produced by the face detector.
//!
//! Coordinates are pixels in the coordinate space of the (possibly mirrored)
//! frame the detector ran on. The serialized form matches the detector output:
//! points are `[x, y]` pairs and boxes are `[x, y, w, h]`.

use serde::{Deserialize, Serialize};

/// A 2-D point in frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "(f32, f32)", into = "(f32, f32)")]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn midpoint(self, other: Point) -> Point {
        Point::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }

    /// Euclidean distance between two points.
    pub fn distance(self, other: Point) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl From<(f32, f32)> for Point {
    fn from((x, y): (f32, f32)) -> Self {
        Point::new(x, y)
    }
}

impl From<Point> for (f32, f32) {
    fn from(p: Point) -> Self {
        (p.x, p.y)
    }
}

/// The five landmarks, named from the detector's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmarks {
    pub left_eye: Point,
    pub right_eye: Point,
    pub nose: Point,
    pub mouth_left: Point,
    pub mouth_right: Point,
}

impl Landmarks {
    /// Landmarks in detector index order: eyes, nose, mouth corners.
    pub fn as_array(&self) -> [(f32, f32); 5] {
        [
            self.left_eye.into(),
            self.right_eye.into(),
            self.nose.into(),
            self.mouth_left.into(),
            self.mouth_right.into(),
        ]
    }
}

/// Axis-aligned box in pixels, top-left origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "(i32, i32, i32, i32)", into = "(i32, i32, i32, i32)")]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl BoundingBox {
    pub const fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }
}

impl From<(i32, i32, i32, i32)> for BoundingBox {
    fn from((x, y, w, h): (i32, i32, i32, i32)) -> Self {
        BoundingBox::new(x, y, w, h)
    }
}

impl From<BoundingBox> for (i32, i32, i32, i32) {
    fn from(b: BoundingBox) -> Self {
        (b.x, b.y, b.w, b.h)
    }
}

/// One face found by the landmark detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceDetection {
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
    pub keypoints: Landmarks,
    #[serde(default)]
    pub confidence: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_midpoint_and_distance() {
        let a = Point::new(100.0, 100.0);
        let b = Point::new(140.0, 130.0);
        assert_eq!(a.midpoint(b), Point::new(120.0, 115.0));
        assert!((a.distance(b) - 50.0).abs() < 1e-6);
    }

    #[test]
    fn test_face_detection_deserializes_detector_shape() {
        let json = r#"{
            "box": [80, 60, 100, 120],
            "confidence": 0.98,
            "keypoints": {
                "left_eye": [100, 100],
                "right_eye": [140, 100],
                "nose": [120, 115],
                "mouth_left": [105, 140],
                "mouth_right": [135, 140]
            }
        }"#;
        let face: FaceDetection = serde_json::from_str(json).unwrap();
        assert_eq!(face.bbox, BoundingBox::new(80, 60, 100, 120));
        assert_eq!(face.keypoints.nose, Point::new(120.0, 115.0));
        assert_eq!(face.keypoints.as_array()[1], (140.0, 100.0));
    }

    #[test]
    fn test_confidence_is_optional() {
        let json = r#"{"box":[0,0,1,1],"keypoints":{"left_eye":[0,0],"right_eye":[1,0],
            "nose":[0,0],"mouth_left":[0,1],"mouth_right":[1,1]}}"#;
        let face: FaceDetection = serde_json::from_str(json).unwrap();
        assert_eq!(face.confidence, 0.0);
    }
}
