//! Interfaces to the external perception services.
//!
//! Face landmarks, object detection and emotion classification are pluggable.
//! Their models and inference live outside this crate; the engine only sees
//! these traits. Every failure is reported as a [`PerceptionError`] and is
//! recovered by the caller with the matching neutral default.

use image::RgbImage;
use serde::Serialize;
use thiserror::Error;

use crate::landmarks::{BoundingBox, FaceDetection};

/// Label used until an emotion result arrives, and after a failed classification.
pub const NEUTRAL_EMOTION: &str = "Neutral";

#[derive(Error, Debug)]
pub enum PerceptionError {
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("invalid frame: {width}x{height}")]
    InvalidFrame { width: u32, height: u32 },
    #[error("replay error: {0}")]
    Replay(String),
}

/// One frame of the video stream.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Zero-based position in the stream.
    pub index: u64,
    pub image: RgbImage,
}

impl Frame {
    pub fn new(index: u64, image: RgbImage) -> Self {
        Self { index, image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Reject frames with no pixels before they reach a detector.
    pub fn validate(&self) -> Result<(), PerceptionError> {
        if self.width() == 0 || self.height() == 0 {
            return Err(PerceptionError::InvalidFrame {
                width: self.width(),
                height: self.height(),
            });
        }
        Ok(())
    }
}

/// Result of a target-class object detection pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ObjectDetection {
    pub found: bool,
    pub boxes: Vec<BoundingBox>,
}

impl ObjectDetection {
    pub fn from_boxes(boxes: Vec<BoundingBox>) -> Self {
        Self {
            found: !boxes.is_empty(),
            boxes,
        }
    }
}

/// Face and five-point landmark detector. An empty list means no face.
pub trait LandmarkDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<FaceDetection>, PerceptionError>;
}

/// Detector filtered to a single target class (a phone, in practice).
pub trait ObjectDetector {
    fn detect_target(&mut self, frame: &Frame) -> Result<ObjectDetection, PerceptionError>;
}

/// Dominant-emotion classifier. Runs off the frame loop, so it must be shareable.
pub trait EmotionClassifier: Send + Sync {
    fn classify(&self, frame: &Frame) -> Result<String, PerceptionError>;
}
