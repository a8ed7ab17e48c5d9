//! Perception collaborators backed by a recorded JSON-lines log.
//!
//! Each line holds the detector outputs for one frame:
//!
//! ```json
//! {"frame": 12, "faces": [{"box": [x, y, w, h], "keypoints": {...}}],
//!  "darknet_rows": [[cx, cy, w, h, obj, s0, s1, ...]], "emotion": "fear"}
//! ```
//!
//! Every field but `frame` is optional. Frames absent from the log see no face,
//! no objects and a neutral emotion. `failures` lists services that should
//! report an error for that frame, which exercises the engine's recovery path.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use invigil_core::detection::{decode_darknet_rows, select_targets, DetectorThresholds};
use invigil_core::{
    EmotionClassifier, FaceDetection, Frame, LandmarkDetector, ObjectDetection, ObjectDetector,
    PerceptionError, COCO_CLASSES, NEUTRAL_EMOTION,
};
use ndarray::Array2;
use serde::Deserialize;

use crate::engine::Collaborators;
use crate::source::SourceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    Landmarks,
    Objects,
    Emotion,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReplayRecord {
    pub frame: u64,
    #[serde(default)]
    pub faces: Vec<FaceDetection>,
    #[serde(default)]
    pub darknet_rows: Vec<Vec<f32>>,
    #[serde(default)]
    pub emotion: Option<String>,
    #[serde(default)]
    pub failures: Vec<Service>,
}

impl ReplayRecord {
    fn fails(&self, service: Service) -> bool {
        self.failures.contains(&service)
    }
}

/// Recorded perception results indexed by frame.
#[derive(Debug, Default)]
pub struct ReplayLog {
    records: HashMap<u64, ReplayRecord>,
}

impl ReplayLog {
    pub fn load(path: &Path) -> Result<Self, SourceError> {
        let file = File::open(path).map_err(|source| SourceError::ReplayOpen {
            path: path.to_path_buf(),
            source,
        })?;
        let log = Self::parse(BufReader::new(file), path)?;
        tracing::info!(path = %path.display(), records = log.len(), "replay log loaded");
        Ok(log)
    }

    /// Parse JSON lines. Blank lines are ignored; a later record for the same
    /// frame replaces an earlier one.
    pub fn parse(reader: impl BufRead, path: &Path) -> Result<Self, SourceError> {
        let mut records = HashMap::new();
        for (i, line) in reader.lines().enumerate() {
            let line = line.map_err(|source| SourceError::ReplayRead {
                path: path.to_path_buf(),
                source,
            })?;
            if line.trim().is_empty() {
                continue;
            }
            let record: ReplayRecord =
                serde_json::from_str(&line).map_err(|source| SourceError::ReplayParse {
                    path: path.to_path_buf(),
                    line: i + 1,
                    source,
                })?;
            records.insert(record.frame, record);
        }
        Ok(Self { records })
    }

    pub fn get(&self, frame: u64) -> Option<&ReplayRecord> {
        self.records.get(&frame)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Build all three collaborators over one shared log.
pub fn collaborators(log: Arc<ReplayLog>, thresholds: DetectorThresholds) -> Collaborators {
    Collaborators {
        landmarks: Box::new(ReplayLandmarks {
            log: Arc::clone(&log),
        }),
        objects: Box::new(ReplayObjects {
            log: Arc::clone(&log),
            thresholds,
        }),
        emotion: Arc::new(ReplayEmotion { log }),
    }
}

fn injected(service: Service, frame: u64) -> PerceptionError {
    PerceptionError::Replay(format!("recorded {service:?} failure at frame {frame}"))
}

pub struct ReplayLandmarks {
    log: Arc<ReplayLog>,
}

impl LandmarkDetector for ReplayLandmarks {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<FaceDetection>, PerceptionError> {
        match self.log.get(frame.index) {
            Some(r) if r.fails(Service::Landmarks) => Err(injected(Service::Landmarks, frame.index)),
            Some(r) => Ok(r.faces.clone()),
            None => Ok(Vec::new()),
        }
    }
}

pub struct ReplayObjects {
    log: Arc<ReplayLog>,
    thresholds: DetectorThresholds,
}

impl ObjectDetector for ReplayObjects {
    fn detect_target(&mut self, frame: &Frame) -> Result<ObjectDetection, PerceptionError> {
        frame.validate()?;
        let Some(record) = self.log.get(frame.index) else {
            return Ok(ObjectDetection::default());
        };
        if record.fails(Service::Objects) {
            return Err(injected(Service::Objects, frame.index));
        }
        if record.darknet_rows.is_empty() {
            return Ok(ObjectDetection::default());
        }

        let rows = rows_to_array(&record.darknet_rows)?;
        let candidates = decode_darknet_rows(rows.view(), COCO_CLASSES);
        Ok(select_targets(
            &candidates,
            frame.width(),
            frame.height(),
            &self.thresholds,
        ))
    }
}

fn rows_to_array(rows: &[Vec<f32>]) -> Result<Array2<f32>, PerceptionError> {
    let ncols = rows.first().map(Vec::len).unwrap_or(0);
    if rows.iter().any(|r| r.len() != ncols) {
        return Err(PerceptionError::Replay(
            "darknet rows have differing lengths".to_string(),
        ));
    }
    let flat: Vec<f32> = rows.iter().flatten().copied().collect();
    Array2::from_shape_vec((rows.len(), ncols), flat)
        .map_err(|e| PerceptionError::Replay(e.to_string()))
}

pub struct ReplayEmotion {
    log: Arc<ReplayLog>,
}

impl EmotionClassifier for ReplayEmotion {
    fn classify(&self, frame: &Frame) -> Result<String, PerceptionError> {
        match self.log.get(frame.index) {
            Some(r) if r.fails(Service::Emotion) => Err(injected(Service::Emotion, frame.index)),
            Some(r) => Ok(r
                .emotion
                .clone()
                .unwrap_or_else(|| NEUTRAL_EMOTION.to_string())),
            None => Ok(NEUTRAL_EMOTION.to_string()),
        }
    }
}
