//! Post-processing contract of the target-class object detector.
//!
//! Darknet-style detector heads emit one row per candidate:
//! `[cx, cy, w, h, objectness, score_0, .., score_n]`, with the box in
//! normalised centre format. Rows are decoded to [`Candidate`]s, filtered to
//! the target class above a confidence threshold, converted to pixel boxes and
//! de-duplicated with greedy non-maximum suppression.

use ndarray::{s, ArrayView2};

use crate::landmarks::BoundingBox;
use crate::perception::ObjectDetection;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.45;
pub const DEFAULT_NMS_THRESHOLD: f32 = 0.4;
pub const DEFAULT_TARGET_CLASS: &str = "cell phone";

/// Index of the first class score in a darknet row.
const SCORES_OFFSET: usize = 5;

/// COCO-80 class names in model output order.
pub const COCO_CLASSES: &[&str] = &[
    "person", "bicycle", "car", "motorbike", "aeroplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat", "dog",
    "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack", "umbrella",
    "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball", "kite",
    "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket", "bottle",
    "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich", "orange",
    "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "sofa", "pottedplant",
    "bed", "diningtable", "toilet", "tvmonitor", "laptop", "mouse", "remote", "keyboard",
    "cell phone", "microwave", "oven", "toaster", "sink", "refrigerator", "book", "clock", "vase",
    "scissors", "teddy bear", "hair drier", "toothbrush",
];

#[derive(Debug, Clone, PartialEq)]
pub struct DetectorThresholds {
    /// Candidates must score strictly above this.
    pub confidence: f32,
    /// Boxes overlapping a kept box by more than this IoU are suppressed.
    pub nms: f32,
    pub target_class: String,
}

impl Default for DetectorThresholds {
    fn default() -> Self {
        Self {
            confidence: DEFAULT_CONFIDENCE_THRESHOLD,
            nms: DEFAULT_NMS_THRESHOLD,
            target_class: DEFAULT_TARGET_CLASS.to_string(),
        }
    }
}

/// A decoded detection with its box in normalised centre format.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub cx: f32,
    pub cy: f32,
    pub w: f32,
    pub h: f32,
    pub class_name: String,
    pub confidence: f32,
}

/// Decode raw darknet rows. The class of a row is the arg-max of its scores
/// (first index on ties); rows too short to hold a score, or whose class index
/// has no name, are dropped.
pub fn decode_darknet_rows(rows: ArrayView2<'_, f32>, class_names: &[&str]) -> Vec<Candidate> {
    if rows.ncols() <= SCORES_OFFSET {
        return Vec::new();
    }

    rows.outer_iter()
        .filter_map(|row| {
            let scores = row.slice(s![SCORES_OFFSET..]);
            let mut best = (0usize, f32::NEG_INFINITY);
            for (i, &score) in scores.iter().enumerate() {
                if score > best.1 {
                    best = (i, score);
                }
            }
            let class_name = class_names.get(best.0)?;
            Some(Candidate {
                cx: row[0],
                cy: row[1],
                w: row[2],
                h: row[3],
                class_name: (*class_name).to_string(),
                confidence: best.1,
            })
        })
        .collect()
}

/// Keep confident target-class candidates as de-duplicated pixel boxes.
pub fn select_targets(
    candidates: &[Candidate],
    frame_width: u32,
    frame_height: u32,
    thresholds: &DetectorThresholds,
) -> ObjectDetection {
    let fw = frame_width as f32;
    let fh = frame_height as f32;

    let scored: Vec<(BoundingBox, f32)> = candidates
        .iter()
        .filter(|c| c.confidence > thresholds.confidence && c.class_name == thresholds.target_class)
        .map(|c| (to_pixel_box(c, fw, fh), c.confidence))
        .collect();

    let boxes = nms(scored, thresholds.nms);
    if !boxes.is_empty() {
        tracing::debug!(count = boxes.len(), class = %thresholds.target_class, "target detected");
    }
    ObjectDetection::from_boxes(boxes)
}

fn to_pixel_box(c: &Candidate, fw: f32, fh: f32) -> BoundingBox {
    let center_x = (c.cx * fw) as i32;
    let center_y = (c.cy * fh) as i32;
    let w = (c.w * fw) as i32;
    let h = (c.h * fh) as i32;
    let x = (center_x as f32 - w as f32 / 2.0) as i32;
    let y = (center_y as f32 - h as f32 / 2.0) as i32;
    BoundingBox::new(x, y, w, h)
}

/// Greedy NMS, highest confidence first.
fn nms(mut scored: Vec<(BoundingBox, f32)>, iou_threshold: f32) -> Vec<BoundingBox> {
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));

    let mut keep: Vec<BoundingBox> = Vec::new();
    for (candidate, _) in scored {
        if keep.iter().all(|k| iou(k, &candidate) <= iou_threshold) {
            keep.push(candidate);
        }
    }
    keep
}

fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let x1 = a.x.max(b.x);
    let y1 = a.y.max(b.y);
    let x2 = (a.x + a.w).min(b.x + b.w);
    let y2 = (a.y + a.h).min(b.y + b.h);

    let intersection = ((x2 - x1).max(0) as f32) * ((y2 - y1).max(0) as f32);
    let area_a = (a.w.max(0) as f32) * (a.h.max(0) as f32);
    let area_b = (b.w.max(0) as f32) * (b.h.max(0) as f32);
    let union = area_a + area_b - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}
