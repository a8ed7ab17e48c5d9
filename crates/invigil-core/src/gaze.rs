//! Horizontal gaze from eye-region pixels.
//!
//! Each eye is cropped from the frame with a box sized from the inter-eye
//! distance, so crops scale with the face. Inside a crop the pupil is taken to
//! be the largest connected dark region after a fixed inverse threshold; its
//! centroid x, normalised by the crop width, is the per-eye ratio
//! (0 = left edge of the crop, 1 = right edge). Both eyes are averaged.
//!
//! Any failure yields [`NO_INFORMATION`] (0.5). That value is a neutral,
//! non-alarming default; it does not mean the subject was looking at the
//! calibrated centre.

use image::imageops;
use image::{GrayImage, Luma, RgbImage};
use serde::Serialize;
use std::fmt;

use crate::landmarks::{Landmarks, Point};

/// Pixels strictly darker than this are pupil candidates.
pub const PUPIL_INTENSITY_THRESHOLD: u8 = 70;

/// Ratio returned whenever an eye cannot be measured.
pub const NO_INFORMATION: f32 = 0.5;

/// Averaged ratio below which gaze is labelled `Right`.
pub const GAZE_RIGHT_THRESHOLD: f32 = 0.35;
/// Averaged ratio above which gaze is labelled `Left`.
pub const GAZE_LEFT_THRESHOLD: f32 = 0.65;

/// Eye crop width as a fraction of inter-eye distance.
const EYE_WIDTH_FACTOR: f32 = 0.3;
/// Eye crop height as a fraction of crop width.
const EYE_HEIGHT_FACTOR: f32 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GazeDirection {
    Left,
    Right,
    Center,
    /// No face this frame. Carries the neutral 0.5 ratio and fuses exactly like
    /// `Center`; it is kept separate so the display can tell a missing face
    /// from a centred gaze.
    Unknown,
}

impl GazeDirection {
    /// Label an averaged ratio. The band between the two thresholds is a wide
    /// dead zone that absorbs pupil jitter.
    pub fn from_ratio(ratio: f32) -> Self {
        if ratio < GAZE_RIGHT_THRESHOLD {
            Self::Right
        } else if ratio > GAZE_LEFT_THRESHOLD {
            Self::Left
        } else {
            Self::Center
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "Left",
            Self::Right => "Right",
            Self::Center => "Center",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for GazeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Gaze {
    pub direction: GazeDirection,
    /// Mean of the left and right eye ratios.
    pub ratio: f32,
}

impl Gaze {
    pub const UNKNOWN: Gaze = Gaze {
        direction: GazeDirection::Unknown,
        ratio: NO_INFORMATION,
    };
}

/// Estimate the pupil position inside one eye crop.
///
/// The centroid column is truncated to a whole pixel before normalising. A
/// region with no extent in either axis (a single row or column of pixels)
/// has zero area and gives [`NO_INFORMATION`].
pub fn estimate_eye(crop: &RgbImage) -> f32 {
    if crop.width() == 0 || crop.height() == 0 {
        return NO_INFORMATION;
    }

    let gray = intensity(crop);
    let Some(pupil) = largest_dark_region(&gray, PUPIL_INTENSITY_THRESHOLD) else {
        return NO_INFORMATION;
    };
    if pupil.area() == 0 {
        return NO_INFORMATION;
    }

    let centroid_x = (pupil.sum_x / u64::from(pupil.pixels)) as f32;
    let ratio = centroid_x / crop.width() as f32;
    if ratio.is_finite() {
        ratio
    } else {
        NO_INFORMATION
    }
}

/// Single-channel intensity with BT.601 weights (0.299, 0.587, 0.114) in
/// 14-bit fixed point, rounded.
fn intensity(crop: &RgbImage) -> GrayImage {
    GrayImage::from_fn(crop.width(), crop.height(), |x, y| {
        let [r, g, b] = crop.get_pixel(x, y).0;
        let weighted = u32::from(r) * 4899 + u32::from(g) * 9617 + u32::from(b) * 1868;
        Luma([((weighted + (1 << 13)) >> 14) as u8])
    })
}

/// Estimate gaze for a whole frame from the eye landmarks.
pub fn estimate_gaze(frame: &RgbImage, landmarks: Option<&Landmarks>) -> Gaze {
    let Some(lm) = landmarks else {
        return Gaze::UNKNOWN;
    };

    let eye_dist = lm.left_eye.distance(lm.right_eye);
    let eye_w = (eye_dist * EYE_WIDTH_FACTOR) as i64;
    let eye_h = (eye_w as f32 * EYE_HEIGHT_FACTOR) as i64;

    let left = eye_ratio(frame, lm.left_eye, eye_w, eye_h);
    let right = eye_ratio(frame, lm.right_eye, eye_w, eye_h);
    let ratio = (left + right) / 2.0;

    tracing::trace!(left, right, ratio, "gaze estimate");

    Gaze {
        direction: GazeDirection::from_ratio(ratio),
        ratio,
    }
}

fn eye_ratio(frame: &RgbImage, center: Point, eye_w: i64, eye_h: i64) -> f32 {
    match eye_region(center, eye_w, eye_h, frame.width(), frame.height()) {
        Some((x, y, w, h)) => estimate_eye(&imageops::crop_imm(frame, x, y, w, h).to_image()),
        None => NO_INFORMATION,
    }
}

/// Crop rectangle `(x, y, w, h)` centred on an eye, clamped to the frame.
/// `None` when nothing of the rectangle lies inside the frame.
fn eye_region(
    center: Point,
    eye_w: i64,
    eye_h: i64,
    frame_w: u32,
    frame_h: u32,
) -> Option<(u32, u32, u32, u32)> {
    if eye_w <= 0 || eye_h <= 0 || !center.x.is_finite() || !center.y.is_finite() {
        return None;
    }

    let cx = center.x.round() as i64;
    let cy = center.y.round() as i64;

    let x0 = (cx - eye_w / 2).max(0);
    let y0 = (cy - eye_h / 2).max(0);
    let x1 = (cx + eye_w / 2).min(frame_w as i64);
    let y1 = (cy + eye_h / 2).min(frame_h as i64);

    if x1 <= x0 || y1 <= y0 {
        return None;
    }

    Some((x0 as u32, y0 as u32, (x1 - x0) as u32, (y1 - y0) as u32))
}

/// A connected region of foreground pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Region {
    pixels: u32,
    sum_x: u64,
    min_x: usize,
    max_x: usize,
    min_y: usize,
    max_y: usize,
}

impl Region {
    fn seed(x: usize, y: usize) -> Self {
        Self {
            pixels: 0,
            sum_x: 0,
            min_x: x,
            max_x: x,
            min_y: y,
            max_y: y,
        }
    }

    fn add(&mut self, x: usize, y: usize) {
        self.pixels += 1;
        self.sum_x += x as u64;
        self.min_x = self.min_x.min(x);
        self.max_x = self.max_x.max(x);
        self.min_y = self.min_y.min(y);
        self.max_y = self.max_y.max(y);
    }

    /// Area spanned between pixel centres. Zero for a single row or column.
    fn area(&self) -> usize {
        (self.max_x - self.min_x) * (self.max_y - self.min_y)
    }

    fn outranks(&self, other: &Region) -> bool {
        (self.area(), self.pixels) > (other.area(), other.pixels)
    }
}

/// Find the largest 8-connected region of pixels darker than `threshold`,
/// ranked by spanned area and then by pixel count.
fn largest_dark_region(gray: &GrayImage, threshold: u8) -> Option<Region> {
    let (w, h) = gray.dimensions();
    let (w, h) = (w as usize, h as usize);
    let is_dark = |x: usize, y: usize| gray.get_pixel(x as u32, y as u32).0[0] < threshold;

    let mut visited = vec![false; w * h];
    let mut stack = Vec::new();
    let mut best: Option<Region> = None;

    for start_y in 0..h {
        for start_x in 0..w {
            let idx = start_y * w + start_x;
            if visited[idx] || !is_dark(start_x, start_y) {
                continue;
            }

            visited[idx] = true;
            stack.push((start_x, start_y));
            let mut region = Region::seed(start_x, start_y);

            while let Some((x, y)) = stack.pop() {
                region.add(x, y);

                for ny in y.saturating_sub(1)..=(y + 1).min(h - 1) {
                    for nx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
                        let nidx = ny * w + nx;
                        if !visited[nidx] && is_dark(nx, ny) {
                            visited[nidx] = true;
                            stack.push((nx, ny));
                        }
                    }
                }
            }

            if best.map_or(true, |b| region.outranks(&b)) {
                best = Some(region);
            }
        }
    }

    best
}
