//! Non-Maximum Suppression and Averaging.
//!
//! Single-shot detectors report every object several times, from neighboring anchors. Non-Maximum
//! Suppression keeps only one detection per object. [`SuppressionMode::Remove`] keeps the most
//! confident detection of each overlapping group, [`SuppressionMode::Average`] replaces the group
//! with its confidence-weighted average. Averaging reduces jitter between frames and is the
//! default.

use crate::{image::Rect, iter::zip_exact, num::TotalF32};

use super::{Detection, Keypoint};

/// A non-maximum suppression pass with reusable buffers.
pub struct NonMaxSuppression {
    iou_thresh: f32,
    mode: SuppressionMode,
    group: Vec<Detection>,
    out: Vec<Detection>,
}

impl NonMaxSuppression {
    /// Intersection-over-union at or above which two detections are considered the same object.
    pub const DEFAULT_IOU_THRESH: f32 = 0.3;

    /// Creates a suppressor using [`SuppressionMode::Average`] and [`Self::DEFAULT_IOU_THRESH`].
    pub fn new() -> Self {
        Self {
            iou_thresh: Self::DEFAULT_IOU_THRESH,
            mode: SuppressionMode::Average,
            group: Vec::new(),
            out: Vec::new(),
        }
    }

    pub fn set_iou_thresh(&mut self, iou_thresh: f32) {
        self.iou_thresh = iou_thresh;
    }

    pub fn set_mode(&mut self, mode: SuppressionMode) {
        self.mode = mode;
    }

    /// Replaces the contents of `detections` with one detection per overlapping group.
    ///
    /// The result is ordered by descending confidence of each group's seed.
    pub fn process(&mut self, detections: &mut Vec<Detection>) {
        self.out.clear();

        // Ascending order, so that popping yields the most confident detection first.
        detections.sort_unstable_by_key(|det| TotalF32(det.confidence));

        while let Some(seed) = detections.pop() {
            let seed_rect = seed.bounding_rect();
            let thresh = self.iou_thresh;
            match self.mode {
                SuppressionMode::Remove => {
                    detections.retain(|other| seed_rect.iou(&other.bounding_rect()) < thresh);
                    self.out.push(seed);
                }
                SuppressionMode::Average => {
                    self.group.clear();
                    let (overlapping, rest): (Vec<_>, Vec<_>) = detections
                        .drain(..)
                        .partition(|other| seed_rect.iou(&other.bounding_rect()) >= thresh);
                    detections.extend(rest);

                    self.group.push(seed);
                    self.group.extend(overlapping);
                    self.out.push(weighted_average(&self.group));
                }
            }
        }

        self.group.clear();
        detections.append(&mut self.out);
    }
}

impl Default for NonMaxSuppression {
    fn default() -> Self {
        Self::new()
    }
}

/// Averages a group of detections, weighted by confidence.
///
/// The result keeps the confidence of the group's first (most confident) detection.
fn weighted_average(group: &[Detection]) -> Detection {
    let seed = &group[0];
    let mut keypoints = vec![Keypoint::new(0.0, 0.0); seed.keypoints().len()];
    let (mut x, mut y, mut w, mut h, mut angle) = (0.0, 0.0, 0.0, 0.0, 0.0);
    let mut divisor = 0.0;

    for det in group {
        let factor = det.confidence();
        divisor += factor;

        for (acc, kp) in zip_exact(&mut keypoints, det.keypoints()) {
            acc.x += kp.x * factor;
            acc.y += kp.y * factor;
        }
        let rect = det.bounding_rect();
        x += rect.x_center() * factor;
        y += rect.y_center() * factor;
        w += rect.width() * factor;
        h += rect.height() * factor;
        angle += det.angle() * factor;
    }

    if divisor <= 0.0 {
        return seed.clone();
    }

    for kp in &mut keypoints {
        kp.x /= divisor;
        kp.y /= divisor;
    }
    let rect = Rect::from_center(x / divisor, y / divisor, w / divisor, h / divisor);
    let mut avg = Detection::with_keypoints(seed.confidence(), rect, keypoints);
    avg.set_angle(angle / divisor);
    avg
}

/// Describes how [`NonMaxSuppression`] deals with overlapping detections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressionMode {
    /// Keep only the detection with the highest confidence.
    Remove,

    /// Compute a confidence-weighted average of the overlapping detections.
    Average,
}
