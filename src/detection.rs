//! Single-shot object detection.
//!
//! A [`Detector`] runs a detection [`Network`] on a whole frame, filters the raw detections by
//! confidence, merges overlapping ones, and maps the survivors back into frame coordinates.

pub mod nms;
pub mod ssd;

use anyhow::Context;

use crate::image::{AsImageView, ImageView, Rect};
use crate::nn::{Cnn, Outputs};
use crate::timer::Timer;

use self::nms::NonMaxSuppression;

/// Trait implemented by neural networks that detect objects in an input image.
pub trait Network: Send + Sync + 'static {
    /// Returns the [`Cnn`] to use for detection.
    fn cnn(&self) -> &Cnn;

    /// Appends all detections with confidence of at least `threshold` to `detections`.
    ///
    /// Positions are in the coordinate system of the network's input image.
    fn extract(&self, outputs: &Outputs, threshold: f32, detections: &mut Vec<Detection>);
}

/// A generic object detector wrapping a [`Network`].
pub struct Detector {
    network: Box<dyn Network>,
    detections: Vec<Detection>,
    t_infer: Timer,
    t_extract: Timer,
    t_nms: Timer,
    thresh: f32,
    nms: NonMaxSuppression,
}

impl Detector {
    pub const DEFAULT_THRESHOLD: f32 = 0.5;

    pub fn new<N: Network>(network: N) -> Self {
        Self {
            network: Box::new(network),
            detections: Vec::new(),
            t_infer: Timer::new("infer"),
            t_extract: Timer::new("extract"),
            t_nms: Timer::new("nms"),
            thresh: Self::DEFAULT_THRESHOLD,
            nms: NonMaxSuppression::new(),
        }
    }

    /// Sets the minimum confidence a detection needs to be kept.
    #[inline]
    pub fn set_threshold(&mut self, thresh: f32) {
        self.thresh = thresh;
    }

    /// Runs detection on `image`, returning the detections in `image` coordinates.
    pub fn detect<V: AsImageView>(&mut self, image: &V) -> anyhow::Result<&[Detection]> {
        self.detect_impl(image.as_view())
    }

    fn detect_impl(&mut self, image: ImageView<'_>) -> anyhow::Result<&[Detection]> {
        self.detections.clear();

        let cnn = self.network.cnn();
        let input_res = cnn.input_resolution();
        let aspect = input_res
            .aspect_ratio()
            .context("detection network has an empty input")?;

        // Pad the image to the network's aspect ratio so that it is not stretched.
        let rect = image.rect().grow_to_fit_aspect(aspect);
        let view = image.view(rect);
        let outputs = self.t_infer.time(|| cnn.estimate(&view))?;
        log::trace!("inference result: {:?}", outputs);

        self.t_extract.time(|| {
            self.network
                .extract(&outputs, self.thresh, &mut self.detections)
        });

        self.t_nms.time(|| self.nms.process(&mut self.detections));

        // Network input coordinates -> `rect` coordinates -> `image` coordinates.
        let scale = rect.width() / input_res.width() as f32;
        for det in &mut self.detections {
            let (xc, yc) = det.rect.center();
            det.rect = Rect::from_center(
                xc * scale + rect.x(),
                yc * scale + rect.y(),
                det.rect.width() * scale,
                det.rect.height() * scale,
            );
            for kp in &mut det.keypoints {
                kp.x = kp.x * scale + rect.x();
                kp.y = kp.y * scale + rect.y();
            }
        }

        Ok(&self.detections)
    }

    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        [&self.t_infer, &self.t_extract, &self.t_nms].into_iter()
    }
}

/// A detected object.
///
/// Consists of a [`Rect`] enclosing the object, a confidence value in `0.0..=1.0`, the object's
/// rotation, and a possibly empty list of keypoints.
#[derive(Debug, Clone)]
pub struct Detection {
    confidence: f32,
    angle: f32,
    rect: Rect,
    keypoints: Vec<Keypoint>,
}

impl Detection {
    pub fn new(confidence: f32, rect: Rect) -> Self {
        Self::with_keypoints(confidence, rect, Vec::new())
    }

    pub fn with_keypoints(confidence: f32, rect: Rect, keypoints: Vec<Keypoint>) -> Self {
        Self {
            confidence,
            angle: 0.0,
            rect,
            keypoints,
        }
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// Returns the angle of the detected object, in radians, clockwise.
    ///
    /// Networks that do not estimate a rotation leave this at 0.0.
    pub fn angle(&self) -> f32 {
        self.angle
    }

    pub fn set_angle(&mut self, angle: f32) {
        self.angle = angle;
    }

    /// Returns the axis-aligned rectangle containing the detected object.
    pub fn bounding_rect(&self) -> Rect {
        self.rect
    }

    pub fn keypoints(&self) -> &[Keypoint] {
        &self.keypoints
    }
}

/// A 2D point of interest located by a detection network.
///
/// What each keypoint marks depends on the network and the keypoint's index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    x: f32,
    y: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn x(&self) -> f32 {
        self.x
    }

    pub fn y(&self) -> f32 {
        self.y
    }
}
