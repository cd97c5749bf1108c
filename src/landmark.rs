//! Landmark estimation and region-of-interest tracking.

use anyhow::Context;

use crate::image::{AsImageView, AspectRatio, ImageView, Resolution, RotatedRect};
use crate::nn::{Cnn, Outputs};
use crate::timer::Timer;

type Position = [f32; 3];

/// A fixed-size list of 3D landmark positions.
#[derive(Debug, Clone, PartialEq)]
pub struct Landmarks {
    positions: Box<[Position]>,
}

impl Landmarks {
    /// Creates a list of `len` landmarks, all at the origin.
    pub fn new(len: usize) -> Self {
        Self {
            positions: vec![[0.0; 3]; len].into_boxed_slice(),
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Landmark> + Clone + '_ {
        self.positions.iter().map(|&pos| Landmark::new(pos))
    }

    pub fn get(&self, index: usize) -> Landmark {
        Landmark::new(self.positions[index])
    }

    pub fn set(&mut self, index: usize, landmark: Landmark) {
        self.positions[index] = landmark.pos;
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn positions_mut(&mut self) -> &mut [Position] {
        &mut self.positions
    }

    pub fn map_positions(&mut self, mut f: impl FnMut(Position) -> Position) {
        for pos in self.positions_mut() {
            *pos = f(*pos);
        }
    }
}

/// A landmark in 3D space.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct Landmark {
    pos: Position,
}

impl Landmark {
    pub fn new(pos: Position) -> Self {
        Self { pos }
    }

    #[inline]
    pub fn x(&self) -> f32 {
        self.pos[0]
    }

    #[inline]
    pub fn y(&self) -> f32 {
        self.pos[1]
    }

    #[inline]
    pub fn z(&self) -> f32 {
        self.pos[2]
    }
}

/// Trait for landmark estimation results returned by [`Estimator::estimate`].
pub trait Estimate: Send + Sync + 'static {
    fn landmarks(&self) -> &Landmarks;

    fn landmarks_mut(&mut self) -> &mut Landmarks;

    /// Returns the estimated clockwise rotation of the object, in radians.
    ///
    /// [`LandmarkTracker`] uses this to rotate its region of interest along with the object.
    fn angle_radians(&self) -> Option<f32> {
        None
    }
}

/// Trait for estimates that tell whether the object is still in view.
pub trait Confidence {
    /// Presence score in `0.0..=1.0`. Anything above 0.5 means the object is probably in view.
    fn confidence(&self) -> f32;
}

/// Trait implemented by neural networks that estimate landmarks.
pub trait Network: Send + Sync + 'static {
    type Output: Estimate;

    fn cnn(&self) -> &Cnn;

    /// Writes the network outputs to `estimate`.
    ///
    /// Landmark positions are in the coordinate system of the network's input.
    fn extract(&self, outputs: &Outputs, estimate: &mut Self::Output);
}

/// Runs a landmark [`Network`] on images and maps its output back into image coordinates.
pub struct Estimator<E: Estimate> {
    network: Box<dyn Network<Output = E>>,
    estimate: E,
    t_infer: Timer,
    t_extract: Timer,
}

impl<E: Estimate + Default> Estimator<E> {
    pub fn new<N: Network<Output = E>>(network: N) -> Self {
        Self {
            network: Box::new(network),
            estimate: E::default(),
            t_infer: Timer::new("infer"),
            t_extract: Timer::new("extract"),
        }
    }
}

impl<E: Estimate> Estimator<E> {
    pub fn input_resolution(&self) -> Resolution {
        self.network.cnn().input_resolution()
    }

    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        [&self.t_infer, &self.t_extract].into_iter()
    }

    /// Estimates landmarks in `image`, in `image` coordinates.
    ///
    /// If the aspect ratio of `image` differs from the network's, an enlarged view is used. That
    /// view reads pixels around `image` from its base image, or transparent black outside of it.
    pub fn estimate<V: AsImageView>(&mut self, image: &V) -> anyhow::Result<&mut E> {
        self.estimate_impl(image.as_view())
    }

    fn estimate_impl(&mut self, image: ImageView<'_>) -> anyhow::Result<&mut E> {
        let cnn = self.network.cnn();
        let input_res = cnn.input_resolution();
        let aspect = input_res
            .aspect_ratio()
            .context("landmark network has an empty input")?;

        let rect = image.rect().grow_to_fit_aspect(aspect);
        let view = image.view(rect);
        let outputs = self.t_infer.time(|| cnn.estimate(&view))?;
        log::trace!("inference result: {:?}", outputs);

        self.t_extract
            .time(|| self.network.extract(&outputs, &mut self.estimate));

        let scale = rect.width() / input_res.width() as f32;
        self.estimate.landmarks_mut().map_positions(|[x, y, z]| {
            [x * scale + rect.x(), y * scale + rect.y(), z * scale]
        });

        Ok(&mut self.estimate)
    }
}

/// Follows an object across frames by re-centering a region of interest (RoI) on the landmarks
/// estimated inside it.
///
/// Tracking is lost when the estimate's [`Confidence`] drops below the loss threshold, after which
/// a new RoI has to be provided with [`LandmarkTracker::set_roi`].
pub struct LandmarkTracker<E: Estimate + Confidence> {
    aspect_ratio: AspectRatio,
    estimator: Estimator<E>,
    roi: Option<RotatedRect>,
    loss_thresh: f32,
    roi_padding: f32,
}

impl<E: Estimate + Confidence> LandmarkTracker<E> {
    pub const DEFAULT_LOSS_THRESHOLD: f32 = 0.5;

    pub const DEFAULT_ROI_PADDING: f32 = 0.3;

    pub fn new(estimator: Estimator<E>) -> anyhow::Result<Self> {
        let aspect_ratio = estimator
            .input_resolution()
            .aspect_ratio()
            .context("landmark network has an empty input")?;
        Ok(Self {
            aspect_ratio,
            estimator,
            roi: None,
            loss_thresh: Self::DEFAULT_LOSS_THRESHOLD,
            roi_padding: Self::DEFAULT_ROI_PADDING,
        })
    }

    pub fn timers(&self) -> impl Iterator<Item = &Timer> {
        self.estimator.timers()
    }

    /// Sets the confidence below which tracking is considered lost.
    pub fn set_loss_threshold(&mut self, threshold: f32) {
        self.loss_thresh = threshold;
    }

    /// Sets the padding added to each side of the landmarks' bounding rectangle, relative to its
    /// size.
    ///
    /// # Panics
    ///
    /// Panics if `padding` is negative or NaN.
    pub fn set_roi_padding(&mut self, padding: f32) {
        assert!(padding >= 0.0, "invalid RoI padding {padding}");
        self.roi_padding = padding;
    }

    /// Returns the RoI the next call to [`LandmarkTracker::track`] will use, if any.
    pub fn roi(&self) -> Option<&RotatedRect> {
        self.roi.as_ref()
    }

    /// Sets the region of interest, as-is, without padding.
    pub fn set_roi(&mut self, roi: impl Into<RotatedRect>) {
        self.roi = Some(roi.into());
    }

    /// Estimates landmarks inside the current RoI of `full_image` and moves the RoI along.
    ///
    /// Returns `None` if there is no RoI, or if tracking was lost in this frame.
    pub fn track<V: AsImageView>(
        &mut self,
        full_image: &V,
    ) -> anyhow::Result<Option<TrackingResult<'_, E>>> {
        self.track_impl(full_image.as_view())
    }

    fn track_impl(
        &mut self,
        full_image: ImageView<'_>,
    ) -> anyhow::Result<Option<TrackingResult<'_, E>>> {
        let Some(roi) = self.roi else {
            return Ok(None);
        };
        let view_rect = roi.map(|rect| rect.grow_to_fit_aspect(self.aspect_ratio));
        let view = full_image.view(view_rect);
        let estimate = self.estimator.estimate(&view)?;
        if estimate.confidence() < self.loss_thresh {
            log::trace!(
                "tracking lost: confidence {} below threshold {}",
                estimate.confidence(),
                self.loss_thresh,
            );

            self.roi = None;
            return Ok(None);
        }

        let angle = roi.rotation_radians() + estimate.angle_radians().unwrap_or(0.0);

        // View coordinates -> full image coordinates.
        estimate.landmarks_mut().map_positions(|[x, y, z]| {
            let [x, y] = view_rect.transform_out(x, y);
            [x, y, z]
        });

        let updated_roi = RotatedRect::bounding(
            angle,
            estimate.landmarks().iter().map(|lm| [lm.x(), lm.y()]),
        )
        .context("landmark network produced no landmarks")?;

        self.roi = Some(updated_roi.grow_rel(self.roi_padding));

        Ok(Some(TrackingResult { estimate }))
    }
}

/// The result returned by [`LandmarkTracker::track`].
pub struct TrackingResult<'a, E: Estimate> {
    estimate: &'a E,
}

impl<'a, E: Estimate> TrackingResult<'a, E> {
    /// Returns the estimate, with landmarks in full image coordinates.
    pub fn estimate(&self) -> &'a E {
        self.estimate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn landmarks_start_at_origin() {
        let landmarks = Landmarks::new(3);
        assert_eq!(landmarks.len(), 3);
        assert!(landmarks.positions().iter().all(|&pos| pos == [0.0; 3]));
        assert!(Landmarks::new(0).is_empty());
    }

    #[test]
    fn set_and_map() {
        let mut landmarks = Landmarks::new(2);
        landmarks.set(1, Landmark::new([1.0, 2.0, 3.0]));
        landmarks.map_positions(|[x, y, z]| [x * 2.0, y + 1.0, -z]);
        assert_eq!(landmarks.positions()[0], [0.0, 1.0, -0.0]);
        let lm = landmarks.get(1);
        assert_eq!((lm.x(), lm.y(), lm.z()), (2.0, 3.0, -3.0));
    }
}
