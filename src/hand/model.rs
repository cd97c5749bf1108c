//! The hand landmark model boundary and its MediaPipe-based implementation.

use nalgebra::{Rotation2, Vector2};

use crate::detection::{Detection, Detector};
use crate::image::{ImageView, Rect, Resolution, RotatedRect};
use crate::landmark::{Estimate, Estimator, LandmarkTracker};
use crate::timer::Timer;

use super::detection::PalmNetwork;
use super::landmark::{Handedness, LandmarkNetwork, LandmarkResult};

/// One hand joint, with `x` and `y` normalized by the frame width and height.
///
/// `z` is the depth relative to the wrist, scaled like `x`. Smaller values are closer to the
/// camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedLandmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl NormalizedLandmark {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// The landmarks of a single hand.
#[derive(Debug, Clone, PartialEq)]
pub struct HandLandmarks {
    landmarks: Vec<NormalizedLandmark>,
    handedness: Handedness,
    score: f32,
}

impl HandLandmarks {
    pub fn new(landmarks: Vec<NormalizedLandmark>, handedness: Handedness, score: f32) -> Self {
        Self {
            landmarks,
            handedness,
            score,
        }
    }

    /// Returns the landmarks, in [`LandmarkIdx`][super::LandmarkIdx] order.
    pub fn landmarks(&self) -> &[NormalizedLandmark] {
        &self.landmarks
    }

    pub fn handedness(&self) -> Handedness {
        self.handedness
    }

    /// Returns the presence score of the hand, in `0.0..=1.0`.
    pub fn score(&self) -> f32 {
        self.score
    }
}

/// All hands found in a frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HandResults {
    hands: Vec<HandLandmarks>,
}

impl HandResults {
    pub fn hands(&self) -> &[HandLandmarks] {
        &self.hands
    }

    pub fn get(&self, index: usize) -> Option<&HandLandmarks> {
        self.hands.get(index)
    }

    pub fn len(&self) -> usize {
        self.hands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hands.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HandLandmarks> {
        self.hands.iter()
    }
}

impl From<Vec<HandLandmarks>> for HandResults {
    fn from(hands: Vec<HandLandmarks>) -> Self {
        Self { hands }
    }
}

/// A model that finds hands in camera frames.
pub trait HandModel {
    /// Processes one frame, returning all hands found in it.
    ///
    /// Models may keep state between calls to follow hands across consecutive frames.
    fn process(&mut self, image: &ImageView<'_>) -> anyhow::Result<HandResults>;
}

/// Selects between the lighter and the more accurate variant of the networks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelComplexity {
    Lite,
    #[default]
    Full,
}

/// Construction options of [`Hands`].
#[derive(Debug, Clone)]
pub struct HandsOptions {
    max_num_hands: usize,
    min_detection_confidence: f32,
    min_tracking_confidence: f32,
    model_complexity: ModelComplexity,
}

impl Default for HandsOptions {
    fn default() -> Self {
        Self {
            max_num_hands: 1,
            min_detection_confidence: 0.85,
            min_tracking_confidence: 0.65,
            model_complexity: ModelComplexity::Full,
        }
    }
}

impl HandsOptions {
    /// Sets the maximum number of hands tracked at once.
    pub fn max_num_hands(mut self, max: usize) -> Self {
        self.max_num_hands = max;
        self
    }

    /// Sets the palm detection confidence needed to start tracking a hand.
    pub fn min_detection_confidence(mut self, confidence: f32) -> Self {
        self.min_detection_confidence = confidence;
        self
    }

    /// Sets the landmark presence score below which a tracked hand is dropped.
    pub fn min_tracking_confidence(mut self, confidence: f32) -> Self {
        self.min_tracking_confidence = confidence;
        self
    }

    pub fn model_complexity(mut self, complexity: ModelComplexity) -> Self {
        self.model_complexity = complexity;
        self
    }
}

/// Relative padding added around the landmarks when following a hand to the next frame.
const ROI_PADDING: f32 = 0.5;

/// Detections whose RoI overlaps a tracked one at least this much are considered duplicates.
const DUPLICATE_IOU: f32 = 0.3;

/// Finds palms in a whole frame. This is the first stage of [`Hands`].
pub trait PalmStage {
    /// Returns the palms found in `image`, in `image` coordinates.
    fn detect_palms(&mut self, image: &ImageView<'_>) -> anyhow::Result<&[Detection]>;
}

impl PalmStage for Detector {
    fn detect_palms(&mut self, image: &ImageView<'_>) -> anyhow::Result<&[Detection]> {
        self.detect(image)
    }
}

/// Estimates the landmarks of the hand inside a region of interest. This is the second stage of
/// [`Hands`].
pub trait LandmarkStage {
    /// Looks for a hand inside `roi`.
    ///
    /// Returns the hand's landmarks normalized to `image`, and the RoI to look for it in the next
    /// frame. Returns `None` if there is no hand in `roi`.
    fn track_hand(
        &mut self,
        image: &ImageView<'_>,
        roi: RotatedRect,
    ) -> anyhow::Result<Option<(HandLandmarks, RotatedRect)>>;
}

impl LandmarkStage for LandmarkTracker<LandmarkResult> {
    fn track_hand(
        &mut self,
        image: &ImageView<'_>,
        roi: RotatedRect,
    ) -> anyhow::Result<Option<(HandLandmarks, RotatedRect)>> {
        self.set_roi(roi);
        let hand = match self.track(image)? {
            Some(result) => normalize(result.estimate(), image.resolution()),
            None => return Ok(None),
        };
        Ok(self.roi().map(|next| (hand, *next)))
    }
}

/// Palm detection followed by landmark tracking.
///
/// The palm detector only runs while fewer than `max_num_hands` hands are tracked. Each tracked
/// hand keeps its own region of interest that follows it from frame to frame.
pub struct Hands<P = Detector, L = LandmarkTracker<LandmarkResult>> {
    options: HandsOptions,
    palms: P,
    landmarks: L,
    rois: Vec<RotatedRect>,
}

impl Hands {
    /// Loads the palm detection and hand landmark networks.
    pub fn new(options: HandsOptions) -> anyhow::Result<Self> {
        let mut detector = Detector::new(PalmNetwork::load(options.model_complexity)?);
        detector.set_threshold(options.min_detection_confidence);

        let network = LandmarkNetwork::load(options.model_complexity)?;
        let mut tracker = LandmarkTracker::new(Estimator::new(network))?;
        tracker.set_loss_threshold(options.min_tracking_confidence);
        tracker.set_roi_padding(ROI_PADDING);
        log::debug!("hand model ready: {:?}", options);

        Ok(Self::with_stages(options, detector, tracker))
    }

    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        self.palms.timers().chain(self.landmarks.timers())
    }
}

impl<P: PalmStage, L: LandmarkStage> Hands<P, L> {
    /// Assembles the pipeline from its two stages.
    ///
    /// The confidence thresholds in `options` are not applied to the stages; they have to be
    /// configured already.
    pub fn with_stages(options: HandsOptions, palms: P, landmarks: L) -> Self {
        Self {
            options,
            palms,
            landmarks,
            rois: Vec::new(),
        }
    }

    /// Returns the number of hands that will be followed into the next frame.
    pub fn num_tracked(&self) -> usize {
        self.rois.len()
    }
}

impl<P: PalmStage, L: LandmarkStage> HandModel for Hands<P, L> {
    fn process(&mut self, image: &ImageView<'_>) -> anyhow::Result<HandResults> {
        let mut hands = Vec::new();

        let mut index = 0;
        while index < self.rois.len() {
            match self.landmarks.track_hand(image, self.rois[index])? {
                Some((hand, next)) => {
                    hands.push(hand);
                    self.rois[index] = next;
                    index += 1;
                }
                None => {
                    log::trace!("lost track of hand {index}");
                    self.rois.remove(index);
                }
            }
        }

        if self.rois.len() >= self.options.max_num_hands {
            return Ok(hands.into());
        }

        for det in self.palms.detect_palms(image)? {
            if self.rois.len() >= self.options.max_num_hands {
                break;
            }

            let roi = palm_to_hand_roi(det);
            let bounds = roi.bounding_rect();
            let duplicate = self
                .rois
                .iter()
                .any(|tracked| tracked.bounding_rect().iou(&bounds) >= DUPLICATE_IOU);
            if duplicate {
                continue;
            }

            if let Some((hand, next)) = self.landmarks.track_hand(image, roi)? {
                log::debug!("tracking new hand at {:?}", bounds);
                hands.push(hand);
                self.rois.push(next);
            }
        }

        Ok(hands.into())
    }
}

/// Derives the region of interest of the whole hand from a palm detection.
///
/// The palm box is moved towards the fingers by half its height, squared, and enlarged so that
/// the stretched-out fingers fit in.
fn palm_to_hand_roi(det: &Detection) -> RotatedRect {
    const SCALE: f32 = 2.6;
    const SHIFT_Y: f32 = -0.5;

    let rect = det.bounding_rect();
    let angle = det.angle();
    let (xc, yc) = rect.center();
    let shift = Rotation2::new(angle) * Vector2::new(0.0, SHIFT_Y * rect.height());
    let size = rect.width().max(rect.height()) * SCALE;

    RotatedRect::new(
        Rect::from_center(xc + shift.x, yc + shift.y, size, size),
        angle,
    )
}

fn normalize(estimate: &LandmarkResult, res: Resolution) -> HandLandmarks {
    let (w, h) = (res.width() as f32, res.height() as f32);
    let landmarks = estimate
        .landmarks()
        .iter()
        .map(|lm| NormalizedLandmark::new(lm.x() / w, lm.y() / h, lm.z() / w))
        .collect();

    HandLandmarks::new(landmarks, estimate.handedness(), estimate.presence())
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use approx::assert_abs_diff_eq;

    use crate::image::{AsImageView, Image};

    use super::*;

    #[test]
    fn default_options() {
        let options = HandsOptions::default();
        assert_eq!(options.max_num_hands, 1);
        assert_eq!(options.min_detection_confidence, 0.85);
        assert_eq!(options.min_tracking_confidence, 0.65);
        assert_eq!(options.model_complexity, ModelComplexity::Full);

        let options = options
            .max_num_hands(2)
            .model_complexity(ModelComplexity::Lite);
        assert_eq!(options.max_num_hands, 2);
        assert_eq!(options.model_complexity, ModelComplexity::Lite);
    }

    #[test]
    fn upright_palm_roi() {
        let det = Detection::new(0.9, Rect::from_center(100.0, 100.0, 20.0, 10.0));
        let roi = palm_to_hand_roi(&det);
        assert_eq!(roi.rotation_radians(), 0.0);
        let (xc, yc) = roi.center();
        assert_abs_diff_eq!(xc, 100.0);
        assert_abs_diff_eq!(yc, 95.0);
        assert_abs_diff_eq!(roi.rect().width(), 52.0, epsilon = 1e-4);
        assert_abs_diff_eq!(roi.rect().height(), 52.0, epsilon = 1e-4);
    }

    #[test]
    fn rotated_palm_roi() {
        let mut det = Detection::new(0.9, Rect::from_center(0.0, 0.0, 10.0, 10.0));
        det.set_angle(FRAC_PI_2);
        let roi = palm_to_hand_roi(&det);
        assert_eq!(roi.rotation_radians(), FRAC_PI_2);
        // Rotating (0, -5) by 90° moves the center to the right.
        let (xc, yc) = roi.center();
        assert_abs_diff_eq!(xc, 5.0, epsilon = 1e-5);
        assert_abs_diff_eq!(yc, 0.0, epsilon = 1e-5);
    }

    /// Reports a fixed list of palms.
    #[derive(Default)]
    struct FakePalms {
        palms: Vec<Detection>,
        calls: usize,
    }

    impl FakePalms {
        fn at(centers: &[(f32, f32)]) -> Self {
            let palms = centers
                .iter()
                .map(|&(x, y)| Detection::new(0.9, Rect::from_center(x, y, 10.0, 10.0)))
                .collect();
            Self { palms, calls: 0 }
        }
    }

    impl PalmStage for FakePalms {
        fn detect_palms(&mut self, _image: &ImageView<'_>) -> anyhow::Result<&[Detection]> {
            self.calls += 1;
            Ok(&self.palms)
        }
    }

    /// Finds a hand in a RoI if one of `hands` lies inside of it, and keeps the RoI unchanged.
    #[derive(Default)]
    struct FakeLandmarks {
        hands: Vec<(f32, f32)>,
        calls: usize,
    }

    impl LandmarkStage for FakeLandmarks {
        fn track_hand(
            &mut self,
            image: &ImageView<'_>,
            roi: RotatedRect,
        ) -> anyhow::Result<Option<(HandLandmarks, RotatedRect)>> {
            self.calls += 1;
            let (w, h) = (image.width() as f32, image.height() as f32);
            let found = self.hands.iter().find(|&&(x, y)| roi.contains_point(x, y));
            Ok(found.map(|&(x, y)| {
                let landmarks = vec![NormalizedLandmark::new(x / w, y / h, 0.0)];
                (HandLandmarks::new(landmarks, Handedness::Right, 0.9), roi)
            }))
        }
    }

    const A: (f32, f32) = (20.0, 50.0);
    const B: (f32, f32) = (50.0, 50.0);
    const C: (f32, f32) = (80.0, 50.0);

    fn hands(
        max_num_hands: usize,
        palms: &[(f32, f32)],
        present: &[(f32, f32)],
    ) -> Hands<FakePalms, FakeLandmarks> {
        let landmarks = FakeLandmarks {
            hands: present.to_vec(),
            calls: 0,
        };
        Hands::with_stages(
            HandsOptions::default().max_num_hands(max_num_hands),
            FakePalms::at(palms),
            landmarks,
        )
    }

    fn xs(results: &HandResults) -> Vec<f32> {
        results
            .iter()
            .map(|hand| (hand.landmarks()[0].x * 100.0).round())
            .collect()
    }

    #[test]
    fn caps_number_of_hands() {
        let image = Image::new(100, 100);
        let mut model = hands(1, &[A, B], &[A, B]);

        let results = model.process(&image.as_view()).unwrap();
        assert_eq!(xs(&results), [20.0]);
        assert_eq!(model.num_tracked(), 1);

        // With the maximum reached, the palm detector does not run.
        let results = model.process(&image.as_view()).unwrap();
        assert_eq!(xs(&results), [20.0]);
        assert_eq!(model.palms.calls, 1);
    }

    #[test]
    fn skips_palms_of_tracked_hands() {
        let image = Image::new(100, 100);
        let mut model = hands(2, &[A, (A.0 + 2.0, A.1)], &[A]);

        let results = model.process(&image.as_view()).unwrap();
        assert_eq!(xs(&results), [20.0]);
        assert_eq!(model.num_tracked(), 1);
        assert_eq!(model.landmarks.calls, 1);

        // The tracked hand is followed, and the detections of it are ignored.
        let results = model.process(&image.as_view()).unwrap();
        assert_eq!(xs(&results), [20.0]);
        assert_eq!(model.num_tracked(), 1);
        assert_eq!(model.palms.calls, 2);
        assert_eq!(model.landmarks.calls, 2);
    }

    #[test]
    fn palm_without_hand_is_not_tracked() {
        let image = Image::new(100, 100);
        let mut model = hands(1, &[A], &[]);
        assert!(model.process(&image.as_view()).unwrap().is_empty());
        assert_eq!(model.num_tracked(), 0);
    }

    #[test]
    fn redetects_lost_hand_in_same_frame() {
        let image = Image::new(100, 100);
        let mut model = hands(1, &[A], &[A]);
        assert_eq!(xs(&model.process(&image.as_view()).unwrap()), [20.0]);

        // The hand jumps out of its RoI.
        model.landmarks.hands = vec![C];
        model.palms = FakePalms::at(&[C]);
        let results = model.process(&image.as_view()).unwrap();
        assert_eq!(xs(&results), [80.0]);
        assert_eq!(model.num_tracked(), 1);
        assert_eq!(model.palms.calls, 1);
    }

    #[test]
    fn drops_only_lost_hands() {
        let image = Image::new(100, 100);
        let mut model = hands(3, &[A, B, C], &[A, B, C]);
        assert_eq!(xs(&model.process(&image.as_view()).unwrap()), [20.0, 50.0, 80.0]);

        model.landmarks.hands = vec![A, C];
        model.palms = FakePalms::default();
        let results = model.process(&image.as_view()).unwrap();
        assert_eq!(xs(&results), [20.0, 80.0]);
        assert_eq!(model.num_tracked(), 2);

        model.landmarks.hands.clear();
        assert!(model.process(&image.as_view()).unwrap().is_empty());
        assert_eq!(model.num_tracked(), 0);
    }

    #[test]
    fn results() {
        let hand = HandLandmarks::new(
            vec![NormalizedLandmark::new(0.5, 0.5, 0.0)],
            Handedness::Left,
            0.7,
        );
        let results = HandResults::from(vec![hand.clone()]);
        assert_eq!(results.len(), 1);
        assert!(!results.is_empty());
        assert_eq!(results.get(0), Some(&hand));
        assert_eq!(results.get(1), None);
        assert!(HandResults::default().is_empty());
    }
}
