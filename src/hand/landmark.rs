//! Hand landmark estimation.

use anyhow::{bail, Context};
use nalgebra::{Point2, Rotation2, Vector2};

use crate::config;
use crate::iter::zip_exact;
use crate::landmark::{Confidence, Estimate, Landmarks, Network};
use crate::nn::{Cnn, CnnInputShape, ColorMapper, NeuralNetwork, Outputs};

use super::model::ModelComplexity;

/// Number of landmarks estimated per hand.
pub const NUM_LANDMARKS: usize = 21;

/// Landmark results estimated by a [`LandmarkNetwork`].
#[derive(Debug, Clone)]
pub struct LandmarkResult {
    landmarks: Landmarks,
    presence: f32,
    raw_handedness: f32,
}

impl Default for LandmarkResult {
    fn default() -> Self {
        Self {
            landmarks: Landmarks::new(NUM_LANDMARKS),
            presence: 0.0,
            raw_handedness: 0.0,
        }
    }
}

impl LandmarkResult {
    /// Returns a landmark's position in the input image's coordinate system.
    pub fn landmark_position(&self, index: usize) -> [f32; 3] {
        self.landmarks.positions()[index]
    }

    /// Returns the probability that a hand is in view, in `0.0..=1.0`.
    pub fn presence(&self) -> f32 {
        self.presence
    }

    /// Computes the clockwise rotation of the palm compared to an upright position.
    ///
    /// A rotation of 0° means that the fingers point upwards.
    pub fn rotation_radians(&self) -> f32 {
        let [x, y, _] = self.landmark_position(LandmarkIdx::MiddleFingerMcp as usize);
        let finger = Point2::new(x, y);
        let [x, y, _] = self.landmark_position(LandmarkIdx::Wrist as usize);
        let wrist = Point2::new(x, y);

        let rel = wrist - finger;
        Rotation2::rotation_between(&Vector2::y(), &rel).angle()
    }

    /// Returns the estimated handedness of the hand in the image.
    ///
    /// This assumes that the camera image is passed in as-is (not mirrored).
    pub fn handedness(&self) -> Handedness {
        if self.raw_handedness > 0.5 {
            Handedness::Right
        } else {
            Handedness::Left
        }
    }
}

impl Estimate for LandmarkResult {
    #[inline]
    fn landmarks(&self) -> &Landmarks {
        &self.landmarks
    }

    #[inline]
    fn landmarks_mut(&mut self) -> &mut Landmarks {
        &mut self.landmarks
    }

    fn angle_radians(&self) -> Option<f32> {
        Some(self.rotation_radians())
    }
}

impl Confidence for LandmarkResult {
    #[inline]
    fn confidence(&self) -> f32 {
        self.presence
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handedness {
    Left,
    Right,
}

/// Names for the hand landmarks, in the order the network outputs them.
///
/// - **CMC**: Carpometacarpal joint, the lowest joint of the thumb, near the wrist.
/// - **MCP**: Metacarpophalangeal joint, the knuckles near the palm.
/// - **IP**/**PIP**/**DIP**: the (proximal/distal) interphalangeal joints above it.
/// - **Tip**: the tip of the finger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandmarkIdx {
    Wrist,
    ThumbCmc,
    ThumbMcp,
    ThumbIp,
    ThumbTip,
    IndexFingerMcp,
    IndexFingerPip,
    IndexFingerDip,
    IndexFingerTip,
    MiddleFingerMcp,
    MiddleFingerPip,
    MiddleFingerDip,
    MiddleFingerTip,
    RingFingerMcp,
    RingFingerPip,
    RingFingerDip,
    RingFingerTip,
    PinkyMcp,
    PinkyPip,
    PinkyDip,
    PinkyTip,
}

/// A pair of landmark indices that are connected by a line when drawn.
pub type Connection = (usize, usize);

pub const HAND_PALM_CONNECTIONS: &[Connection] =
    &[(0, 1), (0, 5), (9, 13), (13, 17), (5, 9), (0, 17)];

pub const HAND_THUMB_CONNECTIONS: &[Connection] = &[(1, 2), (2, 3), (3, 4)];

pub const HAND_INDEX_FINGER_CONNECTIONS: &[Connection] = &[(5, 6), (6, 7), (7, 8)];

pub const HAND_MIDDLE_FINGER_CONNECTIONS: &[Connection] = &[(9, 10), (10, 11), (11, 12)];

pub const HAND_RING_FINGER_CONNECTIONS: &[Connection] = &[(13, 14), (14, 15), (15, 16)];

pub const HAND_PINKY_FINGER_CONNECTIONS: &[Connection] = &[(17, 18), (18, 19), (19, 20)];

/// All connections of the hand skeleton.
pub const HAND_CONNECTIONS: &[Connection] = &[
    // Palm:
    (0, 1),
    (0, 5),
    (9, 13),
    (13, 17),
    (5, 9),
    (0, 17),
    // Thumb:
    (1, 2),
    (2, 3),
    (3, 4),
    // Index:
    (5, 6),
    (6, 7),
    (7, 8),
    // Middle:
    (9, 10),
    (10, 11),
    (11, 12),
    // Ring:
    (13, 14),
    (14, 15),
    (15, 16),
    // Pinky:
    (17, 18),
    (18, 19),
    (19, 20),
];

/// The hand landmark network.
///
/// [`ModelComplexity::Lite`] is fairly inaccurate, [`ModelComplexity::Full`] takes about 25-30%
/// longer to infer on CPU.
#[derive(Clone)]
pub struct LandmarkNetwork {
    cnn: Cnn,
}

impl LandmarkNetwork {
    /// Loads the network from the configured model directory.
    pub fn load(complexity: ModelComplexity) -> anyhow::Result<Self> {
        let file = match complexity {
            ModelComplexity::Lite => "hand_landmark_lite.onnx",
            ModelComplexity::Full => "hand_landmark_full.onnx",
        };
        let path = config::model_dir().join(file);
        log::debug!("loading hand landmark network from '{}'", path.display());

        let nn = NeuralNetwork::from_path(&path)?
            .load()
            .with_context(|| format!("failed to load '{}'", path.display()))?;
        check_outputs(&nn)?;

        Ok(Self {
            cnn: Cnn::new(nn, CnnInputShape::NCHW, ColorMapper::linear(0.0..=1.0))?,
        })
    }
}

fn check_outputs(nn: &NeuralNetwork) -> anyhow::Result<()> {
    let outputs = nn.outputs()?;
    let shapes = outputs.iter().map(|out| out.shape()).collect::<Vec<_>>();
    match &shapes[..] {
        [[1, 63], [1, 1], [1, 1], [1, 63]] => Ok(()),
        _ => bail!("unexpected hand landmark network outputs: {:?}", outputs),
    }
}

impl Network for LandmarkNetwork {
    type Output = LandmarkResult;

    fn cnn(&self) -> &Cnn {
        &self.cnn
    }

    fn extract(&self, outputs: &Outputs, estimate: &mut Self::Output) {
        extract(outputs, estimate);
    }
}

fn extract(outputs: &Outputs, estimate: &mut LandmarkResult) {
    let screen_landmarks = &outputs[0];
    let presence_flag = &outputs[1];
    let handedness = &outputs[2];

    assert_eq!(screen_landmarks.shape(), &[1, NUM_LANDMARKS * 3]);
    assert_eq!(presence_flag.shape(), &[1, 1]);
    assert_eq!(handedness.shape(), &[1, 1]);

    estimate.presence = presence_flag.index([0, 0]).as_singular();
    estimate.raw_handedness = handedness.index([0, 0]).as_singular();
    for (coords, out) in zip_exact(
        screen_landmarks.index([0]).as_slice().chunks_exact(3),
        estimate.landmarks.positions_mut(),
    ) {
        out.copy_from_slice(coords);
    }
}
