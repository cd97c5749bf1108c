//! Palm detection.

use std::sync::OnceLock;

use anyhow::{bail, Context};
use nalgebra::{Point2, Rotation2, Vector2};

use crate::config;
use crate::detection::{
    ssd::{Anchor, Anchors, LayerInfo},
    Detection, Keypoint, Network,
};
use crate::image::{Rect, Resolution};
use crate::nn::{Cnn, CnnInputShape, ColorMapper, NeuralNetwork, Outputs};
use crate::num::sigmoid;

use super::model::ModelComplexity;

/// A keypoint of a palm [`Detection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PalmKeypoint {
    Wrist = 0,
    IndexFingerMcp = 1,
    MiddleFingerMcp = 2,
    RingFingerMcp = 3,
    PinkyMcp = 4,
    ThumbCmc = 5,
    ThumbMcp = 6,
}

const NUM_KEYPOINTS: usize = 7;
const NUM_BOX_PARAMS: usize = 4 + NUM_KEYPOINTS * 2;

const LAYERS: &[LayerInfo] = &[LayerInfo::new(2, 24, 24), LayerInfo::new(6, 12, 12)];

fn anchors() -> &'static Anchors {
    static ANCHORS: OnceLock<Anchors> = OnceLock::new();
    ANCHORS.get_or_init(|| Anchors::calculate(LAYERS))
}

/// The palm detection network.
///
/// Even the [`ModelComplexity::Lite`] variant is heavy: CPU inference takes several times as long
/// as for the landmark network.
pub struct PalmNetwork {
    cnn: Cnn,
}

impl PalmNetwork {
    /// Loads the network from the configured model directory.
    pub fn load(complexity: ModelComplexity) -> anyhow::Result<Self> {
        let file = match complexity {
            ModelComplexity::Lite => "palm_detection_lite.onnx",
            ModelComplexity::Full => "palm_detection_full.onnx",
        };
        let path = config::model_dir().join(file);
        log::debug!("loading palm detection network from '{}'", path.display());

        let nn = NeuralNetwork::from_path(&path)?
            .load()
            .with_context(|| format!("failed to load '{}'", path.display()))?;

        let num_anchors = anchors().anchor_count();
        let outputs = nn.outputs()?;
        match &outputs[..] {
            [boxes, confidences]
                if boxes.shape() == [1, num_anchors, NUM_BOX_PARAMS]
                    && confidences.shape() == [1, num_anchors, 1] => {}
            _ => bail!("unexpected palm detection network outputs: {:?}", outputs),
        }

        Ok(Self {
            cnn: Cnn::new(nn, CnnInputShape::NCHW, ColorMapper::linear(0.0..=1.0))?,
        })
    }
}

impl Network for PalmNetwork {
    fn cnn(&self) -> &Cnn {
        &self.cnn
    }

    fn extract(&self, outputs: &Outputs, threshold: f32, detections: &mut Vec<Detection>) {
        extract_outputs(
            self.cnn.input_resolution(),
            outputs,
            threshold,
            detections,
        );
    }
}

fn extract_outputs(
    input_res: Resolution,
    outputs: &Outputs,
    thresh: f32,
    detections: &mut Vec<Detection>,
) {
    let anchors = anchors();
    let num_anchors = anchors.anchor_count();
    let boxes = &outputs[0];
    let confidences = &outputs[1];

    assert_eq!(boxes.shape(), &[1, num_anchors, NUM_BOX_PARAMS]);
    assert_eq!(confidences.shape(), &[1, num_anchors, 1]);

    for (index, view) in confidences.index([0]).iter().enumerate() {
        let conf = sigmoid(view.as_slice()[0]);
        if conf < thresh {
            continue;
        }

        let box_params = boxes.index([0, index]).as_slice();
        detections.push(extract_detection(
            &anchors[index],
            input_res,
            box_params,
            conf,
        ));
    }
}

fn extract_detection(
    anchor: &Anchor,
    input_res: Resolution,
    box_params: &[f32],
    confidence: f32,
) -> Detection {
    assert_eq!(box_params.len(), NUM_BOX_PARAMS);

    let x_offset = anchor.x_center() * input_res.width() as f32;
    let y_offset = anchor.y_center() * input_res.height() as f32;

    let xc = box_params[0] + x_offset;
    let yc = box_params[1] + y_offset;
    let w = box_params[2];
    let h = box_params[3];
    let keypoints = box_params[4..]
        .chunks_exact(2)
        .map(|xy| Keypoint::new(xy[0] + x_offset, xy[1] + y_offset))
        .collect();

    let mut det = Detection::with_keypoints(confidence, Rect::from_center(xc, yc, w, h), keypoints);
    det.set_angle(palm_angle(det.keypoints()));
    det
}

/// Clockwise rotation of the palm, 0 when the fingers point upwards.
fn palm_angle(keypoints: &[Keypoint]) -> f32 {
    let finger = keypoints[PalmKeypoint::MiddleFingerMcp as usize];
    let wrist = keypoints[PalmKeypoint::Wrist as usize];

    let rel = Point2::new(wrist.x(), wrist.y()) - Point2::new(finger.x(), finger.y());
    Rotation2::rotation_between(&Vector2::y(), &rel).angle()
}

#[cfg(test)]
mod tests {
    use std::f32::consts::PI;

    use approx::assert_abs_diff_eq;

    use crate::nn::tensor::Tensor;

    use super::*;

    #[test]
    fn decodes_box_relative_to_anchor() {
        // A single anchor centered in the input.
        let anchors = Anchors::calculate(&[LayerInfo::new(1, 1, 1)]);
        let input_res = Resolution::new(192, 192);

        let mut params = [0.0; NUM_BOX_PARAMS];
        params[..4].copy_from_slice(&[4.0, -2.0, 30.0, 20.0]);
        // Wrist below the middle finger: upright palm.
        params[4..6].copy_from_slice(&[0.0, 10.0]);
        params[8..10].copy_from_slice(&[0.0, -10.0]);

        let det = extract_detection(&anchors[0], input_res, &params, 0.75);
        assert_eq!(det.confidence(), 0.75);
        let rect = det.bounding_rect();
        assert_eq!(rect.center(), (100.0, 94.0));
        assert_eq!((rect.width(), rect.height()), (30.0, 20.0));
        assert_eq!(det.keypoints().len(), NUM_KEYPOINTS);
        assert_eq!(det.keypoints()[0], Keypoint::new(96.0, 106.0));
        assert_eq!(det.keypoints()[2], Keypoint::new(96.0, 86.0));
        assert_abs_diff_eq!(det.angle(), 0.0);
    }

    #[test]
    fn upside_down_palm() {
        let mut keypoints = vec![Keypoint::new(0.0, 0.0); NUM_KEYPOINTS];
        keypoints[PalmKeypoint::Wrist as usize] = Keypoint::new(5.0, 0.0);
        keypoints[PalmKeypoint::MiddleFingerMcp as usize] = Keypoint::new(5.0, 10.0);
        assert_abs_diff_eq!(palm_angle(&keypoints).abs(), PI, epsilon = 1e-5);
    }

    #[test]
    fn filters_by_confidence() {
        let num_anchors = anchors().anchor_count();
        let mut logits = vec![-10.0; num_anchors];
        logits[5] = 10.0;
        let outputs: Outputs = [
            Tensor::from_iter(
                &[1, num_anchors, NUM_BOX_PARAMS],
                std::iter::repeat(0.0).take(num_anchors * NUM_BOX_PARAMS),
            ),
            Tensor::from_iter(&[1, num_anchors, 1], logits),
        ]
        .into_iter()
        .collect();

        let mut detections = Vec::new();
        extract_outputs(Resolution::new(192, 192), &outputs, 0.5, &mut detections);
        assert_eq!(detections.len(), 1);

        // Anchor 5 is the second box of the third cell of the first row.
        let (xc, yc) = detections[0].bounding_rect().center();
        assert_eq!(xc, 2.5 / 24.0 * 192.0);
        assert_eq!(yc, 0.5 / 24.0 * 192.0);
    }
}
