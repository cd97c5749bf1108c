//! Neural network inference, backed by `tract`.

pub mod tensor;

use std::{
    borrow::Cow,
    ops::{Index, RangeInclusive},
    path::Path,
    sync::Arc,
};

use anyhow::{bail, Context};
use tract_onnx::prelude::{
    tvec, Framework, Graph, InferenceModelExt, SimplePlan, TValue, TVec, TypedFact, TypedOp,
};

use crate::image::{AsImageView, Color, ImageView, Resolution};
use tensor::Tensor;

type Model = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// A convolutional neural network (CNN) that operates on image data.
///
/// Like the underlying [`NeuralNetwork`], this is a cheaply [`Clone`]able handle.
#[derive(Clone)]
pub struct Cnn {
    nn: NeuralNetwork,
    input_res: Resolution,
    image_map: Arc<dyn Fn(ImageView<'_>) -> Tensor + Send + Sync>,
}

impl Cnn {
    /// Creates a CNN wrapper from a [`NeuralNetwork`].
    ///
    /// The network must have exactly one input, with a shape that matches `shape`.
    pub fn new(
        nn: NeuralNetwork,
        shape: CnnInputShape,
        color_mapper: ColorMapper,
    ) -> anyhow::Result<Self> {
        let input_res = Self::get_input_res(&nn, shape)?;
        let (h, w) = (input_res.height() as usize, input_res.width() as usize);

        // Nearest-neighbor sampling of the pixel under the center of each tensor cell.
        fn sample(view: &ImageView<'_>, x: usize, y: usize, w: usize, h: usize) -> Color {
            let u = (x as f32 + 0.5) / w as f32;
            let v = (y as f32 + 0.5) / h as f32;
            view.get(
                (u * view.width() as f32) as u32,
                (v * view.height() as f32) as u32,
            )
        }

        let image_map: Arc<dyn Fn(ImageView<'_>) -> Tensor + Send + Sync> = match shape {
            CnnInputShape::NCHW => Arc::new(move |view: ImageView<'_>| {
                Tensor::from_array_shape_fn([1, 3, h, w], |[_, c, y, x]| {
                    color_mapper.map(sample(&view, x, y, w, h))[c]
                })
            }),
            CnnInputShape::NHWC => Arc::new(move |view: ImageView<'_>| {
                Tensor::from_array_shape_fn([1, h, w, 3], |[_, y, x, c]| {
                    color_mapper.map(sample(&view, x, y, w, h))[c]
                })
            }),
        };

        Ok(Self {
            nn,
            input_res,
            image_map,
        })
    }

    fn get_input_res(nn: &NeuralNetwork, shape: CnnInputShape) -> anyhow::Result<Resolution> {
        let inputs = nn.inputs()?;
        let [input] = &inputs[..] else {
            bail!(
                "CNN network has to take exactly 1 input, this one takes {}",
                inputs.len(),
            );
        };

        let (w, h) = match (shape, input.shape()) {
            (CnnInputShape::NCHW, [1, 3, h, w]) | (CnnInputShape::NHWC, [1, h, w, 3]) => (*w, *h),
            (_, tensor_shape) => {
                bail!("invalid model input shape for {shape:?} CNN: {tensor_shape:?}");
            }
        };

        Ok(Resolution::new(w.try_into()?, h.try_into()?))
    }

    /// Returns the expected input image size.
    #[inline]
    pub fn input_resolution(&self) -> Resolution {
        self.input_res
    }

    /// Runs the network on an input image, returning the estimated outputs.
    ///
    /// The image is sampled to the network's input resolution, and stretched if its aspect ratio
    /// differs.
    pub fn estimate<V: AsImageView>(&self, image: &V) -> anyhow::Result<Outputs> {
        let tensor = (self.image_map)(image.as_view());
        self.nn.estimate(&Inputs::from(tensor))
    }
}

/// Maps 8-bit sRGB colors to the value range a network was trained with.
#[derive(Debug, Clone)]
pub struct ColorMapper {
    target_range: RangeInclusive<f32>,
}

impl ColorMapper {
    /// Uniformly maps each channel's `0..=255` to `target_range`.
    pub fn linear(target_range: RangeInclusive<f32>) -> Self {
        assert!(
            target_range.end() > target_range.start(),
            "empty color range {target_range:?}"
        );
        Self { target_range }
    }

    fn map(&self, color: Color) -> [f32; 3] {
        let start = *self.target_range.start();
        let scale = (*self.target_range.end() - start) / 255.0;
        [color.r(), color.g(), color.b()].map(|c| f32::from(c) * scale + start)
    }
}

/// Describes in what order a CNN expects its input image data.
///
/// `N` is the number of images (always 1 here), `C` the number of color channels, `H` and `W` the
/// height and width of the input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CnnInputShape {
    /// Shape is `[N, C, H, W]`.
    NCHW,
    /// Shape is `[N, H, W, C]`.
    NHWC,
}

/// Neural network loader, returned by [`NeuralNetwork::from_path`] and
/// [`NeuralNetwork::from_onnx`].
pub struct Loader<'a> {
    model_data: Cow<'a, [u8]>,
}

impl Loader<'_> {
    /// Loads and optimizes the network.
    ///
    /// Returns an error if the network data is malformed or incomplete, or if the network uses
    /// operations `tract` does not implement.
    pub fn load(self) -> anyhow::Result<NeuralNetwork> {
        let model = tract_onnx::onnx()
            .model_for_read(&mut &*self.model_data)?
            .into_optimized()?
            .into_runnable()?;

        Ok(NeuralNetwork(Arc::new(model)))
    }
}

/// A neural network that can be used for inference.
///
/// This is a cheaply [`Clone`]able handle to the optimized model.
#[derive(Clone)]
pub struct NeuralNetwork(Arc<Model>);

impl NeuralNetwork {
    /// Reads a pre-trained model from an ONNX file.
    ///
    /// The path must have an `.onnx` extension.
    pub fn from_path<'a, P: AsRef<Path>>(path: P) -> anyhow::Result<Loader<'a>> {
        let path = path.as_ref();
        match path.extension() {
            Some(ext) if ext == "onnx" => {}
            _ => bail!(
                "neural network file '{}' must have `.onnx` extension",
                path.display()
            ),
        }

        let model_data = std::fs::read(path)
            .with_context(|| format!("failed to read model '{}'", path.display()))?;
        Ok(Loader {
            model_data: model_data.into(),
        })
    }

    /// Reads a pre-trained model from an in-memory ONNX file.
    pub fn from_onnx(raw: &[u8]) -> Loader<'_> {
        Loader {
            model_data: raw.into(),
        }
    }

    /// Returns the shape and name of every input node.
    ///
    /// To perform inference, a matching tensor has to be provided for each input.
    pub fn inputs(&self) -> anyhow::Result<Vec<NodeInfo<'_>>> {
        let model = self.0.model();
        (0..model.inputs.len())
            .map(|id| {
                let node = model.input_outlets()?[id].node;
                NodeInfo::new(model.input_fact(id)?, &model.node(node).name)
            })
            .collect()
    }

    /// Returns the shape and name of every output node.
    pub fn outputs(&self) -> anyhow::Result<Vec<NodeInfo<'_>>> {
        let model = self.0.model();
        (0..model.outputs.len())
            .map(|id| {
                let node = model.output_outlets()?[id].node;
                NodeInfo::new(model.output_fact(id)?, &model.node(node).name)
            })
            .collect()
    }

    /// Runs the network on a set of [`Inputs`], returning the estimated [`Outputs`].
    #[doc(alias = "infer")]
    pub fn estimate(&self, inputs: &Inputs) -> anyhow::Result<Outputs> {
        let inputs = inputs
            .inner
            .iter()
            .map(|t| Ok(TValue::from_const(Arc::new(t.to_tract()?))))
            .collect::<anyhow::Result<TVec<_>>>()?;
        let outputs = self.0.run(inputs)?;
        let inner = outputs
            .iter()
            .map(|tract| Tensor::from_tract(tract))
            .collect::<anyhow::Result<_>>()?;
        Ok(Outputs { inner })
    }
}

/// Shape and name of a network input or output.
#[derive(Debug)]
pub struct NodeInfo<'a> {
    shape: &'a [usize],
    name: &'a str,
}

impl<'a> NodeInfo<'a> {
    fn new(fact: &'a TypedFact, name: &'a str) -> anyhow::Result<Self> {
        match fact.shape.as_concrete() {
            Some(shape) => Ok(Self { shape, name }),
            None => bail!("network node '{name}' has a symbolic shape"),
        }
    }

    #[inline]
    pub fn shape(&self) -> &[usize] {
        self.shape
    }

    #[inline]
    pub fn name(&self) -> &str {
        self.name
    }
}

/// The tensors produced by one inference pass, in network output order.
#[derive(Debug)]
pub struct Outputs {
    inner: TVec<Tensor>,
}

impl Outputs {
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tensor> {
        self.inner.iter()
    }
}

impl Index<usize> for Outputs {
    type Output = Tensor;

    fn index(&self, index: usize) -> &Tensor {
        &self.inner[index]
    }
}

impl FromIterator<Tensor> for Outputs {
    fn from_iter<T: IntoIterator<Item = Tensor>>(iter: T) -> Self {
        Self {
            inner: iter.into_iter().collect(),
        }
    }
}

/// Input tensors for an inference pass, one per network input.
#[derive(Debug)]
pub struct Inputs {
    inner: TVec<Tensor>,
}

impl From<Tensor> for Inputs {
    fn from(t: Tensor) -> Self {
        Self { inner: tvec![t] }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_mapper() {
        let mapper = ColorMapper::linear(-1.0..=1.0);
        assert_eq!(mapper.map(Color::BLACK), [-1.0, -1.0, -1.0]);
        assert_eq!(mapper.map(Color::WHITE), [1.0, 1.0, 1.0]);

        let mapper = ColorMapper::linear(0.0..=1.0);
        assert_eq!(mapper.map(Color::from_rgb8(0, 255, 0)), [0.0, 1.0, 0.0]);
    }

    #[test]
    fn outputs_from_tensors() {
        let outputs: Outputs = [Tensor::from([1.0, 2.0]), Tensor::from(3.0)]
            .into_iter()
            .collect();
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].as_slice(), [1.0, 2.0]);
        assert_eq!(outputs[1].as_singular(), 3.0);
    }

    #[test]
    fn rejects_non_onnx_paths() {
        assert!(NeuralNetwork::from_path("model.tflite").is_err());
        assert!(NeuralNetwork::from_path("does/not/exist.onnx").is_err());
    }

    #[test]
    fn rejects_garbage_models() {
        assert!(NeuralNetwork::from_onnx(b"not a model").load().is_err());
    }
}
