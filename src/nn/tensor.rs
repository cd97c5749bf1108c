//! N-dimensional `f32` arrays passed into and out of the networks.

use std::fmt;

use tinyvec::TinyVec;

use crate::iter::zip_exact;

/// Shape and row-major strides of a tensor.
#[derive(Clone)]
struct Layout {
    shape: TinyVec<[usize; 4]>,
    strides: TinyVec<[usize; 4]>,
}

impl Layout {
    fn from_shape(shape: &[usize]) -> Self {
        let mut strides: TinyVec<[usize; 4]> = shape.iter().map(|_| 0).collect();
        let mut stride = 1;
        for (out, &size) in zip_exact(strides.iter_mut().rev(), shape.iter().rev()) {
            *out = stride;
            stride *= size;
        }

        Self {
            shape: shape.iter().copied().collect(),
            strides,
        }
    }

    fn elements(&self) -> usize {
        self.shape.iter().product()
    }

    fn remove_prefix(&self, num: usize) -> Layout {
        Layout {
            shape: self.shape[num..].iter().copied().collect(),
            strides: self.strides[num..].iter().copied().collect(),
        }
    }
}

/// Calls `f` with every index into `shape`, in row-major order.
fn for_each_index<const N: usize>(shape: [usize; N], mut f: impl FnMut([usize; N])) {
    if shape.iter().any(|&size| size == 0) {
        return;
    }

    let mut index = [0; N];
    loop {
        f(index);

        // Increment the last dimension, carrying into the ones before it.
        let mut dim = N;
        loop {
            if dim == 0 {
                return;
            }
            dim -= 1;
            index[dim] += 1;
            if index[dim] < shape[dim] {
                break;
            }
            index[dim] = 0;
        }
    }
}

/// A dynamically sized tensor of `f32`s.
///
/// [`Tensor::index`] borrows a [`TensorView`] of a suffix of the dimensions. The data of
/// 1-dimensional tensors and views is accessed with `as_slice`, and that of 0-dimensional ones with
/// `as_singular`.
#[derive(Clone)]
pub struct Tensor {
    layout: Layout,
    data: Box<[f32]>,
}

/// A borrowed view into a [`Tensor`].
#[derive(Clone)]
pub struct TensorView<'a> {
    layout: Layout,
    data: &'a [f32],
}

impl Tensor {
    /// Creates a tensor of the given shape by calling `f` with the index of each element.
    ///
    /// Elements are visited in row-major order, starting at `[0, ..., 0, 0]`, then
    /// `[0, ..., 0, 1]` and so on.
    pub fn from_array_shape_fn<const N: usize, F: FnMut([usize; N]) -> f32>(
        shape: [usize; N],
        mut f: F,
    ) -> Self {
        let mut data = Vec::with_capacity(shape.iter().product());
        for_each_index(shape, |index| data.push(f(index)));
        Self {
            layout: Layout::from_shape(&shape),
            data: data.into_boxed_slice(),
        }
    }

    /// Creates a tensor of the given shape from row-major elements.
    ///
    /// # Panics
    ///
    /// `iter` must yield exactly as many elements as `shape` describes.
    pub fn from_iter<I: IntoIterator<Item = f32>>(shape: &[usize], iter: I) -> Self {
        let layout = Layout::from_shape(shape);
        let data: Box<[f32]> = iter.into_iter().collect();
        assert_eq!(
            data.len(),
            layout.elements(),
            "element count does not match tensor shape {shape:?}"
        );
        Self { layout, data }
    }

    pub(super) fn from_tract(tract: &tract_onnx::prelude::Tensor) -> anyhow::Result<Self> {
        let data = tract.as_slice::<f32>()?;
        Ok(Self {
            layout: Layout::from_shape(tract.shape()),
            data: data.into(),
        })
    }

    pub(super) fn to_tract(&self) -> anyhow::Result<tract_onnx::prelude::Tensor> {
        Ok(tract_onnx::prelude::Tensor::from_shape(
            self.shape(),
            &self.data,
        )?)
    }

    /// Returns the number of entries in each dimension.
    pub fn shape(&self) -> &[usize] {
        &self.layout.shape
    }

    /// Returns the number of dimensions.
    pub fn rank(&self) -> usize {
        self.shape().len()
    }

    /// Indexes a prefix of the tensor's dimensions with `indices`.
    ///
    /// Indexing a tensor of shape `[2, 3, 4, 5]` with `[a, b]` returns a view of shape `[4, 5]`.
    /// Indexing with `[]` returns a view of the whole tensor.
    ///
    /// # Panics
    ///
    /// Panics if `indices` has more entries than `self` has dimensions, or if any index is out of
    /// bounds.
    #[track_caller]
    pub fn index<const N: usize>(&self, indices: [usize; N]) -> TensorView<'_> {
        self.view().index(indices)
    }

    /// Iterates over the outermost dimension.
    ///
    /// # Panics
    ///
    /// `self` must have at least one dimension.
    #[track_caller]
    pub fn iter(&self) -> impl Iterator<Item = TensorView<'_>> {
        assert!(self.rank() > 0, "attempted to iterate over 0-dimensional tensor");
        (0..self.shape()[0]).map(|index| self.index([index]))
    }

    /// Returns the values of a 1-dimensional tensor.
    ///
    /// # Panics
    ///
    /// `self` must have exactly 1 dimension.
    #[track_caller]
    pub fn as_slice(&self) -> &[f32] {
        assert_eq!(
            self.rank(),
            1,
            "attempted to access tensor of shape {:?} as slice",
            self.shape()
        );
        &self.data
    }

    /// Returns the value of a 0-dimensional tensor.
    ///
    /// # Panics
    ///
    /// `self` must have exactly 0 dimensions.
    #[track_caller]
    pub fn as_singular(&self) -> f32 {
        assert_eq!(
            self.rank(),
            0,
            "attempted to access tensor of shape {:?} as singular element",
            self.shape(),
        );
        self.data[0]
    }

    fn view(&self) -> TensorView<'_> {
        TensorView {
            layout: self.layout.clone(),
            data: &self.data,
        }
    }
}

impl From<f32> for Tensor {
    fn from(value: f32) -> Self {
        Tensor::from_array_shape_fn([], |[]| value)
    }
}

impl<const N: usize> From<[f32; N]> for Tensor {
    fn from(arr: [f32; N]) -> Self {
        Tensor::from_array_shape_fn([N], |[i]| arr[i])
    }
}

impl<'d> TensorView<'d> {
    pub fn shape(&self) -> &[usize] {
        &self.layout.shape
    }

    pub fn rank(&self) -> usize {
        self.shape().len()
    }

    /// Indexes a prefix of the view's dimensions with `indices`.
    ///
    /// # Panics
    ///
    /// Panics if `indices` has more entries than `self` has dimensions, or if any index is out of
    /// bounds.
    #[track_caller]
    pub fn index<const N: usize>(&self, indices: [usize; N]) -> TensorView<'d> {
        assert!(
            N <= self.rank(),
            "attempted to index tensor of shape {:?} with {:?}",
            self.shape(),
            indices
        );

        let mut data = self.data;
        let dims = self.layout.shape.iter().zip(self.layout.strides.iter());
        for ((&length, &stride), index) in dims.zip(indices) {
            assert!(
                index < length,
                "attempted to index tensor of shape {:?} with {:?}",
                self.shape(),
                indices
            );
            data = &data[index * stride..(index + 1) * stride];
        }
        TensorView {
            layout: self.layout.remove_prefix(N),
            data,
        }
    }

    /// Iterates over the outermost dimension.
    #[track_caller]
    pub fn iter(&self) -> impl Iterator<Item = TensorView<'d>> + '_ {
        assert!(self.rank() > 0, "attempted to iterate over 0-dimensional tensor view");
        (0..self.shape()[0]).map(|index| self.index([index]))
    }

    #[track_caller]
    pub fn as_slice(&self) -> &'d [f32] {
        assert_eq!(
            self.rank(),
            1,
            "attempted to access tensor view of shape {:?} as slice",
            self.shape()
        );
        self.data
    }

    #[track_caller]
    pub fn as_singular(&self) -> f32 {
        assert_eq!(
            self.rank(),
            0,
            "attempted to access view of shape {:?} as singular element",
            self.shape(),
        );
        self.data[0]
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("shape", &self.shape())
            .finish()
    }
}

impl fmt::Debug for TensorView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TensorView")
            .field("shape", &self.shape())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visits_indices_in_order() {
        let expected = [
            [0, 0, 0],
            [0, 0, 1],
            [0, 0, 2],
            [0, 1, 0],
            [0, 1, 1],
            [0, 1, 2],
        ];

        let mut iter = expected.into_iter();
        let tensor = Tensor::from_array_shape_fn([1, 2, 3], |index| {
            assert_eq!(iter.next(), Some(index));
            0.0
        });
        assert_eq!(iter.next(), None);
        assert_eq!(tensor.rank(), 3);
        assert_eq!(tensor.shape(), &[1, 2, 3]);
    }

    #[test]
    fn empty() {
        let tensor = Tensor::from_array_shape_fn([1, 2, 0, 3], |idx| unreachable!("{idx:?}"));
        assert_eq!(tensor.shape(), &[1, 2, 0, 3]);
        assert_eq!(tensor.iter().count(), 1);

        let view = tensor.index([0, 1]);
        assert_eq!(view.shape(), &[0, 3]);
        assert_eq!(view.iter().count(), 0);
    }

    #[test]
    fn singular() {
        let mut hits = 0;
        let tensor = Tensor::from_array_shape_fn([], |[]| {
            hits += 1;
            1.0
        });
        assert_eq!(hits, 1);
        assert_eq!(tensor.rank(), 0);
        assert_eq!(tensor.as_singular(), 1.0);
        assert_eq!(Tensor::from(0.25).index([]).as_singular(), 0.25);
    }

    #[test]
    fn index_2d_elems() {
        let iter = [[0.0, 1.0], [2.0, 3.0]].into_iter().flatten();
        let tensor = Tensor::from_iter(&[2, 2], iter);
        assert_eq!(tensor.shape(), [2, 2]);

        assert_eq!(tensor.index([0]).as_slice(), [0.0, 1.0]);
        assert_eq!(tensor.index([1]).as_slice(), [2.0, 3.0]);
        assert_eq!(tensor.index([1, 1]).as_singular(), 3.0);
        assert_eq!(tensor.index([1]).index([0]).as_singular(), 2.0);
    }

    #[test]
    fn landmark_rows() {
        // Shape of the landmark network's coordinate output, one row per landmark.
        let tensor = Tensor::from_iter(&[1, 21, 3], (0..63).map(|i| i as f32));
        let rows = tensor.index([0]);
        assert_eq!(rows.iter().count(), 21);
        assert_eq!(rows.index([20]).as_slice(), [60.0, 61.0, 62.0]);
        assert_eq!(Tensor::from([4.0, 5.0]).as_slice(), [4.0, 5.0]);
    }

    #[test]
    #[should_panic]
    fn index_out_of_bounds() {
        Tensor::from([1.0, 2.0]).index([2]);
    }

    #[test]
    #[should_panic]
    fn wrong_element_count() {
        Tensor::from_iter(&[2, 2], [1.0, 2.0, 3.0]);
    }
}
