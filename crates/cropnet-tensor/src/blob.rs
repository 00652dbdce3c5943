use crate::tensor::{Tensor, TensorError};

/// A value tensor paired with its gradient of the same shape.
///
/// This is the unit a graph engine passes between operations: `data` holds the
/// forward activations and `diff` holds the gradient of the loss with respect
/// to them. Both buffers always share the same shape.
///
/// # Examples
///
/// ```rust
/// use cropnet_tensor::Blob;
///
/// let mut blob = Blob::<f32>::zeros(vec![1, 2, 3]);
/// blob.data_mut()[0] = 1.0;
/// blob.reshape(vec![1, 2, 4]);
/// assert_eq!(blob.count(), 8);
/// assert_eq!(blob.diff().len(), 8);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Blob<T> {
    data: Tensor<T>,
    diff: Tensor<T>,
}

impl<T> Blob<T>
where
    T: num_traits::Zero + Clone,
{
    /// Creates a blob with zeroed value and gradient buffers.
    pub fn zeros(shape: Vec<usize>) -> Self {
        Self {
            data: Tensor::zeros(shape.clone()),
            diff: Tensor::zeros(shape),
        }
    }

    /// Creates a blob from a value buffer; the gradient starts at zero.
    ///
    /// # Errors
    ///
    /// If the number of elements in the data does not match the shape, an error is returned.
    pub fn from_shape_vec(shape: Vec<usize>, data: Vec<T>) -> Result<Self, TensorError> {
        let data = Tensor::from_shape_vec(shape.clone(), data)?;
        Ok(Self {
            data,
            diff: Tensor::zeros(shape),
        })
    }

    /// Creates a blob from a value tensor; the gradient starts at zero.
    pub fn from_tensor(data: Tensor<T>) -> Self {
        let diff = Tensor::zeros(data.shape.clone());
        Self { data, diff }
    }

    /// Changes the shape of both buffers.
    ///
    /// Buffers are reallocated only when the element count changes.
    pub fn reshape(&mut self, shape: Vec<usize>) {
        if shape == self.data.shape {
            return;
        }
        self.data.resize(shape.clone(), T::zero());
        self.diff.resize(shape, T::zero());
    }
}

impl<T> Blob<T> {
    /// The extents of the blob.
    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.data.shape
    }

    /// The total number of elements.
    #[inline]
    pub fn count(&self) -> usize {
        self.data.numel()
    }

    /// The value buffer.
    #[inline]
    pub fn data(&self) -> &[T] {
        self.data.as_slice()
    }

    /// The mutable value buffer.
    #[inline]
    pub fn data_mut(&mut self) -> &mut [T] {
        self.data.as_slice_mut()
    }

    /// The gradient buffer.
    #[inline]
    pub fn diff(&self) -> &[T] {
        self.diff.as_slice()
    }

    /// The mutable gradient buffer.
    #[inline]
    pub fn diff_mut(&mut self) -> &mut [T] {
        self.diff.as_slice_mut()
    }

    /// The value tensor.
    pub fn data_tensor(&self) -> &Tensor<T> {
        &self.data
    }

    /// The gradient tensor.
    pub fn diff_tensor(&self) -> &Tensor<T> {
        &self.diff
    }
}
