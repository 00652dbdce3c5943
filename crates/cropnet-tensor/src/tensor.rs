use thiserror::Error;

/// An error type for tensor operations.
#[derive(Error, Debug, PartialEq)]
pub enum TensorError {
    /// Tensor shape does not match the provided data.
    ///
    /// The product of the shape extents must equal the number of elements exactly.
    #[error("Shape mismatch: expected {expected} elements for shape, but got {actual} elements in data")]
    InvalidShape {
        /// Expected number of elements based on shape
        expected: usize,
        /// Actual number of elements in the data
        actual: usize,
    },

    /// Axis index outside of `[-rank, rank)`.
    #[error("Axis {axis} out of range for tensor of rank {rank}")]
    AxisOutOfRange {
        /// The requested axis, possibly negative
        axis: isize,
        /// The rank of the tensor
        rank: usize,
    },
}

impl TensorError {
    /// Creates an InvalidShape error with clear context.
    pub fn invalid_shape(expected: usize, actual: usize) -> Self {
        Self::InvalidShape { expected, actual }
    }
}

/// Computes the strides for a row-major (C-contiguous) tensor layout.
///
/// The rightmost dimension has stride 1, and each dimension's stride is the
/// product of all dimensions to its right.
///
/// # Examples
///
/// ```rust
/// use cropnet_tensor::get_strides_from_shape;
///
/// assert_eq!(get_strides_from_shape(&[2, 3]), vec![3, 1]);
/// assert_eq!(get_strides_from_shape(&[2, 3, 4]), vec![12, 4, 1]);
/// ```
pub fn get_strides_from_shape(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![0; shape.len()];
    let mut stride = 1;
    for i in (0..shape.len()).rev() {
        strides[i] = stride;
        stride *= shape[i];
    }
    strides
}

/// Maps a possibly negative axis index into `[0, rank)`.
///
/// Negative values count from the last axis, so `-1` is the innermost axis.
///
/// # Errors
///
/// Returns [`TensorError::AxisOutOfRange`] if `axis` is outside `[-rank, rank)`.
pub fn canonical_axis_index(axis: isize, rank: usize) -> Result<usize, TensorError> {
    let signed_rank = rank as isize;
    if axis < -signed_rank || axis >= signed_rank {
        return Err(TensorError::AxisOutOfRange { axis, rank });
    }
    if axis < 0 {
        Ok((axis + signed_rank) as usize)
    } else {
        Ok(axis as usize)
    }
}

/// A multi-dimensional array with owned, contiguous, row-major data.
///
/// Unlike fixed-rank tensors the rank is only known at runtime, which is what
/// a graph engine hands to its operations: the same layer sees 4-d image
/// batches and 5-d volumes.
///
/// # Examples
///
/// ```rust
/// use cropnet_tensor::Tensor;
///
/// let t = Tensor::from_shape_vec(vec![2, 2], vec![1u8, 2, 3, 4]).unwrap();
/// assert_eq!(t.shape, vec![2, 2]);
/// assert_eq!(t.get(&[1, 0]), Some(&3));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor<T> {
    /// The shape of the tensor.
    pub shape: Vec<usize>,
    /// The strides of the tensor data in memory.
    pub strides: Vec<usize>,
    data: Vec<T>,
}

impl<T> Tensor<T> {
    /// Creates a new `Tensor` with the given shape and data.
    ///
    /// # Errors
    ///
    /// If the number of elements in the data does not match the shape of the tensor, an error is returned.
    pub fn from_shape_vec(shape: Vec<usize>, data: Vec<T>) -> Result<Self, TensorError> {
        let numel = shape.iter().product::<usize>();
        if numel != data.len() {
            return Err(TensorError::invalid_shape(numel, data.len()));
        }
        let strides = get_strides_from_shape(&shape);
        Ok(Self {
            shape,
            strides,
            data,
        })
    }

    /// Creates a new `Tensor` with the given shape filled with `value`.
    pub fn from_shape_val(shape: Vec<usize>, value: T) -> Self
    where
        T: Clone,
    {
        let numel = shape.iter().product::<usize>();
        let strides = get_strides_from_shape(&shape);
        Self {
            shape,
            strides,
            data: vec![value; numel],
        }
    }

    /// Creates a new `Tensor` with the given shape and a function that maps
    /// each multi-index to a value.
    ///
    /// ```rust
    /// use cropnet_tensor::Tensor;
    ///
    /// let t = Tensor::from_shape_fn(vec![2, 3], |idx| idx[0] * 10 + idx[1]);
    /// assert_eq!(t.as_slice(), &[0, 1, 2, 10, 11, 12]);
    /// ```
    pub fn from_shape_fn<F>(shape: Vec<usize>, f: F) -> Self
    where
        F: Fn(&[usize]) -> T,
    {
        let numel = shape.iter().product::<usize>();
        let strides = get_strides_from_shape(&shape);
        let mut index = vec![0; shape.len()];
        let data = (0..numel)
            .map(|offset| {
                let mut rem = offset;
                for (idx, stride) in index.iter_mut().zip(&strides) {
                    *idx = rem / stride;
                    rem %= stride;
                }
                f(&index)
            })
            .collect();
        Self {
            shape,
            strides,
            data,
        }
    }

    /// Creates a tensor of zeros.
    pub fn zeros(shape: Vec<usize>) -> Self
    where
        T: num_traits::Zero + Clone,
    {
        Self::from_shape_val(shape, T::zero())
    }

    /// Returns the number of elements in the tensor.
    #[inline]
    pub fn numel(&self) -> usize {
        self.data.len()
    }

    /// Get the data of the tensor as a slice.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Get the data of the tensor as a mutable slice.
    #[inline]
    pub fn as_slice_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Get the offset of the element at the given index.
    ///
    /// Returns `None` if the index rank differs or any index exceeds its extent.
    pub fn get_iter_offset(&self, index: &[usize]) -> Option<usize> {
        if index.len() != self.shape.len() {
            return None;
        }
        let mut offset = 0;
        for ((&idx, &dim_size), &stride) in index.iter().zip(&self.shape).zip(&self.strides) {
            if idx >= dim_size {
                return None;
            }
            offset += idx * stride;
        }
        Some(offset)
    }

    /// Get the element at the given index.
    pub fn get(&self, index: &[usize]) -> Option<&T> {
        self.get_iter_offset(index).and_then(|i| self.data.get(i))
    }

    /// Changes the shape of the tensor in place.
    ///
    /// The buffer is kept when the element count is unchanged, otherwise it is
    /// resized and new elements are set to `value`. Existing content is not
    /// meaningful after a resize.
    pub fn resize(&mut self, shape: Vec<usize>, value: T)
    where
        T: Clone,
    {
        let numel = shape.iter().product::<usize>();
        if numel != self.data.len() {
            self.data.resize(numel, value);
        }
        self.strides = get_strides_from_shape(&shape);
        self.shape = shape;
    }
}
