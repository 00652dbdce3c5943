#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]
//!
//! # Overview
//!
//! `cropnet-tensor` provides the buffers a graph engine hands to the crop
//! layer: a dynamic-rank, row-major [`Tensor`] and a [`Blob`] that pairs a
//! value tensor with its gradient.
//!
//! ```rust
//! use cropnet_tensor::{Blob, Tensor};
//!
//! let t = Tensor::from_shape_vec(vec![2, 3], vec![1, 2, 3, 4, 5, 6]).unwrap();
//! assert_eq!(t.strides, vec![3, 1]);
//!
//! let blob = Blob::from_tensor(t);
//! assert_eq!(blob.diff(), &[0, 0, 0, 0, 0, 0]);
//! ```

/// Blob module containing the value/gradient buffer pair.
pub mod blob;

/// Serde module for serialization and deserialization of tensors.
#[cfg(feature = "serde")]
pub mod serde;

/// Tensor module containing the dynamic-rank tensor and error types.
pub mod tensor;

pub use crate::blob::Blob;
pub use crate::tensor::{canonical_axis_index, get_strides_from_shape, Tensor, TensorError};
