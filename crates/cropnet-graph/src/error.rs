use thiserror::Error;

use crate::graph::{OpId, TensorId};

/// An error type for graph queries, coordinate maps and alignment.
#[derive(Error, Debug, PartialEq)]
pub enum GraphError {
    /// The walk from the reference tensor never met the path of the cropped tensor.
    #[error("Cannot align apparently disconnected tensors {cropped} and {reference}: walk stopped at {at}")]
    Disconnected {
        /// The tensor to be cropped
        cropped: TensorId,
        /// The tensor defining the target shape
        reference: TensorId,
        /// The tensor where the backward walk could not continue
        at: TensorId,
    },

    /// A tensor index outside of the graph.
    #[error("Unknown tensor {0}")]
    UnknownTensor(TensorId),

    /// An operation index outside of the graph.
    #[error("Unknown operation {0}")]
    UnknownOperation(OpId),

    /// Two coordinate maps cover a different number of axes.
    #[error("Coordinate map axis count mismatch: expected {expected}, got {actual}")]
    AxisCountMismatch {
        /// Number of axes of the receiving map
        expected: usize,
        /// Number of axes of the other map
        actual: usize,
    },

    /// A coordinate map with a zero scale cannot be inverted.
    #[error("Coordinate map is not invertible: scale on axis {axis} is zero")]
    SingularMap {
        /// The axis with the zero scale
        axis: usize,
    },
}
