use cropnet_graph::GraphError;
use cropnet_tensor::TensorError;
use thiserror::Error;

/// An error type for planning and running the crop layer.
///
/// Everything except [`CropError::NotPlanned`] is raised while planning; a
/// failed plan leaves the layer unset.
#[derive(Error, Debug, PartialEq)]
pub enum CropError {
    /// The inputs could not be related through the graph.
    #[error("Alignment failed: {0}")]
    Alignment(#[from] GraphError),

    /// Tensor error
    #[error("Error with the tensor: {0}")]
    TensorError(#[from] TensorError),

    /// A resampling operation sits between the inputs; only translations can be cropped.
    #[error("Scale mismatch on axis {axis}: expected 1, got {scale}")]
    ShapeMismatch {
        /// The tensor axis
        axis: usize,
        /// The composed scale on that axis
        scale: f64,
    },

    /// The composed offset does not land on a whole element.
    #[error("Crop offset on axis {axis} is not an integer: {offset}")]
    NonIntegerCrop {
        /// The tensor axis
        axis: usize,
        /// The composed offset on that axis
        offset: f64,
    },

    /// The reference would start before the cropped tensor.
    #[error("Negative crop width on axis {axis}: composed offset {offset}")]
    NegativeCrop {
        /// The tensor axis
        axis: usize,
        /// The composed offset on that axis
        offset: f64,
    },

    /// The crop window does not fit inside the cropped tensor.
    #[error("Crop window out of bounds on axis {axis}: offset {offset} + extent {extent} > {source_extent}")]
    WindowOutOfBounds {
        /// The tensor axis
        axis: usize,
        /// The crop offset on that axis
        offset: usize,
        /// The requested extent
        extent: usize,
        /// The extent of the cropped tensor
        source_extent: usize,
    },

    /// The channel axis leaves no spatial axis to crop.
    #[error("Axis {axis} is not a valid channel axis for rank {rank}")]
    InvalidAxis {
        /// The configured axis, possibly negative
        axis: isize,
        /// The rank of the inputs
        rank: usize,
    },

    /// The inputs have a different number of axes.
    #[error("Rank mismatch: cropped input has {cropped} axes, reference has {reference}")]
    RankMismatch {
        /// Rank of the cropped input
        cropped: usize,
        /// Rank of the reference input
        reference: usize,
    },

    /// The layer takes exactly two inputs.
    #[error("Crop expects 2 inputs, got {0}")]
    InvalidBottomCount(usize),

    /// The reference input index is neither 0 nor 1.
    #[error("Reference input must be 0 or 1, got {0}")]
    InvalidReference(usize),

    /// The layer was used before a successful setup.
    #[error("Crop layer has no plan, call setup first")]
    NotPlanned,
}
