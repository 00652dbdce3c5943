#![doc = env!("CARGO_PKG_DESCRIPTION")]

#[doc(inline)]
pub use cropnet_tensor as tensor;

#[doc(inline)]
pub use cropnet_graph as graph;

#[doc(inline)]
pub use cropnet_crop as crop;
