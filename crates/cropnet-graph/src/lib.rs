#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]
//!
//! # Overview
//!
//! Two tensors computed along different branches of a graph live in different
//! coordinate systems. This crate recovers the relation between them:
//!
//! - [`AffineMap`]: per-axis `scale * x + offset` transforms with composition and inversion.
//! - [`GraphTopology`]: the connectivity seam a host engine implements; [`Graph`] is an arena implementation.
//! - [`PathResolver`]: finds the common ancestor of two tensors and the operation chains to each.
//! - [`alignment_map`]: composes the chains into the map from one tensor to the other.

/// Affine coordinate maps.
pub mod affine;

/// Error types for the graph module.
pub mod error;

/// Arena graph and the topology traits.
pub mod graph;

/// Coordinate maps of common operations.
pub mod ops;

/// Common ancestor search and chain composition.
pub mod path;

pub use crate::affine::{AffineMap, AxisMap};
pub use crate::error::GraphError;
pub use crate::graph::{CoordMap, Graph, GraphTopology, OpId, OpNode, TensorId, TensorNode};
pub use crate::path::{alignment_map, compose_chain, Alignment, PathResolver};
