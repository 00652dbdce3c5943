#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]
//!
//! # Overview
//!
//! [`CropLayer`] crops its first input to the spatial extents of the second.
//! The crop offsets are not configured by hand: at setup the layer walks the
//! graph back to the common ancestor of both inputs and composes the
//! coordinate maps of every operation in between.
//!
//! The pieces can also be used on their own: [`CropPlan`] holds a validated
//! window and [`kernels`] copies data through it.

/// Layer configuration.
pub mod config;

/// Error types for the crop module.
pub mod error;

/// Forward and backward copy kernels.
pub mod kernels;

/// The crop layer.
pub mod layer;

/// Offset derivation and crop plans.
pub mod plan;

pub use crate::config::{CropConfig, ExecutionStrategy};
pub use crate::error::CropError;
pub use crate::layer::CropLayer;
pub use crate::plan::CropPlan;
