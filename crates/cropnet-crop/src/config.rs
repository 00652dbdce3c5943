/// Controls how the crop kernels are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ExecutionStrategy {
    /// Distribute lines over the global Rayon thread pool.
    #[default]
    Parallel,

    /// Run sequentially on the current thread.
    ///
    /// Useful for small tensors or when the caller already runs in parallel.
    Serial,
}

/// Configuration of the crop layer.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CropConfig {
    /// The channel axis; every axis after it is spatial and gets cropped.
    ///
    /// Negative values count from the last axis.
    pub axis: isize,
    /// Which of the two inputs defines the output extents; the other one is cropped.
    pub reference: usize,
    /// Tolerance used when checking that composed scales are one and offsets integers.
    pub tolerance: f64,
    /// How forward and backward distribute their lines.
    pub strategy: ExecutionStrategy,
}

impl Default for CropConfig {
    fn default() -> Self {
        Self {
            axis: 1,
            reference: 1,
            tolerance: 1e-6,
            strategy: ExecutionStrategy::default(),
        }
    }
}

impl CropConfig {
    /// Creates a configuration with the given channel axis.
    pub fn new(axis: isize) -> Self {
        Self {
            axis,
            ..Default::default()
        }
    }

    /// The index of the input being cropped.
    pub fn cropped(&self) -> usize {
        1 - self.reference.min(1)
    }
}
