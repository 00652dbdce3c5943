//! Coordinate maps of common operations.
//!
//! Per-axis parameters follow the usual layer convention: a single value
//! applies to every spatial axis, otherwise one value per axis is expected.

use crate::{
    affine::{AffineMap, AxisMap},
    graph::CoordMap,
};

// picks the value for `axis`, repeating the last one
fn per_axis<T: Copy>(values: &[T], axis: usize, default: T) -> T {
    match values.len() {
        0 => default,
        n => values[axis.min(n - 1)],
    }
}

/// Operations that keep the spatial layout, e.g. activations or element-wise math.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl CoordMap for Identity {
    fn coord_map(&self, num_spatial_axes: usize) -> AffineMap {
        AffineMap::identity(num_spatial_axes)
    }
}

/// A pure shift of the coordinate system, `output = input + offset`.
///
/// A negative offset means output coordinate zero sits inside the input, which
/// is what an unpadded ("valid") window operation produces.
#[derive(Debug, Clone, Default)]
pub struct Translate {
    /// Per-axis offsets.
    pub offsets: Vec<f64>,
}

impl Translate {
    /// Creates a translation with one offset per axis, or one broadcast offset.
    pub fn new(offsets: impl Into<Vec<f64>>) -> Self {
        Self {
            offsets: offsets.into(),
        }
    }
}

impl CoordMap for Translate {
    fn coord_map(&self, num_spatial_axes: usize) -> AffineMap {
        let offsets = (0..num_spatial_axes)
            .map(|axis| per_axis(&self.offsets, axis, 0.0))
            .collect::<Vec<_>>();
        AffineMap::translation(&offsets)
    }
}

/// A sliding-window operation such as convolution or pooling.
#[derive(Debug, Clone)]
pub struct Filter {
    /// Per-axis kernel extent.
    pub kernel: Vec<usize>,
    /// Per-axis stride.
    pub stride: Vec<usize>,
    /// Per-axis zero padding.
    pub pad: Vec<usize>,
    /// Per-axis dilation.
    pub dilation: Vec<usize>,
}

impl Filter {
    /// Creates a filter with the same kernel, stride and pad on every axis.
    ///
    /// A zero stride is raised to one.
    pub fn new(kernel: usize, stride: usize, pad: usize) -> Self {
        Self {
            kernel: vec![kernel],
            stride: vec![stride.max(1)],
            pad: vec![pad],
            dilation: vec![1],
        }
    }

    /// Sets the dilation on every axis.
    pub fn with_dilation(mut self, dilation: usize) -> Self {
        self.dilation = vec![dilation];
        self
    }

    /// Maps output coordinates back to the centre of their receptive field in the input.
    ///
    /// `input = stride * output + (effective_kernel - 1) / 2 - pad`
    ///
    /// A zero stride is read as one.
    pub fn receptive_field_map(&self, num_spatial_axes: usize) -> AffineMap {
        let coefs = (0..num_spatial_axes)
            .map(|axis| {
                let (stride, offset) = self.axis_params(axis);
                AxisMap::new(stride, offset)
            })
            .collect();
        AffineMap::new(coefs)
    }

    fn axis_params(&self, axis: usize) -> (f64, f64) {
        let kernel = per_axis(&self.kernel, axis, 1);
        let stride = per_axis(&self.stride, axis, 1).max(1);
        let pad = per_axis(&self.pad, axis, 0);
        let dilation = per_axis(&self.dilation, axis, 1);
        let extent = dilation * (kernel.max(1) - 1) + 1;
        (stride as f64, (extent - 1) as f64 / 2.0 - pad as f64)
    }
}

impl CoordMap for Filter {
    fn coord_map(&self, num_spatial_axes: usize) -> AffineMap {
        // inverse of the receptive field map, the stride is never zero
        let coefs = (0..num_spatial_axes)
            .map(|axis| {
                let (stride, offset) = self.axis_params(axis);
                AxisMap::new(1.0 / stride, -offset / stride)
            })
            .collect();
        AffineMap::new(coefs)
    }
}

/// A transposed sliding-window operation such as deconvolution.
///
/// Its coordinate map is the receptive field map of the matching [`Filter`].
#[derive(Debug, Clone)]
pub struct TransposedFilter(pub Filter);

impl TransposedFilter {
    /// Creates a transposed filter with the same kernel, stride and pad on every axis.
    pub fn new(kernel: usize, stride: usize, pad: usize) -> Self {
        Self(Filter::new(kernel, stride, pad))
    }
}

impl CoordMap for TransposedFilter {
    fn coord_map(&self, num_spatial_axes: usize) -> AffineMap {
        self.0.receptive_field_map(num_spatial_axes)
    }
}

#[cfg(test)]
mod tests {
    use super::{Filter, Identity, Translate, TransposedFilter};
    use crate::{AxisMap, CoordMap};
    use approx::assert_relative_eq;

    #[test]
    fn identity_map() {
        let m = Identity.coord_map(3);
        assert_eq!(m.num_axes(), 3);
        assert!(m.coefs().iter().all(|c| *c == AxisMap::IDENTITY));
    }

    #[test]
    fn translate_broadcasts_single_offset() {
        let m = Translate::new([-2.0]).coord_map(2);
        assert_eq!(m.coefs(), &[AxisMap::new(1.0, -2.0), AxisMap::new(1.0, -2.0)]);

        let m = Translate::new([-1.0, -3.0]).coord_map(2);
        assert_eq!(m.coefs(), &[AxisMap::new(1.0, -1.0), AxisMap::new(1.0, -3.0)]);
    }

    #[test]
    fn same_padded_conv_is_identity() {
        let m = Filter::new(3, 1, 1).coord_map(2);
        for c in m.coefs() {
            assert_relative_eq!(c.scale, 1.0);
            assert_relative_eq!(c.offset, 0.0);
        }
    }

    #[test]
    fn valid_conv_shifts() {
        // output pixel 0 is centred on input pixel 2
        let m = Filter::new(5, 1, 0).coord_map(1);
        assert_eq!(m.coefs(), &[AxisMap::new(1.0, -2.0)]);

        let m = Filter::new(3, 1, 0).with_dilation(2).coord_map(1);
        assert_eq!(m.coefs(), &[AxisMap::new(1.0, -2.0)]);
    }

    #[test]
    fn zero_stride_reads_as_one() {
        assert_eq!(Filter::new(3, 0, 0).stride, vec![1]);

        let filter = Filter {
            kernel: vec![5],
            stride: vec![0],
            pad: vec![0],
            dilation: vec![1],
        };
        assert_eq!(filter.coord_map(2).coefs(), &[AxisMap::new(1.0, -2.0); 2]);
        assert_eq!(
            TransposedFilter(filter).coord_map(1).coefs(),
            &[AxisMap::new(1.0, 2.0)]
        );
    }

    #[test]
    fn strided_pool_and_deconv() {
        let pool = Filter::new(2, 2, 0).coord_map(1);
        assert_relative_eq!(pool.coefs()[0].scale, 0.5);
        assert_relative_eq!(pool.coefs()[0].offset, -0.25);

        let deconv = TransposedFilter::new(4, 2, 0).coord_map(1);
        assert_eq!(deconv.coefs(), &[AxisMap::new(2.0, 1.5)]);
    }
}
