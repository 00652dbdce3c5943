use approx::{abs_diff_eq, relative_eq};
use cropnet_graph::{alignment_map, AffineMap, GraphError, GraphTopology, PathResolver, TensorId};
use cropnet_tensor::canonical_axis_index;

use crate::{config::CropConfig, error::CropError};

/// Derives the per-axis crop offsets from the map between the cropped and the
/// reference coordinate systems.
///
/// Leading axes up to `first_spatial_axis` get a zero offset. Every spatial
/// axis must be a pure translation by a non-positive whole number of elements,
/// the offset of that axis being the negated translation.
///
/// # Errors
///
/// Checked per axis in this order: [`CropError::ShapeMismatch`] for a scale
/// other than one, [`CropError::NonIntegerCrop`] for a fractional offset and
/// [`CropError::NegativeCrop`] for a positive translation.
///
/// # Example
///
/// ```rust
/// use cropnet_crop::plan::crop_offsets;
/// use cropnet_graph::AffineMap;
///
/// let map = AffineMap::translation(&[-3.0, -5.0]);
/// let offsets = crop_offsets(&map, 2, 4, 1e-6).unwrap();
/// assert_eq!(offsets, vec![0, 0, 3, 5]);
/// ```
pub fn crop_offsets(
    map: &AffineMap,
    first_spatial_axis: usize,
    num_axes: usize,
    tolerance: f64,
) -> Result<Vec<usize>, CropError> {
    let num_spatial_axes = num_axes.saturating_sub(first_spatial_axis);
    if map.num_axes() != num_spatial_axes {
        return Err(GraphError::AxisCountMismatch {
            expected: num_spatial_axes,
            actual: map.num_axes(),
        }
        .into());
    }

    let mut offsets = vec![0; num_axes];
    for (i, coef) in map.coefs().iter().enumerate() {
        let axis = first_spatial_axis + i;
        if !relative_eq!(coef.scale, 1.0, epsilon = tolerance, max_relative = tolerance) {
            return Err(CropError::ShapeMismatch {
                axis,
                scale: coef.scale,
            });
        }
        let rounded = coef.offset.round();
        if !abs_diff_eq!(coef.offset, rounded, epsilon = tolerance) {
            return Err(CropError::NonIntegerCrop {
                axis,
                offset: coef.offset,
            });
        }
        let crop = -rounded;
        if crop < 0.0 {
            return Err(CropError::NegativeCrop {
                axis,
                offset: coef.offset,
            });
        }
        // saturates for offsets beyond usize, the window check rejects those
        offsets[axis] = crop as usize;
    }
    Ok(offsets)
}

/// A validated crop: where the window sits inside the cropped tensor and the
/// shapes both passes iterate over.
///
/// The plan is read-only once built. Shape changes that keep the graph
/// topology produce a new plan through [`CropPlan::reshaped`] without walking
/// the graph again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CropPlan {
    channel_axis: usize,
    offsets: Vec<usize>,
    src_shape: Vec<usize>,
    dst_shape: Vec<usize>,
    line_size: usize,
    num_lines: usize,
}

impl CropPlan {
    /// Plans the crop of `cropped` to the spatial extents of `reference`.
    ///
    /// # Arguments
    ///
    /// * `graph` - The graph both tensors belong to.
    /// * `cropped` - The tensor to crop.
    /// * `reference` - The tensor defining the spatial extents of the output.
    /// * `cropped_shape` - Current extents of `cropped`.
    /// * `reference_shape` - Current extents of `reference`.
    /// * `config` - The channel axis and tolerance to use.
    pub fn new<G: GraphTopology + ?Sized>(
        graph: &G,
        cropped: TensorId,
        reference: TensorId,
        cropped_shape: &[usize],
        reference_shape: &[usize],
        config: &CropConfig,
    ) -> Result<Self, CropError> {
        let num_axes = cropped_shape.len();
        check_rank(cropped_shape, reference_shape)?;

        let invalid_axis = || CropError::InvalidAxis {
            axis: config.axis,
            rank: num_axes,
        };
        let channel_axis = canonical_axis_index(config.axis, num_axes).map_err(|_| invalid_axis())?;
        let first_spatial_axis = channel_axis + 1;
        if first_spatial_axis >= num_axes {
            return Err(invalid_axis());
        }
        let num_spatial_axes = num_axes - first_spatial_axis;

        let resolver = PathResolver::new(graph)?;
        let alignment = resolver.resolve(graph, cropped, reference)?;
        let map = alignment_map(graph, &alignment, num_spatial_axes)?;
        let offsets = crop_offsets(&map, first_spatial_axis, num_axes, config.tolerance)?;

        let plan = Self::from_offsets(channel_axis, offsets, cropped_shape, reference_shape)?;
        log::debug!(
            "crop {cropped} to {reference} via {}: offsets {:?}, output {:?}",
            alignment.ancestor,
            plan.offsets,
            plan.dst_shape
        );
        Ok(plan)
    }

    /// Builds a plan from known offsets, one per axis.
    ///
    /// The output keeps the extents of `src_shape` up to and including the
    /// channel axis and takes the spatial extents of `reference_shape`.
    ///
    /// # Errors
    ///
    /// Returns [`CropError::WindowOutOfBounds`] if the window does not fit in `src_shape`.
    pub fn from_offsets(
        channel_axis: usize,
        offsets: Vec<usize>,
        src_shape: &[usize],
        reference_shape: &[usize],
    ) -> Result<Self, CropError> {
        check_rank(src_shape, reference_shape)?;
        let num_axes = src_shape.len();
        if channel_axis + 1 >= num_axes {
            return Err(CropError::InvalidAxis {
                axis: channel_axis as isize,
                rank: num_axes,
            });
        }
        if offsets.len() != num_axes {
            return Err(GraphError::AxisCountMismatch {
                expected: num_axes,
                actual: offsets.len(),
            }
            .into());
        }

        let dst_shape = src_shape[..=channel_axis]
            .iter()
            .chain(&reference_shape[channel_axis + 1..])
            .copied()
            .collect::<Vec<_>>();

        for axis in channel_axis + 1..num_axes {
            let end = offsets[axis].checked_add(dst_shape[axis]);
            if end.map_or(true, |end| end > src_shape[axis]) {
                return Err(CropError::WindowOutOfBounds {
                    axis,
                    offset: offsets[axis],
                    extent: dst_shape[axis],
                    source_extent: src_shape[axis],
                });
            }
        }

        let line_size = dst_shape[num_axes - 1];
        let num_lines = match line_size {
            0 => 0,
            n => dst_shape.iter().product::<usize>() / n,
        };

        Ok(Self {
            channel_axis,
            offsets,
            src_shape: src_shape.to_vec(),
            dst_shape,
            line_size,
            num_lines,
        })
    }

    /// Recomputes the shape-derived fields for new extents, keeping the offsets.
    ///
    /// Only valid while the graph topology is unchanged.
    pub fn reshaped(&self, src_shape: &[usize], reference_shape: &[usize]) -> Result<Self, CropError> {
        let plan = Self::from_offsets(
            self.channel_axis,
            self.offsets.clone(),
            src_shape,
            reference_shape,
        )?;
        log::trace!("crop reshaped to {:?}", plan.dst_shape);
        Ok(plan)
    }

    /// The channel axis; axes after it are spatial.
    pub fn channel_axis(&self) -> usize {
        self.channel_axis
    }

    /// The number of cropped axes.
    pub fn num_spatial_axes(&self) -> usize {
        self.src_shape.len() - self.channel_axis - 1
    }

    /// The crop offset of every axis, zero for leading axes.
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// The extents of the cropped input.
    pub fn src_shape(&self) -> &[usize] {
        &self.src_shape
    }

    /// The extents of the output.
    pub fn dst_shape(&self) -> &[usize] {
        &self.dst_shape
    }

    /// The number of contiguous elements copied per line.
    pub fn line_size(&self) -> usize {
        self.line_size
    }

    /// The number of lines in the output.
    pub fn num_lines(&self) -> usize {
        self.num_lines
    }

    /// The number of elements in the output.
    pub fn dst_count(&self) -> usize {
        self.num_lines * self.line_size
    }

    /// The number of elements in the cropped input.
    pub fn src_count(&self) -> usize {
        self.src_shape.iter().product()
    }

    /// Returns the flat offsets `(dst, src)` of the first element of `line`.
    ///
    /// The line index is decoded as a mixed-radix number over the output
    /// extents, innermost-but-one axis first. `line` must be below [`CropPlan::num_lines`].
    #[inline]
    pub fn line_offsets(&self, line: usize) -> (usize, usize) {
        let last = self.dst_shape.len() - 1;
        let mut k = line;
        let mut dst_index = 0;
        let mut src_index = self.offsets[last];
        let mut dst_stride = self.dst_shape[last];
        let mut src_stride = self.src_shape[last];

        for j in (0..last).rev() {
            let sub = k % self.dst_shape[j];
            dst_index += sub * dst_stride;
            dst_stride *= self.dst_shape[j];

            src_index += (sub + self.offsets[j]) * src_stride;
            src_stride *= self.src_shape[j];
            k /= self.dst_shape[j];
        }
        (dst_index, src_index)
    }
}

fn check_rank(cropped: &[usize], reference: &[usize]) -> Result<(), CropError> {
    if cropped.len() != reference.len() {
        return Err(CropError::RankMismatch {
            cropped: cropped.len(),
            reference: reference.len(),
        });
    }
    Ok(())
}
