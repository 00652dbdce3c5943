use num_traits::Zero;
use rayon::{
    iter::{IndexedParallelIterator, IntoParallelRefMutIterator, ParallelIterator},
    slice::ParallelSliceMut,
};

use crate::{config::ExecutionStrategy, plan::CropPlan};

/// Copies the crop window of `src` into `dst`.
///
/// `src` must hold [`CropPlan::src_count`] elements and `dst`
/// [`CropPlan::dst_count`] elements, both row-major.
///
/// # Arguments
///
/// * `plan` - The validated crop.
/// * `src` - The cropped input.
/// * `dst` - The output buffer.
/// * `strategy` - Serial or line-parallel execution.
///
/// # Examples
///
/// ```rust
/// use cropnet_crop::{kernels::crop_forward, CropPlan, ExecutionStrategy};
///
/// #[rustfmt::skip]
/// let src = [
///     0u8, 1, 2, 3,
///     4, 5, 6, 7,
///     8, 9, 10, 11,
/// ];
/// let plan = CropPlan::from_offsets(0, vec![0, 1, 1], &[1, 3, 4], &[1, 2, 2]).unwrap();
/// let mut dst = [0u8; 4];
/// crop_forward(&plan, &src, &mut dst, ExecutionStrategy::Serial);
/// assert_eq!(dst, [5, 6, 9, 10]);
/// ```
pub fn crop_forward<T>(plan: &CropPlan, src: &[T], dst: &mut [T], strategy: ExecutionStrategy)
where
    T: Copy + Send + Sync,
{
    debug_assert_eq!(src.len(), plan.src_count());
    debug_assert_eq!(dst.len(), plan.dst_count());

    let line_size = plan.line_size();
    if line_size == 0 {
        return;
    }

    match strategy {
        ExecutionStrategy::Parallel => {
            // the output is contiguous, so line `i` starts at `i * line_size`
            dst[..plan.dst_count()]
                .par_chunks_exact_mut(line_size)
                .enumerate()
                .for_each(|(line, dst_line)| {
                    let (_, src_index) = plan.line_offsets(line);
                    dst_line.copy_from_slice(&src[src_index..src_index + line_size]);
                });
        }
        ExecutionStrategy::Serial => {
            for line in 0..plan.num_lines() {
                let (dst_index, src_index) = plan.line_offsets(line);
                dst[dst_index..dst_index + line_size]
                    .copy_from_slice(&src[src_index..src_index + line_size]);
            }
        }
    }
}

/// Writes the output gradient back into the crop window of the input gradient.
///
/// The whole of `src_diff` is zeroed first, then every line of `dst_diff` is
/// copied (not added) to its place, so elements outside the window end up
/// zero regardless of what the buffer held before.
///
/// ```rust
/// use cropnet_crop::{kernels::crop_backward, CropPlan, ExecutionStrategy};
///
/// let plan = CropPlan::from_offsets(0, vec![0, 1, 1], &[1, 3, 4], &[1, 2, 2]).unwrap();
/// let mut src_diff = [7i32; 12];
/// crop_backward(&plan, &[1, 2, 3, 4], &mut src_diff, ExecutionStrategy::Serial);
/// assert_eq!(src_diff, [0, 0, 0, 0, 0, 1, 2, 0, 0, 3, 4, 0]);
/// ```
pub fn crop_backward<T>(
    plan: &CropPlan,
    dst_diff: &[T],
    src_diff: &mut [T],
    strategy: ExecutionStrategy,
) where
    T: Copy + Send + Sync + Zero,
{
    debug_assert_eq!(src_diff.len(), plan.src_count());
    debug_assert_eq!(dst_diff.len(), plan.dst_count());

    match strategy {
        ExecutionStrategy::Parallel => src_diff.par_iter_mut().for_each(|x| *x = T::zero()),
        ExecutionStrategy::Serial => src_diff.fill(T::zero()),
    }

    let line_size = plan.line_size();
    if line_size == 0 {
        return;
    }

    // lines are scattered in order, only the zero-fill runs in parallel
    for line in 0..plan.num_lines() {
        let (dst_index, src_index) = plan.line_offsets(line);
        src_diff[src_index..src_index + line_size]
            .copy_from_slice(&dst_diff[dst_index..dst_index + line_size]);
    }
}
