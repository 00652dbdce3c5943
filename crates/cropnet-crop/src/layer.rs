use cropnet_graph::{GraphTopology, TensorId};
use cropnet_tensor::{Blob, TensorError};
use num_traits::Zero;

use crate::{
    config::CropConfig,
    error::CropError,
    kernels::{crop_backward, crop_forward},
    plan::CropPlan,
};

/// Crops one input to the spatial extents of the other, following the graph
/// to find where the window sits.
///
/// The layer goes through the usual setup, reshape, forward and backward
/// cycle. [`CropLayer::setup`] walks the graph and fixes the crop offsets,
/// [`CropLayer::reshape`] adapts the output to new input extents and the two
/// passes copy data forward and gradients back.
///
/// # Examples
///
/// ```rust
/// use cropnet_crop::{CropConfig, CropLayer};
/// use cropnet_graph::{ops::Translate, Graph};
/// use cropnet_tensor::Blob;
///
/// let mut graph = Graph::new();
/// let data = graph.add_input("data");
/// let shifted = graph.add_layer("shift", &[data], Translate::new([2.0]))?;
///
/// let big = Blob::from_shape_vec(vec![1, 1, 3, 6], (0..18).map(|x| x as f32).collect())?;
/// let small = Blob::<f32>::zeros(vec![1, 1, 1, 3]);
/// let mut top = Blob::zeros(vec![0]);
///
/// let mut layer = CropLayer::new(CropConfig::default());
/// layer.setup(&graph, &[shifted, data], &[&big, &small])?;
/// layer.reshape(&[&big, &small], &mut top)?;
/// layer.forward(&[&big, &small], &mut top)?;
/// assert_eq!(top.data(), &[14.0, 15.0, 16.0]);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct CropLayer {
    config: CropConfig,
    plan: Option<CropPlan>,
}

impl CropLayer {
    /// Creates an unplanned layer.
    pub fn new(config: CropConfig) -> Self {
        Self { config, plan: None }
    }

    /// The layer configuration.
    pub fn config(&self) -> &CropConfig {
        &self.config
    }

    /// The current plan, if setup succeeded.
    pub fn plan(&self) -> Option<&CropPlan> {
        self.plan.as_ref()
    }

    /// Whether setup succeeded since the last invalidation.
    pub fn is_planned(&self) -> bool {
        self.plan.is_some()
    }

    /// Drops the plan; the next use requires a new setup.
    ///
    /// Call this when the graph topology changes.
    pub fn invalidate(&mut self) {
        self.plan = None;
    }

    /// Plans the crop for the two inputs.
    ///
    /// # Arguments
    ///
    /// * `graph` - The graph the inputs belong to.
    /// * `bottom_ids` - The graph tensors of the two inputs.
    /// * `bottom` - The two inputs, in the same order.
    ///
    /// # Errors
    ///
    /// Any planning error leaves the layer unplanned, including when it held a
    /// plan before.
    pub fn setup<G, T>(
        &mut self,
        graph: &G,
        bottom_ids: &[TensorId],
        bottom: &[&Blob<T>],
    ) -> Result<&CropPlan, CropError>
    where
        G: GraphTopology + ?Sized,
    {
        self.plan = None;
        self.check_bottom_count(bottom_ids.len())?;
        self.check_bottom_count(bottom.len())?;

        let (cropped, reference) = (self.config.cropped(), self.config.reference);
        let plan = CropPlan::new(
            graph,
            bottom_ids[cropped],
            bottom_ids[reference],
            bottom[cropped].shape(),
            bottom[reference].shape(),
            &self.config,
        )?;
        Ok(&*self.plan.insert(plan))
    }

    /// Adapts the plan to the current input extents and resizes `top`.
    ///
    /// The offsets found at setup are kept; the window is checked against the
    /// new extents.
    pub fn reshape<T>(&mut self, bottom: &[&Blob<T>], top: &mut Blob<T>) -> Result<(), CropError>
    where
        T: Zero + Clone,
    {
        self.check_bottom_count(bottom.len())?;
        let plan = self.plan.as_ref().ok_or(CropError::NotPlanned)?;
        let plan = plan.reshaped(
            bottom[self.config.cropped()].shape(),
            bottom[self.config.reference].shape(),
        )?;
        top.reshape(plan.dst_shape().to_vec());
        self.plan = Some(plan);
        Ok(())
    }

    /// Copies the crop window of the cropped input into `top`.
    pub fn forward<T>(&self, bottom: &[&Blob<T>], top: &mut Blob<T>) -> Result<(), CropError>
    where
        T: Copy + Send + Sync,
    {
        self.check_bottom_count(bottom.len())?;
        let plan = self.plan.as_ref().ok_or(CropError::NotPlanned)?;
        let src = bottom[self.config.cropped()];
        check_shapes(plan, src, top)?;

        crop_forward(plan, src.data(), top.data_mut(), self.config.strategy);
        Ok(())
    }

    /// Writes the gradient of `top` into the gradient of the cropped input.
    ///
    /// Nothing happens unless `propagate_down` is set for the cropped input.
    /// The reference input never receives a gradient.
    pub fn backward<T>(
        &self,
        top: &Blob<T>,
        propagate_down: &[bool],
        bottom: &mut [&mut Blob<T>],
    ) -> Result<(), CropError>
    where
        T: Copy + Send + Sync + Zero,
    {
        self.check_bottom_count(bottom.len())?;
        let plan = self.plan.as_ref().ok_or(CropError::NotPlanned)?;
        let cropped = self.config.cropped();
        if !propagate_down.get(cropped).copied().unwrap_or(false) {
            return Ok(());
        }

        let src = &mut *bottom[cropped];
        check_shapes(plan, src, top)?;

        crop_backward(plan, top.diff(), src.diff_mut(), self.config.strategy);
        Ok(())
    }

    fn check_bottom_count(&self, count: usize) -> Result<(), CropError> {
        if count != 2 {
            return Err(CropError::InvalidBottomCount(count));
        }
        if self.config.reference > 1 {
            return Err(CropError::InvalidReference(self.config.reference));
        }
        Ok(())
    }
}

fn check_shapes<T>(plan: &CropPlan, src: &Blob<T>, top: &Blob<T>) -> Result<(), TensorError> {
    if src.shape() != plan.src_shape() {
        return Err(TensorError::invalid_shape(plan.src_count(), src.count()));
    }
    if top.shape() != plan.dst_shape() {
        return Err(TensorError::invalid_shape(plan.dst_count(), top.count()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::CropLayer;
    use crate::{CropConfig, CropError, ExecutionStrategy};
    use cropnet_graph::{
        ops::{Filter, Translate, TransposedFilter},
        Graph, GraphError, TensorId,
    };
    use cropnet_tensor::{Blob, Tensor, TensorError};

    // data -> conv(3, 1, 100) -> pool(2, 2) -> upscore(4, 2), which sits 100 elements ahead of data
    fn fcn_graph() -> Result<(Graph, TensorId, TensorId), GraphError> {
        let mut graph = Graph::new();
        let data = graph.add_input("data");
        let conv = graph.add_layer("conv", &[data], Filter::new(3, 1, 100))?;
        let pool = graph.add_layer("pool", &[conv], Filter::new(2, 2, 0))?;
        let upscore = graph.add_layer("upscore", &[pool], TransposedFilter::new(4, 2, 0))?;
        Ok((graph, upscore, data))
    }

    fn indexed_blob(shape: Vec<usize>) -> Blob<f32> {
        Blob::from_tensor(Tensor::from_shape_fn(shape, |idx| {
            (idx[1] * 100_000 + idx[2] * 1000 + idx[3]) as f32
        }))
    }

    #[test]
    fn full_cycle() -> Result<(), Box<dyn std::error::Error>> {
        let (graph, upscore, data) = fcn_graph()?;
        let score = indexed_blob(vec![1, 2, 210, 212]);
        let image = Blob::<f32>::zeros(vec![1, 3, 10, 12]);
        let mut top = Blob::zeros(vec![1]);

        let mut layer = CropLayer::new(CropConfig::default());
        let plan = layer.setup(&graph, &[upscore, data], &[&score, &image])?;
        assert_eq!(plan.offsets(), &[0, 0, 100, 100]);

        layer.reshape(&[&score, &image], &mut top)?;
        assert_eq!(top.shape(), &[1, 2, 10, 12]);

        layer.forward(&[&score, &image], &mut top)?;
        let out = top.data_tensor();
        assert_eq!(out.get(&[0, 0, 0, 0]), Some(&(100_000.0 + 100.0)));
        assert_eq!(out.get(&[0, 1, 9, 11]), Some(&(100_000.0 + 109_000.0 + 111.0)));

        top.diff_mut().fill(1.0);
        let mut score = score;
        let mut image = image;
        image.diff_mut().fill(3.0);
        layer.backward(&top, &[true, true], &mut [&mut score, &mut image])?;

        assert_eq!(score.diff().iter().sum::<f32>(), (2 * 10 * 12) as f32);
        assert_eq!(score.diff_tensor().get(&[0, 0, 100, 100]), Some(&1.0));
        assert_eq!(score.diff_tensor().get(&[0, 0, 99, 100]), Some(&0.0));
        // reference keeps whatever it had
        assert!(image.diff().iter().all(|&x| x == 3.0));
        Ok(())
    }

    #[test]
    fn backward_respects_propagate_down() -> Result<(), Box<dyn std::error::Error>> {
        let (graph, upscore, data) = fcn_graph()?;
        let mut score = Blob::<f32>::zeros(vec![1, 1, 210, 210]);
        let mut image = Blob::<f32>::zeros(vec![1, 1, 10, 10]);
        let mut top = Blob::zeros(vec![1]);

        let mut layer = CropLayer::new(CropConfig::default());
        layer.setup(&graph, &[upscore, data], &[&score, &image])?;
        layer.reshape(&[&score, &image], &mut top)?;
        top.diff_mut().fill(1.0);
        score.diff_mut().fill(5.0);

        layer.backward(&top, &[false, true], &mut [&mut score, &mut image])?;
        assert!(score.diff().iter().all(|&x| x == 5.0));
        Ok(())
    }

    #[test]
    fn unplanned_layer() {
        let layer = CropLayer::new(CropConfig::default());
        let a = Blob::<f32>::zeros(vec![1, 1, 4, 4]);
        let b = Blob::<f32>::zeros(vec![1, 1, 2, 2]);
        let mut top = Blob::<f32>::zeros(vec![1, 1, 2, 2]);
        assert!(!layer.is_planned());
        assert_eq!(layer.forward(&[&a, &b], &mut top), Err(CropError::NotPlanned));

        let mut layer = layer;
        assert_eq!(layer.reshape(&[&a, &b], &mut top), Err(CropError::NotPlanned));
    }

    #[test]
    fn invalidate_drops_plan() -> Result<(), Box<dyn std::error::Error>> {
        let (graph, upscore, data) = fcn_graph()?;
        let score = Blob::<f32>::zeros(vec![1, 1, 210, 210]);
        let image = Blob::<f32>::zeros(vec![1, 1, 10, 10]);

        let mut layer = CropLayer::new(CropConfig::default());
        layer.setup(&graph, &[upscore, data], &[&score, &image])?;
        assert!(layer.is_planned());
        layer.invalidate();
        assert!(layer.plan().is_none());
        Ok(())
    }

    #[test]
    fn reference_first() -> Result<(), Box<dyn std::error::Error>> {
        let mut graph = Graph::new();
        let data = graph.add_input("data");
        let shifted = graph.add_layer("shift", &[data], Translate::new([1.0, 2.0]))?;

        let image = Blob::<i32>::zeros(vec![1, 1, 2, 2]);
        let big = Blob::from_tensor(Tensor::from_shape_fn(vec![1, 1, 4, 5], |idx| {
            (idx[2] * 10 + idx[3]) as i32
        }));
        let mut top = Blob::zeros(vec![1]);

        let config = CropConfig {
            reference: 0,
            strategy: ExecutionStrategy::Serial,
            ..Default::default()
        };
        let mut layer = CropLayer::new(config);
        layer.setup(&graph, &[data, shifted], &[&image, &big])?;
        layer.reshape(&[&image, &big], &mut top)?;
        layer.forward(&[&image, &big], &mut top)?;
        assert_eq!(top.data(), &[12, 13, 22, 23]);
        Ok(())
    }

    #[test]
    fn failed_setup_clears_plan() -> Result<(), Box<dyn std::error::Error>> {
        let (graph, upscore, data) = fcn_graph()?;
        let score = Blob::<f32>::zeros(vec![1, 1, 210, 210]);
        let image = Blob::<f32>::zeros(vec![1, 1, 10, 10]);

        let mut layer = CropLayer::new(CropConfig::default());
        layer.setup(&graph, &[upscore, data], &[&score, &image])?;

        // cropping the image to the score map would need a negative offset
        let res = layer.setup(&graph, &[data, upscore], &[&image, &score]);
        assert!(matches!(res, Err(CropError::NegativeCrop { axis: 2, .. })));
        assert!(!layer.is_planned());

        let mut other = Graph::new();
        let a = other.add_input("a");
        let b = other.add_input("b");
        let res = layer.setup(&other, &[a, b], &[&score, &image]);
        assert!(matches!(res, Err(CropError::Alignment(GraphError::Disconnected { .. }))));

        layer.setup(&graph, &[upscore, data], &[&score, &image])?;
        assert!(layer.is_planned());
        Ok(())
    }

    #[test]
    fn fractional_alignment_then_corrected_graph() -> Result<(), Box<dyn std::error::Error>> {
        // pool(2, 2) then deconv(kernel, 2) shifts by (kernel - 2) / 2
        let upsampled = |kernel| -> Result<(Graph, TensorId, TensorId), GraphError> {
            let mut graph = Graph::new();
            let data = graph.add_input("data");
            let pool = graph.add_layer("pool", &[data], Filter::new(2, 2, 0))?;
            let up = graph.add_layer("up", &[pool], TransposedFilter::new(kernel, 2, 0))?;
            Ok((graph, up, data))
        };
        let score = Blob::<f32>::zeros(vec![1, 1, 10, 10]);
        let image = Blob::<f32>::zeros(vec![1, 1, 8, 8]);
        let mut layer = CropLayer::new(CropConfig::default());

        let (graph, up, data) = upsampled(3)?;
        let res = layer.setup(&graph, &[up, data], &[&score, &image]);
        assert_eq!(
            res.err(),
            Some(CropError::NonIntegerCrop {
                axis: 2,
                offset: -0.5
            })
        );
        assert!(!layer.is_planned());

        let (graph, up, data) = upsampled(4)?;
        let plan = layer.setup(&graph, &[up, data], &[&score, &image])?;
        assert_eq!(plan.offsets(), &[0, 0, 1, 1]);
        assert!(layer.is_planned());
        Ok(())
    }

    #[test]
    fn invalid_inputs() -> Result<(), Box<dyn std::error::Error>> {
        let (graph, upscore, data) = fcn_graph()?;
        let score = Blob::<f32>::zeros(vec![1, 1, 210, 210]);
        let image = Blob::<f32>::zeros(vec![1, 1, 10, 10]);

        let mut layer = CropLayer::new(CropConfig::default());
        let res = layer.setup(&graph, &[upscore], &[&score]);
        assert!(matches!(res, Err(CropError::InvalidBottomCount(1))));

        let mut layer = CropLayer::new(CropConfig {
            reference: 2,
            ..Default::default()
        });
        let res = layer.setup(&graph, &[upscore, data], &[&score, &image]);
        assert!(matches!(res, Err(CropError::InvalidReference(2))));
        Ok(())
    }

    #[test]
    fn reshape_checks_window() -> Result<(), Box<dyn std::error::Error>> {
        let (graph, upscore, data) = fcn_graph()?;
        let score = Blob::<f32>::zeros(vec![1, 1, 210, 210]);
        let image = Blob::<f32>::zeros(vec![1, 1, 10, 10]);
        let mut top = Blob::zeros(vec![1]);

        let mut layer = CropLayer::new(CropConfig::default());
        layer.setup(&graph, &[upscore, data], &[&score, &image])?;

        let bigger = Blob::<f32>::zeros(vec![1, 1, 10, 120]);
        let res = layer.reshape(&[&score, &bigger], &mut top);
        assert!(matches!(
            res,
            Err(CropError::WindowOutOfBounds {
                axis: 3,
                offset: 100,
                extent: 120,
                source_extent: 210
            })
        ));

        let taller = Blob::<f32>::zeros(vec![2, 1, 20, 10]);
        let larger_score = Blob::<f32>::zeros(vec![2, 1, 230, 210]);
        layer.reshape(&[&larger_score, &taller], &mut top)?;
        assert_eq!(top.shape(), &[2, 1, 20, 10]);

        // forward against the stale input shape
        let res = layer.forward(&[&score, &taller], &mut top);
        assert_eq!(
            res,
            Err(CropError::TensorError(TensorError::invalid_shape(2 * 230 * 210, 210 * 210)))
        );
        Ok(())
    }
}
