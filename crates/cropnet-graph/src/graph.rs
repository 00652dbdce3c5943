use std::fmt;

use crate::{affine::AffineMap, error::GraphError};

/// Index of a tensor inside a graph arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TensorId(pub usize);

impl fmt::Display for TensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tensor#{}", self.0)
    }
}

/// Index of an operation inside a graph arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpId(pub usize);

impl fmt::Display for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op#{}", self.0)
    }
}

/// Describes how an operation moves spatial coordinates from its input to its output.
///
/// Operations that do not change the spatial layout return the identity.
pub trait CoordMap: fmt::Debug + Send + Sync {
    /// Returns the input-to-output map over `num_spatial_axes` axes.
    fn coord_map(&self, num_spatial_axes: usize) -> AffineMap;
}

/// Read-only view of the graph connectivity needed to align two tensors.
///
/// The crop planner only ever sees the graph through this trait, so hosts can
/// expose their own engine without building a [`Graph`].
pub trait GraphTopology {
    /// Number of tensors in the graph.
    fn num_tensors(&self) -> usize;

    /// Number of operations in the graph, in execution order.
    fn num_ops(&self) -> usize;

    /// The ordered input tensors of an operation.
    fn op_inputs(&self, op: OpId) -> Result<&[TensorId], GraphError>;

    /// The ordered output tensors of an operation.
    fn op_outputs(&self, op: OpId) -> Result<&[TensorId], GraphError>;

    /// The coordinate map of an operation over `num_spatial_axes` axes.
    fn op_coord_map(&self, op: OpId, num_spatial_axes: usize) -> Result<AffineMap, GraphError>;
}

/// A tensor node.
#[derive(Debug, Clone)]
pub struct TensorNode {
    /// Human readable name.
    pub name: String,
}

/// An operation node.
#[derive(Debug)]
pub struct OpNode {
    /// Human readable name.
    pub name: String,
    /// The ordered input tensors.
    pub inputs: Vec<TensorId>,
    /// The ordered output tensors.
    pub outputs: Vec<TensorId>,
    coord: Box<dyn CoordMap>,
}

impl OpNode {
    /// The coordinate map of the operation.
    pub fn coord_map(&self, num_spatial_axes: usize) -> AffineMap {
        self.coord.coord_map(num_spatial_axes)
    }
}

/// An arena of tensors and operations addressed by index.
///
/// Operations are stored in insertion order, which is taken as execution
/// order. A tensor may be listed as output of several operations when they
/// work in place.
///
/// # Examples
///
/// ```rust
/// use cropnet_graph::{ops::Filter, Graph, GraphTopology};
///
/// let mut graph = Graph::new();
/// let data = graph.add_input("data");
/// let conv = graph.add_layer("conv1", &[data], Filter::new(3, 1, 0)).unwrap();
///
/// assert_eq!(graph.num_tensors(), 2);
/// assert_eq!(graph.tensor_name(conv), Some("conv1"));
/// ```
#[derive(Debug, Default)]
pub struct Graph {
    tensors: Vec<TensorNode>,
    ops: Vec<OpNode>,
}

impl Graph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a tensor with no producer, such as a network input.
    pub fn add_input(&mut self, name: impl Into<String>) -> TensorId {
        self.add_tensor(name)
    }

    /// Adds a tensor node; it gets a producer once an operation lists it as output.
    pub fn add_tensor(&mut self, name: impl Into<String>) -> TensorId {
        self.tensors.push(TensorNode { name: name.into() });
        TensorId(self.tensors.len() - 1)
    }

    /// Adds an operation over existing tensors.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::UnknownTensor`] if any input or output is not in the graph.
    pub fn add_op(
        &mut self,
        name: impl Into<String>,
        inputs: &[TensorId],
        outputs: &[TensorId],
        coord: impl CoordMap + 'static,
    ) -> Result<OpId, GraphError> {
        for &t in inputs.iter().chain(outputs) {
            self.check_tensor(t)?;
        }
        self.ops.push(OpNode {
            name: name.into(),
            inputs: inputs.to_vec(),
            outputs: outputs.to_vec(),
            coord: Box::new(coord),
        });
        Ok(OpId(self.ops.len() - 1))
    }

    /// Adds an operation producing a single new tensor named after the operation.
    pub fn add_layer(
        &mut self,
        name: impl Into<String>,
        inputs: &[TensorId],
        coord: impl CoordMap + 'static,
    ) -> Result<TensorId, GraphError> {
        let name = name.into();
        for &t in inputs {
            self.check_tensor(t)?;
        }
        let output = self.add_tensor(name.clone());
        self.add_op(name, inputs, &[output], coord)?;
        Ok(output)
    }

    /// The name of a tensor.
    pub fn tensor_name(&self, t: TensorId) -> Option<&str> {
        self.tensors.get(t.0).map(|n| n.name.as_str())
    }

    /// Looks up a tensor by name.
    pub fn find_tensor(&self, name: &str) -> Option<TensorId> {
        self.tensors.iter().position(|n| n.name == name).map(TensorId)
    }

    /// The operation node at `op`.
    pub fn op(&self, op: OpId) -> Result<&OpNode, GraphError> {
        self.ops.get(op.0).ok_or(GraphError::UnknownOperation(op))
    }

    fn check_tensor(&self, t: TensorId) -> Result<(), GraphError> {
        if t.0 >= self.tensors.len() {
            return Err(GraphError::UnknownTensor(t));
        }
        Ok(())
    }
}

impl GraphTopology for Graph {
    fn num_tensors(&self) -> usize {
        self.tensors.len()
    }

    fn num_ops(&self) -> usize {
        self.ops.len()
    }

    fn op_inputs(&self, op: OpId) -> Result<&[TensorId], GraphError> {
        Ok(&self.op(op)?.inputs)
    }

    fn op_outputs(&self, op: OpId) -> Result<&[TensorId], GraphError> {
        Ok(&self.op(op)?.outputs)
    }

    fn op_coord_map(&self, op: OpId, num_spatial_axes: usize) -> Result<AffineMap, GraphError> {
        Ok(self.op(op)?.coord_map(num_spatial_axes))
    }
}
