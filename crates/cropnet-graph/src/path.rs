use std::collections::{BTreeMap, HashMap, HashSet};

use crate::{
    affine::AffineMap,
    error::GraphError,
    graph::{GraphTopology, OpId, TensorId},
};

/// The result of aligning two tensors through their common ancestor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alignment {
    /// The tensor both inputs descend from.
    pub ancestor: TensorId,
    /// Operations from the ancestor to the cropped tensor, in execution order.
    pub cropped_chain: Vec<OpId>,
    /// Operations from the ancestor to the reference tensor, in execution order.
    pub reference_chain: Vec<OpId>,
}

/// Finds the common ancestor of two tensors by following first inputs backwards.
///
/// The resolver only keeps the producer of every tensor; the graph itself is
/// passed to each call.
///
/// # Examples
///
/// ```rust
/// use cropnet_graph::{ops::{Filter, Identity}, Graph, PathResolver};
///
/// let mut graph = Graph::new();
/// let data = graph.add_input("data");
/// let score = graph.add_layer("score", &[data], Filter::new(3, 1, 0)).unwrap();
///
/// let resolver = PathResolver::new(&graph).unwrap();
/// let alignment = resolver.resolve(&graph, data, score).unwrap();
/// assert_eq!(alignment.ancestor, data);
/// assert!(alignment.cropped_chain.is_empty());
/// assert_eq!(alignment.reference_chain.len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct PathResolver {
    producers: BTreeMap<TensorId, OpId>,
}

impl PathResolver {
    /// Builds the producer map of `graph`.
    ///
    /// Operations are scanned in execution order and the first producer of a
    /// tensor wins, so in-place operations do not replace the original producer.
    pub fn new<G: GraphTopology + ?Sized>(graph: &G) -> Result<Self, GraphError> {
        let mut producers = BTreeMap::new();
        for op in (0..graph.num_ops()).map(OpId) {
            for &t in graph.op_outputs(op)? {
                producers.entry(t).or_insert(op);
            }
        }
        Ok(Self { producers })
    }

    /// The operation producing `t`, if any.
    pub fn producer(&self, t: TensorId) -> Option<OpId> {
        self.producers.get(&t).copied()
    }

    /// Finds the common ancestor of `cropped` and `reference` and the
    /// operation chains leading to each.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Disconnected`] if the walk from `reference` reaches
    /// a tensor without producer, or a producer without inputs, before meeting
    /// the path of `cropped`.
    pub fn resolve<G: GraphTopology + ?Sized>(
        &self,
        graph: &G,
        cropped: TensorId,
        reference: TensorId,
    ) -> Result<Alignment, GraphError> {
        for t in [cropped, reference] {
            if t.0 >= graph.num_tensors() {
                return Err(GraphError::UnknownTensor(t));
            }
        }

        // walk back from the cropped tensor, keeping track of every tensor we pass
        let mut path_index: HashMap<TensorId, usize> = HashMap::from([(cropped, 0)]);
        let mut cropped_ops = Vec::new();
        let mut current = cropped;
        while let Some(op) = self.producer(current) {
            let Some(&next) = graph.op_inputs(op)?.first() else {
                break;
            };
            if path_index.contains_key(&next) {
                // in-place producer of its own input
                break;
            }
            cropped_ops.push(op);
            path_index.insert(next, cropped_ops.len());
            current = next;
        }
        log::trace!("walk from {cropped} visited {} tensors", path_index.len());

        // now walk back from the reference until we hit that path
        let disconnected = |at| GraphError::Disconnected {
            cropped,
            reference,
            at,
        };
        let mut seen = HashSet::new();
        let mut reference_ops = Vec::new();
        let mut current = reference;
        while !path_index.contains_key(&current) {
            if !seen.insert(current) {
                return Err(disconnected(current));
            }
            let op = self.producer(current).ok_or_else(|| disconnected(current))?;
            let next = *graph
                .op_inputs(op)?
                .first()
                .ok_or_else(|| disconnected(current))?;
            reference_ops.push(op);
            current = next;
        }

        let ancestor = current;
        let depth = path_index[&ancestor];
        cropped_ops.truncate(depth);
        cropped_ops.reverse();
        reference_ops.reverse();

        log::debug!(
            "aligned {cropped} and {reference} through {ancestor} ({} and {} operations)",
            cropped_ops.len(),
            reference_ops.len()
        );

        Ok(Alignment {
            ancestor,
            cropped_chain: cropped_ops,
            reference_chain: reference_ops,
        })
    }
}

/// Folds the coordinate maps of `chain`, given in execution order, into one
/// map from the chain's first input to its last output.
pub fn compose_chain<G: GraphTopology + ?Sized>(
    graph: &G,
    chain: &[OpId],
    num_spatial_axes: usize,
) -> Result<AffineMap, GraphError> {
    chain
        .iter()
        .try_fold(AffineMap::identity(num_spatial_axes), |acc, &op| {
            graph.op_coord_map(op, num_spatial_axes)?.compose(&acc)
        })
}

/// Computes the map from the cropped tensor's coordinates to the reference
/// tensor's coordinates, `reference_map ∘ cropped_map⁻¹`.
pub fn alignment_map<G: GraphTopology + ?Sized>(
    graph: &G,
    alignment: &Alignment,
    num_spatial_axes: usize,
) -> Result<AffineMap, GraphError> {
    let cropped_map = compose_chain(graph, &alignment.cropped_chain, num_spatial_axes)?;
    let reference_map = compose_chain(graph, &alignment.reference_chain, num_spatial_axes)?;
    reference_map.compose(&cropped_map.inv()?)
}

#[cfg(test)]
mod tests {
    use super::{alignment_map, compose_chain, PathResolver};
    use crate::{
        ops::{Filter, Identity, Translate, TransposedFilter},
        AffineMap, AxisMap, Graph, GraphError, OpId, TensorId,
    };

    #[test]
    fn same_tensor_aligns_to_itself() -> Result<(), GraphError> {
        let mut graph = Graph::new();
        let data = graph.add_input("data");
        let conv = graph.add_layer("conv", &[data], Filter::new(3, 1, 1))?;

        let resolver = PathResolver::new(&graph)?;
        let alignment = resolver.resolve(&graph, conv, conv)?;
        assert_eq!(alignment.ancestor, conv);
        assert!(alignment.cropped_chain.is_empty());
        assert!(alignment.reference_chain.is_empty());
        assert_eq!(alignment_map(&graph, &alignment, 2)?, AffineMap::identity(2));
        Ok(())
    }

    #[test]
    fn branches_meet_at_fork() -> Result<(), GraphError> {
        let mut graph = Graph::new();
        let data = graph.add_input("data");
        let trunk = graph.add_layer("trunk", &[data], Identity)?;
        let left = graph.add_layer("left", &[trunk], Translate::new([-1.0]))?;
        let right_a = graph.add_layer("right_a", &[trunk], Translate::new([-2.0]))?;
        let right_b = graph.add_layer("right_b", &[right_a], Translate::new([-3.0]))?;

        let resolver = PathResolver::new(&graph)?;
        let alignment = resolver.resolve(&graph, left, right_b)?;
        assert_eq!(alignment.ancestor, trunk);
        assert_eq!(alignment.cropped_chain, vec![OpId(1)]);
        assert_eq!(alignment.reference_chain, vec![OpId(2), OpId(3)]);

        // left = trunk - 1, right_b = trunk - 5, so right_b = left - 4
        let map = alignment_map(&graph, &alignment, 2)?;
        assert_eq!(map, AffineMap::translation(&[-4.0, -4.0]));
        Ok(())
    }

    #[test]
    fn in_place_ops_keep_first_producer() -> Result<(), GraphError> {
        let mut graph = Graph::new();
        let data = graph.add_input("data");
        let conv = graph.add_layer("conv", &[data], Filter::new(3, 1, 0))?;
        let relu = graph.add_op("relu", &[conv], &[conv], Identity)?;
        let score = graph.add_layer("score", &[conv], Translate::new([-1.0]))?;

        let resolver = PathResolver::new(&graph)?;
        assert_eq!(resolver.producer(conv), Some(OpId(0)));
        assert_ne!(resolver.producer(conv), Some(relu));

        let alignment = resolver.resolve(&graph, data, score)?;
        assert_eq!(alignment.ancestor, data);
        assert_eq!(alignment.reference_chain, vec![OpId(0), OpId(2)]);
        Ok(())
    }

    #[test]
    fn in_place_producer_of_input_terminates() -> Result<(), GraphError> {
        let mut graph = Graph::new();
        let data = graph.add_input("data");
        graph.add_op("scale_inplace", &[data], &[data], Identity)?;
        let other = graph.add_input("other");

        let resolver = PathResolver::new(&graph)?;
        let res = resolver.resolve(&graph, data, other);
        assert_eq!(
            res,
            Err(GraphError::Disconnected {
                cropped: data,
                reference: other,
                at: other
            })
        );

        let res = resolver.resolve(&graph, other, data);
        assert_eq!(
            res,
            Err(GraphError::Disconnected {
                cropped: other,
                reference: data,
                at: data
            })
        );
        Ok(())
    }

    #[test]
    fn disconnected_inputs() -> Result<(), GraphError> {
        let mut graph = Graph::new();
        let a = graph.add_input("a");
        let b = graph.add_input("b");
        let a1 = graph.add_layer("a1", &[a], Identity)?;
        let b1 = graph.add_layer("b1", &[b], Identity)?;

        let resolver = PathResolver::new(&graph)?;
        let res = resolver.resolve(&graph, a1, b1);
        assert_eq!(
            res,
            Err(GraphError::Disconnected {
                cropped: a1,
                reference: b1,
                at: b
            })
        );
        Ok(())
    }

    #[test]
    fn source_op_without_inputs_is_a_root() -> Result<(), GraphError> {
        let mut graph = Graph::new();
        let data = graph.add_tensor("data");
        graph.add_op("data_source", &[], &[data], Identity)?;
        let noise = graph.add_tensor("noise");
        graph.add_op("noise_source", &[], &[noise], Identity)?;
        let conv = graph.add_layer("conv", &[data], Filter::new(3, 1, 0))?;

        let resolver = PathResolver::new(&graph)?;
        assert_eq!(resolver.resolve(&graph, conv, data)?.ancestor, data);
        assert!(matches!(
            resolver.resolve(&graph, conv, noise),
            Err(GraphError::Disconnected { at, .. }) if at == noise
        ));
        Ok(())
    }

    #[test]
    fn unknown_tensor() -> Result<(), GraphError> {
        let graph = Graph::new();
        let resolver = PathResolver::new(&graph)?;
        assert_eq!(
            resolver.resolve(&graph, TensorId(0), TensorId(0)),
            Err(GraphError::UnknownTensor(TensorId(0)))
        );
        Ok(())
    }

    #[test]
    fn fcn_upsampling_chain() -> Result<(), GraphError> {
        let mut graph = Graph::new();
        let data = graph.add_input("data");
        let conv = graph.add_layer("conv", &[data], Filter::new(3, 1, 100))?;
        let pool = graph.add_layer("pool", &[conv], Filter::new(2, 2, 0))?;
        let up = graph.add_layer("upscore", &[pool], TransposedFilter::new(4, 2, 0))?;

        let resolver = PathResolver::new(&graph)?;
        let alignment = resolver.resolve(&graph, up, data)?;
        let map = compose_chain(&graph, &alignment.cropped_chain, 2)?;
        // conv: +99, pool: x/2 - 0.25, deconv: 2x + 1.5
        assert_eq!(map.coefs()[0], AxisMap::new(1.0, 100.0));
        assert_eq!(map.coefs()[1], AxisMap::new(1.0, 100.0));

        let crop = alignment_map(&graph, &alignment, 2)?;
        assert_eq!(crop.coefs()[0], AxisMap::new(1.0, -100.0));
        Ok(())
    }
}
