use bitvec::prelude::*;
use dspi_core::{ExecutionPlanGraph, NodeId, StreamEndpoint, StreamId};
use hashbrown::{HashMap, HashSet};
use smallvec::SmallVec;

use crate::{Error, ReuseLinks, StreamIdPool};

pub type StreamIds = SmallVec<[StreamId; 4]>;

/// Stream identifiers of every node in one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamAssignment {
    /// Identifier of each input, in input order.
    pub inputs: HashMap<NodeId, StreamIds>,
    /// Identifier of each output, in output order.
    pub outputs: HashMap<NodeId, StreamIds>,
    /// Every identifier used by the run, in order of first use.
    pub used: Vec<StreamId>,
}

impl StreamAssignment {
    pub fn input_ids(&self, node: NodeId) -> &[StreamId] {
        self.inputs.get(&node).map(|ids| ids.as_slice()).unwrap_or_default()
    }

    pub fn output_ids(&self, node: NodeId) -> &[StreamId] {
        self.outputs.get(&node).map(|ids| ids.as_slice()).unwrap_or_default()
    }
}

/// Identifiers claimed by the run being assigned.
struct RunIds<'a> {
    pool: &'a mut StreamIdPool,
    held: BitArr!(for StreamId::COUNT),
    used: Vec<StreamId>,
}

impl<'a> RunIds<'a> {
    fn fresh(&mut self) -> error_stack::Result<StreamId, Error> {
        let id = self.pool.allocate()?;
        self.hold(id);
        Ok(id)
    }

    /// Claim an identifier kept out of the pool by a reuse link.
    ///
    /// Returns false if the run already uses it.
    fn claim(&mut self, id: StreamId) -> bool {
        if self.held[id.index()] {
            false
        } else {
            self.hold(id);
            true
        }
    }

    fn hold(&mut self, id: StreamId) {
        self.held.set(id.index(), true);
        self.used.push(id);
    }
}

/// Assign stream identifiers to the nodes of a run.
///
/// `nodes` must list producers before their in-run consumers. An input fed
/// by a node of the same run shares that output's identifier. An input fed by
/// an earlier run takes the identifier carried by the reuse link when it is
/// still free. Output `i` continues on the identifier of input `i`; outputs
/// beyond the input count and every other input take fresh identifiers.
///
/// The pool is only updated if the assignment succeeds.
pub fn allocate_stream_ids(
    graph: &ExecutionPlanGraph,
    nodes: &[NodeId],
    links: &ReuseLinks,
    pool: &mut StreamIdPool,
) -> error_stack::Result<StreamAssignment, Error> {
    let in_run: HashSet<NodeId> = nodes.iter().copied().collect();
    let mut working = pool.clone();
    let mut ids = RunIds {
        pool: &mut working,
        held: BitArray::ZERO,
        used: Vec::new(),
    };

    // Carried identifiers are claimed before anything is popped.
    let mut carried = HashMap::new();
    for &node in nodes {
        for (index, producer) in graph.input_producers(node).enumerate() {
            let Some(producer) = producer.filter(|p| !in_run.contains(&p.node)) else {
                continue;
            };
            let consumer = StreamEndpoint::new(node, index);
            if let Some(id) = links.carried_id(producer, consumer) {
                if ids.claim(id) {
                    carried.insert(consumer, id);
                } else {
                    tracing::debug!(
                        "Stream id {id} carried to node {node} input {index} already in use"
                    );
                }
            }
        }
    }

    let mut assignment = StreamAssignment::default();
    let mut produced: HashMap<StreamEndpoint, StreamId> = HashMap::new();
    for &node in nodes {
        let mut inputs = StreamIds::new();
        for (index, producer) in graph.input_producers(node).enumerate() {
            let consumer = StreamEndpoint::new(node, index);
            let in_run_id = producer.and_then(|producer| produced.get(&producer).copied());
            let id = match in_run_id.or_else(|| carried.get(&consumer).copied()) {
                Some(id) => id,
                None => ids.fresh()?,
            };
            inputs.push(id);
        }

        let mut outputs = StreamIds::new();
        for index in 0..graph.node(node).outputs.len() {
            let id = match inputs.get(index) {
                Some(id) => *id,
                None => ids.fresh()?,
            };
            produced.insert(StreamEndpoint::new(node, index), id);
            outputs.push(id);
        }

        tracing::trace!(
            "Node {node} streams: inputs {:?}, outputs {:?}",
            inputs.as_slice(),
            outputs.as_slice()
        );
        assignment.inputs.insert(node, inputs);
        assignment.outputs.insert(node, outputs);
    }

    assignment.used = ids.used;
    *pool = working;
    Ok(assignment)
}

/// Return identifiers of a finished run to the pool.
///
/// Identifiers are released in reverse order of first use. Identifiers still
/// carried by a reuse link stay out of the pool.
pub fn release_stream_ids(
    assignment: &StreamAssignment,
    links: &ReuseLinks,
    pool: &mut StreamIdPool,
) {
    let live = links.live_ids();
    for id in assignment.used.iter().rev() {
        if !live.contains(id) {
            pool.release(*id);
        }
    }
}

#[cfg(test)]
mod tests {
    use dspi_core::OperationKind;
    use dspi_testing::test_node;
    use itertools::Itertools;

    use super::*;

    fn sources(count: usize) -> ExecutionPlanGraph {
        ExecutionPlanGraph::try_from_nodes((0..count).map(|i| {
            test_node(
                &format!("n{i}"),
                OperationKind::Filter,
                &[&format!("table{i}")],
                &[],
            )
        }))
        .unwrap()
    }

    #[test]
    fn test_distinct_ids_up_to_limit() {
        let graph = sources(16);
        let nodes: Vec<_> = graph.nodes().indices().collect();
        let mut pool = StreamIdPool::new();
        let assignment =
            allocate_stream_ids(&graph, &nodes, &ReuseLinks::default(), &mut pool).unwrap();

        let ids: Vec<_> = nodes
            .iter()
            .flat_map(|node| assignment.input_ids(*node).to_vec())
            .collect();
        assert_eq!(ids.len(), 16);
        assert!(ids.iter().all_unique());
        assert!(ids.iter().all(|id| id.index() < 16));
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn test_exhausted_beyond_limit() {
        let graph = sources(17);
        let nodes: Vec<_> = graph.nodes().indices().collect();
        let mut pool = StreamIdPool::new();
        let error = allocate_stream_ids(&graph, &nodes, &ReuseLinks::default(), &mut pool)
            .unwrap_err();
        assert!(matches!(error.current_context(), Error::StreamPoolExhausted));
        // A failed assignment leaves the pool untouched.
        assert!(pool.is_full());
    }

    #[test]
    fn test_producer_and_consumer_share_id() {
        let graph = ExecutionPlanGraph::try_from_nodes([
            test_node("a", OperationKind::Filter, &["table"], &["x"]),
            test_node("b", OperationKind::Join, &["other", "x"], &["y"]),
        ])
        .unwrap();
        let a = graph.node_id("a").unwrap();
        let b = graph.node_id("b").unwrap();
        let mut pool = StreamIdPool::new();
        let assignment =
            allocate_stream_ids(&graph, &[a, b], &ReuseLinks::default(), &mut pool).unwrap();

        assert_eq!(assignment.output_ids(a)[0], assignment.input_ids(b)[1]);
        let id = |i: usize| StreamId::new(i).unwrap();
        assert_eq!(assignment.input_ids(a), &[id(0)]);
        assert_eq!(assignment.input_ids(b), &[id(1), id(0)]);
        assert_eq!(assignment.output_ids(b), &[id(1)]);
        assert_eq!(assignment.used, vec![id(0), id(1)]);
    }

    #[test]
    fn test_extra_outputs_take_fresh_ids() {
        let graph = ExecutionPlanGraph::try_from_nodes([test_node(
            "split",
            OperationKind::Filter,
            &["table"],
            &["low", "high"],
        )])
        .unwrap();
        let split = graph.node_id("split").unwrap();
        let mut pool = StreamIdPool::new();
        let assignment =
            allocate_stream_ids(&graph, &[split], &ReuseLinks::default(), &mut pool).unwrap();

        let id = |i: usize| StreamId::new(i).unwrap();
        assert_eq!(assignment.output_ids(split), &[id(0), id(1)]);
    }

    #[test]
    fn test_carried_id_crosses_runs() {
        let graph = ExecutionPlanGraph::try_from_nodes([
            test_node("a", OperationKind::Filter, &["t0", "t1"], &["x", "unused"]),
            test_node("b", OperationKind::Join, &["t2", "x"], &["y"]),
        ])
        .unwrap();
        let a = graph.node_id("a").unwrap();
        let b = graph.node_id("b").unwrap();

        let mut pool = StreamIdPool::new();
        let mut links = ReuseLinks::default();
        links.add_run(&graph, &[a]);
        let first = allocate_stream_ids(&graph, &[a], &links, &mut pool).unwrap();
        links.assign_ids(&[a], &first);
        release_stream_ids(&first, &links, &mut pool);

        // `x` continues on a's first input id, which stays reserved.
        let carried = first.output_ids(a)[0];
        assert_eq!(pool.available(), 15);

        let second = allocate_stream_ids(&graph, &[b], &links, &mut pool).unwrap();
        assert_eq!(second.input_ids(b)[1], carried);
        assert_ne!(second.input_ids(b)[0], carried);

        links.consume(StreamEndpoint::new(a, 0), StreamEndpoint::new(b, 1));
        release_stream_ids(&second, &links, &mut pool);
        assert!(pool.is_full());
    }
}
