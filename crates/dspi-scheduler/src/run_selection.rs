use bitvec::vec::BitVec;
use dspi_core::{Configuration, ExecutionPlanGraph, ModuleCombination, ModuleSpec, NodeId};
use itertools::Itertools;

use crate::{allocate_stream_ids, Error, ReuseLinks, StreamIdPool};

/// A set of nodes executed together on one bitstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    pub bitstream: String,
    /// Modules of the bitstream in data flow order.
    pub modules: ModuleCombination,
    /// The node executed by each module.
    pub module_nodes: Vec<NodeId>,
    /// All nodes of the run in placement order. Producers precede their
    /// in-run consumers.
    pub nodes: Vec<NodeId>,
}

impl Run {
    /// The module slot position of a node, if it occupies a module.
    pub fn module_position(&self, node: NodeId) -> Option<usize> {
        self.module_nodes.iter().position(|n| *n == node)
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains(&node)
    }
}

#[derive(Default)]
struct RunBuilder {
    modules: ModuleCombination,
    module_nodes: Vec<NodeId>,
    nodes: Vec<NodeId>,
}

/// Read-only view of the scheduling state needed to pick a run.
pub struct SelectionContext<'a> {
    pub graph: &'a ExecutionPlanGraph,
    pub config: &'a Configuration,
    /// Nodes placed in earlier runs.
    pub scheduled: &'a BitVec,
    pub links: &'a ReuseLinks,
    pub pool: &'a StreamIdPool,
}

impl<'a> SelectionContext<'a> {
    /// Earliest module position allowed for a node, given the in-run nodes
    /// feeding it.
    fn min_position(&self, run: &RunBuilder, node: NodeId) -> usize {
        self.graph
            .input_producers(node)
            .flatten()
            .filter(|producer| run.nodes.contains(&producer.node))
            .map(|producer| {
                match run.module_nodes.iter().position(|n| *n == producer.node) {
                    Some(position) => position + 1,
                    // Pass-through producers inherit the position of their inputs.
                    None => self.min_position(run, producer.node),
                }
            })
            .max()
            .unwrap_or(0)
    }

    /// Return true if all inputs of the node are available to the run.
    ///
    /// A stream produced inside the run stays on the device only if the node
    /// is its sole consumer. Otherwise the node waits for a later run.
    fn is_eligible(&self, run: &RunBuilder, node: NodeId) -> bool {
        let inputs = &self.graph.node(node).inputs;
        self.graph
            .input_producers(node)
            .zip(inputs)
            .all(|(producer, stream)| match producer {
                None => true,
                Some(producer) if self.scheduled[producer.node.index()] => true,
                Some(producer) if run.nodes.contains(&producer.node) => {
                    self.graph.consumers(stream).len() == 1
                }
                Some(_) => false,
            })
    }

    /// Try to add the node to the run.
    fn try_place(
        &self,
        run: &mut RunBuilder,
        node: NodeId,
    ) -> error_stack::Result<bool, Error> {
        if !self.is_eligible(run, node) {
            return Ok(false);
        }

        let placement = match self.graph.node(node).module() {
            None => None,
            Some(module) => match self.find_position(run, node, module) {
                Some(placement) => Some(placement),
                None => return Ok(false),
            },
        };

        let mut nodes = run.nodes.clone();
        nodes.push(node);
        let mut pool = self.pool.clone();
        if let Err(error) = allocate_stream_ids(self.graph, &nodes, self.links, &mut pool) {
            if matches!(error.current_context(), Error::StreamPoolExhausted) {
                tracing::trace!("Node {node} does not fit the remaining stream ids");
                return Ok(false);
            }
            return Err(error);
        }

        if let Some((position, module)) = placement {
            tracing::trace!("Placing node {node} as module {module} at position {position}");
            run.modules.insert(position, module);
            run.module_nodes.insert(position, node);
        } else {
            tracing::trace!("Placing pass-through node {node}");
        }
        run.nodes = nodes;
        Ok(true)
    }

    /// The earliest position the module can be inserted at such that the
    /// combination is a library bitstream within memory capacity.
    fn find_position(
        &self,
        run: &RunBuilder,
        node: NodeId,
        module: ModuleSpec,
    ) -> Option<(usize, ModuleSpec)> {
        if !self.config.supports_module(&module) {
            tracing::trace!("Module {module} of node {node} is not in the module library");
            return None;
        }

        let min_position = self.min_position(run, node);
        (min_position..=run.modules.len())
            .find(|position| {
                let mut candidate = run.modules.clone();
                candidate.insert(*position, module.clone());
                self.config.bitstream(&candidate).is_some()
                    && self.config.combination_footprint(&candidate)
                        <= self.config.reconfigurable_capacity
            })
            .map(|position| (position, module))
    }

    /// Greedily build the next run.
    ///
    /// Repeatedly places the first unscheduled node (in insertion order) that
    /// is eligible and fits, until no further node fits.
    pub fn select_run(&self) -> error_stack::Result<Run, Error> {
        let mut run = RunBuilder::default();
        loop {
            let mut placed = false;
            for node in self.graph.nodes().indices() {
                if self.scheduled[node.index()] || run.nodes.contains(&node) {
                    continue;
                }
                if self.try_place(&mut run, node)? {
                    placed = true;
                    break;
                }
            }
            if !placed {
                break;
            }
        }

        let remaining = || {
            self.graph
                .nodes()
                .iter_enumerated()
                .filter(|(id, _)| !self.scheduled[id.index()])
                .map(|(_, node)| node.name.as_str())
                .join(", ")
        };
        if run.nodes.is_empty() {
            return Err(error_stack::report!(Error::NoEligibleModuleCombination)
                .attach_printable(format!("unscheduled nodes: {}", remaining())));
        }

        let Some(bitstream) = self.config.bitstream(&run.modules) else {
            return Err(error_stack::report!(Error::NoEligibleModuleCombination)
                .attach_printable(format!(
                    "no bitstream for modules [{}]",
                    run.modules.iter().format(", ")
                )));
        };

        tracing::debug!(
            "Selected run '{bitstream}' with nodes {}",
            run.nodes
                .iter()
                .map(|node| self.graph.node(*node).name.as_str())
                .join(", ")
        );
        Ok(Run {
            bitstream: bitstream.to_owned(),
            modules: run.modules,
            module_nodes: run.module_nodes,
            nodes: run.nodes,
        })
    }
}

#[cfg(test)]
mod tests {
    use bitvec::bitvec;
    use dspi_core::constants::MODULE_SIZE;
    use dspi_core::OperationKind::*;
    use dspi_testing::{filter_join_config, filter_join_graph, module, test_node};

    use super::*;

    fn select(
        graph: &ExecutionPlanGraph,
        config: &Configuration,
        scheduled: &BitVec,
    ) -> error_stack::Result<Run, Error> {
        SelectionContext {
            graph,
            config,
            scheduled,
            links: &ReuseLinks::default(),
            pool: &StreamIdPool::new(),
        }
        .select_run()
    }

    fn names(graph: &ExecutionPlanGraph, run: &Run) -> Vec<String> {
        run.nodes
            .iter()
            .map(|node| graph.node(*node).name.clone())
            .collect()
    }

    #[test]
    fn test_shared_combination_then_exclusive() {
        let graph = filter_join_graph();
        let config = filter_join_config();
        let mut scheduled = bitvec![0; graph.len()];

        let first = select(&graph, &config, &scheduled).unwrap();
        assert_eq!(names(&graph, &first), vec!["filter_a", "filter_b"]);
        assert_eq!(first.bitstream, "filter_filter");

        for node in &first.nodes {
            scheduled.set(node.index(), true);
        }
        let second = select(&graph, &config, &scheduled).unwrap();
        assert_eq!(names(&graph, &second), vec!["join"]);
        assert_eq!(second.bitstream, "join");
    }

    #[test]
    fn test_consumer_module_follows_producer() {
        let graph = ExecutionPlanGraph::try_from_nodes([
            test_node("sort", LinearSort, &["table"], &["sorted"]),
            test_node("filter", Filter, &["other"], &["filtered"]),
            test_node("merge", MergeSort, &["sorted"], &["merged"]),
        ])
        .unwrap();
        let config = Configuration::default()
            .with_accelerator([module(LinearSort)], "sort")
            .with_accelerator([module(Filter), module(LinearSort)], "filter_sort")
            .with_accelerator(
                [module(Filter), module(LinearSort), module(MergeSort)],
                "filter_sort_merge",
            );

        let run = select(&graph, &config, &bitvec![0; 3]).unwrap();
        assert_eq!(run.bitstream, "filter_sort_merge");
        assert_eq!(names(&graph, &run), vec!["sort", "filter", "merge"]);
        assert_eq!(run.module_position(graph.node_id("merge").unwrap()), Some(2));
    }

    #[test]
    fn test_memory_capacity_splits_runs() {
        let graph = ExecutionPlanGraph::try_from_nodes([
            test_node("a", Filter, &["t0"], &["a_out"]),
            test_node("b", Filter, &["t1"], &["b_out"]),
        ])
        .unwrap();
        let config = filter_join_config().with_capacity(MODULE_SIZE);

        let run = select(&graph, &config, &bitvec![0; 2]).unwrap();
        assert_eq!(names(&graph, &run), vec!["a"]);
        assert_eq!(run.bitstream, "filter");
    }

    #[test]
    fn test_shared_stream_goes_through_memory() {
        let graph = ExecutionPlanGraph::try_from_nodes([
            test_node("a", Filter, &["t"], &["x"]),
            test_node("b", Filter, &["x"], &["b_out"]),
            test_node("c", Filter, &["x"], &["c_out"]),
        ])
        .unwrap();
        let config = filter_join_config();

        let run = select(&graph, &config, &bitvec![0; 3]).unwrap();
        assert_eq!(names(&graph, &run), vec!["a"]);
    }

    #[test]
    fn test_pass_through_takes_no_module() {
        let graph = ExecutionPlanGraph::try_from_nodes([
            test_node("a", Filter, &["t"], &["x"]),
            test_node("copy", PassThrough, &["x"], &["y"]),
            test_node("b", Filter, &["y"], &["z"]),
        ])
        .unwrap();
        let config = filter_join_config();

        let run = select(&graph, &config, &bitvec![0; 3]).unwrap();
        assert_eq!(names(&graph, &run), vec!["a", "copy", "b"]);
        assert_eq!(run.modules, vec![module(Filter), module(Filter)]);
        assert_eq!(run.module_position(graph.node_id("copy").unwrap()), None);
    }

    #[test]
    fn test_no_eligible_combination() {
        let graph =
            ExecutionPlanGraph::try_from_nodes([test_node("sum", AggregationSum, &["t"], &[])])
                .unwrap();
        let error = select(&graph, &filter_join_config(), &bitvec![0; 1]).unwrap_err();
        assert!(matches!(
            error.current_context(),
            Error::NoEligibleModuleCombination
        ));
    }
}
