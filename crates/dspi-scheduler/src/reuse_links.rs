use std::collections::BTreeMap;

use dspi_core::{ExecutionPlanGraph, NodeId, StreamEndpoint, StreamId};
use hashbrown::HashSet;
use itertools::Itertools;

use crate::StreamAssignment;

/// A run output that is read again by later runs.
///
/// The stream's memory and its identifier persist until every target has
/// been set up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReuseLink {
    pub stream: String,
    /// Consumers (node, input index) in later runs still waiting for the data.
    pub targets: Vec<StreamEndpoint>,
    /// Identifier the stream had when it was produced.
    pub stream_id: Option<StreamId>,
}

/// Reuse links keyed by the producing (node, output index).
#[derive(Debug, Clone, Default)]
pub struct ReuseLinks {
    links: BTreeMap<StreamEndpoint, ReuseLink>,
}

impl ReuseLinks {
    /// Create links for every output of the run consumed outside of it.
    pub fn add_run(&mut self, graph: &ExecutionPlanGraph, nodes: &[NodeId]) {
        let in_run: HashSet<NodeId> = nodes.iter().copied().collect();
        for &node in nodes {
            for (index, stream) in graph.node(node).outputs.iter().enumerate() {
                let targets: Vec<_> = graph
                    .consumers(stream)
                    .iter()
                    .filter(|consumer| !in_run.contains(&consumer.node))
                    .copied()
                    .collect();
                if targets.is_empty() {
                    continue;
                }

                tracing::debug!(
                    "Reuse link for '{stream}' from node {node} to {}",
                    targets
                        .iter()
                        .map(|target| format!("{}[{}]", target.node, target.index))
                        .join(", ")
                );
                self.links.insert(
                    StreamEndpoint::new(node, index),
                    ReuseLink {
                        stream: stream.clone(),
                        targets,
                        stream_id: None,
                    },
                );
            }
        }
    }

    /// The identifier carried from `producer` to `consumer`, if linked.
    pub fn carried_id(
        &self,
        producer: StreamEndpoint,
        consumer: StreamEndpoint,
    ) -> Option<StreamId> {
        let link = self.links.get(&producer)?;
        if link.targets.contains(&consumer) {
            link.stream_id
        } else {
            None
        }
    }

    /// Record the identifiers of links produced by a run.
    pub fn assign_ids(&mut self, nodes: &[NodeId], assignment: &StreamAssignment) {
        for &node in nodes {
            let Some(outputs) = assignment.outputs.get(&node) else {
                continue;
            };
            for (index, id) in outputs.iter().enumerate() {
                if let Some(link) = self.links.get_mut(&StreamEndpoint::new(node, index)) {
                    link.stream_id = Some(*id);
                }
            }
        }
    }

    /// Mark the target as served, dropping the link once no target remains.
    pub fn consume(&mut self, producer: StreamEndpoint, consumer: StreamEndpoint) {
        let Some(link) = self.links.get_mut(&producer) else {
            return;
        };
        link.targets.retain(|target| *target != consumer);
        if link.targets.is_empty() {
            tracing::trace!("Reuse link for '{}' fully consumed", link.stream);
            self.links.remove(&producer);
        }
    }

    /// Identifiers held by links that still have targets.
    pub fn live_ids(&self) -> HashSet<StreamId> {
        self.links
            .values()
            .filter_map(|link| link.stream_id)
            .collect()
    }

    pub fn get(&self, producer: StreamEndpoint) -> Option<&ReuseLink> {
        self.links.get(&producer)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StreamEndpoint, &ReuseLink)> + '_ {
        self.links.iter()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}
