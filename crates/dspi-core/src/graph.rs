use error_stack::{IntoReport, ResultExt};
use hashbrown::HashMap;
use index_vec::{IndexSlice, IndexVec};

use crate::{Error, QueryNode};

index_vec::define_index_type! {
    /// The identifier (index) of a node in the execution plan graph.
    ///
    /// Identifiers follow insertion order, which is also the order the
    /// scheduler considers nodes in.
    pub struct NodeId = u32;

    DISPLAY_FORMAT = "{}";
}

/// One end of a stream: the node and the position of the stream within the
/// node's inputs (for consumers) or outputs (for producers).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamEndpoint {
    pub node: NodeId,
    pub index: usize,
}

impl StreamEndpoint {
    pub fn new(node: NodeId, index: usize) -> Self {
        Self { node, index }
    }
}

/// The query plan as a graph of nodes connected by named streams.
///
/// A stream connects the node listing it as an output (the producer) with
/// every node listing it as an input (the consumers). Streams without a
/// producer are read from source tables; streams without consumers are the
/// results of the plan.
#[derive(Debug, Default, Clone)]
pub struct ExecutionPlanGraph {
    nodes: IndexVec<NodeId, QueryNode>,
    by_name: HashMap<String, NodeId>,
    producers: HashMap<String, StreamEndpoint>,
    consumers: HashMap<String, Vec<StreamEndpoint>>,
}

impl ExecutionPlanGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_from_nodes(
        nodes: impl IntoIterator<Item = QueryNode>,
    ) -> error_stack::Result<Self, Error> {
        let mut graph = Self::new();
        for node in nodes {
            graph.add_node(node)?;
        }
        Ok(graph)
    }

    /// Add a node to the graph, wiring up its streams.
    pub fn add_node(&mut self, node: QueryNode) -> error_stack::Result<NodeId, Error> {
        error_stack::ensure!(
            !self.by_name.contains_key(&node.name),
            Error::invalid_graph(format!("duplicate node name '{}'", node.name))
        );
        for output in &node.outputs {
            if let Some(producer) = self.producers.get(output) {
                error_stack::bail!(Error::invalid_graph(format!(
                    "stream '{output}' produced by both '{}' and '{}'",
                    self.nodes[producer.node].name, node.name
                )));
            }
        }

        let id = self.nodes.next_idx();
        for (index, output) in node.outputs.iter().enumerate() {
            self.producers
                .insert(output.clone(), StreamEndpoint::new(id, index));
        }
        for (index, input) in node.inputs.iter().enumerate() {
            self.consumers
                .entry(input.clone())
                .or_default()
                .push(StreamEndpoint::new(id, index));
        }
        tracing::trace!(
            "Added node {id} '{}' ({} inputs, {} outputs)",
            node.name,
            node.inputs.len(),
            node.outputs.len()
        );
        self.by_name.insert(node.name.clone(), id);
        self.nodes.push(node);
        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &IndexSlice<NodeId, [QueryNode]> {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> &QueryNode {
        &self.nodes[id]
    }

    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.by_name.get(name).copied()
    }

    /// The node and output index producing the given stream, if any.
    pub fn producer(&self, stream: &str) -> Option<StreamEndpoint> {
        self.producers.get(stream).copied()
    }

    /// The nodes and input indices consuming the given stream.
    pub fn consumers(&self, stream: &str) -> &[StreamEndpoint] {
        self.consumers
            .get(stream)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Producers of each input of a node, in input order.
    pub fn input_producers(
        &self,
        id: NodeId,
    ) -> impl Iterator<Item = Option<StreamEndpoint>> + '_ {
        self.nodes[id]
            .inputs
            .iter()
            .map(|input| self.producer(input))
    }

    /// Resolve a list of node ids to references.
    ///
    /// Fails with [Error::InvalidReference] on the first id not in the graph.
    pub fn node_refs(&self, ids: &[NodeId]) -> error_stack::Result<Vec<&QueryNode>, Error> {
        ids.iter()
            .map(|id| {
                self.nodes
                    .get(*id)
                    .ok_or_else(|| error_stack::report!(Error::InvalidReference(*id)))
            })
            .collect()
    }

    /// Add the nodes from a serialized (YAML) fragment.
    ///
    /// The fragment is a sequence of nodes. Returns the ids of the new nodes.
    pub fn insert_data(&mut self, fragment: &str) -> error_stack::Result<Vec<NodeId>, Error> {
        let nodes: Vec<QueryNode> = serde_yaml::from_str(fragment)
            .into_report()
            .change_context(Error::Serialization)?;
        nodes.into_iter().map(|node| self.add_node(node)).collect()
    }

    /// Serialize all nodes (YAML) in insertion order.
    pub fn export_data(&self) -> error_stack::Result<String, Error> {
        let nodes: Vec<&QueryNode> = self.nodes.iter().collect();
        serde_yaml::to_string(&nodes)
            .into_report()
            .change_context(Error::Serialization)
    }
}
