use std::fmt;

use dspi_core::{
    Configuration, ExecutionPlanGraph, ModuleCombination, NodeId, OperationKind, StreamId,
    StreamParams,
};
use dspi_dma::{setup_streams, DmaSetupData, StreamDirection, StreamRequest, DMA_SLOT};
use error_stack::ResultExt;
use itertools::Itertools;

use crate::{Error, Run, StreamAssignment, StreamMemory};

/// Configuration of one node within a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSetup {
    pub node: NodeId,
    pub name: String,
    pub operation: OperationKind,
    /// Driver configured for the node's module kind.
    pub driver: Option<String>,
    /// Register window of the node's module. `None` for pass-through nodes.
    pub slot: Option<usize>,
    pub input_ids: Vec<StreamId>,
    pub output_ids: Vec<StreamId>,
    pub module_parameters: Vec<i32>,
    pub operation_parameters: Vec<Vec<i32>>,
}

/// Everything needed to configure and execute one run.
#[derive(Debug, Clone)]
pub struct RunSetup {
    /// Position of the run within the schedule.
    pub index: usize,
    pub bitstream: String,
    pub modules: ModuleCombination,
    /// Nodes in placement order.
    pub nodes: Vec<NodeSetup>,
    pub assignment: StreamAssignment,
    /// Streams read from host memory.
    pub inputs: Vec<DmaSetupData>,
    /// Streams written to host memory.
    pub outputs: Vec<DmaSetupData>,
    /// Outputs nothing else in the graph consumes.
    pub result_streams: Vec<String>,
}

fn record_size(
    config: &Configuration,
    params: Option<&StreamParams>,
    node: &str,
    stream: &str,
) -> error_stack::Result<usize, Error> {
    let size = params.map_or(0, |params| config.record_size(params));
    error_stack::ensure!(
        size > 0,
        Error::EmptyRecord {
            node: node.to_owned(),
            stream: stream.to_owned(),
        }
    );
    Ok(size)
}

impl RunSetup {
    /// Derive the node and DMA configuration of a selected run.
    pub fn try_new(
        index: usize,
        run: Run,
        assignment: StreamAssignment,
        graph: &ExecutionPlanGraph,
        config: &Configuration,
        memory: &mut StreamMemory,
    ) -> error_stack::Result<Self, Error> {
        let mut input_requests = Vec::new();
        let mut output_requests = Vec::new();
        let mut result_streams = Vec::new();
        let mut nodes = Vec::with_capacity(run.nodes.len());

        for &id in &run.nodes {
            let node = graph.node(id);
            let input_ids = assignment.input_ids(id);
            let output_ids = assignment.output_ids(id);

            for (input, (stream, producer)) in
                node.inputs.iter().zip(graph.input_producers(id)).enumerate()
            {
                if producer.map_or(false, |producer| run.contains(producer.node)) {
                    continue;
                }
                let params = node.input_params(input);
                let mut request = StreamRequest::new(
                    input_ids[input],
                    StreamDirection::Input,
                    record_size(config, params, &node.name, stream)?,
                );
                request.address = memory.address_of(stream);
                if let Some(params) = params {
                    request.record_count = params.record_count.unwrap_or(0);
                    request.projection = params.projection.clone();
                    request.channels = params.channels.clone();
                }
                input_requests.push(request);
            }

            for (output, stream) in node.outputs.iter().enumerate() {
                let consumers = graph.consumers(stream);
                if consumers.is_empty() {
                    result_streams.push(stream.clone());
                }
                if consumers
                    .iter()
                    .any(|consumer| run.contains(consumer.node))
                {
                    continue;
                }
                let params = node.output_params(output);
                let mut request = StreamRequest::new(
                    output_ids[output],
                    StreamDirection::Output,
                    record_size(config, params, &node.name, stream)?,
                );
                request.address = memory.address_of(stream);
                if let Some(params) = params {
                    request.projection = params.projection.clone();
                    request.chunk_count = params.chunk_count;
                }
                output_requests.push(request);
            }

            nodes.push(NodeSetup {
                node: id,
                name: node.name.clone(),
                operation: node.operation,
                driver: config.driver_id(node.operation).map(str::to_owned),
                slot: run.module_position(id).map(|position| DMA_SLOT + 1 + position),
                input_ids: input_ids.to_vec(),
                output_ids: output_ids.to_vec(),
                module_parameters: node.module_parameters.clone(),
                operation_parameters: node.operation_parameters.clone(),
            });
        }

        let inputs = setup_streams(&input_requests).change_context(Error::DmaSetup(index))?;
        let outputs = setup_streams(&output_requests).change_context(Error::DmaSetup(index))?;

        Ok(Self {
            index,
            bitstream: run.bitstream,
            modules: run.modules,
            nodes,
            assignment,
            inputs,
            outputs,
            result_streams,
        })
    }

    /// Identifiers of the streams the DMA engine starts in a direction.
    pub fn active_streams(&self, direction: StreamDirection) -> impl Iterator<Item = StreamId> + '_ {
        let streams = match direction {
            StreamDirection::Input => &self.inputs,
            StreamDirection::Output => &self.outputs,
        };
        streams.iter().map(|setup| setup.stream_id)
    }
}

impl fmt::Display for RunSetup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "run {}: {} [{}]",
            self.index,
            self.bitstream,
            self.modules.iter().format(", ")
        )?;
        for node in &self.nodes {
            let slot = node
                .slot
                .map_or_else(|| "-".to_owned(), |slot| slot.to_string());
            writeln!(
                f,
                "  {} ({}, slot {slot}): in [{}] out [{}]",
                node.name,
                node.operation,
                node.input_ids.iter().format(", "),
                node.output_ids.iter().format(", ")
            )?;
        }
        Ok(())
    }
}
