//! Small graphs and configurations shared between test suites.

use dspi_core::{
    ColumnType, Configuration, ExecutionPlanGraph, ModuleSpec, OperationKind, QueryNode,
    StreamParams,
};

/// Stream parameters for records of `width` integer columns.
pub fn integer_stream(width: usize) -> StreamParams {
    StreamParams {
        data_types: vec![ColumnType::Integer; width],
        data_sizes: vec![1; width],
        ..StreamParams::default()
    }
}

/// A node whose streams all carry 4 integer records.
pub fn test_node(
    name: &str,
    operation: OperationKind,
    inputs: &[&str],
    outputs: &[&str],
) -> QueryNode {
    let mut node = QueryNode::new(name, operation);
    for input in inputs {
        node = node.with_input(*input, integer_stream(4));
    }
    for output in outputs {
        node = node.with_output(*output, integer_stream(4));
    }
    node
}

pub fn module(operation: OperationKind) -> ModuleSpec {
    ModuleSpec::from(operation)
}

/// Three nodes: two filters over source tables feeding a join.
///
/// `filter_a` and `filter_b` fit the `filter_filter` bitstream together. The
/// join needs its own bitstream.
pub fn filter_join_graph() -> ExecutionPlanGraph {
    ExecutionPlanGraph::try_from_nodes([
        test_node("filter_a", OperationKind::Filter, &["table_a"], &["a"]),
        test_node("filter_b", OperationKind::Filter, &["table_b"], &["b"]),
        test_node("join", OperationKind::Join, &["a", "b"], &["joined"]),
    ])
    .expect("valid test graph")
}

/// Library with the bitstreams used by [filter_join_graph].
pub fn filter_join_config() -> Configuration {
    use OperationKind::*;
    Configuration::default()
        .with_accelerator([module(Filter)], "filter")
        .with_accelerator([module(Filter), module(Filter)], "filter_filter")
        .with_accelerator([module(Join)], "join")
}
