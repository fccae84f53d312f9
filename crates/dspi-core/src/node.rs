use std::fmt;

use hashbrown::HashMap;
use itertools::Itertools;

/// The operation performed by a query node.
///
/// Every kind except [OperationKind::PassThrough] is executed by a
/// configurable hardware module.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    serde::Serialize,
    serde::Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OperationKind {
    /// Data is streamed through without any module.
    PassThrough,
    Filter,
    Join,
    MergeSort,
    LinearSort,
    Addition,
    Multiplication,
    AggregationSum,
}

impl OperationKind {
    /// Return true if nodes of this kind occupy a module in the accelerator.
    pub fn requires_module(&self) -> bool {
        !matches!(self, OperationKind::PassThrough)
    }
}

/// A module as it appears in a bitstream: the operation and the parameters
/// (such as comparison lanes or sort buffer size) it was synthesized with.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct ModuleSpec {
    pub operation: OperationKind,
    #[serde(default)]
    pub parameters: Vec<i32>,
}

impl ModuleSpec {
    pub fn new(operation: OperationKind, parameters: impl Into<Vec<i32>>) -> Self {
        Self {
            operation,
            parameters: parameters.into(),
        }
    }
}

impl From<OperationKind> for ModuleSpec {
    fn from(operation: OperationKind) -> Self {
        Self {
            operation,
            parameters: vec![],
        }
    }
}

impl fmt::Display for ModuleSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.parameters.is_empty() {
            write!(f, "{}", self.operation)
        } else {
            write!(f, "{}({})", self.operation, self.parameters.iter().format(","))
        }
    }
}

/// An ordered list of modules loaded together as one bitstream.
///
/// Order matters: data flows through the modules from first to last.
pub type ModuleCombination = Vec<ModuleSpec>;

/// The type of a column in a stream.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    serde::Serialize,
    serde::Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ColumnType {
    Integer,
    Varchar,
    Decimal,
    Date,
    Null,
}

/// Describes the data carried on one input or output stream of a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StreamParams {
    /// Integer positions within the incoming record to place on the stream,
    /// in order. Empty means the whole record unchanged.
    #[serde(default)]
    pub projection: Vec<usize>,
    /// The type of each column.
    #[serde(default)]
    pub data_types: Vec<ColumnType>,
    /// The size of each column in units of its type.
    #[serde(default)]
    pub data_sizes: Vec<usize>,
    /// Chunks per record expected at the end of the accelerator chain.
    #[serde(default)]
    pub chunk_count: Option<usize>,
    /// Record count of each channel for multichannel streams.
    #[serde(default)]
    pub channels: Option<Vec<usize>>,
    /// Records held by a source table. Filled in by the input manager.
    #[serde(default)]
    pub record_count: Option<usize>,
}

impl StreamParams {
    /// Width of one record in integers.
    ///
    /// Each column takes `ceil(type_size * column_size)` integers, where the
    /// type sizes come from the configuration. Unknown types count as one
    /// integer per unit.
    pub fn record_size(&self, type_sizes: &HashMap<ColumnType, f64>) -> usize {
        self.data_types
            .iter()
            .zip(&self.data_sizes)
            .map(|(column_type, size)| {
                let scale = type_sizes.get(column_type).copied().unwrap_or(1.0);
                (scale * *size as f64).ceil() as usize
            })
            .sum()
    }
}

/// One operator instance in the execution plan.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct QueryNode {
    /// Unique name of the node. Also used to name result artifacts.
    pub name: String,
    pub operation: OperationKind,
    /// Parameters of the module variant this node requires.
    #[serde(default)]
    pub module_parameters: Vec<i32>,
    /// Names of the consumed streams, in order.
    #[serde(default)]
    pub inputs: Vec<String>,
    /// Names of the produced streams, in order.
    #[serde(default)]
    pub outputs: Vec<String>,
    #[serde(default)]
    pub input_params: Vec<StreamParams>,
    #[serde(default)]
    pub output_params: Vec<StreamParams>,
    /// Operation specific configuration values (filter constants, etc.).
    #[serde(default)]
    pub operation_parameters: Vec<Vec<i32>>,
}

impl QueryNode {
    pub fn new(name: impl Into<String>, operation: OperationKind) -> Self {
        Self {
            name: name.into(),
            operation,
            module_parameters: vec![],
            inputs: vec![],
            outputs: vec![],
            input_params: vec![],
            output_params: vec![],
            operation_parameters: vec![],
        }
    }

    pub fn with_module_parameters(mut self, parameters: impl Into<Vec<i32>>) -> Self {
        self.module_parameters = parameters.into();
        self
    }

    pub fn with_input(mut self, stream: impl Into<String>, params: StreamParams) -> Self {
        self.inputs.push(stream.into());
        self.input_params.push(params);
        self
    }

    pub fn with_output(mut self, stream: impl Into<String>, params: StreamParams) -> Self {
        self.outputs.push(stream.into());
        self.output_params.push(params);
        self
    }

    /// The module this node needs, or `None` if it streams through without one.
    pub fn module(&self) -> Option<ModuleSpec> {
        self.operation
            .requires_module()
            .then(|| ModuleSpec::new(self.operation, self.module_parameters.clone()))
    }

    pub fn input_params(&self, index: usize) -> Option<&StreamParams> {
        self.input_params.get(index)
    }

    pub fn output_params(&self, index: usize) -> Option<&StreamParams> {
        self.output_params.get(index)
    }
}
