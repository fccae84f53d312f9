use std::path::Path;

use dspi_core::{Configuration, ExecutionPlanGraph};

use crate::Error;

/// Builds the execution plan graph and the hardware configuration.
pub trait InputManager {
    fn parse(
        &self,
        input_file: &Path,
        config_file: &Path,
    ) -> error_stack::Result<(ExecutionPlanGraph, Configuration), Error>;
}

/// Post-processes the identifiers of the result streams.
pub trait OutputManager {
    fn parse(&self, result_ids: Vec<String>) -> error_stack::Result<Vec<String>, Error>;
}

/// Output manager returning the result identifiers unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityOutput;

impl OutputManager for IdentityOutput {
    fn parse(&self, result_ids: Vec<String>) -> error_stack::Result<Vec<String>, Error> {
        Ok(result_ids)
    }
}
