use std::path::PathBuf;

use dspi_core::{Configuration, ExecutionPlanGraph};
use dspi_execution::InputManager;
use error_stack::ResultExt;

use crate::{time_limit, Error, FileInputManager};

/// The execution plan and configuration a command works on.
#[derive(clap::Args, Debug)]
pub struct PlanArgs {
    /// YAML file containing the execution plan graph.
    pub graph: PathBuf,

    /// The `config.ini` file describing the accelerator.
    pub config: PathBuf,

    /// Scheduling time limit in seconds. Overrides `TIME_LIMIT_SECONDS`.
    #[arg(long)]
    pub time_limit: Option<f64>,
}

impl PlanArgs {
    pub fn load(&self) -> error_stack::Result<(ExecutionPlanGraph, Configuration), Error> {
        let (graph, mut config) = FileInputManager
            .parse(&self.graph, &self.config)
            .change_context(Error::ReadingInput)?;
        if let Some(seconds) = self.time_limit {
            config.time_limit = Some(time_limit(seconds).change_context(Error::InvalidTimeLimit)?);
        }
        Ok((graph, config))
    }
}
