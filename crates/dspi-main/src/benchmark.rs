use dspi_scheduler::BenchmarkStats;
use error_stack::ResultExt;
use tracing::{info, info_span};

use crate::{Error, PlanArgs};

/// Options for the Benchmark command.
#[derive(clap::Args, Debug)]
pub struct BenchmarkCommand {
    #[command(flatten)]
    pub plan: PlanArgs,

    /// Number of scheduling passes to time.
    #[arg(long, default_value_t = 10)]
    pub iterations: usize,
}

impl BenchmarkCommand {
    pub fn execute(self) -> error_stack::Result<BenchmarkStats, Error> {
        let span = info_span!("DSPI benchmark");
        let _enter = span.enter();
        info!("Options: {:?}", self);

        let (graph, config) = self.plan.load()?;
        let stats = dspi_execution::benchmark(&graph, &config, self.iterations)
            .change_context(Error::Benchmark)?;

        #[allow(clippy::print_stdout)]
        {
            println!("{stats}");
        }
        Ok(stats)
    }
}
