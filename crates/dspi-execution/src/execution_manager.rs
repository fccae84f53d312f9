use dspi_core::{Configuration, ExecutionPlanGraph};
use dspi_scheduler::{Accelerator, BenchmarkStats, RunScheduler, RunSetup};
use error_stack::ResultExt;
use itertools::Itertools;

use crate::Error;

/// Schedules execution plans onto an accelerator.
///
/// Every scheduling error, including an exceeded time limit, is fatal here.
#[derive(Debug, Default)]
pub struct ExecutionManager<A> {
    accelerator: A,
}

impl<A: Accelerator> ExecutionManager<A> {
    pub fn new(accelerator: A) -> Self {
        Self { accelerator }
    }

    pub fn accelerator(&self) -> &A {
        &self.accelerator
    }

    /// Execute the graph and return the names of its result streams.
    pub fn execute(
        &mut self,
        graph: &ExecutionPlanGraph,
        config: &Configuration,
    ) -> error_stack::Result<Vec<String>, Error> {
        let runs = RunScheduler::new(graph, config)
            .run(&mut self.accelerator)
            .change_context(Error::Scheduling)?;

        let results: Vec<_> = runs
            .iter()
            .flat_map(|run| run.result_streams.iter().cloned())
            .collect();
        tracing::info!(
            "Executed {} nodes in {} runs. Results: {}",
            graph.len(),
            runs.len(),
            results.iter().format(", ")
        );
        Ok(results)
    }
}

/// Schedule the graph without executing it.
pub fn plan(
    graph: &ExecutionPlanGraph,
    config: &Configuration,
) -> error_stack::Result<Vec<RunSetup>, Error> {
    RunScheduler::new(graph, config)
        .plan()
        .change_context(Error::Scheduling)
}

/// Time repeated scheduling passes over the graph.
pub fn benchmark(
    graph: &ExecutionPlanGraph,
    config: &Configuration,
    iterations: usize,
) -> error_stack::Result<BenchmarkStats, Error> {
    RunScheduler::new(graph, config)
        .benchmark(iterations)
        .change_context(Error::Scheduling)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use dspi_testing::{filter_join_config, filter_join_graph};

    use super::*;
    use crate::SimulatedAccelerator;

    #[test]
    fn test_execute_returns_result_streams() {
        let graph = filter_join_graph();
        let config = filter_join_config();
        let mut manager = ExecutionManager::new(SimulatedAccelerator::default());
        let results = manager.execute(&graph, &config).unwrap();
        assert_eq!(results, vec!["joined".to_owned()]);
        assert_eq!(manager.accelerator().bitstream(), Some("join"));
    }

    #[test]
    fn test_time_limit_is_fatal() {
        let graph = filter_join_graph();
        let config = filter_join_config().with_time_limit(Duration::ZERO);
        let mut manager = ExecutionManager::new(SimulatedAccelerator::default());
        let error = manager.execute(&graph, &config).unwrap_err();
        assert!(matches!(error.current_context(), Error::Scheduling));
        assert!(matches!(
            error.downcast_ref::<dspi_scheduler::Error>(),
            Some(dspi_scheduler::Error::TimeLimitExceeded(_))
        ));
        assert_eq!(manager.accelerator().bitstream(), None);
    }

    #[test]
    fn test_benchmark_survives_time_limit() {
        let graph = filter_join_graph();
        let config = filter_join_config().with_time_limit(Duration::ZERO);
        let stats = benchmark(&graph, &config, 2).unwrap();
        assert!(stats.timed_out);
    }
}
