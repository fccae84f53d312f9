use std::collections::VecDeque;
use std::time::Instant;

use bitvec::vec::BitVec;
use dspi_core::{Configuration, ExecutionPlanGraph, StreamEndpoint};
use error_stack::ResultExt;

use crate::{
    allocate_stream_ids, release_stream_ids, Accelerator, BenchmarkStats, DryRun, Error,
    ReuseLinks, Run, RunSetup, SelectionContext, StreamIdPool, StreamMemory,
};

/// States of the run scheduler.
///
/// `Schedule -> SetupNodes -> Execute -> Schedule` repeats until every node is
/// scheduled. `BenchmarkSchedule` repeats full scheduling passes and ends in
/// `PrintBenchmark`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum SchedulerState {
    Schedule,
    SetupNodes,
    Execute,
    BenchmarkSchedule,
    PrintBenchmark,
}

/// Mutable state of one scheduling pass over the graph.
struct SchedulePass {
    /// Nodes placed in a selected run.
    scheduled: BitVec,
    /// Selected runs waiting to be set up.
    pending: VecDeque<Run>,
    /// The run set up and waiting to execute.
    current: Option<RunSetup>,
    links: ReuseLinks,
    pool: StreamIdPool,
    memory: StreamMemory,
    completed: Vec<RunSetup>,
}

impl SchedulePass {
    fn new(graph: &ExecutionPlanGraph) -> Self {
        Self {
            scheduled: BitVec::repeat(false, graph.len()),
            pending: VecDeque::new(),
            current: None,
            links: ReuseLinks::default(),
            pool: StreamIdPool::new(),
            memory: StreamMemory::default(),
            completed: Vec::new(),
        }
    }
}

struct BenchmarkState {
    iterations: usize,
    stats: BenchmarkStats,
}

/// Drives a graph through the scheduler states.
///
/// The scheduler is single threaded: each call to [RunScheduler::step]
/// performs one transition on the context it owns.
pub struct RunScheduler<'a> {
    graph: &'a ExecutionPlanGraph,
    config: &'a Configuration,
    pass: SchedulePass,
    deadline: Option<Instant>,
    finished: bool,
    benchmark: Option<BenchmarkState>,
}

impl<'a> RunScheduler<'a> {
    pub fn new(graph: &'a ExecutionPlanGraph, config: &'a Configuration) -> Self {
        Self {
            graph,
            config,
            pass: SchedulePass::new(graph),
            deadline: None,
            finished: false,
            benchmark: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Runs completed by the current pass, in execution order.
    pub fn completed(&self) -> &[RunSetup] {
        &self.pass.completed
    }

    pub fn pool(&self) -> &StreamIdPool {
        &self.pass.pool
    }

    pub fn links(&self) -> &ReuseLinks {
        &self.pass.links
    }

    /// Restart from an empty schedule. The time limit starts counting now.
    pub fn reset(&mut self) {
        self.pass = SchedulePass::new(self.graph);
        self.deadline = self
            .config
            .time_limit
            .map(|time_limit| Instant::now() + time_limit);
        self.finished = false;
    }

    fn check_deadline(&self) -> error_stack::Result<(), Error> {
        if let (Some(deadline), Some(time_limit)) = (self.deadline, self.config.time_limit) {
            error_stack::ensure!(
                Instant::now() < deadline,
                Error::TimeLimitExceeded(time_limit)
            );
        }
        Ok(())
    }

    /// Perform the action of `state` and return the next state.
    pub fn step(
        &mut self,
        state: SchedulerState,
        accelerator: &mut dyn Accelerator,
    ) -> error_stack::Result<SchedulerState, Error> {
        let next = match state {
            SchedulerState::Schedule => self.schedule()?,
            SchedulerState::SetupNodes => self.setup_nodes(accelerator)?,
            SchedulerState::Execute => self.execute(accelerator)?,
            SchedulerState::BenchmarkSchedule => self.benchmark_schedule()?,
            SchedulerState::PrintBenchmark => self.print_benchmark(),
        };
        tracing::trace!("Scheduler transition {state} -> {next}");
        Ok(next)
    }

    fn schedule(&mut self) -> error_stack::Result<SchedulerState, Error> {
        if self.pass.scheduled.all() {
            tracing::debug!(
                "All {} nodes scheduled in {} runs",
                self.graph.len(),
                self.pass.completed.len()
            );
            self.finished = true;
            return Ok(SchedulerState::Schedule);
        }
        self.check_deadline()?;

        let run = SelectionContext {
            graph: self.graph,
            config: self.config,
            scheduled: &self.pass.scheduled,
            links: &self.pass.links,
            pool: &self.pass.pool,
        }
        .select_run()?;

        for node in &run.nodes {
            self.pass.scheduled.set(node.index(), true);
        }
        self.pass.links.add_run(self.graph, &run.nodes);
        self.pass.pending.push_back(run);
        Ok(SchedulerState::SetupNodes)
    }

    fn setup_nodes(
        &mut self,
        accelerator: &mut dyn Accelerator,
    ) -> error_stack::Result<SchedulerState, Error> {
        let run = self
            .pass
            .pending
            .pop_front()
            .ok_or_else(|| error_stack::report!(Error::NoPendingRun("set up")))?;
        let index = self.pass.completed.len();

        let assignment =
            allocate_stream_ids(self.graph, &run.nodes, &self.pass.links, &mut self.pass.pool)?;

        for &node in &run.nodes {
            for (input, producer) in self.graph.input_producers(node).enumerate() {
                let Some(producer) = producer.filter(|p| !run.contains(p.node)) else {
                    continue;
                };
                self.pass
                    .links
                    .consume(producer, StreamEndpoint::new(node, input));
            }
        }
        self.pass.links.assign_ids(&run.nodes, &assignment);

        let setup = RunSetup::try_new(
            index,
            run,
            assignment,
            self.graph,
            self.config,
            &mut self.pass.memory,
        )?;
        tracing::debug!("Setting up {setup}");

        accelerator.load_bitstream(&setup.bitstream, &setup.modules)?;
        accelerator.setup_run(&setup)?;
        self.pass.current = Some(setup);
        Ok(SchedulerState::Execute)
    }

    fn execute(
        &mut self,
        accelerator: &mut dyn Accelerator,
    ) -> error_stack::Result<SchedulerState, Error> {
        let setup = self
            .pass
            .current
            .take()
            .ok_or_else(|| error_stack::report!(Error::NoPendingRun("execute")))?;

        accelerator
            .execute(&setup)
            .attach_printable_lazy(|| format!("run {} ('{}')", setup.index, setup.bitstream))?;
        release_stream_ids(&setup.assignment, &self.pass.links, &mut self.pass.pool);
        tracing::debug!(
            "Run {} finished, {} stream ids available",
            setup.index,
            self.pass.pool.available()
        );
        self.pass.completed.push(setup);
        Ok(SchedulerState::Schedule)
    }

    fn benchmark_schedule(&mut self) -> error_stack::Result<SchedulerState, Error> {
        let Some(benchmark) = &self.benchmark else {
            return Err(error_stack::report!(Error::NoPendingRun("benchmark")));
        };
        if benchmark.stats.iterations >= benchmark.iterations {
            return Ok(SchedulerState::PrintBenchmark);
        }

        let start = Instant::now();
        self.pass = SchedulePass::new(self.graph);
        let result = self.drive(SchedulerState::Schedule, &mut DryRun::default());
        self.finished = false;

        let stats = match &mut self.benchmark {
            Some(benchmark) => &mut benchmark.stats,
            None => return Err(error_stack::report!(Error::NoPendingRun("benchmark"))),
        };
        match result {
            Ok(()) => {
                stats.record(start.elapsed(), self.pass.completed.len());
                Ok(SchedulerState::BenchmarkSchedule)
            }
            Err(error) if matches!(error.current_context(), Error::TimeLimitExceeded(_)) => {
                tracing::info!("Benchmark stopped by the time limit: {error}");
                stats.timed_out = true;
                Ok(SchedulerState::PrintBenchmark)
            }
            Err(error) => Err(error),
        }
    }

    fn print_benchmark(&mut self) -> SchedulerState {
        if let Some(benchmark) = &self.benchmark {
            tracing::info!("Benchmark: {}", benchmark.stats);
        }
        self.finished = true;
        SchedulerState::PrintBenchmark
    }

    fn drive(
        &mut self,
        mut state: SchedulerState,
        accelerator: &mut dyn Accelerator,
    ) -> error_stack::Result<(), Error> {
        self.finished = false;
        while !self.finished {
            state = self.step(state, accelerator)?;
        }
        Ok(())
    }

    /// Schedule the whole graph, executing every run on the accelerator.
    ///
    /// Returns the runs in execution order. On failure the accelerator is
    /// reset before the error is returned.
    pub fn run(
        &mut self,
        accelerator: &mut dyn Accelerator,
    ) -> error_stack::Result<Vec<RunSetup>, Error> {
        let _span = tracing::info_span!("schedule", nodes = self.graph.len()).entered();
        self.reset();
        if let Err(error) = self.drive(SchedulerState::Schedule, accelerator) {
            tracing::warn!("Resetting the accelerator after a failed schedule");
            accelerator.reset();
            return Err(error);
        }
        Ok(std::mem::take(&mut self.pass.completed))
    }

    /// Schedule the whole graph without a device.
    pub fn plan(&mut self) -> error_stack::Result<Vec<RunSetup>, Error> {
        self.run(&mut DryRun::default())
    }

    /// Time `iterations` full scheduling passes.
    ///
    /// Exceeding the time limit ends the benchmark early with the statistics
    /// gathered so far.
    pub fn benchmark(&mut self, iterations: usize) -> error_stack::Result<BenchmarkStats, Error> {
        let _span = tracing::info_span!("benchmark", iterations).entered();
        self.reset();
        self.benchmark = Some(BenchmarkState {
            iterations,
            stats: BenchmarkStats::default(),
        });
        let result = self.drive(SchedulerState::BenchmarkSchedule, &mut DryRun::default());
        let stats = self
            .benchmark
            .take()
            .map(|benchmark| benchmark.stats)
            .unwrap_or_default();
        result.map(|()| stats)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use dspi_core::OperationKind::*;
    use dspi_testing::{filter_join_config, filter_join_graph, init_test_logging, test_node};
    use itertools::Itertools;

    use super::*;

    #[test]
    fn test_filter_join_takes_two_runs() {
        init_test_logging();
        let graph = filter_join_graph();
        let config = filter_join_config();
        let mut scheduler = RunScheduler::new(&graph, &config);

        let mut accelerator = DryRun::default();
        let runs = scheduler.run(&mut accelerator).unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(accelerator.loaded_bitstreams, 2);
        assert_eq!(runs[0].bitstream, "filter_filter");
        assert_eq!(runs[1].bitstream, "join");
        assert_eq!(runs[1].result_streams, vec!["joined".to_owned()]);

        assert!(scheduler.pool().is_full());
        assert!(scheduler.links().is_empty());

        insta::assert_snapshot!(runs.iter().join(""), @r###"
        run 0: filter_filter [filter, filter]
          filter_a (filter, slot 2): in [0] out [0]
          filter_b (filter, slot 1): in [1] out [1]
        run 1: join [join]
          join (join, slot 1): in [0, 1] out [0]
        "###);
    }

    #[test]
    fn test_transitions() {
        let graph = filter_join_graph();
        let config = filter_join_config();
        let mut scheduler = RunScheduler::new(&graph, &config);
        let mut accelerator = DryRun::default();

        let mut state = SchedulerState::Schedule;
        let mut states = vec![state];
        while !scheduler.is_finished() {
            state = scheduler.step(state, &mut accelerator).unwrap();
            states.push(state);
        }
        assert_eq!(
            states.iter().join(" -> "),
            "schedule -> setup_nodes -> execute -> schedule -> setup_nodes -> execute -> schedule \
             -> schedule"
        );
        assert_eq!(scheduler.completed().len(), 2);
    }

    #[test]
    fn test_execute_without_setup() {
        let graph = filter_join_graph();
        let config = filter_join_config();
        let mut scheduler = RunScheduler::new(&graph, &config);
        let error = scheduler
            .step(SchedulerState::Execute, &mut DryRun::default())
            .unwrap_err();
        assert!(matches!(
            error.current_context(),
            Error::NoPendingRun("execute")
        ));
    }

    #[test]
    fn test_pool_balanced_between_runs() {
        let graph = ExecutionPlanGraph::try_from_nodes([
            test_node("a", Filter, &["t"], &["x"]),
            test_node("b", Join, &["x", "u"], &["y"]),
            test_node("c", Join, &["x", "y"], &["z"]),
        ])
        .unwrap();
        let config = filter_join_config();
        let mut scheduler = RunScheduler::new(&graph, &config);
        let runs = scheduler.plan().unwrap();

        assert_eq!(runs.len(), 3);
        assert!(scheduler.pool().is_full());
        assert!(scheduler.links().is_empty());
    }

    #[test]
    fn test_time_limit_is_fatal_for_runs() {
        let graph = filter_join_graph();
        let config = filter_join_config().with_time_limit(Duration::ZERO);
        let error = RunScheduler::new(&graph, &config).plan().unwrap_err();
        assert!(matches!(
            error.current_context(),
            Error::TimeLimitExceeded(_)
        ));
    }

    #[test]
    fn test_time_limit_stops_benchmark() {
        let graph = filter_join_graph();
        let config = filter_join_config().with_time_limit(Duration::ZERO);
        let stats = RunScheduler::new(&graph, &config).benchmark(5).unwrap();
        assert!(stats.timed_out);
        assert_eq!(stats.iterations, 0);
    }

    #[test]
    fn test_benchmark_iterations() {
        let graph = filter_join_graph();
        let config = filter_join_config();
        let stats = RunScheduler::new(&graph, &config).benchmark(3).unwrap();
        assert_eq!(stats.iterations, 3);
        assert_eq!(stats.runs_per_iteration, 2);
        assert!(!stats.timed_out);
    }

    /// Accepts runs until `fail_at` and counts resets.
    #[derive(Default)]
    struct FailingAccelerator {
        fail_at: usize,
        executed: usize,
        resets: usize,
    }

    impl Accelerator for FailingAccelerator {
        fn load_bitstream(
            &mut self,
            _bitstream: &str,
            _modules: &[dspi_core::ModuleSpec],
        ) -> error_stack::Result<(), Error> {
            Ok(())
        }

        fn setup_run(&mut self, _run: &RunSetup) -> error_stack::Result<(), Error> {
            Ok(())
        }

        fn execute(&mut self, run: &RunSetup) -> error_stack::Result<(), Error> {
            error_stack::ensure!(run.index != self.fail_at, Error::accelerator("device fault"));
            self.executed += 1;
            Ok(())
        }

        fn reset(&mut self) {
            self.resets += 1;
        }
    }

    #[test]
    fn test_failed_run_resets_accelerator() {
        let graph = filter_join_graph();
        let config = filter_join_config();
        let mut accelerator = FailingAccelerator {
            fail_at: 1,
            ..FailingAccelerator::default()
        };
        let error = RunScheduler::new(&graph, &config)
            .run(&mut accelerator)
            .unwrap_err();
        assert!(matches!(error.current_context(), Error::Accelerator(_)));
        assert_eq!(accelerator.executed, 1);
        assert_eq!(accelerator.resets, 1);

        let mut accelerator = FailingAccelerator {
            fail_at: usize::MAX,
            ..FailingAccelerator::default()
        };
        RunScheduler::new(&graph, &config)
            .run(&mut accelerator)
            .unwrap();
        assert_eq!(accelerator.resets, 0);
    }

    #[test]
    fn test_no_eligible_combination_is_fatal() {
        let graph =
            ExecutionPlanGraph::try_from_nodes([test_node("sum", AggregationSum, &["t"], &["s"])])
                .unwrap();
        let config = filter_join_config();
        let error = RunScheduler::new(&graph, &config).plan().unwrap_err();
        assert!(matches!(
            error.current_context(),
            Error::NoEligibleModuleCombination
        ));
    }
}
