use std::fmt;
use std::time::Duration;

/// Timing of repeated scheduling passes over the same graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BenchmarkStats {
    /// Completed scheduling passes.
    pub iterations: usize,
    /// Runs produced by one pass.
    pub runs_per_iteration: usize,
    pub total: Duration,
    pub min: Option<Duration>,
    pub max: Option<Duration>,
    /// True if the time limit stopped the benchmark early.
    pub timed_out: bool,
}

impl BenchmarkStats {
    pub fn record(&mut self, elapsed: Duration, runs: usize) {
        self.iterations += 1;
        self.runs_per_iteration = runs;
        self.total += elapsed;
        self.min = Some(self.min.map_or(elapsed, |min| min.min(elapsed)));
        self.max = Some(self.max.map_or(elapsed, |max| max.max(elapsed)));
    }

    pub fn mean(&self) -> Option<Duration> {
        (self.iterations > 0).then(|| self.total / self.iterations as u32)
    }
}

impl fmt::Display for BenchmarkStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} iterations, {} runs each",
            self.iterations, self.runs_per_iteration
        )?;
        if let (Some(mean), Some(min), Some(max)) = (self.mean(), self.min, self.max) {
            write!(f, ", mean {mean:?} (min {min:?}, max {max:?})")?;
        }
        if self.timed_out {
            write!(f, ", stopped by time limit")?;
        }
        Ok(())
    }
}
