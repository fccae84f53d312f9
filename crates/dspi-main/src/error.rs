#[derive(derive_more::Display, Debug)]
pub enum Error {
    #[display(fmt = "failed to read input")]
    ReadingInput,
    #[display(fmt = "invalid time limit")]
    InvalidTimeLimit,
    #[display(fmt = "failed to execute plan")]
    Execution,
    #[display(fmt = "failed to schedule plan")]
    Scheduling,
    #[display(fmt = "failed to benchmark plan")]
    Benchmark,
}

impl error_stack::Context for Error {}
