#[derive(derive_more::Display, Debug)]
pub enum Error {
    #[display(fmt = "failed to read execution plan input")]
    Input,
    #[display(fmt = "failed to schedule execution plan")]
    Scheduling,
    #[display(fmt = "failed to process results")]
    Output,
}

impl error_stack::Context for Error {}
