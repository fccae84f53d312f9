use std::borrow::Cow;
use std::time::Duration;

#[derive(derive_more::Display, Debug)]
pub enum Error {
    #[display(fmt = "no eligible module combination for the remaining nodes")]
    NoEligibleModuleCombination,
    #[display(fmt = "stream identifier pool exhausted")]
    StreamPoolExhausted,
    #[display(fmt = "scheduling time limit of {_0:?} exceeded")]
    TimeLimitExceeded(Duration),
    #[display(fmt = "stream '{stream}' of node '{node}' has an empty record")]
    EmptyRecord { node: String, stream: String },
    #[display(fmt = "failed to configure DMA for run {_0}")]
    DmaSetup(usize),
    #[display(fmt = "accelerator failed: {_0}")]
    Accelerator(Cow<'static, str>),
    #[display(fmt = "no run ready to {_0}")]
    NoPendingRun(&'static str),
}

impl Error {
    pub fn accelerator(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Accelerator(message.into())
    }
}

impl error_stack::Context for Error {}
