#![warn(
    rust_2018_idioms,
    nonstandard_style,
    future_incompatible,
    clippy::mod_module_files,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::undocumented_unsafe_blocks
)]

//! Scheduler turning an execution plan graph into a sequence of accelerator
//! runs.
//!
//! Each run loads one bitstream (a fixed, ordered combination of modules)
//! and executes the nodes placed on it. The [RunScheduler] state machine
//! repeatedly selects the next run, assigns stream identifiers, derives the
//! DMA setup and hands the run to an [Accelerator]. Streams crossing a run
//! boundary are tracked as [ReuseLink]s so their memory and identifiers
//! persist until every consumer has run.

mod accelerator;
mod benchmark;
mod error;
mod fsm;
mod reuse_links;
mod run_selection;
mod run_setup;
mod stream_allocator;
mod stream_memory;
mod stream_pool;

pub use accelerator::*;
pub use benchmark::*;
pub use error::*;
pub use fsm::*;
pub use reuse_links::*;
pub use run_selection::*;
pub use run_setup::*;
pub use stream_allocator::*;
pub use stream_memory::*;
pub use stream_pool::*;
