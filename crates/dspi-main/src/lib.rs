#![warn(
    rust_2018_idioms,
    nonstandard_style,
    future_incompatible,
    clippy::mod_module_files,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::undocumented_unsafe_blocks
)]

mod benchmark;
mod error;
mod input_manager;
mod plan_args;
mod run;
mod schedule;
pub mod tracing_setup;

pub use benchmark::BenchmarkCommand;
pub use error::Error;
pub use input_manager::*;
pub use plan_args::PlanArgs;
pub use run::RunCommand;
pub use schedule::ScheduleCommand;
