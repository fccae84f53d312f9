#![warn(
    rust_2018_idioms,
    nonstandard_style,
    future_incompatible,
    clippy::mod_module_files,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::undocumented_unsafe_blocks
)]

//! Drives an execution plan through the scheduler onto an accelerator.

mod error;
mod execution_manager;
mod managers;
mod module_setup;
mod simulated;

pub use error::*;
pub use execution_manager::*;
pub use managers::*;
pub use module_setup::*;
pub use simulated::*;
