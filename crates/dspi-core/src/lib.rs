#![warn(
    rust_2018_idioms,
    nonstandard_style,
    future_incompatible,
    clippy::mod_module_files,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::undocumented_unsafe_blocks
)]

//! Core data model for mapping query execution plans onto accelerator runs.
//!
//! A query plan is an [ExecutionPlanGraph] of [QueryNode]s connected by named
//! streams. The [Configuration] describes which module combinations the
//! hardware can load (as bitstreams) and what they cost in reconfigurable
//! memory. The hardware limits shared by every layer live in [constants].

pub mod config_file;
pub mod constants;
mod configuration;
mod error;
mod graph;
mod node;
mod stream_id;

pub use configuration::*;
pub use error::*;
pub use graph::*;
pub use node::*;
pub use stream_id::*;
