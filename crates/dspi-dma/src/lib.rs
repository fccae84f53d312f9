#![warn(
    rust_2018_idioms,
    nonstandard_style,
    future_incompatible,
    clippy::mod_module_files,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::undocumented_unsafe_blocks
)]

//! Configuration of the accelerator's DMA engine.
//!
//! Records are stored back to back in host memory. Inside the accelerator
//! every record starts on a fresh chunk of [DATAPATH_WIDTH] integers. The
//! DMA engine moves data between the two layouts in bursts, and a two stage
//! crossbar (a per-lane chunk selection followed by a lane shuffle) does the
//! re-layout.
//!
//! [DATAPATH_WIDTH]: dspi_core::constants::DATAPATH_WIDTH

mod crossbar;
mod dma_engine;
mod error;
mod register_file;
mod setup_data;
mod stream_parameters;

pub use crossbar::*;
pub use dma_engine::*;
pub use error::*;
pub use register_file::*;
pub use setup_data::*;
pub use stream_parameters::*;
