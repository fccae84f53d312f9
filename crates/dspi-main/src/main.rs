#![warn(
    rust_2018_idioms,
    nonstandard_style,
    future_incompatible,
    clippy::mod_module_files,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::undocumented_unsafe_blocks
)]

use clap::Parser;
use dspi_main::tracing_setup::{setup_tracing, TracingOptions};
use dspi_main::{BenchmarkCommand, RunCommand, ScheduleCommand};
use error_stack::ResultExt;
use tracing::error;

/// Schedule query execution plans onto a reconfigurable accelerator.
#[derive(clap::Parser, Debug)]
#[command(name = "dspi", rename_all = "kebab-case", version)]
pub struct DspiOptions {
    #[command(flatten)]
    tracing_options: TracingOptions,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Execute a plan on the simulated accelerator.
    Run(RunCommand),
    /// Time repeated scheduling of a plan.
    Benchmark(BenchmarkCommand),
    /// Print the runs a plan is scheduled into.
    Schedule(ScheduleCommand),
}

fn main() {
    let options = DspiOptions::parse();
    setup_tracing(&options.tracing_options);

    let exit_code = if let Err(err) = main_body(options) {
        error!("{:?}", err);
        1
    } else {
        0
    };

    std::process::exit(exit_code);
}

#[derive(derive_more::Display, Debug)]
#[display(fmt = "error running command")]
pub struct Error;

impl error_stack::Context for Error {}

fn main_body(options: DspiOptions) -> error_stack::Result<(), Error> {
    match options.command {
        Command::Run(run) => {
            run.execute().change_context(Error)?;
        }
        Command::Benchmark(benchmark) => {
            benchmark.execute().change_context(Error)?;
        }
        Command::Schedule(schedule) => {
            schedule.execute().change_context(Error)?;
        }
    };

    Ok(())
}
