use dspi_core::ModuleSpec;

use crate::{Error, RunSetup};

/// The device (or a stand-in for it) executing scheduled runs.
///
/// The scheduler calls the methods in order for every run:
/// [Accelerator::load_bitstream], [Accelerator::setup_run] and finally
/// [Accelerator::execute], which must not return before the run's output
/// streams are complete.
pub trait Accelerator {
    /// Reconfigure the device with the given bitstream.
    fn load_bitstream(
        &mut self,
        bitstream: &str,
        modules: &[ModuleSpec],
    ) -> error_stack::Result<(), Error>;

    /// Write the DMA and module configuration of the run.
    fn setup_run(&mut self, run: &RunSetup) -> error_stack::Result<(), Error>;

    /// Start the run and wait for it to finish.
    fn execute(&mut self, run: &RunSetup) -> error_stack::Result<(), Error>;

    /// Drop the loaded bitstream and every register setting.
    ///
    /// Called when a schedule fails part way through.
    fn reset(&mut self);
}

/// Accelerator that accepts every run without doing anything.
///
/// Used to produce and time schedules without a device.
#[derive(Debug, Default)]
pub struct DryRun {
    pub loaded_bitstreams: usize,
}

impl Accelerator for DryRun {
    fn load_bitstream(
        &mut self,
        bitstream: &str,
        _modules: &[ModuleSpec],
    ) -> error_stack::Result<(), Error> {
        tracing::trace!("Dry run: loading '{bitstream}'");
        self.loaded_bitstreams += 1;
        Ok(())
    }

    fn setup_run(&mut self, _run: &RunSetup) -> error_stack::Result<(), Error> {
        Ok(())
    }

    fn execute(&mut self, _run: &RunSetup) -> error_stack::Result<(), Error> {
        Ok(())
    }

    fn reset(&mut self) {}
}
