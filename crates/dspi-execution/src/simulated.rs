use dspi_core::ModuleSpec;
use dspi_dma::{DmaEngine, MemoryRegisterFile, RegisterFile, StreamDirection, DMA_SLOT};
use dspi_scheduler::{Accelerator, Error, RunSetup};
use error_stack::ResultExt;

use crate::ModuleSetupTable;

/// Accelerator backed by an in-memory register file.
///
/// Runs complete as soon as they are started. The register writes of the
/// most recent run stay available for inspection.
#[derive(Debug, Default)]
pub struct SimulatedAccelerator {
    registers: MemoryRegisterFile,
    setup_table: ModuleSetupTable,
    bitstream: Option<String>,
    /// Result word of every module, by node name, in execution order.
    results: Vec<(String, u32)>,
}

impl SimulatedAccelerator {
    pub fn new(setup_table: ModuleSetupTable) -> Self {
        Self {
            setup_table,
            ..Self::default()
        }
    }

    pub fn registers(&self) -> &MemoryRegisterFile {
        &self.registers
    }

    pub fn bitstream(&self) -> Option<&str> {
        self.bitstream.as_deref()
    }

    pub fn results(&self) -> &[(String, u32)] {
        &self.results
    }

    fn ensure_loaded(&self, run: &RunSetup) -> error_stack::Result<(), Error> {
        match &self.bitstream {
            Some(bitstream) if *bitstream == run.bitstream => Ok(()),
            loaded => Err(error_stack::report!(Error::accelerator(format!(
                "run {} needs bitstream '{}' but {:?} is loaded",
                run.index, run.bitstream, loaded
            )))),
        }
    }
}

impl Accelerator for SimulatedAccelerator {
    fn load_bitstream(
        &mut self,
        bitstream: &str,
        modules: &[ModuleSpec],
    ) -> error_stack::Result<(), Error> {
        tracing::info!("Loading bitstream '{bitstream}' with {} modules", modules.len());
        // One register window for the DMA engine and one per module.
        self.registers = MemoryRegisterFile::new(DMA_SLOT + 1 + modules.len());
        self.bitstream = Some(bitstream.to_owned());
        Ok(())
    }

    fn setup_run(&mut self, run: &RunSetup) -> error_stack::Result<(), Error> {
        self.ensure_loaded(run)?;

        DmaEngine::new(&mut self.registers)
            .setup(&run.inputs, &run.outputs)
            .change_context_lazy(|| Error::accelerator(format!("DMA setup of run {}", run.index)))?;

        for node in &run.nodes {
            let Some(slot) = node.slot else {
                continue;
            };
            let entry = self.setup_table.entry(node).ok_or_else(|| {
                error_stack::report!(Error::accelerator(format!(
                    "no setup entry for driver '{}' of node '{}'",
                    ModuleSetupTable::driver_name(node),
                    node.name
                )))
            })?;
            (entry.configure)(&mut self.registers, node, slot).change_context_lazy(|| {
                Error::accelerator(format!("configuring node '{}' in slot {slot}", node.name))
            })?;
        }
        tracing::debug!(
            "Run {} configured with {} register writes",
            run.index,
            self.registers.writes().len()
        );
        Ok(())
    }

    fn execute(&mut self, run: &RunSetup) -> error_stack::Result<(), Error> {
        self.ensure_loaded(run)?;
        let module_failure = |name: &str| Error::accelerator(format!("module of node '{name}'"));

        for node in &run.nodes {
            let Some(slot) = node.slot else {
                continue;
            };
            if let Some(entry) = self.setup_table.entry(node) {
                (entry.start)(&mut self.registers, slot)
                    .change_context_lazy(|| module_failure(&node.name))?;
            }
        }

        let dma_failure = || Error::accelerator(format!("DMA controller of run {}", run.index));
        let mut dma = DmaEngine::new(&mut self.registers);
        for direction in [StreamDirection::Output, StreamDirection::Input] {
            dma.start_controller(direction, run.active_streams(direction))
                .change_context_lazy(dma_failure)?;
        }
        for direction in [StreamDirection::Input, StreamDirection::Output] {
            dma.complete_controller(direction)
                .change_context_lazy(dma_failure)?;
            let finished = dma
                .is_controller_finished(direction)
                .change_context_lazy(dma_failure)?;
            error_stack::ensure!(
                finished,
                Error::accelerator(format!("{direction} streams of run {} still active", run.index))
            );
        }

        for node in &run.nodes {
            let (Some(slot), Some(entry)) = (node.slot, self.setup_table.entry(node))
            else {
                continue;
            };
            let result = (entry.read_result)(&self.registers, slot)
                .change_context_lazy(|| module_failure(&node.name))?;
            tracing::trace!("Node '{}' result word {result:#x}", node.name);
            self.results.push((node.name.clone(), result));
        }
        Ok(())
    }

    fn reset(&mut self) {
        tracing::debug!("Unloading bitstream {:?}", self.bitstream);
        self.registers.clear();
        self.bitstream = None;
        self.results.clear();
    }
}
