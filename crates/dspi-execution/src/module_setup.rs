use dspi_dma::{Error, RegisterFile};
use dspi_scheduler::NodeSetup;
use hashbrown::HashMap;

/// Control word of a module. Writing 1 starts it.
const CONTROL_OFFSET: u32 = 0;
/// Result word published by a module once its run completes.
const RESULT_OFFSET: u32 = 1 << 2;
const INPUT_IDS_OFFSET: u32 = 1 << 6;
const OUTPUT_IDS_OFFSET: u32 = 2 << 6;
/// Operation parameters, row after row.
const PARAMETERS_OFFSET: u32 = 1 << 8;

/// How one kind of module is set up, started and read back.
///
/// Every function receives the register window of the module's slot.
#[derive(Clone, Copy)]
pub struct ModuleSetupEntry {
    pub configure: fn(&mut dyn RegisterFile, &NodeSetup, usize) -> error_stack::Result<(), Error>,
    pub start: fn(&mut dyn RegisterFile, usize) -> error_stack::Result<(), Error>,
    pub read_result: fn(&dyn RegisterFile, usize) -> error_stack::Result<u32, Error>,
}

impl std::fmt::Debug for ModuleSetupEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleSetupEntry").finish_non_exhaustive()
    }
}

fn configure_streams(
    registers: &mut dyn RegisterFile,
    node: &NodeSetup,
    slot: usize,
) -> error_stack::Result<(), Error> {
    for (index, id) in node.input_ids.iter().enumerate() {
        registers.write(slot, INPUT_IDS_OFFSET + 4 * index as u32, id.index() as u32)?;
    }
    for (index, id) in node.output_ids.iter().enumerate() {
        registers.write(slot, OUTPUT_IDS_OFFSET + 4 * index as u32, id.index() as u32)?;
    }
    for (index, value) in node.operation_parameters.iter().flatten().enumerate() {
        // Negative constants keep their two's complement bits.
        registers.write(slot, PARAMETERS_OFFSET + 4 * index as u32, *value as u32)?;
    }
    Ok(())
}

fn start_module(registers: &mut dyn RegisterFile, slot: usize) -> error_stack::Result<(), Error> {
    registers.write(slot, CONTROL_OFFSET, 1)
}

fn read_result_word(registers: &dyn RegisterFile, slot: usize) -> error_stack::Result<u32, Error> {
    registers.read(slot, RESULT_OFFSET)
}

/// Driver name used by module kinds without a configured driver.
pub const DEFAULT_DRIVER: &str = "default";

/// Entry registered as the [DEFAULT_DRIVER].
pub const DEFAULT_MODULE_SETUP: ModuleSetupEntry = ModuleSetupEntry {
    configure: configure_streams,
    start: start_module,
    read_result: read_result_word,
};

/// Setup entries by driver name.
///
/// Nodes pick their entry through the driver configured for their module
/// kind.
#[derive(Debug, Clone)]
pub struct ModuleSetupTable {
    drivers: HashMap<String, ModuleSetupEntry>,
}

impl Default for ModuleSetupTable {
    fn default() -> Self {
        Self {
            drivers: [(DEFAULT_DRIVER.to_owned(), DEFAULT_MODULE_SETUP)]
                .into_iter()
                .collect(),
        }
    }
}

impl ModuleSetupTable {
    pub fn with_driver(mut self, driver: impl Into<String>, entry: ModuleSetupEntry) -> Self {
        self.drivers.insert(driver.into(), entry);
        self
    }

    /// Name of the driver setting up the node.
    pub fn driver_name(node: &NodeSetup) -> &str {
        node.driver.as_deref().unwrap_or(DEFAULT_DRIVER)
    }

    /// The entry of the node's driver.
    ///
    /// Returns `None` for pass-through nodes and for drivers missing from the
    /// table.
    pub fn entry(&self, node: &NodeSetup) -> Option<&ModuleSetupEntry> {
        if !node.operation.requires_module() {
            return None;
        }
        self.drivers.get(Self::driver_name(node))
    }
}
