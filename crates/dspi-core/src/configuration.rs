use std::time::Duration;

use hashbrown::HashMap;

use crate::constants::{DEFAULT_RECONFIGURABLE_CAPACITY, MODULE_SIZE};
use crate::{ColumnType, ModuleCombination, ModuleSpec, OperationKind, StreamParams};

/// One entry of the accelerator library: a loadable bitstream and the ordered
/// modules it contains.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AcceleratorEntry {
    pub modules: ModuleCombination,
    pub bitstream: String,
}

/// Hardware capabilities and costs used while scheduling.
///
/// Loaded once before scheduling starts and only read afterwards.
#[derive(Debug, Clone)]
pub struct Configuration {
    /// Parameter variants available for each operation.
    pub module_library: HashMap<OperationKind, Vec<Vec<i32>>>,
    /// Ordered module combinations and the bitstream implementing each.
    pub accelerator_library: HashMap<ModuleCombination, String>,
    /// Reconfigurable memory needed by one module of each kind.
    pub memory_footprints: HashMap<OperationKind, usize>,
    /// Size in integers of one unit of each column type.
    pub data_sizes: HashMap<ColumnType, f64>,
    /// Driver used to set up each module kind.
    pub driver_ids: HashMap<OperationKind, String>,
    /// Total reconfigurable memory available to one run.
    pub reconfigurable_capacity: usize,
    /// Wall-clock budget for scheduling a whole graph.
    pub time_limit: Option<Duration>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            module_library: HashMap::new(),
            accelerator_library: HashMap::new(),
            memory_footprints: HashMap::new(),
            data_sizes: HashMap::new(),
            driver_ids: HashMap::new(),
            reconfigurable_capacity: DEFAULT_RECONFIGURABLE_CAPACITY,
            time_limit: None,
        }
    }
}

impl Configuration {
    pub fn with_accelerator(
        mut self,
        modules: impl Into<ModuleCombination>,
        bitstream: impl Into<String>,
    ) -> Self {
        self.accelerator_library
            .insert(modules.into(), bitstream.into());
        self
    }

    pub fn with_accelerator_entries(
        mut self,
        entries: impl IntoIterator<Item = AcceleratorEntry>,
    ) -> Self {
        self.accelerator_library.extend(
            entries
                .into_iter()
                .map(|entry| (entry.modules, entry.bitstream)),
        );
        self
    }

    pub fn with_footprint(mut self, operation: OperationKind, bytes: usize) -> Self {
        self.memory_footprints.insert(operation, bytes);
        self
    }

    pub fn with_driver(mut self, operation: OperationKind, driver: impl Into<String>) -> Self {
        self.driver_ids.insert(operation, driver.into());
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.reconfigurable_capacity = capacity;
        self
    }

    pub fn with_time_limit(mut self, time_limit: Duration) -> Self {
        self.time_limit = Some(time_limit);
        self
    }

    /// The bitstream implementing exactly this ordered module combination.
    pub fn bitstream(&self, modules: &[ModuleSpec]) -> Option<&str> {
        self.accelerator_library.get(modules).map(String::as_str)
    }

    /// Reconfigurable memory needed by a module of the given kind.
    ///
    /// Kinds without a configured footprint occupy one module slot.
    pub fn footprint(&self, operation: OperationKind) -> usize {
        if !operation.requires_module() {
            return 0;
        }
        self.memory_footprints
            .get(&operation)
            .copied()
            .unwrap_or(MODULE_SIZE)
    }

    /// Total footprint of a module combination.
    pub fn combination_footprint(&self, modules: &[ModuleSpec]) -> usize {
        modules
            .iter()
            .map(|module| self.footprint(module.operation))
            .sum()
    }

    /// Return true if the module library allows this module variant.
    ///
    /// Operations missing from the module library are not restricted.
    pub fn supports_module(&self, module: &ModuleSpec) -> bool {
        match self.module_library.get(&module.operation) {
            Some(variants) => variants.contains(&module.parameters),
            None => true,
        }
    }

    pub fn driver_id(&self, operation: OperationKind) -> Option<&str> {
        self.driver_ids.get(&operation).map(String::as_str)
    }

    /// Width of one record of the stream in integers.
    pub fn record_size(&self, params: &StreamParams) -> usize {
        params.record_size(&self.data_sizes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> ModuleSpec {
        ModuleSpec::from(OperationKind::Filter)
    }

    fn join() -> ModuleSpec {
        ModuleSpec::from(OperationKind::Join)
    }

    #[test]
    fn test_bitstream_lookup_is_ordered() {
        let config = Configuration::default().with_accelerator([filter(), join()], "filter_join");
        assert_eq!(config.bitstream(&[filter(), join()]), Some("filter_join"));
        assert_eq!(config.bitstream(&[join(), filter()]), None);
        assert_eq!(config.bitstream(&[filter()]), None);
    }

    #[test]
    fn test_footprints() {
        let config = Configuration::default().with_footprint(OperationKind::Join, 3 * MODULE_SIZE);
        assert_eq!(config.footprint(OperationKind::Join), 3 * MODULE_SIZE);
        assert_eq!(config.footprint(OperationKind::Filter), MODULE_SIZE);
        assert_eq!(config.footprint(OperationKind::PassThrough), 0);
        assert_eq!(
            config.combination_footprint(&[filter(), join()]),
            4 * MODULE_SIZE
        );
    }

    #[test]
    fn test_module_library_restricts_variants() {
        let mut config = Configuration::default();
        config
            .module_library
            .insert(OperationKind::Filter, vec![vec![8, 2]]);
        assert!(config.supports_module(&ModuleSpec::new(OperationKind::Filter, [8, 2])));
        assert!(!config.supports_module(&ModuleSpec::new(OperationKind::Filter, [4, 1])));
        assert!(config.supports_module(&join()));
    }
}
