use std::path::Path;
use std::time::Duration;

use dspi_core::config_file::{
    parse_config_file, BITSTREAMS_MEM_REQ, CONFIGURATIONS_LIBRARY, DATA_SIZE_CONFIG,
    DRIVER_SELECTION, MODULE_LIBRARY, RECONFIGURABLE_CAPACITY, TIME_LIMIT_SECONDS,
};
use dspi_core::{AcceleratorEntry, Configuration, ExecutionPlanGraph};
use dspi_execution::InputManager;
use error_stack::{IntoReport, ResultExt};

/// Reads a YAML graph and a `config.ini` configuration from disk.
///
/// Library files named in the configuration are JSON. Relative paths are
/// resolved against the directory of the `config.ini` file.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileInputManager;

impl InputManager for FileInputManager {
    fn parse(
        &self,
        input_file: &Path,
        config_file: &Path,
    ) -> error_stack::Result<(ExecutionPlanGraph, Configuration), dspi_execution::Error> {
        let graph = read_graph(input_file).change_context(dspi_execution::Error::Input)?;
        let config =
            load_configuration(config_file).change_context(dspi_execution::Error::Input)?;
        tracing::info!(
            "Loaded {} nodes and {} accelerator configurations",
            graph.len(),
            config.accelerator_library.len()
        );
        Ok((graph, config))
    }
}

/// Read an execution plan graph from a YAML file.
pub fn read_graph(path: &Path) -> error_stack::Result<ExecutionPlanGraph, dspi_core::Error> {
    let contents = std::fs::read_to_string(path)
        .into_report()
        .change_context_lazy(|| dspi_core::Error::GraphNotFound(path.to_owned()))?;
    let mut graph = ExecutionPlanGraph::new();
    graph
        .insert_data(&contents)
        .attach_printable_lazy(|| format!("graph file: {}", path.display()))?;
    Ok(graph)
}

fn read_json<T: serde::de::DeserializeOwned>(
    base: &Path,
    name: &str,
    value: &str,
) -> error_stack::Result<T, dspi_core::Error> {
    let path = base.join(value);
    error_stack::ensure!(
        path.is_file(),
        dspi_core::Error::ConfigurationNotFound(path)
    );

    let contents = std::fs::read_to_string(&path)
        .into_report()
        .change_context_lazy(|| dspi_core::Error::ConfigurationNotFound(path.clone()))?;
    serde_json::from_str(&contents)
        .into_report()
        .change_context_lazy(|| {
            dspi_core::Error::invalid_configuration(format!("malformed {name} file"))
        })
        .attach_printable_lazy(|| format!("file: {}", path.display()))
}

fn parse_value<T: std::str::FromStr>(
    name: &str,
    value: &str,
) -> error_stack::Result<T, dspi_core::Error> {
    value.parse().map_err(|_| {
        error_stack::report!(dspi_core::Error::invalid_configuration(format!(
            "invalid {name} '{value}'"
        )))
    })
}

/// Build the configuration described by a `config.ini` file.
pub fn load_configuration(path: &Path) -> error_stack::Result<Configuration, dspi_core::Error> {
    let values = parse_config_file(path)?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));

    let mut config = Configuration::default();
    for (name, value) in &values {
        match name.as_str() {
            CONFIGURATIONS_LIBRARY => {
                let entries: Vec<AcceleratorEntry> = read_json(base, name, value)?;
                config = config.with_accelerator_entries(entries);
            }
            MODULE_LIBRARY => config.module_library = read_json(base, name, value)?,
            BITSTREAMS_MEM_REQ => config.memory_footprints = read_json(base, name, value)?,
            DATA_SIZE_CONFIG => config.data_sizes = read_json(base, name, value)?,
            DRIVER_SELECTION => config.driver_ids = read_json(base, name, value)?,
            RECONFIGURABLE_CAPACITY => config.reconfigurable_capacity = parse_value(name, value)?,
            TIME_LIMIT_SECONDS => {
                config.time_limit = Some(time_limit(parse_value(name, value)?)?);
            }
            _ => tracing::debug!("Ignoring unknown configuration value {name}"),
        }
    }
    Ok(config)
}

/// Convert a time limit in seconds.
pub fn time_limit(seconds: f64) -> error_stack::Result<Duration, dspi_core::Error> {
    Duration::try_from_secs_f64(seconds)
        .into_report()
        .change_context_lazy(|| {
            dspi_core::Error::invalid_configuration(format!("invalid time limit {seconds}"))
        })
}

#[cfg(test)]
mod tests {
    use dspi_core::{ColumnType, ModuleSpec, OperationKind};
    use dspi_testing::{testdata_case, TempConfigDir};
    use indoc::indoc;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_load_configuration() {
        let dir = TempConfigDir::try_new().unwrap();
        dir.write_json(
            "accelerators.json",
            &json!([
                { "modules": [{ "operation": "filter" }], "bitstream": "filter.bin" },
                {
                    "modules": [{ "operation": "linear_sort", "parameters": [64] }],
                    "bitstream": "sort.bin"
                }
            ]),
        )
        .unwrap();
        dir.write_json("sizes.json", &json!({ "integer": 1.0, "varchar": 0.25 }))
            .unwrap();
        dir.write_json("footprints.json", &json!({ "linear_sort": 2097152 }))
            .unwrap();
        dir.write_config(indoc! {"
            # Libraries
            configurations_library = accelerators.json
            DATA_SIZE_CONFIG=sizes.json
            BITSTREAMS_MEM_REQ=footprints.json
            RECONFIGURABLE_CAPACITY=4194304
            TIME_LIMIT_SECONDS=2.5
        "})
        .unwrap();

        let config = load_configuration(&dir.config_path()).unwrap();
        assert_eq!(
            config.bitstream(&[ModuleSpec::new(OperationKind::LinearSort, [64])]),
            Some("sort.bin")
        );
        assert_eq!(config.data_sizes.get(&ColumnType::Varchar), Some(&0.25));
        assert_eq!(config.footprint(OperationKind::LinearSort), 2097152);
        assert_eq!(config.reconfigurable_capacity, 4194304);
        assert_eq!(config.time_limit, Some(Duration::from_millis(2500)));
    }

    #[test]
    fn test_missing_library_file() {
        let dir = TempConfigDir::try_new().unwrap();
        dir.write_config("MODULE_LIBRARY=modules.json\n").unwrap();

        let error = load_configuration(&dir.config_path()).unwrap_err();
        assert!(matches!(
            error.current_context(),
            dspi_core::Error::ConfigurationNotFound(path) if path.ends_with("modules.json")
        ));
    }

    #[test]
    fn test_missing_graph_file() {
        let dir = TempConfigDir::try_new().unwrap();
        let graph = dir.path().join("graph.yaml");
        let error = read_graph(&graph).unwrap_err();
        assert!(matches!(
            error.current_context(),
            dspi_core::Error::GraphNotFound(path) if path == &graph
        ));
    }

    #[test]
    fn test_invalid_values() {
        let dir = TempConfigDir::try_new().unwrap();
        dir.write_config("TIME_LIMIT_SECONDS=-1\n").unwrap();
        let error = load_configuration(&dir.config_path()).unwrap_err();
        assert!(matches!(
            error.current_context(),
            dspi_core::Error::InvalidConfiguration(_)
        ));

        dir.write_config("RECONFIGURABLE_CAPACITY=lots\n").unwrap();
        let error = load_configuration(&dir.config_path()).unwrap_err();
        assert!(matches!(
            error.current_context(),
            dspi_core::Error::InvalidConfiguration(_)
        ));
    }

    #[test]
    fn test_parse_testdata() {
        let case = testdata_case("filter_join");
        let (graph, config) = FileInputManager.parse(&case.graph, &case.config).unwrap();
        assert_eq!(graph.len(), 3);
        assert_eq!(config.accelerator_library.len(), 3);
        assert_eq!(config.driver_id(OperationKind::Join), Some("default"));
    }
}
