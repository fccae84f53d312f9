//! Reader for the line oriented `config.ini` format.
//!
//! Each non-blank line not starting with `#` has the form `NAME=value`.
//! Whitespace anywhere on the line is removed, names are upper-cased and the
//! first `=` separates the name from the value.

use std::collections::BTreeMap;
use std::path::Path;

use error_stack::{IntoReport, ResultExt};

use crate::Error;

pub const CONFIGURATIONS_LIBRARY: &str = "CONFIGURATIONS_LIBRARY";
pub const MODULE_LIBRARY: &str = "MODULE_LIBRARY";
pub const BITSTREAMS_MEM_REQ: &str = "BITSTREAMS_MEM_REQ";
pub const DATA_SIZE_CONFIG: &str = "DATA_SIZE_CONFIG";
pub const DRIVER_SELECTION: &str = "DRIVER_SELECTION";
pub const RECONFIGURABLE_CAPACITY: &str = "RECONFIGURABLE_CAPACITY";
pub const TIME_LIMIT_SECONDS: &str = "TIME_LIMIT_SECONDS";

/// Parse the contents of a configuration file.
pub fn parse_config_str(contents: &str) -> error_stack::Result<BTreeMap<String, String>, Error> {
    let mut values = BTreeMap::new();
    for (line_number, line) in contents.lines().enumerate() {
        let line: String = line.chars().filter(|c| !c.is_whitespace()).collect();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((name, value)) = line.split_once('=') else {
            error_stack::bail!(Error::invalid_configuration(format!(
                "line {} is not of the form NAME=value",
                line_number + 1
            )));
        };
        values.insert(name.to_uppercase(), value.to_owned());
    }
    Ok(values)
}

/// Read and parse a configuration file.
///
/// A file that does not exist is reported as [Error::ConfigurationNotFound].
pub fn parse_config_file(path: &Path) -> error_stack::Result<BTreeMap<String, String>, Error> {
    if !path.is_file() {
        error_stack::bail!(Error::ConfigurationNotFound(path.to_owned()));
    }

    let contents = std::fs::read_to_string(path)
        .into_report()
        .change_context_lazy(|| Error::ConfigurationNotFound(path.to_owned()))?;
    let values = parse_config_str(&contents)
        .attach_printable_lazy(|| format!("config file: {}", path.display()))?;
    tracing::debug!(
        "Read {} configuration values from {}",
        values.len(),
        path.display()
    );
    Ok(values)
}
