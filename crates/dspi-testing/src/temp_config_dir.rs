use std::path::{Path, PathBuf};

use error_stack::{IntoReport, ResultExt};

use crate::Error;

/// A temporary directory holding a `config.ini` and the files it refers to.
pub struct TempConfigDir {
    dir: tempfile::TempDir,
}

impl TempConfigDir {
    pub fn try_new() -> crate::Result<Self> {
        let dir = tempfile::tempdir().into_report().change_context(Error)?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// The path of the `config.ini` file.
    pub fn config_path(&self) -> PathBuf {
        self.dir.path().join("config.ini")
    }

    /// Write a file into the directory.
    pub fn write_file(&self, name: &str, contents: &str) -> crate::Result<PathBuf> {
        let path = self.dir.path().join(name);
        std::fs::write(&path, contents)
            .into_report()
            .change_context(Error)
            .attach_printable_lazy(|| format!("writing {}", path.display()))?;
        Ok(path)
    }

    /// Write a value as a JSON file into the directory.
    pub fn write_json(&self, name: &str, value: &impl serde::Serialize) -> crate::Result<PathBuf> {
        let contents = serde_json::to_string_pretty(value)
            .into_report()
            .change_context(Error)?;
        self.write_file(name, &contents)
    }

    /// Write the `config.ini` file.
    pub fn write_config(&self, contents: &str) -> crate::Result<PathBuf> {
        self.write_file("config.ini", contents)
    }
}
