use std::path::{Path, PathBuf};

/// The graph and configuration files of one case under `testdata/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestdataCase {
    pub graph: PathBuf,
    pub config: PathBuf,
}

/// The workspace `testdata/` directory.
pub fn testdata_dir() -> PathBuf {
    // Crate manifests are at `crates/<crate>/`.
    let root = Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .expect("crate inside the workspace");
    root.join("testdata")
}

/// Locate the `graph.yaml` and `config.ini` of a testdata case.
pub fn testdata_case(name: &str) -> TestdataCase {
    let dir = testdata_dir().join(name);
    assert!(
        dir.is_dir(),
        "Unknown testdata case '{name}': {}",
        dir.display()
    );
    TestdataCase {
        graph: dir.join("graph.yaml"),
        config: dir.join("config.ini"),
    }
}
