//! Common test utilities for locpatch integration tests

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use tempfile::TempDir;

/// An upstream tree plus a rule set file, in one temporary directory
pub struct TestTree {
    /// Temporary directory holding both
    pub temp: TempDir,
    /// Upstream tree root
    pub root: PathBuf,
    /// Rule set document
    pub rules: PathBuf,
}

impl TestTree {
    /// Create an empty tree and an empty rule set
    pub fn new() -> Self {
        let temp = TempDir::new().expect("Failed to create temp directory");
        let root = temp.path().join("upstream");
        std::fs::create_dir_all(&root).expect("Failed to create tree root");
        let rules = temp.path().join("rules.yaml");
        std::fs::write(&rules, "").expect("Failed to write rules");
        Self { temp, root, rules }
    }

    /// Write the rule set document
    pub fn write_rules(&self, yaml: &str) {
        std::fs::write(&self.rules, yaml).expect("Failed to write rules");
    }

    /// Write a file in the tree
    pub fn write_file(&self, path: &str, content: &str) {
        let file_path = self.root.join(path);
        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        std::fs::write(&file_path, content).expect("Failed to write file");
    }

    /// Read a file from the tree
    pub fn read_file(&self, path: &str) -> String {
        std::fs::read_to_string(self.root.join(path)).expect("Failed to read file")
    }

    /// A path next to the tree, outside it
    #[allow(dead_code)]
    pub fn sibling(&self, name: &str) -> PathBuf {
        self.temp.path().join(name)
    }

    /// `locpatch apply` against this tree, with a fixed commit and backend
    #[allow(dead_code)]
    pub fn apply(&self) -> Command {
        let mut cmd = locpatch_cmd();
        cmd.arg("apply")
            .arg("--rules")
            .arg(&self.rules)
            .arg("--root")
            .arg(&self.root)
            .args(["--commit", "abc123", "--backend", "linux-x86_64"]);
        cmd
    }

    /// `locpatch check` against this tree
    #[allow(dead_code)]
    pub fn check(&self) -> Command {
        let mut cmd = locpatch_cmd();
        cmd.arg("check")
            .arg("--rules")
            .arg(&self.rules)
            .arg("--root")
            .arg(&self.root)
            .args(["--commit", "abc123"]);
        cmd
    }

    /// Provenance records written under `dir`, sorted by name
    #[allow(dead_code)]
    pub fn provenance_records(dir: &Path) -> Vec<serde_json::Value> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
            .map(|entries| {
                entries
                    .filter_map(|entry| entry.ok().map(|e| e.path()))
                    .filter(|path| {
                        path.file_name()
                            .and_then(|name| name.to_str())
                            .is_some_and(|name| name.starts_with("provenance-"))
                    })
                    .collect()
            })
            .unwrap_or_default();
        paths.sort();
        paths
            .iter()
            .map(|path| {
                let text = std::fs::read_to_string(path).expect("Failed to read record");
                serde_json::from_str(&text).expect("Failed to parse record")
            })
            .collect()
    }
}

/// The locpatch binary, with logging env cleared
#[allow(deprecated)]
pub fn locpatch_cmd() -> Command {
    let mut cmd = Command::cargo_bin("locpatch").expect("Failed to find locpatch binary");
    cmd.env_remove("RUST_LOG")
        .env_remove("LOCPATCH_CONFIG")
        .env_remove("LOCPATCH_CONCURRENCY")
        .env_remove("LOCPATCH_TIMEOUT_MS");
    cmd
}
