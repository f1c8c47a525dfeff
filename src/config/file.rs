//! `locpatch.yaml` data structures

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, config as config_err};

/// Config file looked up in the tree root
pub const CONFIG_FILE_NAME: &str = "locpatch.yaml";

/// Optional settings; absent keys fall through to defaults
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub io_timeout_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_mandatory: Option<bool>,

    /// Extra glob patterns to skip
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_file: Option<PathBuf>,
}

impl FileConfig {
    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str, path: &Path) -> Result<Self> {
        // An empty file is a valid, empty config.
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml)
            .map_err(|e| config_err::parse_failed(path.display().to_string(), e.to_string()))
    }

    /// Load a config file that must exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(config_err::not_found(path.display().to_string()));
        }
        let yaml = fs::read_to_string(path)
            .map_err(|e| config_err::read_failed(path.display().to_string(), e.to_string()))?;
        Self::from_yaml(&yaml, path)
    }

    /// The explicit config if given, otherwise `locpatch.yaml` in `root` if present
    pub fn discover(root: &Path, explicit: Option<&Path>) -> Result<Option<Self>> {
        if let Some(path) = explicit {
            return Self::load(path).map(Some);
        }
        let candidate = root.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            Self::load(&candidate).map(Some)
        } else {
            Ok(None)
        }
    }
}
