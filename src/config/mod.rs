//! Engine configuration
//!
//! Settings come from four layers, highest first:
//! - CLI flags
//! - `LOCPATCH_*` environment variables (resolved together with flags by clap)
//! - `locpatch.yaml` in the tree root, or the file named by `--config`
//! - built-in defaults
//!
//! The merged result is an [`EngineConfig`], passed by value to the pipeline.

pub mod file;

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

pub use file::{CONFIG_FILE_NAME, FileConfig};

use crate::error::{Result, config as config_err};
use crate::workers::default_concurrency;

/// Default per-file I/O timeout
pub const DEFAULT_IO_TIMEOUT_MS: u64 = 30_000;

/// Directory (under the patched root) for reports and provenance
pub const DEFAULT_OUTPUT_DIR: &str = ".locpatch";

/// History file name inside the output directory
pub const HISTORY_FILE_NAME: &str = "history.jsonl";

/// Ledger of where each rule was last applied, inside the output directory
pub const APPLIED_FILE_NAME: &str = "applied.json";

/// Values given on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub concurrency: Option<usize>,
    pub io_timeout_ms: Option<u64>,
    pub default_mandatory: Option<bool>,
    pub output_dir: Option<PathBuf>,
    pub exclude: Vec<String>,
}

/// Fully resolved settings for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Worker pool size, at least 1
    pub concurrency: usize,
    /// `None` disables timeouts (`io_timeout_ms: 0`)
    pub io_timeout: Option<Duration>,
    pub default_mandatory: bool,
    /// Glob patterns over tree-relative paths, in addition to the built-in excludes
    pub exclude: Vec<String>,
    pub output_dir: PathBuf,
    pub history_file: PathBuf,
    pub applied_file: PathBuf,
}

impl EngineConfig {
    /// Merge overrides over an optional file config over defaults
    ///
    /// Relative `output_dir` and `history_file` paths are taken relative to
    /// `root`, the tree being patched.
    pub fn resolve(root: &Path, file: Option<&FileConfig>, overrides: &Overrides) -> Result<Self> {
        let file = file.cloned().unwrap_or_default();

        let concurrency = overrides
            .concurrency
            .or(file.concurrency)
            .unwrap_or_else(default_concurrency);
        if concurrency == 0 {
            return Err(config_err::invalid("concurrency must be at least 1"));
        }

        let timeout_ms = overrides
            .io_timeout_ms
            .or(file.io_timeout_ms)
            .unwrap_or(DEFAULT_IO_TIMEOUT_MS);
        let io_timeout = (timeout_ms > 0).then(|| Duration::from_millis(timeout_ms));

        let default_mandatory = overrides
            .default_mandatory
            .or(file.default_mandatory)
            .unwrap_or(true);

        let mut exclude = file.exclude;
        exclude.extend(overrides.exclude.iter().cloned());

        let output_dir = absolutize(
            root,
            overrides
                .output_dir
                .clone()
                .or(file.output_dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
        );
        let history_file = file
            .history_file
            .map(|path| absolutize(root, path))
            .unwrap_or_else(|| output_dir.join(HISTORY_FILE_NAME));

        let applied_file = output_dir.join(APPLIED_FILE_NAME);

        let config = Self {
            concurrency,
            io_timeout,
            default_mandatory,
            exclude,
            output_dir,
            history_file,
            applied_file,
        };
        debug!(event = "config_resolved", ?config);
        Ok(config)
    }
}

fn absolutize(root: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        root.join(path)
    }
}
