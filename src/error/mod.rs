//! Error types and handling for locpatch
//!
//! Uses `thiserror` for error definitions and `miette` for pretty diagnostics.
//!
//! This module is organized into sub-modules by error domain:
//! - [`ruleset`]: Rule set load errors (always fatal before any file is touched)
//! - [`config`]: Configuration errors
//! - [`fs`]: File system errors
//! - [`provenance`]: Provenance persistence errors
//!
//! Per-rule failures (not found, ambiguous, timeouts) are not errors: they are
//! recorded as outcomes and surfaced in the conflict report.

pub mod config;
pub mod fs;
pub mod provenance;
pub mod ruleset;

use miette::Diagnostic;
use thiserror::Error;

/// Main error type for locpatch operations
#[derive(Error, Diagnostic, Debug)]
pub enum PatchError {
    // Rule set errors
    #[error("Malformed rule set {path}: {reason}")]
    #[diagnostic(
        code(locpatch::ruleset::malformed),
        help("The rule set must be a mapping of rule keys to {{ match, replacement }} entries or of file paths to {{ original: translated }} maps")
    )]
    MalformedRuleSet { path: String, reason: String },

    #[error("Duplicate rule key: {key}")]
    #[diagnostic(
        code(locpatch::ruleset::duplicate_key),
        help("Every rule key must be unique within a rule set")
    )]
    DuplicateRuleKey { key: String },

    #[error("Rule '{key}' replaces its match text with identical text")]
    #[diagnostic(
        code(locpatch::ruleset::no_op),
        help("Remove the rule or give it a different replacement")
    )]
    NoOpRule { key: String },

    #[error("Rule '{key}' has an empty match text")]
    #[diagnostic(code(locpatch::ruleset::empty_match))]
    EmptyMatch { key: String },

    #[error("Rule '{key}' has an invalid scope '{scope}': {reason}")]
    #[diagnostic(code(locpatch::ruleset::invalid_scope))]
    InvalidScope {
        key: String,
        scope: String,
        reason: String,
    },

    // Source tree errors
    #[error("Source tree not found at: {path}")]
    #[diagnostic(
        code(locpatch::tree::not_found),
        help("Pass the root directory of the upstream checkout with --root")
    )]
    TreeNotFound { path: String },

    // Configuration errors
    #[error("Configuration file not found: {path}")]
    #[diagnostic(code(locpatch::config::not_found))]
    ConfigNotFound { path: String },

    #[error("Failed to parse configuration file: {path}: {reason}")]
    #[diagnostic(code(locpatch::config::parse_failed))]
    ConfigParseFailed { path: String, reason: String },

    #[error("Invalid configuration: {message}")]
    #[diagnostic(code(locpatch::config::invalid))]
    ConfigInvalid { message: String },

    #[error("Failed to read configuration file: {path}")]
    #[diagnostic(code(locpatch::config::read_failed))]
    ConfigReadFailed { path: String, reason: String },

    // File system errors
    #[error("File not found: {path}")]
    #[diagnostic(code(locpatch::fs::not_found))]
    FileNotFound { path: String },

    #[error("Failed to read file: {path}: {reason}")]
    #[diagnostic(code(locpatch::fs::read_failed))]
    FileReadFailed { path: String, reason: String },

    #[error("Failed to write file: {path}: {reason}")]
    #[diagnostic(code(locpatch::fs::write_failed))]
    FileWriteFailed { path: String, reason: String },

    #[error("Timed out after {timeout_ms}ms accessing {path}")]
    #[diagnostic(code(locpatch::fs::timeout))]
    IoTimeout { path: String, timeout_ms: u128 },

    #[error("IO error: {message}")]
    #[diagnostic(code(locpatch::fs::io_error))]
    IoError { message: String },

    // Verification errors
    #[error("Verification failed for {file}: {reason}")]
    #[diagnostic(
        code(locpatch::verify::failed),
        help("The translated text would break the host project's source; fix the replacement text")
    )]
    VerificationFailed { file: String, reason: String },

    // Provenance errors
    #[error("Failed to persist provenance record to {path}: {reason}")]
    #[diagnostic(
        code(locpatch::provenance::persist_failed),
        help("A build whose provenance cannot be recorded must not be published")
    )]
    ProvenancePersistFailed { path: String, reason: String },

    // Pipeline errors
    #[error("Failed to start worker pool: {reason}")]
    #[diagnostic(code(locpatch::pipeline::worker_pool))]
    WorkerPoolFailed { reason: String },

    #[error("Patch run is blocking: {reason}")]
    #[diagnostic(
        code(locpatch::pipeline::blocking),
        help("Fix the drifted mandatory rules listed in the conflict report before building")
    )]
    RunBlocked { reason: String },
}

impl PatchError {
    /// Process exit status for this error
    ///
    /// A blocking run is distinguished from operational failures so the invoking
    /// pipeline can tell "do not build" apart from "the tool broke".
    pub fn exit_code(&self) -> i32 {
        match self {
            PatchError::RunBlocked { .. } => 2,
            _ => 1,
        }
    }
}

impl From<std::io::Error> for PatchError {
    fn from(err: std::io::Error) -> Self {
        PatchError::IoError {
            message: err.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for PatchError {
    fn from(err: serde_yaml::Error) -> Self {
        PatchError::ConfigParseFailed {
            path: "unknown".to_string(),
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for PatchError {
    fn from(err: serde_json::Error) -> Self {
        PatchError::ConfigParseFailed {
            path: "unknown".to_string(),
            reason: err.to_string(),
        }
    }
}

/// Result type alias using miette for error handling
pub type Result<T> = miette::Result<T, PatchError>;
