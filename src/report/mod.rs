//! Drift Detector / Conflict Reporter
//!
//! Classifies a run from its per-rule outcomes and verification failures, and
//! aggregates both into a report that is printed and persisted next to the
//! provenance record.

pub mod display;

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::applier::{Outcome, RuleOutcome, SkipReason};
use crate::error::{Result, fs as fs_err};
use crate::verify::VerificationFailure;

/// Overall verdict of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// Every rule applied or was already applied
    Clean,
    /// Some optional rules did not apply
    Degraded,
    /// A mandatory rule did not apply, or verification failed
    Blocking,
}

impl Classification {
    pub fn is_blocking(self) -> bool {
        self == Classification::Blocking
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Classification::Clean => "Clean",
            Classification::Degraded => "Degraded",
            Classification::Blocking => "Blocking",
        })
    }
}

/// Counters for the run summary
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub rules: usize,
    pub applied: usize,
    /// Skipped for any reason other than being already applied
    pub skipped: usize,
    pub already_applied: usize,
    pub ambiguous: usize,
    pub files_scanned: usize,
    pub files_binary: usize,
    pub files_touched: usize,
    /// File-group entries without a translation, dropped at load
    pub untranslated: usize,
}

impl Stats {
    /// Count outcomes; file and load counters are filled in by the caller
    pub fn from_outcomes(outcomes: &[RuleOutcome]) -> Self {
        let mut stats = Stats {
            rules: outcomes.len(),
            ..Stats::default()
        };
        for outcome in outcomes {
            match &outcome.outcome {
                Outcome::Applied { .. } => stats.applied += 1,
                Outcome::Skipped {
                    reason: SkipReason::AlreadyApplied,
                } => stats.already_applied += 1,
                Outcome::Skipped { .. } => stats.skipped += 1,
                Outcome::Ambiguous { .. } => stats.ambiguous += 1,
            }
        }
        stats
    }
}

/// Per-run report of every rule's outcome and the verification result
#[derive(Debug, Clone, Serialize)]
pub struct ConflictReport {
    pub upstream_commit: String,
    pub ruleset_version: String,
    pub dry_run: bool,
    pub classification: Classification,
    pub stats: Stats,
    pub outcomes: Vec<RuleOutcome>,
    pub verification_failures: Vec<VerificationFailure>,
}

impl ConflictReport {
    pub fn new(
        upstream_commit: impl Into<String>,
        ruleset_version: impl Into<String>,
        dry_run: bool,
        outcomes: Vec<RuleOutcome>,
        verification_failures: Vec<VerificationFailure>,
        stats: Stats,
    ) -> Self {
        let classification = classify(&outcomes, &verification_failures);
        Self {
            upstream_commit: upstream_commit.into(),
            ruleset_version: ruleset_version.into(),
            dry_run,
            classification,
            stats,
            outcomes,
            verification_failures,
        }
    }

    /// Rules that did not reach their intended state
    pub fn drifted(&self) -> impl Iterator<Item = &RuleOutcome> {
        self.outcomes.iter().filter(|o| !o.outcome.is_satisfied())
    }

    /// One line per cause of a blocking classification
    pub fn blocking_reasons(&self) -> Vec<String> {
        let mut reasons: Vec<String> = self
            .drifted()
            .filter(|o| o.mandatory)
            .map(|o| format!("mandatory rule {}: {}", o.key, o.outcome))
            .collect();
        reasons.extend(
            self.verification_failures
                .iter()
                .map(|f| format!("verification failed for {}: {}", f.file, f.reason)),
        );
        reasons
    }

    /// Write the report as pretty JSON into `dir`
    pub fn persist(&self, dir: &Path, file_name: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(dir).map_err(|e| fs_err::write_failed(dir, e))?;
        let path = dir.join(file_name);
        let json = serde_json::to_vec_pretty(self).map_err(|e| fs_err::write_failed(&path, e))?;

        let mut staged = NamedTempFile::new_in(dir).map_err(|e| fs_err::write_failed(&path, e))?;
        staged
            .write_all(&json)
            .map_err(|e| fs_err::write_failed(&path, e))?;
        staged
            .persist(&path)
            .map_err(|e| fs_err::write_failed(&path, e.error))?;

        debug!(event = "report_persisted", path = %path.display());
        Ok(path)
    }
}

/// Clean, Degraded or Blocking from outcomes and verification failures
pub fn classify(outcomes: &[RuleOutcome], failures: &[VerificationFailure]) -> Classification {
    if !failures.is_empty() {
        return Classification::Blocking;
    }
    let mut degraded = false;
    for outcome in outcomes.iter().filter(|o| !o.outcome.is_satisfied()) {
        if outcome.mandatory {
            return Classification::Blocking;
        }
        degraded = true;
    }
    if degraded {
        Classification::Degraded
    } else {
        Classification::Clean
    }
}
