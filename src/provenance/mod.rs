//! Build Provenance Recorder
//!
//! One immutable record per run: which upstream commit was patched with which
//! rule set version, what happened, and a digest of the patched files. The
//! record is written once under a name unique to the run and never
//! overwritten; the same record is appended as one JSON line to a history
//! file that only ever grows.

pub mod ledger;

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::info;

use crate::error::{Result, provenance as prov_err};
use crate::hash::hash_bytes;
use crate::report::{Classification, ConflictReport};

/// Version of this tool, recorded with every run
pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// What was built from what
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    pub upstream_commit: String,
    pub ruleset_version: String,
    pub applied_count: usize,
    /// Skips other than already-applied rules
    pub skipped_count: usize,
    pub ambiguous_count: usize,
    pub backend_id: String,
    pub timestamp: DateTime<Utc>,
    pub tool_version: String,
    pub classification: Classification,
    /// Tree-relative paths, sorted
    pub files_touched: Vec<String>,
    /// BLAKE3 over the patched content of `files_touched`
    pub tree_digest: String,
    pub untranslated_count: usize,
    pub already_applied_count: usize,
}

impl ProvenanceRecord {
    /// Record for a finished run
    pub fn from_report(
        report: &ConflictReport,
        backend_id: impl Into<String>,
        files_touched: Vec<String>,
        tree_digest: String,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            upstream_commit: report.upstream_commit.clone(),
            ruleset_version: report.ruleset_version.clone(),
            applied_count: report.stats.applied,
            skipped_count: report.stats.skipped,
            ambiguous_count: report.stats.ambiguous,
            backend_id: backend_id.into(),
            timestamp,
            tool_version: TOOL_VERSION.to_string(),
            classification: report.classification,
            files_touched,
            tree_digest,
            untranslated_count: report.stats.untranslated,
            already_applied_count: report.stats.already_applied,
        }
    }

    /// Run identifier: timestamp plus a short content hash
    pub fn run_id(&self) -> String {
        let digest = serde_json::to_vec(self)
            .map(|bytes| hash_bytes(&bytes))
            .unwrap_or_default();
        let short = digest
            .trim_start_matches(crate::hash::HASH_PREFIX)
            .get(..12)
            .unwrap_or_default()
            .to_string();
        format!("{}-{short}", self.timestamp.format("%Y%m%dT%H%M%S%.3fZ"))
    }
}

/// Writes provenance records and their history
#[derive(Debug, Clone)]
pub struct ProvenanceRecorder {
    output_dir: PathBuf,
    history_file: PathBuf,
}

impl ProvenanceRecorder {
    pub fn new(output_dir: impl Into<PathBuf>, history_file: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            history_file: history_file.into(),
        }
    }

    /// Path the record for `run_id` is written to
    pub fn record_path(&self, run_id: &str) -> PathBuf {
        self.output_dir.join(format!("provenance-{run_id}.json"))
    }

    /// Persist `record` once, then append it to the history
    ///
    /// Fails if a record already exists at the target path. Failures are
    /// fatal to the run and not retried.
    pub fn persist(&self, record: &ProvenanceRecord) -> Result<PathBuf> {
        let path = self.record_path(&record.run_id());
        let shown = path.display().to_string();

        fs::create_dir_all(&self.output_dir).map_err(|e| prov_err::persist_failed(&shown, e))?;
        let json = serde_json::to_vec_pretty(record).map_err(|e| prov_err::persist_failed(&shown, e))?;

        let mut staged =
            NamedTempFile::new_in(&self.output_dir).map_err(|e| prov_err::persist_failed(&shown, e))?;
        staged
            .write_all(&json)
            .and_then(|()| staged.as_file().sync_all())
            .map_err(|e| prov_err::persist_failed(&shown, e))?;
        let file = staged
            .persist_noclobber(&path)
            .map_err(|e| prov_err::persist_failed(&shown, e.error))?;

        let mut permissions = file
            .metadata()
            .map_err(|e| prov_err::persist_failed(&shown, e))?
            .permissions();
        permissions.set_readonly(true);
        fs::set_permissions(&path, permissions).map_err(|e| prov_err::persist_failed(&shown, e))?;

        self.append_history(record)?;
        info!(event = "provenance_recorded", path = %shown, run = %record.run_id());
        Ok(path)
    }

    fn append_history(&self, record: &ProvenanceRecord) -> Result<()> {
        let shown = self.history_file.display().to_string();
        if let Some(parent) = self.history_file.parent() {
            fs::create_dir_all(parent).map_err(|e| prov_err::persist_failed(&shown, e))?;
        }
        let line = serde_json::to_string(record).map_err(|e| prov_err::persist_failed(&shown, e))?;

        let mut history = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.history_file)
            .map_err(|e| prov_err::persist_failed(&shown, e))?;
        writeln!(history, "{line}")
            .and_then(|()| history.sync_all())
            .map_err(|e| prov_err::persist_failed(&shown, e))
    }

    /// All records in the history file, oldest first
    pub fn history(&self) -> Result<Vec<ProvenanceRecord>> {
        let shown = self.history_file.display().to_string();
        let text = match fs::read_to_string(&self.history_file) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(prov_err::persist_failed(&shown, e)),
        };
        text.lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(|e| prov_err::persist_failed(&shown, e)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PatchError;
    use crate::report::Stats;
    use tempfile::TempDir;

    fn record(timestamp: DateTime<Utc>) -> ProvenanceRecord {
        let report = ConflictReport::new(
            "abc123",
            "blake3:00ff",
            false,
            Vec::new(),
            Vec::new(),
            Stats {
                applied: 1,
                ..Stats::default()
            },
        );
        ProvenanceRecord::from_report(
            &report,
            "linux-x86_64",
            vec!["src/main.rs".to_string()],
            "blake3:abcd".to_string(),
            timestamp,
        )
    }

    fn recorder(temp: &TempDir) -> ProvenanceRecorder {
        let out = temp.path().join(".locpatch");
        ProvenanceRecorder::new(&out, out.join("history.jsonl"))
    }

    #[test]
    fn test_record_fields() {
        let record = record(Utc::now());
        assert_eq!(record.upstream_commit, "abc123");
        assert_eq!(record.applied_count, 1);
        assert_eq!(record.skipped_count, 0);
        assert_eq!(record.ambiguous_count, 0);
        assert_eq!(record.backend_id, "linux-x86_64");
        assert_eq!(record.tool_version, TOOL_VERSION);
    }

    #[test]
    fn test_persist_writes_read_only_record_and_history() {
        let temp = TempDir::new().unwrap();
        let recorder = recorder(&temp);
        let record = record(Utc::now());

        let path = recorder.persist(&record).unwrap();
        let stored: ProvenanceRecord =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(stored, record);
        assert!(fs::metadata(&path).unwrap().permissions().readonly());
        assert_eq!(recorder.history().unwrap(), vec![record]);
    }

    #[test]
    fn test_persist_refuses_to_overwrite() {
        let temp = TempDir::new().unwrap();
        let recorder = recorder(&temp);
        let record = record(Utc::now());

        recorder.persist(&record).unwrap();
        let result = recorder.persist(&record);
        assert!(matches!(result, Err(PatchError::ProvenancePersistFailed { .. })));
        assert_eq!(recorder.history().unwrap().len(), 1);
    }

    #[test]
    fn test_history_appends_across_runs() {
        let temp = TempDir::new().unwrap();
        let recorder = recorder(&temp);
        let first = record(Utc::now());
        let second = record(first.timestamp + chrono::Duration::seconds(1));

        recorder.persist(&first).unwrap();
        recorder.persist(&second).unwrap();
        assert_eq!(recorder.history().unwrap(), vec![first, second]);
    }

    #[test]
    fn test_run_id_is_stable() {
        let record = record(Utc::now());
        assert_eq!(record.run_id(), record.run_id());
        assert!(record.run_id().contains('T'));
    }

    #[test]
    fn test_missing_history_is_empty() {
        let temp = TempDir::new().unwrap();
        assert!(recorder(&temp).history().unwrap().is_empty());
    }
}
