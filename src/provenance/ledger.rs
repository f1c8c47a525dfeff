//! Where each rule was last applied
//!
//! A rule whose match text is gone only counts as already applied when this
//! ledger says a previous run applied it to a file that is still
//! byte-identical to what that run left behind. Finding the replacement text
//! somewhere in scope is not enough: common translations occur everywhere.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::applier::{Outcome, RuleOutcome, SkipReason};
use crate::error::{Result, provenance as prov_err};
use crate::hash::hash_bytes;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedLedger {
    /// Rule key to the tree-relative file it was applied to
    rules: BTreeMap<String, String>,
    /// Tree-relative file to the digest of its content after the last write
    files: BTreeMap<String, String>,
}

impl AppliedLedger {
    /// Read a ledger; a missing or unreadable one is empty
    pub fn load(path: &Path) -> Self {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                warn!(event = "ledger_unreadable", path = %path.display(), error = %e);
                return Self::default();
            }
        };
        match serde_json::from_str(&text) {
            Ok(ledger) => ledger,
            Err(e) => {
                warn!(event = "ledger_invalid", path = %path.display(), error = %e);
                Self::default()
            }
        }
    }

    /// Whether `key` was applied to `file` and `content` is what that run wrote
    pub fn vouches_for(&self, key: &str, file: &str, content: &[u8]) -> bool {
        self.rules.get(key).is_some_and(|recorded| recorded == file)
            && self
                .files
                .get(file)
                .is_some_and(|digest| *digest == hash_bytes(content))
    }

    /// Fold in one run's outcomes and the patched digest of every file it wrote
    ///
    /// Rules that drifted or are no longer in the rule set lose their entry.
    /// Skips that say nothing about the tree keep it.
    pub fn update(&mut self, outcomes: &[RuleOutcome], written: BTreeMap<String, String>) {
        let keys: BTreeSet<&str> = outcomes.iter().map(|o| o.key.as_str()).collect();
        self.rules.retain(|key, _| keys.contains(key.as_str()));

        for outcome in outcomes {
            match &outcome.outcome {
                Outcome::Applied { location } => {
                    self.rules.insert(outcome.key.clone(), location.file.clone());
                }
                Outcome::Ambiguous { .. }
                | Outcome::Skipped {
                    reason: SkipReason::NotFound,
                } => {
                    self.rules.remove(&outcome.key);
                }
                Outcome::Skipped { .. } => {}
            }
        }

        self.files.extend(written);
        let referenced: BTreeSet<&String> = self.rules.values().collect();
        self.files.retain(|file, _| referenced.contains(file));
    }

    /// Drop every rule applied to one of `files`, so none of them can be vouched for
    pub fn forget_files(&mut self, files: &BTreeSet<&str>) {
        self.rules.retain(|_, file| !files.contains(file.as_str()));
        self.files.retain(|file, _| !files.contains(file.as_str()));
    }

    /// Replace the ledger at `path`
    pub fn persist(&self, path: &Path) -> Result<()> {
        let shown = path.display().to_string();
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir).map_err(|e| prov_err::persist_failed(&shown, e))?;
        let json = serde_json::to_vec_pretty(self).map_err(|e| prov_err::persist_failed(&shown, e))?;

        let mut staged = NamedTempFile::new_in(dir).map_err(|e| prov_err::persist_failed(&shown, e))?;
        staged
            .write_all(&json)
            .and_then(|()| staged.as_file().sync_all())
            .map_err(|e| prov_err::persist_failed(&shown, e))?;
        staged
            .persist(path)
            .map_err(|e| prov_err::persist_failed(&shown, e.error))?;
        debug!(event = "ledger_written", path = %shown, rules = self.rules.len());
        Ok(())
    }
}
