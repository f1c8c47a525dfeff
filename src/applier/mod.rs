//! Patch Applier
//!
//! Turns locator resolutions into per-rule outcomes and writes the accepted
//! edits. Only a rule with exactly one location is ever applied; zero or many
//! locations are reported, never guessed at.
//!
//! Writes are grouped per file and each file is owned by one task for the
//! whole batch: offsets were computed against the original content, every
//! splice is re-validated against those bytes, and splices run from the end
//! of the file backwards so earlier offsets stay valid.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{PatchError, Result};
use crate::locator::{Located, Location, Resolution};
use crate::ruleset::RuleSet;
use crate::transaction::{FileTransaction, Stage, TempStage};
use crate::tree::SourceTree;
use crate::tree::io::read_with_timeout;
use crate::workers::{CancelToken, worker_pool};

/// Why a rule was not applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    NotFound,
    AlreadyApplied,
    Timeout,
    Overlap { other: String },
    WriteFailed { reason: String },
    ReadFailed { reason: String },
    Cancelled,
}

impl SkipReason {
    /// Skips that mean the rule's text is already where it should be
    pub fn is_satisfied(&self) -> bool {
        matches!(self, SkipReason::AlreadyApplied)
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotFound => f.write_str("NotFound"),
            SkipReason::AlreadyApplied => f.write_str("AlreadyApplied"),
            SkipReason::Timeout => f.write_str("Timeout"),
            SkipReason::Overlap { other } => write!(f, "Overlap({other})"),
            SkipReason::WriteFailed { reason } => write!(f, "WriteFailed({reason})"),
            SkipReason::ReadFailed { reason } => write!(f, "ReadFailed({reason})"),
            SkipReason::Cancelled => f.write_str("Cancelled"),
        }
    }
}

/// Result of one rule; never changes once produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Applied { location: Location },
    Skipped { reason: SkipReason },
    Ambiguous { locations: Vec<Location> },
}

impl Outcome {
    fn skipped(reason: SkipReason) -> Self {
        Outcome::Skipped { reason }
    }

    /// Whether the rule's intent holds in the patched tree
    pub fn is_satisfied(&self) -> bool {
        match self {
            Outcome::Applied { .. } => true,
            Outcome::Skipped { reason } => reason.is_satisfied(),
            Outcome::Ambiguous { .. } => false,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Applied { location } => write!(f, "Applied({location})"),
            Outcome::Skipped { reason } => write!(f, "Skipped({reason})"),
            Outcome::Ambiguous { locations } => {
                write!(f, "Ambiguous({} locations)", locations.len())
            }
        }
    }
}

/// Outcome of one rule, with the rule's identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleOutcome {
    pub key: String,
    pub mandatory: bool,
    pub outcome: Outcome,
}

/// Applier settings
#[derive(Debug, Clone)]
pub struct ApplyOptions {
    pub concurrency: usize,
    pub io_timeout: Option<Duration>,
    /// Compute outcomes and patched content without writing
    pub dry_run: bool,
    pub cancel: CancelToken,
    pub stage: Arc<dyn Stage>,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            concurrency: crate::workers::default_concurrency(),
            io_timeout: None,
            dry_run: false,
            cancel: CancelToken::new(),
            stage: Arc::new(TempStage),
        }
    }
}

/// A file the applier rewrote (or would have, in a dry run)
#[derive(Debug, Clone)]
pub struct TouchedFile {
    pub file: String,
    /// Content before patching
    pub original: Vec<u8>,
    /// Patched content, kept only in dry runs where it is not on disk
    pub preview: Option<Vec<u8>>,
    /// (rule index, matched location in `original`), ascending by offset
    pub applied: Vec<(usize, Location)>,
}

impl TouchedFile {
    /// Indices of the rules applied to this file, ascending
    pub fn rule_indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = self.applied.iter().map(|(rule, _)| *rule).collect();
        indices.sort_unstable();
        indices
    }
}

/// Everything the applier produced
#[derive(Debug, Clone)]
pub struct ApplyResult {
    /// Index-aligned with `RuleSet::rules`
    pub outcomes: Vec<RuleOutcome>,
    /// Sorted by path
    pub touched: Vec<TouchedFile>,
}

#[derive(Debug)]
struct Edit {
    rule: usize,
    location: Location,
}

struct FileBatch {
    file: String,
    edits: Vec<Edit>,
}

struct BatchResult {
    outcomes: Vec<(usize, Outcome)>,
    touched: Option<TouchedFile>,
}

/// Decide every rule's outcome and write accepted edits
pub fn apply(
    tree: &SourceTree,
    rules: &RuleSet,
    located: &Located,
    options: &ApplyOptions,
) -> Result<ApplyResult> {
    let mut outcomes: Vec<Option<Outcome>> = vec![None; rules.len()];
    let mut by_file: BTreeMap<String, Vec<Edit>> = BTreeMap::new();

    for (index, resolution) in located.resolutions().iter().enumerate() {
        outcomes[index] = match resolution {
            Resolution::AlreadyApplied => Some(Outcome::skipped(SkipReason::AlreadyApplied)),
            Resolution::TimedOut { .. } => Some(Outcome::skipped(SkipReason::Timeout)),
            Resolution::ReadFailed { reason, .. } => {
                Some(Outcome::skipped(SkipReason::ReadFailed {
                    reason: reason.clone(),
                }))
            }
            Resolution::Cancelled => Some(Outcome::skipped(SkipReason::Cancelled)),
            Resolution::Found(locations) => match locations.as_slice() {
                [] => Some(Outcome::skipped(SkipReason::NotFound)),
                [location] => {
                    by_file.entry(location.file.clone()).or_default().push(Edit {
                        rule: index,
                        location: location.clone(),
                    });
                    None
                }
                _ => Some(Outcome::Ambiguous {
                    locations: locations.clone(),
                }),
            },
        };
    }

    // Edits were pushed in rule order, so the earlier rule wins an overlap.
    let mut batches = Vec::with_capacity(by_file.len());
    for (file, edits) in by_file {
        let mut kept: Vec<Edit> = Vec::with_capacity(edits.len());
        for edit in edits {
            match kept.iter().find(|k| k.location.overlaps(&edit.location)) {
                Some(winner) => {
                    let other = rules.rules()[winner.rule].key.clone();
                    debug!(event = "overlap", rule = %rules.rules()[edit.rule].key, other = %other);
                    outcomes[edit.rule] = Some(Outcome::skipped(SkipReason::Overlap { other }));
                }
                None => kept.push(edit),
            }
        }
        batches.push(FileBatch { file, edits: kept });
    }

    let pool = worker_pool(options.concurrency)?;
    let results: Vec<BatchResult> = pool.install(|| {
        batches
            .par_iter()
            .map(|batch| apply_batch(tree, rules, batch, options))
            .collect()
    });

    let mut touched = Vec::new();
    for result in results {
        for (index, outcome) in result.outcomes {
            outcomes[index] = Some(outcome);
        }
        touched.extend(result.touched);
    }

    let outcomes = rules
        .rules()
        .iter()
        .zip(outcomes)
        .map(|(rule, outcome)| RuleOutcome {
            key: rule.key.clone(),
            mandatory: rule.mandatory,
            // Every rule is either decided above or belongs to exactly one batch.
            outcome: outcome.unwrap_or(Outcome::skipped(SkipReason::NotFound)),
        })
        .collect();

    info!(
        event = "apply_finished",
        files_touched = touched.len(),
        dry_run = options.dry_run
    );
    Ok(ApplyResult { outcomes, touched })
}

fn skip_all(batch: &FileBatch, reason: SkipReason) -> BatchResult {
    BatchResult {
        outcomes: batch
            .edits
            .iter()
            .map(|edit| (edit.rule, Outcome::skipped(reason.clone())))
            .collect(),
        touched: None,
    }
}

fn applied(edit: &Edit) -> (usize, Outcome) {
    (
        edit.rule,
        Outcome::Applied {
            location: edit.location.clone(),
        },
    )
}

fn apply_batch(
    tree: &SourceTree,
    rules: &RuleSet,
    batch: &FileBatch,
    options: &ApplyOptions,
) -> BatchResult {
    if options.cancel.is_cancelled() {
        return skip_all(batch, SkipReason::Cancelled);
    }

    let path = tree.path_of(&batch.file);
    let original = match read_with_timeout(&path, options.io_timeout) {
        Ok(bytes) => bytes,
        Err(PatchError::IoTimeout { .. }) => return skip_all(batch, SkipReason::Timeout),
        Err(e) => {
            return skip_all(
                batch,
                SkipReason::ReadFailed {
                    reason: e.to_string(),
                },
            );
        }
    };

    let mut outcomes = Vec::with_capacity(batch.edits.len());
    let mut valid: Vec<&Edit> = Vec::with_capacity(batch.edits.len());
    for edit in &batch.edits {
        let rule = &rules.rules()[edit.rule];
        let span = original.get(edit.location.offset..edit.location.end());
        if span == Some(rule.match_text.as_bytes()) {
            valid.push(edit);
        } else {
            // Upstream changed between resolution and write.
            warn!(event = "drifted_during_apply", rule = %rule.key, file = %batch.file);
            outcomes.push((edit.rule, Outcome::skipped(SkipReason::NotFound)));
        }
    }
    if valid.is_empty() {
        return BatchResult {
            outcomes,
            touched: None,
        };
    }

    valid.sort_by(|a, b| b.location.offset.cmp(&a.location.offset));
    let mut patched = original.clone();
    for edit in &valid {
        let replacement = rules.rules()[edit.rule].replacement.as_bytes();
        patched.splice(
            edit.location.offset..edit.location.end(),
            replacement.iter().copied(),
        );
    }

    let applied_spans: Vec<(usize, Location)> = valid
        .iter()
        .rev()
        .map(|edit| (edit.rule, edit.location.clone()))
        .collect();

    if options.dry_run {
        outcomes.extend(valid.iter().map(|&edit| applied(edit)));
        return BatchResult {
            outcomes,
            touched: Some(TouchedFile {
                file: batch.file.clone(),
                original,
                preview: Some(patched),
                applied: applied_spans,
            }),
        };
    }

    let mut transaction = FileTransaction::new(&path, original.clone());
    match transaction.write(&options.stage, patched, options.io_timeout) {
        Ok(()) => {
            transaction.commit();
            debug!(event = "file_patched", file = %batch.file, rules = valid.len());
            outcomes.extend(valid.iter().map(|&edit| applied(edit)));
            BatchResult {
                outcomes,
                touched: Some(TouchedFile {
                    file: batch.file.clone(),
                    original,
                    preview: None,
                    applied: applied_spans,
                }),
            }
        }
        Err(e) => {
            // Dropping the transaction restores the original bytes.
            drop(transaction);
            warn!(event = "write_failed", file = %batch.file, error = %e);
            let reason = match e {
                PatchError::IoTimeout { .. } => SkipReason::Timeout,
                other => SkipReason::WriteFailed {
                    reason: other.to_string(),
                },
            };
            outcomes.extend(
                valid
                    .iter()
                    .map(|edit| (edit.rule, Outcome::skipped(reason.clone()))),
            );
            BatchResult {
                outcomes,
                touched: None,
            }
        }
    }
}

#[cfg(test)]
mod tests;
