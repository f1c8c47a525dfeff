//! Source Locator
//!
//! Resolves every rule to the exact byte ranges of its match text in the
//! files its scope covers. Files are scanned in parallel on a bounded pool;
//! each file is read once and searched for every rule that applies to it, and
//! per-file results are merged back in sorted path order so the output does
//! not depend on scheduling.

pub mod search;

use std::fmt;
use std::time::Duration;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{PatchError, Result};
use crate::provenance::ledger::AppliedLedger;
use crate::ruleset::{RuleSet, ScopeMatcher};
use crate::tree::io::{looks_binary, read_with_timeout};
use crate::tree::{Excludes, SourceTree, Unreadable};
use crate::workers::{CancelToken, worker_pool};

/// A byte range inside one tree file
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Location {
    /// Tree-relative path with forward slashes
    pub file: String,
    pub offset: usize,
    pub len: usize,
}

impl Location {
    pub fn end(&self) -> usize {
        self.offset + self.len
    }

    /// Whether two ranges in the same file share at least one byte
    pub fn overlaps(&self, other: &Location) -> bool {
        self.file == other.file && self.offset < other.end() && other.offset < self.end()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}+{}", self.file, self.offset, self.len)
    }
}

/// What the locator learned about one rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Occurrences of the match text, sorted by file then offset; may be empty
    Found(Vec<Location>),
    /// No occurrence of the match text, and the file a previous run applied
    /// the rule to is unchanged since
    AlreadyApplied,
    /// A file in scope could not be read in time
    TimedOut { files: Vec<String> },
    /// A file in scope could not be read at all
    ReadFailed { file: String, reason: String },
    /// Cancellation stopped the scan before every file in scope was read
    Cancelled,
}

/// Locator settings
#[derive(Debug, Clone)]
pub struct LocatorOptions {
    pub concurrency: usize,
    pub io_timeout: Option<Duration>,
    pub cancel: CancelToken,
    /// Where previous runs applied each rule
    pub prior: AppliedLedger,
}

/// Resolutions for a whole rule set, index-aligned with `RuleSet::rules`
#[derive(Debug, Clone)]
pub struct Located {
    resolutions: Vec<Resolution>,
    pub files_scanned: usize,
    pub files_binary: usize,
}

impl Located {
    pub fn resolution(&self, index: usize) -> Option<&Resolution> {
        self.resolutions.get(index)
    }

    pub fn resolutions(&self) -> &[Resolution] {
        &self.resolutions
    }
}

enum ScanStatus {
    Scanned,
    Binary,
    TimedOut,
    ReadFailed(String),
    Cancelled,
}

struct FileScan {
    file: String,
    status: ScanStatus,
    /// Rules whose scope covers this file
    in_scope: Vec<usize>,
    /// Occurrences of unapplied match text per rule
    hits: Vec<(usize, Vec<Location>)>,
    /// Rules the ledger shows were applied to this exact content
    applied: Vec<usize>,
}

/// Resolve every rule of `rules` against `tree`
pub fn locate(
    tree: &SourceTree,
    rules: &RuleSet,
    excludes: &Excludes,
    options: &LocatorOptions,
) -> Result<Located> {
    let listing = tree.files(excludes);
    let files = &listing.files;
    let matchers: Vec<ScopeMatcher<'_>> = rules
        .rules()
        .iter()
        .map(|rule| ScopeMatcher::new(rule.scope.as_ref()))
        .collect();

    // Only files at least one rule applies to are read.
    let candidates: Vec<(&str, Vec<usize>)> = files
        .iter()
        .filter_map(|file| {
            let indices: Vec<usize> = matchers
                .iter()
                .enumerate()
                .filter(|(_, matcher)| matcher.matches(file))
                .map(|(index, _)| index)
                .collect();
            (!indices.is_empty()).then_some((file.as_str(), indices))
        })
        .collect();

    debug!(
        event = "locate_started",
        files = files.len(),
        candidates = candidates.len(),
        rules = rules.len()
    );

    let pool = worker_pool(options.concurrency)?;
    let mut scans: Vec<FileScan> = pool.install(|| {
        candidates
            .par_iter()
            .map(|(file, indices)| scan_file(tree, file, indices.clone(), rules, options))
            .collect()
    });
    scans.extend(unreadable_scans(&listing.unreadable, &matchers));

    let located = merge(scans, rules.len());
    debug!(
        event = "locate_finished",
        files_scanned = located.files_scanned,
        files_binary = located.files_binary
    );
    Ok(located)
}

/// Paths the walk could not enter, as failed reads of every rule that could reach them
fn unreadable_scans(unreadable: &[Unreadable], matchers: &[ScopeMatcher<'_>]) -> Vec<FileScan> {
    unreadable
        .iter()
        .filter_map(|entry| {
            let in_scope: Vec<usize> = matchers
                .iter()
                .enumerate()
                .filter(|(_, matcher)| matcher.may_reach(&entry.path))
                .map(|(index, _)| index)
                .collect();
            (!in_scope.is_empty()).then(|| FileScan {
                file: entry.path.clone(),
                status: ScanStatus::ReadFailed(entry.reason.clone()),
                in_scope,
                hits: Vec::new(),
                applied: Vec::new(),
            })
        })
        .collect()
}

fn scan_file(
    tree: &SourceTree,
    file: &str,
    in_scope: Vec<usize>,
    rules: &RuleSet,
    options: &LocatorOptions,
) -> FileScan {
    let mut scan = FileScan {
        file: file.to_string(),
        status: ScanStatus::Scanned,
        in_scope,
        hits: Vec::new(),
        applied: Vec::new(),
    };

    if options.cancel.is_cancelled() {
        scan.status = ScanStatus::Cancelled;
        return scan;
    }

    let bytes = match read_with_timeout(&tree.path_of(file), options.io_timeout) {
        Ok(bytes) => bytes,
        Err(PatchError::IoTimeout { .. }) => {
            warn!(event = "read_timeout", file = %file);
            scan.status = ScanStatus::TimedOut;
            return scan;
        }
        Err(e) => {
            warn!(event = "read_failed", file = %file, error = %e);
            scan.status = ScanStatus::ReadFailed(e.to_string());
            return scan;
        }
    };

    if looks_binary(&bytes) {
        debug!(event = "binary_skipped", file = %file);
        scan.status = ScanStatus::Binary;
        return scan;
    }

    let all = rules.rules();
    for &index in &scan.in_scope {
        let rule = &all[index];
        let needle = rule.match_text.as_bytes();
        let offsets = search::find_unapplied(&bytes, needle, rule.replacement.as_bytes());
        if !offsets.is_empty() {
            let locations = offsets
                .into_iter()
                .map(|offset| Location {
                    file: scan.file.clone(),
                    offset,
                    len: needle.len(),
                })
                .collect();
            scan.hits.push((index, locations));
        } else if options.prior.vouches_for(&rule.key, file, &bytes)
            && (rule.replacement.is_empty() || search::contains(&bytes, rule.replacement.as_bytes()))
        {
            scan.applied.push(index);
        }
    }
    scan
}

/// Per-rule accumulator while merging file scans
#[derive(Default)]
struct Tally {
    found: Vec<Location>,
    applied: bool,
    timed_out: Vec<String>,
    read_failed: Option<(String, String)>,
    cancelled: bool,
}

impl Tally {
    fn into_resolution(self) -> Resolution {
        if self.cancelled {
            Resolution::Cancelled
        } else if !self.timed_out.is_empty() {
            Resolution::TimedOut {
                files: self.timed_out,
            }
        } else if let Some((file, reason)) = self.read_failed {
            Resolution::ReadFailed { file, reason }
        } else if self.found.is_empty() && self.applied {
            Resolution::AlreadyApplied
        } else {
            Resolution::Found(self.found)
        }
    }
}

fn merge(scans: Vec<FileScan>, rule_count: usize) -> Located {
    let mut tallies: Vec<Tally> = (0..rule_count).map(|_| Tally::default()).collect();
    let mut files_scanned = 0;
    let mut files_binary = 0;

    // `scans` is in sorted path order, so every per-rule list stays sorted.
    for scan in scans {
        match &scan.status {
            ScanStatus::Scanned => files_scanned += 1,
            ScanStatus::Binary => files_binary += 1,
            ScanStatus::TimedOut => {
                for &index in &scan.in_scope {
                    tallies[index].timed_out.push(scan.file.clone());
                }
            }
            ScanStatus::ReadFailed(reason) => {
                for &index in &scan.in_scope {
                    tallies[index]
                        .read_failed
                        .get_or_insert_with(|| (scan.file.clone(), reason.clone()));
                }
            }
            ScanStatus::Cancelled => {
                for &index in &scan.in_scope {
                    tallies[index].cancelled = true;
                }
            }
        }
        for (index, locations) in scan.hits {
            tallies[index].found.extend(locations);
        }
        for index in scan.applied {
            tallies[index].applied = true;
        }
    }

    Located {
        resolutions: tallies.into_iter().map(Tally::into_resolution).collect(),
        files_scanned,
        files_binary,
    }
}
