//! Patch pipeline orchestration
//!
//! Loader → Locator → Applier → {Drift classification, Verification} →
//! Provenance. One pipeline per invocation; every stage receives the tree
//! snapshot and the rule set explicitly.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::applier::{self, ApplyOptions, ApplyResult};
use crate::config::EngineConfig;
use crate::error::{Result, fs as fs_err};
use crate::hash::{hash_bytes, hash_tree_files};
use crate::locator::{self, Located, LocatorOptions};
use crate::progress::ProgressDisplay;
use crate::provenance::ledger::AppliedLedger;
use crate::provenance::{ProvenanceRecord, ProvenanceRecorder};
use crate::report::{ConflictReport, Stats};
use crate::ruleset::{self, LoadOptions, RuleSet};
use crate::transaction::{Stage, TempStage};
use crate::tree::{Excludes, SourceTree};
use crate::verify;
use crate::workers::CancelToken;

/// What to patch, and with what
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Rule set document (JSON or YAML)
    pub rules_path: PathBuf,
    /// Upstream tree root
    pub root: PathBuf,
    /// Copy the tree here and patch the copy instead
    pub out: Option<PathBuf>,
    /// Upstream commit identifier
    pub commit: String,
    /// Build backend / target identifier recorded in provenance
    pub backend_id: String,
    /// Resolve and classify without writing anything
    pub dry_run: bool,
}

/// Everything a finished run produced
#[derive(Debug)]
pub struct RunSummary {
    pub report: ConflictReport,
    /// Root of the tree that was (or would have been) patched
    pub tree_root: PathBuf,
    pub report_path: Option<PathBuf>,
    pub provenance_path: Option<PathBuf>,
    pub record: Option<ProvenanceRecord>,
}

/// Orchestrates one patch run
pub struct PatchPipeline {
    config: EngineConfig,
    cancel: CancelToken,
    stage: Arc<dyn Stage>,
    progress: ProgressDisplay,
}

impl PatchPipeline {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            cancel: CancelToken::new(),
            stage: Arc::new(TempStage),
            progress: ProgressDisplay::hidden(),
        }
    }

    /// Use an externally owned cancellation token
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Replace how patched files are staged and persisted
    pub fn with_stage(mut self, stage: Arc<dyn Stage>) -> Self {
        self.stage = stage;
        self
    }

    pub fn with_progress(mut self, progress: ProgressDisplay) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run every stage; per-rule problems end up in the report, not in `Err`
    pub fn run(&self, request: &RunRequest) -> Result<RunSummary> {
        let result = self.run_stages(request);
        match &result {
            Ok(_) => self.progress.finish(),
            Err(_) => self.progress.abandon(),
        }
        result
    }

    fn run_stages(&self, request: &RunRequest) -> Result<RunSummary> {
        self.progress.stage("Loading rules");
        let rules = ruleset::load(
            &request.rules_path,
            LoadOptions {
                default_mandatory: self.config.default_mandatory,
            },
        )?;
        if rules.is_empty() {
            warn!(event = "empty_ruleset", path = %request.rules_path.display());
        }
        let upstream = SourceTree::new(&request.root, &request.commit)?;
        let tree = match &request.out {
            Some(out) if !request.dry_run => upstream.copy_to(out)?,
            _ => upstream,
        };
        let excludes = self.excludes(&tree)?;
        let mut ledger = AppliedLedger::load(&self.config.applied_file);
        self.progress.inc_stage();

        self.progress.stage("Locating");
        let located = locator::locate(
            &tree,
            &rules,
            &excludes,
            &LocatorOptions {
                concurrency: self.config.concurrency,
                io_timeout: self.config.io_timeout,
                cancel: self.cancel.clone(),
                prior: ledger.clone(),
            },
        )?;
        self.progress.inc_stage();

        self.progress.stage(if request.dry_run { "Resolving" } else { "Applying" });
        let applied = applier::apply(
            &tree,
            &rules,
            &located,
            &ApplyOptions {
                concurrency: self.config.concurrency,
                io_timeout: self.config.io_timeout,
                dry_run: request.dry_run,
                cancel: self.cancel.clone(),
                stage: Arc::clone(&self.stage),
            },
        )?;
        self.progress.inc_stage();

        self.progress.stage("Verifying");
        let failures = verify::verify_touched(&tree, &rules, &applied.touched, self.config.io_timeout);
        self.progress.inc_stage();

        let files_touched: Vec<String> = applied.touched.iter().map(|t| t.file.clone()).collect();
        let stats = collect_stats(&rules, &located, &applied);
        let report = ConflictReport::new(
            tree.commit(),
            rules.version(),
            request.dry_run,
            applied.outcomes,
            failures,
            stats,
        );
        info!(
            event = "run_classified",
            classification = %report.classification,
            applied = report.stats.applied,
            ambiguous = report.stats.ambiguous,
            skipped = report.stats.skipped
        );

        if request.dry_run {
            return Ok(RunSummary {
                report,
                tree_root: tree.root().to_path_buf(),
                report_path: None,
                provenance_path: None,
                record: None,
            });
        }

        let tree_digest = hash_tree_files(tree.root(), &files_touched)?;
        let record = ProvenanceRecord::from_report(
            &report,
            &request.backend_id,
            files_touched,
            tree_digest,
            Utc::now(),
        );
        let run_id = record.run_id();
        let report_path = report.persist(&self.config.output_dir, &format!("report-{run_id}.json"))?;
        let provenance_path =
            ProvenanceRecorder::new(&self.config.output_dir, &self.config.history_file).persist(&record)?;

        let written = record
            .files_touched
            .iter()
            .map(|file| {
                let path = tree.path_of(file);
                let bytes = fs::read(&path).map_err(|e| fs_err::read_failed(&path, e))?;
                Ok((file.clone(), hash_bytes(&bytes)))
            })
            .collect::<Result<BTreeMap<_, _>>>()?;
        ledger.update(&report.outcomes, written);
        // A file that failed verification is not evidence of a good patch.
        ledger.forget_files(
            &report
                .verification_failures
                .iter()
                .map(|failure| failure.file.as_str())
                .collect(),
        );
        ledger.persist(&self.config.applied_file)?;

        Ok(RunSummary {
            report,
            tree_root: tree.root().to_path_buf(),
            report_path: Some(report_path),
            provenance_path: Some(provenance_path),
            record: Some(record),
        })
    }

    /// Configured excludes, plus the output directory when it lives inside the tree
    fn excludes(&self, tree: &SourceTree) -> Result<Excludes> {
        let mut patterns = self.config.exclude.clone();
        if let Ok(inside) = self.config.output_dir.strip_prefix(tree.root()) {
            let inside = crate::tree::to_forward_slashes(inside);
            if !inside.is_empty() {
                debug!(event = "output_dir_excluded", dir = %inside);
                patterns.push(format!("{inside}/**"));
            }
        }
        Excludes::new(&patterns)
    }
}

fn collect_stats(rules: &RuleSet, located: &Located, applied: &ApplyResult) -> Stats {
    Stats {
        files_scanned: located.files_scanned,
        files_binary: located.files_binary,
        files_touched: applied.touched.len(),
        untranslated: rules.untranslated(),
        ..Stats::from_outcomes(&applied.outcomes)
    }
}
