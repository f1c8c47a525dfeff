//! Check command implementation
//!
//! A dry run: locate and classify without touching the tree, reports or
//! history. Exits with status 2 when applying would block.

use std::path::Path;

use crate::cli::CheckArgs;
use crate::commands::helpers::{engine_config, ensure_not_blocking, print_report};
use crate::error::Result;
use crate::pipeline::{PatchPipeline, RunRequest};
use crate::progress::ProgressDisplay;

/// Run check command
pub fn run(config_path: Option<&Path>, args: CheckArgs, quiet: bool) -> Result<()> {
    let overrides = args.engine.overrides(None);
    let config = engine_config(config_path, &args.engine, &args.engine.root, &overrides)?;

    let pipeline = PatchPipeline::new(config)
        .with_progress(ProgressDisplay::new(!quiet && !args.engine.json));
    let summary = pipeline.run(&RunRequest {
        rules_path: args.engine.rules.clone(),
        root: args.engine.root.clone(),
        out: None,
        commit: args.engine.commit.clone(),
        backend_id: String::new(),
        dry_run: true,
    })?;

    print_report(&summary.report, args.engine.json, quiet)?;
    ensure_not_blocking(&summary.report)
}
