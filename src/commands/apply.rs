//! Apply command implementation
//!
//! Patches the tree (in place or in a copy), prints the conflict report and
//! records provenance. A blocking run still writes its report and record,
//! then exits with status 2.

use std::path::Path;

use console::Style;

use crate::cli::ApplyArgs;
use crate::commands::helpers::{engine_config, ensure_not_blocking, print_report};
use crate::error::Result;
use crate::pipeline::{PatchPipeline, RunRequest};
use crate::progress::ProgressDisplay;

/// Run apply command
pub fn run(config_path: Option<&Path>, args: ApplyArgs, quiet: bool) -> Result<()> {
    let tree_root = match &args.out {
        Some(out) if !args.dry_run => out.clone(),
        _ => args.engine.root.clone(),
    };
    let overrides = args.engine.overrides(args.output_dir.clone());
    let config = engine_config(config_path, &args.engine, &tree_root, &overrides)?;

    let pipeline = PatchPipeline::new(config)
        .with_progress(ProgressDisplay::new(!quiet && !args.engine.json));
    let summary = pipeline.run(&RunRequest {
        rules_path: args.engine.rules.clone(),
        root: args.engine.root.clone(),
        out: args.out.clone(),
        commit: args.engine.commit.clone(),
        backend_id: args.backend.clone(),
        dry_run: args.dry_run,
    })?;

    print_report(&summary.report, args.engine.json, quiet)?;
    if !quiet && !args.engine.json {
        let dim = Style::new().dim();
        if let Some(path) = &summary.report_path {
            println!("{} {}", dim.apply_to("Report:"), path.display());
        }
        if let Some(path) = &summary.provenance_path {
            println!("{} {}", dim.apply_to("Provenance:"), path.display());
        }
    }

    ensure_not_blocking(&summary.report)
}
