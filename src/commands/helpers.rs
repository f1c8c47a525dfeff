//! Command helper utilities

use std::path::Path;

use crate::cli::EngineArgs;
use crate::config::{EngineConfig, FileConfig, Overrides};
use crate::error::{PatchError, Result, fs as fs_err};
use crate::report::ConflictReport;
use crate::report::display::render;

/// Resolve engine settings for a run against `tree_root`
///
/// The config file is looked up in the upstream root even when the run
/// patches a copy elsewhere.
pub fn engine_config(
    config_path: Option<&Path>,
    args: &EngineArgs,
    tree_root: &Path,
    overrides: &Overrides,
) -> Result<EngineConfig> {
    let file = FileConfig::discover(&args.root, config_path)?;
    EngineConfig::resolve(tree_root, file.as_ref(), overrides)
}

/// Print the report on stdout, as text or JSON
///
/// In quiet mode only the final line of the text report is printed.
pub fn print_report(report: &ConflictReport, json: bool, quiet: bool) -> Result<()> {
    if json {
        let text = serde_json::to_string_pretty(report)
            .map_err(|e| fs_err::io_error(format!("Failed to serialize report: {e}")))?;
        println!("{text}");
        return Ok(());
    }
    let text = render(report);
    if quiet {
        if let Some(last) = text.lines().last() {
            println!("{last}");
        }
    } else {
        print!("{text}");
    }
    Ok(())
}

/// `Err(RunBlocked)` when the report is blocking
pub fn ensure_not_blocking(report: &ConflictReport) -> Result<()> {
    if !report.classification.is_blocking() {
        return Ok(());
    }
    let reasons = report.blocking_reasons();
    let reason = match reasons.as_slice() {
        [] => "run classified as blocking".to_string(),
        [only] => only.clone(),
        [first, rest @ ..] => format!("{first} (and {} more)", rest.len()),
    };
    Err(PatchError::RunBlocked { reason })
}
