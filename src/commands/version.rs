//! Version command implementation

use crate::config::{APPLIED_FILE_NAME, DEFAULT_OUTPUT_DIR, HISTORY_FILE_NAME};
use crate::error::Result;
use crate::provenance::TOOL_VERSION;

pub fn run() -> Result<()> {
    print!("{}", version_text());
    Ok(())
}

/// Tool version as recorded in provenance, plus where a run leaves its files
fn version_text() -> String {
    let profile = if cfg!(debug_assertions) { "debug" } else { "release" };
    format!(
        "locpatch {TOOL_VERSION}\n\
         \n\
         Rule sets: JSON or YAML, keyed rules and file groups\n\
         Run output: <tree>/{DEFAULT_OUTPUT_DIR}/ (report-<run>.json, {HISTORY_FILE_NAME}, {APPLIED_FILE_NAME})\n\
         Build: {profile}, rustc >= {}\n",
        env!("CARGO_PKG_RUST_VERSION")
    )
}
