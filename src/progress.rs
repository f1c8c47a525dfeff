//! Progress display for patch runs

use std::time::Duration;

use console::Term;
use indicatif::{ProgressBar, ProgressStyle};

/// Pipeline stages shown to the user
const STAGES: u64 = 4;

/// Stage progress on stderr
pub struct ProgressDisplay {
    /// One step per pipeline stage
    stage_pb: ProgressBar,
}

impl ProgressDisplay {
    /// Create a progress display; hidden when disabled or stderr is not a terminal
    pub fn new(enabled: bool) -> Self {
        if !enabled || !Term::stderr().is_term() {
            return Self::hidden();
        }

        let stage_pb = ProgressBar::new(STAGES);
        if let Ok(style) = ProgressStyle::default_bar().template("{spinner:.cyan} [{bar:20.cyan/blue}] {pos}/{len} {msg}") {
            stage_pb.set_style(style.progress_chars("#>-"));
        }
        stage_pb.enable_steady_tick(Duration::from_millis(120));
        Self { stage_pb }
    }

    /// A display that draws nothing
    pub fn hidden() -> Self {
        Self {
            stage_pb: ProgressBar::hidden(),
        }
    }

    /// Update to show the stage now running
    pub fn stage(&self, name: &str) {
        self.stage_pb.set_message(name.to_string());
    }

    /// Mark the current stage done
    pub fn inc_stage(&self) {
        self.stage_pb.inc(1);
    }

    /// Clear the bar once the run is done
    pub fn finish(&self) {
        self.stage_pb.finish_and_clear();
    }

    /// Abandon on error
    pub fn abandon(&self) {
        self.stage_pb.abandon();
    }
}
