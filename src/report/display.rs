//! Terminal rendering of conflict reports

use std::fmt::Write;

use console::Style;

use super::{Classification, ConflictReport};
use crate::applier::{Outcome, RuleOutcome};

/// Plain one-line form of a rule outcome: `greet: Ambiguous(2 locations)`
pub fn outcome_line(outcome: &RuleOutcome) -> String {
    let mut line = format!("{}: {}", outcome.key, outcome.outcome);
    if outcome.mandatory && !outcome.outcome.is_satisfied() {
        line.push_str(" [mandatory]");
    }
    line
}

fn outcome_style(outcome: &Outcome) -> Style {
    match outcome {
        Outcome::Applied { .. } => Style::new().green(),
        _ if outcome.is_satisfied() => Style::new().dim(),
        Outcome::Skipped { .. } => Style::new().yellow(),
        Outcome::Ambiguous { .. } => Style::new().red(),
    }
}

fn classification_style(classification: Classification) -> Style {
    match classification {
        Classification::Clean => Style::new().bold().green(),
        Classification::Degraded => Style::new().bold().yellow(),
        Classification::Blocking => Style::new().bold().red(),
    }
}

/// Full report: one line per rule, ambiguous locations, verification
/// failures, then the summary
pub fn render(report: &ConflictReport) -> String {
    let mut out = String::new();

    let _ = writeln!(
        out,
        "{} {} {}",
        Style::new().bold().apply_to("Upstream:"),
        report.upstream_commit,
        Style::new().dim().apply_to(format!("(rules {})", report.ruleset_version))
    );
    if report.dry_run {
        let _ = writeln!(out, "{}", Style::new().cyan().apply_to("Dry run: no files written"));
    }

    for outcome in &report.outcomes {
        let _ = writeln!(
            out,
            "  {}",
            outcome_style(&outcome.outcome).apply_to(outcome_line(outcome))
        );
        if let Outcome::Ambiguous { locations } = &outcome.outcome {
            for location in locations {
                let _ = writeln!(out, "      {}", Style::new().dim().apply_to(location));
            }
        }
    }

    if !report.verification_failures.is_empty() {
        let _ = writeln!(out, "{}", Style::new().bold().apply_to("Verification failures:"));
        for failure in &report.verification_failures {
            let _ = writeln!(
                out,
                "  {}: {}",
                Style::new().red().apply_to(&failure.file),
                failure.reason
            );
        }
    }

    let stats = &report.stats;
    let _ = writeln!(
        out,
        "{} {} applied, {} already applied, {} skipped, {} ambiguous of {} rules",
        Style::new().bold().apply_to("Summary:"),
        stats.applied,
        stats.already_applied,
        stats.skipped,
        stats.ambiguous,
        stats.rules
    );
    let _ = writeln!(
        out,
        "         {} files scanned, {} binary skipped, {} touched, {} untranslated entries",
        stats.files_scanned, stats.files_binary, stats.files_touched, stats.untranslated
    );
    let _ = writeln!(
        out,
        "{} {}",
        Style::new().bold().apply_to("Result:"),
        classification_style(report.classification).apply_to(report.classification)
    );
    out
}
