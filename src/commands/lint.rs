//! Lint command implementation
//!
//! Findings are advisory: the command fails only when the rule set itself
//! cannot be loaded.

use console::Style;

use crate::cli::LintArgs;
use crate::error::{Result, config as config_err, fs as fs_err};
use crate::ruleset::lint::{LintFinding, lint, lint_rule};
use crate::ruleset::{self, LoadOptions, RuleSet};

/// Run lint command
pub fn run(args: LintArgs, quiet: bool) -> Result<()> {
    let rules = ruleset::load(&args.rules, LoadOptions::default())?;
    let (findings, linted) = select_and_lint(&rules, &args)?;

    if args.json {
        let text = serde_json::to_string_pretty(&findings)
            .map_err(|e| fs_err::io_error(format!("Failed to serialize lint findings: {e}")))?;
        println!("{text}");
        return Ok(());
    }

    if !quiet {
        for finding in &findings {
            println!("{}", finding_line(finding));
        }
    }
    println!(
        "{} {} finding(s) in {} rule(s)",
        Style::new().bold().apply_to("Lint:"),
        findings.len(),
        linted
    );
    Ok(())
}

/// Findings for the rules selected by `--key` or `--path`, and how many rules were linted
fn select_and_lint(rules: &RuleSet, args: &LintArgs) -> Result<(Vec<LintFinding>, usize)> {
    if let Some(key) = &args.key {
        let rule = rules
            .get(key)
            .ok_or_else(|| config_err::invalid(format!("Unknown rule key: {key}")))?;
        return Ok((lint_rule(rule), 1));
    }
    if let Some(path) = &args.path {
        let selected: Vec<_> = rules.rules_for_path(path).collect();
        let findings = selected.iter().flat_map(|rule| lint_rule(rule)).collect();
        return Ok((findings, selected.len()));
    }
    Ok((lint(rules), rules.len()))
}

fn finding_line(finding: &LintFinding) -> String {
    format!(
        "{} {}: {}",
        Style::new().yellow().apply_to("warning"),
        Style::new().bold().apply_to(&finding.key),
        finding.message
    )
}
