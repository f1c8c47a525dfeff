//! Authoring lint for rule sets
//!
//! Flags rules whose match text is likely to be code rather than user-facing
//! text (identifiers, URLs, paths, format specs), and rules whose replacement
//! drops or invents format placeholders. Findings are advisory; the engine
//! still applies flagged rules.

#![allow(clippy::expect_used)]

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::{Rule, RuleSet};
use crate::verify::placeholders;

/// Match texts longer than this are rarely stable UI strings
pub const MAX_MATCH_CHARS: usize = 180;

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9_.:/\\-]+$").expect("static lint regex"));
static FILE_LIKE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\\/].+\.[A-Za-z0-9]{1,6}$").expect("static lint regex"));
static DEBUG_FORMAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[^}]*[:?!][^}]*\}").expect("static lint regex"));
static SINGLE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("static lint regex"));
static PUNCTUATION_ONLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\W+$").expect("static lint regex"));
static NUMBER_ONLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+(?:\.\d+)?$").expect("static lint regex"));

/// Category of a lint finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LintKind {
    Blank,
    TooLong,
    Url,
    FileLike,
    IdentifierLike,
    CodeToken,
    DebugFormat,
    PunctuationOrNumber,
    CamelCaseToken,
    PlaceholderMismatch,
}

impl fmt::Display for LintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LintKind::Blank => "blank match",
            LintKind::TooLong => "match too long",
            LintKind::Url => "url",
            LintKind::FileLike => "file path",
            LintKind::IdentifierLike => "identifier",
            LintKind::CodeToken => "code token",
            LintKind::DebugFormat => "debug format spec",
            LintKind::PunctuationOrNumber => "punctuation or number",
            LintKind::CamelCaseToken => "camel-case token",
            LintKind::PlaceholderMismatch => "placeholder mismatch",
        };
        f.write_str(label)
    }
}

/// One lint finding for one rule
#[derive(Debug, Clone, Serialize)]
pub struct LintFinding {
    pub key: String,
    pub kind: LintKind,
    pub message: String,
}

/// Lint every rule in the set, in rule order
pub fn lint(rules: &RuleSet) -> Vec<LintFinding> {
    rules.rules().iter().flat_map(lint_rule).collect()
}

/// Lint a single rule
pub fn lint_rule(rule: &Rule) -> Vec<LintFinding> {
    let mut findings = Vec::new();
    if let Some(kind) = risky_match(&rule.match_text) {
        findings.push(LintFinding {
            key: rule.key.clone(),
            kind,
            message: format!("match text {:?} looks like a {kind}", rule.match_text),
        });
    }

    let expected = placeholders::extract(&rule.match_text);
    let actual = placeholders::extract(&rule.replacement);
    if expected != actual {
        findings.push(LintFinding {
            key: rule.key.clone(),
            kind: LintKind::PlaceholderMismatch,
            message: format!(
                "placeholders {expected:?} in match but {actual:?} in replacement"
            ),
        });
    }
    findings
}

/// Classify match text that is risky to rewrite inside source code
pub fn risky_match(text: &str) -> Option<LintKind> {
    let t = text.trim();
    if t.is_empty() {
        return Some(LintKind::Blank);
    }
    if t.chars().count() > MAX_MATCH_CHARS {
        return Some(LintKind::TooLong);
    }
    if t.contains("://") || t.starts_with("mailto:") {
        return Some(LintKind::Url);
    }
    if PUNCTUATION_ONLY.is_match(t) || NUMBER_ONLY.is_match(t) {
        return Some(LintKind::PunctuationOrNumber);
    }
    if FILE_LIKE.is_match(t) {
        return Some(LintKind::FileLike);
    }
    if IDENTIFIER.is_match(t) {
        return Some(LintKind::IdentifierLike);
    }
    if ["::", "->", "=>"].iter().any(|token| t.contains(token)) {
        return Some(LintKind::CodeToken);
    }
    if DEBUG_FORMAT.is_match(t) {
        return Some(LintKind::DebugFormat);
    }
    // A capital after the first letter: `WorkspaceItem`, not `Cancel`.
    let has_lower = t.chars().any(|c| c.is_ascii_lowercase());
    let inner_upper = t.chars().skip(1).any(|c| c.is_ascii_uppercase());
    if SINGLE_TOKEN.is_match(t) && has_lower && inner_upper {
        return Some(LintKind::CamelCaseToken);
    }
    None
}
