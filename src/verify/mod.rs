//! Verification Pass
//!
//! Re-reads every touched file and compares it with its original bytes. A
//! patched file must keep its delimiter balance, gain no unterminated
//! literal, keep its line-ending style and encoding, and every applied rule
//! must carry the same format placeholders across and leave the lexical
//! context around its span as it was. Any failure blocks the run.

pub mod lexer;
pub mod placeholders;

use std::path::Path;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use crate::applier::TouchedFile;
use crate::error::PatchError;
use crate::ruleset::RuleSet;
use crate::tree::SourceTree;
use crate::tree::io::read_with_timeout;
use lexer::Dialect;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// A touched file that no longer satisfies one of the checks
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationFailure {
    pub file: String,
    pub reason: String,
}

impl From<VerificationFailure> for PatchError {
    fn from(failure: VerificationFailure) -> Self {
        PatchError::VerificationFailed {
            file: failure.file,
            reason: failure.reason,
        }
    }
}

/// Verify every touched file; previews are used for dry runs
pub fn verify_touched(
    tree: &SourceTree,
    rules: &RuleSet,
    touched: &[TouchedFile],
    io_timeout: Option<Duration>,
) -> Vec<VerificationFailure> {
    let mut failures = Vec::new();
    for file in touched {
        let patched = match &file.preview {
            Some(preview) => preview.clone(),
            None => match read_with_timeout(&tree.path_of(&file.file), io_timeout) {
                Ok(bytes) => bytes,
                Err(e) => {
                    failures.push(VerificationFailure {
                        file: file.file.clone(),
                        reason: format!("could not re-read patched file: {e}"),
                    });
                    continue;
                }
            },
        };
        failures.extend(verify_file(rules, file, &patched));
    }

    for failure in &failures {
        warn!(event = "verification_failed", file = %failure.file, reason = %failure.reason);
    }
    debug!(event = "verify_finished", files = touched.len(), failures = failures.len());
    failures
}

/// All checks for one file, in a fixed order
pub fn verify_file(rules: &RuleSet, touched: &TouchedFile, patched: &[u8]) -> Vec<VerificationFailure> {
    let original = touched.original.as_slice();
    let mut reasons = Vec::new();

    reasons.extend(check_encoding(original, patched));
    reasons.extend(check_line_endings(original, patched));

    let extension = Path::new(&touched.file)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    if let Some(dialect) = Dialect::for_extension(extension) {
        let before = lexer::summarize(original, dialect);
        let after = lexer::summarize(patched, dialect);
        reasons.extend(after.regressions_from(&before));
        reasons.extend(check_span_contexts(rules, touched, patched, dialect));
    }

    let all = rules.rules();
    for index in touched.rule_indices() {
        let rule = &all[index];
        let expected = placeholders::extract(&rule.match_text);
        let actual = placeholders::extract(&rule.replacement);
        if expected != actual {
            reasons.push(format!(
                "rule '{}' changes placeholders from {expected:?} to {actual:?}",
                rule.key
            ));
        }
    }

    reasons
        .into_iter()
        .map(|reason| VerificationFailure {
            file: touched.file.clone(),
            reason,
        })
        .collect()
}

/// Each applied span must sit in the same lexical context before and after
fn check_span_contexts(
    rules: &RuleSet,
    touched: &TouchedFile,
    patched: &[u8],
    dialect: Dialect,
) -> Vec<String> {
    let all = rules.rules();
    let mut original_ranges = Vec::with_capacity(touched.applied.len());
    let mut patched_ranges = Vec::with_capacity(touched.applied.len());
    let mut grown = 0usize;
    let mut shrunk = 0usize;
    for (index, location) in &touched.applied {
        let replacement_len = all[*index].replacement.len();
        let start = location.offset + grown - shrunk;
        original_ranges.push((location.offset, location.end()));
        patched_ranges.push((start, start + replacement_len));
        if replacement_len >= location.len {
            grown += replacement_len - location.len;
        } else {
            shrunk += location.len - replacement_len;
        }
    }

    let before = lexer::span_contexts(&touched.original, dialect, &original_ranges);
    let after = lexer::span_contexts(patched, dialect, &patched_ranges);
    touched
        .applied
        .iter()
        .zip(before.iter().zip(&after))
        .filter(|((index, _), (was, now))| {
            let deletion = all[*index].replacement.is_empty();
            was.after != now.after || (!deletion && was.boundaries != now.boundaries)
        })
        .map(|((index, location), _)| {
            format!("rule '{}' changes lexical context at {location}", all[*index].key)
        })
        .collect()
}

fn check_encoding(original: &[u8], patched: &[u8]) -> Option<String> {
    if original.starts_with(UTF8_BOM) != patched.starts_with(UTF8_BOM) {
        return Some("byte order mark added or removed".to_string());
    }
    if std::str::from_utf8(original).is_ok() && std::str::from_utf8(patched).is_err() {
        return Some("file is no longer valid UTF-8".to_string());
    }
    None
}

/// (CRLF count, bare LF count)
fn line_endings(bytes: &[u8]) -> (usize, usize) {
    let mut crlf = 0;
    let mut lf = 0;
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'\n' {
            if i > 0 && bytes[i - 1] == b'\r' {
                crlf += 1;
            } else {
                lf += 1;
            }
        }
    }
    (crlf, lf)
}

fn check_line_endings(original: &[u8], patched: &[u8]) -> Option<String> {
    let (crlf_before, lf_before) = line_endings(original);
    let (crlf_after, lf_after) = line_endings(patched);
    if crlf_before > 0 && lf_before == 0 && lf_after > 0 {
        return Some("bare LF introduced into a CRLF file".to_string());
    }
    if lf_before > 0 && crlf_before == 0 && crlf_after > 0 {
        return Some("CRLF introduced into an LF file".to_string());
    }
    None
}
