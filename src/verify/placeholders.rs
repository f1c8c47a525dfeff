//! Format placeholder extraction
//!
//! Recognizes `{}`, `{name}`, `{0:>8}`, `${var}`, `%s`, `%1$d`. Escaped
//! braces (`{{`, `}}`) are literal text and never counted.

#![allow(clippy::expect_used)]

use std::sync::LazyLock;

use regex::Regex;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\{\{|\}\})|(\$\{[^}]+\}|\{[^{}]*\}|%\d*\$?[a-zA-Z])")
        .expect("static placeholder regex")
});

/// Placeholders in `text` as a sorted multiset
pub fn extract(text: &str) -> Vec<String> {
    let mut found: Vec<String> = PLACEHOLDER
        .captures_iter(text)
        .filter_map(|caps| caps.get(2))
        .map(|m| m.as_str().to_string())
        .collect();
    found.sort();
    found
}
