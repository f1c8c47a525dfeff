//! Rule sets: validated, indexed localization substitution rules
//!
//! A rule set is loaded from a mapping document (see [`loader`]) and is
//! immutable afterwards. Rules keep document order; lookups by key go through
//! an index built at load time.

pub mod lint;
pub mod loader;
pub mod scope;
pub mod serialization;

use std::collections::HashMap;

pub use loader::{DocumentFormat, LoadOptions, load, parse};
pub use scope::{Scope, ScopeMatcher};

/// One original-text to localized-text substitution directive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    /// Unique identifier within the rule set
    pub key: String,
    /// Exact upstream text to find
    pub match_text: String,
    /// Localized text written in place of `match_text` (may be empty)
    pub replacement: String,
    /// Restricts the files the rule may touch
    pub scope: Option<Scope>,
    /// Whether failing to apply this rule blocks publishing
    pub mandatory: bool,
}

impl Rule {
    /// Check whether this rule may target the given tree-relative path
    pub fn applies_to(&self, relative_path: &str) -> bool {
        match &self.scope {
            None => true,
            Some(scope) => scope.matches(relative_path),
        }
    }
}

/// Ordered, versioned collection of rules with unique keys
#[derive(Debug, Clone)]
pub struct RuleSet {
    version: String,
    rules: Vec<Rule>,
    index: HashMap<String, usize>,
    untranslated: usize,
}

impl RuleSet {
    /// Build a rule set from already validated rules
    ///
    /// Callers go through [`loader::parse`], which enforces key uniqueness.
    pub(crate) fn from_rules(version: String, rules: Vec<Rule>, untranslated: usize) -> Self {
        let index = rules
            .iter()
            .enumerate()
            .map(|(idx, rule)| (rule.key.clone(), idx))
            .collect();
        Self {
            version,
            rules,
            index,
            untranslated,
        }
    }

    /// Rule set version (content hash unless the document declares one)
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Rules in document order
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Look up a rule by key
    pub fn get(&self, key: &str) -> Option<&Rule> {
        self.index.get(key).map(|&idx| &self.rules[idx])
    }

    /// Rules whose scope admits the given tree-relative path
    pub fn rules_for_path<'a>(&'a self, relative_path: &'a str) -> impl Iterator<Item = &'a Rule> {
        self.rules
            .iter()
            .filter(move |rule| rule.applies_to(relative_path))
    }

    /// Number of file-group entries dropped at load because they had no translation
    pub fn untranslated(&self) -> usize {
        self.untranslated
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
