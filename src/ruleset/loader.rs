//! Rule set loader
//!
//! Accepts a JSON or YAML mapping whose entries are either keyed rules:
//!
//! ```yaml
//! greet:
//!   match: Hello
//!   replacement: 你好
//!   scope: "crates/*/src/**/*.rs"   # optional glob
//!   mandatory: false                 # optional, defaults to LoadOptions
//! ```
//!
//! or file groups in the upstream l10n map format, one map per file path:
//!
//! ```yaml
//! crates/zed/src/main.rs:
//!   "Open File": "打开文件"
//!   "Close": ""            # untranslated, dropped
//! ```
//!
//! A top-level `version` string overrides the content-hash version.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use tracing::debug;

use super::serialization::RawValue;
use super::{Rule, RuleSet, Scope};
use crate::error::{Result, fs as fs_err, ruleset as err};
use crate::hash;

/// Reserved top-level key carrying an explicit rule set version
pub const VERSION_KEY: &str = "version";

/// Serialized form of a rule set document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Yaml,
}

impl DocumentFormat {
    /// Pick a format from the file extension (`.json` is JSON, everything else YAML)
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => DocumentFormat::Json,
            _ => DocumentFormat::Yaml,
        }
    }
}

/// Options applied while turning document entries into rules
#[derive(Debug, Clone, Copy)]
pub struct LoadOptions {
    /// `mandatory` value for rules that do not set it
    pub default_mandatory: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            default_mandatory: true,
        }
    }
}

/// Read and parse a rule set document from disk
pub fn load(path: &Path, options: LoadOptions) -> Result<RuleSet> {
    if !path.is_file() {
        return Err(fs_err::not_found(path));
    }
    let text = fs::read_to_string(path).map_err(|e| fs_err::read_failed(path, e))?;
    parse_named(
        &text,
        DocumentFormat::from_path(path),
        options,
        &path.display().to_string(),
    )
}

/// Parse a rule set document
pub fn parse(text: &str, format: DocumentFormat, options: LoadOptions) -> Result<RuleSet> {
    parse_named(text, format, options, "<input>")
}

fn parse_named(
    text: &str,
    format: DocumentFormat,
    options: LoadOptions,
    origin: &str,
) -> Result<RuleSet> {
    let document: RawValue = match format {
        DocumentFormat::Json => {
            serde_json::from_str(text).map_err(|e| err::malformed(origin, e.to_string()))?
        }
        DocumentFormat::Yaml => {
            serde_yaml::from_str(text).map_err(|e| err::malformed(origin, e.to_string()))?
        }
    };

    let RawValue::Map(entries) = document else {
        return Err(err::malformed(
            origin,
            format!("document root must be a mapping, found {}", document.kind()),
        ));
    };

    let mut builder = Builder::new(origin, options);
    for (key, value) in entries {
        builder.entry(key, value)?;
    }

    let version = builder
        .version
        .take()
        .unwrap_or_else(|| hash::hash_bytes(text.as_bytes()));

    debug!(
        event = "ruleset_loaded",
        origin = origin,
        rules = builder.rules.len(),
        untranslated = builder.untranslated,
        version = %version
    );

    Ok(RuleSet::from_rules(
        version,
        builder.rules,
        builder.untranslated,
    ))
}

/// Fields of a keyed rule
const RULE_FIELDS: &[&str] = &["match", "replacement", "scope", "mandatory"];

/// A mapping is a keyed rule when it has a `replacement` and either a `match`
/// or nothing but rule fields; anything else is a file group, whose originals
/// may themselves be words like `match`
fn is_keyed_rule(value: &RawValue) -> bool {
    let RawValue::Map(fields) = value else {
        return false;
    };
    value.field("replacement").is_some()
        && (value.field("match").is_some()
            || fields.iter().all(|(field, _)| RULE_FIELDS.contains(&field.as_str())))
}

/// Accumulates validated rules while walking the document
struct Builder<'a> {
    origin: &'a str,
    options: LoadOptions,
    rules: Vec<Rule>,
    keys: HashSet<String>,
    untranslated: usize,
    version: Option<String>,
}

impl<'a> Builder<'a> {
    fn new(origin: &'a str, options: LoadOptions) -> Self {
        Self {
            origin,
            options,
            rules: Vec::new(),
            keys: HashSet::new(),
            untranslated: 0,
            version: None,
        }
    }

    fn entry(&mut self, key: String, value: RawValue) -> Result<()> {
        if key == VERSION_KEY {
            return match value {
                RawValue::Text(version) if !version.trim().is_empty() => {
                    if self.version.replace(version).is_some() {
                        return Err(err::duplicate_key(VERSION_KEY));
                    }
                    Ok(())
                }
                other => Err(err::malformed(
                    self.origin,
                    format!("'{VERSION_KEY}' must be a non-empty string, found {}", other.kind()),
                )),
            };
        }

        match value {
            RawValue::Map(_) if is_keyed_rule(&value) => self.keyed_rule(key, &value),
            RawValue::Map(entries) => self.file_group(&key, entries),
            other => Err(err::malformed(
                self.origin,
                format!(
                    "entry '{key}' must be a rule or a file group mapping, found {}",
                    other.kind()
                ),
            )),
        }
    }

    fn keyed_rule(&mut self, key: String, value: &RawValue) -> Result<()> {
        let RawValue::Map(fields) = value else {
            return Err(err::malformed(self.origin, format!("rule '{key}' must be a mapping")));
        };

        let mut match_text = None;
        let mut replacement = None;
        let mut scope = None;
        let mut mandatory = None;

        for (field, field_value) in fields {
            match field.as_str() {
                "match" => match_text = Some(self.text_field(&key, field, field_value)?),
                "replacement" => replacement = Some(self.text_field(&key, field, field_value)?),
                "scope" => {
                    scope = match field_value {
                        RawValue::Null => None,
                        _ => Some(Scope::Glob(self.text_field(&key, field, field_value)?)),
                    }
                }
                "mandatory" => {
                    mandatory = match field_value {
                        RawValue::Null => None,
                        RawValue::Bool(b) => Some(*b),
                        other => {
                            return Err(err::malformed(
                                self.origin,
                                format!(
                                    "rule '{key}': 'mandatory' must be a boolean, found {}",
                                    other.kind()
                                ),
                            ));
                        }
                    }
                }
                unknown => {
                    return Err(err::malformed(
                        self.origin,
                        format!("rule '{key}': unknown field '{unknown}'"),
                    ));
                }
            }
        }

        let Some(match_text) = match_text else {
            return Err(err::malformed(self.origin, format!("rule '{key}': missing 'match'")));
        };
        let Some(replacement) = replacement else {
            return Err(err::malformed(
                self.origin,
                format!("rule '{key}': missing 'replacement'"),
            ));
        };

        self.push(Rule {
            key,
            match_text,
            replacement,
            scope,
            mandatory: mandatory.unwrap_or(self.options.default_mandatory),
        })
    }

    fn file_group(&mut self, path: &str, entries: Vec<(String, RawValue)>) -> Result<()> {
        let path = path.replace('\\', "/");
        for (original, translated) in entries {
            let translated = match translated {
                RawValue::Null => None,
                RawValue::Text(text) if text.is_empty() => None,
                RawValue::Text(text) => Some(text),
                other => {
                    return Err(err::malformed(
                        self.origin,
                        format!(
                            "file group '{path}': translation of '{original}' must be a string, found {}",
                            other.kind()
                        ),
                    ));
                }
            };

            let Some(replacement) = translated else {
                self.untranslated += 1;
                continue;
            };

            self.push(Rule {
                key: format!("{path}#{original}"),
                match_text: original,
                replacement,
                scope: Some(Scope::File(path.clone())),
                mandatory: self.options.default_mandatory,
            })?;
        }
        Ok(())
    }

    fn text_field(&self, key: &str, field: &str, value: &RawValue) -> Result<String> {
        match value {
            RawValue::Text(text) => Ok(text.clone()),
            other => Err(err::malformed(
                self.origin,
                format!("rule '{key}': '{field}' must be a string, found {}", other.kind()),
            )),
        }
    }

    fn push(&mut self, rule: Rule) -> Result<()> {
        if rule.match_text.is_empty() {
            return Err(err::empty_match(rule.key));
        }
        if rule.match_text == rule.replacement {
            return Err(err::no_op(rule.key));
        }
        if let Some(scope) = &rule.scope {
            scope
                .validate()
                .map_err(|reason| err::invalid_scope(&rule.key, scope.as_str(), reason))?;
        }
        if !self.keys.insert(rule.key.clone()) {
            return Err(err::duplicate_key(rule.key));
        }
        self.rules.push(rule);
        Ok(())
    }
}
