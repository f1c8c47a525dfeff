//! Rule scopes: which files a rule is allowed to touch

use wax::{CandidatePath, Glob, Pattern};

/// File restriction attached to a rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Glob over tree-relative paths (e.g. `crates/*/src/**/*.rs`)
    Glob(String),
    /// Exactly one tree-relative path (file-group entries)
    File(String),
}

impl Scope {
    /// Check if this scope admits a tree-relative path
    ///
    /// Compiles the glob on every call; use [`ScopeMatcher`] when matching many paths.
    pub fn matches(&self, relative_path: &str) -> bool {
        match self {
            Scope::File(path) => path == relative_path,
            Scope::Glob(pattern) => match Glob::new(pattern) {
                Ok(glob) => glob.matched(&CandidatePath::from(relative_path)).is_some(),
                Err(_) => pattern == relative_path,
            },
        }
    }

    /// Validate the scope, returning the glob build error if any
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Scope::File(_) => Ok(()),
            Scope::Glob(pattern) => Glob::new(pattern).map(|_| ()).map_err(|e| e.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Scope::Glob(s) | Scope::File(s) => s,
        }
    }
}

/// Precompiled form of an optional scope, borrowed from its rule
pub enum ScopeMatcher<'a> {
    Any,
    File(&'a str),
    /// Compiled glob and its literal leading directories
    Glob(Glob<'a>, String),
}

impl<'a> ScopeMatcher<'a> {
    pub fn new(scope: Option<&'a Scope>) -> Self {
        match scope {
            None => ScopeMatcher::Any,
            Some(Scope::File(path)) => ScopeMatcher::File(path),
            // Scopes are validated at load time; an unparsable glob only
            // matches its literal text.
            Some(Scope::Glob(pattern)) => match Glob::new(pattern) {
                Ok(glob) => ScopeMatcher::Glob(glob, literal_prefix(pattern)),
                Err(_) => ScopeMatcher::File(pattern),
            },
        }
    }

    pub fn matches(&self, relative_path: &str) -> bool {
        match self {
            ScopeMatcher::Any => true,
            ScopeMatcher::File(path) => *path == relative_path,
            ScopeMatcher::Glob(glob, _) => glob.matched(&CandidatePath::from(relative_path)).is_some(),
        }
    }

    /// Whether some path below the tree-relative directory `dir` could match
    pub fn may_reach(&self, dir: &str) -> bool {
        match self {
            ScopeMatcher::Any => true,
            ScopeMatcher::File(path) => within(path, dir),
            ScopeMatcher::Glob(_, prefix) => within(dir, prefix) || within(prefix, dir),
        }
    }
}

/// `path` is `ancestor` or below it; the empty path is the root
fn within(path: &str, ancestor: &str) -> bool {
    ancestor.is_empty()
        || path == ancestor
        || path.strip_prefix(ancestor).is_some_and(|rest| rest.starts_with('/'))
}

/// Leading path components of a glob that contain no pattern syntax
fn literal_prefix(pattern: &str) -> String {
    const SYNTAX: &[char] = &['*', '?', '[', ']', '{', '}', '<', '>', '(', ')', '!', ':', '#', '$', '\\'];
    let components: Vec<&str> = pattern.split('/').collect();
    // The last component names files, not a directory to descend into.
    let dirs = &components[..components.len().saturating_sub(1)];
    dirs.iter()
        .take_while(|component| !component.is_empty() && !component.contains(SYNTAX))
        .copied()
        .collect::<Vec<_>>()
        .join("/")
}
