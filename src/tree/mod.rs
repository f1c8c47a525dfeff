//! Upstream source tree snapshots
//!
//! A [`SourceTree`] is an explicit value (root path + upstream commit id)
//! passed to every stage, so resolution and verification are functions of
//! the snapshot rather than of ambient state.

pub mod copy;
pub mod io;

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;
use wax::{CandidatePath, Glob, Pattern};

use crate::error::{PatchError, Result, config as config_err};

/// Directory names never scanned or patched
pub const DEFAULT_EXCLUDES: &[&str] = &[".git", ".hg", ".svn", "target", "node_modules", ".locpatch"];

/// Snapshot of the upstream codebase at a specific commit
#[derive(Debug, Clone)]
pub struct SourceTree {
    root: PathBuf,
    commit: String,
}

impl SourceTree {
    /// Open a snapshot rooted at an existing directory
    pub fn new(root: impl Into<PathBuf>, commit: impl Into<String>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(PatchError::TreeNotFound {
                path: root.display().to_string(),
            });
        }
        Ok(Self {
            root,
            commit: commit.into(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Upstream commit identifier supplied by the caller
    pub fn commit(&self) -> &str {
        &self.commit
    }

    /// Absolute path of a tree-relative path
    pub fn path_of(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// All regular files in the tree, plus the paths the walk could not enter
    pub fn files(&self, excludes: &Excludes) -> TreeListing {
        let root = self.root.as_path();
        let mut listing = TreeListing::default();
        let walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !excludes.is_excluded_name(entry.file_name()));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e
                        .path()
                        .and_then(|path| path.strip_prefix(root).ok())
                        .map(to_forward_slashes)
                        .unwrap_or_default();
                    if !excludes.is_excluded_path(&path) {
                        warn!(event = "tree_walk_failed", path = %path, error = %e);
                        listing.unreadable.push(Unreadable {
                            path,
                            reason: e.to_string(),
                        });
                    }
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(root) else {
                continue;
            };
            let relative = to_forward_slashes(relative);
            if !excludes.is_excluded_path(&relative) {
                listing.files.push(relative);
            }
        }

        // Byte-wise order, independent of the platform's directory listing.
        listing.files.sort();
        listing.unreadable.sort_by(|a, b| a.path.cmp(&b.path));
        debug!(
            event = "tree_walked",
            root = %root.display(),
            files = listing.files.len(),
            unreadable = listing.unreadable.len()
        );
        listing
    }
}

/// Result of walking a tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeListing {
    /// Sorted tree-relative forward-slash paths
    pub files: Vec<String>,
    /// Sorted by path
    pub unreadable: Vec<Unreadable>,
}

/// A file or directory the walk could not read; its contents are unknown
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unreadable {
    /// Tree-relative; empty for the root itself
    pub path: String,
    pub reason: String,
}

/// Convert a path to a forward-slash string
pub fn to_forward_slashes(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Paths skipped while walking a tree
pub struct Excludes {
    names: Vec<String>,
    globs: Vec<Glob<'static>>,
}

impl Excludes {
    /// Default directory names plus configured glob patterns
    pub fn new(patterns: &[String]) -> Result<Self> {
        let globs = patterns
            .iter()
            .map(|pattern| {
                Glob::new(pattern)
                    .map(Glob::into_owned)
                    .map_err(|e| config_err::invalid(format!("exclude pattern '{pattern}': {e}")))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            names: DEFAULT_EXCLUDES.iter().map(|s| (*s).to_string()).collect(),
            globs,
        })
    }

    fn is_excluded_name(&self, name: &std::ffi::OsStr) -> bool {
        let name = name.to_string_lossy();
        self.names.iter().any(|excluded| *excluded == name)
    }

    fn is_excluded_path(&self, relative: &str) -> bool {
        let candidate = CandidatePath::from(relative);
        self.globs
            .iter()
            .any(|glob| glob.matched(&candidate).is_some())
    }
}

impl Default for Excludes {
    fn default() -> Self {
        Self {
            names: DEFAULT_EXCLUDES.iter().map(|s| (*s).to_string()).collect(),
            globs: Vec::new(),
        }
    }
}
