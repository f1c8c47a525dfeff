//! Copying a snapshot to a fresh output root

use std::fs;
use std::path::{Path, PathBuf};

use normpath::PathExt;
use tracing::info;

use super::SourceTree;
use crate::config::DEFAULT_OUTPUT_DIR;
use crate::error::{Result, fs as fs_err};

/// Directories left behind when they sit directly under the tree root
const ROOT_ONLY_SKIPS: &[&str] = &[".git", ".hg", ".svn", DEFAULT_OUTPUT_DIR];

impl SourceTree {
    /// Copy this tree to `dest` and return a snapshot of the copy
    ///
    /// Version-control and tool directories at the root are left behind;
    /// everything below the root is copied as is. The copy keeps the upstream
    /// commit id, since its content is the same upstream state.
    pub fn copy_to(&self, dest: &Path) -> Result<SourceTree> {
        if dest.exists() && fs::read_dir(dest).map(|mut d| d.next().is_some()).unwrap_or(true) {
            return Err(fs_err::write_failed(dest, "output directory exists and is not empty"));
        }
        if resolve(dest).starts_with(resolve(self.root())) {
            return Err(fs_err::write_failed(
                dest,
                "output directory must not be inside the source tree",
            ));
        }

        copy_dir_recursive(self.root(), dest, true).map_err(|e| fs_err::write_failed(dest, e))?;
        info!(event = "tree_copied", from = %self.root().display(), to = %dest.display());
        SourceTree::new(dest, self.commit())
    }
}

/// Resolve `..` and symlinks; a path that does not exist yet is resolved
/// through its longest existing ancestor
fn resolve(path: &Path) -> PathBuf {
    if let Ok(normalized) = path.normalize() {
        return normalized.into_path_buf();
    }

    let mut current = path;
    let mut missing = Vec::new();
    while !current.as_os_str().is_empty() && !current.exists() {
        match (current.file_name(), current.parent()) {
            (Some(name), Some(parent)) => {
                missing.push(name);
                current = parent;
            }
            _ => return path.to_path_buf(),
        }
    }

    let existing = if current.as_os_str().is_empty() {
        Path::new(".")
    } else {
        current
    };
    let base = existing
        .normalize()
        .map(|normalized| normalized.into_path_buf())
        .unwrap_or_else(|_| existing.to_path_buf());
    missing.iter().rev().fold(base, |acc, name| acc.join(name))
}

/// Copy a directory recursively; root-level tool directories are skipped
fn copy_dir_recursive(src: &Path, dst: &Path, at_root: bool) -> std::io::Result<()> {
    if !dst.exists() {
        fs::create_dir_all(dst)?;
    }

    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let entry_path = entry.path();
        let file_name = entry.file_name();
        let file_type = entry.file_type()?;

        if at_root
            && file_type.is_dir()
            && ROOT_ONLY_SKIPS
                .iter()
                .any(|skipped| file_name.to_str() == Some(skipped))
        {
            continue;
        }

        let dst_path = dst.join(&file_name);

        if file_type.is_dir() {
            copy_dir_recursive(&entry_path, &dst_path, false)?;
        } else if file_type.is_file() {
            fs::copy(&entry_path, &dst_path)?;
        }
    }

    Ok(())
}
