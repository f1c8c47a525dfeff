//! Per-file write transactions
//!
//! Every patched file goes through a [`FileTransaction`]: the new content is
//! staged in a temp file next to the target and only renamed over it once the
//! whole batch for that file has been written. If the transaction is dropped
//! without being committed, the target is restored to its original bytes.
//!
//! ## Usage
//!
//! ```ignore
//! let mut transaction = FileTransaction::new(&path, original);
//! transaction.write(stage, patched, timeout)?;
//!
//! // On success:
//! transaction.commit();
//!
//! // On error (automatic via Drop if not committed):
//! // rollback happens automatically
//! ```

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{Result, fs as fs_err};
use crate::tree::io::{Access, with_timeout};

/// How new file content reaches disk
///
/// Split in two so the slow part (writing) can be abandoned on timeout while
/// the visible part (the rename) only ever happens on the calling thread.
pub trait Stage: Send + Sync + fmt::Debug {
    /// Write `contents` to a temp file in the target's directory
    fn write(&self, target: &Path, contents: &[u8]) -> io::Result<NamedTempFile>;

    /// Atomically replace `target` with the staged file
    fn persist(&self, staged: NamedTempFile, target: &Path) -> io::Result<()>;
}

/// Temp file plus rename in the same directory
#[derive(Debug, Default, Clone, Copy)]
pub struct TempStage;

impl Stage for TempStage {
    fn write(&self, target: &Path, contents: &[u8]) -> io::Result<NamedTempFile> {
        let dir = target.parent().unwrap_or_else(|| Path::new("."));
        let mut staged = NamedTempFile::new_in(dir)?;
        staged.write_all(contents)?;
        staged.as_file().sync_all()?;
        if let Ok(metadata) = fs::metadata(target) {
            fs::set_permissions(staged.path(), metadata.permissions())?;
        }
        Ok(staged)
    }

    fn persist(&self, staged: NamedTempFile, target: &Path) -> io::Result<()> {
        staged.persist(target).map(|_| ()).map_err(|e| e.error)
    }
}

/// Staged rewrite of a single file
#[derive(Debug)]
pub struct FileTransaction {
    /// File being rewritten
    path: PathBuf,

    /// Content before this transaction
    original: Vec<u8>,

    /// Whether the transaction has been committed
    committed: bool,
}

impl FileTransaction {
    pub fn new(path: impl Into<PathBuf>, original: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            original,
            committed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stage `contents` and rename it over the target
    ///
    /// The staging write is bounded by `timeout`; the rename is not, since it
    /// is the commit point and must either happen or not on this thread.
    pub fn write(
        &mut self,
        stage: &Arc<dyn Stage>,
        contents: Vec<u8>,
        timeout: Option<Duration>,
    ) -> Result<()> {
        let target = self.path.clone();
        let writer = Arc::clone(stage);
        let staged = with_timeout(&self.path, Access::Write, timeout, move || {
            writer.write(&target, &contents)
        })?;

        stage
            .persist(staged, &self.path)
            .map_err(|e| fs_err::write_failed(&self.path, e))?;
        debug!(event = "file_persisted", file = %self.path.display());
        Ok(())
    }

    /// Commit the transaction (prevent rollback)
    pub fn commit(mut self) {
        self.committed = true;
    }

    /// Restore the original content if the target no longer has it
    pub fn rollback(&mut self) -> Result<()> {
        if self.committed {
            return Ok(());
        }

        let current = fs::read(&self.path).ok();
        if current.as_deref() == Some(self.original.as_slice()) {
            return Ok(());
        }

        fs::write(&self.path, &self.original).map_err(|e| fs_err::write_failed(&self.path, e))?;
        warn!(event = "file_rolled_back", file = %self.path.display());
        Ok(())
    }
}

impl Drop for FileTransaction {
    fn drop(&mut self) {
        if !self.committed {
            if let Err(e) = self.rollback() {
                warn!(event = "rollback_failed", file = %self.path.display(), error = %e);
            }
        }
    }
}

#[cfg(test)]
mod tests;
