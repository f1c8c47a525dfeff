//! File system errors

use std::path::Path;
use std::time::Duration;

use super::PatchError;

/// Creates a file not found error
pub fn not_found(path: &Path) -> PatchError {
    PatchError::FileNotFound {
        path: path.display().to_string(),
    }
}

/// Creates a file read failed error
pub fn read_failed(path: &Path, reason: impl ToString) -> PatchError {
    PatchError::FileReadFailed {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}

/// Creates a file write failed error
pub fn write_failed(path: &Path, reason: impl ToString) -> PatchError {
    PatchError::FileWriteFailed {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}

/// Creates an I/O timeout error
pub fn timeout(path: &Path, timeout: Duration) -> PatchError {
    PatchError::IoTimeout {
        path: path.display().to_string(),
        timeout_ms: timeout.as_millis(),
    }
}

/// Creates an IO error
pub fn io_error(message: impl Into<String>) -> PatchError {
    PatchError::IoError {
        message: message.into(),
    }
}
