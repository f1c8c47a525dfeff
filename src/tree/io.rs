//! File I/O with caller-configured timeouts

use std::fs;
use std::io;
use std::path::Path;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use crate::error::{PatchError, Result, fs as fs_err};

/// Bytes inspected when deciding whether a file is binary
const BINARY_SNIFF_LEN: usize = 8192;

/// Direction of a timed operation, for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

impl Access {
    fn failed(self, path: &Path, reason: impl ToString) -> PatchError {
        match self {
            Access::Read => fs_err::read_failed(path, reason),
            Access::Write => fs_err::write_failed(path, reason),
        }
    }
}

/// Run a blocking I/O operation on a helper thread, giving up after `timeout`
///
/// On timeout the operation keeps running detached; whatever it produces is
/// dropped when its result can no longer be delivered. Operations must
/// therefore not have side effects that outlive their return value.
pub fn with_timeout<T, F>(path: &Path, access: Access, timeout: Option<Duration>, op: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> io::Result<T> + Send + 'static,
{
    let Some(timeout) = timeout else {
        return op().map_err(|e| access.failed(path, e));
    };

    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(op());
    });

    match rx.recv_timeout(timeout) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(access.failed(path, e)),
        Err(RecvTimeoutError::Timeout) => Err(fs_err::timeout(path, timeout)),
        Err(RecvTimeoutError::Disconnected) => {
            Err(access.failed(path, "I/O worker exited without a result"))
        }
    }
}

/// Read a whole file, bounded by `timeout`
pub fn read_with_timeout(path: &Path, timeout: Option<Duration>) -> Result<Vec<u8>> {
    let owned = path.to_path_buf();
    with_timeout(path, Access::Read, timeout, move || fs::read(owned))
}

/// Heuristic binary check: a NUL byte near the start of the file
pub fn looks_binary(bytes: &[u8]) -> bool {
    bytes[..bytes.len().min(BINARY_SNIFF_LEN)].contains(&0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_with_timeout() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.rs");
        std::fs::write(&path, "Hello").unwrap();

        let bytes = read_with_timeout(&path, Some(Duration::from_secs(5))).unwrap();
        assert_eq!(bytes, b"Hello");
        let bytes = read_with_timeout(&path, None).unwrap();
        assert_eq!(bytes, b"Hello");
    }

    #[test]
    fn test_read_missing_file() {
        let result = read_with_timeout(Path::new("/nonexistent/a.rs"), Some(Duration::from_secs(1)));
        assert!(matches!(result, Err(PatchError::FileReadFailed { .. })));
    }

    #[test]
    fn test_slow_operation_times_out() {
        let result: Result<()> = with_timeout(
            Path::new("slow.rs"),
            Access::Read,
            Some(Duration::from_millis(20)),
            || {
                thread::sleep(Duration::from_millis(500));
                Ok(())
            },
        );
        assert!(matches!(result, Err(PatchError::IoTimeout { .. })));
    }

    #[test]
    fn test_write_errors_reported_as_write_failures() {
        let result: Result<()> = with_timeout(Path::new("a.rs"), Access::Write, None, || {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"))
        });
        assert!(matches!(result, Err(PatchError::FileWriteFailed { .. })));
    }

    #[test]
    fn test_looks_binary() {
        assert!(looks_binary(b"\x89PNG\r\n\x1a\n\0\0\0"));
        assert!(!looks_binary("fn main() { println!(\"你好\"); }".as_bytes()));
        assert!(!looks_binary(b""));
    }
}
