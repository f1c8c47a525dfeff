//! Tests for per-file transactions

use super::*;
use crate::error::PatchError;
use tempfile::TempDir;

/// Writes half the content straight into the target, then fails
#[derive(Debug)]
struct TornStage;

impl Stage for TornStage {
    fn write(&self, target: &Path, contents: &[u8]) -> io::Result<NamedTempFile> {
        fs::write(target, &contents[..contents.len() / 2])?;
        Err(io::Error::other("disk full"))
    }

    fn persist(&self, _staged: NamedTempFile, _target: &Path) -> io::Result<()> {
        unreachable!("write always fails")
    }
}

/// Stages normally but refuses the rename
#[derive(Debug)]
struct NoRenameStage;

impl Stage for NoRenameStage {
    fn write(&self, target: &Path, contents: &[u8]) -> io::Result<NamedTempFile> {
        TempStage.write(target, contents)
    }

    fn persist(&self, _staged: NamedTempFile, _target: &Path) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::PermissionDenied, "rename refused"))
    }
}

#[derive(Debug)]
struct SlowStage;

impl Stage for SlowStage {
    fn write(&self, target: &Path, contents: &[u8]) -> io::Result<NamedTempFile> {
        std::thread::sleep(Duration::from_millis(300));
        TempStage.write(target, contents)
    }

    fn persist(&self, staged: NamedTempFile, target: &Path) -> io::Result<()> {
        TempStage.persist(staged, target)
    }
}

fn create_test_file(content: &str) -> (TempDir, PathBuf) {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("main.rs");
    fs::write(&path, content).unwrap();
    (temp, path)
}

fn entries(dir: &Path) -> usize {
    fs::read_dir(dir).unwrap().count()
}

#[test]
fn test_transaction_commit() {
    let (temp, path) = create_test_file("Hello, world");
    let stage: Arc<dyn Stage> = Arc::new(TempStage);

    let mut transaction = FileTransaction::new(&path, b"Hello, world".to_vec());
    transaction
        .write(&stage, "你好, world".as_bytes().to_vec(), None)
        .unwrap();
    transaction.commit();

    assert_eq!(fs::read_to_string(&path).unwrap(), "你好, world");
    // No temp files left behind
    assert_eq!(entries(temp.path()), 1);
}

#[test]
fn test_transaction_rollback_torn_write() {
    let (_temp, path) = create_test_file("Hello, world");
    let stage: Arc<dyn Stage> = Arc::new(TornStage);

    {
        let mut transaction = FileTransaction::new(&path, b"Hello, world".to_vec());
        let result = transaction.write(&stage, "你好, world".as_bytes().to_vec(), None);
        assert!(matches!(result, Err(PatchError::FileWriteFailed { .. })));
        // Don't commit - should rollback on drop
    }

    assert_eq!(fs::read_to_string(&path).unwrap(), "Hello, world");
}

#[test]
fn test_dropped_transaction_always_restores() {
    let (_temp, path) = create_test_file("Hello, world");

    {
        let _transaction = FileTransaction::new(&path, b"Hello, world".to_vec());
        fs::write(&path, "overwritten elsewhere").unwrap();
    }

    assert_eq!(fs::read_to_string(&path).unwrap(), "Hello, world");
}

#[test]
fn test_failed_rename_leaves_target_and_no_temp_file() {
    let (temp, path) = create_test_file("Hello, world");
    let stage: Arc<dyn Stage> = Arc::new(NoRenameStage);

    {
        let mut transaction = FileTransaction::new(&path, b"Hello, world".to_vec());
        assert!(transaction.write(&stage, b"changed".to_vec(), None).is_err());
    }

    assert_eq!(fs::read_to_string(&path).unwrap(), "Hello, world");
    assert_eq!(entries(temp.path()), 1);
}

#[test]
fn test_staging_timeout() {
    let (temp, path) = create_test_file("Hello, world");
    let stage: Arc<dyn Stage> = Arc::new(SlowStage);

    {
        let mut transaction = FileTransaction::new(&path, b"Hello, world".to_vec());
        let result = transaction.write(&stage, b"changed".to_vec(), Some(Duration::from_millis(20)));
        assert!(matches!(result, Err(PatchError::IoTimeout { .. })));
    }

    // The abandoned staging thread drops its temp file without renaming it.
    std::thread::sleep(Duration::from_millis(600));
    assert_eq!(fs::read_to_string(&path).unwrap(), "Hello, world");
    assert_eq!(entries(temp.path()), 1);
}

#[test]
fn test_staged_file_keeps_permissions() {
    let (_temp, path) = create_test_file("Hello");
    let before = fs::metadata(&path).unwrap().permissions();
    let stage: Arc<dyn Stage> = Arc::new(TempStage);

    let mut transaction = FileTransaction::new(&path, b"Hello".to_vec());
    transaction.write(&stage, b"Hi".to_vec(), None).unwrap();
    transaction.commit();

    assert_eq!(fs::metadata(&path).unwrap().permissions(), before);
}

#[test]
fn test_rollback_noop_when_unchanged() {
    let (_temp, path) = create_test_file("Hello");
    let mut transaction = FileTransaction::new(&path, b"Hello".to_vec());
    transaction.rollback().unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), "Hello");
}
