//! Tests for the patch applier

use super::*;
use crate::hash::hash_bytes;
use crate::locator::{LocatorOptions, locate};
use crate::provenance::ledger::AppliedLedger;
use crate::ruleset::{DocumentFormat, LoadOptions, parse};
use crate::tree::Excludes;
use std::fs;
use std::io;
use std::path::Path;
use tempfile::{NamedTempFile, TempDir};

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn read(root: &Path, relative: &str) -> String {
    fs::read_to_string(root.join(relative)).unwrap()
}

fn rules(yaml: &str) -> RuleSet {
    parse(yaml, DocumentFormat::Yaml, LoadOptions::default()).unwrap()
}

fn locator_options(concurrency: usize) -> LocatorOptions {
    LocatorOptions {
        concurrency,
        io_timeout: None,
        cancel: CancelToken::new(),
        prior: AppliedLedger::default(),
    }
}

fn run(temp: &TempDir, set: &RuleSet, options: &ApplyOptions) -> ApplyResult {
    run_after(temp, set, options, AppliedLedger::default())
}

/// Locate and apply with a ledger left by earlier runs
fn run_after(temp: &TempDir, set: &RuleSet, options: &ApplyOptions, prior: AppliedLedger) -> ApplyResult {
    let tree = SourceTree::new(temp.path(), "abc123").unwrap();
    let with_prior = LocatorOptions {
        prior,
        ..locator_options(2)
    };
    let located = locate(&tree, set, &Excludes::default(), &with_prior).unwrap();
    apply(&tree, set, &located, options).unwrap()
}

/// Ledger recording what `result` wrote
fn ledger_after(temp: &TempDir, result: &ApplyResult) -> AppliedLedger {
    let written = result
        .touched
        .iter()
        .map(|t| (t.file.clone(), hash_bytes(&fs::read(temp.path().join(&t.file)).unwrap())))
        .collect();
    let mut ledger = AppliedLedger::default();
    ledger.update(&result.outcomes, written);
    ledger
}

#[derive(Debug)]
struct FailingStage;

impl Stage for FailingStage {
    fn write(&self, target: &Path, contents: &[u8]) -> io::Result<NamedTempFile> {
        // Simulate a torn in-place write before failing.
        fs::write(target, &contents[..contents.len() / 2])?;
        Err(io::Error::other("injected failure"))
    }

    fn persist(&self, staged: NamedTempFile, target: &Path) -> io::Result<()> {
        TempStage.persist(staged, target)
    }
}

/// Stages correctly, but slower than any test timeout
#[derive(Debug)]
struct SlowStage;

impl Stage for SlowStage {
    fn write(&self, target: &Path, contents: &[u8]) -> io::Result<NamedTempFile> {
        std::thread::sleep(Duration::from_millis(400));
        TempStage.write(target, contents)
    }

    fn persist(&self, staged: NamedTempFile, target: &Path) -> io::Result<()> {
        TempStage.persist(staged, target)
    }
}

#[test]
fn test_single_occurrence_replaced() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "src/main.rs", "Hello, world");
    let set = rules("greet:\n  match: Hello\n  replacement: 你好\n");

    let result = run(&temp, &set, &ApplyOptions::default());
    assert_eq!(read(temp.path(), "src/main.rs"), "你好, world");
    assert_eq!(result.outcomes[0].key, "greet");
    assert_eq!(
        result.outcomes[0].outcome,
        Outcome::Applied {
            location: Location {
                file: "src/main.rs".to_string(),
                offset: 0,
                len: 5,
            }
        }
    );
    assert_eq!(result.touched.len(), 1);
    assert_eq!(result.touched[0].original, b"Hello, world");
    assert_eq!(result.touched[0].rule_indices(), vec![0]);
}

#[test]
fn test_two_occurrences_are_ambiguous_and_untouched() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "a.rs", "Hello Hello");
    let set = rules("greet:\n  match: Hello\n  replacement: 你好\n");

    let result = run(&temp, &set, &ApplyOptions::default());
    assert_eq!(read(temp.path(), "a.rs"), "Hello Hello");
    assert_eq!(result.outcomes[0].outcome.to_string(), "Ambiguous(2 locations)");
    assert!(result.touched.is_empty());
}

#[test]
fn test_not_found() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "a.rs", "Goodbye");
    let set = rules("greet:\n  match: Hello\n  replacement: 你好\n");

    let result = run(&temp, &set, &ApplyOptions::default());
    assert_eq!(result.outcomes[0].outcome.to_string(), "Skipped(NotFound)");
}

#[test]
fn test_multiple_rules_in_one_file() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "menu.rs", "menu(\"Open\", \"Save\", \"Close\")");
    let set = rules(
        "open:\n  match: Open\n  replacement: 打开\n\
         save:\n  match: Save\n  replacement: 保存\n\
         close:\n  match: Close\n  replacement: 关闭\n",
    );

    let result = run(&temp, &set, &ApplyOptions::default());
    assert_eq!(read(temp.path(), "menu.rs"), "menu(\"打开\", \"保存\", \"关闭\")");
    assert!(result.outcomes.iter().all(|o| matches!(o.outcome, Outcome::Applied { .. })));
    assert_eq!(result.touched.len(), 1);
    assert_eq!(result.touched[0].rule_indices(), vec![0, 1, 2]);
}

#[test]
fn test_overlapping_rules_earlier_wins() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "a.rs", "Open File now");
    let set = rules(
        "open_file:\n  match: Open File\n  replacement: 打开文件\n\
         file:\n  match: File now\n  replacement: 文件\n",
    );

    let result = run(&temp, &set, &ApplyOptions::default());
    assert_eq!(read(temp.path(), "a.rs"), "打开文件 now");
    assert!(matches!(result.outcomes[0].outcome, Outcome::Applied { .. }));
    assert_eq!(
        result.outcomes[1].outcome,
        Outcome::Skipped {
            reason: SkipReason::Overlap {
                other: "open_file".to_string()
            }
        }
    );
}

#[test]
fn test_second_run_is_idempotent() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "a.rs", "Hello, world");
    let set = rules("greet:\n  match: Hello\n  replacement: Hello!\n");

    let first = run(&temp, &set, &ApplyOptions::default());
    assert!(matches!(first.outcomes[0].outcome, Outcome::Applied { .. }));

    // Without a record of the first run the missing match text is drift.
    let unrecorded = run(&temp, &set, &ApplyOptions::default());
    assert_eq!(unrecorded.outcomes[0].outcome.to_string(), "Skipped(NotFound)");

    let second = run_after(&temp, &set, &ApplyOptions::default(), ledger_after(&temp, &first));
    assert_eq!(second.outcomes[0].outcome.to_string(), "Skipped(AlreadyApplied)");
    assert!(second.outcomes[0].outcome.is_satisfied());
    assert!(second.touched.is_empty());
    assert_eq!(read(temp.path(), "a.rs"), "Hello!, world");
}

#[test]
fn test_slow_write_times_out_and_leaves_file() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "a.rs", "Hello, world");
    let set = rules("greet:\n  match: Hello\n  replacement: 你好\n");

    let options = ApplyOptions {
        io_timeout: Some(Duration::from_millis(50)),
        stage: Arc::new(SlowStage),
        ..ApplyOptions::default()
    };
    let result = run(&temp, &set, &options);

    assert_eq!(result.outcomes[0].outcome.to_string(), "Skipped(Timeout)");
    assert!(!result.outcomes[0].outcome.is_satisfied());
    assert!(result.touched.is_empty());
    // The abandoned staging thread never renames over the target.
    std::thread::sleep(Duration::from_millis(700));
    assert_eq!(read(temp.path(), "a.rs"), "Hello, world");
}

#[test]
fn test_injected_write_failure_leaves_original_bytes() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "a.rs", "Hello, world");
    write(temp.path(), "b.rs", "Save");
    let set = rules(
        "greet:\n  match: Hello\n  replacement: 你好\n  scope: a.rs\n\
         save:\n  match: Save\n  replacement: 保存\n  scope: b.rs\n",
    );

    let options = ApplyOptions {
        stage: Arc::new(FailingStage),
        ..ApplyOptions::default()
    };
    let result = run(&temp, &set, &options);

    assert_eq!(read(temp.path(), "a.rs"), "Hello, world");
    assert_eq!(read(temp.path(), "b.rs"), "Save");
    for outcome in &result.outcomes {
        assert!(matches!(
            outcome.outcome,
            Outcome::Skipped {
                reason: SkipReason::WriteFailed { .. }
            }
        ));
    }
    assert!(result.touched.is_empty());
}

#[test]
fn test_dry_run_writes_nothing() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "a.rs", "Hello, world");
    let set = rules("greet:\n  match: Hello\n  replacement: 你好\n");

    let options = ApplyOptions {
        dry_run: true,
        ..ApplyOptions::default()
    };
    let result = run(&temp, &set, &options);

    assert_eq!(read(temp.path(), "a.rs"), "Hello, world");
    assert!(matches!(result.outcomes[0].outcome, Outcome::Applied { .. }));
    assert_eq!(
        result.touched[0].preview.as_deref(),
        Some("你好, world".as_bytes())
    );
}

#[test]
fn test_cancelled_before_batches() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "a.rs", "Hello, world");
    let set = rules("greet:\n  match: Hello\n  replacement: 你好\n");

    let tree = SourceTree::new(temp.path(), "abc123").unwrap();
    let located = locate(
        &tree,
        &set,
        &Excludes::default(),
        &locator_options(1),
    )
    .unwrap();

    let options = ApplyOptions::default();
    options.cancel.cancel();
    let result = apply(&tree, &set, &located, &options).unwrap();

    assert_eq!(result.outcomes[0].outcome.to_string(), "Skipped(Cancelled)");
    assert_eq!(read(temp.path(), "a.rs"), "Hello, world");
}

#[test]
fn test_drift_between_locate_and_apply() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "a.rs", "Hello, world");
    let set = rules("greet:\n  match: Hello\n  replacement: 你好\n");

    let tree = SourceTree::new(temp.path(), "abc123").unwrap();
    let located = locate(
        &tree,
        &set,
        &Excludes::default(),
        &locator_options(1),
    )
    .unwrap();

    write(temp.path(), "a.rs", "Howdy, world");
    let result = apply(&tree, &set, &located, &ApplyOptions::default()).unwrap();

    assert_eq!(result.outcomes[0].outcome.to_string(), "Skipped(NotFound)");
    assert_eq!(read(temp.path(), "a.rs"), "Howdy, world");
}

#[test]
fn test_deletion_rule() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "a.rs", "label(\"Beta: Search\")");
    let set = rules("beta:\n  match: \"Beta: \"\n  replacement: \"\"\n");

    run(&temp, &set, &ApplyOptions::default());
    assert_eq!(read(temp.path(), "a.rs"), "label(\"Search\")");
}

#[test]
fn test_outcome_serialization() {
    let outcome = Outcome::Skipped {
        reason: SkipReason::Overlap {
            other: "greet".to_string(),
        },
    };
    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["status"], "skipped");
    assert_eq!(json["reason"]["kind"], "overlap");
    assert_eq!(json["reason"]["other"], "greet");
}
