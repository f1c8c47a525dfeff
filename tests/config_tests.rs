//! Configuration layering through the binary: flags, environment, file

mod common;

use common::TestTree;
use predicates::prelude::*;

#[test]
fn test_config_file_in_tree_root_is_used() {
    let tree = TestTree::new();
    tree.write_rules("greet:\n  match: Hello\n  replacement: 你好\n");
    tree.write_file("src/a.rs", "Hello, world");
    tree.write_file("vendor/b.rs", "Hello again");
    tree.write_file("locpatch.yaml", "exclude:\n  - \"vendor/**\"\n");

    tree.apply()
        .assert()
        .success()
        .stdout(predicate::str::contains("greet: Applied(src/a.rs@0+5)"));
    assert_eq!(tree.read_file("vendor/b.rs"), "Hello again");
}

#[test]
fn test_explicit_config_from_environment() {
    let tree = TestTree::new();
    tree.write_rules("greet:\n  match: Goodbye\n  replacement: 再见\n");
    tree.write_file("a.rs", "Hello, world");
    let config = tree.sibling("ci.yaml");
    std::fs::write(&config, "default_mandatory: false\n").unwrap();

    tree.check()
        .env("LOCPATCH_CONFIG", &config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Result: Degraded"));
}

#[test]
fn test_missing_explicit_config_fails() {
    let tree = TestTree::new();
    tree.write_rules("greet:\n  match: Hello\n  replacement: 你好\n");
    tree.write_file("a.rs", "Hello, world");

    tree.check()
        .arg("--config")
        .arg(tree.sibling("missing.yaml"))
        .assert()
        .code(1);
}

#[test]
fn test_zero_concurrency_from_environment_fails() {
    let tree = TestTree::new();
    tree.write_rules("greet:\n  match: Hello\n  replacement: 你好\n");
    tree.write_file("a.rs", "Hello, world");

    tree.check()
        .env("LOCPATCH_CONCURRENCY", "0")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("concurrency"));
}

#[test]
fn test_flag_wins_over_environment() {
    let tree = TestTree::new();
    tree.write_rules("greet:\n  match: Hello\n  replacement: 你好\n");
    tree.write_file("a.rs", "Hello, world");

    tree.check()
        .env("LOCPATCH_CONCURRENCY", "0")
        .args(["--concurrency", "2"])
        .assert()
        .success();
}

#[test]
fn test_output_dir_override() {
    let tree = TestTree::new();
    tree.write_rules("greet:\n  match: Hello\n  replacement: 你好\n");
    tree.write_file("a.rs", "Hello, world");
    let records = tree.sibling("records");

    tree.apply().arg("--output-dir").arg(&records).assert().success();

    assert_eq!(TestTree::provenance_records(&records).len(), 1);
    assert!(records.join("history.jsonl").exists());
}
