//! Smoke tests for command wiring

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

/// A config with every pause zeroed so runs finish immediately.
fn fast_config(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        "[delays]\nstart_ms = 0\nhover_ms = 0\nedit_ms = 0\ncopy_ms = 0\nphase_ms = 0\nlinger_ms = 0\n\n\
         [capture]\nwait_budget_ms = 50\n",
    )
    .unwrap();
    path
}

fn transcriptctl(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("transcriptctl").unwrap();
    cmd.env("HOME", home.path()).env_remove("TRANSCRIPTCTL_CONFIG");
    cmd
}

// === Help & Wiring ===

#[test]
fn test_help_lists_commands() {
    let home = TempDir::new().unwrap();
    transcriptctl(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("export"))
        .stdout(predicate::str::contains("listen"))
        .stdout(predicate::str::contains("selectors"));
}

#[test]
fn test_export_help() {
    let home = TempDir::new().unwrap();
    transcriptctl(&home)
        .arg("export")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Page snapshot"))
        .stdout(predicate::str::contains("--no-linger"));
}

#[test]
fn test_selectors_prints_registry() {
    let home = TempDir::new().unwrap();
    transcriptctl(&home)
        .arg("selectors")
        .assert()
        .success()
        .stdout(predicate::str::contains("copy_button"))
        .stdout(predicate::str::contains(r#"button[data-testid="action-bar-copy"]"#));
}

#[test]
fn test_selectors_honours_config_overrides() {
    let home = TempDir::new().unwrap();
    let config = home.path().join("custom.toml");
    fs::write(&config, "[selectors]\ncopy_button = \"button.copy\"\n").unwrap();

    transcriptctl(&home)
        .arg("--config")
        .arg(&config)
        .arg("selectors")
        .assert()
        .success()
        .stdout(predicate::str::contains("button.copy"));
}

#[test]
fn test_completions_bash() {
    let home = TempDir::new().unwrap();
    transcriptctl(&home)
        .arg("completions")
        .arg("bash")
        .assert()
        .success()
        .stdout(predicate::str::contains("transcriptctl"));
}

// === Export ===

#[test]
fn test_export_writes_markdown() {
    let home = TempDir::new().unwrap();
    let out = home.path().join("exports");

    transcriptctl(&home)
        .arg("--quiet")
        .arg("--config")
        .arg(fast_config(&home))
        .arg("export")
        .arg("--in")
        .arg(fixture("conversation.json"))
        .arg("--out")
        .arg(&out)
        .arg("--no-linger")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Exported: release_checklist_full_context.md",
        ));

    let md = fs::read_to_string(out.join("release_checklist_full_context.md")).unwrap();
    assert!(md.contains("**Title:** Release Checklist"));
    assert!(md.contains("## 👤 Human:\n\nCan you write a **release** script?"));
    assert!(md.contains("## 🤖 Claude:\n\nHere is a small release script that tags and pushes."));
    assert!(md.contains("```bash\ngit tag v1.0.0 && git push --tags\n```"));
    assert!(md.contains("- **Messages:** 1 human, 1 assistant"));
}

#[test]
fn test_export_twice_uniquifies() {
    let home = TempDir::new().unwrap();
    let out = home.path().join("exports");
    let config = fast_config(&home);

    for _ in 0..2 {
        transcriptctl(&home)
            .arg("-q")
            .arg("--config")
            .arg(&config)
            .arg("export")
            .arg("--in")
            .arg(fixture("conversation.json"))
            .arg("--out")
            .arg(&out)
            .assert()
            .success();
    }

    assert!(out.join("release_checklist_full_context.md").exists());
    assert!(out.join("release_checklist_full_context (1).md").exists());
}

#[test]
fn test_export_without_copy_controls_fails() {
    let home = TempDir::new().unwrap();
    let out = home.path().join("exports");

    transcriptctl(&home)
        .arg("-q")
        .arg("--config")
        .arg(fast_config(&home))
        .arg("export")
        .arg("--in")
        .arg(fixture("no_copy_controls.json"))
        .arg("--out")
        .arg(&out)
        .assert()
        .failure()
        .stderr(predicate::str::contains("No Claude copy buttons found!"));

    assert!(!out.exists());
}

#[test]
fn test_missing_explicit_config_fails() {
    let home = TempDir::new().unwrap();
    transcriptctl(&home)
        .arg("--config")
        .arg(home.path().join("missing.toml"))
        .arg("selectors")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Config not found"));
}

// === Listen ===

#[test]
fn test_listen_runs_on_start_message() {
    let home = TempDir::new().unwrap();
    let out = home.path().join("exports");

    transcriptctl(&home)
        .arg("--config")
        .arg(fast_config(&home))
        .arg("listen")
        .arg("--in")
        .arg(fixture("conversation.json"))
        .arg("--out")
        .arg(&out)
        .write_stdin("{\"action\":\"start\"}\n{\"action\":\"dance\"}\n")
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""type":"exportStatus""#))
        .stdout(predicate::str::contains(r#""type":"exportResult","success":true"#))
        .stdout(predicate::str::contains(r#""type":"invalidMessage""#));

    assert!(out.join("release_checklist_full_context.md").exists());
}
