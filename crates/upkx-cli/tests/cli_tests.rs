//! Integration tests for upkx-cli.
//!
//! Note: Tests use `unwrap`/`expect` which is acceptable in test code.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;
use upkx_core::test_utils::PackageBuilder;
use upkx_core::test_utils::write_package;

const WEBHOOK_SOURCE: &[u8] =
    b"var hook = \"https://discord.com/api/webhooks/123456789012/abcdefghijklmnopqrstuvwxyz0123\";\nProcess.Start(\"cmd.exe\");";

fn upkx_cmd() -> Command {
    cargo_bin_cmd!("upkx")
}

fn sample_package(temp: &TempDir) -> PathBuf {
    write_package(
        temp.path(),
        "sample.unitypackage",
        &PackageBuilder::new()
            .asset("aaa", "Assets/Scripts/Player.cs", b"class Player {}")
            .asset("bbb", "Assets/Art/wood.png", b"PNG")
            .folder("ccc", "Assets/Art")
            .build(),
    )
}

fn malicious_package(temp: &TempDir) -> PathBuf {
    write_package(
        temp.path(),
        "evil.unitypackage",
        &PackageBuilder::new()
            .asset("aaa", "Assets/Scripts/Telemetry.cs", WEBHOOK_SOURCE)
            .build(),
    )
}

fn stdout_json(output: &std::process::Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("stdout is not JSON")
}

#[test]
fn test_version_flag() {
    upkx_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("upkx"));
}

#[test]
fn test_help_lists_subcommands() {
    upkx_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("extract"))
        .stdout(predicate::str::contains("preview"))
        .stdout(predicate::str::contains("scan"));
}

#[test]
fn test_extract_by_category() {
    let temp = TempDir::new().unwrap();
    let package = sample_package(&temp);
    let out = temp.path().join("out");

    upkx_cmd()
        .arg("extract")
        .arg(&package)
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Extraction complete"))
        .stdout(predicate::str::contains("Files extracted: 2"));

    assert!(out.join("Scripts/Assets/Scripts/Player.cs").is_file());
    assert!(out.join("Textures/Assets/Art/wood.png").is_file());
}

#[test]
fn test_extract_flat_without_meta() {
    let temp = TempDir::new().unwrap();
    let package = sample_package(&temp);
    let out = temp.path().join("out");

    upkx_cmd()
        .args(["extract", "--flat", "--no-meta"])
        .arg(&package)
        .arg(&out)
        .assert()
        .success();

    assert_eq!(
        fs::read(out.join("Assets/Scripts/Player.cs")).unwrap(),
        b"class Player {}"
    );
    assert!(out.join("Assets/Art").is_dir());
    assert!(!out.join("Assets/Scripts/Player.cs.meta").exists());
}

#[test]
fn test_extract_json_envelope() {
    let temp = TempDir::new().unwrap();
    let package = sample_package(&temp);
    let out = temp.path().join("out");

    let output = upkx_cmd()
        .args(["--json", "extract"])
        .arg(&package)
        .arg(&out)
        .output()
        .unwrap();

    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["operation"], "extract");
    assert_eq!(json["status"], "success");
    assert_eq!(json["data"]["files_extracted"], 2);
    assert_eq!(json["data"]["bytes_written"], 18);
}

#[test]
fn test_extract_with_scan_reports_threats() {
    let temp = TempDir::new().unwrap();
    let package = malicious_package(&temp);
    let out = temp.path().join("out");

    let output = upkx_cmd()
        .args(["--json", "extract", "--flat", "--scan"])
        .arg(&package)
        .arg(&out)
        .output()
        .unwrap();

    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["data"]["scan"]["is_malicious"], true);
}

#[test]
fn test_extract_traversal_fails_with_hint() {
    let temp = TempDir::new().unwrap();
    let package = write_package(
        temp.path(),
        "traversal.unitypackage",
        &PackageBuilder::new()
            .asset("aaa", "Assets/ok.txt", b"fine")
            .asset("bbb", "../../etc/evil.txt", b"pwned")
            .build(),
    );
    let out = temp.path().join("out");

    upkx_cmd()
        .arg("extract")
        .arg(&package)
        .arg(&out)
        .assert()
        .failure()
        .stderr(predicate::str::contains("ERROR:"))
        .stderr(predicate::str::contains("outside the output directory"))
        .stderr(predicate::str::contains("HINT"));

    assert!(!temp.path().join("etc/evil.txt").exists());
    assert!(!out.join("Other/Assets/ok.txt").exists());
}

#[test]
fn test_extract_asset_limit_names_flag() {
    let temp = TempDir::new().unwrap();
    let package = sample_package(&temp);

    upkx_cmd()
        .args(["extract", "--max-assets", "1"])
        .arg(&package)
        .arg(temp.path().join("out"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("--max-assets"));
}

#[test]
fn test_extract_corrupt_package_json_error() {
    let temp = TempDir::new().unwrap();
    let package = temp.path().join("broken.unitypackage");
    fs::write(&package, b"definitely not gzip").unwrap();

    let output = upkx_cmd()
        .args(["--json", "extract"])
        .arg(&package)
        .arg(temp.path().join("out"))
        .output()
        .unwrap();

    assert!(!output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["operation"], "extract");
    assert_eq!(json["status"], "error");
    assert!(json["error"].as_str().unwrap().contains("Invalid package"));
}

#[test]
fn test_extract_missing_package() {
    let temp = TempDir::new().unwrap();

    upkx_cmd()
        .arg("extract")
        .arg(temp.path().join("missing.unitypackage"))
        .arg(temp.path().join("out"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("ERROR:"));
}

#[test]
fn test_preview_summary() {
    let temp = TempDir::new().unwrap();
    let package = sample_package(&temp);

    upkx_cmd()
        .args(["preview", "--long"])
        .arg(&package)
        .assert()
        .success()
        .stdout(predicate::str::contains("Assets: 3"))
        .stdout(predicate::str::contains("Assets/Scripts/Player.cs"))
        .stdout(predicate::str::contains("Scripts"));
}

#[test]
fn test_preview_json_truncation() {
    let temp = TempDir::new().unwrap();
    let package = write_package(
        temp.path(),
        "big.unitypackage",
        &PackageBuilder::new()
            .asset("aaa", "Assets/Data/blob.bytes", &vec![b'x'; 4096])
            .asset("bbb", "Assets/Data/small.txt", b"tiny")
            .build(),
    );

    let output = upkx_cmd()
        .args(["--json", "preview", "--preview-bytes", "1K"])
        .arg(&package)
        .output()
        .unwrap();

    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["operation"], "preview");
    assert_eq!(json["data"]["asset_count"], 2);
    assert_eq!(json["data"]["truncated_count"], 1);
    assert_eq!(json["data"]["entries"][0]["truncated"], true);
    assert_eq!(json["data"]["entries"][1]["truncated"], false);
}

#[test]
fn test_preview_writes_nothing_to_cwd() {
    let temp = TempDir::new().unwrap();
    let package = sample_package(&temp);
    let cwd = TempDir::new().unwrap();

    upkx_cmd()
        .current_dir(cwd.path())
        .arg("preview")
        .arg(&package)
        .assert()
        .success();

    assert_eq!(fs::read_dir(cwd.path()).unwrap().count(), 0);
}

#[test]
fn test_scan_clean_package() {
    let temp = TempDir::new().unwrap();
    let package = sample_package(&temp);

    upkx_cmd()
        .args(["scan", "--fail-on-malicious"])
        .arg(&package)
        .assert()
        .success()
        .stdout(predicate::str::contains("No malicious content found"));
}

#[test]
fn test_scan_malicious_package() {
    let temp = TempDir::new().unwrap();
    let package = malicious_package(&temp);

    upkx_cmd()
        .arg("scan")
        .arg(&package)
        .assert()
        .success()
        .stdout(predicate::str::contains("MALICIOUS"))
        .stdout(predicate::str::contains("Assets/Scripts/Telemetry.cs"));
}

#[test]
fn test_scan_fail_on_malicious() {
    let temp = TempDir::new().unwrap();
    let package = malicious_package(&temp);

    upkx_cmd()
        .args(["scan", "--fail-on-malicious"])
        .arg(&package)
        .assert()
        .failure()
        .stderr(predicate::str::contains("judged malicious"));
}

#[test]
fn test_scan_directory_json() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("project");
    fs::create_dir_all(root.join("Scripts")).unwrap();
    fs::write(root.join("Scripts/Telemetry.cs"), WEBHOOK_SOURCE).unwrap();

    let output = upkx_cmd()
        .args(["--json", "scan", "source.unitypackage", "--dir"])
        .arg(&root)
        .output()
        .unwrap();

    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["operation"], "scan");
    assert_eq!(json["data"]["is_malicious"], true);
    assert_eq!(json["data"]["files_scanned"], 1);
}

#[test]
fn test_scan_invalid_rules_file() {
    let temp = TempDir::new().unwrap();
    let package = sample_package(&temp);
    let rules = temp.path().join("rules.json");
    fs::write(&rules, b"{ not json").unwrap();

    upkx_cmd()
        .arg("scan")
        .arg(&package)
        .arg("--rules")
        .arg(&rules)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid rule set"));
}

#[test]
fn test_completion_bash() {
    upkx_cmd()
        .args(["completion", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("upkx"));
}

#[test]
fn test_quiet_conflicts_with_verbose() {
    upkx_cmd()
        .args(["-q", "-v", "scan", "x.unitypackage"])
        .assert()
        .failure();
}
