//! CLI regression tests for the `oasgen` binary.
//!
//! These tests invoke the binary as a subprocess to catch regressions in flag
//! names, exit codes, and output formats.
//!
//! Run with: `cargo test -p oasgen-test`
//! Requires the `oasgen` binary to be built first (`cargo build -p oasgen`).

use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::str::contains;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Returns an assert_cmd Command wrapping the `oasgen` binary.
fn oasgen() -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("oasgen")
        .expect("oasgen binary not found, run `cargo build -p oasgen` first");
    for var in ["OASGEN_OUTPUT", "OASGEN_PACKAGE", "OASGEN_LOG_LEVEL", "OASGEN_LOG_FORMAT", "RUST_LOG"] {
        cmd.env_remove(var);
    }
    cmd
}

/// Absolute path to the shared test fixtures directory.
fn fixtures() -> PathBuf {
    // CARGO_MANIFEST_DIR = .../crates/oasgen-test
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .expect("crates/")
        .parent()
        .expect("workspace root")
        .join("tests/fixtures")
}

// ---------------------------------------------------------------------------
// oasgen validate
// ---------------------------------------------------------------------------

#[test]
fn validate_valid_document_exits_zero() {
    oasgen()
        .args(["validate", "--input"])
        .arg(fixtures().join("petstore.yaml"))
        .assert()
        .success()
        .stderr(contains("is valid"));
}

#[test]
fn validate_json_document_exits_zero() {
    oasgen()
        .args(["validate", "--input"])
        .arg(fixtures().join("petstore.json"))
        .assert()
        .success();
}

#[test]
fn validate_parse_error_exits_one() {
    oasgen()
        .args(["validate", "--input"])
        .arg(fixtures().join("invalid-parse-error.yaml"))
        .assert()
        .failure()
        .code(1)
        .stderr(contains("E1002"));
}

#[test]
fn validate_unsupported_version_exits_one() {
    oasgen()
        .args(["validate", "--input"])
        .arg(fixtures().join("invalid-version.yaml"))
        .assert()
        .failure()
        .code(1)
        .stderr(contains("E1011"));
}

#[test]
fn validate_dangling_reference_names_location() {
    oasgen()
        .args(["validate", "--input"])
        .arg(fixtures().join("invalid-dangling-ref.yaml"))
        .assert()
        .failure()
        .code(1)
        .stderr(contains("E1022"))
        .stderr(contains("#/components/schemas/Missing"));
}

#[test]
fn validate_missing_file_exits_one() {
    oasgen()
        .args(["validate", "--input", "this-file-does-not-exist.yaml"])
        .assert()
        .failure()
        .code(1)
        .stderr(contains("E1001"));
}

#[test]
fn validate_reports_warnings_without_failing() {
    oasgen()
        .args(["validate", "--input"])
        .arg(fixtures().join("no-operation-id.yaml"))
        .assert()
        .success()
        .stderr(contains("W1001"))
        .stderr(contains("GET /ping"));
}

#[test]
fn validate_json_output_is_parseable() {
    let output = oasgen()
        .args(["validate", "--format", "json", "--input"])
        .arg(fixtures().join("petstore.yaml"))
        .arg("--input")
        .arg(fixtures().join("invalid-version.yaml"))
        .output()
        .expect("failed to run oasgen");

    assert_eq!(output.status.code(), Some(1));
    let json: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be valid JSON");
    assert_eq!(json["summary"]["total"], 2);
    assert_eq!(json["summary"]["valid"], 1);
    assert_eq!(json["results"][0]["document"]["operations"], 5);
    assert_eq!(json["results"][1]["errors"][0]["code"], "E1011");
}

// ---------------------------------------------------------------------------
// oasgen generate
// ---------------------------------------------------------------------------

#[test]
fn generate_writes_all_artifacts() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("api");

    oasgen()
        .args(["generate", "--input"])
        .arg(fixtures().join("petstore.yaml"))
        .arg("--output")
        .arg(&out)
        .args(["--package", "petstore"])
        .assert()
        .success()
        .stdout(contains("types.rs"))
        .stderr(contains("generated 5 file(s)"));

    for name in ["types.rs", "server.rs", "security.rs", "webhooks.rs", "mod.rs"] {
        let contents = fs::read_to_string(out.join(name)).unwrap();
        assert!(contents.starts_with("// Code generated by oasgen "), "{name}");
    }
    let index = fs::read_to_string(out.join("mod.rs")).unwrap();
    assert!(index.contains("pub const PACKAGE: &str = \"petstore\";"));
}

#[test]
fn generate_without_security_or_webhooks_skips_them() {
    let dir = TempDir::new().unwrap();

    oasgen()
        .args(["generate", "--input"])
        .arg(fixtures().join("petstore.json"))
        .arg("--output")
        .arg(dir.path())
        .assert()
        .success();

    assert!(dir.path().join("server.rs").exists());
    assert!(!dir.path().join("security.rs").exists());
    assert!(!dir.path().join("webhooks.rs").exists());
}

#[test]
fn generate_is_deterministic() {
    let dir = TempDir::new().unwrap();
    for run in ["a", "b"] {
        oasgen()
            .args(["generate", "--input"])
            .arg(fixtures().join("petstore.yaml"))
            .arg("--output")
            .arg(dir.path().join(run))
            .assert()
            .success();
    }
    for name in ["types.rs", "server.rs", "security.rs", "webhooks.rs", "mod.rs"] {
        assert_eq!(
            fs::read(dir.path().join("a").join(name)).unwrap(),
            fs::read(dir.path().join("b").join(name)).unwrap(),
            "{name} differs between runs"
        );
    }
}

#[test]
fn generate_reads_config_file_and_flags_override() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("oasgen.yaml");
    fs::write(
        &config,
        format!(
            "package: fromconfig\noutput: {}\nemit_webhooks: false\n",
            dir.path().join("config-out").display()
        ),
    )
    .unwrap();

    oasgen()
        .args(["generate", "--input"])
        .arg(fixtures().join("petstore.yaml"))
        .arg("--config")
        .arg(&config)
        .args(["--package", "fromflag"])
        .assert()
        .success();

    let out = dir.path().join("config-out");
    assert!(!out.join("webhooks.rs").exists());
    let index = fs::read_to_string(out.join("mod.rs")).unwrap();
    assert!(index.contains("\"fromflag\""));
}

#[test]
fn generate_output_from_environment() {
    let dir = TempDir::new().unwrap();
    oasgen()
        .args(["generate", "--input"])
        .arg(fixtures().join("petstore.json"))
        .env("OASGEN_OUTPUT", dir.path().join("env-out"))
        .assert()
        .success();
    assert!(dir.path().join("env-out/mod.rs").exists());
}

#[test]
fn generate_rejects_unknown_config_keys() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("oasgen.yaml");
    fs::write(&config, "packge: typo\n").unwrap();

    oasgen()
        .args(["generate", "--input"])
        .arg(fixtures().join("petstore.yaml"))
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .code(1)
        .stderr(contains("config error"));
}

#[test]
fn generate_invalid_document_exits_one() {
    let dir = TempDir::new().unwrap();
    oasgen()
        .args(["generate", "--input"])
        .arg(fixtures().join("invalid-dangling-ref.yaml"))
        .arg("--output")
        .arg(dir.path().join("out"))
        .assert()
        .failure()
        .code(1)
        .stderr(contains("error: "))
        .stderr(contains("E1022"));
    assert!(!dir.path().join("out").exists());
}

#[test]
fn generate_requires_input() {
    oasgen().arg("generate").assert().failure().code(2);
}

#[test]
fn invalid_log_format_exits_one() {
    oasgen()
        .args(["--log-format", "xml", "validate", "--input"])
        .arg(fixtures().join("petstore.yaml"))
        .assert()
        .failure()
        .code(1)
        .stderr(contains("invalid log format"));
}

#[test]
fn json_logs_go_to_stderr() {
    let dir = TempDir::new().unwrap();
    let output = oasgen()
        .args(["--log-level", "info", "--log-format", "json", "generate", "--input"])
        .arg(fixtures().join("petstore.json"))
        .arg("--output")
        .arg(dir.path())
        .output()
        .expect("failed to run oasgen");

    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("\"event\":\"generation_completed\""), "{stderr}");
    assert!(!String::from_utf8_lossy(&output.stdout).contains("\"event\""));
}

#[test]
fn version_flag_prints_version() {
    oasgen()
        .arg("--version")
        .assert()
        .success()
        .stdout(contains(env!("CARGO_PKG_VERSION")));
}
