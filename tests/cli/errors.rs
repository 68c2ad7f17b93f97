//! Tests for error handling and CLI flags.

use crate::support::*;
use predicates::prelude::*;

#[test]
fn test_help_lists_commands() {
    let t = Test::new();

    t.cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("write").and(predicate::str::contains("read")));
}

#[test]
fn test_unknown_command_fails() {
    let t = Test::new();

    let output = t.cmd().arg("unknown-command").output().unwrap();
    assert_failure(&output);
}

#[test]
fn test_version_flag() {
    let t = Test::new();

    let output = t.cmd().arg("--version").output().unwrap();
    assert_success(&output);
    assert_stdout_contains(&output, "flux-repo");
}

#[test]
fn test_completions_bash_outputs_script() {
    let t = Test::new();

    let output = t.cmd().args(["completions", "bash"]).output().unwrap();
    assert_success(&output);
    let out = stdout(&output);
    assert!(out.contains("_flux-repo") || out.contains("complete"));
}

#[test]
fn test_completions_zsh() {
    let t = Test::new();

    let output = t.cmd().args(["completions", "zsh"]).output().unwrap();
    assert_success(&output);
    assert!(stdout(&output).contains("#compdef"));
}

#[test]
fn test_write_without_path_fails_before_reading() {
    let t = Test::new();

    // stdin is never read when the path is missing
    let output = t.cmd().args(["write", "-b", "age"]).output().unwrap();
    assert_failure(&output);
    assert_eq!(output.status.code(), Some(1));
    assert_stderr_contains(&output, "missing required setting: path (-p)");
    assert_stderr_contains(&output, "pass -p <path>");
}

#[test]
fn test_write_age_requires_enc_extension() {
    let t = Test::new();
    t.write_file("secret.yaml", DATA_SECRET);

    let output = t
        .cmd()
        .args([
            "write",
            "-b",
            "age",
            "-p",
            "store.yaml",
            "-f",
            "secret.yaml",
            "--age-recipient",
            STRANGER_PUBLIC_KEY,
        ])
        .output()
        .unwrap();
    assert_failure(&output);
    assert_stderr_contains(&output, ".enc");
}

#[test]
fn test_write_age_requires_recipient() {
    let t = Test::new();
    t.write_file("secret.yaml", DATA_SECRET);

    let output = t
        .cmd()
        .args(["write", "-b", "age", "-p", "store.enc", "-f", "secret.yaml"])
        .output()
        .unwrap();
    assert_failure(&output);
    assert!(!t.path("store.enc").exists());
}

#[test]
fn test_write_rejects_already_sanitized() {
    let (t, recipient) = Test::with_identity();
    t.write_file("secret.yaml", DATA_SECRET);
    assert_success(&t.write_age("secret.yaml", "store.enc", "out", &recipient));

    let output = t.write_age("out/secret.yaml", "again.enc", "out2", &recipient);
    assert_failure(&output);
    assert_stderr_contains(&output, "must NOT start with ref+");
    assert_stderr_contains(&output, "flux-repo read");
    assert!(!t.path("again.enc").exists());
    assert!(!t.path("out2/secret.yaml").exists());
}

#[test]
fn test_write_rejects_conflicting_payload() {
    let (t, recipient) = Test::with_identity();
    t.write_file("both.yaml", CONFLICTING_SECRET);

    let output = t.write_age("both.yaml", "store.enc", "out", &recipient);
    assert_failure(&output);
    assert_stderr_contains(&output, "both data and stringData");
    assert!(!t.path("store.enc").exists());
}

#[test]
fn test_write_rejects_bad_base64() {
    let (t, recipient) = Test::with_identity();
    t.write_file("broken.yaml", BAD_BASE64_SECRET);

    let output = t.write_age("broken.yaml", "store.enc", "out", &recipient);
    assert_failure(&output);
    assert_stderr_contains(&output, "not valid base64");
    assert_stderr_contains(&output, "broken.yaml (document 0)");
}

#[test]
fn test_write_error_in_one_file_writes_nothing() {
    let (t, recipient) = Test::with_identity();
    t.write_file("manifests/a.yaml", DATA_SECRET);
    t.write_file("manifests/b.yaml", "kind: Secret\nstringData:\n  k: v\n");

    let output = t.write_age("manifests", "store.enc", "out", &recipient);
    assert_failure(&output);
    assert_stderr_contains(&output, "no metadata.name");
    assert!(!t.path("store.enc").exists());
    assert!(!t.path("out/a.yaml").exists());
}

#[test]
fn test_write_malformed_yaml_fails() {
    let (t, recipient) = Test::with_identity();
    t.write_file("bad.yaml", "kind: Secret\nmetadata: [unclosed\n");

    let output = t.write_age("bad.yaml", "store.enc", "out", &recipient);
    assert_failure(&output);
    assert_stderr_contains(&output, "malformed YAML");
}

#[test]
fn test_write_missing_input_fails() {
    let (t, recipient) = Test::with_identity();

    let output = t.write_age("nope.yaml", "store.enc", "out", &recipient);
    assert_failure(&output);
    assert_stderr_contains(&output, "nope.yaml");
}

#[test]
fn test_invalid_config_file_fails() {
    let t = Test::new();
    t.write_file(".flux-repo.toml", "[write]\nbackedn = \"age\"\n");

    let output = t.cmd().args(["write", "-p", "x.enc"]).output().unwrap();
    assert_failure(&output);
    assert_stderr_contains(&output, "failed to parse config file");
}

#[cfg(not(feature = "aws"))]
#[test]
fn test_aws_backend_not_compiled() {
    let t = Test::new();
    t.write_file("secret.yaml", DATA_SECRET);

    let output = t
        .cmd()
        .args(["write", "-p", "prod/app", "-f", "secret.yaml"])
        .output()
        .unwrap();
    assert_failure(&output);
    assert_stderr_contains(&output, "--features aws");
}

#[cfg(not(feature = "vault"))]
#[test]
fn test_vault_reference_not_compiled() {
    let t = Test::new();
    t.write_file(
        "secret.yaml",
        "kind: Secret\nmetadata:\n  name: s\nstringData:\n  k: ref+vault://secret/data/app?version=1#/ns/s/k\n",
    );

    let output = t.read("secret.yaml");
    assert_failure(&output);
    assert_stderr_contains(&output, "--features vault");
}
