//! Tests for `flux-repo read`.

use crate::support::*;

#[test]
fn test_write_then_read_restores_plaintext() {
    let (t, recipient) = Test::with_identity();
    t.write_file("secret.yaml", DATA_SECRET);

    assert_success(&t.write_age("secret.yaml", "store.enc", "out", &recipient));

    let output = t.read("out/secret.yaml");
    assert_success(&output);
    assert_stdout_contains(&output, "stringData:");
    assert_stdout_contains(&output, "user: admin");
    assert_stdout_contains(&output, "password: s3cr3t-pass");
    assert_stdout_excludes(&output, "ref+");
}

#[test]
fn test_read_directory_skips_store_file() {
    let (t, recipient) = Test::with_identity();
    t.write_file("manifests/a.yaml", DATA_SECRET);
    t.write_file("manifests/b.yaml", CONFIG_MAP);

    assert_success(&t.write_age("manifests", "out/secrets.enc", "out", &recipient));

    let output = t.read("out");
    assert_success(&output);
    let out = stdout(&output);
    assert!(out.contains("password: s3cr3t-pass"));
    assert!(out.contains("mode: fast"));
    assert!(out.contains("---"));
    assert!(!out.contains("BEGIN AGE ENCRYPTED FILE"));
}

#[test]
fn test_read_from_stdin() {
    let (t, recipient) = Test::with_identity();
    t.write_file("api.yaml", STRING_DATA_SECRET);
    assert_success(&t.write_age("api.yaml", "store.enc", "out", &recipient));

    let sanitized = t.read_file("out/api.yaml");
    let output = t
        .cmd()
        .arg("read")
        .write_stdin(sanitized)
        .output()
        .unwrap();
    assert_success(&output);
    assert_stdout_contains(&output, "token: sk-test-12345");
}

#[test]
fn test_read_identity_from_env() {
    let t = Test::new();
    let identity = t.path("keys/me.txt");
    let recipient = t.write_identity(&identity);
    t.write_file("secret.yaml", DATA_SECRET);
    assert_success(&t.write_age("secret.yaml", "store.enc", "out", &recipient));

    let output = t
        .cmd()
        .env("FLUX_REPO_AGE_IDENTITY", &identity)
        .args(["read", "out/secret.yaml"])
        .output()
        .unwrap();
    assert_success(&output);
    assert_stdout_contains(&output, "user: admin");
}

#[test]
fn test_read_passes_non_secrets_through() {
    let t = Test::new();
    t.write_file("config.yaml", CONFIG_MAP);

    let output = t.read("config.yaml");
    assert_success(&output);
    assert_stdout_contains(&output, "kind: ConfigMap");
    assert_stdout_contains(&output, "mode: fast");
}

#[test]
fn test_read_stale_store_fails() {
    let (t, recipient) = Test::with_identity();
    t.write_file("secret.yaml", DATA_SECRET);
    assert_success(&t.write_age("secret.yaml", "store.enc", "out", &recipient));

    // a second write replaces the store the first output points at
    t.write_file("other.yaml", STRING_DATA_SECRET);
    assert_success(&t.write_age("other.yaml", "store.enc", "out2", &recipient));

    let output = t.read("out/secret.yaml");
    assert_failure(&output);
    assert_stderr_contains(&output, "digest mismatch");
    assert_stderr_contains(&output, "re-run flux-repo write");
    assert!(stdout(&output).is_empty());
}

#[test]
fn test_read_without_identity_fails() {
    let t = Test::new();
    let identity = t.path("elsewhere/id.txt");
    let recipient = t.write_identity(&identity);
    t.write_file("secret.yaml", DATA_SECRET);
    assert_success(&t.write_age("secret.yaml", "store.enc", "out", &recipient));

    let output = t.read("out/secret.yaml");
    assert_failure(&output);
    assert_stderr_contains(&output, "FLUX_REPO_AGE_IDENTITY");
}

#[test]
fn test_read_wrong_identity_fails() {
    let (t, _recipient) = Test::with_identity();
    t.write_file("secret.yaml", DATA_SECRET);
    assert_success(&t.write_age("secret.yaml", "store.enc", "out", STRANGER_PUBLIC_KEY));

    let output = t.read("out/secret.yaml");
    assert_failure(&output);
    assert_stderr_contains(&output, "age store unavailable");
}

#[test]
fn test_read_rejects_plain_values() {
    let t = Test::new();
    t.write_file("api.yaml", STRING_DATA_SECRET);

    let output = t.read("api.yaml");
    assert_failure(&output);
    assert_stderr_contains(&output, "must start with ref+");
    assert_stderr_contains(&output, "api.yaml (document 0)");
}

#[test]
fn test_read_rejects_secret_without_string_data() {
    let t = Test::new();
    t.write_file("secret.yaml", DATA_SECRET);

    let output = t.read("secret.yaml");
    assert_failure(&output);
    assert_stderr_contains(&output, "no stringData");
}

#[test]
fn test_read_unknown_scheme_fails() {
    let t = Test::new();
    t.write_file(
        "secret.yaml",
        "kind: Secret\nmetadata:\n  name: s\nstringData:\n  k: ref+gcpsecrets://p#/ns/s/k\n",
    );

    let output = t.read("secret.yaml");
    assert_failure(&output);
    assert_stderr_contains(&output, "unknown reference scheme: gcpsecrets");
}
