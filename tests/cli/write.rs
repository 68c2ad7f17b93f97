//! Tests for `flux-repo write`.

use crate::support::*;

#[test]
fn test_write_single_file_to_age_store() {
    let (t, recipient) = Test::with_identity();
    t.write_file("secret.yaml", DATA_SECRET);

    let output = t.write_age("secret.yaml", "store.enc", "out", &recipient);
    assert_success(&output);
    assert_stdout_contains(&output, "wrote secret.yaml");

    let written = t.read_file("out/secret.yaml");
    assert!(written.contains("stringData:"));
    assert!(written.contains("ref+age://store.enc?digest="));
    assert!(written.contains("#/ns1/db/user"));
    assert!(written.contains("#/ns1/db/password"));
    assert!(!written.contains("\ndata:"));
    assert_file_excludes(&t.path("out/secret.yaml"), "YWRtaW4=");
    assert_file_excludes(&t.path("out/secret.yaml"), "s3cr3t-pass");

    let store = t.read_file("store.enc");
    assert!(store.starts_with("-----BEGIN AGE ENCRYPTED FILE-----"));
    assert_file_excludes(&t.path("store.enc"), "s3cr3t-pass");
}

#[test]
fn test_write_keeps_other_fields() {
    let (t, recipient) = Test::with_identity();
    t.write_file("secret.yaml", DATA_SECRET);

    let output = t.write_age("secret.yaml", "store.enc", "out", &recipient);
    assert_success(&output);

    let written = t.read_file("out/secret.yaml");
    assert!(written.contains("apiVersion: v1"));
    assert!(written.contains("type: Opaque"));
    assert!(written.contains("namespace: ns1"));
}

#[test]
fn test_write_empty_namespace_segment() {
    let (t, recipient) = Test::with_identity();
    t.write_file("api.yaml", STRING_DATA_SECRET);

    let output = t.write_age("api.yaml", "store.enc", "out", &recipient);
    assert_success(&output);

    let written = t.read_file("out/api.yaml");
    assert!(written.contains("#//api/token"), "got: {}", written);
    assert_file_excludes(&t.path("out/api.yaml"), "sk-test-12345");
}

#[test]
fn test_write_directory_input() {
    let (t, recipient) = Test::with_identity();
    t.write_file("manifests/a-secret.yaml", DATA_SECRET);
    t.write_file("manifests/b-config.yaml", CONFIG_MAP);
    t.write_file("manifests/c-app.yaml", MIXED_STREAM);
    t.write_file("manifests/nested/ignored.yaml", STRING_DATA_SECRET);

    let output = t.write_age("manifests", "out/secrets.enc", "out", &recipient);
    assert_success(&output);

    assert!(t.path("out/a-secret.yaml").exists());
    assert!(t.path("out/b-config.yaml").exists());
    assert!(t.path("out/c-app.yaml").exists());
    assert!(!t.path("out/nested").exists());

    // one store file for the whole run
    let stores: Vec<_> = std::fs::read_dir(t.path("out"))
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "enc"))
        .collect();
    assert_eq!(stores.len(), 1);

    let config = t.read_file("out/b-config.yaml");
    assert!(config.contains("mode: fast"));
    assert!(!config.contains("ref+"));

    let app = t.read_file("out/c-app.yaml");
    assert!(app.contains("kind: Deployment"));
    assert!(app.contains("---"));
    assert!(app.contains("#/web/web-env/DATABASE_URL"));
    assert_file_excludes(&t.path("out/c-app.yaml"), "postgres://localhost/mydb");
}

#[test]
fn test_write_same_commit_token_everywhere() {
    let (t, recipient) = Test::with_identity();
    t.write_file("manifests/a.yaml", DATA_SECRET);
    t.write_file("manifests/b.yaml", STRING_DATA_SECRET);

    let output = t.write_age("manifests", "store.enc", "out", &recipient);
    assert_success(&output);

    let digests: std::collections::BTreeSet<String> = ["out/a.yaml", "out/b.yaml"]
        .iter()
        .flat_map(|name| {
            t.read_file(name)
                .lines()
                .filter_map(|line| line.split("digest=").nth(1))
                .map(|rest| rest.split('#').next().unwrap_or_default().to_string())
                .collect::<Vec<_>>()
        })
        .collect();
    assert_eq!(digests.len(), 1, "expected a single commit token: {:?}", digests);
}

#[test]
fn test_write_from_stdin() {
    let (t, recipient) = Test::with_identity();

    let output = t.write_age_stdin(DATA_SECRET, "store.enc", "out", &recipient);
    assert_success(&output);
    assert_stdout_contains(&output, "wrote stdin");

    let written = t.read_file("out/stdin.yaml");
    assert!(written.contains("ref+age://"));
}

#[test]
fn test_write_without_secrets_skips_store() {
    let (t, recipient) = Test::with_identity();
    t.write_file("config.yaml", CONFIG_MAP);

    let output = t.write_age("config.yaml", "store.enc", "out", &recipient);
    assert_success(&output);

    assert!(!t.path("store.enc").exists());
    assert!(t.read_file("out/config.yaml").contains("mode: fast"));
}

#[test]
fn test_write_default_output_is_temp_dir() {
    let (t, recipient) = Test::with_identity();
    t.write_file("secret.yaml", DATA_SECRET);

    let output = t
        .cmd()
        .args([
            "write",
            "-b",
            "age",
            "-p",
            "store.enc",
            "-f",
            "secret.yaml",
            "--age-recipient",
            &recipient,
        ])
        .output()
        .unwrap();
    assert_success(&output);

    let out = stdout(&output);
    let dest = out
        .split(" to ")
        .nth(1)
        .map(str::trim)
        .expect("destination in output");
    assert!(dest.contains("flux-repo-"), "got: {}", dest);
    assert!(std::path::Path::new(dest).exists());
    let _ = std::fs::remove_dir_all(std::path::Path::new(dest).parent().unwrap());
}

#[test]
fn test_write_settings_from_config_file() {
    let (t, recipient) = Test::with_identity();
    t.write_file("secret.yaml", DATA_SECRET);
    t.write_file(
        ".flux-repo.toml",
        &format!(
            "[write]\nbackend = \"age\"\npath = \"store.enc\"\noutput = \"out\"\n\n[age]\nrecipients = [\"{}\"]\n",
            recipient
        ),
    );

    let output = t.cmd().args(["write", "-f", "secret.yaml"]).output().unwrap();
    assert_success(&output);
    assert!(t.path("store.enc").exists());
    assert!(t.read_file("out/secret.yaml").contains("ref+age://store.enc"));
}

#[test]
fn test_write_last_payload_wins_drops_loser() {
    let (t, recipient) = Test::with_identity();
    t.write_file("both.yaml", CONFLICTING_SECRET);

    let output = t
        .cmd()
        .args([
            "write",
            "-b",
            "age",
            "-p",
            "store.enc",
            "-f",
            "both.yaml",
            "-o",
            "out",
            "--age-recipient",
            &recipient,
            "--last-payload-wins",
        ])
        .output()
        .unwrap();
    assert_success(&output);

    let written = t.read_file("out/both.yaml");
    assert!(written.contains("#//both/c"));
    assert!(!written.contains("Yg=="));
    assert!(!written.contains("\ndata:"));
}

#[test]
fn test_write_verbose_logs_to_stderr() {
    let (t, recipient) = Test::with_identity();
    t.write_file("secret.yaml", DATA_SECRET);

    let output = t
        .cmd()
        .args([
            "-v",
            "write",
            "-b",
            "age",
            "-p",
            "store.enc",
            "-f",
            "secret.yaml",
            "-o",
            "out",
            "--age-recipient",
            &recipient,
        ])
        .output()
        .unwrap();
    assert_success(&output);
    assert_stderr_contains(&output, "DEBUG");
    assert_stdout_excludes(&output, "DEBUG");
}

#[test]
fn test_write_leaves_other_manifests_byte_identical() {
    let deployment = "\
apiVersion: apps/v1
kind: Deployment
metadata:
  name: web
spec:
  template:
    spec:
      volumes:
      - name: creds
        secret:
          secretName: db
          defaultMode: 0644
      annotations:
        build: 0x1F
        version: 1.10
        note: 'quoted'
";
    let (t, recipient) = Test::with_identity();
    t.write_file("app.yaml", &format!("{}---\n{}", deployment, DATA_SECRET));

    let output = t.write_age("app.yaml", "store.enc", "out", &recipient);
    assert_success(&output);

    let written = t.read_file("out/app.yaml");
    assert!(written.starts_with(deployment), "got: {}", written);
}
