/// Skip a test if the sops CLI is not installed.
#[macro_export]
macro_rules! skip_without_sops {
    () => {
        if which::which("sops").is_err() {
            eprintln!("SKIPPED: sops CLI not installed");
            return;
        }
    };
}

/// Skip a test if AWS credentials are not configured.
#[macro_export]
macro_rules! skip_without_aws {
    () => {
        if std::env::var("AWS_ACCESS_KEY_ID").is_err() {
            eprintln!("SKIPPED: AWS_ACCESS_KEY_ID not set");
            return;
        }
        if std::env::var("FLUX_REPO_TEST_AWS_PATH").is_err() {
            eprintln!("SKIPPED: FLUX_REPO_TEST_AWS_PATH not set (secret name to write to)");
            return;
        }
    };
}
