//! Command helper methods for Test.

use super::Test;
use assert_cmd::Command;
use std::process::Output;

impl Test {
    /// Create a flux-repo command with correct environment variables.
    ///
    /// Returns a Command configured with:
    /// - HOME set to the temporary home directory
    /// - Current directory set to the test project directory
    /// - No color and no inherited store settings
    pub fn cmd(&self) -> Command {
        #[allow(deprecated)]
        let mut cmd = Command::cargo_bin("flux-repo").expect("failed to find flux-repo binary");
        cmd.env("HOME", self.home.path());
        // Windows uses USERPROFILE instead of HOME for home directory
        cmd.env("USERPROFILE", self.home.path());
        cmd.env("NO_COLOR", "1");
        cmd.env_remove("FLUX_REPO_AGE_IDENTITY");
        cmd.env_remove("FLUX_REPO_LOG");
        cmd.env_remove("VAULT_ADDR");
        cmd.env_remove("VAULT_TOKEN");
        cmd.current_dir(self.dir.path());
        cmd
    }

    /// Shortcut for `flux-repo write -b age`.
    pub fn write_age(&self, input: &str, store: &str, out: &str, recipient: &str) -> Output {
        self.cmd()
            .args([
                "write",
                "-b",
                "age",
                "-p",
                store,
                "-f",
                input,
                "-o",
                out,
                "--age-recipient",
                recipient,
            ])
            .output()
            .expect("failed to run flux-repo write")
    }

    /// Shortcut for `flux-repo write` reading manifests from stdin.
    pub fn write_age_stdin(&self, stdin: &str, store: &str, out: &str, recipient: &str) -> Output {
        self.cmd()
            .args([
                "write",
                "-b",
                "age",
                "-p",
                store,
                "-o",
                out,
                "--age-recipient",
                recipient,
            ])
            .write_stdin(stdin)
            .output()
            .expect("failed to run flux-repo write")
    }

    /// Shortcut for `flux-repo read`.
    pub fn read(&self, input: &str) -> Output {
        self.cmd()
            .args(["read", input])
            .output()
            .expect("failed to run flux-repo read")
    }
}
