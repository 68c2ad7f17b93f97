//! sops encrypted-file backend.
//!
//! Encrypts the batch with the `sops` CLI and writes the result to a local
//! `.enc` file that can be committed next to the manifests.
//!
//! ## Requirements
//!
//! - `sops` CLI must be installed
//! - AWS credentials for the KMS key, or age recipients
//! - The matching private key for `read`
//!
//! ## Usage
//!
//! ```toml
//! [write]
//! backend = "sops"
//! path = "secrets/prod.enc"
//!
//! [sops]
//! kms_key_arn = "arn:aws:kms:eu-west-1:123456789012:key/abcd"
//! encryption_context = "team:platform"
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, trace};
use zeroize::Zeroizing;

use super::{Backend, CommitToken};
use crate::core::backend::age::require_enc_extension;
use crate::core::batch::{render_yaml, Secrets};
use crate::core::config::{AwsConfig, SopsConfig};
use crate::core::resolver::Reference;
use crate::error::{ConfigError, ResolveError, Result, StoreError};

const NAME: &str = "sops";
const KMS_ARN_PREFIX: &str = "arn:aws:kms:";

/// Keys left in plaintext by sops. Nothing in the stored document uses it.
const UNENCRYPTED_SUFFIX: &str = "__unenc";

/// sops-encrypted store file.
pub struct SopsFile {
    path: String,
    kms_key_arn: Option<String>,
    encryption_context: Option<String>,
    age_recipients: Vec<String>,
    aws_profile: Option<String>,
}

impl SopsFile {
    /// Create the backend for the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if `path` does not end in `.enc`,
    /// the KMS key is not an ARN, or the encryption context is malformed.
    /// Returns `ConfigError::MissingField` if neither a KMS key nor age
    /// recipients are set.
    pub fn new(path: &str, sops: &SopsConfig, aws: &AwsConfig) -> Result<Self> {
        require_enc_extension(path)?;

        if let Some(arn) = &sops.kms_key_arn {
            if !arn.starts_with(KMS_ARN_PREFIX) {
                return Err(ConfigError::InvalidValue {
                    field: "KMS key (--aws-kms-key-arn)",
                    reason: format!("{:?} must start with {:?}", arn, KMS_ARN_PREFIX),
                }
                .into());
            }
        } else if sops.age_recipients.is_empty() {
            return Err(ConfigError::MissingField {
                field: "KMS key (--aws-kms-key-arn) or age recipients (--age-recipient)",
            }
            .into());
        }

        if let Some(context) = &sops.encryption_context {
            validate_encryption_context(context)?;
        }

        Ok(Self {
            path: path.to_string(),
            kms_key_arn: sops.kms_key_arn.clone(),
            encryption_context: sops.encryption_context.clone(),
            age_recipients: sops.age_recipients.clone(),
            aws_profile: aws.profile.clone(),
        })
    }

    fn encrypt_command(&self, sops: &Path) -> Command {
        let mut cmd = Command::new(sops);
        cmd.args([
            "--encrypt",
            "--input-type",
            "yaml",
            "--output-type",
            "yaml",
            "--unencrypted-suffix",
            UNENCRYPTED_SUFFIX,
        ]);
        if let Some(arn) = &self.kms_key_arn {
            cmd.args(["--kms", arn]);
        }
        if let Some(context) = &self.encryption_context {
            cmd.args(["--encryption-context", context]);
        }
        if let Some(profile) = &self.aws_profile {
            cmd.args(["--aws-profile", profile]);
        }
        if !self.age_recipients.is_empty() {
            cmd.args(["--age", &self.age_recipients.join(",")]);
        }
        cmd.arg("/dev/stdin");
        cmd
    }
}

impl Backend for SopsFile {
    fn name(&self) -> &'static str {
        NAME
    }

    fn commit(&mut self, secrets: &Secrets) -> Result<CommitToken> {
        let plaintext = render_yaml(secrets)?;
        let sops = find_sops().map_err(commit_failed)?;

        trace!(path = %self.path, plaintext_len = plaintext.len(), "encrypting with sops");

        let mut child = self
            .encrypt_command(&sops)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| commit_failed(format!("failed to spawn sops: {}", e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(plaintext.as_bytes())
                .map_err(|e| commit_failed(format!("failed to write plaintext: {}", e)))?;
        }

        let output = child
            .wait_with_output()
            .map_err(|e| commit_failed(format!("sops command failed: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(commit_failed(format!("sops encrypt failed: {}", stderr.trim())));
        }

        let path = Path::new(&self.path);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| commit_failed(format!("creating {}: {}", parent.display(), e)))?;
        }
        std::fs::write(path, &output.stdout)
            .map_err(|e| commit_failed(format!("writing file to {}: {}", self.path, e)))?;

        debug!(path = %self.path, "wrote sops store file");
        Ok(CommitToken::default())
    }

    fn format_ref(&self, namespace: &str, name: &str, key: &str, _token: &CommitToken) -> String {
        format!("ref+sops://{}#/{}/{}/{}", self.path, namespace, name, key)
    }
}

/// Decrypt the store file a reference points at.
///
/// # Errors
///
/// Returns `ResolveError::Unavailable` if `sops` is missing or decryption
/// fails.
pub fn fetch(reference: &Reference) -> Result<Zeroizing<String>> {
    let sops = find_sops().map_err(unavailable)?;

    trace!(path = %reference.location, "decrypting with sops");

    let output = Command::new(sops)
        .args([
            "--decrypt",
            "--input-type",
            "yaml",
            "--output-type",
            "yaml",
            &reference.location,
        ])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| unavailable(format!("sops command failed: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(unavailable(format!(
            "sops decrypt of {} failed: {}",
            reference.location,
            stderr.trim()
        )));
    }

    String::from_utf8(output.stdout)
        .map(Zeroizing::new)
        .map_err(|_| unavailable("decrypted store is not UTF-8".to_string()))
}

fn find_sops() -> std::result::Result<PathBuf, String> {
    which::which("sops").map_err(|_| {
        "sops CLI not found. Install it from https://github.com/getsops/sops/releases".to_string()
    })
}

/// Check a KMS encryption context of `key:value` pairs joined by commas.
fn validate_encryption_context(context: &str) -> Result<()> {
    let valid = context.split(',').all(|pair| {
        pair.split_once(':')
            .is_some_and(|(k, v)| !k.trim().is_empty() && !v.trim().is_empty())
    });
    if valid {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            field: "encryption context (--encryption-context)",
            reason: format!("{:?} must be key:value pairs separated by commas", context),
        }
        .into())
    }
}

fn commit_failed(reason: String) -> crate::error::Error {
    StoreError::CommitFailed {
        backend: NAME,
        reason,
    }
    .into()
}

fn unavailable(reason: String) -> crate::error::Error {
    ResolveError::Unavailable {
        scheme: NAME,
        reason,
    }
    .into()
}
