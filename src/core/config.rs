//! Configuration file management.
//!
//! Handles reading and validating the optional `.flux-repo.toml` file.
//! Command-line flags are merged on top of it by the CLI layer.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::core::backend::BackendKind;
use crate::core::constants;
use crate::error::{ConfigError, Result};

/// Project configuration stored in `.flux-repo.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Settings for `flux-repo write`
    pub write: WriteConfig,
    /// AWS session settings shared by the AWS backends and sops
    pub aws: AwsConfig,
    /// sops encrypted-file backend
    pub sops: SopsConfig,
    /// Native age encrypted-file backend
    pub age: AgeConfig,
    /// Vault KV v2 backend
    pub vault: VaultConfig,
}

/// Defaults for the `write` command.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WriteConfig {
    /// Store backend: awssecrets (default), awsssm, s3, vault, sops, age
    pub backend: Option<BackendKind>,
    /// Path of the secret in the store (`-p`)
    pub path: Option<String>,
    /// Output directory (`-o`)
    pub output: Option<PathBuf>,
    /// Accept Secrets carrying both data and stringData, keeping the last
    pub last_payload_wins: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AwsConfig {
    pub region: Option<String>,
    pub profile: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SopsConfig {
    /// AWS KMS key ARN (`arn:aws:kms:...`)
    pub kms_key_arn: Option<String>,
    /// KMS encryption context, `key:value` pairs separated by commas
    pub encryption_context: Option<String>,
    /// age public keys to encrypt for, in addition to or instead of KMS
    pub age_recipients: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AgeConfig {
    /// age public keys (`age1...`) the store file is encrypted for
    pub recipients: Vec<String>,
    /// Identity file used by `read` to decrypt the store file
    pub identity: Option<PathBuf>,
}

/// Vault authentication method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum VaultAuth {
    #[default]
    Token,
    Approle,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VaultConfig {
    /// Server address; falls back to `VAULT_ADDR`
    pub address: Option<String>,
    pub auth_method: VaultAuth,
    /// Environment variable holding the token
    pub token_env: Option<String>,
    /// File holding the token
    pub token_file: Option<PathBuf>,
    pub role_id: Option<String>,
    pub secret_id: Option<String>,
}

impl Config {
    /// Load configuration.
    ///
    /// With an explicit `path` the file must exist. Without one,
    /// `.flux-repo.toml` in the current directory is used when present and
    /// defaults apply otherwise.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ReadFile` if the file cannot be read, or
    /// `ConfigError::Parse` if the TOML is malformed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let default = PathBuf::from(constants::CONFIG_FILE);
                if !default.exists() {
                    debug!("no config file, using defaults");
                    return Ok(Self::default());
                }
                default
            }
        };

        debug!(path = %path.display(), "loading config");
        let contents = std::fs::read_to_string(&path).map_err(ConfigError::ReadFile)?;
        Self::parse(&contents)
    }

    /// Parse configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` if the TOML is malformed or has unknown keys.
    pub fn parse(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents).map_err(ConfigError::Parse)?;
        Ok(config)
    }

    /// Backend selected for `write`, defaulting to `awssecrets`.
    pub fn backend(&self) -> BackendKind {
        self.write.backend.unwrap_or_default()
    }

    /// Validate the settings `write` needs before any input is read.
    ///
    /// Backend-specific requirements are checked when the backend is built.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingField` if no store path is set.
    pub fn validate_write(&self) -> Result<&str> {
        match self.write.path.as_deref() {
            Some(p) if !p.trim().is_empty() => Ok(p),
            _ => Err(ConfigError::MissingField { field: "path (-p)" }.into()),
        }
    }

    /// Identity file for decrypting age store files.
    ///
    /// Checked in order: config, `FLUX_REPO_AGE_IDENTITY`, then
    /// `~/.flux-repo/identity.key`.
    pub fn age_identity_path(&self) -> Option<PathBuf> {
        if let Some(p) = &self.age.identity {
            return Some(p.clone());
        }
        if let Ok(p) = std::env::var(constants::AGE_IDENTITY_ENV) {
            if !p.is_empty() {
                return Some(PathBuf::from(p));
            }
        }
        dirs::home_dir().map(|home| {
            home.join(constants::AGE_IDENTITY_DIR)
                .join(constants::AGE_IDENTITY_FILE)
        })
    }
}
