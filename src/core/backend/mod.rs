//! Secret store backends.
//!
//! A backend stores a whole [`Secrets`] batch in one call and knows how to
//! format reference strings that point back into what it stored. Each
//! backend module also provides the matching `fetch` used by the resolver
//! to read a stored batch back.
//!
//! ## Backends
//!
//! - **awssecrets**: AWS Secrets Manager. Feature-gated (`aws`).
//! - **awsssm**: AWS SSM Parameter Store, SecureString. Feature-gated (`aws`).
//! - **s3**: versioned S3 object. Feature-gated (`aws`).
//! - **vault**: HashiCorp Vault KV v2. Feature-gated (`vault`).
//! - **sops**: file encrypted by the `sops` CLI (AWS KMS or age keys).
//! - **age**: file encrypted natively with age x25519 recipients.
//!
//! ## Adding a New Backend
//!
//! 1. Implement the `Backend` trait
//! 2. Add a `fetch` function for its reference scheme
//! 3. Feature-gate if it pulls in an SDK
//! 4. Register it in `BackendKind`, `build`, and the resolver dispatch

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::batch::Secrets;
use crate::core::config::Config;
use crate::error::Result;

pub mod age;
pub mod sops;

#[cfg(feature = "aws")]
pub mod aws;

#[cfg(feature = "aws")]
pub mod awssecrets;

#[cfg(feature = "aws")]
pub mod awsssm;

#[cfg(feature = "aws")]
pub mod s3;

#[cfg(feature = "vault")]
pub mod vault;

/// Store-assigned identifier of one committed batch.
///
/// Embedded in every reference string of that batch. Backends without
/// versioning return an empty token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitToken(String);

impl CommitToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommitToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Secret store backend trait.
pub trait Backend {
    /// Backend name for logs and messages.
    fn name(&self) -> &'static str;

    /// Durably store the whole batch.
    ///
    /// Called exactly once per `write`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store rejects the batch or is unreachable.
    fn commit(&mut self, secrets: &Secrets) -> Result<CommitToken>;

    /// Reference string for one value of a committed batch.
    fn format_ref(&self, namespace: &str, name: &str, key: &str, token: &CommitToken) -> String;
}

/// The closed set of store backends, selected with `-b`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// AWS Secrets Manager
    #[default]
    Awssecrets,
    /// AWS SSM Parameter Store
    Awsssm,
    /// Versioned AWS S3 object
    S3,
    /// HashiCorp Vault KV v2
    Vault,
    /// sops-encrypted file
    Sops,
    /// age-encrypted file
    Age,
}

impl BackendKind {
    /// Reference scheme written by this backend.
    pub fn scheme(self) -> &'static str {
        match self {
            BackendKind::Awssecrets => "awssecrets",
            BackendKind::Awsssm => "awsssm",
            BackendKind::S3 => "s3",
            BackendKind::Vault => "vault",
            BackendKind::Sops => "sops",
            BackendKind::Age => "age",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.scheme())
    }
}

/// Create the backend selected by `kind` for the store `path`.
///
/// # Errors
///
/// Returns `ConfigError` if backend settings are missing or invalid, or if
/// the backend's feature was not compiled in.
#[allow(unused_variables)]
pub fn build(kind: BackendKind, path: &str, config: &Config) -> Result<Box<dyn Backend>> {
    #[cfg(not(feature = "aws"))]
    use crate::error::ConfigError;

    match kind {
        BackendKind::Age => Ok(Box::new(age::AgeFile::new(path, &config.age)?)),
        BackendKind::Sops => Ok(Box::new(sops::SopsFile::new(path, &config.sops, &config.aws)?)),
        BackendKind::Awssecrets => {
            #[cfg(feature = "aws")]
            {
                Ok(Box::new(awssecrets::SecretsManager::new(path, &config.aws)))
            }
            #[cfg(not(feature = "aws"))]
            {
                Err(ConfigError::FeatureDisabled {
                    backend: "awssecrets",
                    feature: "aws",
                }
                .into())
            }
        }
        BackendKind::Awsssm => {
            #[cfg(feature = "aws")]
            {
                Ok(Box::new(awsssm::ParameterStore::new(path, &config.aws)))
            }
            #[cfg(not(feature = "aws"))]
            {
                Err(ConfigError::FeatureDisabled {
                    backend: "awsssm",
                    feature: "aws",
                }
                .into())
            }
        }
        BackendKind::S3 => {
            #[cfg(feature = "aws")]
            {
                Ok(Box::new(s3::S3Object::new(path, &config.aws)?))
            }
            #[cfg(not(feature = "aws"))]
            {
                Err(ConfigError::FeatureDisabled {
                    backend: "s3",
                    feature: "aws",
                }
                .into())
            }
        }
        BackendKind::Vault => {
            #[cfg(feature = "vault")]
            {
                Ok(Box::new(vault::VaultKv::new(path, &config.vault)?))
            }
            #[cfg(not(feature = "vault"))]
            {
                Err(crate::error::ConfigError::FeatureDisabled {
                    backend: "vault",
                    feature: "vault",
                }
                .into())
            }
        }
    }
}

/// Single-threaded runtime for the async SDK clients.
#[cfg(any(feature = "aws", feature = "vault"))]
pub(crate) fn runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
}
