//! Write command.
//!
//! Reads manifests, stores every Secret payload in one backend commit, and
//! writes sanitized copies in which each value is a reference.

use std::path::{Path, PathBuf};

use clap::Args;
use tracing::debug;

use crate::cli::output;
use crate::core::backend::{self, BackendKind};
use crate::core::config::{Config, VaultAuth};
use crate::core::engine::{self, Options};
use crate::core::files;
use crate::core::locate::Conflict;
use crate::error::Result;

#[derive(Args, Debug, Default)]
pub struct WriteArgs {
    /// Path of the secret in the store (file path for sops and age)
    #[arg(short = 'p', long = "path", value_name = "PATH")]
    pub path: Option<String>,

    /// Manifest file or directory, or - for stdin
    #[arg(short = 'f', long = "file", default_value = "-", value_name = "INPUT")]
    pub file: String,

    /// Output directory (default: a new temporary directory)
    #[arg(short = 'o', long = "output", value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Store backend
    #[arg(short = 'b', long = "backend", value_enum)]
    pub backend: Option<BackendKind>,

    /// AWS region for the AWS backends
    #[arg(long)]
    pub aws_region: Option<String>,

    /// AWS profile for the AWS backends and sops
    #[arg(long)]
    pub aws_profile: Option<String>,

    /// KMS key ARN sops encrypts with
    #[arg(long)]
    pub aws_kms_key_arn: Option<String>,

    /// KMS encryption context for sops, as key:value pairs
    #[arg(long)]
    pub encryption_context: Option<String>,

    /// age public key to encrypt for (repeatable)
    #[arg(long = "age-recipient", value_name = "AGE_KEY")]
    pub age_recipients: Vec<String>,

    /// Vault server address
    #[arg(long)]
    pub vault_addr: Option<String>,

    /// Vault authentication method
    #[arg(long, value_enum)]
    pub vault_auth_method: Option<VaultAuth>,

    /// Accept Secrets with both data and stringData, keeping the last one
    #[arg(long)]
    pub last_payload_wins: bool,
}

impl WriteArgs {
    /// Apply command-line flags on top of the loaded config.
    pub fn apply(&self, config: &mut Config) {
        if let Some(path) = &self.path {
            config.write.path = Some(path.clone());
        }
        if let Some(output) = &self.output {
            config.write.output = Some(output.clone());
        }
        if let Some(backend) = self.backend {
            config.write.backend = Some(backend);
        }
        if self.last_payload_wins {
            config.write.last_payload_wins = true;
        }
        if let Some(region) = &self.aws_region {
            config.aws.region = Some(region.clone());
        }
        if let Some(profile) = &self.aws_profile {
            config.aws.profile = Some(profile.clone());
        }
        if let Some(arn) = &self.aws_kms_key_arn {
            config.sops.kms_key_arn = Some(arn.clone());
        }
        if let Some(context) = &self.encryption_context {
            config.sops.encryption_context = Some(context.clone());
        }
        if !self.age_recipients.is_empty() {
            config.age.recipients = self.age_recipients.clone();
            config.sops.age_recipients = self.age_recipients.clone();
        }
        if let Some(addr) = &self.vault_addr {
            config.vault.address = Some(addr.clone());
        }
        if let Some(method) = self.vault_auth_method {
            config.vault.auth_method = method;
        }
    }
}

/// Execute the write command.
pub fn execute(args: &WriteArgs, mut config: Config) -> Result<()> {
    args.apply(&mut config);

    // backend settings are checked before any input is read
    let path = config.validate_write()?.to_string();
    let kind = config.backend();
    let mut store = backend::build(kind, &path, &config)?;

    let sources = files::enumerate(&args.file)?;
    let manifests = files::load(&sources)?;
    debug!(backend = %kind, sources = sources.len(), "loaded inputs");

    let options = Options {
        conflict: if config.write.last_payload_wins {
            Conflict::LastWins
        } else {
            Conflict::Reject
        },
    };

    let dir = files::output_dir(config.write.output.as_deref())?;
    let sanitized = engine::sanitize(&manifests, store.as_mut(), options)?;
    let outputs = files::render_all(&sources, &sanitized, Path::new(&args.file));
    let written = files::write_all(&dir, &outputs)?;

    for (output, dest) in outputs.iter().zip(&written) {
        output::success(&format!(
            "wrote {} to {}",
            output.source,
            output::path(&dest.display().to_string())
        ));
    }

    if written.is_empty() {
        output::warn(&format!("no manifests found in {}", args.file));
    }

    Ok(())
}
