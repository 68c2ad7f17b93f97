//! flux-repo - keep Kubernetes Secret payloads out of GitOps repositories.

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use flux_repo::cli::output;
use flux_repo::cli::{execute, Cli};
use flux_repo::error::{ConfigError, Error, ResolveError, ValidationError};

fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber with env-filter support
    let filter = EnvFilter::try_from_env("FLUX_REPO_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("flux_repo=debug")
        } else {
            EnvFilter::new("flux_repo=warn")
        }
    });

    // stdout carries `read` output, so logs go to stderr
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .init();

    if let Err(e) = execute(cli.command, cli.config) {
        output::error(&e.to_string());
        if let Some(hint) = hint(&e) {
            output::hint(hint);
        }
        std::process::exit(1);
    }
}

/// Suggested next step for common failures.
fn hint(error: &Error) -> Option<&'static str> {
    match error.root() {
        Error::Config(ConfigError::MissingField { field: "path (-p)" }) => {
            Some("pass -p <path> or set [write] path in .flux-repo.toml")
        }
        Error::Validation(ValidationError::AlreadySanitized { .. }) => {
            Some("this manifest was already written by flux-repo; use: flux-repo read")
        }
        Error::Resolve(ResolveError::Stale { .. }) => {
            Some("re-run flux-repo write to regenerate the manifests")
        }
        Error::Resolve(ResolveError::Unavailable { scheme: "age", .. }) => {
            Some("set FLUX_REPO_AGE_IDENTITY or [age] identity to your age identity file")
        }
        Error::Resolve(ResolveError::Unavailable { scheme: "sops", .. }) => {
            Some("check that sops is installed and can reach the decryption key")
        }
        _ => None,
    }
}
