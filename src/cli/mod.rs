//! Command-line interface.

pub mod completions;
pub mod output;
pub mod read;
pub mod write;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::core::config::Config;

/// flux-repo - keep Kubernetes Secrets out of your GitOps repository.
#[derive(Parser)]
#[command(
    name = "flux-repo",
    about = "Move Kubernetes Secret payloads into a secret store and back",
    version
)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file (default: .flux-repo.toml when present)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand)]
pub enum Command {
    /// Store Secret payloads and write manifests that reference them
    Write(write::WriteArgs),

    /// Print manifests with every reference resolved to plaintext
    Read(read::ReadArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completions.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

/// Execute a command.
pub fn execute(command: Command, config: Option<PathBuf>) -> crate::error::Result<()> {
    match command {
        Command::Write(args) => write::execute(&args, Config::load(config.as_deref())?),
        Command::Read(args) => read::execute(&args, &Config::load(config.as_deref())?),
        Command::Completions { shell } => completions::execute(shell),
    }
}
