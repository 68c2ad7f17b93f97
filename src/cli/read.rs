//! Read command.
//!
//! Prints manifests with every reference resolved, ready for
//! `kubectl apply -f -`.

use std::io::Write;

use clap::Args;
use tracing::debug;

use crate::core::config::Config;
use crate::core::document::{serialize_stream, Document};
use crate::core::files;
use crate::core::resolver::Runtime;
use crate::core::restore;
use crate::error::Result;

#[derive(Args, Debug)]
pub struct ReadArgs {
    /// Manifest file or directory written by `flux-repo write`, or - for stdin
    #[arg(default_value = "-", value_name = "INPUT")]
    pub input: String,
}

/// Execute the read command.
///
/// Output is produced only after every reference resolved.
pub fn execute(args: &ReadArgs, config: &Config) -> Result<()> {
    let sources: Vec<_> = files::enumerate(&args.input)?
        .into_iter()
        .filter(|source| {
            let skip = source.is_store_file();
            if skip {
                debug!(source = %source.id(), "skipping store file");
            }
            !skip
        })
        .collect();

    let manifests = files::load(&sources)?;

    let mut runtime = Runtime::new(config);
    let restored = restore::restore_all(&manifests, &mut runtime)?;
    debug!(stores = runtime.fetched(), "resolved references");

    let documents: Vec<Document> = restored.into_iter().flat_map(|m| m.stream).collect();
    let text = serialize_stream(&documents);

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(text.as_bytes())?;
    stdout.flush()?;
    Ok(())
}
