//! Input enumeration and output writing.

use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::core::constants::{ENCRYPTED_EXT, STDIN_OUTPUT, STDIN_SENTINEL, TEMP_DIR_PREFIX};
use crate::core::document::{parse_stream, serialize_stream};
use crate::core::engine::Manifest;
use crate::error::{ConfigError, Error, Result};

/// Where a manifest stream comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Stdin,
    File(PathBuf),
}

impl Source {
    /// Identifier used in messages.
    pub fn id(&self) -> String {
        match self {
            Source::Stdin => "stdin".to_string(),
            Source::File(path) => path.display().to_string(),
        }
    }

    /// True for store files written by the file backends.
    pub fn is_store_file(&self) -> bool {
        match self {
            Source::Stdin => false,
            Source::File(path) => path.extension().is_some_and(|ext| ext == ENCRYPTED_EXT),
        }
    }
}

/// List the input sources named by `path`.
///
/// `-` is stdin. A directory yields its regular files, sorted by name;
/// subdirectories are skipped.
///
/// # Errors
///
/// Returns `ConfigError::MissingField` for an empty path, and an IO error
/// if the path does not exist or cannot be listed.
pub fn enumerate(path: &str) -> Result<Vec<Source>> {
    if path.is_empty() {
        return Err(ConfigError::MissingField { field: "file" }.into());
    }
    if path == STDIN_SENTINEL {
        return Ok(vec![Source::Stdin]);
    }

    let root = Path::new(path);
    let metadata = std::fs::metadata(root).map_err(|e| Error::from(e).in_source(path))?;
    if !metadata.is_dir() {
        return Ok(vec![Source::File(root.to_path_buf())]);
    }

    let mut files = Vec::new();
    let entries = std::fs::read_dir(root).map_err(|e| Error::from(e).in_source(path))?;
    for entry in entries {
        let entry = entry.map_err(|e| Error::from(e).in_source(path))?;
        let file_type = entry.file_type().map_err(|e| Error::from(e).in_source(path))?;
        if file_type.is_dir() {
            trace!(path = %entry.path().display(), "skipping subdirectory");
            continue;
        }
        files.push(entry.path());
    }
    files.sort();

    debug!(dir = path, files = files.len(), "enumerated input directory");
    Ok(files.into_iter().map(Source::File).collect())
}

/// Read and parse every source.
///
/// # Errors
///
/// Returns IO and parse errors wrapped with the source id.
pub fn load(sources: &[Source]) -> Result<Vec<Manifest>> {
    sources
        .iter()
        .map(|source| -> Result<Manifest> {
            let text = read_source(source).map_err(|e| e.in_source(source.id()))?;
            let stream = parse_stream(&text).map_err(|e| e.in_source(source.id()))?;
            trace!(source = %source.id(), documents = stream.len(), "loaded source");
            Ok(Manifest::new(source.id(), stream))
        })
        .collect()
}

fn read_source(source: &Source) -> Result<String> {
    match source {
        Source::Stdin => {
            let mut text = String::new();
            std::io::stdin().read_to_string(&mut text)?;
            Ok(text)
        }
        Source::File(path) => Ok(std::fs::read_to_string(path)?),
    }
}

/// Output file name for `source`, relative to the output directory.
///
/// Files under a directory input keep their path below `root`. A single
/// file keeps its file name and stdin becomes `stdin.yaml`.
pub fn relative_name(source: &Source, root: &Path) -> PathBuf {
    match source {
        Source::Stdin => PathBuf::from(STDIN_OUTPUT),
        Source::File(path) => path
            .strip_prefix(root)
            .ok()
            .filter(|rel| !rel.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .or_else(|| path.file_name().map(PathBuf::from))
            .unwrap_or_else(|| path.clone()),
    }
}

/// Resolve the output directory, creating it if needed.
///
/// Without an explicit directory a fresh `flux-repo-*` directory is made
/// under the system temp dir and kept after the process exits.
///
/// # Errors
///
/// Returns an IO error if the directory cannot be created.
pub fn output_dir(dir: Option<&Path>) -> Result<PathBuf> {
    match dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            Ok(dir.to_path_buf())
        }
        None => {
            let tmp = tempfile::Builder::new().prefix(TEMP_DIR_PREFIX).tempdir()?;
            Ok(tmp.keep())
        }
    }
}

/// A rendered output, ready to be written.
#[derive(Debug, Clone)]
pub struct Output {
    /// Id of the source it was produced from.
    pub source: String,
    /// Path relative to the output directory.
    pub name: PathBuf,
    pub contents: String,
}

/// Render every manifest before anything is written.
///
/// `sources` and `manifests` are parallel, as returned by [`load`].
pub fn render_all(sources: &[Source], manifests: &[Manifest], root: &Path) -> Vec<Output> {
    sources
        .iter()
        .zip(manifests)
        .map(|(source, manifest)| Output {
            source: manifest.source.clone(),
            name: relative_name(source, root),
            contents: serialize_stream(&manifest.stream),
        })
        .collect()
}

/// Write rendered outputs under `dir`, returning each destination path.
///
/// # Errors
///
/// Returns an IO error wrapped with the destination path.
pub fn write_all(dir: &Path, outputs: &[Output]) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;

    let mut written = Vec::with_capacity(outputs.len());
    for output in outputs {
        let dest = dir.join(&output.name);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::from(e).in_source(dest.display().to_string()))?;
        }
        std::fs::write(&dest, &output.contents)
            .map_err(|e| Error::from(e).in_source(dest.display().to_string()))?;
        debug!(source = %output.source, dest = %dest.display(), "wrote output");
        written.push(dest);
    }
    Ok(written)
}
