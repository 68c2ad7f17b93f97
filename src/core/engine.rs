//! Two-pass extraction and substitution.
//!
//! [`sanitize`] registers every Secret payload value across all manifests,
//! commits the batch with a single backend call, and then rewrites each
//! Secret so its payload holds reference strings under `stringData`.
//! Documents that are not Secrets are passed through untouched, down to
//! the same shared nodes.

use std::rc::Rc;

use tracing::{debug, info};

use crate::core::backend::Backend;
use crate::core::batch::{SealedBatch, SecretBatch};
use crate::core::codec;
use crate::core::constants::{REF_PREFIX, STRING_DATA_FIELD};
use crate::core::document::{Document, Mapping, Node, Stream};
use crate::core::locate::{locate, Conflict, PayloadField, SecretSite};
use crate::error::{Result, ValidationError};

/// One input source and its parsed documents.
#[derive(Debug, Clone)]
pub struct Manifest {
    /// Identifier used in messages and for naming the output.
    pub source: String,
    pub stream: Stream,
}

impl Manifest {
    pub fn new(source: impl Into<String>, stream: Stream) -> Self {
        Self {
            source: source.into(),
            stream,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Options {
    pub conflict: Conflict,
}

/// Replace every Secret payload in `manifests` with references.
///
/// The backend is committed at most once. When no input holds a Secret it
/// is not called at all and the manifests come back as they were.
///
/// # Errors
///
/// Returns the first validation or format error, wrapped with its source
/// and document index, before anything is stored. Backend failures abort
/// the whole run.
pub fn sanitize(
    manifests: &[Manifest],
    backend: &mut dyn Backend,
    options: Options,
) -> Result<Vec<Manifest>> {
    let mut batch = SecretBatch::new();
    let found = register_all(manifests, &mut batch, options)?;

    if found == 0 {
        info!(sources = manifests.len(), "no Secret objects found, nothing to store");
        return Ok(manifests.to_vec());
    }

    debug!(secrets = found, records = batch.len(), "registration pass done");

    let sealed = batch.commit(backend)?;
    substitute_all(manifests, &sealed, options)
}

/// Registration pass: decode and register every payload value.
///
/// Returns the number of Secret objects seen.
///
/// # Errors
///
/// Returns `ValidationError` or `FormatError` wrapped with the source and
/// document index.
pub fn register_all(
    manifests: &[Manifest],
    batch: &mut SecretBatch,
    options: Options,
) -> Result<usize> {
    let mut found = 0;
    for manifest in manifests {
        for (index, document) in manifest.stream.iter().enumerate() {
            let registered = register_document(document, batch, options)
                .map_err(|e| e.in_document(&manifest.source, index))?;
            if registered {
                found += 1;
            }
        }
    }
    Ok(found)
}

fn register_document(
    document: &Document,
    batch: &mut SecretBatch,
    options: Options,
) -> Result<bool> {
    let Some(site) = locate(document.root(), options.conflict)? else {
        return Ok(false);
    };

    for (key, raw) in payload_entries(document.root(), &site)? {
        let plaintext = codec::decode(&key, &raw, site.field)?;
        if plaintext.starts_with(REF_PREFIX) {
            return Err(ValidationError::AlreadySanitized {
                namespace: site.namespace.clone(),
                name: site.name.clone(),
                key,
            }
            .into());
        }
        batch.register(&site.namespace, &site.name, &key, plaintext);
    }

    Ok(true)
}

/// Substitution pass: rewrite every Secret with references from `sealed`.
///
/// # Errors
///
/// Returns `StoreError::Unregistered` if a payload key was not registered
/// before the commit, wrapped with the source and document index.
pub fn substitute_all(
    manifests: &[Manifest],
    sealed: &SealedBatch<'_>,
    options: Options,
) -> Result<Vec<Manifest>> {
    manifests
        .iter()
        .map(|manifest| -> Result<Manifest> {
            let stream = manifest
                .stream
                .iter()
                .enumerate()
                .map(|(index, document)| {
                    substitute_document(document, sealed, options)
                        .map_err(|e| e.in_document(&manifest.source, index))
                })
                .collect::<Result<Stream>>()?;
            Ok(Manifest::new(manifest.source.clone(), stream))
        })
        .collect()
}

fn substitute_document(
    document: &Document,
    sealed: &SealedBatch<'_>,
    options: Options,
) -> Result<Document> {
    let Some(site) = locate(document.root(), options.conflict)? else {
        return Ok(document.clone());
    };
    let Some(root) = document.root().as_mapping() else {
        return Ok(document.clone());
    };
    let Some((field_key, payload)) = root.entry(site.index) else {
        return Ok(document.clone());
    };

    let mut references = Mapping::new();
    if let Some(payload) = payload.as_mapping() {
        for (key, _) in payload.iter() {
            let name = key_text(key, &site)?;
            let reference = sealed.reference(&site.namespace, &site.name, &name)?;
            references.push_shared(Rc::clone(key), Rc::new(Node::string(reference)));
        }
    }

    let key = match site.field {
        PayloadField::Data => Rc::new(Node::string(STRING_DATA_FIELD)),
        PayloadField::StringData => Rc::clone(field_key),
    };

    debug!(
        namespace = %site.namespace,
        name = %site.name,
        keys = references.len(),
        "substituted references"
    );

    let mut rewritten = root.replace_entry(site.index, key, Rc::new(Node::Mapping(references)));
    // the losing payload still holds plaintext
    if let Some(shadowed) = site.shadowed {
        rewritten = rewritten.without_entry(shadowed);
    }
    Ok(Document::new(Node::Mapping(rewritten)))
}

/// Key and source text of each payload entry.
///
/// A null payload (`data:` with nothing under it) has no entries.
fn payload_entries(root: &Node, site: &SecretSite) -> Result<Vec<(String, String)>> {
    let payload = root
        .as_mapping()
        .and_then(|m| m.entry(site.index))
        .map(|(_, value)| value);

    let Some(payload) = payload.filter(|p| !p.is_null()) else {
        return Ok(Vec::new());
    };

    let mapping = payload.as_mapping().ok_or_else(|| ValidationError::PayloadNotMapping {
        name: site.name.clone(),
        field: site.field.key(),
    })?;

    mapping
        .iter()
        .map(|(key, value)| -> Result<(String, String)> {
            let key = key_text(key, site)?;
            let value = value
                .as_scalar()
                .ok_or_else(|| ValidationError::NonScalarValue {
                    name: site.name.clone(),
                    key: key.clone(),
                })?
                .value()
                .into_owned();
            Ok((key, value))
        })
        .collect()
}

fn key_text(key: &Node, site: &SecretSite) -> Result<String> {
    key.as_scalar()
        .map(|s| s.value().into_owned())
        .ok_or_else(|| {
            ValidationError::NonScalarValue {
                name: site.name.clone(),
                key: "<complex key>".to_string(),
            }
            .into()
        })
}
