//! Reference restoration for `read`.
//!
//! The inverse of substitution: every `stringData` value of a Secret must be
//! a reference string, and each one is swapped for the plaintext it points
//! at. The payload stays under `stringData`.

use std::rc::Rc;

use tracing::debug;

use crate::core::constants::REF_PREFIX;
use crate::core::document::{Document, Mapping, Node};
use crate::core::engine::Manifest;
use crate::core::locate::locate_string_data;
use crate::core::resolver::Resolve;
use crate::error::{FormatError, Result, ValidationError};

/// Restore one document.
///
/// Documents that are not Secrets are returned as they are.
///
/// # Errors
///
/// Returns `FormatError::MissingStringData` for a Secret without
/// `stringData`, `FormatError::NotAReference` for a value that is not a
/// reference, and any error from the resolver.
pub fn restore(document: &Document, resolver: &mut dyn Resolve) -> Result<Document> {
    let Some(located) = locate_string_data(document.root()) else {
        return Ok(document.clone());
    };
    let index = located.ok_or(FormatError::MissingStringData)?;

    let Some(root) = document.root().as_mapping() else {
        return Ok(document.clone());
    };
    let Some((field_key, payload)) = root.entry(index) else {
        return Ok(document.clone());
    };

    let mut restored = Mapping::new();
    if !payload.is_null() {
        let entries = payload
            .as_mapping()
            .ok_or_else(|| ValidationError::PayloadNotMapping {
                name: secret_name(root),
                field: "stringData",
            })?;

        for (key, value) in entries.iter() {
            let key_text = key
                .as_scalar()
                .map(|s| s.value().into_owned())
                .unwrap_or_default();
            let reference = value
                .as_scalar()
                .map(|s| s.value().into_owned())
                .ok_or_else(|| ValidationError::NonScalarValue {
                    name: secret_name(root),
                    key: key_text.clone(),
                })?;

            if !reference.starts_with(REF_PREFIX) {
                return Err(FormatError::NotAReference {
                    key: key_text,
                    value: reference,
                }
                .into());
            }

            let plaintext = resolver.resolve(&reference)?;
            restored.push_shared(Rc::clone(key), Rc::new(Node::string(plaintext)));
        }
    }

    debug!(keys = restored.len(), "restored secret");

    let rewritten =
        root.replace_entry(index, Rc::clone(field_key), Rc::new(Node::Mapping(restored)));
    Ok(Document::new(Node::Mapping(rewritten)))
}

/// Restore every document of every manifest.
///
/// # Errors
///
/// Returns the first failure wrapped with its source and document index.
pub fn restore_all(manifests: &[Manifest], resolver: &mut dyn Resolve) -> Result<Vec<Manifest>> {
    let mut out = Vec::with_capacity(manifests.len());
    for manifest in manifests {
        let mut stream = Vec::with_capacity(manifest.stream.len());
        for (index, document) in manifest.stream.iter().enumerate() {
            let document =
                restore(document, resolver).map_err(|e| e.in_document(&manifest.source, index))?;
            stream.push(document);
        }
        out.push(Manifest::new(manifest.source.clone(), stream));
    }
    Ok(out)
}

fn secret_name(root: &Mapping) -> String {
    root.get("metadata")
        .and_then(Node::as_mapping)
        .and_then(|m| m.get("name"))
        .and_then(Node::as_scalar)
        .map(|s| s.value().into_owned())
        .unwrap_or_default()
}
