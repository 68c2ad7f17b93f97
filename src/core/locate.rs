//! Secret object detection.
//!
//! Finds `kind: Secret` objects in a document root and records where their
//! payload lives, so the engine can rewrite that single entry.

use std::fmt;

use tracing::trace;

use crate::core::constants::{DATA_FIELD, SECRET_KIND, STRING_DATA_FIELD};
use crate::core::document::{Mapping, Node};
use crate::core::types::{Namespace, SecretName};
use crate::error::{Result, ValidationError};

/// Which payload field a Secret uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadField {
    /// `data`: values are base64-encoded.
    Data,
    /// `stringData`: values are literal.
    StringData,
}

impl PayloadField {
    pub fn key(self) -> &'static str {
        match self {
            PayloadField::Data => DATA_FIELD,
            PayloadField::StringData => STRING_DATA_FIELD,
        }
    }

    pub fn is_base64(self) -> bool {
        self == PayloadField::Data
    }
}

impl fmt::Display for PayloadField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// What to do when a Secret carries both `data` and `stringData`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Conflict {
    /// Fail with `ValidationError::ConflictingPayload`.
    #[default]
    Reject,
    /// Use whichever field appears last in document order.
    LastWins,
}

/// Location of a Secret's payload inside its top-level mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretSite {
    pub namespace: Namespace,
    pub name: SecretName,
    pub field: PayloadField,
    /// Index of the payload entry in the top-level mapping.
    pub index: usize,
    /// Index of the losing payload entry when both fields were present.
    pub shadowed: Option<usize>,
}

/// Check whether `root` is a Secret object and locate its payload.
///
/// The whole top-level mapping is scanned, since `kind` may come after the
/// payload field.
///
/// # Errors
///
/// Returns `ValidationError::MissingName` if the Secret has no
/// `metadata.name`, `ValidationError::MissingPayload` if it has neither
/// payload field, and `ValidationError::ConflictingPayload` if it has both
/// and `conflict` is `Reject`.
pub fn locate(root: &Node, conflict: Conflict) -> Result<Option<SecretSite>> {
    let Some(mapping) = root.as_mapping() else {
        return Ok(None);
    };

    let mut is_secret = false;
    let mut metadata = None;
    let mut data = None;
    let mut string_data = None;
    let mut last = None;

    for (i, (key, value)) in mapping.iter().enumerate() {
        if key.is_scalar_text("kind") && value.is_scalar_text(SECRET_KIND) {
            is_secret = true;
        } else if key.is_scalar_text("metadata") && metadata.is_none() {
            metadata = Some(value);
        } else if key.is_scalar_text(DATA_FIELD) && data.is_none() {
            data = Some(i);
            last = Some(PayloadField::Data);
        } else if key.is_scalar_text(STRING_DATA_FIELD) && string_data.is_none() {
            string_data = Some(i);
            last = Some(PayloadField::StringData);
        }
    }

    if !is_secret {
        return Ok(None);
    }

    let meta = metadata.and_then(|m| m.as_mapping());
    let namespace = meta
        .and_then(|m| scalar_field(m, "namespace"))
        .unwrap_or_default();
    let name = meta
        .and_then(|m| scalar_field(m, "name"))
        .unwrap_or_default();
    if name.is_empty() {
        return Err(ValidationError::MissingName.into());
    }

    let (field, index, shadowed) = match (data, string_data) {
        (Some(i), None) => (PayloadField::Data, i, None),
        (None, Some(i)) => (PayloadField::StringData, i, None),
        (Some(d), Some(s)) => match (conflict, last) {
            (Conflict::LastWins, Some(PayloadField::Data)) => (PayloadField::Data, d, Some(s)),
            (Conflict::LastWins, _) => (PayloadField::StringData, s, Some(d)),
            (Conflict::Reject, _) => {
                return Err(ValidationError::ConflictingPayload { name }.into());
            }
        },
        (None, None) => return Err(ValidationError::MissingPayload { name }.into()),
    };

    trace!(namespace = %namespace, name = %name, field = %field, index, "located secret");

    Ok(Some(SecretSite {
        namespace,
        name,
        field,
        index,
        shadowed,
    }))
}

/// Locate the `stringData` entry of a Secret object for restoration.
///
/// Returns `None` when `root` is not a Secret. Namespace and name are not
/// consulted. The whole mapping is scanned, so `stringData` is found even
/// when it comes before `kind`.
///
/// The inner `Option` is `None` when the Secret has no `stringData`.
pub fn locate_string_data(root: &Node) -> Option<Option<usize>> {
    let mapping = root.as_mapping()?;

    let mut is_secret = false;
    let mut index = None;
    for (i, (key, value)) in mapping.iter().enumerate() {
        if key.is_scalar_text("kind") && value.is_scalar_text(SECRET_KIND) {
            is_secret = true;
        } else if key.is_scalar_text(STRING_DATA_FIELD) && index.is_none() {
            index = Some(i);
        }
    }

    is_secret.then_some(index)
}

fn scalar_field(mapping: &Mapping, key: &str) -> Option<String> {
    mapping
        .get(key)
        .and_then(Node::as_scalar)
        .map(|s| s.value().into_owned())
}
