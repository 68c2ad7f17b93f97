//! Secret batch accumulation and sealing.
//!
//! A [`SecretBatch`] collects every payload value found during the
//! registration pass. Committing it hands the whole batch to a backend once
//! and yields a [`SealedBatch`], the only type that can format references.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::core::backend::{Backend, CommitToken};
use crate::core::types::{DataKey, Namespace, RefString, SecretName};
use crate::error::{Result, StoreError};

/// Plaintext values of one Secret object, keyed by data key.
#[derive(Debug, Default, Clone, Serialize)]
#[serde(transparent)]
pub struct SecretRecord {
    values: BTreeMap<DataKey, Zeroizing<String>>,
}

impl SecretRecord {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|v| v.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// All records of a batch: namespace, then Secret name, then record.
pub type Secrets = BTreeMap<Namespace, BTreeMap<SecretName, SecretRecord>>;

/// Render the stored form of a batch as YAML.
///
/// This is the document every file and key/value backend persists.
///
/// # Errors
///
/// Returns `StoreError::Render` if serialization fails.
pub fn render_yaml(secrets: &Secrets) -> Result<Zeroizing<String>> {
    serde_yaml::to_string(secrets)
        .map(Zeroizing::new)
        .map_err(|e| StoreError::Render(e.to_string()).into())
}

/// Secrets accumulated during one `write`, not yet stored.
#[derive(Debug, Default)]
pub struct SecretBatch {
    secrets: Secrets,
}

impl SecretBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one payload value.
    ///
    /// Records are created on first use. Registering a key again replaces
    /// its value, so repeated calls with the same arguments are harmless.
    pub fn register(
        &mut self,
        namespace: &str,
        name: &str,
        key: &str,
        plaintext: Zeroizing<String>,
    ) {
        self.secrets
            .entry(namespace.to_string())
            .or_default()
            .entry(name.to_string())
            .or_default()
            .values
            .insert(key.to_string(), plaintext);
    }

    /// Look up a registered record.
    pub fn record(&self, namespace: &str, name: &str) -> Option<&SecretRecord> {
        self.secrets.get(namespace).and_then(|n| n.get(name))
    }

    /// Number of Secret records.
    pub fn len(&self) -> usize {
        self.secrets.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn secrets(&self) -> &Secrets {
        &self.secrets
    }

    /// Store the whole batch with one backend call.
    ///
    /// Plaintext is dropped once the backend returns; the sealed batch only
    /// remembers which keys exist.
    ///
    /// # Errors
    ///
    /// Propagates the backend's `StoreError` unchanged.
    pub fn commit(self, backend: &mut dyn Backend) -> Result<SealedBatch<'_>> {
        debug!(backend = backend.name(), records = self.len(), "committing batch");

        let token = backend.commit(&self.secrets)?;

        info!(backend = backend.name(), records = self.len(), "batch committed");

        let registered = self
            .secrets
            .iter()
            .flat_map(|(ns, names)| {
                names.iter().flat_map(move |(name, record)| {
                    record
                        .keys()
                        .map(move |key| (ns.clone(), name.clone(), key.to_string()))
                })
            })
            .collect();

        Ok(SealedBatch {
            registered,
            token,
            backend,
        })
    }
}

/// A committed batch that can hand out reference strings.
pub struct SealedBatch<'a> {
    registered: BTreeSet<(Namespace, SecretName, DataKey)>,
    token: CommitToken,
    backend: &'a dyn Backend,
}

impl SealedBatch<'_> {
    /// Commit token assigned by the backend.
    pub fn token(&self) -> &CommitToken {
        &self.token
    }

    /// Reference string for a registered value.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unregistered` if the value was never registered.
    pub fn reference(&self, namespace: &str, name: &str, key: &str) -> Result<RefString> {
        let id = (namespace.to_string(), name.to_string(), key.to_string());
        if !self.registered.contains(&id) {
            return Err(StoreError::Unregistered {
                namespace: id.0,
                name: id.1,
                key: id.2,
            }
            .into());
        }
        Ok(self.backend.format_ref(namespace, name, key, &self.token))
    }
}
