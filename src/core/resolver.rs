//! Reference resolution.
//!
//! A reference has the form
//! `ref+<scheme>://<location>?<query>#/<namespace>/<name>/<key>`. The
//! location and query identify one stored batch; the fragment walks into
//! it. [`Runtime`] fetches each stored batch once and answers every other
//! reference into it from memory.

use std::collections::HashMap;

use serde_yaml::Value;
use tracing::{debug, trace};

use crate::core::backend::{age, sops};
use crate::core::config::Config;
use crate::core::constants::REF_PREFIX;
use crate::error::{ResolveError, Result};

/// Turns reference strings back into plaintext.
pub trait Resolve {
    /// Resolve one reference.
    ///
    /// # Errors
    ///
    /// Returns `ResolveError` if the reference is malformed, its store is
    /// unreachable, or it points at nothing.
    fn resolve(&mut self, reference: &str) -> Result<String>;
}

/// A parsed reference string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// The reference as written.
    pub raw: String,
    pub scheme: String,
    pub location: String,
    /// Query parameters in written order.
    pub query: Vec<(String, String)>,
    /// Fragment segments. Empty segments are kept, so an empty namespace
    /// stays addressable.
    pub path: Vec<String>,
}

impl Reference {
    /// Parse a reference string.
    ///
    /// # Errors
    ///
    /// Returns `ResolveError::InvalidReference` if the prefix, scheme,
    /// location, or fragment is missing.
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = |reason: &str| ResolveError::InvalidReference {
            reference: raw.to_string(),
            reason: reason.to_string(),
        };

        let rest = raw
            .strip_prefix(REF_PREFIX)
            .ok_or_else(|| invalid("missing ref+ prefix"))?;
        let (scheme, rest) = rest
            .split_once("://")
            .ok_or_else(|| invalid("missing ://"))?;
        if scheme.is_empty() || !scheme.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(invalid("scheme must be alphanumeric").into());
        }

        let (target, fragment) = rest
            .split_once('#')
            .ok_or_else(|| invalid("missing #/ fragment"))?;
        let fragment = fragment
            .strip_prefix('/')
            .ok_or_else(|| invalid("fragment must start with /"))?;

        let (location, query) = match target.split_once('?') {
            Some((location, query)) => (location, parse_query(query)),
            None => (target, Vec::new()),
        };
        if location.is_empty() {
            return Err(invalid("empty location").into());
        }

        Ok(Self {
            raw: raw.to_string(),
            scheme: scheme.to_string(),
            location: location.to_string(),
            query,
            path: fragment.split('/').map(str::to_string).collect(),
        })
    }

    /// First value of a query parameter.
    pub fn query(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Identity of the stored batch this reference points into.
    fn batch_key(&self) -> (String, String, Vec<(String, String)>) {
        (self.scheme.clone(), self.location.clone(), self.query.clone())
    }
}

fn parse_query(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (k.to_string(), v.to_string()),
            None => (pair.to_string(), String::new()),
        })
        .collect()
}

/// Walk a fragment path into a fetched batch.
///
/// # Errors
///
/// Returns `ResolveError::NotFound` if a segment is missing, and
/// `ResolveError::InvalidReference` if the path ends on a mapping or
/// sequence.
pub fn lookup(document: &Value, reference: &Reference) -> Result<String> {
    let not_found = || ResolveError::NotFound {
        reference: reference.raw.clone(),
    };

    let mut current = document;
    for segment in &reference.path {
        current = current.get(segment.as_str()).ok_or_else(not_found)?;
    }

    match current {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Err(not_found().into()),
        Value::Tagged(tagged) => match &tagged.value {
            Value::String(s) => Ok(s.clone()),
            _ => Err(ResolveError::InvalidReference {
                reference: reference.raw.clone(),
                reason: "does not point at a scalar".to_string(),
            }
            .into()),
        },
        Value::Mapping(_) | Value::Sequence(_) => Err(ResolveError::InvalidReference {
            reference: reference.raw.clone(),
            reason: "does not point at a scalar".to_string(),
        }
        .into()),
    }
}

/// Production resolver backed by the configured stores.
pub struct Runtime<'a> {
    config: &'a Config,
    cache: HashMap<(String, String, Vec<(String, String)>), Value>,
}

impl<'a> Runtime<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self {
            config,
            cache: HashMap::new(),
        }
    }

    /// Number of stored batches fetched so far.
    pub fn fetched(&self) -> usize {
        self.cache.len()
    }

    fn fetch(&self, reference: &Reference) -> Result<Value> {
        debug!(scheme = %reference.scheme, location = %reference.location, "fetching stored batch");

        let text = match reference.scheme.as_str() {
            "age" => age::fetch(reference, self.config.age_identity_path().as_deref())?,
            "sops" => sops::fetch(reference)?,
            "awssecrets" => {
                #[cfg(feature = "aws")]
                {
                    crate::core::backend::awssecrets::fetch(reference, &self.config.aws)?
                }
                #[cfg(not(feature = "aws"))]
                {
                    return Err(not_compiled("awssecrets", "aws"));
                }
            }
            "awsssm" => {
                #[cfg(feature = "aws")]
                {
                    crate::core::backend::awsssm::fetch(reference, &self.config.aws)?
                }
                #[cfg(not(feature = "aws"))]
                {
                    return Err(not_compiled("awsssm", "aws"));
                }
            }
            "s3" => {
                #[cfg(feature = "aws")]
                {
                    crate::core::backend::s3::fetch(reference, &self.config.aws)?
                }
                #[cfg(not(feature = "aws"))]
                {
                    return Err(not_compiled("s3", "aws"));
                }
            }
            "vault" => {
                #[cfg(feature = "vault")]
                {
                    crate::core::backend::vault::fetch(reference, &self.config.vault)?
                }
                #[cfg(not(feature = "vault"))]
                {
                    return Err(not_compiled("vault", "vault"));
                }
            }
            other => return Err(ResolveError::UnknownScheme(other.to_string()).into()),
        };

        serde_yaml::from_str(&text).map_err(|e| {
            ResolveError::InvalidReference {
                reference: reference.raw.clone(),
                reason: format!("stored batch is not YAML: {}", e),
            }
            .into()
        })
    }
}

impl Resolve for Runtime<'_> {
    fn resolve(&mut self, raw: &str) -> Result<String> {
        let reference = Reference::parse(raw)?;
        let key = reference.batch_key();

        if !self.cache.contains_key(&key) {
            let document = self.fetch(&reference)?;
            self.cache.insert(key.clone(), document);
        } else {
            trace!(scheme = %reference.scheme, "stored batch cached");
        }

        match self.cache.get(&key) {
            Some(document) => lookup(document, &reference),
            None => Err(ResolveError::NotFound {
                reference: reference.raw,
            }
            .into()),
        }
    }
}

#[cfg(not(all(feature = "aws", feature = "vault")))]
fn not_compiled(scheme: &'static str, feature: &'static str) -> crate::error::Error {
    ResolveError::NotCompiled { scheme, feature }.into()
}
