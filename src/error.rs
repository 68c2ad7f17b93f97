//! Error types for flux-repo.
//!
//! Each failure class has its own enum so callers can match on the kind of
//! problem without parsing messages. Everything converts into [`Error`].

use thiserror::Error;

/// Top-level error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An error raised while handling a whole input source.
    #[error("{source_id}: {error}")]
    Source {
        source_id: String,
        #[source]
        error: Box<Error>,
    },

    /// An error raised while handling one document of an input source.
    #[error("{source_id} (document {index}): {error}")]
    Document {
        source_id: String,
        index: usize,
        #[source]
        error: Box<Error>,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Attach the input source identifier to an error.
    pub fn in_source(self, source_id: impl Into<String>) -> Self {
        Error::Source {
            source_id: source_id.into(),
            error: Box::new(self),
        }
    }

    /// Attach the input source identifier and document index to an error.
    pub fn in_document(self, source_id: impl Into<String>, index: usize) -> Self {
        Error::Document {
            source_id: source_id.into(),
            index,
            error: Box::new(self),
        }
    }

    /// The underlying error with all location context stripped.
    pub fn root(&self) -> &Error {
        match self {
            Error::Source { error, .. } | Error::Document { error, .. } => error.root(),
            other => other,
        }
    }
}

/// Malformed document stream.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("malformed YAML: {0}")]
    Yaml(String),
}

/// Structurally valid input that is semantically wrong.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Secret object has no metadata.name")]
    MissingName,

    #[error("Secret {name} has neither data nor stringData")]
    MissingPayload { name: String },

    #[error("Secret {name} has both data and stringData (pass --last-payload-wins to keep the last one)")]
    ConflictingPayload { name: String },

    #[error("Secret {name} field {field} is not a mapping")]
    PayloadNotMapping { name: String, field: &'static str },

    #[error("Secret {name} key {key} has a non-scalar value")]
    NonScalarValue { name: String, key: String },

    #[error("Secret {namespace}/{name} key {key} already holds a reference; it must NOT start with ref+ to be sanitized")]
    AlreadySanitized {
        namespace: String,
        name: String,
        key: String,
    },
}

/// Payload decoding failures.
#[derive(Error, Debug)]
pub enum FormatError {
    #[error("data key {key} is not valid base64: {reason}")]
    InvalidBase64 { key: String, reason: String },

    #[error("data key {key} does not decode to UTF-8 text")]
    NotUtf8 { key: String },

    #[error("stringData key {key} must start with ref+ to be restored: got {value:?}")]
    NotAReference { key: String, value: String },

    #[error("Secret has no stringData to restore")]
    MissingStringData,
}

/// Secret store backend failures.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{backend} commit failed: {reason}")]
    CommitFailed {
        backend: &'static str,
        reason: String,
    },

    #[error("no secret registered for {namespace}/{name}/{key}")]
    Unregistered {
        namespace: String,
        name: String,
        key: String,
    },

    #[error("cannot render secrets document: {0}")]
    Render(String),
}

/// Reference resolution failures.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("invalid reference {reference:?}: {reason}")]
    InvalidReference { reference: String, reason: String },

    #[error("unknown reference scheme: {0}")]
    UnknownScheme(String),

    #[error("no value at {reference}")]
    NotFound { reference: String },

    #[error("{scheme} store unavailable: {reason}")]
    Unavailable {
        scheme: &'static str,
        reason: String,
    },

    #[error("{path} changed since the reference was written (digest mismatch)")]
    Stale { path: String },

    #[error("{scheme} references need the {feature} feature. Rebuild with: cargo install flux-repo --features {feature}")]
    NotCompiled {
        scheme: &'static str,
        feature: &'static str,
    },
}

/// Configuration and command-line input errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[source] toml::de::Error),

    #[error("missing required setting: {field}")]
    MissingField { field: &'static str },

    #[error("invalid {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("{backend} backend not compiled. Rebuild with: cargo install flux-repo --features {feature}")]
    FeatureDisabled {
        backend: &'static str,
        feature: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
