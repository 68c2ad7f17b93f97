//! Type aliases for domain concepts.
//!
//! Provides semantic type aliases to make function signatures more descriptive.

/// A Kubernetes namespace (`metadata.namespace`, empty when absent).
pub type Namespace = String;

/// A Secret object's name (`metadata.name`).
pub type SecretName = String;

/// A key inside a Secret's `data` or `stringData` map.
pub type DataKey = String;

/// A reference string of the form `ref+<scheme>://<location>?<query>#/<ns>/<name>/<key>`.
pub type RefString = String;
