//! Constants used throughout flux-repo.
//!
//! Centralizes magic strings and configuration values.

/// Prefix shared by every reference string.
pub const REF_PREFIX: &str = "ref+";

/// Value of `kind` that marks a Secret object.
pub const SECRET_KIND: &str = "Secret";

/// Payload field holding base64-encoded values.
pub const DATA_FIELD: &str = "data";

/// Payload field holding literal values.
pub const STRING_DATA_FIELD: &str = "stringData";

/// Optional project configuration file.
pub const CONFIG_FILE: &str = ".flux-repo.toml";

/// Sentinel path that selects stdin as the input.
pub const STDIN_SENTINEL: &str = "-";

/// Output file name used when the input came from stdin.
pub const STDIN_OUTPUT: &str = "stdin.yaml";

/// Extension of encrypted store files written next to manifests.
pub const ENCRYPTED_EXT: &str = "enc";

/// Prefix of the temporary output directory when `-o` is omitted.
pub const TEMP_DIR_PREFIX: &str = "flux-repo-";

/// Tag and description attached to cloud store entries.
pub const MANAGED_TAG_KEY: &str = "flux-repo";
pub const MANAGED_TAG_VALUE: &str = "managed";
pub const STORE_DESCRIPTION: &str = "flux-repo secret";

/// Environment variable pointing at the age identity used by `read`.
pub const AGE_IDENTITY_ENV: &str = "FLUX_REPO_AGE_IDENTITY";

/// Default age identity location relative to HOME (~/.flux-repo/identity.key).
pub const AGE_IDENTITY_DIR: &str = ".flux-repo";
pub const AGE_IDENTITY_FILE: &str = "identity.key";
