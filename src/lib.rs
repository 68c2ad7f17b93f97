//! flux-repo - keep Kubernetes Secret payloads out of GitOps repositories.
//!
//! # Architecture
//!
//! ```text
//! src/
//! ├── cli/              # Command-line interface
//! │   ├── write         # Store payloads, write sanitized manifests
//! │   ├── read          # Resolve references back to plaintext
//! │   └── completions   # Shell completions
//! └── core/             # Core library components
//!     ├── document      # Order-preserving YAML node tree
//!     ├── locate        # Secret object detection
//!     ├── codec         # base64 payload decoding
//!     ├── batch         # Secret batch and sealed batch
//!     ├── engine        # Two-pass extraction and substitution
//!     ├── restore       # Reference restoration
//!     ├── resolver      # Reference parsing and store lookups
//!     ├── files         # Input enumeration and output writing
//!     ├── config        # .flux-repo.toml management
//!     └── backend/      # Secret store backends
//!         ├── mod       # Backend trait
//!         ├── age       # Native age-encrypted file
//!         ├── sops      # sops-encrypted file
//!         ├── awssecrets, awsssm, s3   # AWS (feature `aws`)
//!         └── vault     # HashiCorp Vault KV v2 (feature `vault`)
//! ```
//!
//! # Example
//!
//! ```no_run
//! use flux_repo::core::backend::{self, BackendKind};
//! use flux_repo::core::config::Config;
//! use flux_repo::core::engine::{self, Manifest, Options};
//! use flux_repo::core::document::parse_stream;
//!
//! let mut config = Config::default();
//! config.age.recipients = vec!["age1...".to_string()];
//! let mut store = backend::build(BackendKind::Age, "secrets.enc", &config)?;
//!
//! let yaml = "kind: Secret\nmetadata:\n  name: db\ndata:\n  user: YWRtaW4=\n";
//! let input = Manifest::new("secret.yaml", parse_stream(yaml)?);
//! let sanitized = engine::sanitize(&[input], store.as_mut(), Options::default())?;
//! # Ok::<(), flux_repo::error::Error>(())
//! ```

pub mod cli;
pub mod core;
pub mod error;
