//! Native age encrypted-file backend.
//!
//! Stores the batch as an ASCII-armored age file encrypted for x25519
//! recipients. No external binary is needed on either side. The commit
//! token is the SHA-256 digest of the written ciphertext, so `read` can
//! tell when the file was replaced after the manifests were generated.
//!
//! ## Usage
//!
//! ```toml
//! [write]
//! backend = "age"
//! path = "secrets/prod.enc"
//!
//! [age]
//! recipients = ["age1ql3z7hjy54pw3hyww5ayyfg7zqgvc7w3j2elw8zmrj2kg5sfn9aqmcac8p"]
//! ```
//!
//! `read` decrypts with the identity from `[age] identity`,
//! `FLUX_REPO_AGE_IDENTITY`, or `~/.flux-repo/identity.key`.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use ::age::x25519;
use sha2::{Digest, Sha256};
use tracing::{debug, trace};
use zeroize::Zeroizing;

use super::{Backend, CommitToken};
use crate::core::batch::{render_yaml, Secrets};
use crate::core::config::AgeConfig;
use crate::core::constants::ENCRYPTED_EXT;
use crate::core::resolver::Reference;
use crate::error::{ConfigError, ResolveError, Result, StoreError};

const NAME: &str = "age";

/// age-encrypted store file.
pub struct AgeFile {
    path: String,
    recipients: Vec<x25519::Recipient>,
}

impl AgeFile {
    /// Create the backend for the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if `path` does not end in `.enc`
    /// or a recipient is not an age public key, and
    /// `ConfigError::MissingField` if no recipients are configured.
    pub fn new(path: &str, config: &AgeConfig) -> Result<Self> {
        require_enc_extension(path)?;

        if config.recipients.is_empty() {
            return Err(ConfigError::MissingField {
                field: "age recipients (--age-recipient)",
            }
            .into());
        }

        let recipients = config
            .recipients
            .iter()
            .map(|r| {
                r.parse::<x25519::Recipient>()
                    .map_err(|_| ConfigError::InvalidValue {
                        field: "age recipient",
                        reason: format!("not an age public key: {}", r),
                    })
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Self {
            path: path.to_string(),
            recipients,
        })
    }
}

impl Backend for AgeFile {
    fn name(&self) -> &'static str {
        NAME
    }

    fn commit(&mut self, secrets: &Secrets) -> Result<CommitToken> {
        let plaintext = render_yaml(secrets)?;
        let ciphertext = encrypt(&plaintext, &self.recipients).map_err(commit_failed)?;

        let path = Path::new(&self.path);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| commit_failed(format!("creating {}: {}", parent.display(), e)))?;
        }
        std::fs::write(path, &ciphertext)
            .map_err(|e| commit_failed(format!("writing {}: {}", self.path, e)))?;

        let digest = hex_digest(ciphertext.as_bytes());
        debug!(path = %self.path, digest = %digest, "wrote age store file");
        Ok(CommitToken::new(digest))
    }

    fn format_ref(&self, namespace: &str, name: &str, key: &str, token: &CommitToken) -> String {
        format!(
            "ref+age://{}?digest={}#/{}/{}/{}",
            self.path, token, namespace, name, key
        )
    }
}

/// Read and decrypt the store file a reference points at.
///
/// # Errors
///
/// Returns `ResolveError::Stale` if the file digest differs from the one in
/// the reference, and `ResolveError::Unavailable` if the file or identity
/// cannot be read or decryption fails.
pub fn fetch(reference: &Reference, identity: Option<&Path>) -> Result<Zeroizing<String>> {
    let ciphertext = std::fs::read_to_string(&reference.location)
        .map_err(|e| unavailable(format!("reading {}: {}", reference.location, e)))?;

    if let Some(expected) = reference.query("digest") {
        if hex_digest(ciphertext.as_bytes()) != expected {
            return Err(ResolveError::Stale {
                path: reference.location.clone(),
            }
            .into());
        }
    }

    let identity_path =
        identity.ok_or_else(|| unavailable("no age identity configured".to_string()))?;
    let identity = load_identity(identity_path)?;

    decrypt(&ciphertext, &identity).map_err(unavailable)
}

/// Load an age identity file, skipping comment lines.
fn load_identity(path: &Path) -> Result<x25519::Identity> {
    let contents = Zeroizing::new(
        std::fs::read_to_string(path)
            .map_err(|e| unavailable(format!("reading identity {}: {}", path.display(), e)))?,
    );

    let line = contents
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with('#'))
        .ok_or_else(|| unavailable(format!("{} holds no age identity", path.display())))?;

    line.parse::<x25519::Identity>()
        .map_err(|e: &str| unavailable(format!("{}: {}", path.display(), e)))
}

fn encrypt(
    plaintext: &str,
    recipients: &[x25519::Recipient],
) -> std::result::Result<String, String> {
    trace!(
        recipients = recipients.len(),
        plaintext_len = plaintext.len(),
        "encrypting"
    );

    let encryptor =
        ::age::Encryptor::with_recipients(recipients.iter().map(|r| r as &dyn ::age::Recipient))
            .map_err(|e| e.to_string())?;

    let mut encrypted = Vec::new();
    let armor = ::age::armor::ArmoredWriter::wrap_output(
        &mut encrypted,
        ::age::armor::Format::AsciiArmor,
    )
    .map_err(|e| e.to_string())?;
    let mut writer = encryptor.wrap_output(armor).map_err(|e| e.to_string())?;

    writer
        .write_all(plaintext.as_bytes())
        .map_err(|e| e.to_string())?;
    let armored = writer.finish().map_err(|e| e.to_string())?;
    armored.finish().map_err(|e| e.to_string())?;

    String::from_utf8(encrypted).map_err(|e| format!("UTF-8 error: {}", e))
}

fn decrypt(
    encrypted: &str,
    identity: &x25519::Identity,
) -> std::result::Result<Zeroizing<String>, String> {
    trace!(ciphertext_len = encrypted.len(), "decrypting");

    let reader = ::age::armor::ArmoredReader::new(encrypted.as_bytes());
    let decryptor = ::age::Decryptor::new(reader).map_err(|e| e.to_string())?;

    let mut decrypted = Zeroizing::new(Vec::new());
    let mut reader = decryptor
        .decrypt(std::iter::once(identity as &dyn ::age::Identity))
        .map_err(|e| e.to_string())?;
    reader
        .read_to_end(&mut decrypted)
        .map_err(|e| e.to_string())?;

    String::from_utf8(decrypted.to_vec())
        .map(Zeroizing::new)
        .map_err(|_| "decrypted store is not UTF-8".to_string())
}

pub(crate) fn require_enc_extension(path: &str) -> Result<()> {
    let is_enc = PathBuf::from(path)
        .extension()
        .is_some_and(|ext| ext == ENCRYPTED_EXT);
    if !is_enc {
        return Err(ConfigError::InvalidValue {
            field: "path (-p)",
            reason: format!("{:?} must end with .{} for file backends", path, ENCRYPTED_EXT),
        }
        .into());
    }
    Ok(())
}

fn hex_digest(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

fn commit_failed(reason: String) -> crate::error::Error {
    StoreError::CommitFailed {
        backend: NAME,
        reason,
    }
    .into()
}

fn unavailable(reason: String) -> crate::error::Error {
    ResolveError::Unavailable {
        scheme: NAME,
        reason,
    }
    .into()
}
