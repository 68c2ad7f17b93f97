//! Payload value decoding.
//!
//! `data` values are base64 and `stringData` values are literal. The write
//! path only ever emits reference strings under `stringData`, so encoding is
//! the identity and has no function here.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use zeroize::Zeroizing;

use crate::core::locate::PayloadField;
use crate::error::{FormatError, Result};

/// Normalize a raw payload value to plaintext.
///
/// Line breaks and surrounding whitespace inside base64 content are
/// ignored, since manifests often wrap long values.
///
/// # Errors
///
/// Returns `FormatError::InvalidBase64` for malformed `data` content and
/// `FormatError::NotUtf8` if the decoded bytes are not text.
pub fn decode(key: &str, raw: &str, field: PayloadField) -> Result<Zeroizing<String>> {
    if !field.is_base64() {
        return Ok(Zeroizing::new(raw.to_string()));
    }

    let compact: Zeroizing<String> =
        Zeroizing::new(raw.chars().filter(|c| !c.is_ascii_whitespace()).collect());

    let bytes = STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| FormatError::InvalidBase64 {
            key: key.to_string(),
            reason: e.to_string(),
        })?;

    String::from_utf8(bytes)
        .map(Zeroizing::new)
        .map_err(|e| {
            let mut bytes = e.into_bytes();
            zeroize::Zeroize::zeroize(&mut bytes);
            FormatError::NotUtf8 {
                key: key.to_string(),
            }
            .into()
        })
}
