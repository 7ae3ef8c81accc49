//! Reversible masking for PII fields.
//!
//! Values are base64-encoded (standard alphabet, padded) over their UTF-8
//! bytes. This is obfuscation, not encryption: anyone holding a masked value
//! can recover the original with [`decode`].

use base64::{prelude::BASE64_STANDARD, Engine};
use std::fmt;

/// Error returned when a masked value cannot be unmasked
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodingError {
    InvalidBase64(String),
    InvalidUtf8(String),
}

impl fmt::Display for DecodingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodingError::InvalidBase64(msg) => write!(f, "Decoding error: invalid base64: {}", msg),
            DecodingError::InvalidUtf8(msg) => write!(f, "Decoding error: invalid UTF-8: {}", msg),
        }
    }
}

impl std::error::Error for DecodingError {}

/// Mask a value
pub fn encode(value: &str) -> String {
    BASE64_STANDARD.encode(value.as_bytes())
}

/// Recover a value produced by [`encode`]
pub fn decode(masked: &str) -> Result<String, DecodingError> {
    let bytes = BASE64_STANDARD
        .decode(masked)
        .map_err(|e| DecodingError::InvalidBase64(e.to_string()))?;

    String::from_utf8(bytes).map_err(|e| DecodingError::InvalidUtf8(e.to_string()))
}
