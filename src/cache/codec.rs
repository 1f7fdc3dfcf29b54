//! Payload Codec Module
//!
//! Fixed, versioned encoding for cached values.
//!
//! # Format (version 1)
//! ```text
//! +---------+---------------------------+
//! | 0x01    | UTF-8 JSON text           |
//! +---------+---------------------------+
//!   1 byte    remaining bytes
//! ```
//! Only JSON documents are stored. Anything else is rejected at decode time.

use serde_json::Value;
use thiserror::Error;

/// Current payload format version tag.
pub const CODEC_VERSION: u8 = 1;

// == Codec Error ==
/// Reasons a payload cannot be encoded or reconstructed.
#[derive(Error, Debug)]
pub enum CodecError {
    /// Payload has no version tag
    #[error("Empty payload")]
    Empty,

    /// Payload was written by an unknown codec version
    #[error("Unsupported payload version: {0}")]
    UnsupportedVersion(u8),

    /// Body is not valid JSON
    #[error("Malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

// == Encode ==
/// Encodes a value into a versioned payload.
pub fn encode(value: &Value) -> Result<Vec<u8>, CodecError> {
    let mut payload = Vec::with_capacity(64);
    payload.push(CODEC_VERSION);
    serde_json::to_writer(&mut payload, value)?;
    Ok(payload)
}

// == Decode ==
/// Reconstructs a value from a versioned payload.
pub fn decode(payload: &[u8]) -> Result<Value, CodecError> {
    let (&version, body) = payload.split_first().ok_or(CodecError::Empty)?;
    if version != CODEC_VERSION {
        return Err(CodecError::UnsupportedVersion(version));
    }
    Ok(serde_json::from_slice(body)?)
}
