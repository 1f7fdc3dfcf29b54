//! Error types for the memoizing cache
//!
//! Provides unified error handling using thiserror.

use std::time::Duration;

use thiserror::Error;

use crate::cache::CodecError;

// == Cache Error Enum ==
/// Unified error type for the cache.
///
/// Most failures are contained inside the cache and surface as `None` or
/// `false`; only the variants below ever reach a caller.
#[derive(Error, Debug)]
pub enum CacheError {
    /// A caller gave up waiting on a computation
    #[error("Timed out after {after:?} waiting for key: {key}")]
    Timeout { key: String, after: Duration },

    /// Payload could not be encoded or decoded
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
