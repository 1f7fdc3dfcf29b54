//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

// == Cache Entry ==
/// A single cache entry: encoded payload plus its metadata.
///
/// The expiry timestamp lives in the same slot as the entry, so an entry and
/// its expiry are always inserted and removed together.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Versioned payload produced by the codec
    pub(crate) payload: Vec<u8>,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Last update timestamp (Unix milliseconds), None until first update
    pub updated_at: Option<u64>,
    /// Configured lifetime in seconds
    pub ttl_seconds: u64,
    /// Successful reads so far
    pub access_count: u64,
    /// Expiration timestamp (Unix milliseconds)
    pub expires_at: u64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry expiring `ttl_seconds` from now.
    ///
    /// # Arguments
    /// * `payload` - The encoded value
    /// * `ttl_seconds` - Lifetime in seconds, must be non-zero
    pub fn new(payload: Vec<u8>, ttl_seconds: u64) -> Self {
        Self::with_created_at(payload, ttl_seconds, current_timestamp_ms())
    }

    /// Creates a new cache entry with an explicit creation time.
    ///
    /// Expiry saturates at `u64::MAX` for very large TTLs.
    pub fn with_created_at(payload: Vec<u8>, ttl_seconds: u64, now: u64) -> Self {
        Self {
            payload,
            created_at: now,
            updated_at: None,
            ttl_seconds,
            access_count: 0,
            expires_at: now.saturating_add(ttl_seconds.saturating_mul(1000)),
        }
    }

    // == Liveness ==
    /// Checks if the entry may no longer be served at `now`.
    ///
    /// An entry is served while `now < expires_at`.
    pub fn is_expired_at(&self, now: u64) -> bool {
        now >= self.expires_at
    }

    /// Checks if the entry has expired.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }

    /// Checks if a sweep at `now` must remove the entry.
    pub fn is_sweepable_at(&self, now: u64) -> bool {
        self.expires_at < now
    }

    // == Time To Live ==
    /// Returns remaining TTL in milliseconds, 0 once expired.
    pub fn ttl_remaining_ms(&self) -> u64 {
        self.expires_at.saturating_sub(current_timestamp_ms())
    }

    // == Mutation ==
    /// Records one successful read.
    pub(crate) fn record_access(&mut self) {
        self.access_count += 1;
    }

    /// Replaces the payload, keeping creation time and expiry.
    pub(crate) fn replace_payload(&mut self, payload: Vec<u8>, now: u64) {
        self.payload = payload;
        self.updated_at = Some(now);
    }

    /// Metadata view of the entry without its payload.
    pub fn metadata(&self) -> EntryMetadata {
        EntryMetadata {
            created_at: self.created_at,
            updated_at: self.updated_at,
            ttl_seconds: self.ttl_seconds,
            access_count: self.access_count,
            expires_at: self.expires_at,
        }
    }
}

// == Entry Metadata ==
/// Read-only metadata of a stored entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryMetadata {
    pub created_at: u64,
    pub updated_at: Option<u64>,
    pub ttl_seconds: u64,
    pub access_count: u64,
    pub expires_at: u64,
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
