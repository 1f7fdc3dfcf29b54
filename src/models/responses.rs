//! Response models for the cache
//!
//! Defines batch outcomes and the metrics snapshot.

use serde::Serialize;
use serde_json::Value;

/// Result of one batch operation.
///
/// Serializes as the bare boolean or value; a missing value serializes as `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OpOutcome {
    /// Outcome of an update or delete
    Applied(bool),
    /// Decoded value returned by a get
    Value(Value),
    /// A get found nothing
    Missing,
}

/// Instantaneous view of cache and event bus state
///
/// Computed at call time, not a running aggregate.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Entries currently stored, expired ones included
    pub cache_size: usize,
    /// Events waiting for a drain
    pub pending_event_count: usize,
    /// Registered event handlers
    pub handler_count: usize,
    /// Entries past expiry that no sweep has removed yet
    pub expired_but_not_swept_count: usize,
    /// Events that exhausted their delivery attempts
    pub dead_letter_count: usize,
    /// Snapshot time in RFC 3339 format
    pub captured_at: String,
}
