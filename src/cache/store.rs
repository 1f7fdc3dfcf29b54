//! Entry Store Module
//!
//! Source of truth for cache state: a sharded map of encoded entries with
//! TTL expiry. Each shard is independently locked, so operations on
//! different keys rarely contend.

use dashmap::DashMap;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::cache::entry::current_timestamp_ms;
use crate::cache::{codec, CacheEntry, CacheStats, EntryMetadata, StatsCounters};
use crate::error::Result;

// == Entry Store ==
/// Concurrent entry storage with TTL support.
#[derive(Debug, Default)]
pub struct EntryStore {
    /// Key-entry storage, striped by shard
    entries: DashMap<String, CacheEntry>,
    /// Performance counters
    counters: StatsCounters,
}

impl EntryStore {
    // == Constructor ==
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    // == Get ==
    /// Retrieves and decodes a live value, counting the access.
    ///
    /// Absent, expired and undecodable entries all read as `None`.
    pub fn get(&self, key: &str) -> Option<Value> {
        let value = self.read(key);
        match value {
            Some(_) => self.counters.record_hit(),
            None => self.counters.record_miss(),
        }
        value
    }

    /// Second look at a key the caller already counted as a miss.
    ///
    /// Counts the entry access on success but leaves hit and miss counters alone.
    pub(crate) fn recheck(&self, key: &str) -> Option<Value> {
        self.read(key)
    }

    fn read(&self, key: &str) -> Option<Value> {
        let now = current_timestamp_ms();
        let mut entry = self.entries.get_mut(key)?;

        if entry.is_expired_at(now) {
            debug!(key, "entry expired, awaiting sweep");
            return None;
        }

        match codec::decode(&entry.payload) {
            Ok(value) => {
                entry.record_access();
                Some(value)
            }
            Err(e) => {
                error!(key, error = %e, "failed to decode cached payload");
                None
            }
        }
    }

    // == Set ==
    /// Inserts or overwrites an entry expiring `ttl_seconds` from now.
    ///
    /// Overwrites start over with a fresh access count.
    pub fn set(&self, key: String, value: &Value, ttl_seconds: u64) -> Result<()> {
        let payload = codec::encode(value)?;
        let ttl_seconds = if ttl_seconds == 0 {
            warn!(key = %key, "zero TTL clamped to 1 second");
            1
        } else {
            ttl_seconds
        };

        self.entries.insert(key, CacheEntry::new(payload, ttl_seconds));
        Ok(())
    }

    // == Update ==
    /// Replaces the payload of a live entry.
    ///
    /// Returns false without touching the store if the key is absent or expired.
    pub fn update(&self, key: &str, value: &Value) -> bool {
        let payload = match codec::encode(value) {
            Ok(payload) => payload,
            Err(e) => {
                error!(key, error = %e, "failed to encode update");
                return false;
            }
        };

        let now = current_timestamp_ms();
        match self.entries.get_mut(key) {
            Some(mut entry) if !entry.is_expired_at(now) => {
                entry.replace_payload(payload, now);
                true
            }
            _ => false,
        }
    }

    // == Delete ==
    /// Removes an entry and its expiry.
    ///
    /// Returns false if the key was absent.
    pub fn delete(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    // == Sweep Expired ==
    /// Removes every entry whose expiry is strictly before `now`.
    ///
    /// Returns the number of entries removed.
    pub fn sweep_expired(&self, now: u64) -> usize {
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let keep = !entry.is_sweepable_at(now);
            if !keep {
                removed += 1;
            }
            keep
        });

        self.counters.record_swept(removed);
        removed
    }

    // == Inspection ==
    /// Returns an entry's metadata without counting an access.
    pub fn metadata(&self, key: &str) -> Option<EntryMetadata> {
        self.entries.get(key).map(|entry| entry.metadata())
    }

    /// Counts entries past their expiry that no sweep has removed yet.
    pub fn expired_count(&self, now: u64) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.is_sweepable_at(now))
            .count()
    }

    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.counters.snapshot()
    }

    pub(crate) fn counters(&self) -> &StatsCounters {
        &self.counters
    }

    // == Length ==
    /// Returns the current number of entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    // == Is Empty ==
    /// Returns true if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn insert_entry(&self, key: &str, entry: CacheEntry) {
        self.entries.insert(key.to_string(), entry);
    }
}
