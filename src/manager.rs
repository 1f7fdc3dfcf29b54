//! Cache Manager
//!
//! The public face of the cache: one instance is built by the process entry
//! point and cloned into every caller. Wires the entry store, compute gate,
//! event bus and background tasks together and owns their lifecycle.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cache::{
    current_timestamp_ms, execute_batch, CacheStats, ComputeGate, EntryMetadata, EntryStore,
};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::events::{Event, EventBus, HandlerId};
use crate::models::{BatchOp, MetricsSnapshot, OpOutcome};
use crate::tasks::{spawn_event_pump, spawn_reaper};

/// Running background tasks and the token that stops them.
struct Background {
    shutdown: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

struct Inner {
    config: Config,
    store: Arc<EntryStore>,
    gate: ComputeGate,
    bus: Arc<EventBus>,
    background: Mutex<Option<Background>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let background = self
            .background
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(background) = background.take() {
            warn!("Cache dropped without stop(), cancelling background tasks");
            background.shutdown.cancel();
        }
    }
}

// == Cache Manager ==
/// Shared handle to the cache.
///
/// Cloning is cheap; every clone addresses the same instance.
#[derive(Clone)]
pub struct CacheManager {
    inner: Arc<Inner>,
}

impl CacheManager {
    /// Creates a new cache. Background tasks start with [`CacheManager::start`].
    pub fn new(config: Config) -> Self {
        let store = Arc::new(EntryStore::new());
        Self {
            inner: Arc::new(Inner {
                gate: ComputeGate::new(store.clone()),
                bus: Arc::new(EventBus::new(config.max_event_attempts)),
                store,
                config,
                background: Mutex::new(None),
            }),
        }
    }

    /// Creates a new cache from configuration and starts it.
    pub fn from_config(config: Config) -> Result<Self> {
        let cache = Self::new(config);
        cache.start()?;
        Ok(cache)
    }

    // == Lifecycle ==
    /// Starts the expiry reaper, and the event pump when configured.
    ///
    /// Calling it on a running cache does nothing. Must be called from within
    /// a tokio runtime.
    pub fn start(&self) -> Result<()> {
        tokio::runtime::Handle::try_current().map_err(|e| {
            CacheError::Internal(format!("cache started outside a runtime: {e}"))
        })?;

        let mut background = self.background();
        if background.is_some() {
            warn!("Cache already started");
            return Ok(());
        }

        let config = &self.inner.config;
        let shutdown = CancellationToken::new();
        let mut handles = vec![spawn_reaper(
            self.inner.store.clone(),
            config.sweep_interval,
            shutdown.child_token(),
        )];
        if let Some(interval) = config.event_drain_interval {
            handles.push(spawn_event_pump(
                self.inner.bus.clone(),
                interval,
                config.event_drain_batch,
                shutdown.child_token(),
            ));
        }

        *background = Some(Background { shutdown, handles });
        info!("Cache started");
        Ok(())
    }

    /// Stops background tasks and waits for them to exit.
    ///
    /// Calling it on a stopped cache does nothing.
    pub async fn stop(&self) {
        let Some(background) = self.background().take() else {
            return;
        };

        background.shutdown.cancel();
        for handle in background.handles {
            if let Err(e) = handle.await {
                warn!("Background task ended abnormally: {}", e);
            }
        }
        info!("Cache stopped");
    }

    /// Returns true while background tasks are running.
    pub fn is_running(&self) -> bool {
        self.background().is_some()
    }

    fn background(&self) -> std::sync::MutexGuard<'_, Option<Background>> {
        self.inner
            .background
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // == Compute ==
    /// Returns the cached value for `key`, computing and caching it on a miss.
    ///
    /// Concurrent misses on the same key share one computation. Returns
    /// `None` if the computation fails; failures are never cached.
    pub async fn get_or_compute<F, Fut>(
        &self,
        key: &str,
        compute: F,
        ttl_seconds: u64,
    ) -> Option<Value>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        self.inner
            .gate
            .get_or_compute(key, compute, ttl_seconds, None)
            .await
            .unwrap_or_default()
    }

    /// Like [`CacheManager::get_or_compute`], giving up after `deadline`.
    ///
    /// On timeout the computation keeps running and populates the cache.
    pub async fn get_or_compute_within<F, Fut>(
        &self,
        key: &str,
        compute: F,
        ttl_seconds: u64,
        deadline: Duration,
    ) -> Result<Option<Value>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        self.inner
            .gate
            .get_or_compute(key, compute, ttl_seconds, Some(deadline))
            .await
    }

    /// [`CacheManager::get_or_compute`] with the configured default TTL.
    pub async fn get_or_compute_default<F, Fut>(&self, key: &str, compute: F) -> Option<Value>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        let ttl = self.inner.config.default_ttl;
        self.get_or_compute(key, compute, ttl).await
    }

    // == Direct Entry Operations ==
    /// Returns a live entry's value, counting the access.
    pub fn get_entry(&self, key: &str) -> Option<Value> {
        self.inner.store.get(key)
    }

    /// Stores a value directly, replacing any existing entry.
    pub fn set_entry(
        &self,
        key: impl Into<String>,
        value: &Value,
        ttl_seconds: u64,
    ) -> Result<()> {
        self.inner.store.set(key.into(), value, ttl_seconds)
    }

    /// Replaces a live entry's value. Returns false if the key is absent.
    pub fn update_entry(&self, key: &str, value: &Value) -> bool {
        self.inner.store.update(key, value)
    }

    /// Removes an entry. Returns false if the key is absent.
    pub fn delete_entry(&self, key: &str) -> bool {
        self.inner.store.delete(key)
    }

    /// Returns an entry's metadata without counting an access.
    pub fn entry_metadata(&self, key: &str) -> Option<EntryMetadata> {
        self.inner.store.metadata(key)
    }

    /// Removes expired entries now instead of waiting for the reaper.
    pub fn sweep_expired(&self) -> usize {
        self.inner.store.sweep_expired(current_timestamp_ms())
    }

    /// Applies a batch of operations in order.
    pub fn batch_operation(&self, ops: &[BatchOp]) -> BTreeMap<String, OpOutcome> {
        execute_batch(&self.inner.store, ops)
    }

    // == Events ==
    /// Registers `callback` for events of `event_type`.
    pub fn register_handler<F>(&self, event_type: impl Into<String>, callback: F) -> HandlerId
    where
        F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.inner.bus.register_handler(event_type, callback)
    }

    /// Removes a handler. Returns false if the id is unknown.
    pub fn unregister_handler(&self, id: HandlerId) -> bool {
        self.inner.bus.unregister_handler(id)
    }

    /// Queues an event for the next drain.
    pub fn submit_event(&self, event: Event) {
        self.inner.bus.submit_event(event)
    }

    /// Delivers up to `max_events` queued events and returns the processed ones.
    pub fn drain(&self, max_events: usize) -> Vec<Event> {
        self.inner.bus.drain(max_events)
    }

    /// Events that exhausted their delivery attempts.
    pub fn dead_letters(&self) -> Vec<Event> {
        self.inner.bus.dead_letters()
    }

    // == Observability ==
    /// Instantaneous snapshot of cache and event bus state.
    pub fn export_metrics(&self) -> MetricsSnapshot {
        let store = &self.inner.store;
        let bus = &self.inner.bus;
        MetricsSnapshot {
            cache_size: store.len(),
            pending_event_count: bus.pending_count(),
            handler_count: bus.handler_count(),
            expired_but_not_swept_count: store.expired_count(current_timestamp_ms()),
            dead_letter_count: bus.dead_letter_count(),
            captured_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Running hit/miss/computation counters.
    pub fn stats(&self) -> CacheStats {
        self.inner.store.stats()
    }

    /// Configuration the cache was built with.
    pub fn config(&self) -> &Config {
        &self.inner.config
    }
}
