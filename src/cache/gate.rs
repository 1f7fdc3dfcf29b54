//! Compute Gate Module
//!
//! "Return the cached value or compute and store it", with at most one
//! in-flight computation per key.
//!
//! The first caller to miss on a key becomes the leader: it registers a
//! flight for the key and runs the computation on its own task. Callers that
//! miss while the flight is registered join it and receive the leader's
//! outcome, success or failure. Callers on other keys never wait.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, error};

use crate::cache::EntryStore;
use crate::error::{CacheError, Result};

// == Flight State ==
/// Progress of one in-flight computation.
#[derive(Debug, Clone)]
enum FlightState {
    Pending,
    /// `None` when the computation failed
    Done(Option<Value>),
}

impl FlightState {
    fn is_done(&self) -> bool {
        matches!(self, FlightState::Done(_))
    }

    fn outcome(&self) -> Option<Value> {
        match self {
            FlightState::Done(value) => value.clone(),
            FlightState::Pending => None,
        }
    }
}

type Flights = DashMap<String, watch::Receiver<FlightState>>;

/// Leader's handle on its flight registration.
///
/// The registration is cleared before followers are woken, and also when the
/// leader task unwinds without landing.
struct Flight {
    flights: Arc<Flights>,
    key: String,
    tx: watch::Sender<FlightState>,
    cleared: bool,
}

impl Flight {
    fn clear(&mut self) {
        if !self.cleared {
            self.flights.remove(&self.key);
            self.cleared = true;
        }
    }

    /// Publishes the outcome to every follower.
    fn land(mut self, outcome: Option<Value>) {
        self.clear();
        self.tx.send_replace(FlightState::Done(outcome));
    }
}

impl Drop for Flight {
    fn drop(&mut self) {
        self.clear();
    }
}

// == Compute Gate ==
/// Single-flight front door to the entry store.
#[derive(Debug, Clone)]
pub struct ComputeGate {
    store: Arc<EntryStore>,
    flights: Arc<Flights>,
}

impl ComputeGate {
    // == Constructor ==
    pub fn new(store: Arc<EntryStore>) -> Self {
        Self {
            store,
            flights: Arc::new(DashMap::new()),
        }
    }

    // == Get Or Compute ==
    /// Returns the live cached value for `key`, or computes and caches it.
    ///
    /// With a `deadline`, gives up waiting with [`CacheError::Timeout`] once
    /// it elapses. The computation itself keeps running and still populates
    /// the cache for later callers.
    ///
    /// # Arguments
    /// * `key` - Cache key
    /// * `compute` - Produces the value on a miss, invoked at most once per flight
    /// * `ttl_seconds` - Lifetime of a freshly computed entry
    /// * `deadline` - Optional limit on how long this caller waits
    pub async fn get_or_compute<F, Fut>(
        &self,
        key: &str,
        compute: F,
        ttl_seconds: u64,
        deadline: Option<Duration>,
    ) -> Result<Option<Value>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        if let Some(value) = self.store.get(key) {
            return Ok(Some(value));
        }

        let mut flight = self.join_or_lead(key, compute, ttl_seconds);
        let wait = async move {
            let outcome = match flight.wait_for(FlightState::is_done).await {
                Ok(state) => state.outcome(),
                // Leader task went away without landing, i.e. it panicked
                Err(_) => None,
            };
            outcome
        };

        match deadline {
            Some(after) => tokio::time::timeout(after, wait)
                .await
                .map_err(|_| CacheError::Timeout {
                    key: key.to_string(),
                    after,
                }),
            None => Ok(wait.await),
        }
    }

    /// Number of computations currently in flight.
    pub fn in_flight(&self) -> usize {
        self.flights.len()
    }

    /// Joins the registered flight for `key`, or registers one and spawns its leader.
    fn join_or_lead<F, Fut>(
        &self,
        key: &str,
        compute: F,
        ttl_seconds: u64,
    ) -> watch::Receiver<FlightState>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        let (tx, rx) = match self.flights.entry(key.to_string()) {
            Entry::Occupied(flight) => {
                debug!(key, "joining in-flight computation");
                return flight.get().clone();
            }
            Entry::Vacant(slot) => {
                let (tx, rx) = watch::channel(FlightState::Pending);
                slot.insert(rx.clone());
                (tx, rx)
            }
        };

        let flight = Flight {
            flights: self.flights.clone(),
            key: key.to_string(),
            tx,
            cleared: false,
        };
        let store = self.store.clone();

        tokio::spawn(async move {
            let outcome = lead(&store, &flight.key, compute, ttl_seconds).await;
            flight.land(outcome);
        });

        rx
    }
}

/// Leader side of a flight: double-check the store, then compute and store.
async fn lead<F, Fut>(
    store: &EntryStore,
    key: &str,
    compute: F,
    ttl_seconds: u64,
) -> Option<Value>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = anyhow::Result<Value>>,
{
    if let Some(value) = store.recheck(key) {
        debug!(key, "populated by a concurrent caller, skipping computation");
        return Some(value);
    }

    store.counters().record_computation();
    match compute().await {
        Ok(value) => {
            if let Err(e) = store.set(key.to_string(), &value, ttl_seconds) {
                error!(key, error = %e, "computed value could not be cached");
            }
            Some(value)
        }
        Err(e) => {
            store.counters().record_compute_failure();
            error!(key, error = %e, "error computing value");
            None
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type BoxedCompute = Pin<Box<dyn Future<Output = anyhow::Result<Value>> + Send>>;

    fn counting(
        calls: &Arc<AtomicUsize>,
        value: Value,
        delay: Duration,
    ) -> impl FnOnce() -> BoxedCompute + Send + 'static {
        let calls = calls.clone();
        move || -> BoxedCompute {
            Box::pin(async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(delay).await;
                Ok(value)
            })
        }
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let gate = ComputeGate::new(Arc::new(EntryStore::new()));
        let calls = Arc::new(AtomicUsize::new(0));

        let first = gate
            .get_or_compute("k", counting(&calls, json!(1), Duration::ZERO), 60, None)
            .await
            .unwrap();
        let second = gate
            .get_or_compute("k", counting(&calls, json!(2), Duration::ZERO), 60, None)
            .await
            .unwrap();

        assert_eq!(first, Some(json!(1)));
        assert_eq!(second, Some(json!(1)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let stats = gate.store.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.computations, 1);
    }

    #[tokio::test]
    async fn test_max_ttl_value_is_cached() {
        let store = Arc::new(EntryStore::new());
        let gate = ComputeGate::new(store.clone());

        let value = gate
            .get_or_compute("k", || async { Ok(json!(1)) }, u64::MAX, None)
            .await
            .unwrap();

        assert_eq!(value, Some(json!(1)));
        let meta = store.metadata("k").unwrap();
        assert!(meta.expires_at > meta.created_at);
        assert_eq!(store.get("k"), Some(json!(1)));
        assert_eq!(store.stats().compute_failures, 0);
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let store = Arc::new(EntryStore::new());
        let gate = ComputeGate::new(store.clone());

        let result = gate
            .get_or_compute("k", || async { Err(anyhow::anyhow!("boom")) }, 60, None)
            .await
            .unwrap();

        assert_eq!(result, None);
        assert!(store.metadata("k").is_none());
        assert_eq!(gate.in_flight(), 0);
        assert_eq!(store.stats().compute_failures, 1);
    }

    #[tokio::test]
    async fn test_panicking_compute_clears_flight() {
        let gate = ComputeGate::new(Arc::new(EntryStore::new()));

        let result = gate
            .get_or_compute(
                "k",
                || async {
                    if true {
                        panic!("compute exploded");
                    }
                    Ok(json!(1))
                },
                60,
                None,
            )
            .await
            .unwrap();

        assert_eq!(result, None);
        assert_eq!(gate.in_flight(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_distinct_keys_compute_independently() {
        let gate = ComputeGate::new(Arc::new(EntryStore::new()));
        // Each computation finishes only once both have started
        let barrier = Arc::new(tokio::sync::Barrier::new(2));

        let rendezvous = |value: Value| {
            let barrier = barrier.clone();
            move || -> BoxedCompute {
                Box::pin(async move {
                    barrier.wait().await;
                    Ok(value)
                })
            }
        };

        let a = gate.get_or_compute("a", rendezvous(json!("a")), 60, None);
        let b = gate.get_or_compute("b", rendezvous(json!("b")), 60, None);
        let (a, b) = tokio::time::timeout(Duration::from_secs(2), async {
            tokio::join!(a, b)
        })
        .await
        .expect("computations on distinct keys blocked each other");

        assert_eq!(a.unwrap(), Some(json!("a")));
        assert_eq!(b.unwrap(), Some(json!("b")));
    }

    #[tokio::test]
    async fn test_deadline_does_not_cancel_computation() {
        let store = Arc::new(EntryStore::new());
        let gate = ComputeGate::new(store.clone());
        let calls = Arc::new(AtomicUsize::new(0));

        let result = gate
            .get_or_compute(
                "slow",
                counting(&calls, json!("late"), Duration::from_millis(200)),
                60,
                Some(Duration::from_millis(20)),
            )
            .await;
        assert!(matches!(result, Err(CacheError::Timeout { .. })));

        tokio::time::sleep(Duration::from_millis(400)).await;

        assert_eq!(store.get("slow"), Some(json!("late")));
        assert_eq!(gate.in_flight(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
