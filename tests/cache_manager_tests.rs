//! Integration Tests for the Cache Manager
//!
//! Exercises the public surface end to end: memoized computation, direct
//! entry operations, batches, events, metrics and lifecycle.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use memo_cache::{BatchOp, CacheError, CacheManager, Config, Event, OpOutcome};
use serde_json::{json, Value};

// == Helper Functions ==

fn create_test_cache() -> CacheManager {
    CacheManager::new(Config::default())
}

/// Returns a compute function that counts its invocations.
fn counted(
    calls: &Arc<AtomicUsize>,
    value: Value,
) -> impl FnOnce() -> std::future::Ready<anyhow::Result<Value>> + Send + 'static {
    let calls = calls.clone();
    move || {
        calls.fetch_add(1, Ordering::SeqCst);
        std::future::ready(Ok(value))
    }
}

// == Compute Gate ==

#[tokio::test]
async fn test_repeat_call_computes_once() {
    let cache = create_test_cache();
    let calls = Arc::new(AtomicUsize::new(0));

    let first = cache.get_or_compute("k", counted(&calls, json!(1)), 60).await;
    let second = cache.get_or_compute("k", counted(&calls, json!(2)), 60).await;

    assert_eq!(first, Some(json!(1)));
    assert_eq!(second, Some(json!(1)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_ttl_expiry_scenario() {
    let cache = create_test_cache();
    let calls = Arc::new(AtomicUsize::new(0));

    let value = cache
        .get_or_compute("k1", counted(&calls, json!({"v": 1})), 1)
        .await;
    assert_eq!(value, Some(json!({"v": 1})));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let value = cache
        .get_or_compute("k1", counted(&calls, json!({"v": 1})), 1)
        .await;
    assert_eq!(value, Some(json!({"v": 1})));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    tokio::time::sleep(Duration::from_millis(1100)).await;

    let value = cache
        .get_or_compute("k1", counted(&calls, json!({"v": 1})), 1)
        .await;
    assert_eq!(value, Some(json!({"v": 1})));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_thundering_herd_computes_once() {
    let cache = create_test_cache();
    let calls = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..50 {
        let cache = cache.clone();
        let calls = calls.clone();
        handles.push(tokio::spawn(async move {
            cache
                .get_or_compute(
                    "hot",
                    move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        Ok(json!({"value": "computed_result"}))
                    },
                    60,
                )
                .await
        }));
    }

    for handle in handles {
        assert_eq!(
            handle.await.unwrap(),
            Some(json!({"value": "computed_result"}))
        );
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.stats().computations, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_thundering_herd_shares_failure() {
    let cache = create_test_cache();
    let calls = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..20 {
        let cache = cache.clone();
        let calls = calls.clone();
        handles.push(tokio::spawn(async move {
            cache
                .get_or_compute(
                    "flaky",
                    move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        Err(anyhow::anyhow!("upstream unavailable"))
                    },
                    60,
                )
                .await
        }));
    }

    for handle in handles {
        assert_eq!(handle.await.unwrap(), None);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(cache.get_entry("flaky").is_none());

    // Failures are not cached, the next call retries
    let retried = cache.get_or_compute("flaky", counted(&calls, json!("ok")), 60).await;
    assert_eq!(retried, Some(json!("ok")));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_deadline_timeout_then_cached() {
    let cache = create_test_cache();

    let result = cache
        .get_or_compute_within(
            "slow",
            || async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(json!("eventually"))
            },
            60,
            Duration::from_millis(20),
        )
        .await;
    assert!(matches!(result, Err(CacheError::Timeout { .. })));

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(cache.get_entry("slow"), Some(json!("eventually")));
}

// == Direct Entry Operations ==

#[tokio::test]
async fn test_update_entry() {
    let cache = create_test_cache();

    assert!(!cache.update_entry("never_set", &json!(1)));
    assert!(cache.get_entry("never_set").is_none());

    cache.set_entry("k", &json!("old"), 60).unwrap();
    assert!(cache.update_entry("k", &json!("new")));
    assert_eq!(cache.get_entry("k"), Some(json!("new")));
    assert!(cache.entry_metadata("k").unwrap().updated_at.is_some());
}

#[tokio::test]
async fn test_delete_entry() {
    let cache = create_test_cache();
    cache.set_entry("k", &json!(1), 60).unwrap();

    assert!(cache.delete_entry("k"));
    assert!(!cache.delete_entry("k"));
    assert!(cache.get_entry("k").is_none());
}

#[tokio::test]
async fn test_get_entry_counts_access() {
    let cache = create_test_cache();
    cache.set_entry("k", &json!(1), 60).unwrap();

    cache.get_entry("k");
    cache.get_entry("k");

    assert_eq!(cache.entry_metadata("k").unwrap().access_count, 2);
}

#[tokio::test]
async fn test_expired_entries_until_swept() {
    let cache = create_test_cache();
    cache.set_entry("short", &json!(1), 1).unwrap();
    cache.set_entry("long", &json!(2), 60).unwrap();

    tokio::time::sleep(Duration::from_millis(1100)).await;

    assert!(cache.get_entry("short").is_none());
    assert_eq!(cache.export_metrics().expired_but_not_swept_count, 1);

    assert_eq!(cache.sweep_expired(), 1);
    let metrics = cache.export_metrics();
    assert_eq!(metrics.cache_size, 1);
    assert_eq!(metrics.expired_but_not_swept_count, 0);
}

// == Batch Executor ==

#[tokio::test]
async fn test_batch_operation() {
    let cache = create_test_cache();
    cache.set_entry("a", &json!("A"), 60).unwrap();
    cache.set_entry("c", &json!({"v": "C"}), 60).unwrap();

    let results = cache.batch_operation(&[
        BatchOp::delete("a"),
        BatchOp::update("b", json!("B")),
        BatchOp::get("c"),
    ]);

    assert_eq!(results.len(), 3);
    assert_eq!(results["a"], OpOutcome::Applied(true));
    assert_eq!(results["b"], OpOutcome::Applied(false));
    assert_eq!(results["c"], OpOutcome::Value(json!({"v": "C"})));
}

#[tokio::test]
async fn test_batch_from_json() {
    let cache = create_test_cache();
    cache.set_entry("k", &json!(1), 60).unwrap();

    let ops: Vec<BatchOp> = serde_json::from_str(
        r#"[
            {"type": "get", "key": "k"},
            {"type": "delete"},
            {"key": "orphan"},
            {"type": "get", "key": "missing"}
        ]"#,
    )
    .unwrap();
    let results = cache.batch_operation(&ops);

    assert_eq!(
        serde_json::to_value(&results).unwrap(),
        json!({"k": 1, "missing": null})
    );
}

// == Event Bus ==

#[tokio::test]
async fn test_failing_handler_keeps_event_pending() {
    let config = Config {
        max_event_attempts: None,
        ..Config::default()
    };
    let cache = CacheManager::new(config);
    cache.register_handler("x", |_| Err(anyhow::anyhow!("handler down")));
    cache.submit_event(Event::new("x", json!(1)));

    for _ in 0..5 {
        assert!(cache.drain(100).is_empty());
        assert_eq!(cache.export_metrics().pending_event_count, 1);
    }
}

#[tokio::test]
async fn test_succeeding_handler_removes_event() {
    let cache = create_test_cache();
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = seen.clone();
    cache.register_handler("x", move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    cache.submit_event(Event::new("x", json!(1)));

    let processed = cache.drain(100);

    assert_eq!(processed.len(), 1);
    assert_eq!(seen.load(Ordering::SeqCst), 1);
    assert_eq!(cache.export_metrics().pending_event_count, 0);
}

#[tokio::test]
async fn test_dead_letter_reported_in_metrics() {
    let config = Config {
        max_event_attempts: Some(3),
        ..Config::default()
    };
    let cache = CacheManager::new(config);
    cache.register_handler("x", |_| Err(anyhow::anyhow!("handler down")));
    cache.submit_event(Event::new("x", json!("payload")));

    for _ in 0..3 {
        cache.drain(100);
    }

    let metrics = cache.export_metrics();
    assert_eq!(metrics.pending_event_count, 0);
    assert_eq!(metrics.dead_letter_count, 1);
    assert_eq!(cache.dead_letters(), vec![Event::new("x", json!("payload"))]);
}

#[tokio::test]
async fn test_unregistered_handler_stops_receiving() {
    let cache = create_test_cache();
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = seen.clone();
    let id = cache.register_handler("x", move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    assert!(cache.unregister_handler(id));
    cache.submit_event(Event::new("x", json!(1)));
    cache.drain(100);

    assert_eq!(seen.load(Ordering::SeqCst), 0);
    assert_eq!(cache.export_metrics().handler_count, 0);
}

// == Lifecycle ==

#[tokio::test]
async fn test_reaper_runs_while_started() {
    let config = Config {
        sweep_interval: 1,
        ..Config::default()
    };
    let cache = CacheManager::from_config(config).unwrap();
    cache.set_entry("short", &json!(1), 1).unwrap();

    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert_eq!(cache.export_metrics().cache_size, 0);

    cache.stop().await;
    assert!(!cache.is_running());
}

#[tokio::test]
async fn test_independent_instances() {
    let first = create_test_cache();
    let second = create_test_cache();

    first.set_entry("k", &json!(1), 60).unwrap();

    assert!(second.get_entry("k").is_none());
}
