//! Memo Cache demo runner
//!
//! Builds the process-wide cache, exercises it the way application code
//! does, prints the results and shuts the cache down.

use std::time::Duration;

use anyhow::Context;
use serde_json::json;
use tokio::task::JoinSet;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use memo_cache::{BatchOp, CacheManager, Config, Event};

/// Main entry point for the demo.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Create the cache and start its background tasks
/// 4. Compute several keys concurrently through the cache
/// 5. Run a batch of get/update/delete operations
/// 6. Dispatch an event through the event bus
/// 7. Print metrics and stop the cache
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "memo_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Memo Cache demo");

    let config = Config::from_env();
    info!(
        "Configuration loaded: default_ttl={}s, sweep_interval={}s, max_event_attempts={:?}",
        config.default_ttl, config.sweep_interval, config.max_event_attempts
    );

    let cache = CacheManager::from_config(config)?;

    let mut computations = JoinSet::new();
    for i in 0..5 {
        let cache = cache.clone();
        computations.spawn(async move {
            let key = format!("test_key_{i}");
            let value = cache.get_or_compute_default(&key, example_compute).await;
            (key, value)
        });
    }
    while let Some(joined) = computations.join_next().await {
        let (key, value) = joined.context("compute task panicked")?;
        info!("{} => {:?}", key, value);
    }

    let batch_results = cache.batch_operation(&[
        BatchOp::get("test_key_0"),
        BatchOp::update("test_key_1", json!({"value": "updated"})),
        BatchOp::delete("test_key_2"),
    ]);
    println!("{}", serde_json::to_string_pretty(&batch_results)?);

    cache.register_handler("cache.refreshed", |event| {
        info!("Handled {} event: {}", event.event_type, event.payload);
        Ok(())
    });
    cache.submit_event(Event::new("cache.refreshed", json!({"keys": 5})));
    let processed = cache.drain(100);
    if processed.is_empty() {
        warn!("No events processed");
    }

    let metrics = cache.export_metrics();
    println!("{}", serde_json::to_string_pretty(&metrics)?);

    cache.stop().await;
    info!("Demo complete");
    Ok(())
}

async fn example_compute() -> anyhow::Result<serde_json::Value> {
    tokio::time::sleep(Duration::from_millis(100)).await;
    Ok(json!({"value": "computed_result"}))
}
