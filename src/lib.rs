//! Memo Cache - A process-wide memoizing cache
//!
//! Serves computed results from memory until their TTL expires, with
//! single-flight recomputation, out-of-band updates, a deferred event bus
//! and a background expiry sweep.

pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod manager;
pub mod models;
pub mod tasks;

pub use config::Config;
pub use error::{CacheError, Result};
pub use events::{Event, HandlerId};
pub use manager::CacheManager;
pub use models::{BatchOp, MetricsSnapshot, OpOutcome};
