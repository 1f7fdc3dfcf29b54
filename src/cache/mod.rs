//! Cache Module
//!
//! Provides the in-memory entry store with TTL expiration, the versioned
//! payload codec and the single-flight compute gate.

mod batch;
pub mod codec;
mod entry;
mod gate;
mod stats;
mod store;


// Re-export public types
pub use batch::execute_batch;
pub use codec::CodecError;
pub use entry::{current_timestamp_ms, CacheEntry, EntryMetadata};
pub use gate::ComputeGate;
pub use stats::{CacheStats, StatsCounters};
pub use store::EntryStore;
