//! Request and Response models for the cache
//!
//! This module defines the serializable types callers exchange with the
//! cache: batch operations, their outcomes and the metrics snapshot.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{BatchOp, OpKind};
pub use responses::{MetricsSnapshot, OpOutcome};
