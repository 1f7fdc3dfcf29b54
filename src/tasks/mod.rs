//! Background Tasks Module
//!
//! Contains background tasks that run periodically for the life of a cache.
//!
//! # Tasks
//! - Expiry Reaper: Removes expired cache entries at configured intervals
//! - Event Pump: Drains pending events, when enabled

mod pump;
mod reaper;

pub use pump::spawn_event_pump;
pub use reaper::spawn_reaper;
