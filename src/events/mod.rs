//! Events Module
//!
//! A local deferred-dispatch queue: handlers register interest in event
//! types, producers submit events, and a drain delivers queued events to
//! matching handlers.

mod bus;
mod event;

pub use bus::{EventBus, HandlerFn};
pub use event::{Event, HandlerId};
