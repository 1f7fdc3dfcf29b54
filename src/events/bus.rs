//! Event Bus Module
//!
//! Handler registry plus a FIFO queue of pending events, behind one coarse
//! lock. Handlers run outside the lock, so a handler may submit events or
//! register handlers without deadlocking.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, error, warn};

use crate::events::{Event, HandlerId};

/// Callback invoked with each matching event. An `Err` marks the delivery failed.
pub type HandlerFn = Arc<dyn Fn(&Event) -> anyhow::Result<()> + Send + Sync>;

struct Registration {
    id: HandlerId,
    event_type: String,
    callback: HandlerFn,
}

/// A queued event and how many deliveries of it have failed.
struct PendingEvent {
    event: Event,
    failures: u32,
}

#[derive(Default)]
struct BusState {
    pending: VecDeque<PendingEvent>,
    handlers: Vec<Registration>,
    dead_letters: Vec<Event>,
}

// == Event Bus ==
/// Best-effort deferred dispatcher.
pub struct EventBus {
    state: Mutex<BusState>,
    /// Failed deliveries before an event is dead-lettered, None = unlimited
    max_attempts: Option<u32>,
}

impl EventBus {
    // == Constructor ==
    /// Creates an empty bus with the given retry limit.
    pub fn new(max_attempts: Option<u32>) -> Self {
        Self {
            state: Mutex::new(BusState::default()),
            max_attempts,
        }
    }

    fn state(&self) -> MutexGuard<'_, BusState> {
        // Handlers never run under this lock, so a poisoned guard holds consistent state
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // == Register ==
    /// Registers `callback` for events of `event_type`.
    pub fn register_handler<F>(&self, event_type: impl Into<String>, callback: F) -> HandlerId
    where
        F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = HandlerId::new();
        let event_type = event_type.into();
        debug!(handler_id = %id, event_type = %event_type, "registering event handler");
        self.state().handlers.push(Registration {
            id,
            event_type,
            callback: Arc::new(callback),
        });
        id
    }

    /// Removes a handler. Returns false if the id is unknown.
    pub fn unregister_handler(&self, id: HandlerId) -> bool {
        let mut state = self.state();
        let before = state.handlers.len();
        state.handlers.retain(|registration| registration.id != id);
        state.handlers.len() != before
    }

    // == Submit ==
    /// Appends an event to the back of the pending queue.
    pub fn submit_event(&self, event: Event) {
        self.state().pending.push_back(PendingEvent { event, failures: 0 });
    }

    // == Drain ==
    /// Delivers up to `max_events` events from the front of the queue.
    ///
    /// Every matching handler is invoked for each event. Events all of whose
    /// handlers succeed, and events nobody listens to, are removed and
    /// returned. Events with a failing handler go to the back of the queue,
    /// or to the dead-letter list once they reach the retry limit.
    pub fn drain(&self, max_events: usize) -> Vec<Event> {
        let (batch, handlers) = {
            let mut state = self.state();
            let take = max_events.min(state.pending.len());
            let batch: Vec<PendingEvent> = state.pending.drain(..take).collect();
            let handlers: Vec<(String, HandlerFn)> = state
                .handlers
                .iter()
                .map(|r| (r.event_type.clone(), r.callback.clone()))
                .collect();
            (batch, handlers)
        };

        let mut processed = Vec::with_capacity(batch.len());
        let mut retained = Vec::new();
        let mut dead = Vec::new();

        for mut pending in batch {
            let matching: Vec<&HandlerFn> = handlers
                .iter()
                .filter(|(event_type, _)| *event_type == pending.event.event_type)
                .map(|(_, callback)| callback)
                .collect();

            if matching.is_empty() {
                debug!(
                    event_type = %pending.event.event_type,
                    "no handler registered, dropping event"
                );
                processed.push(pending.event);
                continue;
            }

            let mut failed = false;
            for callback in matching {
                if let Err(e) = invoke(callback, &pending.event) {
                    warn!(
                        event_type = %pending.event.event_type,
                        error = %e,
                        "error processing event"
                    );
                    failed = true;
                }
            }

            if !failed {
                processed.push(pending.event);
                continue;
            }

            pending.failures += 1;
            match self.max_attempts {
                Some(limit) if pending.failures >= limit => {
                    error!(
                        event_type = %pending.event.event_type,
                        attempts = pending.failures,
                        "event exhausted its delivery attempts, dead-lettering"
                    );
                    dead.push(pending.event);
                }
                _ => retained.push(pending),
            }
        }

        if !retained.is_empty() || !dead.is_empty() {
            let mut state = self.state();
            state.pending.extend(retained);
            state.dead_letters.extend(dead);
        }

        processed
    }

    // == Inspection ==
    /// Number of events waiting for a drain.
    pub fn pending_count(&self) -> usize {
        self.state().pending.len()
    }

    /// Number of registered handlers.
    pub fn handler_count(&self) -> usize {
        self.state().handlers.len()
    }

    /// Number of events that gave up on delivery.
    pub fn dead_letter_count(&self) -> usize {
        self.state().dead_letters.len()
    }

    /// Copies of the dead-lettered events, oldest first.
    pub fn dead_letters(&self) -> Vec<Event> {
        self.state().dead_letters.clone()
    }
}

/// Runs one handler, treating a panic as a failed delivery.
fn invoke(callback: &HandlerFn, event: &Event) -> anyhow::Result<()> {
    match panic::catch_unwind(AssertUnwindSafe(|| callback(event))) {
        Ok(result) => result,
        Err(_) => Err(anyhow::anyhow!("handler panicked")),
    }
}
