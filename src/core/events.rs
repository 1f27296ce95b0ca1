//! Lifecycle event sink implementations.
//!
//! Protectors can record every request transition into a pluggable sink for
//! diagnostics. The in-memory sink keeps a bounded buffer and is the only
//! implementation shipped here; embedders wire their own for anything
//! durable.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::request::Receipt;
use crate::util::clock::now_ms;

/// The lifecycle transition an event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Request appended to the pending queue.
    Submitted,
    /// Tokens granted to the request.
    Granted,
    /// Head request deferred because the availability probe reported too few
    /// free tokens.
    ProbeDeferred,
    /// Tokens returned by an explicit release.
    Released,
    /// Tokens reclaimed by the idle watchdog.
    IdleTimedOut,
    /// Tokens reclaimed by the per-request auto-release deadline.
    AutoReleased,
}

/// A single protector lifecycle event.
#[derive(Debug, Clone)]
pub struct ProtectorEvent {
    /// Name of the protector that recorded the event.
    pub protector: String,
    /// Receipt of the request the event concerns.
    pub receipt: Receipt,
    /// Transition recorded.
    pub kind: EventKind,
    /// Tokens involved in the transition.
    pub num_tokens: u32,
    /// Timestamp in milliseconds since the epoch.
    pub recorded_at_ms: u128,
}

/// Sink abstraction for lifecycle events.
pub trait EventSink: Send {
    /// Record one event.
    fn record(&mut self, event: ProtectorEvent);
}

/// Bounded in-memory sink for tests and diagnostics.
///
/// Clones share the same buffer, so a handle kept by the caller observes
/// events recorded through the clone handed to the protector.
#[derive(Clone)]
pub struct InMemoryEventSink {
    events: Arc<Mutex<VecDeque<ProtectorEvent>>>,
    max_events: usize,
}

impl InMemoryEventSink {
    /// Create a sink keeping at most `max_events`, evicting the oldest.
    #[must_use]
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::with_capacity(max_events))),
            max_events,
        }
    }

    /// Snapshot of the recorded events, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<ProtectorEvent> {
        self.events.lock().iter().cloned().collect()
    }
}

impl EventSink for InMemoryEventSink {
    fn record(&mut self, event: ProtectorEvent) {
        let mut events = self.events.lock();
        if events.len() >= self.max_events {
            events.pop_front();
        }
        events.push_back(event);
    }
}

/// Build an event from context, stamping the current time.
#[must_use]
pub fn build_event(
    protector: impl Into<String>,
    receipt: Receipt,
    kind: EventKind,
    num_tokens: u32,
) -> ProtectorEvent {
    ProtectorEvent {
        protector: protector.into(),
        receipt,
        kind,
        num_tokens,
        recorded_at_ms: now_ms(),
    }
}
