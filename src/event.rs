//! The event envelope routed through the coordination core.
//!
//! An application defines its own closed set of event kinds (an enum) and
//! implements [`EventKind`] for it; the core never hard-codes what kinds of
//! things can happen, only that a distinguished `Terminate` kind exists so
//! the dispatcher knows when to drain and stop.

use std::hash::Hash;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Bound required of an application's event-kind enum.
pub trait EventKind: Clone + Eq + Hash + Send + Sync + 'static {
    /// Whether this kind is the distinguished shutdown signal. The
    /// dispatcher stops accepting new events once a `Terminate` event is
    /// popped from the queue, but still drains everything enqueued before
    /// it.
    fn is_terminate(&self) -> bool;
}

/// A single unit of work flowing through the Router/Dispatcher/Aggregator.
///
/// `K` is the application's event-kind enum; `P` is the payload type,
/// commonly `serde_json::Value` for free-form JSON but left generic so
/// strongly-typed payloads are just as natural.
#[derive(Debug, Clone, PartialEq)]
pub struct Event<K, P> {
    pub kind: K,
    pub payload: P,
    /// Assigned a fresh UUID v4 the moment the event is accepted by a
    /// dispatcher, if the caller didn't already supply one. A directly
    /// constructed `Event` that hasn't yet entered a dispatcher may still
    /// have `None` here.
    pub correlation_id: Option<String>,
    pub source: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl<K, P> Event<K, P> {
    pub fn new(kind: K, payload: P) -> Self {
        Event {
            kind,
            payload,
            correlation_id: None,
            source: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Returns the correlation id, assigning a fresh UUID v4 in place if one
    /// wasn't already set. Called by the dispatcher the moment it accepts
    /// the event, never earlier.
    pub fn ensure_correlation_id(&mut self) -> &str {
        if self.correlation_id.is_none() {
            self.correlation_id = Some(Uuid::new_v4().to_string());
        }
        self.correlation_id.as_deref().unwrap()
    }
}
