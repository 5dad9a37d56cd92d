//! Type-keyed subscriber registry.
//!
//! Grounded on `ToolRegistry`'s `Arc<RwLock<HashMap<...>>>` shape: a
//! registry with occasional writers (route registration at startup) and
//! frequent concurrent readers (every dispatch batch looks up
//! subscribers), so a read-write lock fits better than a mutex.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::CoreError;
use crate::event::{Event, EventKind};

/// Anything that can receive a routed event. Named `receive_event` rather
/// than `handle`/`on_event` to read clearly at dispatcher call sites
/// (`subscriber.receive_event(event).await`). Returns the events derived
/// from handling `event`, if any; the dispatcher re-enqueues them exactly
/// as if they'd been `dispatch`ed directly. A subscriber that fails
/// returns `Err`; the dispatcher logs it and drops the event rather than
/// retrying (spec §4.2 failure semantics).
#[async_trait]
pub trait AsyncSubscriber<K, P>: Send + Sync {
    async fn receive_event(&self, event: Event<K, P>) -> Result<Vec<Event<K, P>>, CoreError>;
}

/// Routes events to the subscribers registered for their kind.
///
/// Registration (`add_route`) and lookup (`get_subscribers`) may happen
/// concurrently; a lookup always reflects routes registered strictly
/// before it was issued, never a route added during the lookup itself,
/// since both go through the same `RwLock`.
pub struct Router<K, P> {
    routes: RwLock<HashMap<K, Vec<Arc<dyn AsyncSubscriber<K, P>>>>>,
}

impl<K, P> Default for Router<K, P>
where
    K: EventKind,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, P> Router<K, P>
where
    K: EventKind,
{
    pub fn new() -> Self {
        Router {
            routes: RwLock::new(HashMap::new()),
        }
    }

    /// Registers `subscriber` for `kind`. Multiple subscribers may share a
    /// kind; they are invoked in registration order by the dispatcher's
    /// fan-out.
    pub async fn add_route(&self, kind: K, subscriber: Arc<dyn AsyncSubscriber<K, P>>) {
        let mut routes = self.routes.write().await;
        routes.entry(kind).or_insert_with(Vec::new).push(subscriber);
    }

    /// Removes every subscriber registered for `kind`.
    pub async fn clear_route(&self, kind: &K) {
        self.routes.write().await.remove(kind);
    }

    /// Returns the subscribers currently registered for `kind`, in
    /// registration order. Empty if none are registered.
    pub async fn get_subscribers(&self, kind: &K) -> Vec<Arc<dyn AsyncSubscriber<K, P>>> {
        self.routes
            .read()
            .await
            .get(kind)
            .cloned()
            .unwrap_or_default()
    }
}
