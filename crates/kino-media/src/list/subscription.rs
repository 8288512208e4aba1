//! Listener registry shared by the collections

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

trait Unsubscribe: Send + Sync {
    fn unsubscribe(&self, id: u64);
}

pub(crate) struct Listeners<E> {
    entries: Mutex<Vec<(u64, Listener<E>)>>,
    next_id: AtomicU64,
}

impl<E: 'static> Listeners<E> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub(crate) fn subscribe<F>(this: &Arc<Self>, listener: F) -> Subscription
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = this.next_id.fetch_add(1, Ordering::Relaxed);
        this.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, Arc::new(listener)));
        let registry: Weak<dyn Unsubscribe> = Arc::downgrade(this) as Weak<Self>;
        Subscription {
            id,
            registry: Some(registry),
        }
    }

    /// Call the listeners registered at this point, in registration order
    pub(crate) fn dispatch(&self, event: &E) {
        let listeners: Vec<Listener<E>> = self
            .entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, l)| l.clone())
            .collect();
        for listener in listeners {
            listener(event);
        }
    }
}

impl<E: 'static> Unsubscribe for Listeners<E> {
    fn unsubscribe(&self, id: u64) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|(entry, _)| *entry != id);
    }
}

/// Listener guard; the listener is removed when this is dropped
#[must_use = "dropping a Subscription removes its listener"]
pub struct Subscription {
    id: u64,
    registry: Option<Weak<dyn Unsubscribe>>,
}

impl Subscription {
    /// Keep the listener registered for as long as the collection lives
    pub fn forget(mut self) {
        self.registry = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.take().and_then(|r| r.upgrade()) {
            registry.unsubscribe(self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
