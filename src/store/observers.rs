//! Synchronous observer registry for store updates.

use std::sync::{Arc, Mutex, PoisonError, Weak};

use crate::task::TaskEvent;

type Observer = Arc<dyn Fn(&[TaskEvent]) + Send + Sync>;

#[derive(Default)]
struct Entries {
    next_id: u64,
    observers: Vec<(u64, Observer)>,
}

#[derive(Default)]
pub(super) struct ObserverList {
    inner: Arc<Mutex<Entries>>,
}

impl ObserverList {
    pub(super) fn register<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&[TaskEvent]) + Send + Sync + 'static,
    {
        let mut entries = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let id = entries.next_id;
        entries.next_id += 1;
        entries.observers.push((id, Arc::new(callback)));
        Subscription {
            id,
            entries: Arc::downgrade(&self.inner),
        }
    }

    /// Call every observer in registration order.
    ///
    /// The list is copied first so a callback may unsubscribe (or register)
    /// without deadlocking.
    pub(super) fn notify(&self, events: &[TaskEvent]) {
        let observers: Vec<Observer> = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .observers
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();

        for observer in observers {
            observer(events);
        }
    }
}

/// Handle returned by [`TaskStore::on_update`](super::TaskStore::on_update).
///
/// Dropping the handle keeps the observer registered; call
/// [`unsubscribe`](Self::unsubscribe) to remove it.
pub struct Subscription {
    id: u64,
    entries: Weak<Mutex<Entries>>,
}

impl Subscription {
    /// Deregister the observer. A no-op if the store is already gone.
    pub fn unsubscribe(self) {
        if let Some(entries) = self.entries.upgrade() {
            entries
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .observers
                .retain(|(id, _)| *id != self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
