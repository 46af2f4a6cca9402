//! # Queue Events
//!
//! Change notifications emitted by the queue manager, and the registry that
//! fans them out to listeners.
//!
//! Event names are a stable wire contract shared with the extension UI:
//! `query:added`, `query:removed`, `query:updated`, `queue:cleared`,
//! `tab:switched`.

use crate::{QueueItem, QueueItemId, TabId};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// A change to one tab's queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum QueueEvent {
    #[serde(rename = "query:added")]
    QueryAdded { tab_id: TabId, item: QueueItem },

    #[serde(rename = "query:removed")]
    QueryRemoved { tab_id: TabId, item_id: QueueItemId },

    #[serde(rename = "query:updated")]
    QueryUpdated { tab_id: TabId, item: QueueItem },

    /// Carries the queue as it is after clearing (pinned items, if any).
    #[serde(rename = "queue:cleared")]
    QueueCleared { tab_id: TabId, queue: Vec<QueueItem> },

    #[serde(rename = "tab:switched")]
    TabSwitched { tab_id: TabId, queue: Vec<QueueItem> },
}

impl QueueEvent {
    /// Wire name of the event.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::QueryAdded { .. } => "query:added",
            Self::QueryRemoved { .. } => "query:removed",
            Self::QueryUpdated { .. } => "query:updated",
            Self::QueueCleared { .. } => "queue:cleared",
            Self::TabSwitched { .. } => "tab:switched",
        }
    }

    /// Tab the event belongs to.
    #[must_use]
    pub const fn tab_id(&self) -> TabId {
        match self {
            Self::QueryAdded { tab_id, .. }
            | Self::QueryRemoved { tab_id, .. }
            | Self::QueryUpdated { tab_id, .. }
            | Self::QueueCleared { tab_id, .. }
            | Self::TabSwitched { tab_id, .. } => *tab_id,
        }
    }
}

/// Handle returned by [`EventRegistry::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(&QueueEvent) + Send + Sync>;

/// Explicit listener registry.
///
/// `emit` calls listeners over a snapshot taken before dispatch, so a
/// listener may subscribe or unsubscribe (itself or others) while being
/// called. A listener removed mid-dispatch still sees the current event.
#[derive(Default)]
pub struct EventRegistry {
    listeners: Mutex<Vec<(ListenerId, Listener)>>,
    next_id: AtomicU64,
}

impl EventRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener.
    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&QueueEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.lock();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    /// Deliver an event to every registered listener.
    pub fn emit(&self, event: &QueueEvent) {
        let snapshot: Vec<Listener> = self.lock().iter().map(|(_, l)| Arc::clone(l)).collect();
        for listener in snapshot {
            listener(event);
        }
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(ListenerId, Listener)>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRegistry")
            .field("listeners", &self.len())
            .finish()
    }
}
