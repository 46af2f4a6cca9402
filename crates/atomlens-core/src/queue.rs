//! # Tab-Scoped Queue Manager
//!
//! Owns one most-recently-added-first queue of `QueueItem`s per browser tab.
//!
//! ## Current Tab
//!
//! The manager holds a single ambient "current tab", the tab the user is
//! looking at. It is the only piece of session state outside the queues.
//! Current-tab mutators fail with `AtomlensError::NoActiveTab` until a tab
//! has been activated. Every operation also has a tab-explicit `_in` form;
//! asynchronous callers use those so a result that completes after the user
//! switched tabs still lands in the queue it was requested from.
//!
//! ## Invariants
//!
//! - With deduplication on, at most one unpinned item per tab holds a given
//!   query text. Pinned items are exempt.
//! - With `max_items > 0`, a tab holds at most `max_items` unpinned items.
//!   Pinned items never count against the limit and are never evicted.
//! - Stats always satisfy `total == queue.len()`.
//!
//! ## Persistence
//!
//! Every structural change writes the tab's record through the `QueueStore`.
//! Store failures are logged and swallowed: the in-memory queues stay
//! authoritative for the lifetime of the process.

use crate::events::{EventRegistry, ListenerId, QueueEvent};
use crate::formats::{record_from_bytes, record_to_bytes};
use crate::host::{HostTabs, TabLifecycleEvent};
use crate::primitives::{DEFAULT_DEDUPLICATE, DEFAULT_MAX_ITEMS};
use crate::storage::{QueueStorage, QueueStore, storage_key, tab_from_key};
use crate::{
    AtomQuery, AtomlensError, QueryId, QueryResult, QueryStatus, QueueItem, QueueItemId, TabId,
    TabQueueRecord, now_millis,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

// =============================================================================
// CONFIGURATION & REPORTS
// =============================================================================

/// Queue behaviour knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Cap on unpinned items per tab. `0` disables eviction.
    pub max_items: usize,
    /// Promote an existing unpinned item instead of inserting a duplicate.
    pub deduplicate: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_items: DEFAULT_MAX_ITEMS,
            deduplicate: DEFAULT_DEDUPLICATE,
        }
    }
}

/// Per-status counts over one tab's queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub total: usize,
    pub searching: usize,
    pub found: usize,
    pub not_found: usize,
    pub error: usize,
    pub pinned: usize,
    pub expanded: usize,
}

impl QueueStats {
    fn from_items(items: &[QueueItem]) -> Self {
        let mut stats = Self {
            total: items.len(),
            ..Self::default()
        };
        for item in items {
            match item.result.status() {
                QueryStatus::Searching => stats.searching += 1,
                QueryStatus::Found => stats.found += 1,
                QueryStatus::NotFound => stats.not_found += 1,
                QueryStatus::Error => stats.error += 1,
            }
            if item.is_pinned {
                stats.pinned += 1;
            }
            if item.is_expanded {
                stats.expanded += 1;
            }
        }
        stats
    }
}

/// Outcome of [`QueueManager::restore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreReport {
    /// Records loaded for live tabs.
    pub loaded: usize,
    /// Records deleted because the tab is gone or the record is unreadable.
    pub pruned: usize,
}

/// Outcome of adding a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Insertion {
    pub item_id: QueueItemId,
    /// `true` when an existing item was moved to the front instead of a new
    /// one being inserted. Promoted items keep their result and are not
    /// searched again.
    pub promoted: bool,
}

// =============================================================================
// QUEUE MANAGER
// =============================================================================

#[derive(Debug, Clone, Default)]
struct TabQueue {
    items: Vec<QueueItem>,
    context_url: Option<String>,
}

type Clock = Arc<dyn Fn() -> u64 + Send + Sync>;

/// Per-tab queue manager.
pub struct QueueManager<S: QueueStore = QueueStorage> {
    config: QueueConfig,
    store: S,
    queues: BTreeMap<TabId, TabQueue>,
    current_tab: Option<TabId>,
    events: Arc<EventRegistry>,
    clock: Clock,
    next_seq: u64,
}

impl<S: QueueStore> std::fmt::Debug for QueueManager<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueManager")
            .field("config", &self.config)
            .field("tabs", &self.queues.len())
            .field("current_tab", &self.current_tab)
            .finish_non_exhaustive()
    }
}

impl Default for QueueManager {
    fn default() -> Self {
        Self::new(QueueConfig::default(), QueueStorage::default())
    }
}

impl<S: QueueStore> QueueManager<S> {
    /// Create a manager with no tabs and no current tab.
    pub fn new(config: QueueConfig, store: S) -> Self {
        Self {
            config,
            store,
            queues: BTreeMap::new(),
            current_tab: None,
            events: Arc::new(EventRegistry::new()),
            clock: Arc::new(now_millis),
            next_seq: 0,
        }
    }

    /// Replace the wall clock used for `added_at` and `last_updated`.
    #[must_use]
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> u64 + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    pub fn config(&self) -> QueueConfig {
        self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn current_tab(&self) -> Option<TabId> {
        self.current_tab
    }

    /// Tabs with an in-memory queue, ascending.
    pub fn tab_ids(&self) -> Vec<TabId> {
        self.queues.keys().copied().collect()
    }

    // =========================================================================
    // EVENTS
    // =========================================================================

    /// Shared handle to the event registry.
    pub fn events(&self) -> Arc<EventRegistry> {
        Arc::clone(&self.events)
    }

    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&QueueEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.events.unsubscribe(id)
    }

    // =========================================================================
    // TAB SWITCHING
    // =========================================================================

    /// Make `tab` current, creating its queue on first use.
    ///
    /// Emits `tab:switched` with the tab's queue. No-op if `tab` is already
    /// current.
    pub fn switch_active_tab(&mut self, tab: TabId) {
        if self.current_tab == Some(tab) {
            return;
        }
        self.current_tab = Some(tab);
        let queue = self.queues.entry(tab).or_default().items.clone();
        debug!(tab = %tab, items = queue.len(), "switched active tab");
        self.events.emit(&QueueEvent::TabSwitched { tab_id: tab, queue });
    }

    fn require_current(&self) -> Result<TabId, AtomlensError> {
        self.current_tab.ok_or(AtomlensError::NoActiveTab)
    }

    // =========================================================================
    // MUTATORS
    // =========================================================================

    /// Add a query to the current tab. See [`Self::add_query_in`].
    pub fn add_query(&mut self, query: AtomQuery) -> Result<QueueItemId, AtomlensError> {
        let tab = self.require_current()?;
        Ok(self.add_query_in(tab, query).item_id)
    }

    /// Add a query to `tab`'s queue.
    ///
    /// With deduplication on, an unpinned item holding the same query text
    /// is moved to the front (keeping its id and result) instead of a new
    /// item being inserted.
    pub fn add_query_in(&mut self, tab: TabId, query: AtomQuery) -> Insertion {
        let now = (self.clock)();
        let deduplicate = self.config.deduplicate;
        let max_items = self.config.max_items;

        let queue = self.queues.entry(tab).or_default();

        let existing = if deduplicate {
            queue
                .items
                .iter()
                .position(|i| !i.is_pinned && i.query.query == query.query)
        } else {
            None
        };

        let insertion = match existing {
            Some(index) => {
                let mut item = queue.items.remove(index);
                item.added_at = now;
                let item_id = item.id.clone();
                queue.items.insert(0, item);
                Insertion {
                    item_id,
                    promoted: true,
                }
            }
            None => {
                let seq = self.next_seq;
                self.next_seq = self.next_seq.wrapping_add(1);
                let item_id = QueueItemId::derive(&query.id, now, seq);
                queue
                    .items
                    .insert(0, QueueItem::new(item_id.clone(), query, now));
                Insertion {
                    item_id,
                    promoted: false,
                }
            }
        };

        if max_items > 0 {
            let evicted = evict_unpinned(&mut queue.items, max_items);
            if !evicted.is_empty() {
                debug!(tab = %tab, evicted = evicted.len(), "evicted unpinned items");
            }
        }

        let item = queue.items.first().cloned();
        if let Some(item) = item {
            self.events.emit(&QueueEvent::QueryAdded { tab_id: tab, item });
        }
        self.persist(tab);
        insertion
    }

    /// Replace the result of the current tab's item for `query_id`.
    pub fn update_query_result(
        &mut self,
        query_id: &QueryId,
        result: QueryResult,
    ) -> Result<bool, AtomlensError> {
        let tab = self.require_current()?;
        Ok(self.update_query_result_in(tab, query_id, result))
    }

    /// Replace the result of the item holding `query_id` in `tab`.
    ///
    /// Returns `false` (and does nothing) when the item was removed or the
    /// tab closed while the search was running.
    pub fn update_query_result_in(
        &mut self,
        tab: TabId,
        query_id: &QueryId,
        result: QueryResult,
    ) -> bool {
        let Some(item) = self
            .queues
            .get_mut(&tab)
            .and_then(|q| q.items.iter_mut().find(|i| &i.query.id == query_id))
        else {
            debug!(tab = %tab, query_id = %query_id, "dropping result for missing item");
            return false;
        };
        item.result = result;
        let item = item.clone();
        self.events.emit(&QueueEvent::QueryUpdated { tab_id: tab, item });
        self.persist(tab);
        true
    }

    pub fn remove_query(&mut self, item_id: &QueueItemId) -> Result<bool, AtomlensError> {
        let tab = self.require_current()?;
        Ok(self.remove_query_in(tab, item_id))
    }

    /// Remove an item. Returns `false` if it does not exist.
    pub fn remove_query_in(&mut self, tab: TabId, item_id: &QueueItemId) -> bool {
        let Some(queue) = self.queues.get_mut(&tab) else {
            return false;
        };
        let before = queue.items.len();
        queue.items.retain(|i| &i.id != item_id);
        if queue.items.len() == before {
            return false;
        }
        self.events.emit(&QueueEvent::QueryRemoved {
            tab_id: tab,
            item_id: item_id.clone(),
        });
        self.persist(tab);
        true
    }

    pub fn toggle_expanded(
        &mut self,
        item_id: &QueueItemId,
    ) -> Result<Option<QueueItem>, AtomlensError> {
        let tab = self.require_current()?;
        Ok(self.toggle_expanded_in(tab, item_id))
    }

    /// Flip the expanded flag. UI-only state, so nothing is persisted.
    pub fn toggle_expanded_in(&mut self, tab: TabId, item_id: &QueueItemId) -> Option<QueueItem> {
        let item = self.item_mut(tab, item_id)?;
        item.is_expanded = !item.is_expanded;
        let item = item.clone();
        self.events.emit(&QueueEvent::QueryUpdated {
            tab_id: tab,
            item: item.clone(),
        });
        Some(item)
    }

    pub fn toggle_pinned(
        &mut self,
        item_id: &QueueItemId,
    ) -> Result<Option<QueueItem>, AtomlensError> {
        let tab = self.require_current()?;
        Ok(self.toggle_pinned_in(tab, item_id))
    }

    /// Flip the pinned flag. Persisted on every call.
    ///
    /// An unpinned item is subject to deduplication and eviction again: if
    /// another unpinned item holds the same text, the one further back is
    /// dropped, then the queue is trimmed to `max_items` unpinned items.
    /// Each dropped item emits `query:removed`.
    pub fn toggle_pinned_in(&mut self, tab: TabId, item_id: &QueueItemId) -> Option<QueueItem> {
        let item = self.item_mut(tab, item_id)?;
        item.is_pinned = !item.is_pinned;
        let item = item.clone();
        self.events.emit(&QueueEvent::QueryUpdated {
            tab_id: tab,
            item: item.clone(),
        });
        if !item.is_pinned {
            for dropped in self.settle_unpinned(tab) {
                debug!(tab = %tab, item_id = %dropped, "dropped item after unpin");
                self.events.emit(&QueueEvent::QueryRemoved {
                    tab_id: tab,
                    item_id: dropped,
                });
            }
        }
        self.persist(tab);
        Some(item)
    }

    /// Re-apply deduplication and the unpinned limit to `tab`, returning
    /// the ids of the dropped items.
    fn settle_unpinned(&mut self, tab: TabId) -> Vec<QueueItemId> {
        let QueueConfig {
            max_items,
            deduplicate,
        } = self.config;
        let Some(queue) = self.queues.get_mut(&tab) else {
            return Vec::new();
        };

        let mut dropped = Vec::new();
        if deduplicate {
            let mut seen = BTreeSet::new();
            queue.items.retain(|item| {
                if item.is_pinned || seen.insert(item.query.query.clone()) {
                    return true;
                }
                dropped.push(item.id.clone());
                false
            });
        }
        if max_items > 0 {
            dropped.extend(evict_unpinned(&mut queue.items, max_items));
        }
        dropped
    }

    pub fn clear_unpinned(&mut self) -> Result<(), AtomlensError> {
        let tab = self.require_current()?;
        self.clear_unpinned_in(tab);
        Ok(())
    }

    /// Drop every unpinned item of `tab`.
    pub fn clear_unpinned_in(&mut self, tab: TabId) {
        self.clear_where(tab, |item| item.is_pinned);
    }

    pub fn clear_all(&mut self) -> Result<(), AtomlensError> {
        let tab = self.require_current()?;
        self.clear_all_in(tab);
        Ok(())
    }

    /// Drop every item of `tab`, pinned included.
    pub fn clear_all_in(&mut self, tab: TabId) {
        self.clear_where(tab, |_| false);
    }

    fn clear_where(&mut self, tab: TabId, keep: impl Fn(&QueueItem) -> bool) {
        let queue = self.queues.entry(tab).or_default();
        queue.items.retain(|i| keep(i));
        let queue = queue.items.clone();
        self.persist(tab);
        self.events
            .emit(&QueueEvent::QueueCleared { tab_id: tab, queue });
    }

    /// Record the page URL shown by `tab`. Ignored for tabs without a queue.
    pub fn set_tab_context_url(&mut self, tab: TabId, url: impl Into<String>) -> bool {
        let Some(queue) = self.queues.get_mut(&tab) else {
            return false;
        };
        queue.context_url = Some(url.into());
        self.persist(tab);
        true
    }

    fn item_mut(&mut self, tab: TabId, item_id: &QueueItemId) -> Option<&mut QueueItem> {
        self.queues
            .get_mut(&tab)?
            .items
            .iter_mut()
            .find(|i| &i.id == item_id)
    }

    // =========================================================================
    // SNAPSHOTS
    // =========================================================================

    /// The current tab's queue, newest first. Empty when no tab is current.
    pub fn get_queue(&self) -> Vec<QueueItem> {
        self.current_tab
            .map(|tab| self.get_queue_for_tab(tab))
            .unwrap_or_default()
    }

    pub fn get_queue_for_tab(&self, tab: TabId) -> Vec<QueueItem> {
        self.queues
            .get(&tab)
            .map(|q| q.items.clone())
            .unwrap_or_default()
    }

    pub fn get_stats(&self) -> QueueStats {
        self.current_tab
            .map(|tab| self.get_stats_for_tab(tab))
            .unwrap_or_default()
    }

    pub fn get_stats_for_tab(&self, tab: TabId) -> QueueStats {
        self.queues
            .get(&tab)
            .map(|q| QueueStats::from_items(&q.items))
            .unwrap_or_default()
    }

    /// Look up one item.
    pub fn item(&self, tab: TabId, item_id: &QueueItemId) -> Option<&QueueItem> {
        self.queues.get(&tab)?.items.iter().find(|i| &i.id == item_id)
    }

    pub fn tab_context_url(&self, tab: TabId) -> Option<&str> {
        self.queues.get(&tab)?.context_url.as_deref()
    }

    // =========================================================================
    // TAB LIFECYCLE
    // =========================================================================

    /// React to a host tab notification.
    pub fn handle_lifecycle(&mut self, event: TabLifecycleEvent, host: &impl HostTabs) {
        match event {
            TabLifecycleEvent::Activated { tab_id, url } => {
                self.switch_active_tab(tab_id);
                if let Some(url) = url {
                    self.set_tab_context_url(tab_id, url);
                }
            }
            TabLifecycleEvent::Closed { tab_id } => self.close_tab(tab_id),
            TabLifecycleEvent::WindowFocused { window_id } => {
                if let Some(tab) = host.active_tab_in_window(window_id) {
                    self.switch_active_tab(tab);
                }
            }
        }
    }

    /// Forget a closed tab, pinned items included, in memory and on disk.
    pub fn close_tab(&mut self, tab: TabId) {
        self.queues.remove(&tab);
        if self.current_tab == Some(tab) {
            self.current_tab = None;
        }
        if let Err(e) = self.store.delete(&storage_key(tab)) {
            warn!(tab = %tab, error = %e, "failed to delete persisted queue");
        }
        debug!(tab = %tab, "closed tab");
    }

    // =========================================================================
    // PERSISTENCE
    // =========================================================================

    /// Load persisted queues for live tabs and delete the rest.
    ///
    /// Tabs that already have an in-memory queue are left untouched.
    /// Unreadable records are deleted.
    pub fn restore(&mut self, host: &impl HostTabs) -> RestoreReport {
        let mut report = RestoreReport::default();
        let keys = match self.store.keys() {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "failed to list persisted queues");
                return report;
            }
        };

        for key in keys {
            let Some(tab) = tab_from_key(&key) else {
                continue;
            };
            if self.queues.contains_key(&tab) {
                continue;
            }

            let record = if host.tab_exists(tab) {
                match self.store.load(&key) {
                    Ok(Some(bytes)) => record_from_bytes(&bytes).ok(),
                    Ok(None) => continue,
                    Err(e) => {
                        warn!(tab = %tab, error = %e, "failed to load persisted queue");
                        continue;
                    }
                }
            } else {
                None
            };

            match record {
                Some(record) => {
                    self.queues.insert(
                        tab,
                        TabQueue {
                            items: record.items,
                            context_url: record.tab_context_url,
                        },
                    );
                    report.loaded += 1;
                }
                None => {
                    if let Err(e) = self.store.delete(&key) {
                        warn!(tab = %tab, error = %e, "failed to prune persisted queue");
                    }
                    report.pruned += 1;
                }
            }
        }

        info!(
            loaded = report.loaded,
            pruned = report.pruned,
            "restored tab queues"
        );
        report
    }

    fn persist(&mut self, tab: TabId) {
        let Some(queue) = self.queues.get(&tab) else {
            return;
        };
        let record = TabQueueRecord {
            items: queue.items.clone(),
            tab_context_url: queue.context_url.clone(),
            last_updated: (self.clock)(),
        };
        let result = record_to_bytes(&record)
            .and_then(|bytes| self.store.save(&storage_key(tab), &bytes));
        if let Err(e) = result {
            warn!(tab = %tab, error = %e, "failed to persist tab queue");
        }
    }
}

/// Keep every pinned item and the first `max_items` unpinned ones.
/// Keep every pinned item and the first `max_items` unpinned ones. Returns
/// the ids of the evicted items.
fn evict_unpinned(items: &mut Vec<QueueItem>, max_items: usize) -> Vec<QueueItemId> {
    let mut unpinned = 0usize;
    let mut evicted = Vec::new();
    items.retain(|item| {
        if item.is_pinned {
            return true;
        }
        unpinned += 1;
        if unpinned > max_items {
            evicted.push(item.id.clone());
            return false;
        }
        true
    });
    evicted
}

// =============================================================================
// TESTS
// =============================================================================
