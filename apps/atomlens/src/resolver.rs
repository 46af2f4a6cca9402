//! # Query Resolver
//!
//! Wires the queue manager to the search client: a submitted query is queued
//! on the current tab, searched in the background, and its outcome written
//! back to the tab it was submitted from.
//!
//! Searches are never cancelled. A result for an item that was removed, or
//! for a tab that closed, is dropped by the queue manager.

use crate::search::SearchClient;
use atomlens_core::{
    AtomQuery, AtomlensError, QueryResult, QueueItemId, QueueManager, TabId,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::debug;

/// The queue manager as shared by the server. One writer at a time.
pub type SharedQueue = Arc<RwLock<QueueManager>>;

/// Outcome of [`QueryResolver::submit`].
#[derive(Debug)]
pub struct Submitted {
    pub item_id: QueueItemId,
    /// The query text was already queued and its item moved to the front.
    pub promoted: bool,
    /// Background search, absent for promoted items.
    pub task: Option<JoinHandle<()>>,
}

#[derive(Debug, Clone)]
pub struct QueryResolver {
    queue: SharedQueue,
    search: SearchClient,
    visible: Arc<AtomicBool>,
}

impl QueryResolver {
    pub fn new(queue: SharedQueue, search: SearchClient) -> Self {
        Self {
            queue,
            search,
            visible: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Queue `query` on the current tab and search it.
    ///
    /// A promoted duplicate keeps its result and is not searched again;
    /// use [`Self::retry`] to refresh it.
    pub async fn submit(&self, query: AtomQuery) -> Result<Submitted, AtomlensError> {
        let (tab, insertion) = {
            let mut queue = self.queue.write().await;
            let tab = queue.current_tab().ok_or(AtomlensError::NoActiveTab)?;
            (tab, queue.add_query_in(tab, query.clone()))
        };

        let task = (!insertion.promoted).then(|| self.spawn_resolve(tab, query));
        Ok(Submitted {
            item_id: insertion.item_id,
            promoted: insertion.promoted,
            task,
        })
    }

    /// Re-run the search of one item of the current tab, bypassing the cache.
    ///
    /// Returns `Ok(None)` for an unknown item.
    pub async fn retry(
        &self,
        item_id: &QueueItemId,
    ) -> Result<Option<JoinHandle<()>>, AtomlensError> {
        let (tab, query) = {
            let mut queue = self.queue.write().await;
            let tab = queue.current_tab().ok_or(AtomlensError::NoActiveTab)?;
            let Some(query) = queue.item(tab, item_id).map(|i| i.query.clone()) else {
                return Ok(None);
            };
            queue.update_query_result_in(tab, &query.id, QueryResult::searching(&query));
            (tab, query)
        };

        self.search.invalidate(&query.query);
        Ok(Some(self.spawn_resolve(tab, query)))
    }

    /// Record whether the extension UI is visible.
    pub fn set_visible(&self, visible: bool) {
        self.visible.store(visible, Ordering::SeqCst);
    }

    pub fn is_visible(&self) -> bool {
        self.visible.load(Ordering::SeqCst)
    }

    /// Re-resolve a tab's items: pinned ones always, the rest only while
    /// the UI is visible.
    pub async fn refresh_tab(&self, tab: TabId) -> Vec<JoinHandle<()>> {
        let visible = self.is_visible();
        let items = self.queue.read().await.get_queue_for_tab(tab);
        items
            .into_iter()
            .filter(|item| item.is_pinned || visible)
            .map(|item| self.spawn_resolve(tab, item.query))
            .collect()
    }

    fn spawn_resolve(&self, tab: TabId, query: AtomQuery) -> JoinHandle<()> {
        let queue = Arc::clone(&self.queue);
        let search = self.search.clone();
        tokio::spawn(async move {
            let result = match search.search(&query.query).await {
                Ok(found) => QueryResult::resolved(
                    query.id.clone(),
                    &query.query,
                    found.matches.clone(),
                    Some(found.summary.clone()),
                ),
                Err(e) => QueryResult::failed(query.id.clone(), &query.query, e.to_string()),
            };
            let landed = queue
                .write()
                .await
                .update_query_result_in(tab, &query.id, result);
            if !landed {
                debug!(tab = %tab, query = %query.query, "result arrived for a removed item");
            }
        })
    }
}
