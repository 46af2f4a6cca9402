//! Queue ↔ search wiring: submit, late results, retry and visibility.

#![allow(clippy::unwrap_used, clippy::panic)]

mod common;

use atomlens::{QueryResolver, SearchClient, SearchConfig, SharedQueue};
use atomlens_core::{
    AtomQuery, AtomlensError, LabelTransformer, QueryId, QuerySource, QueryStatus, QueueManager,
    TabId,
};
use common::{MockIndex, atom_match};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

struct Harness {
    index: Arc<MockIndex>,
    queue: SharedQueue,
    resolver: QueryResolver,
}

fn harness(index: MockIndex) -> Harness {
    let index = Arc::new(index);
    let queue: SharedQueue = Arc::new(RwLock::new(QueueManager::default()));
    let search = SearchClient::new(
        index.clone(),
        Arc::new(LabelTransformer::new()),
        SearchConfig::default(),
    );
    let resolver = QueryResolver::new(queue.clone(), search);
    Harness {
        index,
        queue,
        resolver,
    }
}

fn indexed() -> MockIndex {
    MockIndex::new().with_label("x.com:alice", vec![atom_match("1", "x.com:alice", 500)])
}

fn query(id: &str, text: &str) -> AtomQuery {
    AtomQuery::new(QueryId::new(id), text, QuerySource::Hover, 1)
}

async fn status_of(h: &Harness, tab: TabId, index: usize) -> QueryStatus {
    h.queue.read().await.get_queue_for_tab(tab)[index].result.status()
}

#[tokio::test(start_paused = true)]
async fn submitted_queries_resolve_in_place() {
    let h = harness(indexed());
    h.queue.write().await.switch_active_tab(TabId(1));

    let found = h.resolver.submit(query("q1", "x.com:alice")).await.unwrap();
    assert!(!found.promoted);
    found.task.unwrap().await.unwrap();

    let missing = h.resolver.submit(query("q2", "nobody")).await.unwrap();
    missing.task.unwrap().await.unwrap();

    let items = h.queue.read().await.get_queue();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].id, missing.item_id);
    assert_eq!(items[0].result.status(), QueryStatus::NotFound);
    assert_eq!(items[1].result.status(), QueryStatus::Found);
    assert_eq!(items[1].result.matches().len(), 1);
    assert!(items[1].result.summary().is_some());
}

#[tokio::test(start_paused = true)]
async fn index_failure_marks_item_error() {
    let h = harness(indexed());
    h.index.set_failing(true);
    h.queue.write().await.switch_active_tab(TabId(1));

    let submitted = h.resolver.submit(query("q1", "x.com:alice")).await.unwrap();
    submitted.task.unwrap().await.unwrap();

    let items = h.queue.read().await.get_queue();
    assert_eq!(items[0].result.status(), QueryStatus::Error);
    assert!(items[0].result.error().unwrap().contains("index offline"));
}

#[tokio::test(start_paused = true)]
async fn late_result_lands_on_submitting_tab() {
    let h = harness(indexed().with_delay(Duration::from_millis(100)));
    h.queue.write().await.switch_active_tab(TabId(1));

    let submitted = h.resolver.submit(query("q1", "x.com:alice")).await.unwrap();
    assert_eq!(status_of(&h, TabId(1), 0).await, QueryStatus::Searching);

    h.queue.write().await.switch_active_tab(TabId(2));
    submitted.task.unwrap().await.unwrap();

    assert_eq!(status_of(&h, TabId(1), 0).await, QueryStatus::Found);
    assert!(h.queue.read().await.get_queue().is_empty());
}

#[tokio::test(start_paused = true)]
async fn result_for_closed_tab_is_dropped() {
    let h = harness(indexed().with_delay(Duration::from_millis(100)));
    h.queue.write().await.switch_active_tab(TabId(1));

    let submitted = h.resolver.submit(query("q1", "x.com:alice")).await.unwrap();
    h.queue.write().await.close_tab(TabId(1));
    submitted.task.unwrap().await.unwrap();

    let queue = h.queue.read().await;
    assert!(queue.tab_ids().is_empty());
    assert!(queue.get_queue_for_tab(TabId(1)).is_empty());
}

#[tokio::test(start_paused = true)]
async fn promoted_duplicate_is_not_searched_again() {
    let h = harness(indexed());
    h.queue.write().await.switch_active_tab(TabId(1));

    let first = h.resolver.submit(query("q1", "x.com:alice")).await.unwrap();
    first.task.unwrap().await.unwrap();
    let other = h.resolver.submit(query("q2", "nobody")).await.unwrap();
    other.task.unwrap().await.unwrap();

    let again = h.resolver.submit(query("q3", "x.com:alice")).await.unwrap();
    assert!(again.promoted);
    assert!(again.task.is_none());
    assert_eq!(again.item_id, first.item_id);
    assert_eq!(status_of(&h, TabId(1), 0).await, QueryStatus::Found);
    assert_eq!(h.index.searches(), 2);
}

#[tokio::test(start_paused = true)]
async fn retry_bypasses_cache() {
    let h = harness(indexed());
    h.index.set_failing(true);
    h.queue.write().await.switch_active_tab(TabId(1));

    let submitted = h.resolver.submit(query("q1", "x.com:alice")).await.unwrap();
    submitted.task.unwrap().await.unwrap();
    assert_eq!(status_of(&h, TabId(1), 0).await, QueryStatus::Error);

    h.index.set_failing(false);
    let task = h.resolver.retry(&submitted.item_id).await.unwrap().unwrap();
    assert_eq!(status_of(&h, TabId(1), 0).await, QueryStatus::Searching);
    task.await.unwrap();

    assert_eq!(status_of(&h, TabId(1), 0).await, QueryStatus::Found);
    assert_eq!(h.index.searches(), 2);

    // A second retry refetches even though the result is cached.
    h.resolver.retry(&submitted.item_id).await.unwrap().unwrap().await.unwrap();
    assert_eq!(h.index.searches(), 3);
}

#[tokio::test(start_paused = true)]
async fn retry_of_unknown_item_is_none() {
    let h = harness(indexed());
    h.queue.write().await.switch_active_tab(TabId(1));

    let missing = atomlens_core::QueueItemId::new("nope");
    assert!(h.resolver.retry(&missing).await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn submit_without_active_tab_fails() {
    let h = harness(indexed());

    let err = h.resolver.submit(query("q1", "x.com:alice")).await.unwrap_err();
    assert!(matches!(err, AtomlensError::NoActiveTab));
    assert_eq!(h.index.searches(), 0);
}

#[tokio::test(start_paused = true)]
async fn hidden_ui_refreshes_only_pinned_items() {
    let h = harness(indexed());
    h.queue.write().await.switch_active_tab(TabId(1));

    let pinned = h.resolver.submit(query("q1", "x.com:alice")).await.unwrap();
    pinned.task.unwrap().await.unwrap();
    let other = h.resolver.submit(query("q2", "nobody")).await.unwrap();
    other.task.unwrap().await.unwrap();
    h.queue.write().await.toggle_pinned(&pinned.item_id).unwrap();

    assert!(h.resolver.is_visible());
    h.resolver.set_visible(false);
    let refreshed = h.resolver.refresh_tab(TabId(1)).await;
    assert_eq!(refreshed.len(), 1);
    for task in refreshed {
        task.await.unwrap();
    }

    h.resolver.set_visible(true);
    assert_eq!(h.resolver.refresh_tab(TabId(1)).await.len(), 2);
}
