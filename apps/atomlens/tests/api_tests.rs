//! Integration tests for the atomlens HTTP bridge.
//!
//! Uses axum-test against an in-memory index, without starting a real server.

#![allow(clippy::unwrap_used, clippy::panic)]

mod common;

use atomlens::api::{
    AppState, BadgeResponse, CurrentTabResponse, HealthResponse, HostSyncResponse,
    InvalidateResponse, ItemResponse, QueueResponse, StatusResponse, SubmitResponse,
    SuggestionsResponse, VisibilityResponse, create_router,
};
use atomlens::config::ServerConfig;
use atomlens::SearchConfig;
use atomlens::tracking::TrackOutcome;
use atomlens_core::{QueryStatus, QueueConfig, QueueEvent, QueueManager, QueueStorage, TabId};
use axum::http::{HeaderValue, StatusCode, header};
use axum_test::TestServer;
use common::{MockIndex, atom, atom_match, triple};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

fn indexed() -> MockIndex {
    let alice = atom("a1", "alice", "x.com:alice");
    MockIndex::new()
        .with_label("x.com:alice", vec![atom_match("a1", "x.com:alice", 500)])
        .with_relationships(
            "a1",
            vec![
                triple("t1", alice.clone(), atom("p1", "follows", "follows"), atom("o1", "bob", "bob"), 3),
                triple("t2", alice, atom("p1", "follows", "follows"), atom("o2", "carol", "carol"), 2),
            ],
        )
}

fn open_server() -> ServerConfig {
    ServerConfig {
        rate_limit: 0,
        ..ServerConfig::default()
    }
}

fn build(manager: QueueManager, index: MockIndex, server: &ServerConfig) -> (TestServer, AppState, Arc<MockIndex>) {
    let index = Arc::new(index);
    let state = AppState::new(manager, index.clone(), SearchConfig::default());
    let router = create_router(state.clone(), server);
    (TestServer::new(router).unwrap(), state, index)
}

fn create_test_server() -> (TestServer, AppState, Arc<MockIndex>) {
    build(QueueManager::default(), indexed(), &open_server())
}

async fn activate(server: &TestServer, tab: u64) {
    server
        .post("/host/activated")
        .json(&json!({ "tab_id": tab }))
        .await
        .assert_status_ok();
}

async fn submit(server: &TestServer, query: &str) -> SubmitResponse {
    let response = server
        .post("/queue")
        .json(&json!({ "query": query, "source": "hover" }))
        .await;
    response.assert_status_ok();
    response.json()
}

/// Poll until no item of the current tab is still searching.
async fn resolved_queue(server: &TestServer) -> QueueResponse {
    for _ in 0..200 {
        let queue: QueueResponse = server.get("/queue").await.json();
        if queue.stats.searching == 0 {
            return queue;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("queue never resolved");
}

// =============================================================================
// HEALTH & STATUS
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let (server, _, _) = create_test_server();

    let response = server.get("/health").await;

    response.assert_status_ok();
    let health: HealthResponse = response.json();
    assert_eq!(health.status, "ok");
    assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_status_fresh_bridge() {
    let (server, state, _) = create_test_server();

    let status: StatusResponse = server.get("/status").await.json();

    assert_eq!(status.instance_id, state.instance_id);
    assert!(status.current_tab.is_none());
    assert_eq!(status.queued_tabs, 0);
    assert!(status.visible);
    assert!(!status.persistent);
}

// =============================================================================
// QUEUE
// =============================================================================

#[tokio::test]
async fn test_queue_without_active_tab_is_empty() {
    let (server, _, _) = create_test_server();

    let response = server.get("/queue").await;

    response.assert_status_ok();
    let queue: QueueResponse = response.json();
    assert!(queue.tab_id.is_none());
    assert!(queue.items.is_empty());
    assert_eq!(queue.stats.total, 0);
}

#[tokio::test]
async fn test_submit_without_active_tab_conflicts() {
    let (server, _, index) = create_test_server();

    let response = server
        .post("/queue")
        .json(&json!({ "query": "x.com:alice", "source": "hover" }))
        .await;

    response.assert_status(StatusCode::CONFLICT);
    assert_eq!(index.searches(), 0);
}

#[tokio::test]
async fn test_submit_rejects_empty_query() {
    let (server, _, _) = create_test_server();
    activate(&server, 1).await;

    let response = server
        .post("/queue")
        .json(&json!({ "query": "   ", "source": "manual" }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_submit_resolves_and_emits_events() {
    let (server, state, _) = create_test_server();
    activate(&server, 7).await;
    let mut events = state.events.subscribe();

    let submitted = submit(&server, "x.com:alice").await;
    assert!(!submitted.promoted);

    let queue = resolved_queue(&server).await;
    assert_eq!(queue.tab_id, Some(TabId(7)));
    assert_eq!(queue.items.len(), 1);
    assert_eq!(queue.items[0].id, submitted.item_id);
    assert_eq!(queue.items[0].result.status(), QueryStatus::Found);
    assert_eq!(queue.stats.found, 1);

    let added = events.recv().await.unwrap();
    assert_eq!(added.name(), "query:added");
    let updated = events.recv().await.unwrap();
    assert!(matches!(updated, QueueEvent::QueryUpdated { tab_id: TabId(7), .. }));
}

#[tokio::test]
async fn test_duplicate_submit_is_promoted() {
    let (server, _, index) = create_test_server();
    activate(&server, 1).await;

    let first = submit(&server, "x.com:alice").await;
    resolved_queue(&server).await;
    submit(&server, "nobody").await;
    resolved_queue(&server).await;

    let again = submit(&server, "x.com:alice").await;

    assert!(again.promoted);
    assert_eq!(again.item_id, first.item_id);
    let queue: QueueResponse = server.get("/queue").await.json();
    assert_eq!(queue.items[0].id, first.item_id);
    assert_eq!(index.searches(), 2);
}

#[tokio::test]
async fn test_pin_and_expand_toggle() {
    let (server, _, _) = create_test_server();
    activate(&server, 1).await;
    let submitted = submit(&server, "x.com:alice").await;
    let id = submitted.item_id.as_str();

    let pinned: ItemResponse = server.post(&format!("/queue/{id}/pin")).await.json();
    assert!(pinned.item.is_pinned);
    let expanded: ItemResponse = server.post(&format!("/queue/{id}/expand")).await.json();
    assert!(expanded.item.is_expanded);
    assert!(expanded.item.is_pinned);

    let unpinned: ItemResponse = server.post(&format!("/queue/{id}/pin")).await.json();
    assert!(!unpinned.item.is_pinned);
}

#[tokio::test]
async fn test_unknown_item_not_found() {
    let (server, _, _) = create_test_server();
    activate(&server, 1).await;

    server
        .post("/queue/missing/pin")
        .await
        .assert_status(StatusCode::NOT_FOUND);
    server
        .delete("/queue/missing")
        .await
        .assert_status(StatusCode::NOT_FOUND);
    server
        .post("/queue/missing/retry")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_remove_item() {
    let (server, _, _) = create_test_server();
    activate(&server, 1).await;
    let submitted = submit(&server, "x.com:alice").await;
    let path = format!("/queue/{}", submitted.item_id);

    server.delete(&path).await.assert_status(StatusCode::NO_CONTENT);
    server.delete(&path).await.assert_status(StatusCode::NOT_FOUND);

    let queue: QueueResponse = server.get("/queue").await.json();
    assert!(queue.items.is_empty());
}

#[tokio::test]
async fn test_clear_keeps_pinned_unless_all() {
    let (server, _, _) = create_test_server();
    activate(&server, 1).await;
    let keep = submit(&server, "x.com:alice").await;
    submit(&server, "nobody").await;
    server
        .post(&format!("/queue/{}/pin", keep.item_id))
        .await
        .assert_status_ok();

    let cleared: QueueResponse = server.post("/queue/clear").await.json();
    assert_eq!(cleared.items.len(), 1);
    assert_eq!(cleared.items[0].id, keep.item_id);

    let wiped: QueueResponse = server.post("/queue/clear?all=true").await.json();
    assert!(wiped.items.is_empty());
}

#[tokio::test]
async fn test_retry_after_failure() {
    let (server, _, index) = create_test_server();
    index.set_failing(true);
    activate(&server, 1).await;
    let submitted = submit(&server, "x.com:alice").await;

    let queue = resolved_queue(&server).await;
    assert_eq!(queue.items[0].result.status(), QueryStatus::Error);

    index.set_failing(false);
    let retried = server
        .post(&format!("/queue/{}/retry", submitted.item_id))
        .await;
    retried.assert_status_ok();

    let queue = resolved_queue(&server).await;
    assert_eq!(queue.items[0].result.status(), QueryStatus::Found);
    assert_eq!(index.searches(), 2);
}

#[tokio::test]
async fn test_queues_are_per_tab() {
    let (server, _, _) = create_test_server();
    activate(&server, 1).await;
    submit(&server, "x.com:alice").await;
    activate(&server, 2).await;

    let current: QueueResponse = server.get("/queue").await.json();
    assert_eq!(current.tab_id, Some(TabId(2)));
    assert!(current.items.is_empty());

    let first: QueueResponse = server.get("/tabs/1/queue").await.json();
    assert_eq!(first.items.len(), 1);
}

// =============================================================================
// HOST NOTIFICATIONS
// =============================================================================

#[tokio::test]
async fn test_close_clears_current_tab() {
    let (server, _, _) = create_test_server();
    activate(&server, 1).await;
    submit(&server, "x.com:alice").await;

    let response: CurrentTabResponse = server
        .post("/host/closed")
        .json(&json!({ "tab_id": 1 }))
        .await
        .json();
    assert!(response.current_tab.is_none());

    let tab: QueueResponse = server.get("/tabs/1/queue").await.json();
    assert!(tab.items.is_empty());
    server
        .post("/queue")
        .json(&json!({ "query": "x.com:alice", "source": "hover" }))
        .await
        .assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_window_focus_switches_to_its_active_tab() {
    let (server, _, _) = create_test_server();
    server
        .post("/host/sync")
        .json(&json!({
            "tabs": [
                { "tab_id": 1, "window_id": 10, "active": true },
                { "tab_id": 2, "window_id": 20, "active": true },
                { "tab_id": 3, "window_id": 20 }
            ],
            "current_tab": 1
        }))
        .await
        .assert_status_ok();

    let response: CurrentTabResponse = server
        .post("/host/focused")
        .json(&json!({ "window_id": 20 }))
        .await
        .json();
    assert_eq!(response.current_tab, Some(TabId(2)));

    let unknown: CurrentTabResponse = server
        .post("/host/focused")
        .json(&json!({ "window_id": 99 }))
        .await
        .json();
    assert_eq!(unknown.current_tab, Some(TabId(2)));
}

#[tokio::test]
async fn test_sync_restores_live_tabs_and_prunes_dead_ones() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("queues.db");

    {
        let storage = QueueStorage::redb(&path).unwrap();
        let mut manager = QueueManager::new(QueueConfig::default(), storage);
        for tab in [1, 2] {
            manager.switch_active_tab(TabId(tab));
            manager
                .add_query(atomlens_core::AtomQuery::new(
                    atomlens_core::QueryId::new(format!("q{tab}")),
                    "x.com:alice",
                    atomlens_core::QuerySource::Url,
                    1,
                ))
                .unwrap();
        }
    }

    let storage = QueueStorage::redb(&path).unwrap();
    let manager = QueueManager::new(QueueConfig::default(), storage);
    let (server, _, _) = build(manager, indexed(), &open_server());

    let report: HostSyncResponse = server
        .post("/host/sync")
        .json(&json!({
            "tabs": [{ "tab_id": 1, "window_id": 1, "active": true }],
            "current_tab": 1
        }))
        .await
        .json();

    assert_eq!(report.loaded, 1);
    assert_eq!(report.pruned, 1);
    assert_eq!(report.current_tab, Some(TabId(1)));

    let queue: QueueResponse = server.get("/queue").await.json();
    assert_eq!(queue.items.len(), 1);
    let status: StatusResponse = server.get("/status").await.json();
    assert!(status.persistent);
}

#[tokio::test]
async fn test_navigation_resets_badge_and_sets_context() {
    let (server, _, _) = create_test_server();
    activate(&server, 4).await;

    for query in ["x.com:alice", "x.com:alice", "0xabc"] {
        server
            .post("/tracking/4/atoms")
            .json(&json!({ "query": query, "source": "hover" }))
            .await
            .assert_status_ok();
    }
    let badge: BadgeResponse = server.get("/tracking/4/badge").await.json();
    assert_eq!(badge.count, 2);
    assert_eq!(badge.badge, "2");

    let after: BadgeResponse = server
        .post("/host/navigation")
        .json(&json!({ "tab_id": 4, "url": "https://example.org/post" }))
        .await
        .json();
    assert_eq!(after.count, 0);
    assert_eq!(after.badge, "");

    let queue: QueueResponse = server.get("/queue").await.json();
    assert_eq!(queue.context_url.as_deref(), Some("https://example.org/post"));
}

#[tokio::test]
async fn test_duplicate_detection_not_tracked_twice() {
    let (server, _, _) = create_test_server();

    let first: TrackOutcome = server
        .post("/tracking/3/atoms")
        .json(&json!({ "query": "@bob", "source": "highlight" }))
        .await
        .json();
    let second: TrackOutcome = server
        .post("/tracking/3/atoms")
        .json(&json!({ "query": "@bob", "source": "hover" }))
        .await
        .json();

    assert!(first.tracked);
    assert!(!second.tracked);
    assert_eq!(second.count, 1);
}

#[tokio::test]
async fn test_visibility_toggle() {
    let (server, state, _) = create_test_server();

    let hidden: VisibilityResponse = server
        .post("/host/visibility")
        .json(&json!({ "visible": false }))
        .await
        .json();
    assert!(!hidden.visible);
    assert!(!state.resolver.is_visible());

    activate(&server, 1).await;
    submit(&server, "x.com:alice").await;
    let shown: VisibilityResponse = server
        .post("/host/visibility")
        .json(&json!({ "visible": true }))
        .await
        .json();
    assert_eq!(shown.refreshed, 1);
}

// =============================================================================
// SEARCH & CACHE
// =============================================================================

#[tokio::test]
async fn test_search_endpoint() {
    let (server, _, index) = create_test_server();

    let response = server.get("/search?label=x.com:alice").await;
    response.assert_status_ok();
    let result: atomlens_core::SearchResult = response.json();
    assert_eq!(result.matches.len(), 1);
    assert_eq!(result.summary.total_matches, 1);

    server.get("/search?label=x.com:alice").await.assert_status_ok();
    assert_eq!(index.searches(), 1);

    let stats: serde_json::Value = server.get("/cache/stats").await.json();
    assert_eq!(stats["size"], 1);
    assert_eq!(stats["entries"][0]["hits"], 1);
}

#[tokio::test]
async fn test_search_rejects_blank_label() {
    let (server, _, _) = create_test_server();

    server
        .get("/search?label=%20")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_search_index_failure_is_bad_gateway() {
    let (server, _, index) = create_test_server();
    index.set_failing(true);

    server
        .get("/search?label=x.com:alice")
        .await
        .assert_status(StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_cache_invalidate() {
    let (server, _, index) = create_test_server();
    server.get("/search?label=x.com:alice").await.assert_status_ok();

    let one: InvalidateResponse = server
        .post("/cache/invalidate")
        .json(&json!({ "label": "x.com:alice" }))
        .await
        .json();
    assert_eq!(one.invalidated, 1);

    server.get("/search?label=x.com:alice").await.assert_status_ok();
    assert_eq!(index.searches(), 2);

    let all: InvalidateResponse = server.post("/cache/invalidate").json(&json!({})).await.json();
    assert_eq!(all.invalidated, 1);
}

#[tokio::test]
async fn test_partial_search() {
    let (server, _, _) = create_test_server();

    let result: atomlens_core::SearchResult =
        server.get("/search/partial?term=alice").await.json();
    assert_eq!(result.matches.len(), 1);
}

// =============================================================================
// SUGGESTIONS
// =============================================================================

#[tokio::test]
async fn test_suggestions_endpoint() {
    let (server, _, _) = create_test_server();

    let response = server
        .post("/suggestions")
        .json(&json!({
            "anchor": { "term_id": "a1", "label": "alice", "data": "x.com:alice" },
            "anchor_slot": "subject",
            "target_slot": "object"
        }))
        .await;

    response.assert_status_ok();
    let body: SuggestionsResponse = response.json();
    let ids: Vec<&str> = body.suggestions.iter().map(|s| s.atom_id.as_str()).collect();
    assert_eq!(ids, vec!["o1", "o2"]);
}

#[tokio::test]
async fn test_suggestions_fallback_when_index_down() {
    let (server, _, index) = create_test_server();
    index.set_failing(true);

    let body: SuggestionsResponse = server
        .post("/suggestions")
        .json(&json!({
            "anchor": { "term_id": "a1", "label": "alice", "data": "x.com:alice" },
            "anchor_slot": "subject",
            "target_slot": "predicate"
        }))
        .await
        .json();

    assert!(!body.suggestions.is_empty());
    assert!(body.suggestions.iter().all(|s| s.atom_id.starts_with("generic:")));
}

#[tokio::test]
async fn test_frequent_rejects_unknown_slot() {
    let (server, _, _) = create_test_server();

    server
        .get("/suggestions/frequent?slot=verb")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    server
        .get("/suggestions/frequent?slot=object&limit=5")
        .await
        .assert_status_ok();
}

// =============================================================================
// AUTHENTICATION
// =============================================================================

fn create_auth_test_server(key: &str) -> TestServer {
    let config = ServerConfig {
        api_key: Some(key.to_string()),
        ..open_server()
    };
    build(QueueManager::default(), indexed(), &config).0
}

#[tokio::test]
async fn test_auth_missing_header_rejected() {
    let server = create_auth_test_server("correct-key");

    server
        .get("/status")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_health_always_open() {
    let server = create_auth_test_server("correct-key");

    server.get("/health").await.assert_status_ok();
}

#[tokio::test]
async fn test_auth_valid_and_invalid_tokens() {
    let server = create_auth_test_server("correct-key");

    server
        .get("/status")
        .add_header(
            header::AUTHORIZATION,
            "Bearer correct-key".parse::<HeaderValue>().unwrap(),
        )
        .await
        .assert_status_ok();
    server
        .get("/status")
        .add_header(
            header::AUTHORIZATION,
            "correct-key".parse::<HeaderValue>().unwrap(),
        )
        .await
        .assert_status_ok();
    server
        .get("/status")
        .add_header(
            header::AUTHORIZATION,
            "Bearer wrong-key".parse::<HeaderValue>().unwrap(),
        )
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

// =============================================================================
// RATE LIMITING
// =============================================================================

#[tokio::test]
async fn test_rate_limit_returns_429() {
    let config = ServerConfig {
        rate_limit: 1,
        ..ServerConfig::default()
    };
    let (server, _, _) = build(QueueManager::default(), indexed(), &config);

    server.get("/health").await.assert_status_ok();
    let throttled = server.get("/health").await;
    throttled.assert_status(StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(throttled.header("retry-after"), "1");
    let body: serde_json::Value = throttled.json();
    assert_eq!(body["error"], "rate limit exceeded");
}

#[tokio::test]
async fn test_zero_rate_limit_disables_throttling() {
    let (server, _, _) = create_test_server();

    for _ in 0..20 {
        server.get("/health").await.assert_status_ok();
    }
}
