//! Wire shapes and validation of the API request/response types.

#![allow(clippy::unwrap_used, clippy::panic)]

use atomlens::api::{
    FrequentParams, HealthResponse, HostSyncRequest, InvalidateRequest, SubmitRequest,
    TabActivatedRequest,
};
use atomlens_core::{AtomlensError, QuerySource, Slot, TabId, primitives::MAX_QUERY_LENGTH};
use serde_json::json;

fn submit(query: &str) -> SubmitRequest {
    SubmitRequest {
        query: query.to_string(),
        source: QuerySource::Manual,
        id: None,
        creation_data: None,
    }
}

// =============================================================================
// SUBMIT
// =============================================================================

#[test]
fn submit_trims_query_and_generates_id() {
    let query = submit("  vitalik.eth \n").to_query().unwrap();

    assert_eq!(query.query, "vitalik.eth");
    assert_eq!(query.source, QuerySource::Manual);
    assert!(!query.id.as_str().is_empty());
    assert!(query.timestamp > 0);
}

#[test]
fn submit_keeps_caller_id() {
    let mut request = submit("0xabc");
    request.id = Some("from-content-script".to_string());

    let query = request.to_query().unwrap();
    assert_eq!(query.id.as_str(), "from-content-script");
}

#[test]
fn submit_empty_caller_id_is_replaced() {
    let mut request = submit("0xabc");
    request.id = Some(String::new());

    let query = request.to_query().unwrap();
    assert!(!query.id.as_str().is_empty());
}

#[test]
fn submit_rejects_blank_query() {
    let err = submit(" \t ").to_query().unwrap_err();
    assert!(matches!(err, AtomlensError::InvalidInput(_)));
}

#[test]
fn submit_rejects_oversized_query() {
    let long = "a".repeat(MAX_QUERY_LENGTH + 1);
    let err = submit(&long).to_query().unwrap_err();
    assert!(matches!(err, AtomlensError::InvalidInput(_)));

    let limit = "a".repeat(MAX_QUERY_LENGTH);
    assert!(submit(&limit).to_query().is_ok());
}

#[test]
fn submit_deserializes_minimal_body() {
    let request: SubmitRequest =
        serde_json::from_value(json!({ "query": "@alice", "source": "highlight" })).unwrap();

    assert_eq!(request.source, QuerySource::Highlight);
    assert!(request.id.is_none());
    assert!(request.creation_data.is_none());
}

#[test]
fn submit_rejects_unknown_source() {
    let result: Result<SubmitRequest, _> =
        serde_json::from_value(json!({ "query": "@alice", "source": "telepathy" }));
    assert!(result.is_err());
}

// =============================================================================
// HOST
// =============================================================================

#[test]
fn host_sync_current_tab_is_optional() {
    let request: HostSyncRequest = serde_json::from_value(json!({
        "tabs": [{ "tab_id": 3, "window_id": 1, "active": true, "url": "https://x.com/alice" }]
    }))
    .unwrap();

    assert_eq!(request.tabs.len(), 1);
    assert_eq!(request.tabs[0].tab_id, TabId(3));
    assert!(request.current_tab.is_none());
}

#[test]
fn tab_activated_accepts_bare_id() {
    let request: TabActivatedRequest = serde_json::from_value(json!({ "tab_id": 9 })).unwrap();

    assert_eq!(request.tab_id, TabId(9));
    assert!(request.window_id.is_none());
    assert!(request.url.is_none());
}

// =============================================================================
// MISC
// =============================================================================

#[test]
fn frequent_limit_defaults() {
    let params: FrequentParams = serde_json::from_value(json!({ "slot": "predicate" })).unwrap();

    assert_eq!(params.slot, Slot::Predicate);
    assert_eq!(params.limit, atomlens_core::primitives::MAX_SUGGESTIONS);
}

#[test]
fn invalidate_without_label_means_everything() {
    let request: InvalidateRequest = serde_json::from_value(json!({})).unwrap();
    assert!(request.label.is_none());
}

#[test]
fn health_reports_crate_version() {
    let health = HealthResponse::default();
    let value = serde_json::to_value(&health).unwrap();

    assert_eq!(value["status"], "ok");
    assert_eq!(value["version"], env!("CARGO_PKG_VERSION"));
}
