//! # API Endpoint Handlers
//!
//! Only the missing-current-tab precondition is reported as a conflict
//! (409). Remote index failures on `/search` map to 502; everything else
//! degrades inside the services.

use super::{
    AppState,
    types::{
        BadgeResponse, ClearParams, CurrentTabResponse, ErrorResponse, FrequentParams,
        HealthResponse, HostSyncRequest, HostSyncResponse, InvalidateRequest, InvalidateResponse,
        ItemResponse, NavigationRequest, PartialSearchParams, QueueResponse, SearchParams,
        StatusResponse, SubmitRequest, SubmitResponse, SuggestionRequest, SuggestionsResponse,
        TabActivatedRequest, TabClosedRequest, VisibilityRequest, VisibilityResponse,
        WindowFocusedRequest,
    },
};
use crate::search::CacheStats;
use crate::tracking::TrackOutcome;
use atomlens_core::{
    AtomlensError, DetectedAtom, HostTab, QueueEvent, QueueItemId, QueueManager, SearchResult,
    TabId, TabLifecycleEvent, now_millis,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        IntoResponse, Sse,
        sse::{Event as SseEvent, KeepAlive},
    },
};
use std::convert::Infallible;
use tokio_stream::{Stream, StreamExt as _, wrappers::BroadcastStream};
use tracing::debug;

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(ErrorResponse::new(message)))
}

fn core_error(e: AtomlensError) -> ApiError {
    let status = match e {
        AtomlensError::NoActiveTab => StatusCode::CONFLICT,
        AtomlensError::InvalidInput(_) | AtomlensError::InvalidStake(_) => {
            StatusCode::BAD_REQUEST
        }
        AtomlensError::Storage(_) | AtomlensError::Serialization(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    api_error(status, e.to_string())
}

fn item_not_found(item_id: &QueueItemId) -> ApiError {
    api_error(StatusCode::NOT_FOUND, format!("No queue item '{item_id}'"))
}

fn queue_snapshot(queue: &QueueManager, tab: Option<TabId>) -> QueueResponse {
    match tab {
        Some(tab) => QueueResponse {
            tab_id: Some(tab),
            context_url: queue.tab_context_url(tab).map(str::to_string),
            items: queue.get_queue_for_tab(tab),
            stats: queue.get_stats_for_tab(tab),
        },
        None => QueueResponse {
            tab_id: None,
            context_url: None,
            items: Vec::new(),
            stats: Default::default(),
        },
    }
}

// =============================================================================
// HEALTH & STATUS
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

pub async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let host_tabs = state.host.read().await.len();
    let queue = state.queue.read().await;

    Json(StatusResponse {
        instance_id: state.instance_id.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        current_tab: queue.current_tab(),
        queued_tabs: queue.tab_ids().len(),
        host_tabs,
        visible: state.resolver.is_visible(),
        persistent: queue.store().is_persistent(),
        cache_size: state.search.cache_stats().size,
    })
}

// =============================================================================
// HOST NOTIFICATIONS
// =============================================================================

/// Replace the live tab snapshot and restore persisted queues against it.
pub async fn host_sync_handler(
    State(state): State<AppState>,
    Json(request): Json<HostSyncRequest>,
) -> impl IntoResponse {
    let mut host = state.host.write().await;
    host.replace(request.tabs);

    let mut queue = state.queue.write().await;
    let report = queue.restore(&*host);
    if let Some(tab) = request.current_tab {
        host.set_active(tab);
        queue.switch_active_tab(tab);
    }

    Json(HostSyncResponse {
        loaded: report.loaded,
        pruned: report.pruned,
        current_tab: queue.current_tab(),
    })
}

pub async fn tab_activated_handler(
    State(state): State<AppState>,
    Json(request): Json<TabActivatedRequest>,
) -> impl IntoResponse {
    let mut host = state.host.write().await;
    match request.window_id {
        Some(window_id) => host.upsert(HostTab {
            tab_id: request.tab_id,
            window_id,
            active: true,
            url: request.url.clone(),
        }),
        None => host.set_active(request.tab_id),
    }

    let mut queue = state.queue.write().await;
    queue.handle_lifecycle(
        TabLifecycleEvent::Activated {
            tab_id: request.tab_id,
            url: request.url,
        },
        &*host,
    );
    Json(CurrentTabResponse {
        current_tab: queue.current_tab(),
    })
}

pub async fn tab_closed_handler(
    State(state): State<AppState>,
    Json(request): Json<TabClosedRequest>,
) -> impl IntoResponse {
    let mut host = state.host.write().await;
    host.remove(request.tab_id);

    let mut queue = state.queue.write().await;
    queue.handle_lifecycle(
        TabLifecycleEvent::Closed {
            tab_id: request.tab_id,
        },
        &*host,
    );
    state.tracking.tab_closed(request.tab_id);

    Json(CurrentTabResponse {
        current_tab: queue.current_tab(),
    })
}

pub async fn window_focused_handler(
    State(state): State<AppState>,
    Json(request): Json<WindowFocusedRequest>,
) -> impl IntoResponse {
    let host = state.host.read().await;
    let mut queue = state.queue.write().await;
    queue.handle_lifecycle(
        TabLifecycleEvent::WindowFocused {
            window_id: request.window_id,
        },
        &*host,
    );
    Json(CurrentTabResponse {
        current_tab: queue.current_tab(),
    })
}

/// A tab started loading a new page: reset its detections and, if a URL is
/// given, record it as the queue's context.
pub async fn navigation_handler(
    State(state): State<AppState>,
    Json(request): Json<NavigationRequest>,
) -> impl IntoResponse {
    let tab = request.tab_id;
    state.tracking.navigation_started(tab);

    if let Some(url) = request.url {
        let mut host = state.host.write().await;
        if let Some(mut entry) = host.get(tab).cloned() {
            entry.url = Some(url.clone());
            host.upsert(entry);
        }
        state.queue.write().await.set_tab_context_url(tab, url);
    }

    Json(BadgeResponse {
        tab_id: tab,
        count: state.tracking.count(tab),
        badge: state.tracking.badge_text(tab),
    })
}

/// Record UI visibility. Becoming visible refreshes the current tab.
pub async fn visibility_handler(
    State(state): State<AppState>,
    Json(request): Json<VisibilityRequest>,
) -> impl IntoResponse {
    state.resolver.set_visible(request.visible);

    let mut refreshed = 0;
    if request.visible {
        let current = state.queue.read().await.current_tab();
        if let Some(tab) = current {
            refreshed = state.resolver.refresh_tab(tab).await.len();
        }
    }

    Json(VisibilityResponse {
        visible: request.visible,
        refreshed,
    })
}

// =============================================================================
// QUEUE
// =============================================================================

/// Queue of the current tab; empty when no tab is active.
pub async fn queue_handler(State(state): State<AppState>) -> impl IntoResponse {
    let queue = state.queue.read().await;
    Json(queue_snapshot(&queue, queue.current_tab()))
}

pub async fn tab_queue_handler(
    State(state): State<AppState>,
    Path(tab_id): Path<u64>,
) -> impl IntoResponse {
    let queue = state.queue.read().await;
    Json(queue_snapshot(&queue, Some(TabId(tab_id))))
}

/// Queue a query on the current tab and start resolving it.
pub async fn submit_handler(
    State(state): State<AppState>,
    Json(request): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let query = request.to_query().map_err(core_error)?;
    let submitted = state.resolver.submit(query).await.map_err(core_error)?;
    Ok(Json(SubmitResponse {
        item_id: submitted.item_id,
        promoted: submitted.promoted,
    }))
}

pub async fn remove_handler(
    State(state): State<AppState>,
    Path(item_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let item_id = QueueItemId::new(item_id);
    let removed = state
        .queue
        .write()
        .await
        .remove_query(&item_id)
        .map_err(core_error)?;
    if removed {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(item_not_found(&item_id))
    }
}

pub async fn expand_handler(
    State(state): State<AppState>,
    Path(item_id): Path<String>,
) -> Result<Json<ItemResponse>, ApiError> {
    let item_id = QueueItemId::new(item_id);
    let toggled = state
        .queue
        .write()
        .await
        .toggle_expanded(&item_id)
        .map_err(core_error)?;
    toggled
        .map(|item| Json(ItemResponse { item }))
        .ok_or_else(|| item_not_found(&item_id))
}

pub async fn pin_handler(
    State(state): State<AppState>,
    Path(item_id): Path<String>,
) -> Result<Json<ItemResponse>, ApiError> {
    let item_id = QueueItemId::new(item_id);
    let toggled = state
        .queue
        .write()
        .await
        .toggle_pinned(&item_id)
        .map_err(core_error)?;
    toggled
        .map(|item| Json(ItemResponse { item }))
        .ok_or_else(|| item_not_found(&item_id))
}

/// User-triggered retry. Responds with the item in `searching` state.
pub async fn retry_handler(
    State(state): State<AppState>,
    Path(item_id): Path<String>,
) -> Result<Json<ItemResponse>, ApiError> {
    let item_id = QueueItemId::new(item_id);
    let task = state.resolver.retry(&item_id).await.map_err(core_error)?;
    if task.is_none() {
        return Err(item_not_found(&item_id));
    }

    let queue = state.queue.read().await;
    queue
        .current_tab()
        .and_then(|tab| queue.item(tab, &item_id).cloned())
        .map(|item| Json(ItemResponse { item }))
        .ok_or_else(|| item_not_found(&item_id))
}

/// Clear the current tab: unpinned items, or everything with `?all=true`.
pub async fn clear_handler(
    State(state): State<AppState>,
    Query(params): Query<ClearParams>,
) -> Result<Json<QueueResponse>, ApiError> {
    let mut queue = state.queue.write().await;
    if params.all {
        queue.clear_all().map_err(core_error)?;
    } else {
        queue.clear_unpinned().map_err(core_error)?;
    }
    Ok(Json(queue_snapshot(&queue, queue.current_tab())))
}

// =============================================================================
// SEARCH & CACHE
// =============================================================================

pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResult>, ApiError> {
    let label = params.label.trim();
    if label.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "label must not be empty"));
    }
    state
        .search
        .search(label)
        .await
        .map(|result| Json(result.as_ref().clone()))
        .map_err(|e| api_error(StatusCode::BAD_GATEWAY, e.to_string()))
}

pub async fn search_partial_handler(
    State(state): State<AppState>,
    Query(params): Query<PartialSearchParams>,
) -> Result<Json<SearchResult>, ApiError> {
    let term = params.term.trim();
    if term.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "term must not be empty"));
    }
    state
        .search
        .search_partial(term)
        .await
        .map(Json)
        .map_err(|e| api_error(StatusCode::BAD_GATEWAY, e.to_string()))
}

pub async fn invalidate_handler(
    State(state): State<AppState>,
    Json(request): Json<InvalidateRequest>,
) -> impl IntoResponse {
    let invalidated = match request.label {
        Some(label) => usize::from(state.search.invalidate(&label)),
        None => {
            let size = state.search.cache_stats().size;
            state.search.invalidate_all();
            size
        }
    };
    Json(InvalidateResponse { invalidated })
}

pub async fn cache_stats_handler(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.search.cache_stats())
}

// =============================================================================
// SUGGESTIONS
// =============================================================================

pub async fn suggestions_handler(
    State(state): State<AppState>,
    Json(request): Json<SuggestionRequest>,
) -> impl IntoResponse {
    let suggestions = state
        .suggestions
        .get_suggested_atoms_for_position(
            &request.anchor,
            request.anchor_slot,
            request.target_slot,
            request.search.as_deref(),
        )
        .await;
    Json(SuggestionsResponse { suggestions })
}

pub async fn frequent_handler(
    State(state): State<AppState>,
    Query(params): Query<FrequentParams>,
) -> impl IntoResponse {
    let suggestions = state
        .suggestions
        .most_frequent_for_slot(params.slot, params.limit)
        .await;
    Json(SuggestionsResponse { suggestions })
}

// =============================================================================
// TRACKING
// =============================================================================

pub async fn track_handler(
    State(state): State<AppState>,
    Path(tab_id): Path<u64>,
    Json(mut atom): Json<DetectedAtom>,
) -> Result<Json<TrackOutcome>, ApiError> {
    if atom.query.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "query must not be empty"));
    }
    if atom.detected_at == 0 {
        atom.detected_at = now_millis();
    }
    Ok(Json(state.tracking.track_atom(TabId(tab_id), atom)))
}

pub async fn badge_handler(
    State(state): State<AppState>,
    Path(tab_id): Path<u64>,
) -> impl IntoResponse {
    let tab = TabId(tab_id);
    Json(BadgeResponse {
        tab_id: tab,
        count: state.tracking.count(tab),
        badge: state.tracking.badge_text(tab),
    })
}

// =============================================================================
// EVENTS (SSE)
// =============================================================================

/// Stream queue events. A new client first receives `tab:switched` for the
/// current tab so it can render without a separate fetch.
pub async fn events_handler(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let rx = state.events.subscribe();

    let snapshot = {
        let queue = state.queue.read().await;
        queue
            .current_tab()
            .map(|tab_id| QueueEvent::TabSwitched {
                tab_id,
                queue: queue.get_queue_for_tab(tab_id),
            })
    };
    debug!(snapshot = snapshot.is_some(), "SSE client connected");

    let snapshot_stream = tokio_stream::iter(snapshot.into_iter().filter_map(to_sse).map(Ok::<_, Infallible>));
    let live_stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(event) => to_sse(event).map(Ok::<_, Infallible>),
        // Lagged receivers skip what they missed.
        Err(_) => None,
    });

    Sse::new(snapshot_stream.chain(live_stream)).keep_alive(KeepAlive::default())
}

fn to_sse(event: QueueEvent) -> Option<SseEvent> {
    let data = serde_json::to_string(&event).ok()?;
    Some(SseEvent::default().event(event.name()).data(data))
}
