//! # atomlens HTTP API Module
//!
//! The bridge between the extension's background script and the engine.
//!
//! ## Endpoints
//!
//! - `GET /health`, `GET /status`
//! - `POST /host/sync|activated|closed|focused|navigation|visibility` - host tab notifications
//! - `GET /queue`, `GET /tabs/{tab_id}/queue` - queue snapshots
//! - `POST /queue` - submit a query; `DELETE /queue/{item_id}` - remove an item
//! - `POST /queue/{item_id}/expand|pin|retry`, `POST /queue/clear`
//! - `GET /search`, `GET /search/partial`, `POST /cache/invalidate`, `GET /cache/stats`
//! - `POST /suggestions`, `GET /suggestions/frequent`
//! - `POST /tracking/{tab_id}/atoms`, `GET /tracking/{tab_id}/badge`
//! - `GET /events` - Server-Sent Events stream of queue events
//!
//! ## Security Configuration
//!
//! Set from [`ServerConfig`]: allowed CORS origins (localhost only by
//! default), requests per second, and an optional bearer API key.

mod auth;
mod handlers;
mod middleware;
mod types;

pub use auth::ApiKey;
pub use middleware::{GlobalRateLimiter, create_rate_limiter};
#[allow(unused_imports)]
pub use types::{
    BadgeResponse, ClearParams, CurrentTabResponse, ErrorResponse, FrequentParams,
    HealthResponse, HostSyncRequest, HostSyncResponse, InvalidateRequest, InvalidateResponse,
    ItemResponse, NavigationRequest, PartialSearchParams, QueueResponse, SearchParams,
    StatusResponse, SubmitRequest, SubmitResponse, SuggestionRequest, SuggestionsResponse,
    TabActivatedRequest, TabClosedRequest, VisibilityRequest, VisibilityResponse,
    WindowFocusedRequest,
};

use crate::config::{Config, ServerConfig};
use crate::error::AppError;
use crate::index::{AtomIndex, GraphqlAtomIndex};
use crate::resolver::{QueryResolver, SharedQueue};
use crate::search::{SearchClient, SearchConfig};
use crate::suggest::SuggestionEngine;
use crate::tracking::TrackingService;
use atomlens_core::{HostTabRegistry, LabelTransformer, QueueEvent, QueueManager, QueueStorage};
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{delete, get, post},
};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{RwLock, broadcast};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Capacity of the SSE fan-out; slower clients skip what they missed.
const EVENT_CHANNEL_CAPACITY: usize = 256;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state. Lock order is `host` before `queue`.
#[derive(Clone)]
pub struct AppState {
    pub queue: SharedQueue,
    /// Live tabs as last reported by the extension.
    pub host: Arc<RwLock<HostTabRegistry>>,
    pub search: SearchClient,
    pub suggestions: SuggestionEngine,
    pub tracking: Arc<TrackingService>,
    pub resolver: QueryResolver,
    pub events: broadcast::Sender<QueueEvent>,
    pub instance_id: String,
    pub started_at: Instant,
}

impl AppState {
    /// Wire the services around `manager` and `index`.
    ///
    /// Queue events are forwarded to the SSE broadcast channel.
    pub fn new(manager: QueueManager, index: Arc<dyn AtomIndex>, search: SearchConfig) -> Self {
        let labels = Arc::new(LabelTransformer::new());
        let search = SearchClient::new(Arc::clone(&index), Arc::clone(&labels), search);
        let suggestions = SuggestionEngine::new(index, labels);
        let tracking = Arc::new(TrackingService::new(search.clone()));

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let sender = events.clone();
        manager.subscribe(move |event| {
            // No receivers is the normal state without SSE clients.
            let _ = sender.send(event.clone());
        });

        let queue: SharedQueue = Arc::new(RwLock::new(manager));
        let resolver = QueryResolver::new(Arc::clone(&queue), search.clone());

        Self {
            queue,
            host: Arc::new(RwLock::new(HostTabRegistry::new())),
            search,
            suggestions,
            tracking,
            resolver,
            events,
            instance_id: uuid::Uuid::new_v4().to_string(),
            started_at: Instant::now(),
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build the CORS layer from the configured origins.
///
/// - `["*"]`: allows all origins
/// - empty: localhost only
/// - otherwise: the listed origins
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        tracing::warn!("CORS: Allowing ALL origins. This is insecure outside development!");
        return CorsLayer::permissive();
    }
    if origins.is_empty() {
        tracing::info!("CORS: No origins configured, defaulting to localhost only");
        return build_localhost_cors();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(hv) => {
                tracing::info!("CORS: Allowing origin: {}", origin);
                Some(hv)
            }
            Err(e) => {
                tracing::warn!("CORS: Invalid origin '{}': {}", origin, e);
                None
            }
        })
        .collect();

    if allowed.is_empty() {
        tracing::warn!("CORS: No valid origins configured, defaulting to localhost only");
        return build_localhost_cors();
    }
    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// Build a restrictive CORS layer that only allows localhost origins.
fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:8787",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8787",
    ]
    .into_iter()
    .filter_map(|o| o.parse::<HeaderValue>().ok())
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. CORS - handles preflight requests
/// 3. Rate Limiting - if enabled
/// 4. Authentication - if an API key is configured
pub fn create_router(state: AppState, server: &ServerConfig) -> Router {
    let cors = build_cors_layer(&server.cors_origins);

    let rate_limiter = NonZeroU32::new(server.rate_limit).map(create_rate_limiter);
    match rate_limiter {
        Some(_) => tracing::info!(per_second = server.rate_limit, "Request throttling enabled"),
        None => tracing::info!("Request throttling disabled"),
    }

    let api_key = server.api_key.as_deref().and_then(ApiKey::new);
    if api_key.is_some() {
        tracing::info!("API key authentication enabled");
    } else {
        tracing::warn!(
            "API key authentication DISABLED - every endpoint is open to local callers. \
             Set ATOMLENS_API_KEY to enable authentication."
        );
    }

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/status", get(handlers::status_handler))
        .route("/host/sync", post(handlers::host_sync_handler))
        .route("/host/activated", post(handlers::tab_activated_handler))
        .route("/host/closed", post(handlers::tab_closed_handler))
        .route("/host/focused", post(handlers::window_focused_handler))
        .route("/host/navigation", post(handlers::navigation_handler))
        .route("/host/visibility", post(handlers::visibility_handler))
        .route(
            "/queue",
            get(handlers::queue_handler).post(handlers::submit_handler),
        )
        .route("/queue/clear", post(handlers::clear_handler))
        .route("/queue/{item_id}", delete(handlers::remove_handler))
        .route("/queue/{item_id}/expand", post(handlers::expand_handler))
        .route("/queue/{item_id}/pin", post(handlers::pin_handler))
        .route("/queue/{item_id}/retry", post(handlers::retry_handler))
        .route("/tabs/{tab_id}/queue", get(handlers::tab_queue_handler))
        .route("/search", get(handlers::search_handler))
        .route("/search/partial", get(handlers::search_partial_handler))
        .route("/cache/invalidate", post(handlers::invalidate_handler))
        .route("/cache/stats", get(handlers::cache_stats_handler))
        .route("/suggestions", post(handlers::suggestions_handler))
        .route("/suggestions/frequent", get(handlers::frequent_handler))
        .route("/tracking/{tab_id}/atoms", post(handlers::track_handler))
        .route("/tracking/{tab_id}/badge", get(handlers::badge_handler))
        .route("/events", get(handlers::events_handler));

    if let Some(key) = api_key {
        router = router.layer(axum_middleware::from_fn_with_state(
            key,
            auth::api_key_auth_middleware,
        ));
    }

    if let Some(limiter) = rate_limiter {
        router = router.layer(axum_middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit_middleware,
        ));
    }

    router
        .layer(axum::extract::DefaultBodyLimit::max(2 * 1024 * 1024))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Build the production state from `config`: GraphQL index and redb queues.
pub fn build_state(config: &Config) -> Result<AppState, AppError> {
    let index = GraphqlAtomIndex::new(
        config.index.endpoint.clone(),
        config.index_timeout(),
        config.index.api_key.clone(),
    )?;
    let storage = QueueStorage::redb(&config.queue.database)?;
    let manager = QueueManager::new(config.queue_config(), storage);
    Ok(AppState::new(
        manager,
        Arc::new(index),
        config.search_config(),
    ))
}

/// Start the HTTP server and run until Ctrl-C.
pub async fn run_server(config: &Config) -> Result<(), AppError> {
    let state = build_state(config)?;
    let router = create_router(state, &config.server);
    let addr = config.server.addr();

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(index = %config.index.endpoint, "atomlens bridge listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("atomlens bridge stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
