//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API.

use atomlens_core::{
    AtomQuery, AtomSummary, AtomlensError, CreationData, HostTab, QueryId, QuerySource,
    QueueItem, QueueItemId, QueueStats, Slot, TabId, TripleSuggestion, WindowId, now_millis,
    primitives::{MAX_QUERY_LENGTH, MAX_SUGGESTIONS},
};
use serde::{Deserialize, Serialize};

// =============================================================================
// HEALTH / STATUS
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Bridge status response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub instance_id: String,
    pub uptime_secs: u64,
    pub current_tab: Option<TabId>,
    /// Tabs holding a queue in memory.
    pub queued_tabs: usize,
    /// Live tabs known from the host.
    pub host_tabs: usize,
    pub visible: bool,
    pub persistent: bool,
    pub cache_size: usize,
}

/// Error body shared by every failing route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

// =============================================================================
// HOST NOTIFICATIONS
// =============================================================================

/// Full tab snapshot sent by the extension at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostSyncRequest {
    pub tabs: Vec<HostTab>,
    /// The focused tab, made current after restoring.
    #[serde(default)]
    pub current_tab: Option<TabId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostSyncResponse {
    pub loaded: usize,
    pub pruned: usize,
    pub current_tab: Option<TabId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TabActivatedRequest {
    pub tab_id: TabId,
    /// Lets the registry learn tabs it has not seen in a sync.
    #[serde(default)]
    pub window_id: Option<WindowId>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TabClosedRequest {
    pub tab_id: TabId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowFocusedRequest {
    pub window_id: WindowId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationRequest {
    pub tab_id: TabId,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisibilityRequest {
    pub visible: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisibilityResponse {
    pub visible: bool,
    /// Items re-resolved on the current tab.
    pub refreshed: usize,
}

/// Current tab after a host notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentTabResponse {
    pub current_tab: Option<TabId>,
}

// =============================================================================
// QUEUE
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueResponse {
    pub tab_id: Option<TabId>,
    pub context_url: Option<String>,
    pub items: Vec<QueueItem>,
    pub stats: QueueStats,
}

/// A query detected by a content script or typed by the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub query: String,
    pub source: QuerySource,
    /// Caller-chosen id; a fresh one is generated when absent.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub creation_data: Option<CreationData>,
}

impl SubmitRequest {
    /// Convert to an `AtomQuery`, validating the query text.
    pub fn to_query(&self) -> Result<AtomQuery, AtomlensError> {
        let text = self.query.trim();
        if text.is_empty() {
            return Err(AtomlensError::InvalidInput("query must not be empty".to_string()));
        }
        if text.len() > MAX_QUERY_LENGTH {
            return Err(AtomlensError::InvalidInput(format!(
                "query exceeds {MAX_QUERY_LENGTH} bytes"
            )));
        }

        let id = self
            .id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let query = AtomQuery::new(QueryId::new(id), text, self.source, now_millis());
        Ok(match &self.creation_data {
            Some(data) => query.with_creation_data(data.clone()),
            None => query,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub item_id: QueueItemId,
    pub promoted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemResponse {
    pub item: QueueItem,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClearParams {
    /// Also drop pinned items.
    #[serde(default)]
    pub all: bool,
}

// =============================================================================
// SEARCH & CACHE
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchParams {
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartialSearchParams {
    pub term: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvalidateRequest {
    /// Label to drop; the whole cache when absent.
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvalidateResponse {
    pub invalidated: usize,
}

// =============================================================================
// SUGGESTIONS
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestionRequest {
    pub anchor: AtomSummary,
    pub anchor_slot: Slot,
    pub target_slot: Slot,
    #[serde(default)]
    pub search: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestionsResponse {
    pub suggestions: Vec<TripleSuggestion>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrequentParams {
    pub slot: Slot,
    #[serde(default = "default_frequent_limit")]
    pub limit: usize,
}

fn default_frequent_limit() -> usize {
    MAX_SUGGESTIONS
}

// =============================================================================
// TRACKING
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BadgeResponse {
    pub tab_id: TabId,
    pub count: usize,
    pub badge: String,
}
