//! # Search Client
//!
//! Cached, coalescing front for `AtomIndex::search_by_label`.
//!
//! ## Lookup order
//!
//! 1. A fresh cache entry is returned directly and its hit counter bumped.
//! 2. A search already in flight for the label is joined; every joiner gets
//!    the same `Arc<SearchResult>` (or the same error).
//! 3. Otherwise the remote call is spawned as its own task, so it runs to
//!    completion even if every caller goes away, and the result is cached.
//!
//! Failures are never cached. The cache holds at most `max_cache_size`
//! labels; inserting past that evicts the entry written longest ago.

use crate::index::{AtomIndex, IndexError};
use atomlens_core::primitives::{DEFAULT_CACHE_TIMEOUT_SECS, DEFAULT_MAX_CACHE_SIZE};
use atomlens_core::{LabelTransformer, SearchResult};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;

// =============================================================================
// CONFIGURATION & ERRORS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchConfig {
    /// Age after which a cached entry is treated as a miss.
    pub cache_timeout: Duration,
    /// Maximum number of cached labels.
    pub max_cache_size: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            cache_timeout: Duration::from_secs(DEFAULT_CACHE_TIMEOUT_SECS),
            max_cache_size: DEFAULT_MAX_CACHE_SIZE,
        }
    }
}

/// Search failure, shared between coalesced callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    #[error(transparent)]
    Index(#[from] IndexError),

    /// The spawned search task panicked or was cancelled by runtime shutdown.
    #[error("Search task failed: {0}")]
    Task(String),
}

// =============================================================================
// CACHE STATE
// =============================================================================

type SharedSearch = Shared<BoxFuture<'static, Result<Arc<SearchResult>, SearchError>>>;

#[derive(Debug)]
struct CacheEntry {
    data: Arc<SearchResult>,
    /// Insertion time. Hits do not refresh it.
    timestamp: Instant,
    hits: u64,
}

#[derive(Default)]
struct SearchState {
    cache: HashMap<String, CacheEntry>,
    in_flight: HashMap<String, SharedSearch>,
}

impl SearchState {
    fn insert(&mut self, label: String, data: Arc<SearchResult>, max_size: usize) {
        if !self.cache.contains_key(&label) && self.cache.len() >= max_size {
            let oldest = self
                .cache
                .iter()
                .min_by_key(|(_, e)| e.timestamp)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                debug!(label = %oldest, "evicting oldest search result");
                self.cache.remove(&oldest);
            }
        }
        self.cache.insert(
            label,
            CacheEntry {
                data,
                timestamp: Instant::now(),
                hits: 0,
            },
        );
    }
}

fn lock(state: &Mutex<SearchState>) -> MutexGuard<'_, SearchState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One cache entry as reported by [`SearchClient::cache_stats`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheEntryStats {
    pub label: String,
    pub age_ms: u64,
    pub hits: u64,
    pub expired: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
    pub in_flight: usize,
    /// Sorted by label.
    pub entries: Vec<CacheEntryStats>,
}

// =============================================================================
// CLIENT
// =============================================================================

/// Cached search client. Cheap to clone; clones share the cache.
#[derive(Clone)]
pub struct SearchClient {
    index: Arc<dyn AtomIndex>,
    labels: Arc<LabelTransformer>,
    config: SearchConfig,
    state: Arc<Mutex<SearchState>>,
}

impl std::fmt::Debug for SearchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SearchClient {
    pub fn new(
        index: Arc<dyn AtomIndex>,
        labels: Arc<LabelTransformer>,
        config: SearchConfig,
    ) -> Self {
        Self {
            index,
            labels,
            config,
            state: Arc::new(Mutex::new(SearchState::default())),
        }
    }

    pub fn config(&self) -> SearchConfig {
        self.config
    }

    pub fn labels(&self) -> &Arc<LabelTransformer> {
        &self.labels
    }

    /// Search atoms by exact label.
    pub async fn search(&self, label: &str) -> Result<Arc<SearchResult>, SearchError> {
        let pending = {
            let mut state = lock(&self.state);

            if let Some(entry) = state.cache.get_mut(label) {
                if entry.timestamp.elapsed() < self.config.cache_timeout {
                    entry.hits = entry.hits.saturating_add(1);
                    return Ok(Arc::clone(&entry.data));
                }
            }

            match state.in_flight.get(label) {
                Some(pending) => pending.clone(),
                None => {
                    let pending = self.spawn_fetch(label.to_string());
                    state.in_flight.insert(label.to_string(), pending.clone());
                    pending
                }
            }
        };
        pending.await
    }

    /// Start the remote call for `label` on its own task.
    ///
    /// Called with the state lock held, so the task cannot clear the
    /// in-flight marker before it has been registered.
    fn spawn_fetch(&self, label: String) -> SharedSearch {
        let index = Arc::clone(&self.index);
        let labels = Arc::clone(&self.labels);
        let state = Arc::clone(&self.state);
        let max_size = self.config.max_cache_size;

        let task = tokio::spawn(async move {
            debug!(label = %label, "searching atom index");
            let outcome = index
                .search_by_label(&label)
                .await
                .map(|mut matches| {
                    for m in &mut matches {
                        labels.decorate_match(m);
                    }
                    Arc::new(SearchResult::new(matches))
                })
                .map_err(SearchError::from);

            let mut state = lock(&state);
            state.in_flight.remove(&label);
            if let Ok(result) = &outcome {
                state.insert(label, Arc::clone(result), max_size);
            }
            outcome
        });

        async move {
            task.await
                .map_err(|e| SearchError::Task(e.to_string()))?
        }
        .boxed()
        .shared()
    }

    /// Autocomplete search. Not cached and not coalesced.
    pub async fn search_partial(&self, term: &str) -> Result<SearchResult, SearchError> {
        let mut matches = self.index.search_partial(term).await?;
        for m in &mut matches {
            self.labels.decorate_match(m);
        }
        Ok(SearchResult::new(matches))
    }

    /// Warm the cache for `labels` in the background. Failures are logged.
    pub fn prefetch<I>(&self, labels: I)
    where
        I: IntoIterator<Item = String>,
    {
        for label in labels {
            let client = self.clone();
            tokio::spawn(async move {
                if let Err(e) = client.search(&label).await {
                    debug!(label = %label, error = %e, "prefetch failed");
                }
            });
        }
    }

    /// Drop the cached result for `label`. Returns whether one existed.
    pub fn invalidate(&self, label: &str) -> bool {
        lock(&self.state).cache.remove(label).is_some()
    }

    pub fn invalidate_all(&self) {
        lock(&self.state).cache.clear();
    }

    pub fn cache_stats(&self) -> CacheStats {
        let state = lock(&self.state);
        let mut entries: Vec<CacheEntryStats> = state
            .cache
            .iter()
            .map(|(label, entry)| {
                let age = entry.timestamp.elapsed();
                CacheEntryStats {
                    label: label.clone(),
                    age_ms: age.as_millis() as u64,
                    hits: entry.hits,
                    expired: age >= self.config.cache_timeout,
                }
            })
            .collect();
        entries.sort_by(|a, b| a.label.cmp(&b.label));

        CacheStats {
            size: state.cache.len(),
            max_size: self.config.max_cache_size,
            in_flight: state.in_flight.len(),
            entries,
        }
    }
}
