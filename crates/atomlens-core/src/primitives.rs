//! # Primitives
//!
//! Hardcoded runtime constants for atomlens-core.
//!
//! These are compiled into the binary. Values that deployments tune
//! (queue size, cache timeout) only provide defaults here; the binary's
//! config layer overrides them.

// =============================================================================
// QUEUE
// =============================================================================

/// Default cap on unpinned items per tab queue. `0` disables eviction.
pub const DEFAULT_MAX_ITEMS: usize = 50;

/// Queue deduplication is on unless configured otherwise.
pub const DEFAULT_DEDUPLICATE: bool = true;

/// Prefix of the per-tab key under which a queue record is persisted.
pub const STORAGE_KEY_PREFIX: &str = "tab_queue_";

/// Longest query string accepted at the API boundary.
pub const MAX_QUERY_LENGTH: usize = 2048;

// =============================================================================
// PERSISTENCE FORMAT
// =============================================================================

/// Magic bytes for a persisted tab queue record.
pub const MAGIC_BYTES: &[u8; 4] = b"ATLQ";

/// Current record format version.
///
/// Increment this when making breaking changes to `TabQueueRecord`.
pub const FORMAT_VERSION: u8 = 1;

// =============================================================================
// SEARCH CACHE
// =============================================================================

/// Default age after which a cached search result is treated as a miss.
pub const DEFAULT_CACHE_TIMEOUT_SECS: u64 = 300;

/// Default number of labels kept in the search cache.
pub const DEFAULT_MAX_CACHE_SIZE: usize = 100;

/// Number of matches kept in a `MatchSummary`.
pub const SUMMARY_TOP_MATCHES: usize = 3;

// =============================================================================
// SUGGESTION RANKING
// =============================================================================

/// Relationships sampled around an anchor atom.
pub const ANCHOR_SAMPLE_SIZE: u32 = 50;

/// Relationships sampled for the type-pattern fallback.
pub const PATTERN_SAMPLE_SIZE: u32 = 200;

/// Relationships sampled by `most_frequent_for_slot`.
pub const FREQUENT_SAMPLE_SIZE: u32 = 500;

/// Maximum suggestions returned for an anchor.
pub const MAX_SUGGESTIONS: usize = 10;

/// Upper bound on the `limit` accepted by `most_frequent_for_slot`.
pub const MAX_FREQUENT_LIMIT: usize = 100;

// =============================================================================
// TRACKING
// =============================================================================

/// Counts above this render as "99+" on the badge.
pub const BADGE_OVERFLOW: usize = 99;
