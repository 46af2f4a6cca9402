//! # Core Type Definitions
//!
//! This module contains all core types shared by the queue manager, the
//! ranking engine and the binary:
//! - Tab, window, query and queue-item identifiers
//! - Query representation (`AtomQuery`, `QuerySource`, `CreationData`)
//! - Resolved data (`AtomMatch`, `VaultAggregate`, `QueryResult`)
//! - Queue rows and persisted records (`QueueItem`, `TabQueueRecord`)
//! - Relationship data for ranking (`Slot`, `AtomSummary`, `Triple`, `TripleSuggestion`)
//! - Error types (`AtomlensError`)
//!
//! ## Serialization
//!
//! Persisted types are written with postcard, which is not self-describing.
//! None of them use `skip_serializing_if`, `flatten` or untagged enums.

use crate::stake::Stake;
use crate::summary::MatchSummary;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Browser tab identifier, issued by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TabId(pub u64);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Browser window identifier, issued by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WindowId(pub u64);

/// Opaque unique token identifying one `AtomQuery`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QueryId(pub String);

impl QueryId {
    /// Create a query id from any string token.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of one row in a tab queue.
///
/// Derived from the query id, the insertion time and a per-manager sequence
/// number, so two rows holding the same query text never share an id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QueueItemId(pub String);

impl QueueItemId {
    /// Create an item id from an existing string (e.g. a path parameter).
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Derive a fresh item id for a query inserted at `added_at`.
    #[must_use]
    pub fn derive(query_id: &QueryId, added_at: u64, seq: u64) -> Self {
        Self(format!("{}_{}_{}", query_id.as_str(), added_at, seq))
    }

    /// Get the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueueItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Milliseconds since the Unix epoch, from the system clock.
#[must_use]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// =============================================================================
// QUERY
// =============================================================================

/// Where a query string was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuerySource {
    Hover,
    Url,
    Highlight,
    Manual,
    Click,
}

impl QuerySource {
    /// Wire name of the source.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hover => "hover",
            Self::Url => "url",
            Self::Highlight => "highlight",
            Self::Manual => "manual",
            Self::Click => "click",
        }
    }
}

impl FromStr for QuerySource {
    type Err = AtomlensError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hover" => Ok(Self::Hover),
            "url" => Ok(Self::Url),
            "highlight" => Ok(Self::Highlight),
            "manual" => Ok(Self::Manual),
            "click" => Ok(Self::Click),
            other => Err(AtomlensError::InvalidInput(format!(
                "unknown query source '{other}'"
            ))),
        }
    }
}

/// Payload describing how to materialize a new atom when none is found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreationData {
    /// Entity type, e.g. "Person", "Thing", "Account".
    pub entity_type: String,
    /// Display name for the new atom.
    pub name: String,
    pub description: String,
    /// Platform the entity lives on (x, github, youtube...).
    pub platform: Option<String>,
    pub username: Option<String>,
    pub url: Option<String>,
    /// On-chain address for account atoms.
    pub address: Option<String>,
    /// Free-form metadata.
    pub metadata: BTreeMap<String, String>,
}

/// An immutable lookup request emitted by a detector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtomQuery {
    pub id: QueryId,
    /// The search string.
    pub query: String,
    pub source: QuerySource,
    pub creation_data: CreationData,
    /// Detection time, milliseconds since epoch.
    pub timestamp: u64,
}

impl AtomQuery {
    /// Create a query with empty creation data.
    #[must_use]
    pub fn new(id: QueryId, query: impl Into<String>, source: QuerySource, timestamp: u64) -> Self {
        Self {
            id,
            query: query.into(),
            source,
            creation_data: CreationData::default(),
            timestamp,
        }
    }

    /// Attach creation data.
    #[must_use]
    pub fn with_creation_data(mut self, creation_data: CreationData) -> Self {
        self.creation_data = creation_data;
        self
    }
}

// =============================================================================
// RESOLVED MATCHES
// =============================================================================

/// Creator of an atom.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Creator {
    pub id: String,
    pub label: String,
}

/// One staking vault aggregate attached to an atom.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultAggregate {
    pub term_id: String,
    pub curve_id: u64,
    pub total_shares: Stake,
    pub position_count: u64,
}

/// Platform-aware presentation of a label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayInfo {
    pub platform: Option<String>,
    pub username: Option<String>,
    pub avatar_url: Option<String>,
}

/// A resolved candidate atom.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtomMatch {
    pub term_id: String,
    pub label: String,
    pub display_label: Option<String>,
    /// Raw payload stored on the atom.
    pub data: String,
    pub created_at: String,
    pub creator: Option<Creator>,
    pub vaults: Vec<VaultAggregate>,
    /// Sum of `total_shares` across vaults.
    pub total_staked: Stake,
    /// Sum of `position_count` across vaults.
    pub total_positions: u64,
    pub display_info: Option<DisplayInfo>,
}

impl AtomMatch {
    /// Build a match from its vault records, computing the aggregates.
    #[must_use]
    pub fn from_vaults(
        term_id: impl Into<String>,
        label: impl Into<String>,
        data: impl Into<String>,
        created_at: impl Into<String>,
        creator: Option<Creator>,
        vaults: Vec<VaultAggregate>,
    ) -> Self {
        let total_staked = vaults.iter().map(|v| &v.total_shares).sum();
        let total_positions = vaults
            .iter()
            .fold(0u64, |acc, v| acc.saturating_add(v.position_count));
        Self {
            term_id: term_id.into(),
            label: label.into(),
            display_label: None,
            data: data.into(),
            created_at: created_at.into(),
            creator,
            vaults,
            total_staked,
            total_positions,
            display_info: None,
        }
    }
}

// =============================================================================
// QUERY RESULT
// =============================================================================

/// Resolution state of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueryStatus {
    Searching,
    Found,
    NotFound,
    Error,
}

impl QueryStatus {
    /// Wire name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Searching => "searching",
            Self::Found => "found",
            Self::NotFound => "not-found",
            Self::Error => "error",
        }
    }
}

/// The outcome of resolving one `AtomQuery`.
///
/// The status is derived from how the result is constructed and cannot be
/// set directly: `Found` iff there is at least one match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResult {
    query_id: QueryId,
    query: String,
    matches: Vec<AtomMatch>,
    summary: Option<MatchSummary>,
    status: QueryStatus,
    error: Option<String>,
}

impl QueryResult {
    /// A result that is still being searched.
    #[must_use]
    pub fn searching(query: &AtomQuery) -> Self {
        Self {
            query_id: query.id.clone(),
            query: query.query.clone(),
            matches: Vec::new(),
            summary: None,
            status: QueryStatus::Searching,
            error: None,
        }
    }

    /// A completed search. Status is `Found` or `NotFound` depending on `matches`.
    #[must_use]
    pub fn resolved(
        query_id: QueryId,
        query: impl Into<String>,
        matches: Vec<AtomMatch>,
        summary: Option<MatchSummary>,
    ) -> Self {
        let status = if matches.is_empty() {
            QueryStatus::NotFound
        } else {
            QueryStatus::Found
        };
        Self {
            query_id,
            query: query.into(),
            matches,
            summary,
            status,
            error: None,
        }
    }

    /// A failed search with a human-readable message.
    #[must_use]
    pub fn failed(query_id: QueryId, query: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            query_id,
            query: query.into(),
            matches: Vec::new(),
            summary: None,
            status: QueryStatus::Error,
            error: Some(error.into()),
        }
    }

    #[must_use]
    pub fn query_id(&self) -> &QueryId {
        &self.query_id
    }

    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    #[must_use]
    pub fn matches(&self) -> &[AtomMatch] {
        &self.matches
    }

    #[must_use]
    pub fn summary(&self) -> Option<&MatchSummary> {
        self.summary.as_ref()
    }

    #[must_use]
    pub fn status(&self) -> QueryStatus {
        self.status
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

// =============================================================================
// QUEUE ITEMS
// =============================================================================

/// One row in a tab's queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: QueueItemId,
    pub query: AtomQuery,
    pub result: QueryResult,
    pub is_expanded: bool,
    pub is_pinned: bool,
    /// Insertion (or last dedup promotion) time, milliseconds since epoch.
    pub added_at: u64,
}

impl QueueItem {
    /// Create a fresh, unpinned, collapsed item in the `Searching` state.
    #[must_use]
    pub fn new(id: QueueItemId, query: AtomQuery, added_at: u64) -> Self {
        let result = QueryResult::searching(&query);
        Self {
            id,
            query,
            result,
            is_expanded: false,
            is_pinned: false,
            added_at,
        }
    }
}

/// The persisted form of one tab's queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabQueueRecord {
    pub items: Vec<QueueItem>,
    /// URL of the page the tab was showing when last saved.
    pub tab_context_url: Option<String>,
    pub last_updated: u64,
}

// =============================================================================
// RELATIONSHIPS
// =============================================================================

/// Role of an atom inside a triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    Subject,
    Predicate,
    Object,
}

impl Slot {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Subject => "subject",
            Self::Predicate => "predicate",
            Self::Object => "object",
        }
    }
}

impl FromStr for Slot {
    type Err = AtomlensError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "subject" => Ok(Self::Subject),
            "predicate" => Ok(Self::Predicate),
            "object" => Ok(Self::Object),
            other => Err(AtomlensError::InvalidInput(format!("unknown slot '{other}'"))),
        }
    }
}

/// The parts of an atom the ranking engine needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtomSummary {
    pub term_id: String,
    pub label: String,
    pub data: String,
    pub display_label: Option<String>,
}

impl AtomSummary {
    #[must_use]
    pub fn new(term_id: impl Into<String>, label: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            term_id: term_id.into(),
            label: label.into(),
            data: data.into(),
            display_label: None,
        }
    }
}

/// An existing (subject, predicate, object) relationship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Triple {
    pub term_id: String,
    pub subject: AtomSummary,
    pub predicate: AtomSummary,
    pub object: AtomSummary,
    /// Total shares of the first vault; zero when the triple has none.
    pub stake: Stake,
}

impl Triple {
    /// The atom occupying `slot`.
    #[must_use]
    pub fn atom_in(&self, slot: Slot) -> &AtomSummary {
        match slot {
            Slot::Subject => &self.subject,
            Slot::Predicate => &self.predicate,
            Slot::Object => &self.object,
        }
    }
}

/// A ranked candidate for one slot of a relationship being composed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripleSuggestion {
    pub atom_id: String,
    pub label: String,
    pub data: String,
    pub display_label: Option<String>,
    /// Number of sampled relationships the atom appeared in.
    pub frequency: u64,
    pub total_stake: Stake,
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in atomlens-core.
///
/// Only `NoActiveTab` is expected to cross the public API boundary; storage
/// and serialization failures are logged and swallowed by the queue manager.
#[derive(Debug, Error)]
pub enum AtomlensError {
    /// A current-tab mutator was called before any tab was activated.
    #[error("No active tab")]
    NoActiveTab,

    /// The persistent store failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// A record could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A stake amount was not a non-negative decimal integer.
    #[error("Invalid stake amount: {0}")]
    InvalidStake(String),

    /// Caller-supplied input was rejected.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn query(text: &str) -> AtomQuery {
        AtomQuery::new(QueryId::new("q1"), text, QuerySource::Hover, 1)
    }

    #[test]
    fn item_ids_differ_for_same_query() {
        let q = QueryId::new("abc");
        let a = QueueItemId::derive(&q, 100, 1);
        let b = QueueItemId::derive(&q, 100, 2);
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("abc_100_"));
    }

    #[test]
    fn status_derived_from_matches() {
        let empty = QueryResult::resolved(QueryId::new("q"), "x", Vec::new(), None);
        assert_eq!(empty.status(), QueryStatus::NotFound);

        let m = AtomMatch::from_vaults("1", "x", "x", "", None, Vec::new());
        let found = QueryResult::resolved(QueryId::new("q"), "x", vec![m], None);
        assert_eq!(found.status(), QueryStatus::Found);
    }

    #[test]
    fn failed_result_carries_message() {
        let r = QueryResult::failed(QueryId::new("q"), "x", "index unreachable");
        assert_eq!(r.status(), QueryStatus::Error);
        assert_eq!(r.error(), Some("index unreachable"));
        assert!(r.matches().is_empty());
    }

    #[test]
    fn new_item_is_searching() {
        let item = QueueItem::new(QueueItemId::new("i"), query("x.com:alice"), 5);
        assert_eq!(item.result.status(), QueryStatus::Searching);
        assert!(!item.is_pinned);
        assert!(!item.is_expanded);
        assert_eq!(item.result.query(), "x.com:alice");
    }

    #[test]
    fn match_aggregates_vaults() {
        let vaults = vec![
            VaultAggregate {
                term_id: "1".into(),
                curve_id: 1,
                total_shares: "1000000000000000000".parse().expect("stake"),
                position_count: 3,
            },
            VaultAggregate {
                term_id: "1".into(),
                curve_id: 2,
                total_shares: "5".parse().expect("stake"),
                position_count: 2,
            },
        ];
        let m = AtomMatch::from_vaults("1", "alice", "x.com:alice", "", None, vaults);
        assert_eq!(m.total_staked.to_string(), "1000000000000000005");
        assert_eq!(m.total_positions, 5);
    }

    #[test]
    fn parse_wire_names() {
        assert_eq!("subject".parse::<Slot>().expect("slot"), Slot::Subject);
        assert!("verb".parse::<Slot>().is_err());
        assert_eq!(
            "hover".parse::<QuerySource>().expect("source"),
            QuerySource::Hover
        );
        assert_eq!(QuerySource::Click.as_str(), "click");
        assert_eq!(Slot::Object.as_str(), "object");
    }

    #[test]
    fn triple_atom_in_slot() {
        let t = Triple {
            term_id: "t".into(),
            subject: AtomSummary::new("s", "alice", "x.com:alice"),
            predicate: AtomSummary::new("p", "follows", "follows"),
            object: AtomSummary::new("o", "bob", "x.com:bob"),
            stake: crate::Stake::zero(),
        };
        assert_eq!(t.atom_in(Slot::Subject).term_id, "s");
        assert_eq!(t.atom_in(Slot::Predicate).term_id, "p");
        assert_eq!(t.atom_in(Slot::Object).term_id, "o");
    }
}
