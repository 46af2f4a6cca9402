//! Shared fixtures: an in-memory `AtomIndex` with call counters.

#![allow(clippy::unwrap_used, clippy::panic, dead_code)]

use atomlens::{AtomIndex, IndexError, IndexFuture};
use atomlens_core::{AtomMatch, AtomSummary, Stake, Triple, VaultAggregate};
use futures::FutureExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// In-memory index. Every call optionally sleeps on the tokio clock, so
/// tests with a paused clock control exactly when responses arrive.
#[derive(Default)]
pub struct MockIndex {
    labels: HashMap<String, Vec<AtomMatch>>,
    relationships: HashMap<String, Vec<Triple>>,
    recent: Vec<Triple>,
    delay: Option<Duration>,
    failing: AtomicBool,
    pub search_calls: AtomicUsize,
    pub partial_calls: AtomicUsize,
    pub relationship_calls: AtomicUsize,
    pub recent_calls: AtomicUsize,
}

impl MockIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_label(mut self, label: &str, matches: Vec<AtomMatch>) -> Self {
        self.labels.insert(label.to_string(), matches);
        self
    }

    pub fn with_relationships(mut self, atom_id: &str, triples: Vec<Triple>) -> Self {
        self.relationships.insert(atom_id.to_string(), triples);
        self
    }

    pub fn with_recent(mut self, triples: Vec<Triple>) -> Self {
        self.recent = triples;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn searches(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    async fn respond<T>(&self, value: T) -> Result<T, IndexError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(IndexError::Connection("index offline".to_string()));
        }
        Ok(value)
    }
}

impl AtomIndex for MockIndex {
    fn search_by_label<'a>(&'a self, label: &'a str) -> IndexFuture<'a, Vec<AtomMatch>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        let found = self.labels.get(label).cloned().unwrap_or_default();
        self.respond(found).boxed()
    }

    fn search_partial<'a>(&'a self, term: &'a str) -> IndexFuture<'a, Vec<AtomMatch>> {
        self.partial_calls.fetch_add(1, Ordering::SeqCst);
        let needle = term.to_lowercase();
        let found: Vec<AtomMatch> = self
            .labels
            .values()
            .flatten()
            .filter(|m| {
                m.label.to_lowercase().contains(&needle) || m.data.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect();
        self.respond(found).boxed()
    }

    fn relationships_containing<'a>(
        &'a self,
        atom_id: &'a str,
        limit: u32,
        _search: Option<&'a str>,
    ) -> IndexFuture<'a, Vec<Triple>> {
        self.relationship_calls.fetch_add(1, Ordering::SeqCst);
        let found: Vec<Triple> = self
            .relationships
            .get(atom_id)
            .map(|t| t.iter().take(limit as usize).cloned().collect())
            .unwrap_or_default();
        self.respond(found).boxed()
    }

    fn most_frequent_by_slot(&self, limit: u32) -> IndexFuture<'_, Vec<Triple>> {
        self.recent_calls.fetch_add(1, Ordering::SeqCst);
        let found: Vec<Triple> = self.recent.iter().take(limit as usize).cloned().collect();
        self.respond(found).boxed()
    }
}

// =============================================================================
// BUILDERS
// =============================================================================

/// A match with one vault holding `stake`.
pub fn atom_match(term_id: &str, label: &str, stake: u64) -> AtomMatch {
    AtomMatch::from_vaults(
        term_id,
        label,
        label,
        "2024-01-01T00:00:00Z",
        None,
        vec![VaultAggregate {
            term_id: term_id.to_string(),
            curve_id: 1,
            total_shares: Stake::from(stake),
            position_count: 1,
        }],
    )
}

pub fn atom(term_id: &str, label: &str, data: &str) -> AtomSummary {
    AtomSummary::new(term_id, label, data)
}

pub fn triple(
    term_id: &str,
    subject: AtomSummary,
    predicate: AtomSummary,
    object: AtomSummary,
    stake: u64,
) -> Triple {
    Triple {
        term_id: term_id.to_string(),
        subject,
        predicate,
        object,
        stake: Stake::from(stake),
    }
}
