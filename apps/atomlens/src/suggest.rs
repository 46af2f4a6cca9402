//! # Suggestion Engine
//!
//! Fetches relationship samples from the index and ranks candidates for one
//! slot of a relationship being composed around an anchor atom.
//!
//! Ranking never fails outward: when the index is unreachable the engine
//! degrades to generic relationship types (predicate slot) or nothing.

use crate::index::AtomIndex;
use atomlens_core::primitives::{
    ANCHOR_SAMPLE_SIZE, FREQUENT_SAMPLE_SIZE, MAX_FREQUENT_LIMIT, MAX_SUGGESTIONS,
    PATTERN_SAMPLE_SIZE,
};
use atomlens_core::{
    AtomPattern, AtomSummary, LabelTransformer, Slot, Triple, TripleSuggestion,
    generic_predicates, rank_for_anchor, rank_target_slot,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Ranked suggestions backed by the remote index.
#[derive(Clone)]
pub struct SuggestionEngine {
    index: Arc<dyn AtomIndex>,
    labels: Arc<LabelTransformer>,
}

impl SuggestionEngine {
    pub fn new(index: Arc<dyn AtomIndex>, labels: Arc<LabelTransformer>) -> Self {
        Self { index, labels }
    }

    /// Candidates for `target_slot` of a relationship holding `anchor` in
    /// `anchor_slot`, best first, at most `MAX_SUGGESTIONS`.
    ///
    /// An anchor with no relationships of its own borrows from relationships
    /// whose subject has the same data shape (social handle, address, URL).
    pub async fn get_suggested_atoms_for_position(
        &self,
        anchor: &AtomSummary,
        anchor_slot: Slot,
        target_slot: Slot,
        search: Option<&str>,
    ) -> Vec<TripleSuggestion> {
        if anchor_slot == target_slot {
            return Vec::new();
        }

        let triples = match self
            .index
            .relationships_containing(&anchor.term_id, ANCHOR_SAMPLE_SIZE, search)
            .await
        {
            Ok(triples) => triples,
            Err(e) => {
                warn!(anchor = %anchor.term_id, error = %e, "relationship lookup failed");
                return fallback(target_slot);
            }
        };

        if !triples.is_empty() {
            let triples = self.decorate(triples);
            return rank_for_anchor(&anchor.term_id, anchor_slot, target_slot, &triples, search);
        }

        let Some(pattern) = AtomPattern::classify(&anchor.data) else {
            debug!(anchor = %anchor.term_id, "no relationships and no data pattern");
            return Vec::new();
        };

        match self.index.most_frequent_by_slot(PATTERN_SAMPLE_SIZE).await {
            Ok(sample) => {
                let similar: Vec<Triple> = sample
                    .into_iter()
                    .filter(|t| pattern.matches(&t.subject.data))
                    .collect();
                let similar = self.decorate(similar);
                rank_target_slot(target_slot, &similar, search, MAX_SUGGESTIONS)
            }
            Err(e) => {
                warn!(pattern = ?pattern, error = %e, "pattern sample lookup failed");
                fallback(target_slot)
            }
        }
    }

    /// The `limit` atoms seen most often in `slot` across recent
    /// relationships. `limit` is clamped to `1..=MAX_FREQUENT_LIMIT`.
    pub async fn most_frequent_for_slot(&self, slot: Slot, limit: usize) -> Vec<TripleSuggestion> {
        let limit = limit.clamp(1, MAX_FREQUENT_LIMIT);
        match self.index.most_frequent_by_slot(FREQUENT_SAMPLE_SIZE).await {
            Ok(sample) => {
                let sample = self.decorate(sample);
                rank_target_slot(slot, &sample, None, limit)
            }
            Err(e) => {
                warn!(slot = slot.as_str(), error = %e, "frequency sample lookup failed");
                Vec::new()
            }
        }
    }

    fn decorate(&self, mut triples: Vec<Triple>) -> Vec<Triple> {
        for t in &mut triples {
            self.labels.decorate_summary(&mut t.subject);
            self.labels.decorate_summary(&mut t.predicate);
            self.labels.decorate_summary(&mut t.object);
        }
        triples
    }
}

fn fallback(target_slot: Slot) -> Vec<TripleSuggestion> {
    if target_slot == Slot::Predicate {
        generic_predicates()
    } else {
        Vec::new()
    }
}
