//! # Suggestion Ranking
//!
//! Ranks atoms by how often they co-occur with an anchor atom in existing
//! relationships, for composing a new relationship around that anchor.
//!
//! Everything here is pure: the binary fetches the relationship sample and
//! hands it to these functions.
//!
//! ## Ordering
//!
//! 1. frequency, descending
//! 2. accumulated stake, descending (arbitrary precision)
//! 3. atom id, ascending, so equal candidates always come out the same way

use crate::primitives::MAX_SUGGESTIONS;
use crate::{AtomSummary, Slot, Stake, Triple, TripleSuggestion};
use std::collections::BTreeMap;

/// Generic relationship types offered when the index cannot be reached.
const GENERIC_PREDICATES: &[(&str, &str)] = &[
    ("generic:is", "is"),
    ("generic:follows", "follows"),
    ("generic:owns", "owns"),
    ("generic:created", "created"),
    ("generic:recommends", "recommends"),
];

struct Tally<'a> {
    atom: &'a AtomSummary,
    frequency: u64,
    stake: Stake,
}

/// Rank candidates for `target_slot` from relationships that hold
/// `anchor_id` in `anchor_slot`.
///
/// Relationships whose `anchor_slot` atom is not the anchor are discarded
/// even if the index returned them. At most `MAX_SUGGESTIONS` are returned.
#[must_use]
pub fn rank_for_anchor(
    anchor_id: &str,
    anchor_slot: Slot,
    target_slot: Slot,
    triples: &[Triple],
    search: Option<&str>,
) -> Vec<TripleSuggestion> {
    let anchored = triples
        .iter()
        .filter(|t| t.atom_in(anchor_slot).term_id == anchor_id);
    rank_target_slot(target_slot, anchored, search, MAX_SUGGESTIONS)
}

/// Tally the atoms occupying `target_slot` and return the top `limit`.
#[must_use]
pub fn rank_target_slot<'a>(
    target_slot: Slot,
    triples: impl IntoIterator<Item = &'a Triple>,
    search: Option<&str>,
    limit: usize,
) -> Vec<TripleSuggestion> {
    let mut tallies: BTreeMap<&str, Tally<'a>> = BTreeMap::new();

    for triple in triples {
        let atom = triple.atom_in(target_slot);
        let tally = tallies.entry(atom.term_id.as_str()).or_insert_with(|| Tally {
            atom,
            frequency: 0,
            stake: Stake::zero(),
        });
        tally.frequency = tally.frequency.saturating_add(1);
        tally.stake += &triple.stake;
    }

    let needle = search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);

    let mut ranked: Vec<TripleSuggestion> = tallies
        .into_values()
        .filter(|t| {
            needle
                .as_deref()
                .is_none_or(|n| matches_search(&t.atom.label, &t.atom.data, n))
        })
        .map(|t| TripleSuggestion {
            atom_id: t.atom.term_id.clone(),
            label: t.atom.label.clone(),
            data: t.atom.data.clone(),
            display_label: t.atom.display_label.clone(),
            frequency: t.frequency,
            total_stake: t.stake,
        })
        .collect();

    sort_suggestions(&mut ranked);
    ranked.truncate(limit);
    ranked
}

/// Sort by frequency, then stake (both descending), then atom id.
pub fn sort_suggestions(suggestions: &mut [TripleSuggestion]) {
    suggestions.sort_by(|a, b| {
        b.frequency
            .cmp(&a.frequency)
            .then_with(|| b.total_stake.cmp(&a.total_stake))
            .then_with(|| a.atom_id.cmp(&b.atom_id))
    });
}

/// Case-insensitive substring match on label or raw data.
///
/// `needle` must already be lowercase.
fn matches_search(label: &str, data: &str, needle: &str) -> bool {
    label.to_lowercase().contains(needle) || data.to_lowercase().contains(needle)
}

/// Hard-coded relationship-type candidates.
#[must_use]
pub fn generic_predicates() -> Vec<TripleSuggestion> {
    GENERIC_PREDICATES
        .iter()
        .map(|(id, label)| TripleSuggestion {
            atom_id: (*id).to_string(),
            label: (*label).to_string(),
            data: (*label).to_string(),
            display_label: Some((*label).to_string()),
            frequency: 0,
            total_stake: Stake::zero(),
        })
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn atom(id: &str, label: &str) -> AtomSummary {
        AtomSummary::new(id, label, label)
    }

    fn triple(id: &str, s: &str, p: &str, o: &str, stake: u64) -> Triple {
        Triple {
            term_id: id.to_string(),
            subject: atom(s, s),
            predicate: atom(p, p),
            object: atom(o, o),
            stake: Stake::from(stake),
        }
    }

    #[test]
    fn groups_by_target_slot() {
        let triples = vec![
            triple("1", "alice", "follows", "bob", 10),
            triple("2", "alice", "follows", "carol", 5),
            triple("3", "alice", "likes", "bob", 1),
        ];
        let ranked = rank_for_anchor("alice", Slot::Subject, Slot::Predicate, &triples, None);

        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].atom_id, "follows");
        assert_eq!(ranked[0].frequency, 2);
        assert_eq!(ranked[0].total_stake, Stake::from(15));
        assert_eq!(ranked[1].atom_id, "likes");
    }

    #[test]
    fn discards_relationships_without_anchor_in_slot() {
        let triples = vec![
            triple("1", "alice", "follows", "bob", 10),
            triple("2", "bob", "follows", "alice", 99),
        ];
        let ranked = rank_for_anchor("alice", Slot::Subject, Slot::Object, &triples, None);

        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].atom_id, "bob");
        assert_eq!(ranked[0].total_stake, Stake::from(10));
    }

    #[test]
    fn stake_breaks_frequency_ties() {
        let triples = vec![
            triple("1", "alice", "follows", "bob", 1),
            triple("2", "alice", "follows", "carol", 1000),
        ];
        let ranked = rank_for_anchor("alice", Slot::Subject, Slot::Object, &triples, None);
        assert_eq!(ranked[0].atom_id, "carol");
        assert_eq!(ranked[1].atom_id, "bob");
    }

    #[test]
    fn stake_compared_beyond_float_precision() {
        let mut a = triple("1", "alice", "follows", "bob", 0);
        a.stake = "9007199254740993".parse().expect("stake");
        let mut b = triple("2", "alice", "follows", "carol", 0);
        b.stake = "9007199254740992".parse().expect("stake");

        let ranked = rank_for_anchor("alice", Slot::Subject, Slot::Object, &[b, a], None);
        assert_eq!(ranked[0].atom_id, "bob");
    }

    #[test]
    fn search_filters_label_and_data_case_insensitively() {
        let mut t = triple("1", "alice", "follows", "bob", 1);
        t.object.data = "x.com:BobTheBuilder".to_string();
        let triples = vec![t, triple("2", "alice", "follows", "carol", 1)];

        let ranked = rank_for_anchor(
            "alice",
            Slot::Subject,
            Slot::Object,
            &triples,
            Some("builder"),
        );
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].atom_id, "bob");

        let blank = rank_for_anchor("alice", Slot::Subject, Slot::Object, &triples, Some("  "));
        assert_eq!(blank.len(), 2);
    }

    #[test]
    fn truncates_to_max_suggestions() {
        let triples: Vec<Triple> = (0..25)
            .map(|i| triple(&i.to_string(), "alice", "follows", &format!("o{i}"), i))
            .collect();
        let ranked = rank_for_anchor("alice", Slot::Subject, Slot::Object, &triples, None);
        assert_eq!(ranked.len(), MAX_SUGGESTIONS);
        assert_eq!(ranked[0].atom_id, "o24");
    }

    #[test]
    fn target_slot_without_anchor() {
        let triples = vec![
            triple("1", "a", "follows", "x", 1),
            triple("2", "b", "follows", "y", 1),
            triple("3", "c", "owns", "z", 1),
        ];
        let ranked = rank_target_slot(Slot::Predicate, &triples, None, 1);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].atom_id, "follows");
        assert_eq!(ranked[0].frequency, 2);
    }

    #[test]
    fn generic_predicates_have_no_weight() {
        let generic = generic_predicates();
        assert!(!generic.is_empty());
        assert!(generic.iter().all(|s| s.frequency == 0 && s.total_stake.is_zero()));
    }
}
