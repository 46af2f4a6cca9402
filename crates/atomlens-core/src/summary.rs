//! # Match Summaries
//!
//! Aggregates over the matches of one search.

use crate::primitives::SUMMARY_TOP_MATCHES;
use crate::{AtomMatch, Stake};
use serde::{Deserialize, Serialize};

/// Aggregate over a search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSummary {
    pub total_matches: usize,
    pub total_staked: Stake,
    pub total_positions: u64,
    /// Highest-staked matches, at most `SUMMARY_TOP_MATCHES`.
    pub top_matches: Vec<AtomMatch>,
}

impl MatchSummary {
    /// Summarize a list of matches.
    ///
    /// Top matches are ordered by stake, descending; equal stakes keep their
    /// input order.
    #[must_use]
    pub fn from_matches(matches: &[AtomMatch]) -> Self {
        let total_staked = matches.iter().map(|m| &m.total_staked).sum();
        let total_positions = matches
            .iter()
            .fold(0u64, |acc, m| acc.saturating_add(m.total_positions));

        let mut ranked: Vec<&AtomMatch> = matches.iter().collect();
        ranked.sort_by(|a, b| b.total_staked.cmp(&a.total_staked));
        let top_matches = ranked
            .into_iter()
            .take(SUMMARY_TOP_MATCHES)
            .cloned()
            .collect();

        Self {
            total_matches: matches.len(),
            total_staked,
            total_positions,
            top_matches,
        }
    }
}

/// The unit returned by the remote index and held by the search cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub matches: Vec<AtomMatch>,
    pub summary: MatchSummary,
}

impl SearchResult {
    /// Build a result, deriving the summary from the matches.
    #[must_use]
    pub fn new(matches: Vec<AtomMatch>) -> Self {
        let summary = MatchSummary::from_matches(&matches);
        Self { matches, summary }
    }
}
