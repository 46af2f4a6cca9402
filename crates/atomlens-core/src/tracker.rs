//! # Tab Atom Tracker
//!
//! Counts the distinct atom queries detected on each tab's current page.
//! The count feeds the extension's toolbar badge.

use crate::primitives::BADGE_OVERFLOW;
use crate::{QuerySource, TabId, now_millis};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A detection reported by a content script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedAtom {
    /// The query text; the dedup key within a tab.
    pub query: String,
    pub source: QuerySource,
    #[serde(default)]
    pub detected_at: u64,
}

/// Per-tab tracking state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TabAtoms {
    pub atoms: BTreeMap<String, DetectedAtom>,
    pub count: usize,
    pub last_updated: u64,
}

/// Distinct-detection counter for every tab.
#[derive(Debug, Clone, Default)]
pub struct TabAtomTracker {
    tabs: BTreeMap<TabId, TabAtoms>,
}

impl TabAtomTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a detection.
    ///
    /// Returns `false` and leaves the record untouched when the tab already
    /// tracks the same query text.
    pub fn track_atom(&mut self, tab: TabId, atom: DetectedAtom) -> bool {
        let record = self.tabs.entry(tab).or_default();
        if record.atoms.contains_key(&atom.query) {
            return false;
        }
        record.atoms.insert(atom.query.clone(), atom);
        record.count = record.atoms.len();
        record.last_updated = now_millis();
        true
    }

    /// The tab navigated to a new page: forget its detections.
    pub fn navigation_started(&mut self, tab: TabId) {
        if let Some(record) = self.tabs.get_mut(&tab) {
            record.atoms.clear();
            record.count = 0;
            record.last_updated = now_millis();
        }
    }

    pub fn tab_closed(&mut self, tab: TabId) {
        self.tabs.remove(&tab);
    }

    #[must_use]
    pub fn count(&self, tab: TabId) -> usize {
        self.tabs.get(&tab).map_or(0, |r| r.count)
    }

    #[must_use]
    pub fn atoms(&self, tab: TabId) -> Option<&TabAtoms> {
        self.tabs.get(&tab)
    }

    /// Badge text: empty for zero, the count, or `99+`.
    #[must_use]
    pub fn badge_text(&self, tab: TabId) -> String {
        badge_for(self.count(tab))
    }
}

/// Render a count the way the toolbar badge shows it.
#[must_use]
pub fn badge_for(count: usize) -> String {
    match count {
        0 => String::new(),
        n if n > BADGE_OVERFLOW => format!("{BADGE_OVERFLOW}+"),
        n => n.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detected(query: &str) -> DetectedAtom {
        DetectedAtom {
            query: query.to_string(),
            source: QuerySource::Hover,
            detected_at: 0,
        }
    }

    #[test]
    fn duplicate_query_not_counted() {
        let mut tracker = TabAtomTracker::new();
        assert!(tracker.track_atom(TabId(1), detected("x.com:alice")));
        assert!(!tracker.track_atom(TabId(1), detected("x.com:alice")));
        assert!(tracker.track_atom(TabId(1), detected("x.com:bob")));
        assert_eq!(tracker.count(TabId(1)), 2);
        assert_eq!(tracker.badge_text(TabId(1)), "2");
    }

    #[test]
    fn tabs_are_independent() {
        let mut tracker = TabAtomTracker::new();
        tracker.track_atom(TabId(1), detected("a"));
        assert!(tracker.track_atom(TabId(2), detected("a")));
        assert_eq!(tracker.count(TabId(2)), 1);
    }

    #[test]
    fn navigation_resets_badge() {
        let mut tracker = TabAtomTracker::new();
        tracker.track_atom(TabId(1), detected("a"));
        tracker.navigation_started(TabId(1));
        assert_eq!(tracker.badge_text(TabId(1)), "");
        assert!(tracker.track_atom(TabId(1), detected("a")));
    }

    #[test]
    fn close_forgets_tab() {
        let mut tracker = TabAtomTracker::new();
        tracker.track_atom(TabId(1), detected("a"));
        tracker.tab_closed(TabId(1));
        assert!(tracker.atoms(TabId(1)).is_none());
        assert_eq!(tracker.count(TabId(1)), 0);
    }

    #[test]
    fn badge_overflow() {
        assert_eq!(badge_for(0), "");
        assert_eq!(badge_for(99), "99");
        assert_eq!(badge_for(100), "99+");
    }
}
