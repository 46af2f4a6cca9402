//! # Tracking Service
//!
//! Shared wrapper around `TabAtomTracker`. Every newly tracked query is
//! prefetched into the search cache so opening the popup is instant.

use crate::search::SearchClient;
use atomlens_core::{DetectedAtom, TabAtomTracker, TabId, badge_for};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Result of tracking one detection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackOutcome {
    /// `false` when the tab already tracked the same query.
    pub tracked: bool,
    pub count: usize,
    pub badge: String,
}

#[derive(Debug)]
pub struct TrackingService {
    tracker: Mutex<TabAtomTracker>,
    search: SearchClient,
}

impl TrackingService {
    pub fn new(search: SearchClient) -> Self {
        Self {
            tracker: Mutex::new(TabAtomTracker::new()),
            search,
        }
    }

    pub fn track_atom(&self, tab: TabId, atom: DetectedAtom) -> TrackOutcome {
        let query = atom.query.clone();
        let (tracked, count) = {
            let mut tracker = self.lock();
            let tracked = tracker.track_atom(tab, atom);
            (tracked, tracker.count(tab))
        };
        if tracked {
            self.search.prefetch([query]);
        }
        TrackOutcome {
            tracked,
            count,
            badge: badge_for(count),
        }
    }

    pub fn navigation_started(&self, tab: TabId) {
        self.lock().navigation_started(tab);
    }

    pub fn tab_closed(&self, tab: TabId) {
        self.lock().tab_closed(tab);
    }

    pub fn count(&self, tab: TabId) -> usize {
        self.lock().count(tab)
    }

    pub fn badge_text(&self, tab: TabId) -> String {
        self.lock().badge_text(tab)
    }

    fn lock(&self) -> MutexGuard<'_, TabAtomTracker> {
        self.tracker.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
