//! # Host Tabs
//!
//! The browser owns the list of live tabs and windows. The queue manager
//! only asks two questions of it, captured by [`HostTabs`]. The binary feeds
//! a [`HostTabRegistry`] from the extension's background script.

use crate::{TabId, WindowId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Read-only view of the host's tab list.
pub trait HostTabs {
    /// Whether the tab is still open.
    fn tab_exists(&self, tab: TabId) -> bool;

    /// The active tab of a window, if the window is known.
    fn active_tab_in_window(&self, window: WindowId) -> Option<TabId>;
}

/// Tab lifecycle notifications forwarded by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TabLifecycleEvent {
    Activated { tab_id: TabId, url: Option<String> },
    Closed { tab_id: TabId },
    WindowFocused { window_id: WindowId },
}

/// One live tab as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostTab {
    pub tab_id: TabId,
    pub window_id: WindowId,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub url: Option<String>,
}

/// Snapshot of the host's tabs, kept current by lifecycle notifications.
#[derive(Debug, Clone, Default)]
pub struct HostTabRegistry {
    tabs: BTreeMap<TabId, HostTab>,
}

impl HostTabRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a full snapshot.
    #[must_use]
    pub fn from_tabs(tabs: impl IntoIterator<Item = HostTab>) -> Self {
        let mut registry = Self::new();
        registry.replace(tabs);
        registry
    }

    /// Replace the whole snapshot.
    pub fn replace(&mut self, tabs: impl IntoIterator<Item = HostTab>) {
        self.tabs = tabs.into_iter().map(|t| (t.tab_id, t)).collect();
    }

    /// Insert or update one tab.
    pub fn upsert(&mut self, tab: HostTab) {
        if tab.active {
            self.clear_active_in(tab.window_id);
        }
        self.tabs.insert(tab.tab_id, tab);
    }

    /// Forget a closed tab.
    pub fn remove(&mut self, tab: TabId) -> Option<HostTab> {
        self.tabs.remove(&tab)
    }

    /// Mark a tab active in its window. Unknown tabs are ignored.
    pub fn set_active(&mut self, tab: TabId) {
        let Some(window) = self.tabs.get(&tab).map(|t| t.window_id) else {
            return;
        };
        self.clear_active_in(window);
        if let Some(entry) = self.tabs.get_mut(&tab) {
            entry.active = true;
        }
    }

    /// Live tab ids, ascending.
    pub fn tab_ids(&self) -> impl Iterator<Item = TabId> + '_ {
        self.tabs.keys().copied()
    }

    pub fn get(&self, tab: TabId) -> Option<&HostTab> {
        self.tabs.get(&tab)
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    fn clear_active_in(&mut self, window: WindowId) {
        for t in self.tabs.values_mut().filter(|t| t.window_id == window) {
            t.active = false;
        }
    }
}

impl HostTabs for HostTabRegistry {
    fn tab_exists(&self, tab: TabId) -> bool {
        self.tabs.contains_key(&tab)
    }

    fn active_tab_in_window(&self, window: WindowId) -> Option<TabId> {
        self.tabs
            .values()
            .find(|t| t.window_id == window && t.active)
            .map(|t| t.tab_id)
    }
}
