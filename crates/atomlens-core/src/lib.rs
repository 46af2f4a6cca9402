//! # atomlens-core
//!
//! The deterministic queue and ranking engine for atomlens - THE LOGIC.
//!
//! This crate holds everything the extension bridge needs that does not touch
//! the network:
//! - Tab-scoped query queues with pin/expand state, eviction and persistence
//! - Co-occurrence ranking of relationship suggestions
//! - Label display transforms and atom data classification
//! - Per-tab detection counting for the toolbar badge
//!
//! ## Architectural Constraints
//!
//! - Synchronous: no async, no network dependencies
//! - Deterministic: `BTreeMap` ordering, no floats, no randomness
//! - Stake amounts are arbitrary-precision integers
//! - The remote index, the browser and the clock are reached through traits
//!   or injected functions

// =============================================================================
// MODULES
// =============================================================================

pub mod events;
pub mod formats;
pub mod host;
pub mod label;
pub mod pattern;
pub mod primitives;
pub mod queue;
pub mod ranking;
pub mod stake;
pub mod storage;
pub mod summary;
pub mod tracker;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    AtomMatch, AtomQuery, AtomSummary, AtomlensError, CreationData, Creator, DisplayInfo, QueryId,
    QueryResult, QuerySource, QueryStatus, QueueItem, QueueItemId, Slot, TabId, TabQueueRecord,
    Triple, TripleSuggestion, VaultAggregate, WindowId, now_millis,
};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use events::{EventRegistry, ListenerId, QueueEvent};
pub use host::{HostTab, HostTabRegistry, HostTabs, TabLifecycleEvent};
pub use label::{DisplayLabel, LabelTransformer};
pub use pattern::AtomPattern;
pub use queue::{Insertion, QueueConfig, QueueManager, QueueStats, RestoreReport};
pub use ranking::{generic_predicates, rank_for_anchor, rank_target_slot};
pub use stake::Stake;
pub use summary::{MatchSummary, SearchResult};
pub use tracker::{DetectedAtom, TabAtomTracker, TabAtoms, badge_for};

// =============================================================================
// RE-EXPORTS: Formats & Storage
// =============================================================================

pub use formats::{RecordHeader, record_from_bytes, record_to_bytes};
pub use storage::{MemoryQueueStore, QueueStorage, QueueStore, RedbQueueStore};
