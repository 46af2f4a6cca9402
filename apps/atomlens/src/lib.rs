//! # atomlens
//!
//! The async half of atomlens: the remote atom index client, the search
//! cache, suggestion fetching, the query resolver, and the HTTP bridge the
//! browser extension talks to.
//!
//! The deterministic engine lives in `atomlens-core`.

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod index;
pub mod resolver;
pub mod search;
pub mod suggest;
pub mod tracking;

pub use config::Config;
pub use error::AppError;
pub use index::{AtomIndex, GraphqlAtomIndex, IndexError, IndexFuture};
pub use resolver::{QueryResolver, SharedQueue, Submitted};
pub use search::{CacheStats, SearchClient, SearchConfig, SearchError};
pub use suggest::SuggestionEngine;
pub use tracking::{TrackOutcome, TrackingService};
