//! # Remote Atom Index
//!
//! Contract for the knowledge-graph index the bridge reads from. The index
//! is remote and fallible; everything above this module treats it as an
//! opaque async source of atoms and relationships.
//!
//! The trait is object safe so the server can hold an `Arc<dyn AtomIndex>`
//! and tests can swap in an in-memory implementation.

mod graphql;

pub use graphql::GraphqlAtomIndex;

use atomlens_core::{AtomMatch, Triple};
use futures::future::BoxFuture;
use thiserror::Error;

/// Boxed future returned by every index call.
pub type IndexFuture<'a, T> = BoxFuture<'a, Result<T, IndexError>>;

/// Errors from the remote index.
///
/// `Clone` because one failure is handed to every caller coalesced onto the
/// same in-flight search.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexError {
    /// The endpoint could not be reached or timed out.
    #[error("Cannot reach atom index: {0}")]
    Connection(String),

    /// Non-success HTTP status.
    #[error("Atom index returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body was not the expected shape.
    #[error("Malformed index response: {0}")]
    Decode(String),

    /// The index answered with GraphQL errors.
    #[error("Index query failed: {0}")]
    GraphQl(String),
}

/// Read access to the remote atom index.
pub trait AtomIndex: Send + Sync {
    /// Atoms whose label equals `label`.
    fn search_by_label<'a>(&'a self, label: &'a str) -> IndexFuture<'a, Vec<AtomMatch>>;

    /// Atoms whose label contains `term`, for autocomplete.
    fn search_partial<'a>(&'a self, term: &'a str) -> IndexFuture<'a, Vec<AtomMatch>>;

    /// Recent relationships holding `atom_id` in any slot.
    ///
    /// `search`, when present, narrows the sample to relationships where
    /// some atom's label contains it.
    fn relationships_containing<'a>(
        &'a self,
        atom_id: &'a str,
        limit: u32,
        search: Option<&'a str>,
    ) -> IndexFuture<'a, Vec<Triple>>;

    /// The most recent relationships of the whole graph.
    fn most_frequent_by_slot(&self, limit: u32) -> IndexFuture<'_, Vec<Triple>>;
}
