//! # Formats Module
//!
//! Binary encoding of persisted tab queue records. Reading and writing the
//! bytes is left to the `storage` backends.

mod persistence;

pub use persistence::*;
