//! # Application Errors
//!
//! Failures of configuration, bootstrap and CLI commands. Request-level
//! failures never surface here; the HTTP layer maps them to status codes.

use crate::index::IndexError;
use crate::search::SearchError;
use atomlens_core::AtomlensError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// The configuration file or an override is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] AtomlensError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Search(#[from] SearchError),
}
