//! Error types for the reaction-time engine and its persistence collaborator.

use thiserror::Error;

use crate::engine::Phase;

/// Errors surfaced by the engine's session-control operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// An operation was called in a phase that does not allow it. Session
    /// state is left untouched.
    #[error("cannot {operation} while in the {phase} phase")]
    IllegalTransition {
        operation: &'static str,
        phase: Phase,
    },
}

/// Errors that can occur while saving a finished session.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Warmup runs are practice only and never stored.
    #[error("warmup results are not saved")]
    WarmupNotPersisted,

    /// Results must be attributed to someone.
    #[error("a user id is required to save results")]
    MissingUser,

    /// SQLite failure.
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Reaction-time column (de)serialisation failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error while preparing the database location.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
