//! Error taxonomy shared by the stores and the conversation controller.

use std::fmt;

use thiserror::Error;

/// The notes ledger could not be read or written.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("ledger I/O failed for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("ledger encoding failed for {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },
}

/// The dataset could not be loaded at startup.
#[derive(Debug, Error)]
pub enum RecordSourceError {
    #[error("failed to read dataset {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: csv::Error,
    },
    #[error("dataset {path} has no `{column}` column")]
    MissingIdColumn { path: String, column: String },
}

/// Failure surfaced by a single conversation step.
#[derive(Debug, Error)]
pub enum BotError {
    /// Bad user input; the user is re-prompted in the same state.
    #[error("{0}")]
    Validation(String),
    /// Stale selection or vanished record/note; the session is discarded.
    #[error("{0}")]
    NotFound(String),
    /// The requested ledger operation did not happen; the session stays put.
    #[error("{action} failed: {source}")]
    Persistence {
        action: NoteAction,
        #[source]
        source: PersistenceError,
    },
}

impl BotError {
    /// `map_err` adapter tagging a ledger failure with the attempted action.
    pub fn persistence(action: NoteAction) -> impl FnOnce(PersistenceError) -> BotError {
        move |source| BotError::Persistence { action, source }
    }
}

/// Ledger operation a user asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteAction {
    Load,
    Add,
    Delete,
    DeleteAll,
}

impl fmt::Display for NoteAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NoteAction::Load => "loading notes",
            NoteAction::Add => "adding a note",
            NoteAction::Delete => "deleting a note",
            NoteAction::DeleteAll => "deleting all notes",
        })
    }
}

/// Outbound delivery failed.
#[derive(Debug, Error)]
#[error("transport error: {0}")]
pub struct TransportError(pub String);
