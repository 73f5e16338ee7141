//! Error types for jotter-core

use thiserror::Error;

use crate::models::{NoteId, UserId};

/// Result type alias using jotter-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in jotter-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// A required field was empty; nothing was persisted
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Note not present in the local store
    #[error("Note not found: {0}")]
    NotFound(NoteId),

    /// Network or remote-store failure during a sync/share operation
    #[error("Remote unavailable: {0}")]
    RemoteUnavailable(String),

    /// The remote mirror has no shared note at this address
    #[error("Shared note not found: {owner_id}/{note_id}")]
    SharedNoteNotFound { owner_id: UserId, note_id: NoteId },

    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Identity provider error
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Invalid settings
    #[error("Configuration error: {0}")]
    Config(String),

    /// The sync coordinator's event queue is closed
    #[error("Sync coordinator is not running")]
    SyncStopped,
}

impl Error {
    /// Whether the failure came from the remote side, so the caller can offer a retry.
    #[must_use]
    pub const fn is_remote(&self) -> bool {
        matches!(self, Self::RemoteUnavailable(_))
    }
}
