//! Inputs to the sync coordinator.

use tokio::sync::oneshot;

use crate::error::Result;
use crate::models::{Note, NoteId, UserId};
use crate::services::DeleteOutcome;
use crate::share::SharedLink;

/// Result of a share request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShareOutcome {
    /// Written to the mirror and persisted locally as `Synced`
    Shared { note: Note, link: SharedLink },
    /// Nobody is signed in; nothing was written
    AuthenticationRequired,
}

/// Everything that can change the coordinator, serialized through one queue
#[derive(Debug)]
pub enum SyncEvent {
    NetworkOnline,
    NetworkOffline,
    SignedIn(UserId),
    SignedOut,
    /// Full remote collection for `user_id`
    RemoteSnapshot { user_id: UserId, notes: Vec<Note> },
    /// The subscription for `user_id` failed to deliver
    RemoteError { user_id: UserId, message: String },
    Share {
        id: NoteId,
        reply: Option<oneshot::Sender<Result<ShareOutcome>>>,
    },
    Delete {
        id: NoteId,
        reply: Option<oneshot::Sender<Result<DeleteOutcome>>>,
    },
    Shutdown,
}

impl SyncEvent {
    /// Short name for logs
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NetworkOnline => "network-online",
            Self::NetworkOffline => "network-offline",
            Self::SignedIn(_) => "signed-in",
            Self::SignedOut => "signed-out",
            Self::RemoteSnapshot { .. } => "remote-snapshot",
            Self::RemoteError { .. } => "remote-error",
            Self::Share { .. } => "share",
            Self::Delete { .. } => "delete",
            Self::Shutdown => "shutdown",
        }
    }
}
