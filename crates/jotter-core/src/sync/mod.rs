//! Sync coordinator and the handle used to feed it.

mod coordinator;
mod events;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::models::{NoteId, UserId};
use crate::services::DeleteOutcome;
use crate::state::SyncState;

pub use coordinator::SyncCoordinator;
pub use events::{ShareOutcome, SyncEvent};

/// Cloneable sender side of a running coordinator
#[derive(Debug, Clone)]
pub struct SyncHandle {
    events: mpsc::Sender<SyncEvent>,
    state: watch::Receiver<SyncState>,
}

impl SyncHandle {
    pub(crate) const fn new(
        events: mpsc::Sender<SyncEvent>,
        state: watch::Receiver<SyncState>,
    ) -> Self {
        Self { events, state }
    }

    /// Queue an event; waits while the queue is full
    pub async fn send(&self, event: SyncEvent) -> Result<()> {
        self.events
            .send(event)
            .await
            .map_err(|_| Error::SyncStopped)
    }

    pub async fn network_online(&self) -> Result<()> {
        self.send(SyncEvent::NetworkOnline).await
    }

    pub async fn network_offline(&self) -> Result<()> {
        self.send(SyncEvent::NetworkOffline).await
    }

    pub async fn signed_in(&self, user_id: UserId) -> Result<()> {
        self.send(SyncEvent::SignedIn(user_id)).await
    }

    pub async fn signed_out(&self) -> Result<()> {
        self.send(SyncEvent::SignedOut).await
    }

    pub async fn share(&self, id: NoteId) -> Result<ShareOutcome> {
        let (reply, response) = oneshot::channel();
        self.send(SyncEvent::Share {
            id,
            reply: Some(reply),
        })
        .await?;
        response.await.map_err(|_| Error::SyncStopped)?
    }

    pub async fn delete(&self, id: NoteId) -> Result<DeleteOutcome> {
        let (reply, response) = oneshot::channel();
        self.send(SyncEvent::Delete {
            id,
            reply: Some(reply),
        })
        .await?;
        response.await.map_err(|_| Error::SyncStopped)?
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.send(SyncEvent::Shutdown).await
    }

    /// Last published state
    pub fn state(&self) -> SyncState {
        self.state.borrow().clone()
    }

    pub fn watch_state(&self) -> watch::Receiver<SyncState> {
        self.state.clone()
    }
}

/// Forward auth-state changes into the coordinator until either side closes
pub fn forward_identity(
    handle: SyncHandle,
    mut changes: watch::Receiver<Option<UserId>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let current = changes.borrow_and_update().clone();
            let event = match current {
                Some(user_id) => SyncEvent::SignedIn(user_id),
                None => SyncEvent::SignedOut,
            };
            if handle.send(event).await.is_err() || changes.changed().await.is_err() {
                break;
            }
        }
    })
}

/// Forward connectivity changes into the coordinator until either side closes
pub fn forward_connectivity(handle: SyncHandle, mut online: watch::Receiver<bool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let event = if *online.borrow_and_update() {
                SyncEvent::NetworkOnline
            } else {
                SyncEvent::NetworkOffline
            };
            if handle.send(event).await.is_err() || online.changed().await.is_err() {
                break;
            }
        }
    })
}
