//! Remote mirror contract and adapters.
//!
//! The mirror is addressed as `collection[user_id][note_id]`. Only the
//! operations the sync core consumes are modeled here.

mod http;
mod memory;

use std::collections::BTreeMap;
use std::future::Future;

use tokio::sync::watch;

use crate::error::{Error, Result};
use crate::models::{Note, NoteId, UserId};

pub use http::HttpMirror;
pub use memory::MemoryMirror;

/// Browse-all listing: every user's notes keyed by note id
pub type RemoteListing = BTreeMap<UserId, BTreeMap<NoteId, Note>>;

/// Cloud-hosted per-user note collection
pub trait RemoteMirror: Send + Sync + 'static {
    /// Idempotent upsert at `user_id/note.id`
    fn write(&self, user_id: &UserId, note: &Note) -> impl Future<Output = Result<()>> + Send;

    /// Point read; `None` when nothing is stored at the address
    fn read_once(
        &self,
        user_id: &UserId,
        note_id: &NoteId,
    ) -> impl Future<Output = Result<Option<Note>>> + Send;

    /// Current full collection of one user
    fn read_user(&self, user_id: &UserId) -> impl Future<Output = Result<Vec<Note>>> + Send;

    /// Every user's collection
    fn read_everything(&self) -> impl Future<Output = Result<RemoteListing>> + Send;

    /// Live feed of the user's full collection: once initially, then on every change
    fn subscribe(&self, user_id: &UserId) -> Subscription;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Delivery {
    Pending,
    Snapshot(Vec<Note>),
    Failed(String),
}

/// Producer side of a subscription, held by a mirror adapter
#[derive(Debug)]
pub struct SubscriptionFeed {
    tx: watch::Sender<Delivery>,
}

impl SubscriptionFeed {
    /// Publish the user's full current collection
    pub fn deliver(&self, notes: Vec<Note>) {
        self.tx.send_replace(Delivery::Snapshot(notes));
    }

    /// Publish a delivery failure
    pub fn fail(&self, message: impl Into<String>) {
        self.tx.send_replace(Delivery::Failed(message.into()));
    }

    /// Whether the subscriber cancelled or went away
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Resolves once the subscriber cancelled or went away
    pub async fn closed(&self) {
        self.tx.closed().await;
    }
}

/// Consumer side of a live remote feed.
///
/// Each item is the user's full collection, not a diff, so a slow consumer only
/// ever sees the latest state. Cancelling is idempotent, and no item is yielded
/// after it. Dropping the subscription cancels it.
pub struct Subscription {
    user_id: UserId,
    updates: Option<watch::Receiver<Delivery>>,
    on_cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("user_id", &self.user_id)
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// Create a connected feed/subscription pair for `user_id`
pub fn subscription_channel(user_id: UserId) -> (SubscriptionFeed, Subscription) {
    let (tx, rx) = watch::channel(Delivery::Pending);
    (
        SubscriptionFeed { tx },
        Subscription {
            user_id,
            updates: Some(rx),
            on_cancel: None,
        },
    )
}

impl Subscription {
    /// Run `hook` once when the subscription is cancelled (e.g. stop a poller)
    #[must_use]
    pub fn on_cancel(mut self, hook: impl FnOnce() + Send + Sync + 'static) -> Self {
        self.on_cancel = Some(Box::new(hook));
        self
    }

    pub const fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Next full snapshot, or `None` once cancelled or the feed ended.
    ///
    /// Cancel-safe.
    pub async fn next(&mut self) -> Option<Result<Vec<Note>>> {
        let updates = self.updates.as_mut()?;
        loop {
            if updates.changed().await.is_err() {
                return None;
            }
            let delivery = updates.borrow_and_update().clone();
            match delivery {
                Delivery::Pending => {}
                Delivery::Snapshot(notes) => return Some(Ok(notes)),
                Delivery::Failed(message) => return Some(Err(Error::RemoteUnavailable(message))),
            }
        }
    }

    /// Stop the feed. Returns `true` only for the call that actually cancelled.
    pub fn cancel(&mut self) -> bool {
        if self.updates.take().is_none() {
            return false;
        }
        if let Some(hook) = self.on_cancel.take() {
            hook();
        }
        tracing::debug!("Cancelled remote subscription for user {}", self.user_id);
        true
    }

    pub const fn is_cancelled(&self) -> bool {
        self.updates.is_none()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}
