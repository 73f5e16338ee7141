//! In-process remote mirror
//!
//! Used by tests and for running the sync core without network access. It can
//! be switched unavailable to exercise failure paths.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{Error, Result};
use crate::models::{Note, NoteId, UserId};

use super::{subscription_channel, RemoteListing, RemoteMirror, Subscription, SubscriptionFeed};

#[derive(Debug)]
struct MirrorState {
    collections: RemoteListing,
    subscribers: HashMap<UserId, Vec<SubscriptionFeed>>,
    available: bool,
    writes: usize,
}

impl Default for MirrorState {
    fn default() -> Self {
        Self {
            collections: BTreeMap::new(),
            subscribers: HashMap::new(),
            available: true,
            writes: 0,
        }
    }
}

impl MirrorState {
    fn snapshot(&self, user_id: &UserId) -> Vec<Note> {
        self.collections
            .get(user_id)
            .map(|notes| notes.values().cloned().collect())
            .unwrap_or_default()
    }

    fn notify(&mut self, user_id: &UserId) {
        let snapshot = self.snapshot(user_id);
        let available = self.available;
        if let Some(feeds) = self.subscribers.get_mut(user_id) {
            feeds.retain(|feed| !feed.is_closed());
            for feed in feeds.iter() {
                if available {
                    feed.deliver(snapshot.clone());
                } else {
                    feed.fail("memory mirror is offline");
                }
            }
        }
    }

    fn notify_all(&mut self) {
        let users: Vec<UserId> = self.subscribers.keys().cloned().collect();
        for user_id in &users {
            self.notify(user_id);
        }
    }
}

/// Shared in-memory mirror; clones observe the same data
#[derive(Debug, Clone, Default)]
pub struct MemoryMirror {
    state: Arc<Mutex<MirrorState>>,
}

impl MemoryMirror {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MirrorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_available(state: &MirrorState) -> Result<()> {
        if state.available {
            Ok(())
        } else {
            Err(Error::RemoteUnavailable(
                "memory mirror is offline".to_string(),
            ))
        }
    }

    /// Toggle reachability; subscribers see a failure or a fresh snapshot
    pub fn set_available(&self, available: bool) {
        let mut state = self.state();
        if state.available != available {
            state.available = available;
            state.notify_all();
        }
    }

    pub fn is_available(&self) -> bool {
        self.state().available
    }

    /// Store `notes` for `user_id` regardless of availability, as another device would
    pub fn seed(&self, user_id: &UserId, notes: impl IntoIterator<Item = Note>) {
        let mut state = self.state();
        let collection = state.collections.entry(user_id.clone()).or_default();
        for note in notes {
            collection.insert(note.id, note);
        }
        state.notify(user_id);
    }

    /// Number of successful writes so far
    pub fn write_count(&self) -> usize {
        self.state().writes
    }

    /// Number of live subscriptions for `user_id`
    pub fn subscriber_count(&self, user_id: &UserId) -> usize {
        let mut state = self.state();
        state.subscribers.get_mut(user_id).map_or(0, |feeds| {
            feeds.retain(|feed| !feed.is_closed());
            feeds.len()
        })
    }
}

impl RemoteMirror for MemoryMirror {
    async fn write(&self, user_id: &UserId, note: &Note) -> Result<()> {
        let mut state = self.state();
        Self::ensure_available(&state)?;
        state
            .collections
            .entry(user_id.clone())
            .or_default()
            .insert(note.id, note.clone());
        state.writes += 1;
        state.notify(user_id);
        Ok(())
    }

    async fn read_once(&self, user_id: &UserId, note_id: &NoteId) -> Result<Option<Note>> {
        let state = self.state();
        Self::ensure_available(&state)?;
        Ok(state
            .collections
            .get(user_id)
            .and_then(|notes| notes.get(note_id))
            .cloned())
    }

    async fn read_user(&self, user_id: &UserId) -> Result<Vec<Note>> {
        let state = self.state();
        Self::ensure_available(&state)?;
        Ok(state.snapshot(user_id))
    }

    async fn read_everything(&self) -> Result<RemoteListing> {
        let state = self.state();
        Self::ensure_available(&state)?;
        Ok(state.collections.clone())
    }

    fn subscribe(&self, user_id: &UserId) -> Subscription {
        let (feed, subscription) = subscription_channel(user_id.clone());
        let mut state = self.state();
        if state.available {
            feed.deliver(state.snapshot(user_id));
        } else {
            feed.fail("memory mirror is offline");
        }
        state
            .subscribers
            .entry(user_id.clone())
            .or_default()
            .push(feed);
        subscription
    }
}
