//! Sync coordinator state machine
//!
//! Owns the session context and the single live subscription. Every input,
//! including remote deliveries, goes through [`SyncCoordinator::handle`].

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::db::LocalStore;
use crate::error::{Error, Result};
use crate::merge::MergeReport;
use crate::models::{Note, NoteId, NoteStatus, UserId};
use crate::remote::{RemoteMirror, Subscription};
use crate::services::{DeleteOutcome, NoteService};
use crate::share::SharedLink;
use crate::state::{Session, SyncState};

use super::{ShareOutcome, SyncEvent, SyncHandle};

pub struct SyncCoordinator<S, R> {
    notes: NoteService<S>,
    remote: Arc<R>,
    session: Session,
    subscription: Option<Subscription>,
    state: watch::Sender<SyncState>,
    share_base_url: String,
    stopped: bool,
}

impl<S: LocalStore, R: RemoteMirror> SyncCoordinator<S, R> {
    /// Start offline, signed in as the owner of the notes' partition
    pub fn new(notes: NoteService<S>, remote: Arc<R>, share_base_url: impl Into<String>) -> Self {
        let (state, _) = watch::channel(SyncState::Offline);
        let session = Session::new(notes.owner(), false);
        Self {
            notes,
            remote,
            session,
            subscription: None,
            state,
            share_base_url: share_base_url.into(),
            stopped: false,
        }
    }

    pub const fn notes(&self) -> &NoteService<S> {
        &self.notes
    }

    pub const fn session(&self) -> &Session {
        &self.session
    }

    pub fn state(&self) -> SyncState {
        self.session.state()
    }

    pub fn watch_state(&self) -> watch::Receiver<SyncState> {
        self.state.subscribe()
    }

    pub const fn has_subscription(&self) -> bool {
        self.subscription.is_some()
    }

    /// Shareable URL for a link under the configured origin
    pub fn link_url(&self, link: &SharedLink) -> String {
        link.to_url(&self.share_base_url)
    }

    /// Apply one event
    pub async fn handle(&mut self, event: SyncEvent) {
        tracing::debug!("Handling sync event {}", event.kind());
        match event {
            SyncEvent::NetworkOnline => {
                self.set_session(Session {
                    online: true,
                    ..self.session.clone()
                })
                .await;
            }
            SyncEvent::NetworkOffline => {
                self.set_session(Session {
                    online: false,
                    ..self.session.clone()
                })
                .await;
            }
            SyncEvent::SignedIn(user_id) => {
                self.set_session(Session {
                    user_id: Some(user_id),
                    ..self.session.clone()
                })
                .await;
            }
            SyncEvent::SignedOut => {
                self.set_session(Session {
                    user_id: None,
                    ..self.session.clone()
                })
                .await;
            }
            SyncEvent::RemoteSnapshot { user_id, notes } => {
                if let Err(error) = self.apply_snapshot(&user_id, &notes).await {
                    tracing::warn!("Failed to merge remote snapshot for {user_id}: {error}");
                }
            }
            SyncEvent::RemoteError { user_id, message } => {
                tracing::warn!("Remote subscription for {user_id} failed: {message}");
            }
            SyncEvent::Share { id, reply } => {
                let result = self.share(&id).await;
                respond(reply, result);
            }
            SyncEvent::Delete { id, reply } => {
                let result = self.delete(&id).await;
                respond(reply, result);
            }
            SyncEvent::Shutdown => self.shutdown(),
        }
    }

    /// Replace the session context, opening or cancelling the subscription as
    /// the derived state requires.
    ///
    /// Local notes follow the signed-in user, online or not.
    pub async fn set_session(&mut self, session: Session) {
        let previous = self.session.state();
        self.session = session;
        if self.notes.owner() != self.session.user_id {
            if let Err(error) = self.notes.switch_owner(self.session.user_id.clone()).await {
                tracing::warn!("Failed to switch local notes to the new user: {error}");
            }
        }
        let next = self.session.state();
        if previous == next {
            return;
        }

        if previous.subscribed_user().is_some() {
            self.cancel_subscription();
        }
        if let Some(user_id) = next.subscribed_user() {
            self.subscription = Some(self.remote.subscribe(user_id));
        }

        tracing::info!("Sync state changed: {previous} -> {next}");
        self.state.send_replace(next);
    }

    /// Merge a snapshot for the subscribed user. Returns `None` when dropped.
    pub async fn apply_snapshot(
        &mut self,
        user_id: &UserId,
        notes: &[Note],
    ) -> Result<Option<MergeReport>> {
        let state = self.session.state();
        if state.subscribed_user() != Some(user_id) {
            tracing::warn!("Dropping remote snapshot for {user_id} while {state}");
            return Ok(None);
        }

        let report = self.notes.commit_merge(notes).await?;
        if report.changed() {
            tracing::info!(
                "Applied remote changes for {user_id}: {} adopted, {} replaced",
                report.adopted,
                report.replaced
            );
        }
        Ok(Some(report))
    }

    /// Publish a note to the signed-in user's remote collection.
    ///
    /// The remote write happens first; the local copy is only marked `Synced`
    /// once it succeeded, and is left untouched otherwise.
    pub async fn share(&mut self, id: &NoteId) -> Result<ShareOutcome> {
        let Some(user_id) = self.session.user_id.clone() else {
            tracing::info!("Share of note {id} needs a signed-in user");
            return Ok(ShareOutcome::AuthenticationRequired);
        };
        if !self.session.online {
            return Err(Error::RemoteUnavailable("device is offline".to_string()));
        }

        let shared = self.notes.prepare_share(id).await?;
        if let Err(error) = self.remote.write(&user_id, &shared).await {
            tracing::warn!("Failed to share note {id}: {error}");
            return Err(error);
        }
        self.notes.mark_synced(&shared).await?;

        let link = SharedLink::new(user_id, shared.id);
        tracing::info!("Shared note {id} at {link}");
        Ok(ShareOutcome::Shared { note: shared, link })
    }

    /// Delete through the lifecycle API. While subscribed, the tombstone is
    /// pushed whenever the user's remote collection holds a live copy.
    pub async fn delete(&mut self, id: &NoteId) -> Result<DeleteOutcome> {
        let outcome = self.notes.delete(id).await?;

        let state = self.session.state();
        if let (
            DeleteOutcome::Tombstoned {
                previous,
                tombstone,
            },
            Some(user_id),
        ) = (&outcome, state.subscribed_user())
        {
            if self.remote_holds(user_id, previous).await {
                match self.remote.write(user_id, tombstone).await {
                    Ok(()) => tracing::info!("Pushed deletion of note {id}"),
                    Err(error) => {
                        tracing::warn!("Failed to push deletion of note {id}: {error}");
                    }
                }
            }
        }

        Ok(outcome)
    }

    /// Wait for the next delivery of the live subscription.
    ///
    /// Returns `None` at once when there is no subscription or its feed ended.
    pub async fn next_remote_event(&mut self) -> Option<SyncEvent> {
        let subscription = self.subscription.as_mut()?;
        let delivery = subscription.next().await?;
        let user_id = subscription.user_id().clone();
        Some(match delivery {
            Ok(notes) => SyncEvent::RemoteSnapshot { user_id, notes },
            Err(error) => SyncEvent::RemoteError {
                user_id,
                message: error.to_string(),
            },
        })
    }

    /// Cancel the subscription and stop accepting events
    pub fn shutdown(&mut self) {
        self.cancel_subscription();
        if !self.stopped {
            tracing::info!("Sync coordinator stopped");
        }
        self.stopped = true;
    }

    pub const fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Drive the state machine until the queue closes or `Shutdown` arrives
    pub async fn run(mut self, mut events: mpsc::Receiver<SyncEvent>) {
        tracing::info!("Sync coordinator running ({})", self.state());

        while !self.stopped {
            let event = tokio::select! {
                event = events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
                Some(event) = self.next_remote_event() => event,
            };
            self.handle(event).await;
        }

        self.shutdown();
    }

    /// Run on the current tokio runtime behind a bounded queue
    pub fn spawn(self, queue_capacity: usize) -> (SyncHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let handle = SyncHandle::new(tx, self.watch_state());
        let task = tokio::spawn(self.run(rx));
        (handle, task)
    }

    /// Whether `user_id`'s collection may still serve `note`.
    ///
    /// A `Synced` note is there by definition; one edited since it was shared is
    /// `Unsynced` locally, so the mirror is asked.
    async fn remote_holds(&self, user_id: &UserId, note: &Note) -> bool {
        if note.status == NoteStatus::Synced {
            return true;
        }
        match self.remote.read_once(user_id, &note.id).await {
            Ok(remote) => remote.is_some_and(|remote| !remote.is_tombstone()),
            Err(error) => {
                tracing::warn!("Failed to look up remote copy of note {}: {error}", note.id);
                false
            }
        }
    }

    fn cancel_subscription(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.cancel();
        }
    }
}

fn respond<T>(reply: Option<tokio::sync::oneshot::Sender<Result<T>>>, result: Result<T>) {
    match reply {
        Some(reply) => {
            if reply.send(result).is_err() {
                tracing::debug!("Sync requester went away before the reply");
            }
        }
        None => {
            if let Err(error) = result {
                tracing::warn!("Sync request failed: {error}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::clock::ManualClock;
    use crate::config::DeletionPolicy;
    use crate::db::LibSqlNoteStore;
    use crate::remote::MemoryMirror;
    use crate::share::resolve_shared;
    use crate::sync::{forward_connectivity, forward_identity};
    use pretty_assertions::assert_eq;

    const WAIT: Duration = Duration::from_secs(5);

    type TestCoordinator = SyncCoordinator<LibSqlNoteStore, MemoryMirror>;

    fn user(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    async fn setup() -> (TestCoordinator, MemoryMirror, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_000));
        let store = LibSqlNoteStore::open_in_memory().await.unwrap();
        let notes = NoteService::new(store, clock.clone(), DeletionPolicy::Tombstone)
            .await
            .unwrap();
        let mirror = MemoryMirror::new();
        let coordinator =
            SyncCoordinator::new(notes, Arc::new(mirror.clone()), "https://jotter.app");
        (coordinator, mirror, clock)
    }

    async fn go_online_as(coordinator: &mut TestCoordinator, user_id: &UserId) {
        coordinator.handle(SyncEvent::NetworkOnline).await;
        coordinator.handle(SyncEvent::SignedIn(user_id.clone())).await;
    }

    /// Pull one delivery from the subscription and apply it
    async fn pump(coordinator: &mut TestCoordinator) {
        let event = tokio::time::timeout(WAIT, coordinator.next_remote_event())
            .await
            .unwrap()
            .unwrap();
        coordinator.handle(event).await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_state_follows_events() {
        let (mut coordinator, mirror, _clock) = setup().await;
        let alice = user("alice");
        assert_eq!(coordinator.state(), SyncState::Offline);

        coordinator.handle(SyncEvent::NetworkOnline).await;
        assert_eq!(coordinator.state(), SyncState::OnlineUnauthenticated);
        assert!(!coordinator.has_subscription());

        coordinator.handle(SyncEvent::SignedIn(alice.clone())).await;
        assert_eq!(
            coordinator.state(),
            SyncState::Subscribed {
                user_id: alice.clone()
            }
        );
        assert_eq!(mirror.subscriber_count(&alice), 1);

        coordinator.handle(SyncEvent::NetworkOffline).await;
        assert_eq!(coordinator.state(), SyncState::Offline);
        assert_eq!(mirror.subscriber_count(&alice), 0);

        coordinator.handle(SyncEvent::NetworkOnline).await;
        assert_eq!(mirror.subscriber_count(&alice), 1);

        coordinator.handle(SyncEvent::SignedOut).await;
        assert_eq!(coordinator.state(), SyncState::OnlineUnauthenticated);
        assert_eq!(mirror.subscriber_count(&alice), 0);
        assert_eq!(*coordinator.watch_state().borrow(), SyncState::OnlineUnauthenticated);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_repeated_sign_in_keeps_one_subscription() {
        let (mut coordinator, mirror, _clock) = setup().await;
        let alice = user("alice");
        go_online_as(&mut coordinator, &alice).await;
        coordinator.handle(SyncEvent::SignedIn(alice.clone())).await;
        coordinator.handle(SyncEvent::NetworkOnline).await;

        assert_eq!(mirror.subscriber_count(&alice), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_user_switch_moves_subscription() {
        let (mut coordinator, mirror, _clock) = setup().await;
        let alice = user("alice");
        let bob = user("bob");
        go_online_as(&mut coordinator, &alice).await;

        coordinator.handle(SyncEvent::SignedIn(bob.clone())).await;

        assert_eq!(mirror.subscriber_count(&alice), 0);
        assert_eq!(mirror.subscriber_count(&bob), 1);
        assert_eq!(coordinator.state().subscribed_user(), Some(&bob));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_snapshot_is_merged_and_surfaced() {
        let (mut coordinator, mirror, _clock) = setup().await;
        let alice = user("alice");
        let remote_note = Note {
            status: NoteStatus::Synced,
            ..Note::new("From phone", "hello", 500)
        };
        mirror.seed(&alice, [remote_note.clone()]);
        let watcher = coordinator.notes().watch();

        go_online_as(&mut coordinator, &alice).await;
        pump(&mut coordinator).await;

        assert_eq!(*watcher.borrow(), vec![remote_note]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_snapshot_for_other_user_is_dropped() {
        let (mut coordinator, _mirror, _clock) = setup().await;
        let alice = user("alice");
        go_online_as(&mut coordinator, &alice).await;

        let report = coordinator
            .apply_snapshot(&user("bob"), &[Note::new("Bob's", "x", 1)])
            .await
            .unwrap();

        assert!(report.is_none());
        assert!(coordinator.notes().list().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_snapshot_while_offline_is_dropped() {
        let (mut coordinator, _mirror, _clock) = setup().await;
        let alice = user("alice");
        coordinator.handle(SyncEvent::SignedIn(alice.clone())).await;

        coordinator
            .handle(SyncEvent::RemoteSnapshot {
                user_id: alice,
                notes: vec![Note::new("late", "x", 1)],
            })
            .await;

        assert!(coordinator.notes().list().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_offline_edit_survives_reconnect() {
        let (mut coordinator, mirror, clock) = setup().await;
        let alice = user("alice");

        // Shared at 1000, then edited offline at 1100
        go_online_as(&mut coordinator, &alice).await;
        pump(&mut coordinator).await;
        clock.set(999);
        let draft = coordinator.notes().create("A", "original").await.unwrap();
        let ShareOutcome::Shared { note: shared, .. } = coordinator.share(&draft.id).await.unwrap()
        else {
            panic!("share should succeed");
        };
        assert_eq!(shared.last_updated, 1_000);
        coordinator.handle(SyncEvent::NetworkOffline).await;

        clock.set(1_100);
        let edited = coordinator
            .notes()
            .update(&draft.id, "A", "edited offline")
            .await
            .unwrap();

        coordinator.handle(SyncEvent::NetworkOnline).await;
        pump(&mut coordinator).await;

        assert_eq!(
            mirror.read_once(&alice, &draft.id).await.unwrap().unwrap().last_updated,
            1_000
        );
        assert_eq!(
            coordinator.notes().get(&draft.id).await.unwrap(),
            Some(edited)
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_share_requires_authentication() {
        let (mut coordinator, mirror, _clock) = setup().await;
        coordinator.handle(SyncEvent::NetworkOnline).await;
        let note = coordinator.notes().create("Private", "x").await.unwrap();

        let outcome = coordinator.share(&note.id).await.unwrap();

        assert_eq!(outcome, ShareOutcome::AuthenticationRequired);
        assert_eq!(mirror.write_count(), 0);
        assert_eq!(coordinator.notes().get(&note.id).await.unwrap(), Some(note));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_share_offline_is_remote_unavailable() {
        let (mut coordinator, mirror, _clock) = setup().await;
        coordinator.handle(SyncEvent::SignedIn(user("alice"))).await;
        let note = coordinator.notes().create("Private", "x").await.unwrap();

        let error = coordinator.share(&note.id).await.unwrap_err();

        assert!(error.is_remote());
        assert_eq!(mirror.write_count(), 0);
        assert_eq!(coordinator.notes().get(&note.id).await.unwrap(), Some(note));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_share_failure_leaves_local_untouched() {
        let (mut coordinator, mirror, _clock) = setup().await;
        go_online_as(&mut coordinator, &user("alice")).await;
        let note = coordinator.notes().create("Keep", "me").await.unwrap();
        mirror.set_available(false);

        let error = coordinator.share(&note.id).await.unwrap_err();

        assert!(error.is_remote());
        assert_eq!(coordinator.notes().get(&note.id).await.unwrap(), Some(note));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_share_writes_remote_then_local() {
        let (mut coordinator, mirror, _clock) = setup().await;
        let alice = user("alice");
        go_online_as(&mut coordinator, &alice).await;
        let note = coordinator.notes().create("Public", "hello").await.unwrap();

        let ShareOutcome::Shared { note: shared, link } =
            coordinator.share(&note.id).await.unwrap()
        else {
            panic!("share should succeed");
        };

        assert_eq!(shared.status, NoteStatus::Synced);
        assert!(shared.last_updated > note.last_updated);
        assert_eq!(
            mirror.read_once(&alice, &note.id).await.unwrap(),
            Some(shared.clone())
        );
        assert_eq!(coordinator.notes().get(&note.id).await.unwrap(), Some(shared));
        assert_eq!(link, SharedLink::new(alice, note.id));
        assert!(coordinator
            .link_url(&link)
            .starts_with("https://jotter.app/shared/alice/"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_share_missing_note_is_not_found() {
        let (mut coordinator, mirror, _clock) = setup().await;
        go_online_as(&mut coordinator, &user("alice")).await;

        let result = coordinator.share(&NoteId::new()).await;

        assert!(matches!(result, Err(Error::NotFound(_))));
        assert_eq!(mirror.write_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_delete_pushes_tombstone_of_shared_note() {
        let (mut coordinator, mirror, _clock) = setup().await;
        let alice = user("alice");
        go_online_as(&mut coordinator, &alice).await;
        let note = coordinator.notes().create("Shared", "x").await.unwrap();
        coordinator.share(&note.id).await.unwrap();

        let outcome = coordinator.delete(&note.id).await.unwrap();

        assert!(outcome.deleted());
        let remote = mirror.read_once(&alice, &note.id).await.unwrap().unwrap();
        assert!(remote.is_tombstone());

        // The pushed tombstone comes back in the next snapshot without reviving anything
        pump(&mut coordinator).await;
        assert!(coordinator.notes().list().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_delete_unshared_note_stays_local() {
        let (mut coordinator, mirror, _clock) = setup().await;
        go_online_as(&mut coordinator, &user("alice")).await;
        let note = coordinator.notes().create("Local", "x").await.unwrap();

        coordinator.delete(&note.id).await.unwrap();

        assert_eq!(mirror.write_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_delete_push_failure_keeps_local_tombstone() {
        let (mut coordinator, mirror, _clock) = setup().await;
        let alice = user("alice");
        go_online_as(&mut coordinator, &alice).await;
        let note = coordinator.notes().create("Shared", "x").await.unwrap();
        coordinator.share(&note.id).await.unwrap();
        mirror.set_available(false);

        assert!(coordinator.delete(&note.id).await.unwrap().deleted());
        mirror.set_available(true);

        // The stale remote copy cannot revive the note
        let stale = mirror.read_user(&alice).await.unwrap();
        coordinator.apply_snapshot(&alice, &stale).await.unwrap();
        assert!(coordinator.notes().list().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_delete_after_editing_shared_note_retracts_link() {
        let (mut coordinator, mirror, clock) = setup().await;
        let alice = user("alice");
        go_online_as(&mut coordinator, &alice).await;
        let note = coordinator.notes().create("Shared", "v1").await.unwrap();
        let ShareOutcome::Shared { link, .. } = coordinator.share(&note.id).await.unwrap() else {
            panic!("share should succeed");
        };
        clock.advance(10);
        let edited = coordinator
            .notes()
            .update(&note.id, "Shared", "v2")
            .await
            .unwrap();
        assert_eq!(edited.status, NoteStatus::Unsynced);

        assert!(coordinator.delete(&note.id).await.unwrap().deleted());

        assert!(mirror
            .read_once(&alice, &note.id)
            .await
            .unwrap()
            .unwrap()
            .is_tombstone());
        assert!(matches!(
            resolve_shared(&mirror, &link).await,
            Err(Error::SharedNoteNotFound { .. })
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_user_switch_keeps_collections_apart() {
        let (mut coordinator, mirror, _clock) = setup().await;
        let alice = user("alice");
        let bob = user("bob");
        let private = Note {
            status: NoteStatus::Synced,
            ..Note::new("Alice private", "x", 500)
        };
        mirror.seed(&alice, [private.clone()]);
        go_online_as(&mut coordinator, &alice).await;
        pump(&mut coordinator).await;
        assert_eq!(coordinator.notes().list().await.unwrap(), vec![private.clone()]);

        coordinator.handle(SyncEvent::SignedIn(bob.clone())).await;
        pump(&mut coordinator).await;

        assert!(coordinator.notes().list().await.unwrap().is_empty());
        assert!(matches!(
            coordinator.share(&private.id).await,
            Err(Error::NotFound(_))
        ));
        assert_eq!(mirror.read_once(&bob, &private.id).await.unwrap(), None);
        assert_eq!(mirror.write_count(), 0);

        // Alice finds her notes again after signing back in
        coordinator.handle(SyncEvent::SignedIn(alice)).await;
        assert_eq!(coordinator.notes().list().await.unwrap(), vec![private]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_shutdown_cancels_subscription() {
        let (mut coordinator, mirror, _clock) = setup().await;
        let alice = user("alice");
        go_online_as(&mut coordinator, &alice).await;

        coordinator.handle(SyncEvent::Shutdown).await;
        coordinator.shutdown();

        assert!(coordinator.is_stopped());
        assert!(!coordinator.has_subscription());
        assert_eq!(mirror.subscriber_count(&alice), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_spawned_coordinator_end_to_end() {
        let (coordinator, mirror, _clock) = setup().await;
        let notes = coordinator.notes().clone();
        let mut watcher = notes.watch();
        let alice = user("alice");
        let (handle, task) = coordinator.spawn(8);

        handle.network_online().await.unwrap();
        handle.signed_in(alice.clone()).await.unwrap();
        let mut state = handle.watch_state();
        tokio::time::timeout(WAIT, state.wait_for(|s| s.subscribed_user().is_some()))
            .await
            .unwrap()
            .unwrap();

        let from_elsewhere = Note::new("Elsewhere", "remote", 10);
        mirror.seed(&alice, [from_elsewhere.clone()]);
        tokio::time::timeout(WAIT, watcher.wait_for(|list| list.contains(&from_elsewhere)))
            .await
            .unwrap()
            .unwrap();

        let mine = notes.create("Mine", "local").await.unwrap();
        let outcome = handle.share(mine.id).await.unwrap();
        assert!(matches!(outcome, ShareOutcome::Shared { .. }));

        handle.shutdown().await.unwrap();
        tokio::time::timeout(WAIT, task).await.unwrap().unwrap();
        assert_eq!(mirror.subscriber_count(&alice), 0);
        assert!(matches!(
            handle.share(mine.id).await,
            Err(Error::SyncStopped)
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_forwarders_drive_session() {
        let (coordinator, mirror, _clock) = setup().await;
        let alice = user("alice");
        let (handle, task) = coordinator.spawn(8);
        let (identity_tx, identity_rx) = watch::channel(None);
        let (online_tx, online_rx) = watch::channel(false);
        let identity = forward_identity(handle.clone(), identity_rx);
        let connectivity = forward_connectivity(handle.clone(), online_rx);
        let mut state = handle.watch_state();

        identity_tx.send_replace(Some(alice.clone()));
        online_tx.send_replace(true);
        tokio::time::timeout(
            WAIT,
            state.wait_for(|s| *s == SyncState::Subscribed { user_id: alice.clone() }),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(mirror.subscriber_count(&alice), 1);

        online_tx.send_replace(false);
        tokio::time::timeout(WAIT, state.wait_for(|s| *s == SyncState::Offline))
            .await
            .unwrap()
            .unwrap();

        handle.shutdown().await.unwrap();
        tokio::time::timeout(WAIT, task).await.unwrap().unwrap();
        drop((identity_tx, online_tx));
        tokio::time::timeout(WAIT, identity).await.unwrap().unwrap();
        tokio::time::timeout(WAIT, connectivity).await.unwrap().unwrap();
    }
}
