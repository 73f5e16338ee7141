//! Note lifecycle service
//!
//! The only path by which notes are created, edited and deleted. Every
//! mutation is persisted before it is published to watchers, so the list handed
//! to a presentation layer is always what the store holds.

use std::sync::Arc;

use tokio::sync::watch;

use crate::clock::{next_stamp, Clock};
use crate::config::DeletionPolicy;
use crate::db::LocalStore;
use crate::error::{Error, Result};
use crate::merge::{merge_notes, MergeReport};
use crate::models::{Note, NoteId, NoteStatus, UserId};
use crate::search::filter_notes;

/// What a delete call did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// Nothing live under that id
    Absent,
    /// Hard-deleted
    Removed { previous: Note },
    /// Replaced by a tombstone
    Tombstoned { previous: Note, tombstone: Note },
}

impl DeleteOutcome {
    /// Whether the call removed a live note
    #[must_use]
    pub const fn deleted(&self) -> bool {
        !matches!(self, Self::Absent)
    }
}

/// Thread-safe note lifecycle over a [`LocalStore`]; clones share state.
///
/// Every operation works on the partition of the current owner, which starts
/// signed out and follows [`NoteService::switch_owner`].
pub struct NoteService<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    deletion_policy: DeletionPolicy,
    owner: Arc<watch::Sender<Option<UserId>>>,
    live: Arc<watch::Sender<Vec<Note>>>,
}

impl<S> Clone for NoteService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
            deletion_policy: self.deletion_policy,
            owner: Arc::clone(&self.owner),
            live: Arc::clone(&self.live),
        }
    }
}

impl<S: LocalStore> NoteService<S> {
    /// Wrap `store` and publish its current live notes
    pub async fn new(store: S, clock: Arc<dyn Clock>, deletion_policy: DeletionPolicy) -> Result<Self> {
        let (live, _) = watch::channel(Vec::new());
        let (owner, _) = watch::channel(None);
        let service = Self {
            store: Arc::new(store),
            clock,
            deletion_policy,
            owner: Arc::new(owner),
            live: Arc::new(live),
        };
        service.refresh().await?;
        Ok(service)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub const fn deletion_policy(&self) -> DeletionPolicy {
        self.deletion_policy
    }

    /// User whose partition the service works on; `None` while signed out
    pub fn owner(&self) -> Option<UserId> {
        self.owner.borrow().clone()
    }

    /// Work on `owner`'s partition from now on and publish its notes.
    ///
    /// A signed-in owner takes over the notes written while signed out.
    pub async fn switch_owner(&self, owner: Option<UserId>) -> Result<()> {
        let previous = self.owner.send_replace(owner.clone());
        if let Some(user_id) = &owner {
            let claimed = self.store.claim_unowned(user_id).await?;
            if claimed > 0 {
                tracing::info!("Moved {claimed} signed-out notes to {user_id}");
            }
        }
        self.refresh().await?;

        if previous != owner {
            tracing::debug!(
                "Local notes now scoped to {}",
                owner.as_ref().map_or("signed-out user", UserId::as_str)
            );
        }
        Ok(())
    }

    /// Receiver that always holds the current live-note list, newest first
    pub fn watch(&self) -> watch::Receiver<Vec<Note>> {
        self.live.subscribe()
    }

    /// Re-read the store and publish the live notes
    pub async fn refresh(&self) -> Result<Vec<Note>> {
        let notes = self.list().await?;
        self.live.send_replace(notes.clone());
        Ok(notes)
    }

    /// Create a new unsynced note
    pub async fn create(&self, title: &str, content: &str) -> Result<Note> {
        validate(title, content)?;

        let note = Note::new(title, content, self.clock.now_ms());
        self.store.put(self.owner().as_ref(), &note).await?;
        self.refresh().await?;

        tracing::info!("Created note {}", note.id);
        Ok(note)
    }

    /// Replace title and content of a live note, stamping it strictly newer
    pub async fn update(&self, id: &NoteId, title: &str, content: &str) -> Result<Note> {
        validate(title, content)?;

        let existing = self.live_note(id).await?.ok_or(Error::NotFound(*id))?;
        let note = Note {
            id: existing.id,
            title: title.trim().to_string(),
            content: content.to_string(),
            last_updated: next_stamp(self.clock.as_ref(), Some(existing.last_updated)),
            status: NoteStatus::Unsynced,
            deleted: false,
        };
        self.store.put(self.owner().as_ref(), &note).await?;
        self.refresh().await?;

        tracing::info!("Updated note {}", note.id);
        Ok(note)
    }

    /// Delete a note according to the deletion policy. Absent ids are a no-op.
    pub async fn delete(&self, id: &NoteId) -> Result<DeleteOutcome> {
        let owner = self.owner();
        let Some(previous) = self.live_note(id).await? else {
            return Ok(DeleteOutcome::Absent);
        };

        let outcome = match self.deletion_policy {
            DeletionPolicy::LocalOnly => {
                self.store.delete(owner.as_ref(), id).await?;
                DeleteOutcome::Removed { previous }
            }
            DeletionPolicy::Tombstone => {
                let stamp = next_stamp(self.clock.as_ref(), Some(previous.last_updated));
                let tombstone = previous.clone().into_tombstone(stamp);
                self.store.put(owner.as_ref(), &tombstone).await?;
                DeleteOutcome::Tombstoned {
                    previous,
                    tombstone,
                }
            }
        };
        self.refresh().await?;

        tracing::info!("Deleted note {id} ({})", self.deletion_policy);
        Ok(outcome)
    }

    /// A live note by id
    pub async fn get(&self, id: &NoteId) -> Result<Option<Note>> {
        self.live_note(id).await
    }

    /// Live notes, newest first
    pub async fn list(&self) -> Result<Vec<Note>> {
        let mut notes = self.store.get_all(self.owner().as_ref()).await?;
        notes.retain(|note| !note.is_tombstone());
        Ok(notes)
    }

    /// Live notes matching `query` on title or content
    pub async fn search(&self, query: &str) -> Result<Vec<Note>> {
        let notes = self.list().await?;
        Ok(filter_notes(&notes, query))
    }

    /// Merge a remote snapshot into the store and publish the result.
    ///
    /// The merge runs against the latest local snapshot and is committed with a
    /// last-writer-wins upsert, so an edit that lands in between is never lost.
    pub async fn commit_merge(&self, remote: &[Note]) -> Result<MergeReport> {
        let owner = self.owner();
        let local = self.store.get_all(owner.as_ref()).await?;
        let outcome = merge_notes(&local, remote);
        let changed: Vec<Note> = outcome
            .changed_notes(&local)
            .into_iter()
            .cloned()
            .collect();

        let written = self.store.merge_many(owner.as_ref(), &changed).await?;
        self.refresh().await?;

        tracing::debug!(
            "Merged {} remote notes: {} adopted, {} replaced, {} kept local, {written} written",
            remote.len(),
            outcome.report.adopted,
            outcome.report.replaced,
            outcome.report.kept_local,
        );
        Ok(outcome.report)
    }

    /// Copy of a live note as it will be written to the mirror: `Synced`, freshly stamped
    pub async fn prepare_share(&self, id: &NoteId) -> Result<Note> {
        let note = self.live_note(id).await?.ok_or(Error::NotFound(*id))?;
        Ok(Note {
            last_updated: next_stamp(self.clock.as_ref(), Some(note.last_updated)),
            status: NoteStatus::Synced,
            ..note
        })
    }

    /// Persist a copy that was written to the mirror.
    ///
    /// Skipped when a newer local version landed after the copy was taken.
    pub async fn mark_synced(&self, note: &Note) -> Result<bool> {
        let written = self
            .store
            .merge_many(self.owner().as_ref(), std::slice::from_ref(note))
            .await?;
        self.refresh().await?;
        Ok(written > 0)
    }

    async fn live_note(&self, id: &NoteId) -> Result<Option<Note>> {
        Ok(self
            .store
            .get(self.owner().as_ref(), id)
            .await?
            .filter(|note| !note.is_tombstone()))
    }
}

fn validate(title: &str, content: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(Error::Validation("title must not be empty".to_string()));
    }
    if content.trim().is_empty() {
        return Err(Error::Validation("content must not be empty".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::db::LibSqlNoteStore;
    use pretty_assertions::assert_eq;

    async fn setup_with(policy: DeletionPolicy) -> (NoteService<LibSqlNoteStore>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_000));
        let store = LibSqlNoteStore::open_in_memory().await.unwrap();
        let service = NoteService::new(store, clock.clone(), policy).await.unwrap();
        (service, clock)
    }

    async fn setup() -> (NoteService<LibSqlNoteStore>, Arc<ManualClock>) {
        setup_with(DeletionPolicy::Tombstone).await
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_create_then_list() {
        let (service, _clock) = setup().await;

        let note = service.create("  Title ", "body").await.unwrap();

        assert_eq!(note.title, "Title");
        assert_eq!(note.status, NoteStatus::Unsynced);
        assert_eq!(note.last_updated, 1_000);
        assert_eq!(service.list().await.unwrap(), vec![note.clone()]);
        assert_eq!(*service.watch().borrow(), vec![note]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_create_rejects_blank_fields() {
        let (service, _clock) = setup().await;

        assert!(matches!(
            service.create("   ", "body").await,
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            service.create("title", " \n ").await,
            Err(Error::Validation(_))
        ));
        assert!(service.store().get_all(None).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_update_stamps_strictly_newer() {
        let (service, clock) = setup().await;
        let note = service.create("Draft", "v1").await.unwrap();

        // Clock has not moved; the stamp must still advance
        let updated = service.update(&note.id, "Draft", "v2").await.unwrap();
        assert_eq!(updated.last_updated, 1_001);

        clock.set(5_000);
        let again = service.update(&note.id, "Final", "v3").await.unwrap();
        assert_eq!(again.last_updated, 5_000);
        assert_eq!(service.get(&note.id).await.unwrap(), Some(again));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_update_resets_status_to_unsynced() {
        let (service, _clock) = setup().await;
        let note = service.create("Shared", "body").await.unwrap();
        let shared = service.prepare_share(&note.id).await.unwrap();
        service.mark_synced(&shared).await.unwrap();

        let edited = service.update(&note.id, "Shared", "edited").await.unwrap();

        assert_eq!(edited.status, NoteStatus::Unsynced);
        assert!(edited.last_updated > shared.last_updated);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_update_validates_before_lookup() {
        let (service, _clock) = setup().await;
        let missing = NoteId::new();

        assert!(matches!(
            service.update(&missing, "", "x").await,
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            service.update(&missing, "t", "x").await,
            Err(Error::NotFound(id)) if id == missing
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_delete_tombstone_is_idempotent() {
        let (service, _clock) = setup().await;
        let note = service.create("Doomed", "x").await.unwrap();

        let first = service.delete(&note.id).await.unwrap();
        let DeleteOutcome::Tombstoned { tombstone, .. } = first else {
            panic!("expected a tombstone, got {first:?}");
        };
        assert!(tombstone.is_tombstone());
        assert!(tombstone.title.is_empty());
        assert!(tombstone.last_updated > note.last_updated);

        assert_eq!(service.delete(&note.id).await.unwrap(), DeleteOutcome::Absent);
        assert_eq!(
            service.store().get(None, &note.id).await.unwrap(),
            Some(tombstone)
        );
        assert!(service.list().await.unwrap().is_empty());
        assert!(service.get(&note.id).await.unwrap().is_none());
        assert!(matches!(
            service.update(&note.id, "back", "again").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_delete_local_only_removes_record() {
        let (service, _clock) = setup_with(DeletionPolicy::LocalOnly).await;
        let note = service.create("Doomed", "x").await.unwrap();

        assert!(service.delete(&note.id).await.unwrap().deleted());
        assert!(!service.delete(&note.id).await.unwrap().deleted());
        assert!(service.store().get_all(None).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_delete_absent_is_noop() {
        let (service, _clock) = setup().await;
        assert_eq!(
            service.delete(&NoteId::new()).await.unwrap(),
            DeleteOutcome::Absent
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_search_matches_title_and_content() {
        let (service, clock) = setup().await;
        service.create("Groceries", "milk").await.unwrap();
        clock.advance(1);
        let rust = service.create("Reading", "Rust book").await.unwrap();

        assert_eq!(service.search("rust").await.unwrap(), vec![rust]);
        assert_eq!(service.search("").await.unwrap().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_commit_merge_keeps_offline_edit() {
        let (service, clock) = setup().await;
        clock.set(1_100);
        let local = service.create("A", "edited offline").await.unwrap();

        let stale = Note {
            content: "remote copy".to_string(),
            last_updated: 1_000,
            status: NoteStatus::Synced,
            ..local.clone()
        };
        let adopted = Note::new("From elsewhere", "hello", 900);

        let report = service
            .commit_merge(&[stale, adopted.clone()])
            .await
            .unwrap();

        assert_eq!(report.adopted, 1);
        assert_eq!(report.kept_local, 1);
        assert_eq!(service.get(&local.id).await.unwrap(), Some(local.clone()));
        assert_eq!(*service.watch().borrow(), vec![local, adopted]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_commit_merge_applies_newer_remote_tombstone() {
        let (service, _clock) = setup().await;
        let note = service.create("Shared", "x").await.unwrap();
        let remote_delete = note.clone().into_tombstone(note.last_updated + 10);

        service.commit_merge(&[remote_delete]).await.unwrap();

        assert!(service.list().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_stale_remote_cannot_revive_tombstone() {
        let (service, _clock) = setup().await;
        let note = service.create("Gone", "x").await.unwrap();
        let stale_remote = Note {
            status: NoteStatus::Synced,
            ..note.clone()
        };
        service.delete(&note.id).await.unwrap();

        service.commit_merge(&[stale_remote]).await.unwrap();

        assert!(service.list().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_local_only_delete_is_revived_by_remote() {
        let (service, _clock) = setup_with(DeletionPolicy::LocalOnly).await;
        let note = service.create("Shared", "x").await.unwrap();
        let remote_copy = Note {
            status: NoteStatus::Synced,
            ..note.clone()
        };
        service.delete(&note.id).await.unwrap();

        service.commit_merge(&[remote_copy.clone()]).await.unwrap();

        assert_eq!(service.list().await.unwrap(), vec![remote_copy]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_mark_synced_skips_when_local_is_newer() {
        let (service, _clock) = setup().await;
        let note = service.create("Race", "v1").await.unwrap();
        let shared = service.prepare_share(&note.id).await.unwrap();
        let edited = service.update(&note.id, "Race", "v2").await.unwrap();
        assert_eq!(edited.last_updated, shared.last_updated);

        assert!(!service.mark_synced(&shared).await.unwrap());
        assert_eq!(service.get(&note.id).await.unwrap(), Some(edited));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_switch_owner_scopes_every_operation() {
        let (service, clock) = setup().await;
        let alice = UserId::new("alice").unwrap();
        let bob = UserId::new("bob").unwrap();
        service.switch_owner(Some(alice.clone())).await.unwrap();
        let private = service.create("Alice private", "x").await.unwrap();
        clock.advance(1);
        service
            .commit_merge(&[Note::new("Alice from phone", "y", 900)])
            .await
            .unwrap();

        service.switch_owner(Some(bob)).await.unwrap();

        assert!(service.list().await.unwrap().is_empty());
        assert!(service.watch().borrow().is_empty());
        assert!(service.get(&private.id).await.unwrap().is_none());
        assert!(matches!(
            service.prepare_share(&private.id).await,
            Err(Error::NotFound(_))
        ));
        assert_eq!(
            service.delete(&private.id).await.unwrap(),
            DeleteOutcome::Absent
        );

        service.switch_owner(Some(alice)).await.unwrap();
        assert_eq!(service.list().await.unwrap().len(), 2);
        assert_eq!(service.get(&private.id).await.unwrap(), Some(private));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_signing_in_claims_signed_out_notes() {
        let (service, _clock) = setup().await;
        let draft = service.create("Draft", "before sign-in").await.unwrap();

        service
            .switch_owner(Some(UserId::new("alice").unwrap()))
            .await
            .unwrap();
        assert_eq!(service.list().await.unwrap(), vec![draft]);

        service.switch_owner(None).await.unwrap();
        assert_eq!(service.owner(), None);
        assert!(service.list().await.unwrap().is_empty());
    }
}
