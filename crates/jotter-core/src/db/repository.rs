//! Local note store

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use libsql::{params, Connection, Row};
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::models::{Note, NoteId, NoteStatus, UserId};

use super::Database;

/// Durable on-device note persistence, keyed by owner and note id.
///
/// Every operation is durable before it resolves, and no caller can observe a
/// partially written record. `owner` selects a partition: each signed-in user
/// has one, and `None` is the partition for notes written while signed out.
/// No operation reads or writes across partitions.
pub trait LocalStore: Send + Sync + 'static {
    /// Every record of the partition including tombstones, newest first
    fn get_all(&self, owner: Option<&UserId>) -> impl Future<Output = Result<Vec<Note>>> + Send;

    /// A single record, tombstones included
    fn get(
        &self,
        owner: Option<&UserId>,
        id: &NoteId,
    ) -> impl Future<Output = Result<Option<Note>>> + Send;

    /// Upsert keyed by `id`; replaces the whole record or fails leaving the old one
    fn put(&self, owner: Option<&UserId>, note: &Note) -> impl Future<Output = Result<()>> + Send;

    /// Upsert many records in one transaction
    fn put_many(
        &self,
        owner: Option<&UserId>,
        notes: &[Note],
    ) -> impl Future<Output = Result<()>> + Send;

    /// Last-writer-wins upsert: a record replaces the stored one only when its
    /// `last_updated` is strictly greater. Returns the number of rows changed.
    fn merge_many(
        &self,
        owner: Option<&UserId>,
        notes: &[Note],
    ) -> impl Future<Output = Result<usize>> + Send;

    /// Hard delete; absent ids are a no-op
    fn delete(&self, owner: Option<&UserId>, id: &NoteId) -> impl Future<Output = Result<()>> + Send;

    /// Move signed-out notes into `owner`'s partition. Ids the owner already
    /// holds stay behind. Returns the number of notes moved.
    fn claim_unowned(&self, owner: &UserId) -> impl Future<Output = Result<usize>> + Send;
}

const SELECT_COLUMNS: &str = "SELECT id, title, content, last_updated, status, deleted FROM notes";

const UPSERT: &str = "INSERT INTO notes (owner, id, title, content, last_updated, status, deleted)
     VALUES (?, ?, ?, ?, ?, ?, ?)
     ON CONFLICT(owner, id) DO UPDATE SET
        title = excluded.title,
        content = excluded.content,
        last_updated = excluded.last_updated,
        status = excluded.status,
        deleted = excluded.deleted";

const UPSERT_IF_NEWER: &str = "INSERT INTO notes (owner, id, title, content, last_updated, status, deleted)
     VALUES (?, ?, ?, ?, ?, ?, ?)
     ON CONFLICT(owner, id) DO UPDATE SET
        title = excluded.title,
        content = excluded.content,
        last_updated = excluded.last_updated,
        status = excluded.status,
        deleted = excluded.deleted
     WHERE excluded.last_updated > notes.last_updated";

/// Partition key of `owner`; signed-out notes live under the empty key
fn partition_key(owner: Option<&UserId>) -> &str {
    owner.map_or("", UserId::as_str)
}

/// libSQL implementation of `LocalStore`
///
/// A single connection serialized behind an async mutex; cloning shares it.
#[derive(Clone)]
pub struct LibSqlNoteStore {
    db: Arc<Mutex<Database>>,
}

impl LibSqlNoteStore {
    /// Wrap an opened database
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    /// Open (and migrate) the store at `path`, creating parent directories
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(Self::new(Database::open(path).await?))
    }

    /// Open an in-memory store (primarily for tests)
    pub async fn open_in_memory() -> Result<Self> {
        Ok(Self::new(Database::open_in_memory().await?))
    }

    /// Parse a note from a database row
    fn parse_note(row: &Row) -> Result<Note> {
        let id: String = row.get(0)?;
        let status: String = row.get(4)?;
        Ok(Note {
            id: id
                .parse()
                .map_err(|_| Error::Database(format!("invalid note id in store: {id}")))?,
            title: row.get(1)?,
            content: row.get(2)?,
            last_updated: row.get(3)?,
            status: status.parse::<NoteStatus>().map_err(Error::Database)?,
            deleted: row.get::<i64>(5)? != 0,
        })
    }

    async fn write_one(conn: &Connection, sql: &str, owner: &str, note: &Note) -> Result<u64> {
        let changed = conn
            .execute(
                sql,
                params![
                    owner,
                    note.id.as_str(),
                    note.title.clone(),
                    note.content.clone(),
                    note.last_updated,
                    note.status.as_str(),
                    i64::from(note.deleted)
                ],
            )
            .await?;
        Ok(changed)
    }

    /// Apply `sql` to every note inside one transaction
    async fn write_batch(
        conn: &Connection,
        sql: &str,
        owner: &str,
        notes: &[Note],
    ) -> Result<usize> {
        conn.execute("BEGIN IMMEDIATE", ()).await?;

        let mut changed = 0usize;
        for note in notes {
            match Self::write_one(conn, sql, owner, note).await {
                Ok(rows) => changed += usize::try_from(rows).unwrap_or(usize::MAX),
                Err(e) => {
                    conn.execute("ROLLBACK", ()).await.ok();
                    return Err(e);
                }
            }
        }

        if let Err(e) = conn.execute("COMMIT", ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }

        Ok(changed)
    }
}

impl LocalStore for LibSqlNoteStore {
    async fn get_all(&self, owner: Option<&UserId>) -> Result<Vec<Note>> {
        let db = self.db.lock().await;
        let mut rows = db
            .connection()
            .query(
                &format!("{SELECT_COLUMNS} WHERE owner = ? ORDER BY last_updated DESC, id ASC"),
                [partition_key(owner)],
            )
            .await?;

        let mut notes = Vec::new();
        while let Some(row) = rows.next().await? {
            notes.push(Self::parse_note(&row)?);
        }
        Ok(notes)
    }

    async fn get(&self, owner: Option<&UserId>, id: &NoteId) -> Result<Option<Note>> {
        let db = self.db.lock().await;
        let mut rows = db
            .connection()
            .query(
                &format!("{SELECT_COLUMNS} WHERE owner = ? AND id = ?"),
                [partition_key(owner), &id.as_str()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_note(&row)?)),
            None => Ok(None),
        }
    }

    async fn put(&self, owner: Option<&UserId>, note: &Note) -> Result<()> {
        let db = self.db.lock().await;
        Self::write_one(db.connection(), UPSERT, partition_key(owner), note).await?;
        Ok(())
    }

    async fn put_many(&self, owner: Option<&UserId>, notes: &[Note]) -> Result<()> {
        if notes.is_empty() {
            return Ok(());
        }
        let db = self.db.lock().await;
        Self::write_batch(db.connection(), UPSERT, partition_key(owner), notes).await?;
        Ok(())
    }

    async fn merge_many(&self, owner: Option<&UserId>, notes: &[Note]) -> Result<usize> {
        if notes.is_empty() {
            return Ok(0);
        }
        let db = self.db.lock().await;
        Self::write_batch(db.connection(), UPSERT_IF_NEWER, partition_key(owner), notes).await
    }

    async fn delete(&self, owner: Option<&UserId>, id: &NoteId) -> Result<()> {
        let db = self.db.lock().await;
        db.connection()
            .execute(
                "DELETE FROM notes WHERE owner = ? AND id = ?",
                [partition_key(owner), &id.as_str()],
            )
            .await?;
        Ok(())
    }

    async fn claim_unowned(&self, owner: &UserId) -> Result<usize> {
        let db = self.db.lock().await;
        let moved = db
            .connection()
            .execute(
                "UPDATE OR IGNORE notes SET owner = ? WHERE owner = ''",
                [owner.as_str()],
            )
            .await?;
        Ok(usize::try_from(moved).unwrap_or(usize::MAX))
    }
}
