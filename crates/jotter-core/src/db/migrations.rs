//! Database migrations

use crate::error::Result;
use libsql::Connection;

/// Current schema version
const CURRENT_VERSION: i32 = 3;

/// Run all pending migrations
pub async fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn).await?;

    if version < 1 {
        migrate_v1(conn).await?;
    }
    if version < 2 {
        migrate_v2(conn).await?;
    }
    if version < 3 {
        migrate_v3(conn).await?;
    }
    if version < CURRENT_VERSION {
        tracing::debug!("Database schema is at version {CURRENT_VERSION}");
    }

    Ok(())
}

/// Get the current schema version
async fn get_version(conn: &Connection) -> Result<i32> {
    let mut rows = conn
        .query(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            (),
        )
        .await?;

    let exists: bool = if let Some(row) = rows.next().await? {
        row.get::<i32>(0)? != 0
    } else {
        false
    };

    if !exists {
        return Ok(0);
    }

    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;

    let version: i32 = if let Some(row) = rows.next().await? {
        row.get(0)?
    } else {
        0
    };

    Ok(version)
}

async fn apply(conn: &Connection, version: i32, statements: &[&str]) -> Result<()> {
    conn.execute("BEGIN TRANSACTION", ()).await?;

    for stmt in statements {
        if let Err(e) = conn.execute(stmt, ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
    }

    if let Err(e) = conn
        .execute(
            "INSERT INTO schema_version (version) VALUES (?)",
            libsql::params![i64::from(version)],
        )
        .await
    {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    if let Err(e) = conn.execute("COMMIT", ()).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    tracing::info!("Migrated database to version {version}");
    Ok(())
}

/// Migration to version 1: Initial schema
async fn migrate_v1(conn: &Connection) -> Result<()> {
    apply(
        conn,
        1,
        &[
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            )",
            "CREATE TABLE IF NOT EXISTS notes (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                content TEXT NOT NULL,
                last_updated INTEGER NOT NULL,
                status TEXT NOT NULL DEFAULT 'Unsynced'
            )",
            "CREATE INDEX IF NOT EXISTS idx_notes_last_updated ON notes(last_updated DESC)",
        ],
    )
    .await
}

/// Migration to version 2: tombstones
async fn migrate_v2(conn: &Connection) -> Result<()> {
    apply(
        conn,
        2,
        &[
            "ALTER TABLE notes ADD COLUMN deleted INTEGER NOT NULL DEFAULT 0",
            "CREATE INDEX IF NOT EXISTS idx_notes_deleted ON notes(deleted)",
        ],
    )
    .await
}

/// Migration to version 3: notes partitioned by owning user.
///
/// Existing rows move to the signed-out partition.
async fn migrate_v3(conn: &Connection) -> Result<()> {
    apply(
        conn,
        3,
        &[
            "CREATE TABLE notes_by_owner (
                owner TEXT NOT NULL DEFAULT '',
                id TEXT NOT NULL,
                title TEXT NOT NULL,
                content TEXT NOT NULL,
                last_updated INTEGER NOT NULL,
                status TEXT NOT NULL DEFAULT 'Unsynced',
                deleted INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (owner, id)
            )",
            "INSERT INTO notes_by_owner (owner, id, title, content, last_updated, status, deleted)
             SELECT '', id, title, content, last_updated, status, deleted FROM notes",
            "DROP TABLE notes",
            "ALTER TABLE notes_by_owner RENAME TO notes",
            "CREATE INDEX IF NOT EXISTS idx_notes_last_updated ON notes(owner, last_updated DESC)",
            "CREATE INDEX IF NOT EXISTS idx_notes_deleted ON notes(deleted)",
        ],
    )
    .await
}
