//! Note model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A unique identifier for a note, using UUID v7 (time-sortable)
///
/// Any UUID version is accepted when parsing, since notes written by other
/// clients reach us through the remote mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(Uuid);

impl NoteId {
    /// Create a new unique note ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for NoteId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NoteId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s.trim())?))
    }
}

/// Sync state shown next to a note
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NoteStatus {
    /// Edited locally since the last successful share
    #[default]
    Unsynced,
    /// Holds only right after a successful remote write of the current `last_updated`
    Synced,
}

impl NoteStatus {
    /// Stored/wire label
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unsynced => "Unsynced",
            Self::Synced => "Synced",
        }
    }
}

impl fmt::Display for NoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NoteStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Unsynced" => Ok(Self::Unsynced),
            "Synced" => Ok(Self::Synced),
            other => Err(format!("unknown note status '{other}'")),
        }
    }
}

/// A note in the system
///
/// Records are always replaced wholesale; no code path splices fields from
/// two versions of the same note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    /// Unique identifier
    pub id: NoteId,
    /// Short title, stored trimmed
    pub title: String,
    /// Free text body
    pub content: String,
    /// Last mutation timestamp (Unix ms), the only merge tie-breaker
    pub last_updated: i64,
    /// Derived sync status
    #[serde(default)]
    pub status: NoteStatus,
    /// Tombstone marker
    #[serde(default, skip_serializing_if = "is_false")]
    pub deleted: bool,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_false(value: &bool) -> bool {
    !*value
}

impl Note {
    /// Create a new unsynced note stamped at `now_ms`
    #[must_use]
    pub fn new(title: impl Into<String>, content: impl Into<String>, now_ms: i64) -> Self {
        Self {
            id: NoteId::new(),
            title: title.into().trim().to_string(),
            content: content.into(),
            last_updated: now_ms,
            status: NoteStatus::Unsynced,
            deleted: false,
        }
    }

    /// Whether this record marks a deletion
    #[must_use]
    pub const fn is_tombstone(&self) -> bool {
        self.deleted
    }

    /// Turn this record into a tombstone stamped at `stamp`
    #[must_use]
    pub fn into_tombstone(self, stamp: i64) -> Self {
        Self {
            id: self.id,
            title: String::new(),
            content: String::new(),
            last_updated: stamp,
            status: NoteStatus::Unsynced,
            deleted: true,
        }
    }

    /// First content line with whitespace collapsed, truncated to `max_chars`
    #[must_use]
    pub fn preview(&self, max_chars: usize) -> String {
        let first_line = self.content.lines().next().unwrap_or("").trim();
        let collapsed = first_line.split_whitespace().collect::<Vec<_>>().join(" ");

        if collapsed.chars().count() <= max_chars {
            collapsed
        } else {
            let take_len = max_chars.saturating_sub(3);
            let mut truncated = collapsed.chars().take(take_len).collect::<String>();
            truncated.push_str("...");
            truncated
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_id_unique() {
        let id1 = NoteId::new();
        let id2 = NoteId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_note_id_parse() {
        let id = NoteId::new();
        let parsed: NoteId = id.as_str().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_note_id_accepts_v4() {
        let parsed: NoteId = "0b7f1c56-2f5e-4c1e-9a7e-3f0f2a4c9b11".parse().unwrap();
        assert_eq!(parsed.to_string(), "0b7f1c56-2f5e-4c1e-9a7e-3f0f2a4c9b11");
    }

    #[test]
    fn test_note_new() {
        let note = Note::new("  Groceries ", "milk", 1_000);
        assert_eq!(note.title, "Groceries");
        assert_eq!(note.content, "milk");
        assert_eq!(note.last_updated, 1_000);
        assert_eq!(note.status, NoteStatus::Unsynced);
        assert!(!note.is_tombstone());
    }

    #[test]
    fn test_wire_format_is_camel_case() {
        let note = Note::new("T", "C", 42);
        let value = serde_json::to_value(&note).unwrap();
        assert_eq!(value["lastUpdated"], 42);
        assert_eq!(value["status"], "Unsynced");
        assert!(value.get("deleted").is_none());
    }

    #[test]
    fn test_missing_status_defaults_to_unsynced() {
        let raw = r#"{
            "id": "0b7f1c56-2f5e-4c1e-9a7e-3f0f2a4c9b11",
            "title": "Legacy",
            "content": "written before statuses existed",
            "lastUpdated": 7
        }"#;
        let note: Note = serde_json::from_str(raw).unwrap();
        assert_eq!(note.status, NoteStatus::Unsynced);
        assert!(!note.deleted);
    }

    #[test]
    fn test_tombstone_clears_body() {
        let mut note = Note::new("Secret", "body", 10);
        note.status = NoteStatus::Synced;
        let id = note.id;
        let tombstone = note.into_tombstone(20);
        assert_eq!(tombstone.id, id);
        assert!(tombstone.is_tombstone());
        assert!(tombstone.title.is_empty());
        assert!(tombstone.content.is_empty());
        assert_eq!(tombstone.last_updated, 20);
        assert_eq!(tombstone.status, NoteStatus::Unsynced);
    }

    #[test]
    fn test_preview_truncates_with_ellipsis() {
        let note = Note::new("t", "This is a very long sentence that should be shortened", 1);
        assert_eq!(note.preview(20), "This is a very lo...");
        assert_eq!(Note::new("t", "short\nsecond", 1).preview(20), "short");
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("Synced".parse::<NoteStatus>(), Ok(NoteStatus::Synced));
        assert!("synced?".parse::<NoteStatus>().is_err());
    }
}
