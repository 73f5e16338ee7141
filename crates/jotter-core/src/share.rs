//! Shared links and the browse-all explore listing.

use std::fmt;

use crate::error::{Error, Result};
use crate::models::{Note, NoteId, UserId};
use crate::remote::RemoteMirror;

/// Address of a note in the remote mirror, as handed out to other people
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SharedLink {
    pub owner_id: UserId,
    pub note_id: NoteId,
}

impl SharedLink {
    pub const fn new(owner_id: UserId, note_id: NoteId) -> Self {
        Self { owner_id, note_id }
    }

    /// `{base}/shared/{owner}/{note}`
    pub fn to_url(&self, base_url: &str) -> String {
        format!(
            "{}/shared/{}/{}",
            base_url.trim().trim_end_matches('/'),
            urlencoding::encode(self.owner_id.as_str()),
            self.note_id
        )
    }

    /// Parse a full link, a `/shared/owner/note` path, or a bare `owner/note`
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let without_suffix = trimmed
            .split(['?', '#'])
            .next()
            .unwrap_or_default();

        let path = match without_suffix.find("/shared/") {
            Some(index) => &without_suffix[index + "/shared/".len()..],
            None => without_suffix
                .strip_prefix("shared/")
                .unwrap_or(without_suffix),
        };

        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let [owner, note] = segments.as_slice() else {
            return Err(Error::InvalidInput(format!(
                "not a shared note link: {trimmed}"
            )));
        };

        let owner = urlencoding::decode(owner)
            .map_err(|_| Error::InvalidInput(format!("invalid owner in link: {owner}")))?;
        let note_id = note
            .parse()
            .map_err(|_| Error::InvalidInput(format!("invalid note id in link: {note}")))?;

        Ok(Self {
            owner_id: UserId::new(owner.into_owned())?,
            note_id,
        })
    }
}

impl fmt::Display for SharedLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner_id, self.note_id)
    }
}

/// Fetch the note a shared link points at. Works without signing in.
pub async fn resolve_shared<R: RemoteMirror>(remote: &R, link: &SharedLink) -> Result<Note> {
    match remote.read_once(&link.owner_id, &link.note_id).await? {
        Some(note) if !note.is_tombstone() => Ok(note),
        _ => Err(Error::SharedNoteNotFound {
            owner_id: link.owner_id.clone(),
            note_id: link.note_id,
        }),
    }
}

/// A note together with the user whose collection holds it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthoredNote {
    pub author_id: UserId,
    pub note: Note,
}

impl AuthoredNote {
    pub fn link(&self) -> SharedLink {
        SharedLink::new(self.author_id.clone(), self.note.id)
    }
}

/// Every user's live notes flattened into one list, newest first
pub async fn explore<R: RemoteMirror>(remote: &R) -> Result<Vec<AuthoredNote>> {
    let listing = remote.read_everything().await?;

    let mut notes: Vec<AuthoredNote> = listing
        .into_iter()
        .flat_map(|(author_id, collection)| {
            collection
                .into_values()
                .filter(|note| !note.is_tombstone())
                .map(move |note| AuthoredNote {
                    author_id: author_id.clone(),
                    note,
                })
        })
        .collect();

    notes.sort_by(|a, b| {
        b.note
            .last_updated
            .cmp(&a.note.last_updated)
            .then_with(|| a.author_id.cmp(&b.author_id))
            .then_with(|| a.note.id.cmp(&b.note.id))
    });
    Ok(notes)
}
