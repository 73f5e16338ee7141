//! Search over the in-memory note list.

use crate::models::Note;

/// Notes whose title or content contains `query`, ignoring case.
///
/// A blank query matches everything. Input order is preserved.
pub fn filter_notes<'a, I>(notes: I, query: &str) -> Vec<Note>
where
    I: IntoIterator<Item = &'a Note>,
{
    let needle = query.trim().to_lowercase();
    notes
        .into_iter()
        .filter(|note| needle.is_empty() || matches(note, &needle))
        .cloned()
        .collect()
}

fn matches(note: &Note, needle: &str) -> bool {
    note.title.to_lowercase().contains(needle) || note.content.to_lowercase().contains(needle)
}
