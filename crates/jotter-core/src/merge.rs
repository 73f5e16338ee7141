//! Last-writer-wins reconciliation of a local and a remote note collection.
//!
//! The local collection is the base. A remote record is adopted when its id is
//! unknown locally and replaces the local record only when its `last_updated`
//! is strictly greater; equal stamps keep the local copy. Local notes missing
//! from the remote side are retained, since the engine cannot tell an unshared
//! note from one deleted remotely. Records are swapped wholesale, never spliced.

use std::collections::{BTreeMap, HashMap};

use crate::models::{Note, NoteId};

/// Counts of merge decisions, for logging
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Remote notes with no local counterpart
    pub adopted: usize,
    /// Local notes superseded by a newer remote copy
    pub replaced: usize,
    /// Remote notes ignored because the local copy was as new or newer
    pub kept_local: usize,
}

impl MergeReport {
    /// Whether the merge changed anything relative to the local input
    #[must_use]
    pub const fn changed(&self) -> bool {
        self.adopted > 0 || self.replaced > 0
    }
}

/// Merged collection plus the decisions that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub notes: Vec<Note>,
    pub report: MergeReport,
}

impl MergeOutcome {
    /// Records that differ from the local input (adopted or replaced)
    #[must_use]
    pub fn changed_notes<'a>(&'a self, local: &'a [Note]) -> Vec<&'a Note> {
        let local_by_id: HashMap<NoteId, &Note> = local.iter().map(|n| (n.id, n)).collect();
        self.notes
            .iter()
            .filter(|note| local_by_id.get(&note.id).is_none_or(|old| *old != *note))
            .collect()
    }
}

/// Ordering key used to pick one winner among records with the same id.
///
/// `last_updated` dominates; the remaining fields only break exact-stamp ties
/// so the pick never depends on input order.
fn precedence(note: &Note) -> (i64, crate::models::NoteStatus, bool, &str, &str) {
    (
        note.last_updated,
        note.status,
        note.deleted,
        note.title.as_str(),
        note.content.as_str(),
    )
}

/// Merge `remote` into `local` with the last-writer-wins rule.
#[must_use]
pub fn merge_notes(local: &[Note], remote: &[Note]) -> MergeOutcome {
    // Collapse duplicate remote ids first; BTreeMap also fixes adoption order
    let mut remote_by_id: BTreeMap<NoteId, &Note> = BTreeMap::new();
    for note in remote {
        remote_by_id
            .entry(note.id)
            .and_modify(|current| {
                if precedence(note) > precedence(current) {
                    *current = note;
                }
            })
            .or_insert(note);
    }

    let mut report = MergeReport::default();
    let mut merged: Vec<Note> = Vec::with_capacity(local.len() + remote_by_id.len());
    let mut seen: HashMap<NoteId, usize> = HashMap::with_capacity(local.len());

    for note in local {
        match seen.get(&note.id) {
            // Duplicate local ids cannot come from the store; keep the newest
            Some(&index) => {
                if note.last_updated > merged[index].last_updated {
                    merged[index] = note.clone();
                }
            }
            None => {
                seen.insert(note.id, merged.len());
                merged.push(note.clone());
            }
        }
    }

    for (id, remote_note) in remote_by_id {
        match seen.get(&id) {
            None => {
                report.adopted += 1;
                merged.push(remote_note.clone());
            }
            Some(&index) if remote_note.last_updated > merged[index].last_updated => {
                report.replaced += 1;
                merged[index] = remote_note.clone();
            }
            Some(_) => report.kept_local += 1,
        }
    }

    MergeOutcome {
        notes: merged,
        report,
    }
}
