//! Application services shared by all clients.

mod notes;

pub use notes::{DeleteOutcome, NoteService};
