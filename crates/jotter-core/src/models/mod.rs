//! Data models for Jotter

mod note;
mod user;

pub use note::{Note, NoteId, NoteStatus};
pub use user::UserId;
