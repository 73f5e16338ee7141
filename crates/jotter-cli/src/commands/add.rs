use jotter_core::Note;

use crate::commands::common::{resolve_note_content, CliContext};
use crate::error::CliError;

pub async fn run_add(
    title: &str,
    content_parts: &[String],
    context: &CliContext,
) -> Result<Note, CliError> {
    let content = resolve_note_content(content_parts)?;

    let notes = context.open_notes().await?;
    let note = notes.create(title, &content).await?;

    println!("{}", note.id);
    Ok(note)
}
