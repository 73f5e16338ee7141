use jotter_core::Note;

use crate::commands::common::{
    capture_editor_input, parse_editor_buffer, render_editor_buffer, resolve_note, CliContext,
};
use crate::error::CliError;

pub async fn run_edit(
    id: &str,
    title: Option<String>,
    content: Option<String>,
    context: &CliContext,
) -> Result<Note, CliError> {
    let notes = context.open_notes().await?;
    let note = resolve_note(id, &notes).await?;

    let (title, content) = if title.is_none() && content.is_none() {
        let initial = render_editor_buffer(&note.title, &note.content);
        capture_editor_input(&initial)?
            .as_deref()
            .and_then(parse_editor_buffer)
            .ok_or(CliError::EmptyContent)?
    } else {
        (
            title.unwrap_or_else(|| note.title.clone()),
            content.unwrap_or_else(|| note.content.clone()),
        )
    };

    if title.trim() == note.title && content == note.content {
        println!("{}", note.id);
        return Ok(note);
    }

    let updated = notes.update(&note.id, &title, &content).await?;
    println!("{}", updated.id);
    Ok(updated)
}
