use jotter_core::Note;

use crate::commands::common::{format_timestamp, resolve_note, CliContext};
use crate::error::CliError;

pub async fn run_show(id: &str, context: &CliContext) -> Result<(), CliError> {
    let notes = context.open_notes().await?;
    let note = resolve_note(id, &notes).await?;
    print!("{}", render_note(&note));
    Ok(())
}

pub fn render_note(note: &Note) -> String {
    format!(
        "{}\n{}  ·  {}  ·  {}\n\n{}\n",
        note.title,
        note.id,
        note.status,
        format_timestamp(note.last_updated),
        note.content
    )
}
