use crate::commands::common::{format_note_lines, note_to_list_item, CliContext, NoteListItem};
use crate::error::CliError;

pub async fn run_list(
    query: Option<&str>,
    as_json: bool,
    context: &CliContext,
) -> Result<(), CliError> {
    let notes = context.open_notes().await?;
    let notes = match query {
        Some(query) => notes.search(query).await?,
        None => notes.list().await?,
    };

    if as_json {
        let json_items = notes
            .iter()
            .map(note_to_list_item)
            .collect::<Vec<NoteListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else if notes.is_empty() {
        println!("No notes yet.");
    } else {
        for line in format_note_lines(&notes) {
            println!("{line}");
        }
    }

    Ok(())
}
