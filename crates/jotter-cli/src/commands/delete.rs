use jotter_core::services::DeleteOutcome;

use crate::commands::common::{resolve_note, start_coordinator, CliContext};
use crate::error::CliError;

/// Delete locally; a shared note's tombstone is pushed when signed in and online
pub async fn run_delete(id: &str, context: &CliContext) -> Result<DeleteOutcome, CliError> {
    let notes = context.open_notes().await?;
    let note = resolve_note(id, &notes).await?;

    let outcome = match context.try_connect().await? {
        Some(remote) if remote.session.is_some() => {
            let mut coordinator = start_coordinator(notes, remote).await?;
            let outcome = coordinator.delete(&note.id).await;
            coordinator.shutdown();
            outcome?
        }
        _ => notes.delete(&note.id).await?,
    };

    println!("{}", note.id);
    Ok(outcome)
}
