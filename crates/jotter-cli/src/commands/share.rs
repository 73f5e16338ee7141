use jotter_core::sync::ShareOutcome;

use crate::commands::common::{resolve_note, start_coordinator, CliContext};
use crate::error::CliError;

/// Publish a note; signed-out users are sent to `auth login` whatever the connectivity
pub async fn run_share(id: &str, context: &CliContext) -> Result<ShareOutcome, CliError> {
    let notes = context.open_notes().await?;
    let note = resolve_note(id, &notes).await?;
    context.remote_url()?;

    let Some(session) = context.session().await? else {
        println!(
            "Sign in to share notes: run `jotter auth login --email <email> --password <password>`."
        );
        return Ok(ShareOutcome::AuthenticationRequired);
    };
    let remote = context.connect_as(Some(session))?;

    let mut coordinator = start_coordinator(notes, remote).await?;
    let outcome = coordinator.share(&note.id).await;
    if let Ok(ShareOutcome::Shared { link, .. }) = &outcome {
        println!("{}", coordinator.link_url(link));
    }
    coordinator.shutdown();
    Ok(outcome?)
}
