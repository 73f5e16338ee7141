use jotter_core::merge::MergeReport;
use jotter_core::sync::SyncEvent;

use crate::commands::common::{start_coordinator, CliContext};
use crate::error::CliError;

/// Subscribe, merge the first snapshot of the signed-in user's collection, stop
pub async fn run_sync(context: &CliContext) -> Result<MergeReport, CliError> {
    let remote = context.connect().await?;
    if remote.session.is_none() {
        return Err(CliError::NotSignedIn);
    }

    let notes = context.open_notes().await?;
    let mut coordinator = start_coordinator(notes, remote).await?;
    let result = match coordinator.next_remote_event().await {
        Some(SyncEvent::RemoteSnapshot { user_id, notes }) => coordinator
            .apply_snapshot(&user_id, &notes)
            .await
            .map(Option::unwrap_or_default)
            .map_err(CliError::from),
        Some(SyncEvent::RemoteError { message, .. }) => Err(CliError::Remote(message)),
        _ => Err(CliError::Remote(
            "subscription ended before the first snapshot".to_string(),
        )),
    };
    coordinator.shutdown();

    let report = result?;
    println!(
        "Sync completed: {} new, {} updated, {} unchanged",
        report.adopted, report.replaced, report.kept_local
    );
    Ok(report)
}
