use std::sync::Arc;

use jotter_core::auth::{IdentityProvider, SessionIdentity};
use jotter_core::sync::{forward_connectivity, forward_identity, SyncCoordinator};
use jotter_core::Note;
use tokio::sync::watch;

use crate::commands::common::{format_note_lines, CliContext};
use crate::error::CliError;

/// Run the coordinator in the background and print every surfaced update until Ctrl-C
pub async fn run_watch(context: &CliContext) -> Result<(), CliError> {
    let notes = context.open_notes().await?;
    let remote = context.connect().await?;
    if remote.session.is_none() {
        println!("Not signed in; only local changes will show up.");
    }

    let identity = SessionIdentity::with_session(remote.session.clone())?;
    let mut local = notes.watch();
    let coordinator = SyncCoordinator::new(
        notes,
        Arc::new(remote.mirror),
        remote.settings.share_base_url,
    );
    let (handle, task) = coordinator.spawn(remote.settings.event_queue_capacity);
    let mut state = handle.watch_state();

    let (online, connectivity) = watch::channel(true);
    let forwarders = [
        forward_identity(handle.clone(), identity.changes()),
        forward_connectivity(handle.clone(), connectivity),
    ];

    println!("{}", render_update(&local.borrow_and_update()));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = &mut shutdown => {
                result?;
                break;
            }
            changed = local.changed() => {
                if changed.is_err() {
                    break;
                }
                let notes = local.borrow_and_update().clone();
                println!("{}", render_update(&notes));
            }
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                println!("[{}]", *state.borrow_and_update());
            }
        }
    }

    for forwarder in forwarders {
        forwarder.abort();
    }
    drop(online);
    if handle.shutdown().await.is_err() {
        tracing::debug!("Sync coordinator already stopped");
    }
    if let Err(error) = task.await {
        tracing::warn!("Sync coordinator task failed: {error}");
    }
    Ok(())
}

pub fn render_update(notes: &[Note]) -> String {
    let mut lines = vec![format!("{} notes", notes.len())];
    lines.extend(format_note_lines(notes));
    lines.join("\n")
}
