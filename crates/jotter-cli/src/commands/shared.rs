use jotter_core::share::{resolve_shared, SharedLink};
use jotter_core::view::{CardMode, ViewContext};
use jotter_core::Note;

use crate::commands::common::CliContext;
use crate::commands::show::render_note;
use crate::error::CliError;

/// Open a note from a shared link; works signed out
pub async fn run_shared(link: &str, context: &CliContext) -> Result<Note, CliError> {
    let link = SharedLink::parse(link)?;
    let remote = context.connect().await?;

    let note = resolve_shared(&remote.mirror, &link).await?;
    let viewer = remote.user_id()?;
    let view = ViewContext::for_link(viewer.as_ref(), &link.owner_id);

    print!("{}", render_note(&note));
    println!("Shared by {}{}", link.owner_id, mode_label(view.card_mode()));
    Ok(note)
}

pub const fn mode_label(mode: CardMode) -> &'static str {
    match mode {
        CardMode::Editable => " (yours)",
        CardMode::ReadOnly => " (read-only)",
    }
}
