use jotter_core::share::{explore, AuthoredNote};

use crate::commands::common::{explore_to_item, format_explore_lines, CliContext, ExploreItem};
use crate::error::CliError;

pub async fn run_explore(as_json: bool, context: &CliContext) -> Result<Vec<AuthoredNote>, CliError> {
    let remote = context.connect().await?;
    let notes = explore(&remote.mirror).await?;

    if as_json {
        let json_items = notes
            .iter()
            .map(|authored| explore_to_item(authored, &remote.settings.share_base_url))
            .collect::<Vec<ExploreItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else if notes.is_empty() {
        println!("Nobody has shared anything yet.");
    } else {
        for line in format_explore_lines(&notes) {
            println!("{line}");
        }
    }

    Ok(notes)
}
