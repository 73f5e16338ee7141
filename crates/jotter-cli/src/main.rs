//! Jotter CLI - local-first notes from the terminal
//!
//! Notes are written to the local store first; `share`, `sync` and `watch`
//! talk to the profile's remote mirror.

mod auth;
mod cli;
mod commands;
mod config_profiles;
mod error;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::add::run_add;
use crate::commands::auth_cmd::run_auth;
use crate::commands::common::CliContext;
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::delete::run_delete;
use crate::commands::edit::run_edit;
use crate::commands::explore::run_explore;
use crate::commands::list::run_list;
use crate::commands::share::run_share;
use crate::commands::shared::run_shared;
use crate::commands::show::run_show;
use crate::commands::sync::run_sync;
use crate::commands::watch::run_watch;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    init_tracing()?;

    let cli = Cli::parse();
    let context = || CliContext::load(cli.db_path.clone(), cli.profile.as_deref(), cli.offline);

    match cli.command {
        Commands::Add {
            ref title,
            ref content,
        } => {
            run_add(title, content, &context()?).await?;
        }
        Commands::List { ref query, json } => run_list(query.as_deref(), json, &context()?).await?,
        Commands::Show { ref id } => run_show(id, &context()?).await?,
        Commands::Edit {
            ref id,
            ref title,
            ref content,
        } => {
            run_edit(id, title.clone(), content.clone(), &context()?).await?;
        }
        Commands::Delete { ref id } => {
            run_delete(id, &context()?).await?;
        }
        Commands::Share { ref id } => {
            run_share(id, &context()?).await?;
        }
        Commands::Sync => {
            run_sync(&context()?).await?;
        }
        Commands::Watch => run_watch(&context()?).await?,
        Commands::Shared { ref link } => {
            run_shared(link, &context()?).await?;
        }
        Commands::Explore { json } => {
            run_explore(json, &context()?).await?;
        }
        Commands::Completions { shell, ref output } => run_completions(shell, output.as_deref())?,
        Commands::Config { command } => run_config(command, cli.profile.as_deref())?,
        Commands::Auth { command } => run_auth(command, &context()?).await?,
    }

    Ok(())
}

fn init_tracing() -> Result<(), CliError> {
    let mut filter = EnvFilter::from_default_env();
    for directive in ["jotter_core=info", "jotter_cli=info"] {
        filter = filter.add_directive(
            directive
                .parse()
                .map_err(|error| CliError::Config(format!("invalid log directive: {error}")))?,
        );
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}
