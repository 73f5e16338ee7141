use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "jotter")]
#[command(about = "Local-first notes, mirrored to the cloud when you sign in")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// CLI profile name for remote and auth configuration
    #[arg(long, global = true, value_name = "NAME")]
    pub profile: Option<String>,

    /// Treat the device as offline: no remote reads or writes
    #[arg(long, global = true)]
    pub offline: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new note
    #[command(alias = "new")]
    Add {
        /// Note title
        title: String,
        /// Note content (read from stdin or $EDITOR when omitted)
        content: Vec<String>,
    },
    /// List notes, newest first
    #[command(alias = "ls")]
    List {
        /// Only notes whose title or content contains this text
        #[arg(short, long)]
        query: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print a single note
    Show {
        /// Note ID or unique ID prefix
        id: String,
    },
    /// Edit an existing note
    Edit {
        /// Note ID or unique ID prefix
        id: String,
        /// Replace the title
        #[arg(long)]
        title: Option<String>,
        /// Replace the content
        #[arg(long)]
        content: Option<String>,
    },
    /// Delete a note
    #[command(alias = "rm")]
    Delete {
        /// Note ID or unique ID prefix
        id: String,
    },
    /// Publish a note to your cloud collection and print its link
    Share {
        /// Note ID or unique ID prefix
        id: String,
    },
    /// Pull your cloud collection once and merge it into the local store
    Sync,
    /// Stay connected and print every update until Ctrl-C
    Watch,
    /// Open a note from a shared link
    Shared {
        /// Full link, `/shared/<owner>/<note>` path or `<owner>/<note>`
        link: String,
    },
    /// Browse every user's notes
    Explore {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Configure CLI profiles
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Sign a CLI profile in or out
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize or update profile config
    Init {
        /// Realtime database base URL holding the `notes` tree
        #[arg(long, value_name = "URL")]
        remote_url: Option<String>,
        /// Identity provider API key
        #[arg(long, value_name = "KEY")]
        auth_api_key: Option<String>,
        /// Origin used when printing shared links
        #[arg(long, value_name = "URL")]
        share_base_url: Option<String>,
        /// Remote poll interval in milliseconds
        #[arg(long, value_name = "MS")]
        poll_interval_ms: Option<u64>,
        /// Keep tombstones (`tombstone`) or hard-delete (`local-only`)
        #[arg(long, value_enum)]
        deletion_policy: Option<DeletionPolicyArg>,
        /// Keep current active profile instead of activating this one
        #[arg(long)]
        no_activate: bool,
    },
    /// Print the resolved profile
    Show,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum DeletionPolicyArg {
    Tombstone,
    LocalOnly,
}

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Sign in with email/password and store the session in the keychain
    Login {
        /// Account email
        #[arg(long, value_name = "EMAIL")]
        email: String,
        /// Account password
        #[arg(long, value_name = "PASSWORD")]
        password: String,
    },
    /// Show auth status for profile
    Status,
    /// Sign out and clear the stored session
    Logout,
}
