use std::env;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::Utc;
use jotter_core::clock::SystemClock;
use jotter_core::config::SyncSettings;
use jotter_core::db::LibSqlNoteStore;
use jotter_core::remote::HttpMirror;
use jotter_core::services::NoteService;
use jotter_core::share::AuthoredNote;
use jotter_core::state::Session;
use jotter_core::sync::SyncCoordinator;
use jotter_core::{Note, NoteId, UserId};
use serde::Serialize;

use crate::auth::{restore_session, stored_user_id, AuthSession};
use crate::config_profiles::{CliProfile, CliProfilesConfig};
use crate::error::CliError;

pub type Notes = NoteService<LibSqlNoteStore>;
pub type Coordinator = SyncCoordinator<LibSqlNoteStore, HttpMirror>;

/// Everything a command needs to know about where it runs
#[derive(Debug, Clone)]
pub struct CliContext {
    pub db_path: PathBuf,
    pub profile_name: String,
    pub profile: CliProfile,
    pub offline: bool,
}

/// A reachable mirror plus whoever is signed in
pub struct RemoteContext {
    pub mirror: HttpMirror,
    pub session: Option<AuthSession>,
    pub settings: SyncSettings,
}

impl RemoteContext {
    pub fn user_id(&self) -> Result<Option<UserId>, CliError> {
        Ok(self.session.as_ref().map(AuthSession::user_id).transpose()?)
    }
}

impl CliContext {
    pub fn load(
        db_path: Option<PathBuf>,
        profile: Option<&str>,
        offline: bool,
    ) -> Result<Self, CliError> {
        let config = CliProfilesConfig::load().map_err(CliError::Config)?;
        let profile_name = config.resolve_profile_name(profile);
        let profile = config.profile(&profile_name).cloned().unwrap_or_default();

        Ok(Self {
            db_path: resolve_db_path(db_path),
            profile_name,
            profile,
            offline,
        })
    }

    pub fn settings(&self) -> Result<SyncSettings, CliError> {
        Ok(self.profile.sync_settings()?)
    }

    pub async fn open_notes(&self) -> Result<Notes, CliError> {
        if let Some(parent) = self.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let store = LibSqlNoteStore::open(&self.db_path).await?;
        let settings = self.settings()?;
        let notes = NoteService::new(store, Arc::new(SystemClock), settings.deletion_policy).await?;
        let owner = stored_user_id(&self.profile_name).unwrap_or_else(|error| {
            tracing::warn!("Could not read the stored session, showing signed-out notes: {error}");
            None
        });
        notes.switch_owner(owner).await?;
        Ok(notes)
    }

    pub fn remote_url(&self) -> Result<String, CliError> {
        self.profile.remote_url().ok_or(CliError::SyncNotConfigured)
    }

    /// The profile's session, refreshed when it can be
    pub async fn session(&self) -> Result<Option<AuthSession>, CliError> {
        Ok(restore_session(&self.profile_name, &self.profile).await?)
    }

    /// Mirror for this profile, authenticated when a session is stored
    pub async fn connect(&self) -> Result<RemoteContext, CliError> {
        if self.offline {
            return Err(CliError::Offline);
        }
        self.remote_url()?;
        let session = self.session().await?;
        self.connect_as(session)
    }

    /// Mirror for this profile, authenticated as `session`
    pub fn connect_as(&self, session: Option<AuthSession>) -> Result<RemoteContext, CliError> {
        if self.offline {
            return Err(CliError::Offline);
        }
        let remote_url = self.remote_url()?;
        let settings = self.settings()?;

        let mirror = HttpMirror::new(&remote_url)?
            .with_auth_token(session.as_ref().map(|s| s.id_token.clone()))
            .with_poll_interval(settings.poll_interval());

        Ok(RemoteContext {
            mirror,
            session,
            settings,
        })
    }

    /// Like [`Self::connect`], but `None` when the profile cannot reach a mirror
    pub async fn try_connect(&self) -> Result<Option<RemoteContext>, CliError> {
        match self.connect().await {
            Ok(remote) => Ok(Some(remote)),
            Err(CliError::Offline | CliError::SyncNotConfigured) => Ok(None),
            Err(error) => Err(error),
        }
    }
}

/// Coordinator already switched to the remote context's session
pub async fn start_coordinator(
    notes: Notes,
    remote: RemoteContext,
) -> Result<Coordinator, CliError> {
    let user_id = remote.user_id()?;
    let mut coordinator = SyncCoordinator::new(
        notes,
        Arc::new(remote.mirror),
        remote.settings.share_base_url,
    );
    coordinator.set_session(Session::new(user_id, true)).await;
    Ok(coordinator)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteListItem {
    pub id: String,
    pub title: String,
    pub preview: String,
    pub content: String,
    pub last_updated: i64,
    pub relative_time: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExploreItem {
    pub author_id: String,
    pub link: String,
    #[serde(flatten)]
    pub note: NoteListItem,
}

/// Resolve a full id or a unique prefix among live notes
pub async fn resolve_note(query: &str, notes: &Notes) -> Result<Note, CliError> {
    let query = normalize_note_identifier(query)?;

    if let Ok(note_id) = query.parse::<NoteId>() {
        if let Some(note) = notes.get(&note_id).await? {
            return Ok(note);
        }
    }

    let prefix = query.to_ascii_lowercase();
    let mut matching: Vec<Note> = notes
        .list()
        .await?
        .into_iter()
        .filter(|note| note.id.to_string().starts_with(&prefix))
        .collect();

    match matching.len() {
        0 => Err(CliError::NoteNotFound(query)),
        1 => Ok(matching.remove(0)),
        _ => {
            matching.sort_by_key(|note| note.id);
            let options = matching
                .iter()
                .take(3)
                .map(|note| short_id(&note.id))
                .collect::<Vec<_>>()
                .join(", ");

            Err(CliError::AmbiguousNoteId(format!(
                "ID prefix '{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

pub fn short_id(id: &NoteId) -> String {
    id.to_string().chars().take(13).collect()
}

pub fn format_note_lines(notes: &[Note]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    notes
        .iter()
        .map(|note| {
            let title = truncate(&note.title, 24);
            let preview = note.preview(40);
            let relative_time = format_relative_time(note.last_updated, now_ms);
            format!(
                "{:<13}  {title:<24}  {preview:<40}  {relative_time:<10}  {}",
                short_id(&note.id),
                note.status
            )
        })
        .collect()
}

pub fn format_explore_lines(notes: &[AuthoredNote]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    notes
        .iter()
        .map(|authored| {
            let note = &authored.note;
            format!(
                "{:<13}  {:<16}  {:<24}  {}",
                short_id(&note.id),
                truncate(authored.author_id.as_str(), 16),
                truncate(&note.title, 24),
                format_relative_time(note.last_updated, now_ms)
            )
        })
        .collect()
}

pub fn note_to_list_item(note: &Note) -> NoteListItem {
    let now_ms = Utc::now().timestamp_millis();
    NoteListItem {
        id: note.id.to_string(),
        title: note.title.clone(),
        preview: note.preview(80),
        content: note.content.clone(),
        last_updated: note.last_updated,
        relative_time: format_relative_time(note.last_updated, now_ms),
        status: note.status.to_string(),
    }
}

pub fn explore_to_item(authored: &AuthoredNote, share_base_url: &str) -> ExploreItem {
    ExploreItem {
        author_id: authored.author_id.to_string(),
        link: authored.link().to_url(share_base_url),
        note: note_to_list_item(&authored.note),
    }
}

pub fn truncate(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        value.to_string()
    } else {
        let mut truncated = value
            .chars()
            .take(max_chars.saturating_sub(3))
            .collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

pub fn resolve_note_content(content_parts: &[String]) -> Result<String, CliError> {
    if let Some(content) = normalize_content(&content_parts.join(" ")) {
        return Ok(content);
    }

    if let Some(content) = read_piped_stdin()? {
        return Ok(content);
    }

    if let Some(content) = capture_editor_input("")? {
        return Ok(content);
    }

    Err(CliError::EmptyContent)
}

pub fn normalize_content(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn normalize_note_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyNoteId)
    } else {
        Ok(trimmed.to_string())
    }
}

/// Editor buffer: title on the first line, a blank line, then the content
pub fn render_editor_buffer(title: &str, content: &str) -> String {
    format!("{title}\n\n{content}\n")
}

/// Inverse of [`render_editor_buffer`]; `None` when the buffer is blank
pub fn parse_editor_buffer(buffer: &str) -> Option<(String, String)> {
    let buffer = buffer.trim_start();
    let (title, rest) = buffer.split_once('\n').unwrap_or((buffer, ""));
    let title = title.trim();
    if title.is_empty() {
        return None;
    }
    Some((title.to_string(), rest.trim().to_string()))
}

pub fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    Ok(normalize_content(&buffer))
}

pub fn capture_editor_input(initial_content: &str) -> Result<Option<String>, CliError> {
    let editor = preferred_editor();
    let temp_file = create_temp_note_file_path();
    std::fs::write(&temp_file, initial_content)?;

    let launch_result = launch_editor(&editor, &temp_file);
    let note_content = std::fs::read_to_string(&temp_file)?;
    let _ = std::fs::remove_file(&temp_file);

    launch_result?;
    Ok(normalize_content(&note_content))
}

pub fn launch_editor(editor: &str, file_path: &Path) -> Result<(), CliError> {
    let status = match Command::new(editor).arg(file_path).status() {
        Ok(status) => status,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            // EDITOR may carry arguments, e.g. "code --wait"
            let mut parts = editor.split_whitespace();
            let Some(program) = parts.next() else {
                return Err(CliError::EditorFailed("empty EDITOR command".into()));
            };
            Command::new(program).args(parts).arg(file_path).status()?
        }
        Err(err) => return Err(CliError::Io(err)),
    };

    if status.success() {
        Ok(())
    } else {
        Err(CliError::EditorFailed(format!(
            "`{editor}` exited with status {status}"
        )))
    }
}

pub fn preferred_editor() -> String {
    env::var("VISUAL")
        .or_else(|_| env::var("EDITOR"))
        .unwrap_or_else(|_| default_editor().to_string())
}

pub const fn default_editor() -> &'static str {
    if cfg!(windows) {
        "notepad"
    } else {
        "vi"
    }
}

pub fn create_temp_note_file_path() -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());
    env::temp_dir().join(format!("jotter-note-{}-{now}.md", std::process::id()))
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("JOTTER_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("jotter")
        .join("jotter.db")
}
