//! Sync and sharing settings shared by every client.
//!
//! Settings are plain serde data so clients can embed them in their own
//! configuration files. Every loader goes through [`SyncSettings::validate`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::{is_http_url, normalize_text_option};

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 3_000;
pub const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 64;
pub const DEFAULT_SHARE_BASE_URL: &str = "https://jotter.app";

const MIN_POLL_INTERVAL_MS: u64 = 100;

/// What deleting a note leaves behind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionPolicy {
    /// Keep a stamped tombstone so stale remote copies cannot revive the note
    #[default]
    Tombstone,
    /// Remove the record outright; a shared note comes back on the next pull
    LocalOnly,
}

impl DeletionPolicy {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tombstone => "tombstone",
            Self::LocalOnly => "local_only",
        }
    }
}

impl std::fmt::Display for DeletionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct SyncSettings {
    /// How often an HTTP subscription polls the mirror
    pub poll_interval_ms: u64,
    /// Bound of the coordinator's event queue
    pub event_queue_capacity: usize,
    pub deletion_policy: DeletionPolicy,
    /// Origin used when rendering shared links
    pub share_base_url: String,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            event_queue_capacity: DEFAULT_EVENT_QUEUE_CAPACITY,
            deletion_policy: DeletionPolicy::default(),
            share_base_url: DEFAULT_SHARE_BASE_URL.to_string(),
        }
    }
}

impl SyncSettings {
    /// Check bounds and normalize URLs
    pub fn validate(mut self) -> Result<Self> {
        if self.poll_interval_ms < MIN_POLL_INTERVAL_MS {
            return Err(Error::Config(format!(
                "poll_interval_ms must be at least {MIN_POLL_INTERVAL_MS}"
            )));
        }
        if self.event_queue_capacity == 0 {
            return Err(Error::Config(
                "event_queue_capacity must be greater than zero".to_string(),
            ));
        }
        self.share_base_url = normalize_http_url(self.share_base_url, "share_base_url")?;
        Ok(self)
    }

    /// Parse and validate settings from JSON; missing fields take defaults
    pub fn from_json(payload: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(payload)
            .map_err(|error| Error::Config(format!("invalid sync settings: {error}")))?;
        settings.validate()
    }

    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Trim a required URL, insist on an http(s) scheme and drop trailing slashes
pub fn normalize_http_url(raw: String, field: &str) -> Result<String> {
    let value = normalize_text_option(Some(raw))
        .ok_or_else(|| Error::Config(format!("'{field}' is required")))?;
    if is_http_url(&value) {
        Ok(value.trim_end_matches('/').to_string())
    } else {
        Err(Error::Config(format!(
            "'{field}' must include http:// or https://"
        )))
    }
}
