//! Persistent CLI profile configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use jotter_core::config::SyncSettings;
use serde::{Deserialize, Serialize};

const CONFIG_FILE_NAME: &str = "cli-config.json";
pub const DEFAULT_PROFILE: &str = "default";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliProfilesConfig {
    #[serde(default = "default_config_version")]
    pub version: u32,
    #[serde(default)]
    pub active_profile: Option<String>,
    #[serde(default)]
    pub profiles: BTreeMap<String, CliProfile>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliProfile {
    /// Realtime database origin; the notes tree lives at `{remote_url}/notes`
    #[serde(default)]
    pub remote_url: Option<String>,
    #[serde(default)]
    pub auth_api_key: Option<String>,
    /// Identity host override, for emulators
    #[serde(default)]
    pub auth_identity_url: Option<String>,
    /// Token host override, for emulators
    #[serde(default)]
    pub auth_token_url: Option<String>,
    #[serde(default)]
    pub settings: SyncSettings,
}

const fn default_config_version() -> u32 {
    1
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("jotter")
        .join(CONFIG_FILE_NAME)
}

pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    jotter_core::util::normalize_text_option(value)
}

pub fn normalize_profile_name(value: Option<&str>) -> Option<String> {
    normalize_text_option(value.map(str::to_string))
}

impl CliProfilesConfig {
    pub fn load() -> Result<Self, String> {
        Self::load_from_path(&default_config_path())
    }

    pub fn load_from_path(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|error| format!("Failed to read config at {}: {}", path.display(), error))?;
        let mut config = serde_json::from_str::<Self>(&raw)
            .map_err(|error| format!("Failed to parse config at {}: {}", path.display(), error))?;
        config.normalize();
        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    error
                )
            })?;
        }

        let mut normalized = self.clone();
        normalized.normalize();
        let serialized = serde_json::to_string_pretty(&normalized)
            .map_err(|error| format!("Failed to serialize config: {error}"))?;
        std::fs::write(path, serialized)
            .map_err(|error| format!("Failed to write config at {}: {}", path.display(), error))
    }

    /// Explicit flag, then `JOTTER_PROFILE`, then the active profile
    pub fn resolve_profile_name(&self, explicit: Option<&str>) -> String {
        let from_env = std::env::var("JOTTER_PROFILE").ok();
        normalize_profile_name(explicit)
            .or_else(|| normalize_profile_name(from_env.as_deref()))
            .or_else(|| normalize_profile_name(self.active_profile.as_deref()))
            .unwrap_or_else(|| DEFAULT_PROFILE.to_string())
    }

    pub fn profile(&self, name: &str) -> Option<&CliProfile> {
        self.profiles.get(name)
    }

    pub fn profile_mut_or_default(&mut self, name: &str) -> &mut CliProfile {
        self.profiles.entry(name.to_string()).or_default()
    }

    fn normalize(&mut self) {
        self.active_profile = normalize_profile_name(self.active_profile.as_deref());
        for profile in self.profiles.values_mut() {
            profile.normalize();
        }
    }
}

impl CliProfile {
    pub fn remote_url(&self) -> Option<String> {
        normalize_text_option(self.remote_url.clone())
            .map(|url| url.trim_end_matches('/').to_string())
    }

    pub fn auth_api_key(&self) -> Option<String> {
        normalize_text_option(self.auth_api_key.clone())
    }

    /// Identity and token hosts, when both are overridden
    pub fn auth_endpoints(&self) -> Option<(String, String)> {
        let identity = normalize_text_option(self.auth_identity_url.clone())?;
        let token = normalize_text_option(self.auth_token_url.clone())?;
        Some((identity, token))
    }

    /// Validated sync settings for this profile
    pub fn sync_settings(&self) -> jotter_core::Result<SyncSettings> {
        self.settings.clone().validate()
    }

    fn normalize(&mut self) {
        self.remote_url = self.remote_url();
        self.auth_api_key = self.auth_api_key();
        self.auth_identity_url = normalize_text_option(self.auth_identity_url.clone());
        self.auth_token_url = normalize_text_option(self.auth_token_url.clone());
    }
}
