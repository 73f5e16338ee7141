use std::env;
use std::path::Path;

use jotter_core::config::{normalize_http_url, DeletionPolicy};
use serde_json::json;

use crate::cli::{ConfigCommands, DeletionPolicyArg};
use crate::config_profiles::{normalize_text_option, CliProfile, CliProfilesConfig};
use crate::error::CliError;

/// Values passed to `config init`; unset fields keep what the profile has
#[derive(Debug, Default)]
pub struct ProfileUpdate {
    pub remote_url: Option<String>,
    pub auth_api_key: Option<String>,
    pub share_base_url: Option<String>,
    pub poll_interval_ms: Option<u64>,
    pub deletion_policy: Option<DeletionPolicy>,
}

impl From<DeletionPolicyArg> for DeletionPolicy {
    fn from(value: DeletionPolicyArg) -> Self {
        match value {
            DeletionPolicyArg::Tombstone => Self::Tombstone,
            DeletionPolicyArg::LocalOnly => Self::LocalOnly,
        }
    }
}

pub fn run_config(command: ConfigCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    let config_path = crate::config_profiles::default_config_path();
    match command {
        ConfigCommands::Init {
            remote_url,
            auth_api_key,
            share_base_url,
            poll_interval_ms,
            deletion_policy,
            no_activate,
        } => {
            let update = ProfileUpdate {
                remote_url: remote_url
                    .or_else(|| normalize_text_option(env::var("JOTTER_REMOTE_URL").ok())),
                auth_api_key: auth_api_key
                    .or_else(|| normalize_text_option(env::var("JOTTER_AUTH_API_KEY").ok())),
                share_base_url,
                poll_interval_ms,
                deletion_policy: deletion_policy.map(DeletionPolicy::from),
            };
            let profile_name =
                run_config_init(&config_path, global_profile, update, !no_activate)?;
            print_readiness(&config_path, &profile_name)
        }
        ConfigCommands::Show => run_config_show(&config_path, global_profile),
    }
}

/// Merge `update` into the named profile and save; returns the profile name
pub fn run_config_init(
    config_path: &Path,
    profile_name: Option<&str>,
    update: ProfileUpdate,
    activate: bool,
) -> Result<String, CliError> {
    let mut config = CliProfilesConfig::load_from_path(config_path).map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);

    let profile = config.profile_mut_or_default(&profile_name);
    apply_update(profile, update)?;

    if activate {
        config.active_profile = Some(profile_name.clone());
    }

    config
        .save_to_path(config_path)
        .map_err(CliError::Config)?;
    println!(
        "Profile '{}' initialized at {}",
        profile_name,
        config_path.display()
    );
    Ok(profile_name)
}

fn apply_update(profile: &mut CliProfile, update: ProfileUpdate) -> Result<(), CliError> {
    if let Some(url) = normalize_text_option(update.remote_url) {
        profile.remote_url = Some(normalize_http_url(url, "remote_url")?);
    }
    if let Some(key) = normalize_text_option(update.auth_api_key) {
        profile.auth_api_key = Some(key);
    }
    if let Some(url) = normalize_text_option(update.share_base_url) {
        profile.settings.share_base_url = url;
    }
    if let Some(interval) = update.poll_interval_ms {
        profile.settings.poll_interval_ms = interval;
    }
    if let Some(policy) = update.deletion_policy {
        profile.settings.deletion_policy = policy;
    }

    profile.settings = profile.sync_settings()?;
    Ok(())
}

fn print_readiness(config_path: &Path, profile_name: &str) -> Result<(), CliError> {
    let config = CliProfilesConfig::load_from_path(config_path).map_err(CliError::Config)?;
    let profile = config
        .profile(profile_name)
        .ok_or_else(|| CliError::Config("Failed to persist profile".to_string()))?;

    let mut missing_fields = Vec::new();
    if profile.remote_url().is_none() {
        missing_fields.push("remote_url");
    }
    if profile.auth_api_key().is_none() {
        missing_fields.push("auth_api_key");
    }
    if missing_fields.is_empty() {
        println!(
            "Profile '{profile_name}' is ready. Run `jotter auth login --email <email> --password <password>`."
        );
    } else {
        println!(
            "Profile '{}' is missing: {}",
            profile_name,
            missing_fields.join(", ")
        );
    }
    Ok(())
}

pub fn run_config_show(config_path: &Path, profile_name: Option<&str>) -> Result<(), CliError> {
    let config = CliProfilesConfig::load_from_path(config_path).map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);
    let Some(profile) = config.profile(&profile_name) else {
        println!("Profile '{profile_name}' is not configured.");
        return Ok(());
    };

    println!("{}", serde_json::to_string_pretty(&describe_profile(&profile_name, profile))?);
    Ok(())
}

/// Profile as printed by `config show`, with the API key masked
pub fn describe_profile(profile_name: &str, profile: &CliProfile) -> serde_json::Value {
    json!({
        "profile": profile_name,
        "remoteUrl": profile.remote_url(),
        "authApiKey": profile.auth_api_key().map(|_| "[REDACTED]"),
        "settings": profile.settings,
    })
}
