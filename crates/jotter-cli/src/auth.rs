//! CLI auth/session helpers with secure keychain persistence.

#[cfg(test)]
use std::collections::HashMap;
#[cfg(test)]
use std::sync::{Mutex, OnceLock, PoisonError};

#[cfg(not(test))]
use keyring::Entry;

use jotter_core::auth::{PasswordAuthClient, SessionPersistence};
pub use jotter_core::auth::AuthSession;
use jotter_core::{Error, Result, UserId};

use crate::config_profiles::CliProfile;

#[cfg(not(test))]
const KEYRING_SERVICE_NAME: &str = "jotter-cli";

/// One keychain entry per profile
#[derive(Clone)]
pub struct KeychainSessionStore {
    username: String,
}

impl KeychainSessionStore {
    pub fn new(profile_name: &str) -> Self {
        Self {
            username: format!("auth_session:{profile_name}"),
        }
    }

    #[cfg(test)]
    fn test_store() -> &'static Mutex<HashMap<String, String>> {
        static STORE: OnceLock<Mutex<HashMap<String, String>>> = OnceLock::new();
        STORE.get_or_init(|| Mutex::new(HashMap::new()))
    }

    #[cfg(not(test))]
    fn entry(&self) -> Result<Entry> {
        Entry::new(KEYRING_SERVICE_NAME, &self.username).map_err(keyring_error)
    }
}

#[cfg(not(test))]
#[allow(clippy::needless_pass_by_value)]
fn keyring_error(error: keyring::Error) -> Error {
    Error::Auth(format!("secure storage: {error}"))
}

impl SessionPersistence for KeychainSessionStore {
    #[cfg(not(test))]
    fn load_session(&self) -> Result<Option<AuthSession>> {
        match self.entry()?.get_password() {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(keyring_error(error)),
        }
    }

    #[cfg(test)]
    fn load_session(&self) -> Result<Option<AuthSession>> {
        let guard = Self::test_store()
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        guard
            .get(&self.username)
            .map(|raw| serde_json::from_str(raw))
            .transpose()
            .map_err(Error::from)
    }

    #[cfg(not(test))]
    fn save_session(&self, session: &AuthSession) -> Result<()> {
        let raw = serde_json::to_string(session)?;
        self.entry()?.set_password(&raw).map_err(keyring_error)
    }

    #[cfg(test)]
    fn save_session(&self, session: &AuthSession) -> Result<()> {
        let raw = serde_json::to_string(session)?;
        Self::test_store()
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(self.username.clone(), raw);
        Ok(())
    }

    #[cfg(not(test))]
    fn clear_session(&self) -> Result<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(keyring_error(error)),
        }
    }

    #[cfg(test)]
    fn clear_session(&self) -> Result<()> {
        Self::test_store()
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.username);
        Ok(())
    }
}

/// Auth client for a profile, when it carries an API key
pub fn auth_client_for_profile(
    profile_name: &str,
    profile: &CliProfile,
) -> Result<Option<PasswordAuthClient<KeychainSessionStore>>> {
    let Some(api_key) = profile.auth_api_key() else {
        return Ok(None);
    };

    let mut client = PasswordAuthClient::new(api_key, KeychainSessionStore::new(profile_name))?;
    if let Some((identity_url, token_url)) = profile.auth_endpoints() {
        client = client.with_endpoints(&identity_url, &token_url)?;
    }
    Ok(Some(client))
}

/// Load the profile's session, refreshing it when the profile can.
///
/// Without an API key an expired session cannot be refreshed and is dropped.
pub async fn restore_session(
    profile_name: &str,
    profile: &CliProfile,
) -> Result<Option<AuthSession>> {
    if let Some(client) = auth_client_for_profile(profile_name, profile)? {
        return client.restore_session().await;
    }

    let store = KeychainSessionStore::new(profile_name);
    match store.load_session()? {
        Some(session) if session.is_expired() => {
            store.clear_session()?;
            Ok(None)
        }
        session => Ok(session),
    }
}

/// Owner of the profile's stored session, expired or not
pub fn stored_user_id(profile_name: &str) -> Result<Option<UserId>> {
    KeychainSessionStore::new(profile_name)
        .load_session()?
        .map(|session| session.user_id())
        .transpose()
}

pub fn clear_stored_session(profile_name: &str) -> Result<()> {
    KeychainSessionStore::new(profile_name).clear_session()
}

#[cfg(test)]
mod tests {
    use jotter_core::auth::AuthUser;
    use jotter_core::clock::{Clock, SystemClock};

    use super::*;

    fn session(user: &str, expires_at: i64) -> AuthSession {
        AuthSession {
            id_token: format!("id-{user}"),
            refresh_token: format!("refresh-{user}"),
            expires_at,
            user: AuthUser {
                id: user.to_string(),
                email: Some(format!("{user}@example.com")),
            },
        }
    }

    #[tokio::test]
    async fn stored_session_is_restored_per_profile() {
        let store = KeychainSessionStore::new("auth-restore-alpha");
        store
            .save_session(&session("alice", SystemClock.now_secs() + 3_600))
            .unwrap();

        let restored = restore_session("auth-restore-alpha", &CliProfile::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(restored.user.id, "alice");

        let other = restore_session("auth-restore-beta", &CliProfile::default())
            .await
            .unwrap();
        assert!(other.is_none());
    }

    #[tokio::test]
    async fn expired_session_without_api_key_is_cleared() {
        let store = KeychainSessionStore::new("auth-expired");
        store
            .save_session(&session("bob", SystemClock.now_secs() - 10))
            .unwrap();

        let restored = restore_session("auth-expired", &CliProfile::default())
            .await
            .unwrap();
        assert!(restored.is_none());
        assert!(store.load_session().unwrap().is_none());
    }

    #[test]
    fn auth_client_requires_api_key() {
        assert!(auth_client_for_profile("auth-none", &CliProfile::default())
            .unwrap()
            .is_none());

        let profile = CliProfile {
            auth_api_key: Some("key".to_string()),
            ..CliProfile::default()
        };
        assert!(auth_client_for_profile("auth-some", &profile)
            .unwrap()
            .is_some());
    }

    #[test]
    fn clear_stored_session_is_idempotent() {
        let store = KeychainSessionStore::new("auth-clear");
        store
            .save_session(&session("carol", SystemClock.now_secs() + 3_600))
            .unwrap();

        clear_stored_session("auth-clear").unwrap();
        clear_stored_session("auth-clear").unwrap();
        assert!(store.load_session().unwrap().is_none());
    }
}
