//! Identity: the signed-in session context and an email/password client for the
//! identity-toolkit REST API.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::watch;

use crate::clock::{Clock, SystemClock};
use crate::error::{Error, Result};
use crate::models::UserId;
use crate::util::{compact_text, is_http_url, normalize_text_option};

const EXPIRY_SKEW_SECONDS: i64 = 60;
const DEFAULT_IDENTITY_URL: &str = "https://identitytoolkit.googleapis.com";
const DEFAULT_TOKEN_URL: &str = "https://securetoken.googleapis.com";

/// Source of the current user and of auth-state changes
pub trait IdentityProvider: Send + Sync {
    fn current_user_id(&self) -> Option<UserId>;

    /// Receiver that always holds the current user
    fn changes(&self) -> watch::Receiver<Option<UserId>>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub email: Option<String>,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub id_token: String,
    pub refresh_token: String,
    /// Unix seconds
    pub expires_at: i64,
    pub user: AuthUser,
}

impl AuthSession {
    /// Expired by the wall clock
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(&SystemClock)
    }

    /// Expired, or about to, by `clock`
    #[must_use]
    pub fn is_expired_at(&self, clock: &dyn Clock) -> bool {
        self.expires_at <= clock.now_secs().saturating_add(EXPIRY_SKEW_SECONDS)
    }

    pub fn user_id(&self) -> Result<UserId> {
        UserId::new(self.user.id.as_str())
    }
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AuthSession")
            .field("id_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

/// In-process identity holding at most one session
#[derive(Debug)]
pub struct SessionIdentity {
    session: Mutex<Option<AuthSession>>,
    changes: watch::Sender<Option<UserId>>,
}

impl Default for SessionIdentity {
    fn default() -> Self {
        Self {
            session: Mutex::new(None),
            changes: watch::channel(None).0,
        }
    }
}

impl SessionIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a restored session, if any
    pub fn with_session(session: Option<AuthSession>) -> Result<Self> {
        let identity = Self::new();
        if let Some(session) = session {
            identity.login(session)?;
        }
        Ok(identity)
    }

    /// Make `session` current and announce its user
    pub fn login(&self, session: AuthSession) -> Result<UserId> {
        let user_id = session.user_id()?;
        *self.session.lock().unwrap_or_else(PoisonError::into_inner) = Some(session);
        self.changes.send_replace(Some(user_id.clone()));
        tracing::info!("Signed in as {user_id}");
        Ok(user_id)
    }

    pub fn logout(&self) {
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if self.changes.send_replace(None).is_some() {
            tracing::info!("Signed out");
        }
    }

    pub fn session(&self) -> Option<AuthSession> {
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl IdentityProvider for SessionIdentity {
    fn current_user_id(&self) -> Option<UserId> {
        self.changes.borrow().clone()
    }

    fn changes(&self) -> watch::Receiver<Option<UserId>> {
        self.changes.subscribe()
    }
}

/// Where a client keeps its session between runs
pub trait SessionPersistence: Clone + Send + Sync + 'static {
    fn load_session(&self) -> Result<Option<AuthSession>>;
    fn save_session(&self, session: &AuthSession) -> Result<()>;
    fn clear_session(&self) -> Result<()>;
}

/// Session persistence that forgets everything on exit
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    session: Arc<Mutex<Option<AuthSession>>>,
}

impl SessionPersistence for MemorySessionStore {
    fn load_session(&self) -> Result<Option<AuthSession>> {
        Ok(self
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save_session(&self, session: &AuthSession) -> Result<()> {
        *self.session.lock().unwrap_or_else(PoisonError::into_inner) = Some(session.clone());
        Ok(())
    }

    fn clear_session(&self) -> Result<()> {
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        Ok(())
    }
}

/// Email/password sign-in and token refresh
#[derive(Clone)]
pub struct PasswordAuthClient<S: SessionPersistence> {
    api_key: String,
    identity_url: String,
    token_url: String,
    client: Client,
    clock: Arc<dyn Clock>,
    store: S,
}

impl<S: SessionPersistence> PasswordAuthClient<S> {
    pub fn new(api_key: impl Into<String>, store: S) -> Result<Self> {
        let api_key = api_key.into().trim().to_string();
        if api_key.is_empty() {
            return Err(Error::Config("auth API key must not be empty".to_string()));
        }

        Ok(Self {
            api_key,
            identity_url: DEFAULT_IDENTITY_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            client: Client::builder()
                .build()
                .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?,
            clock: Arc::new(SystemClock),
            store,
        })
    }

    /// Judge and stamp token expiry with `clock` instead of the wall clock
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Point the client at other identity and token hosts
    pub fn with_endpoints(mut self, identity_url: &str, token_url: &str) -> Result<Self> {
        self.identity_url = normalize_endpoint(identity_url)?;
        self.token_url = normalize_endpoint(token_url)?;
        Ok(self)
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Load the persisted session, refreshing it when expired.
    ///
    /// A session that cannot be refreshed is cleared.
    pub async fn restore_session(&self) -> Result<Option<AuthSession>> {
        let Some(stored_session) = self.store.load_session()? else {
            return Ok(None);
        };

        if !stored_session.is_expired_at(self.clock.as_ref()) {
            return Ok(Some(stored_session));
        }

        match self.refresh_session(&stored_session.refresh_token).await {
            Ok(mut refreshed) => {
                if refreshed.user.email.is_none() {
                    refreshed.user.email = stored_session.user.email;
                    self.store.save_session(&refreshed)?;
                }
                Ok(Some(refreshed))
            }
            Err(error) => {
                tracing::warn!("Failed to refresh persisted session: {}", error);
                self.store.clear_session()?;
                Ok(None)
            }
        }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession> {
        validate_credentials(email, password)?;

        let payload = serde_json::json!({
            "email": email.trim(),
            "password": password,
            "returnSecureToken": true,
        });
        let request = self
            .client
            .post(self.keyed_url(&self.identity_url, "/v1/accounts:signInWithPassword"))
            .json(&payload);
        let response: SignInResponse = self.send_auth_request(request).await?;

        let session = AuthSession {
            expires_at: expires_at_from(response.expires_in.as_ref(), self.clock.now_secs())?,
            id_token: required(response.id_token, "idToken")?,
            refresh_token: required(response.refresh_token, "refreshToken")?,
            user: AuthUser {
                id: required(response.local_id, "localId")?,
                email: response.email.or_else(|| Some(email.trim().to_string())),
            },
        };

        self.store.save_session(&session)?;
        Ok(session)
    }

    pub async fn refresh_session(&self, refresh_token: &str) -> Result<AuthSession> {
        if refresh_token.trim().is_empty() {
            return Err(Error::Auth("refresh token must not be empty".to_string()));
        }

        let payload = serde_json::json!({
            "grant_type": "refresh_token",
            "refresh_token": refresh_token,
        });
        let request = self
            .client
            .post(self.keyed_url(&self.token_url, "/v1/token"))
            .json(&payload);
        let response: RefreshResponse = self.send_auth_request(request).await?;

        let session = AuthSession {
            expires_at: expires_at_from(response.expires_in.as_ref(), self.clock.now_secs())?,
            id_token: required(response.id_token, "id_token")?,
            refresh_token: required(response.refresh_token, "refresh_token")?,
            user: AuthUser {
                id: required(response.user_id, "user_id")?,
                email: None,
            },
        };

        self.store.save_session(&session)?;
        Ok(session)
    }

    /// Forget the persisted session. Tokens expire on their own server-side.
    pub fn sign_out(&self) -> Result<()> {
        self.store.clear_session()
    }

    fn keyed_url(&self, base: &str, path: &str) -> String {
        format!("{base}{path}?key={}", urlencoding::encode(&self.api_key))
    }

    async fn send_auth_request<T: serde::de::DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T> {
        let response = request
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| Error::Auth(format!("HTTP request failed: {e}")))?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Auth(parse_api_error(status, &body)));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| Error::Auth(format!("invalid auth response: {e}")))
    }
}

fn normalize_endpoint(url: &str) -> Result<String> {
    let trimmed = url.trim().trim_end_matches('/');
    if !is_http_url(trimmed) {
        return Err(Error::Config(format!(
            "auth endpoint must include http:// or https://: {trimmed}"
        )));
    }
    Ok(trimmed.to_string())
}

fn validate_credentials(email: &str, password: &str) -> Result<()> {
    if email.trim().is_empty() {
        return Err(Error::Auth("Email is required".to_string()));
    }
    if password.trim().is_empty() {
        return Err(Error::Auth("Password is required".to_string()));
    }
    Ok(())
}

fn required(value: Option<String>, field: &str) -> Result<String> {
    normalize_text_option(value)
        .ok_or_else(|| Error::Auth(format!("auth response did not include {field}")))
}

/// `expiresIn` arrives as a string of seconds, occasionally as a number
fn expires_at_from(expires_in: Option<&Value>, now_secs: i64) -> Result<i64> {
    let seconds = match expires_in {
        Some(Value::String(text)) => text.trim().parse::<i64>().ok(),
        Some(Value::Number(number)) => number.as_i64(),
        _ => None,
    }
    .ok_or_else(|| Error::Auth("auth response did not include expiresIn".to_string()))?;
    Ok(now_secs.saturating_add(seconds))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    local_id: Option<String>,
    email: Option<String>,
    id_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    id_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<Value>,
    user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ApiErrorBody {
    Detailed { message: Option<String> },
    Plain(String),
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(ApiErrorResponse { error: Some(error) }) = serde_json::from_str(body) {
        let message = match error {
            ApiErrorBody::Detailed { message } => message,
            ApiErrorBody::Plain(message) => Some(message),
        };
        if let Some(message) = normalize_text_option(message) {
            return format!("{message} ({})", status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{trimmed} ({})", status.as_u16())
    }
}
