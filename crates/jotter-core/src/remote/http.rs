//! Realtime-database REST adapter
//!
//! Notes live at `{base}/notes/{user_id}/{note_id}.json`. A `null` body means
//! nothing is stored at the address. Live subscriptions poll the user's subtree
//! and only emit when the snapshot changed.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use tokio::time::MissedTickBehavior;

use crate::error::{Error, Result};
use crate::models::{Note, NoteId, UserId};
use crate::util::{compact_text, is_http_url, normalize_text_option};

use super::{subscription_channel, RemoteListing, RemoteMirror, Subscription, SubscriptionFeed};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Clone)]
pub struct HttpMirror {
    base_url: String,
    auth_token: Option<String>,
    poll_interval: Duration,
    client: Client,
}

impl std::fmt::Debug for HttpMirror {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("HttpMirror")
            .field("base_url", &self.base_url)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

impl HttpMirror {
    /// Create an adapter for the database at `base_url`
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        let base_url = base_url.as_ref().trim().trim_end_matches('/');
        if base_url.is_empty() {
            return Err(Error::Config("remote URL must not be empty".to_string()));
        }
        if !is_http_url(base_url) {
            return Err(Error::Config(
                "remote URL must include http:// or https://".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.to_string(),
            auth_token: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            client,
        })
    }

    /// Attach an identity token sent as the `auth` query parameter
    #[must_use]
    pub fn with_auth_token(mut self, token: Option<String>) -> Self {
        self.auth_token = normalize_text_option(token);
        self
    }

    /// Interval between subscription polls
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(Duration::from_millis(10));
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, segments: &[&str]) -> String {
        let mut url = format!("{}/notes", self.base_url);
        for segment in segments {
            url.push('/');
            url.push_str(&urlencoding::encode(segment));
        }
        url.push_str(".json");
        if let Some(token) = &self.auth_token {
            url.push_str("?auth=");
            url.push_str(&urlencoding::encode(token));
        }
        url
    }

    async fn get_json(&self, url: &str) -> Result<Value> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(transport_error)?;
        let response = ensure_success(response).await?;
        response
            .json::<Value>()
            .await
            .map_err(|e| Error::RemoteUnavailable(format!("invalid remote payload: {e}")))
    }

    async fn poll_user(self, user_id: UserId, feed: SubscriptionFeed) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_delivered: Option<Vec<Note>> = None;

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                () = feed.closed() => break,
            }

            match self.read_user(&user_id).await {
                Ok(notes) => {
                    if last_delivered.as_ref() != Some(&notes) {
                        tracing::debug!(
                            "Remote snapshot for user {user_id} changed ({} notes)",
                            notes.len()
                        );
                        feed.deliver(notes.clone());
                        last_delivered = Some(notes);
                    }
                }
                Err(error) => {
                    tracing::warn!("Polling notes for user {user_id} failed: {error}");
                    feed.fail(match error {
                        Error::RemoteUnavailable(message) => message,
                        other => other.to_string(),
                    });
                    last_delivered = None;
                }
            }
        }

        tracing::debug!("Stopped polling notes for user {user_id}");
    }
}

impl RemoteMirror for HttpMirror {
    async fn write(&self, user_id: &UserId, note: &Note) -> Result<()> {
        let url = self.url(&[user_id.as_str(), &note.id.as_str()]);
        let response = self
            .client
            .put(url)
            .json(note)
            .send()
            .await
            .map_err(transport_error)?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn read_once(&self, user_id: &UserId, note_id: &NoteId) -> Result<Option<Note>> {
        let value = self
            .get_json(&self.url(&[user_id.as_str(), &note_id.as_str()]))
            .await?;
        if value.is_null() {
            return Ok(None);
        }
        serde_json::from_value(value)
            .map(Some)
            .map_err(|e| Error::RemoteUnavailable(format!("invalid note payload: {e}")))
    }

    async fn read_user(&self, user_id: &UserId) -> Result<Vec<Note>> {
        let value = self.get_json(&self.url(&[user_id.as_str()])).await?;
        Ok(decode_collection(value))
    }

    async fn read_everything(&self) -> Result<RemoteListing> {
        let value = self.get_json(&self.url(&[])).await?;
        let Value::Object(users) = value else {
            return Ok(BTreeMap::new());
        };

        let mut listing = RemoteListing::new();
        for (key, collection) in users {
            let Ok(user_id) = UserId::new(key.as_str()) else {
                tracing::warn!("Skipping remote collection with invalid user id {key:?}");
                continue;
            };
            let notes: BTreeMap<NoteId, Note> = decode_collection(collection)
                .into_iter()
                .map(|note| (note.id, note))
                .collect();
            if !notes.is_empty() {
                listing.insert(user_id, notes);
            }
        }
        Ok(listing)
    }

    fn subscribe(&self, user_id: &UserId) -> Subscription {
        let (feed, subscription) = subscription_channel(user_id.clone());
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            feed.fail("subscriptions require a running tokio runtime");
            return subscription;
        };

        let poller = runtime.spawn(self.clone().poll_user(user_id.clone(), feed));
        subscription.on_cancel(move || poller.abort())
    }
}

/// Decode a user subtree, skipping records that are not valid notes.
///
/// The result is sorted by id so unchanged subtrees compare equal between polls.
fn decode_collection(value: Value) -> Vec<Note> {
    let entries: Vec<Value> = match value {
        Value::Object(map) => map.into_iter().map(|(_, record)| record).collect(),
        Value::Array(records) => records,
        _ => Vec::new(),
    };

    let mut notes: Vec<Note> = entries
        .into_iter()
        .filter(|record| !record.is_null())
        .filter_map(|record| match serde_json::from_value::<Note>(record) {
            Ok(note) => Some(note),
            Err(error) => {
                tracing::warn!("Skipping malformed remote note: {error}");
                None
            }
        })
        .collect();
    notes.sort_by_key(|note| note.id);
    notes
}

#[allow(clippy::needless_pass_by_value)]
fn transport_error(error: reqwest::Error) -> Error {
    Error::RemoteUnavailable(format!("request failed: {error}"))
}

async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(Error::RemoteUnavailable(describe_failure(status, &body)))
}

fn describe_failure(status: StatusCode, body: &str) -> String {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|payload| {
            payload
                .get("error")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| compact_text(body));

    if message.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", message.trim(), status.as_u16())
    }
}
