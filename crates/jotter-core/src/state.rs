//! Session context and the sync state derived from it.

use std::fmt;

use crate::models::UserId;

/// Who is signed in and whether the network is reachable
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub user_id: Option<UserId>,
    pub online: bool,
}

impl Session {
    #[must_use]
    pub const fn new(user_id: Option<UserId>, online: bool) -> Self {
        Self { user_id, online }
    }

    /// The sync state this context implies
    #[must_use]
    pub fn state(&self) -> SyncState {
        match (&self.user_id, self.online) {
            (_, false) => SyncState::Offline,
            (None, true) => SyncState::OnlineUnauthenticated,
            (Some(user_id), true) => SyncState::Subscribed {
                user_id: user_id.clone(),
            },
        }
    }
}

/// Sync coordinator state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SyncState {
    #[default]
    Offline,
    OnlineUnauthenticated,
    /// Exactly one live subscription exists, for this user
    Subscribed { user_id: UserId },
}

impl SyncState {
    #[must_use]
    pub const fn subscribed_user(&self) -> Option<&UserId> {
        match self {
            Self::Subscribed { user_id } => Some(user_id),
            _ => None,
        }
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Offline => f.write_str("offline"),
            Self::OnlineUnauthenticated => f.write_str("online (signed out)"),
            Self::Subscribed { user_id } => write!(f, "syncing as {user_id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_follows_session() {
        let alice = UserId::new("alice").unwrap();

        assert_eq!(Session::new(None, false).state(), SyncState::Offline);
        assert_eq!(
            Session::new(Some(alice.clone()), false).state(),
            SyncState::Offline
        );
        assert_eq!(
            Session::new(None, true).state(),
            SyncState::OnlineUnauthenticated
        );
        assert_eq!(
            Session::new(Some(alice.clone()), true).state(),
            SyncState::Subscribed { user_id: alice }
        );
    }

    #[test]
    fn display_names_the_user() {
        let state = SyncState::Subscribed {
            user_id: UserId::new("bob").unwrap(),
        };
        assert_eq!(state.to_string(), "syncing as bob");
        assert_eq!(state.subscribed_user().map(UserId::as_str), Some("bob"));
    }
}
