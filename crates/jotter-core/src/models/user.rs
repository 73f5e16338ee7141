//! Owning-user identifier

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Identifier issued by the identity provider; partitions remote collections
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    /// Create a user ID, rejecting blank input
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput("user id must not be empty".into()));
        }
        if trimmed.contains('/') {
            return Err(Error::InvalidInput(format!(
                "user id must not contain '/': {trimmed}"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for UserId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<UserId> for String {
    fn from(value: UserId) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_blank_and_path_like_ids() {
        assert!(UserId::new("   ").is_err());
        assert!(UserId::new("a/b").is_err());
        assert_eq!(UserId::new(" uid-1 ").unwrap().as_str(), "uid-1");
    }

    #[test]
    fn serde_roundtrip_validates() {
        let id: UserId = serde_json::from_str("\"uid-9\"").unwrap();
        assert_eq!(id.as_str(), "uid-9");
        assert!(serde_json::from_str::<UserId>("\"\"").is_err());
    }
}
