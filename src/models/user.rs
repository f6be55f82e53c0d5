//! User model for storage and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user (or organization) as observed on GitHub.
///
/// Discovery pages (`GET /users?since=`) carry no star count; only a
/// detail fetch fills `star_count`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteUser {
    /// GitHub user ID (stable, globally ordered)
    pub id: u64,
    /// Login name
    pub login: String,
    /// "User" or "Organization"
    pub user_type: String,
    /// Avatar URL
    pub avatar_url: Option<String>,
    /// Stars across owned repositories, when known
    pub star_count: Option<u64>,
    /// Last profile change on GitHub, when known
    pub updated_at: Option<DateTime<Utc>>,
}

impl RemoteUser {
    /// Minimal user as returned by a discovery page.
    pub fn discovered(id: u64, login: impl Into<String>) -> Self {
        Self {
            id,
            login: login.into(),
            user_type: "User".to_string(),
            avatar_url: None,
            star_count: None,
            updated_at: None,
        }
    }
}

/// User row stored in Firestore (`users/{id}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// GitHub user ID (also used as document ID)
    pub id: u64,
    pub login: String,
    pub user_type: String,
    pub avatar_url: Option<String>,
    /// Stars across owned repositories (ranking key)
    pub stargazers_count: u64,
    /// Last profile change on GitHub
    #[serde(default, with = "firestore::serialize_as_optional_timestamp")]
    pub remote_updated_at: Option<DateTime<Utc>>,
    /// Last local refresh; the Unix epoch until the first detail fetch
    #[serde(with = "firestore::serialize_as_timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    /// New row for a freshly discovered user. Stamped with the epoch so the
    /// first scan that sees it treats it as stale.
    pub fn discovered(user: &RemoteUser) -> Self {
        Self {
            id: user.id,
            login: user.login.clone(),
            user_type: user.user_type.clone(),
            avatar_url: user.avatar_url.clone(),
            stargazers_count: user.star_count.unwrap_or(0),
            remote_updated_at: user.updated_at,
            updated_at: DateTime::UNIX_EPOCH,
        }
    }

    /// Overwrite remote fields from a discovery page, keeping the local
    /// refresh time and any star count the page does not carry.
    pub fn merge_discovered(&mut self, user: &RemoteUser) {
        self.login = user.login.clone();
        self.user_type = user.user_type.clone();
        self.avatar_url = user.avatar_url.clone();
        if let Some(stars) = user.star_count {
            self.stargazers_count = stars;
        }
        if user.updated_at.is_some() {
            self.remote_updated_at = user.updated_at;
        }
    }

    /// Row written after a detail fetch at `now`.
    pub fn refreshed(user: &RemoteUser, previous: Option<&UserRecord>, now: DateTime<Utc>) -> Self {
        let stargazers_count = user
            .star_count
            .or(previous.map(|p| p.stargazers_count))
            .unwrap_or(0);
        Self {
            id: user.id,
            login: user.login.clone(),
            user_type: user.user_type.clone(),
            avatar_url: user.avatar_url.clone(),
            stargazers_count,
            remote_updated_at: user
                .updated_at
                .or(previous.and_then(|p| p.remote_updated_at)),
            updated_at: now,
        }
    }
}

impl From<&UserRecord> for RemoteUser {
    fn from(record: &UserRecord) -> Self {
        Self {
            id: record.id,
            login: record.login.clone(),
            user_type: record.user_type.clone(),
            avatar_url: record.avatar_url.clone(),
            star_count: Some(record.stargazers_count),
            updated_at: record.remote_updated_at,
        }
    }
}
