//! Database layer (Firestore, plus an in-memory store).
//!
//! Workers only see the [`CheckpointStore`], [`UserStore`] and
//! [`TokenStore`] traits so the same scan code runs against either backend.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryDb;

use crate::error::Result;
use crate::models::{CursorName, RemoteUser, StarScanCursor, UserRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    /// Scan cursors (keyed by cursor name)
    pub const LAST_UPDATES: &str = "last_updates";
    pub const ACCESS_TOKENS: &str = "access_tokens";
}

/// Durable cursor per named scan position.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Current value, 0 if never written.
    async fn get_cursor(&self, name: CursorName) -> Result<u64>;

    /// Overwrite one cursor.
    async fn update_cursor(&self, name: CursorName, value: u64) -> Result<()>;

    /// Set one cursor back to 0.
    async fn reset_cursor(&self, name: CursorName) -> Result<()> {
        self.update_cursor(name, 0).await
    }

    /// Read both star-scan cursors.
    async fn get_star_scan_cursor(&self) -> Result<StarScanCursor>;

    /// Write both star-scan cursors atomically.
    async fn update_star_scan_cursor(&self, cursor: StarScanCursor) -> Result<()>;

    /// Reset both star-scan cursors to 0 atomically.
    async fn reset_star_scan_cursor(&self) -> Result<()> {
        self.update_star_scan_cursor(StarScanCursor::default()).await
    }
}

/// Snapshot table of GitHub users.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert new users and overwrite the remote fields of known ones.
    async fn bulk_upsert(&self, users: &[RemoteUser]) -> Result<()>;

    /// Overwrite a user with a fresh detail fetch, stamping `refreshed_at`.
    async fn upsert_user(&self, user: &RemoteUser, refreshed_at: DateTime<Utc>) -> Result<()>;

    /// Fetch one stored row.
    async fn get_user(&self, id: u64) -> Result<Option<UserRecord>>;

    /// Local refresh time of a user, if stored.
    async fn get_updated_at(&self, id: u64) -> Result<Option<DateTime<Utc>>>;

    /// Users with `id > after_id`, ascending by id.
    async fn users_after(&self, after_id: u64, limit: u32) -> Result<Vec<RemoteUser>>;

    /// Users with exactly `stars` and `id > after_id`, ascending by id.
    async fn users_with_stars(
        &self,
        stars: u64,
        after_id: u64,
        limit: u32,
    ) -> Result<Vec<RemoteUser>>;

    /// Highest star count stored, 0 if none.
    async fn max_star_count(&self) -> Result<u64>;

    /// Highest star count strictly below `stars`, 0 if none.
    async fn next_lower_star_count(&self, stars: u64) -> Result<u64>;

    /// Highest user ID stored, 0 if none.
    async fn max_known_identifier(&self) -> Result<u64>;
}

/// Stored API tokens, keyed by the owning user.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn get_access_token(&self, user_id: u64) -> Result<Option<String>>;
}

/// Everything a scan worker needs from storage.
pub trait Store: CheckpointStore + UserStore + TokenStore {}

impl<T: CheckpointStore + UserStore + TokenStore> Store for T {}
