// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process store with the same semantics as [`FirestoreDb`](super::FirestoreDb).
//!
//! Used by the test suite and by `STORE_BACKEND=memory` for local runs.
//! Every cursor write is journaled so callers can observe which values
//! were written together.

use crate::db::{CheckpointStore, TokenStore, UserStore};
use crate::error::Result;
use crate::models::{CursorName, RemoteUser, StarScanCursor, UserRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    users: BTreeMap<u64, UserRecord>,
    cursors: HashMap<CursorName, u64>,
    cursor_writes: Vec<Vec<(CursorName, u64)>>,
    tokens: HashMap<u64, String>,
}

/// In-memory database; clones share state.
#[derive(Clone, Default)]
pub struct MemoryDb {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a full row.
    pub async fn put_user(&self, record: UserRecord) {
        self.inner.write().await.users.insert(record.id, record);
    }

    pub async fn set_access_token(&self, user_id: u64, token: &str) {
        self.inner
            .write()
            .await
            .tokens
            .insert(user_id, token.to_string());
    }

    /// All rows, ascending by ID.
    pub async fn users(&self) -> Vec<UserRecord> {
        self.inner.read().await.users.values().cloned().collect()
    }

    /// Cursor writes in order; each entry was applied as one unit.
    pub async fn cursor_writes(&self) -> Vec<Vec<(CursorName, u64)>> {
        self.inner.read().await.cursor_writes.clone()
    }

    async fn write_cursors(&self, values: &[(CursorName, u64)]) {
        let mut inner = self.inner.write().await;
        for (name, value) in values {
            inner.cursors.insert(*name, *value);
        }
        inner.cursor_writes.push(values.to_vec());
    }
}

#[async_trait]
impl CheckpointStore for MemoryDb {
    async fn get_cursor(&self, name: CursorName) -> Result<u64> {
        Ok(self
            .inner
            .read()
            .await
            .cursors
            .get(&name)
            .copied()
            .unwrap_or(0))
    }

    async fn update_cursor(&self, name: CursorName, value: u64) -> Result<()> {
        self.write_cursors(&[(name, value)]).await;
        Ok(())
    }

    async fn get_star_scan_cursor(&self) -> Result<StarScanCursor> {
        let inner = self.inner.read().await;
        let get = |name| inner.cursors.get(&name).copied().unwrap_or(0);
        Ok(StarScanCursor {
            stars: get(CursorName::StarScanStars),
            user_id: get(CursorName::StarScanUser),
        })
    }

    async fn update_star_scan_cursor(&self, cursor: StarScanCursor) -> Result<()> {
        self.write_cursors(&[
            (CursorName::StarScanUser, cursor.user_id),
            (CursorName::StarScanStars, cursor.stars),
        ])
        .await;
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryDb {
    async fn bulk_upsert(&self, users: &[RemoteUser]) -> Result<()> {
        let mut inner = self.inner.write().await;
        for user in users {
            inner
                .users
                .entry(user.id)
                .and_modify(|existing| existing.merge_discovered(user))
                .or_insert_with(|| UserRecord::discovered(user));
        }
        Ok(())
    }

    async fn upsert_user(&self, user: &RemoteUser, refreshed_at: DateTime<Utc>) -> Result<()> {
        let mut inner = self.inner.write().await;
        let record = UserRecord::refreshed(user, inner.users.get(&user.id), refreshed_at);
        inner.users.insert(user.id, record);
        Ok(())
    }

    async fn get_user(&self, id: u64) -> Result<Option<UserRecord>> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn get_updated_at(&self, id: u64) -> Result<Option<DateTime<Utc>>> {
        Ok(self.inner.read().await.users.get(&id).map(|u| u.updated_at))
    }

    async fn users_after(&self, after_id: u64, limit: u32) -> Result<Vec<RemoteUser>> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .range(after_id.saturating_add(1)..)
            .take(limit as usize)
            .map(|(_, u)| RemoteUser::from(u))
            .collect())
    }

    async fn users_with_stars(
        &self,
        stars: u64,
        after_id: u64,
        limit: u32,
    ) -> Result<Vec<RemoteUser>> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .range(after_id.saturating_add(1)..)
            .map(|(_, u)| u)
            .filter(|u| u.stargazers_count == stars)
            .take(limit as usize)
            .map(RemoteUser::from)
            .collect())
    }

    async fn max_star_count(&self) -> Result<u64> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .values()
            .map(|u| u.stargazers_count)
            .max()
            .unwrap_or(0))
    }

    async fn next_lower_star_count(&self, stars: u64) -> Result<u64> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .values()
            .map(|u| u.stargazers_count)
            .filter(|s| *s < stars)
            .max()
            .unwrap_or(0))
    }

    async fn max_known_identifier(&self) -> Result<u64> {
        Ok(self
            .inner
            .read()
            .await
            .users
            .keys()
            .next_back()
            .copied()
            .unwrap_or(0))
    }
}

#[async_trait]
impl TokenStore for MemoryDb {
    async fn get_access_token(&self, user_id: u64) -> Result<Option<String>> {
        Ok(self.inner.read().await.tokens.get(&user_id).cloned())
    }
}
