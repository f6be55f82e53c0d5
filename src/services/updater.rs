// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-user refresh shared by both scans.
//!
//! Handles the core workflow:
//! 1. Fetch the user's detail (profile plus star total) from GitHub
//! 2. Overwrite the stored row, stamping the local refresh time
//!
//! Callers filter out skip-listed logins and pace themselves with
//! [`UserUpdater::pause`] after each refresh.

use crate::db::Store;
use crate::error::{AppError, Result};
use crate::models::RemoteUser;
use crate::services::GitHubApi;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Refresh one user at a time.
#[derive(Clone)]
pub struct UserUpdater {
    github: Arc<dyn GitHubApi>,
    store: Arc<dyn Store>,
    delay: Duration,
}

impl UserUpdater {
    pub fn new(github: Arc<dyn GitHubApi>, store: Arc<dyn Store>, delay: Duration) -> Self {
        Self {
            github,
            store,
            delay,
        }
    }

    /// Fetch and store the current state of `user`.
    ///
    /// Returns the stored user, or `None` when the account no longer
    /// exists under that login. The row is still stamped in that case so
    /// it is not retried on every session. Any other failure propagates.
    pub async fn update_user(&self, user: &RemoteUser) -> Result<Option<RemoteUser>> {
        let now = chrono::Utc::now();

        match self.github.fetch_detail(user).await {
            Ok(detail) => {
                self.store.upsert_user(&detail, now).await?;
                tracing::debug!(
                    user_id = detail.id,
                    login = %detail.login,
                    stars = detail.star_count.unwrap_or(0),
                    "Updated user"
                );
                Ok(Some(detail))
            }
            Err(AppError::NotFound(reason)) => {
                tracing::warn!(
                    user_id = user.id,
                    login = %user.login,
                    reason = %reason,
                    "User not found on GitHub, marking checked"
                );
                self.store.upsert_user(user, now).await?;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Inter-user delay. Returns early if `cancel` fires; the refresh that
    /// preceded it stays committed.
    pub async fn pause(&self, cancel: &CancellationToken) {
        tokio::select! {
            _ = tokio::time::sleep(self.delay) => {}
            _ = cancel.cancelled() => {}
        }
    }
}
