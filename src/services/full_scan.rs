// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identifier-ordered discovery and refresh.
//!
//! Each batch reads the next page of users after the stored cursor,
//! records the whole page, then refreshes the stale users in page order.
//! The cursor is written once per completed batch.

use crate::config::ScanConfig;
use crate::db::Store;
use crate::error::Result;
use crate::models::CursorName;
use crate::services::scan::{is_stale, ScanOutcome, ScanReport, ScanSession};
use crate::services::{GitHubApi, SkipSet, UserUpdater};
use crate::time_utils::{format_utc_rfc3339, freshness_threshold};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct FullScanWorker {
    github: Arc<dyn GitHubApi>,
    store: Arc<dyn Store>,
    updater: UserUpdater,
    skip: SkipSet,
    config: ScanConfig,
}

impl FullScanWorker {
    pub fn new(
        github: Arc<dyn GitHubApi>,
        store: Arc<dyn Store>,
        updater: UserUpdater,
        skip: SkipSet,
        config: ScanConfig,
    ) -> Self {
        Self {
            github,
            store,
            updater,
            skip,
            config,
        }
    }
}

#[async_trait]
impl ScanSession for FullScanWorker {
    fn name(&self) -> &'static str {
        "full_scan"
    }

    async fn session(&self, cancel: &CancellationToken) -> Result<ScanReport> {
        let threshold =
            freshness_threshold(chrono::Utc::now(), self.config.update_threshold_days);
        let api_remaining = self.github.remaining_quota().await?;
        let last_user_id = self.store.max_known_identifier().await?;
        tracing::info!(api_remaining, last_user_id, "Full scan session started");

        let mut report = ScanReport::new();

        for _ in 0..self.config.full_scan_max_batches {
            if cancel.is_cancelled() {
                report.outcome = ScanOutcome::Stopped;
                return Ok(report);
            }

            let cursor = self.store.get_cursor(CursorName::FullScanUser).await?;
            let users = self.github.users_since(cursor).await?;
            if users.is_empty() {
                tracing::info!(cursor, "No users after cursor, caught up");
                report.outcome = ScanOutcome::CaughtUp;
                return Ok(report);
            }

            report.batches += 1;
            self.store.bulk_upsert(&users).await?;
            tracing::debug!(cursor, count = users.len(), "Recorded user page");

            let mut candidate = cursor;
            let mut quota_exhausted = false;
            let mut stopped = false;

            for user in &users {
                if self.skip.contains(&user.login) {
                    tracing::info!(user_id = user.id, login = %user.login, "Skipping listed user");
                    report.skipped_listed += 1;
                } else {
                    let updated_at = self.store.get_updated_at(user.id).await?;
                    if is_stale(updated_at, threshold) {
                        let remaining = self.github.remaining_quota().await?;
                        if remaining < self.config.min_rate_limit_remaining {
                            tracing::warn!(
                                api_remaining = remaining,
                                reserve = self.config.min_rate_limit_remaining,
                                user_id = user.id,
                                "Quota below reserve, ending full scan session"
                            );
                            quota_exhausted = true;
                            break;
                        }

                        self.updater.update_user(user).await?;
                        report.updated += 1;
                        tracing::info!(
                            user_id = user.id,
                            login = %user.login,
                            progress = %format!("{:.2}%", progress_percent(user.id, last_user_id)),
                            "Refreshed user"
                        );
                        self.updater.pause(cancel).await;
                    } else {
                        tracing::debug!(
                            user_id = user.id,
                            login = %user.login,
                            updated_at = %updated_at.map(format_utc_rfc3339).unwrap_or_default(),
                            "Skipping fresh user"
                        );
                        report.skipped_fresh += 1;
                    }
                }

                candidate = candidate.max(user.id);
                report.checked += 1;

                if cancel.is_cancelled() {
                    stopped = true;
                    break;
                }
            }

            if stopped {
                tracing::info!(cursor, "Stop requested, discarding partial batch");
                report.outcome = ScanOutcome::Stopped;
                return Ok(report);
            }

            if candidate > cursor {
                self.store
                    .update_cursor(CursorName::FullScanUser, candidate)
                    .await?;
            }

            if quota_exhausted {
                report.outcome = ScanOutcome::QuotaExhausted;
                return Ok(report);
            }
        }

        report.outcome = ScanOutcome::BudgetExhausted;
        Ok(report)
    }
}

/// Rough position of `user_id` in the known population.
fn progress_percent(user_id: u64, last_user_id: u64) -> f64 {
    if last_user_id == 0 {
        return 100.0;
    }
    (user_id as f64 / last_user_id as f64 * 100.0).min(100.0)
}
