// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Star-ordered rescan of known users.
//!
//! Walks the user table from the highest star bucket down, refreshing
//! stale users so the best-ranked rows stay current. The position is the
//! pair (bucket, last user ID in bucket), always written together. When
//! the lowest bucket is done both halves reset to 0 and the next session
//! starts a new pass from the top.

use crate::config::ScanConfig;
use crate::db::Store;
use crate::error::Result;
use crate::models::StarScanCursor;
use crate::services::scan::{is_stale, ScanOutcome, ScanReport, ScanSession};
use crate::services::{GitHubApi, SkipSet, UserUpdater};
use crate::time_utils::freshness_threshold;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct StarScanWorker {
    github: Arc<dyn GitHubApi>,
    store: Arc<dyn Store>,
    updater: UserUpdater,
    skip: SkipSet,
    config: ScanConfig,
}

impl StarScanWorker {
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

    /// Finish a pass: both cursors back to 0 in one write.
    async fn complete_traversal(&self, report: &mut ScanReport) -> Result<()> {
        self.store.reset_star_scan_cursor().await?;
        tracing::info!(
            checked = report.checked,
            updated = report.updated,
            "Star scan pass complete, cursors reset"
        );
        report.outcome = ScanOutcome::TraversalComplete;
        Ok(())
    }
}

#[async_trait]
impl ScanSession for StarScanWorker {
    fn name(&self) -> &'static str {
        "star_scan"
    }

    async fn session(&self, cancel: &CancellationToken) -> Result<ScanReport> {
        let threshold =
            freshness_threshold(chrono::Utc::now(), self.config.update_threshold_days);
        let api_remaining = self.github.remaining_quota().await?;

        let mut report = ScanReport::new();
        let mut cursor = self.store.get_star_scan_cursor().await?;
        if cursor.is_unset() {
            cursor = StarScanCursor {
                stars: self.store.max_star_count().await?,
                user_id: 0,
            };
            if cursor.is_unset() {
                tracing::info!("No starred users stored, nothing to scan");
                self.complete_traversal(&mut report).await?;
                return Ok(report);
            }
        }
        tracing::info!(
            api_remaining,
            stars = cursor.stars,
            user_id = cursor.user_id,
            "Star scan session started"
        );

        let mut updates_left = self.config.star_scan_max_updates;
        let mut checks_left = self.config.star_scan_max_checks;

        while updates_left > 0 && checks_left > 0 {
            if cancel.is_cancelled() {
                report.outcome = ScanOutcome::Stopped;
                return Ok(report);
            }

            let limit = updates_left.min(self.config.star_scan_batch_size);
            let mut users = self
                .store
                .users_with_stars(cursor.stars, cursor.user_id, limit)
                .await?;

            // Bucket exhausted: move down to the next populated one
            while users.is_empty() {
                let lower = self.store.next_lower_star_count(cursor.stars).await?;
                if lower == 0 {
                    self.complete_traversal(&mut report).await?;
                    return Ok(report);
                }
                tracing::debug!(from = cursor.stars, to = lower, "Moving to next star bucket");
                cursor = StarScanCursor {
                    stars: lower,
                    user_id: 0,
                };
                users = self
                    .store
                    .users_with_stars(cursor.stars, cursor.user_id, limit)
                    .await?;
            }

            report.batches += 1;
            let mut next = cursor;
            let mut quota_exhausted = false;
            let mut stopped = false;

            for user in &users {
                if self.skip.contains(&user.login) {
                    tracing::info!(user_id = user.id, login = %user.login, "Skipping listed user");
                    report.skipped_listed += 1;
                } else {
                    let remaining = self.github.remaining_quota().await?;
                    if remaining < self.config.min_rate_limit_remaining {
                        tracing::warn!(
                            api_remaining = remaining,
                            reserve = self.config.min_rate_limit_remaining,
                            user_id = user.id,
                            "Quota below reserve, ending star scan session"
                        );
                        quota_exhausted = true;
                        break;
                    }

                    let updated_at = self.store.get_updated_at(user.id).await?;
                    if is_stale(updated_at, threshold) {
                        self.updater.update_user(user).await?;
                        report.updated += 1;
                        updates_left = updates_left.saturating_sub(1);
                        tracing::info!(
                            user_id = user.id,
                            login = %user.login,
                            stars = cursor.stars,
                            "Refreshed user"
                        );
                        self.updater.pause(cancel).await;
                    } else {
                        tracing::debug!(user_id = user.id, login = %user.login, "Skipping fresh user");
                        report.skipped_fresh += 1;
                    }
                }

                report.checked += 1;
                checks_left = checks_left.saturating_sub(1);
                next.user_id = next.user_id.max(user.id);

                if cancel.is_cancelled() {
                    stopped = true;
                    break;
                }
                if updates_left == 0 || checks_left == 0 {
                    break;
                }
            }

            if stopped {
                tracing::info!(
                    stars = cursor.stars,
                    user_id = cursor.user_id,
                    "Stop requested, discarding partial batch"
                );
                report.outcome = ScanOutcome::Stopped;
                return Ok(report);
            }

            if next != cursor {
                self.store.update_star_scan_cursor(next).await?;
                cursor = next;
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
