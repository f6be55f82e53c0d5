// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session plumbing shared by the full and star scans.

use crate::error::Result;
use crate::services::trigger::TriggerSource;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanOutcome {
    /// Cancelled (or trigger senders gone) before a session started
    NoTrigger,
    /// Full scan reached the end of the remote population
    CaughtUp,
    /// Batch, update or check budget used up
    BudgetExhausted,
    /// Remaining quota fell below the reserve
    QuotaExhausted,
    /// Stop requested mid-session
    Stopped,
    /// Star scan finished a descending pass and reset its cursors
    TraversalComplete,
}

/// Counters for one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub batches: u32,
    /// Users inspected, skips included
    pub checked: u32,
    /// Users refreshed through the updater
    pub updated: u32,
    pub skipped_listed: u32,
    pub skipped_fresh: u32,
    pub outcome: ScanOutcome,
}

impl ScanReport {
    pub(crate) fn new() -> Self {
        Self {
            batches: 0,
            checked: 0,
            updated: 0,
            skipped_listed: 0,
            skipped_fresh: 0,
            outcome: ScanOutcome::BudgetExhausted,
        }
    }

    pub fn no_trigger() -> Self {
        Self {
            outcome: ScanOutcome::NoTrigger,
            ..Self::new()
        }
    }
}

/// One scan policy, run once per trigger.
#[async_trait]
pub trait ScanSession: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Run a single session. Honors `cancel` between users.
    async fn session(&self, cancel: &CancellationToken) -> Result<ScanReport>;
}

/// True if a row last refreshed at `updated_at` should be refreshed again.
/// Unknown rows are stale.
pub fn is_stale(updated_at: Option<DateTime<Utc>>, threshold: DateTime<Utc>) -> bool {
    updated_at.is_none_or(|t| t <= threshold)
}

/// Wait for one trigger and run one session.
pub async fn run_once<W: ScanSession + ?Sized>(
    worker: &W,
    trigger: &mut TriggerSource,
    poll: Duration,
    cancel: &CancellationToken,
) -> Result<ScanReport> {
    if !trigger.wait(poll, cancel).await {
        return Ok(ScanReport::no_trigger());
    }
    worker.session(cancel).await
}

/// Worker loop: run a session per trigger until cancelled.
///
/// A failed session is logged and the worker goes back to waiting; the
/// next trigger resumes from the last stored cursor.
pub async fn run_worker<W: ScanSession + ?Sized>(
    worker: &W,
    mut trigger: TriggerSource,
    poll: Duration,
    cancel: CancellationToken,
) {
    tracing::info!(worker = worker.name(), "Scan worker started");

    loop {
        match run_once(worker, &mut trigger, poll, &cancel).await {
            Ok(report) if report.outcome == ScanOutcome::NoTrigger => break,
            Ok(report) => {
                tracing::info!(
                    worker = worker.name(),
                    outcome = ?report.outcome,
                    batches = report.batches,
                    checked = report.checked,
                    updated = report.updated,
                    skipped_listed = report.skipped_listed,
                    skipped_fresh = report.skipped_fresh,
                    "Scan session finished"
                );
            }
            Err(e) if e.is_rate_limited() => {
                tracing::warn!(worker = worker.name(), "Scan session hit the GitHub rate limit");
            }
            Err(e) => {
                tracing::error!(worker = worker.name(), error = %e, "Scan session failed");
            }
        }
    }

    tracing::info!(worker = worker.name(), "Scan worker stopped");
}
