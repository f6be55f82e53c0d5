// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Full scan sessions against a scripted GitHub and the in-memory store.

use chrono::{DateTime, Utc};
use gitstar_worker::db::{CheckpointStore, UserStore};
use gitstar_worker::models::CursorName;
use gitstar_worker::services::{ScanOutcome, ScanSession};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

mod common;
use common::{fresh_record, full_scan_worker, memory_db_with, test_scan_config, FakeGitHub};

async fn full_cursor(db: &gitstar_worker::db::MemoryDb) -> u64 {
    db.get_cursor(CursorName::FullScanUser).await.unwrap()
}

#[tokio::test]
async fn test_first_batch_records_and_refreshes_page() {
    let github = Arc::new(FakeGitHub::new(&[(1, "mojombo", 40), (2, "defunkt", 7), (3, "pjhyett", 0)]));
    let db = memory_db_with(vec![]).await;
    let config = gitstar_worker::config::ScanConfig {
        full_scan_max_batches: 1,
        ..test_scan_config()
    };
    let worker = full_scan_worker(github.clone(), db.clone(), config);

    let report = worker.session(&CancellationToken::new()).await.unwrap();

    assert_eq!(report.batches, 1);
    assert_eq!(report.updated, 3);
    assert_eq!(report.outcome, ScanOutcome::BudgetExhausted);
    assert_eq!(full_cursor(&db).await, 3);
    assert_eq!(github.fetched(), vec![1, 2, 3]);

    let users = db.users().await;
    assert_eq!(users.len(), 3);
    assert!(users.iter().all(|u| u.updated_at > DateTime::<Utc>::UNIX_EPOCH));
    assert_eq!(users[0].stargazers_count, 40);
}

#[tokio::test]
async fn test_quota_reserve_ends_session_before_user() {
    // 1000 - 4 * 150 = 400 remaining when user 5 comes up
    let github = Arc::new(
        FakeGitHub::new(&[(1, "a", 1), (2, "b", 1), (3, "c", 1), (4, "d", 1), (5, "e", 1), (6, "f", 1)])
            .with_quota(1000, 150),
    );
    let db = memory_db_with(vec![]).await;
    let worker = full_scan_worker(github.clone(), db.clone(), test_scan_config());

    let report = worker.session(&CancellationToken::new()).await.unwrap();

    assert_eq!(report.outcome, ScanOutcome::QuotaExhausted);
    assert_eq!(github.fetched(), vec![1, 2, 3, 4]);
    assert_eq!(full_cursor(&db).await, 4);

    // Discovered but not refreshed
    let user5 = db.get_user(5).await.unwrap().unwrap();
    assert_eq!(user5.updated_at, DateTime::<Utc>::UNIX_EPOCH);
}

#[tokio::test]
async fn test_skip_listed_users_never_refreshed() {
    let github = Arc::new(FakeGitHub::new(&[
        (1, "octocat", 5),
        (2, "gitpan", 900),
        (3, "Try-Git", 12),
        (4, "hubot", 3),
    ]));
    let db = memory_db_with(vec![]).await;
    let worker = full_scan_worker(github.clone(), db.clone(), test_scan_config());

    let report = worker.session(&CancellationToken::new()).await.unwrap();

    assert_eq!(github.fetched(), vec![1, 4]);
    assert_eq!(report.skipped_listed, 2);
    assert_eq!(report.checked, 4);
    // Listed users are still discovered and passed by the cursor
    assert!(db.get_user(2).await.unwrap().is_some());
    assert_eq!(full_cursor(&db).await, 4);
}

#[tokio::test]
async fn test_fresh_users_skipped_but_cursor_advances() {
    let github = Arc::new(FakeGitHub::new(&[(1, "a", 1), (2, "b", 1), (3, "c", 1)]));
    let db = memory_db_with(vec![fresh_record(2, "b", 77)]).await;
    let worker = full_scan_worker(github.clone(), db.clone(), test_scan_config());

    let report = worker.session(&CancellationToken::new()).await.unwrap();

    assert_eq!(github.fetched(), vec![1, 3]);
    assert_eq!(report.skipped_fresh, 1);
    assert_eq!(full_cursor(&db).await, 3);
    // Discovery pages carry no stars, so the stored count survives
    assert_eq!(db.get_user(2).await.unwrap().unwrap().stargazers_count, 77);
}

#[tokio::test]
async fn test_pages_until_caught_up() {
    let github = Arc::new(
        FakeGitHub::new(&[(1, "a", 1), (2, "b", 1), (3, "c", 1), (4, "d", 1), (5, "e", 1)])
            .with_page_size(2),
    );
    let db = memory_db_with(vec![]).await;
    let worker = full_scan_worker(github.clone(), db.clone(), test_scan_config());

    let report = worker.session(&CancellationToken::new()).await.unwrap();

    assert_eq!(report.outcome, ScanOutcome::CaughtUp);
    assert_eq!(report.batches, 3);
    assert_eq!(github.pages_served(), 4);
    assert_eq!(full_cursor(&db).await, 5);
}

#[tokio::test]
async fn test_batch_budget_bounds_session() {
    let github = Arc::new(
        FakeGitHub::new(&[(1, "a", 1), (2, "b", 1), (3, "c", 1), (4, "d", 1), (5, "e", 1)])
            .with_page_size(2),
    );
    let db = memory_db_with(vec![]).await;
    let config = gitstar_worker::config::ScanConfig {
        full_scan_max_batches: 2,
        ..test_scan_config()
    };
    let worker = full_scan_worker(github.clone(), db.clone(), config);

    let report = worker.session(&CancellationToken::new()).await.unwrap();

    assert_eq!(report.outcome, ScanOutcome::BudgetExhausted);
    assert_eq!(full_cursor(&db).await, 4);
    assert_eq!(github.fetched(), vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn test_cursor_never_regresses_across_sessions() {
    let github = Arc::new(
        FakeGitHub::new(&[(1, "a", 1), (2, "b", 1), (3, "c", 1), (4, "d", 1), (5, "e", 1)])
            .with_page_size(2),
    );
    let db = memory_db_with(vec![]).await;
    let config = gitstar_worker::config::ScanConfig {
        full_scan_max_batches: 1,
        ..test_scan_config()
    };
    let worker = full_scan_worker(github.clone(), db.clone(), config);
    let cancel = CancellationToken::new();

    let mut previous = 0;
    for _ in 0..5 {
        worker.session(&cancel).await.unwrap();
        let cursor = full_cursor(&db).await;
        assert!(cursor >= previous);
        previous = cursor;
    }
    assert_eq!(previous, 5);

    // Caught up: nothing new, nothing written
    let writes = db.cursor_writes().await;
    assert_eq!(writes.len(), 3);
    assert!(writes.iter().all(|w| w.len() == 1));
}

#[tokio::test]
async fn test_stop_mid_batch_discards_batch_cursor() {
    let cancel = CancellationToken::new();
    let github = Arc::new(
        FakeGitHub::new(&[(1, "a", 1), (2, "b", 1), (3, "c", 1), (4, "d", 1)])
            .with_page_size(2)
            .cancel_after(3, cancel.clone()),
    );
    let db = memory_db_with(vec![]).await;
    let worker = full_scan_worker(github.clone(), db.clone(), test_scan_config());

    let report = worker.session(&cancel).await.unwrap();

    assert_eq!(report.outcome, ScanOutcome::Stopped);
    assert_eq!(github.fetched(), vec![1, 2, 3]);
    // First batch completed; the second was interrupted after user 3
    assert_eq!(full_cursor(&db).await, 2);
    // The refresh that happened before the stop is kept
    let user3 = db.get_user(3).await.unwrap().unwrap();
    assert!(user3.updated_at > DateTime::<Utc>::UNIX_EPOCH);
}

#[tokio::test]
async fn test_cancelled_before_start_does_nothing() {
    let github = Arc::new(FakeGitHub::new(&[(1, "a", 1)]));
    let db = memory_db_with(vec![]).await;
    let worker = full_scan_worker(github.clone(), db.clone(), test_scan_config());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = worker.session(&cancel).await.unwrap();

    assert_eq!(report.outcome, ScanOutcome::Stopped);
    assert_eq!(github.pages_served(), 0);
    assert!(db.users().await.is_empty());
}

#[tokio::test]
async fn test_fetch_failure_ends_session_without_cursor() {
    let github = Arc::new(FakeGitHub::new(&[(1, "a", 1), (2, "b", 1), (3, "c", 1)]).with_failure(2));
    let db = memory_db_with(vec![]).await;
    let worker = full_scan_worker(github.clone(), db.clone(), test_scan_config());

    let err = worker.session(&CancellationToken::new()).await.unwrap_err();

    assert!(err.to_string().contains("502"));
    assert_eq!(full_cursor(&db).await, 0);
    assert!(db.cursor_writes().await.is_empty());
    // Whole page was discovered before the failure
    assert_eq!(db.users().await.len(), 3);
}

#[tokio::test]
async fn test_vanished_user_is_stamped_and_passed() {
    let github = Arc::new(FakeGitHub::new(&[(1, "a", 1), (2, "renamed", 1), (3, "c", 1)]).with_missing(2));
    let db = memory_db_with(vec![]).await;
    let worker = full_scan_worker(github.clone(), db.clone(), test_scan_config());

    let report = worker.session(&CancellationToken::new()).await.unwrap();

    assert_eq!(report.outcome, ScanOutcome::CaughtUp);
    assert_eq!(github.fetched(), vec![1, 2, 3]);
    assert_eq!(full_cursor(&db).await, 3);
    let user2 = db.get_user(2).await.unwrap().unwrap();
    assert!(user2.updated_at > DateTime::<Utc>::UNIX_EPOCH);
}

#[tokio::test(start_paused = true)]
async fn test_delay_follows_each_refresh() {
    let github = Arc::new(FakeGitHub::new(&[(1, "a", 1), (2, "b", 1), (3, "c", 1)]));
    let db = memory_db_with(vec![fresh_record(2, "b", 1)]).await;
    let config = gitstar_worker::config::ScanConfig {
        user_update_delay: Duration::from_secs(2),
        ..test_scan_config()
    };
    let worker = full_scan_worker(github.clone(), db.clone(), config);
    let start = Instant::now();

    let report = worker.session(&CancellationToken::new()).await.unwrap();

    assert_eq!(report.updated, 2);
    // Fresh users are skipped without a pause
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(4));
    assert!(elapsed < Duration::from_secs(6));
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_delay_ends_session_early() {
    let github = Arc::new(FakeGitHub::new(&[(1, "a", 1), (2, "b", 1), (3, "c", 1)]));
    let db = memory_db_with(vec![]).await;
    let config = gitstar_worker::config::ScanConfig {
        user_update_delay: Duration::from_secs(2),
        ..test_scan_config()
    };
    let worker = full_scan_worker(github.clone(), db.clone(), config);
    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            cancel.cancel();
        }
    });
    let start = Instant::now();

    let report = worker.session(&cancel).await.unwrap();

    assert_eq!(report.outcome, ScanOutcome::Stopped);
    assert!(start.elapsed() < Duration::from_secs(4));
    assert_eq!(github.fetched(), vec![1, 2]);
    assert_eq!(full_cursor(&db).await, 0);
    let user2 = db.get_user(2).await.unwrap().unwrap();
    assert!(user2.updated_at > DateTime::<Utc>::UNIX_EPOCH);
}
