// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gitstar_worker::config::{Config, ScanConfig};
use gitstar_worker::db::{FirestoreDb, MemoryDb, Store};
use gitstar_worker::error::{AppError, Result};
use gitstar_worker::models::{RemoteUser, UserRecord};
use gitstar_worker::routes::create_router;
use gitstar_worker::services::{
    trigger, FullScanWorker, GitHubApi, ScanTriggers, SkipSet, StarScanWorker, TriggerSource,
    UserUpdater,
};
use gitstar_worker::AppState;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Scripted GitHub: a fixed remote population served in ID order, and a
/// quota that drops by `detail_cost` for every detail fetch.
#[allow(dead_code)]
pub struct FakeGitHub {
    population: Vec<RemoteUser>,
    page_size: usize,
    initial_quota: u64,
    detail_cost: u64,
    missing: HashSet<u64>,
    failing: HashSet<u64>,
    cancel_after: Option<(usize, CancellationToken)>,
    fetched: Mutex<Vec<u64>>,
    pages_served: Mutex<u32>,
}

#[allow(dead_code)]
impl FakeGitHub {
    /// `users` are `(id, login, stars)`; the detail fetch reports `stars`.
    pub fn new(users: &[(u64, &str, u64)]) -> Self {
        let mut population: Vec<RemoteUser> = users
            .iter()
            .map(|(id, login, stars)| RemoteUser {
                star_count: Some(*stars),
                ..RemoteUser::discovered(*id, *login)
            })
            .collect();
        population.sort_by_key(|u| u.id);

        Self {
            population,
            page_size: 100,
            initial_quota: 5000,
            detail_cost: 1,
            missing: HashSet::new(),
            failing: HashSet::new(),
            cancel_after: None,
            fetched: Mutex::new(Vec::new()),
            pages_served: Mutex::new(0),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_quota(mut self, initial: u64, detail_cost: u64) -> Self {
        self.initial_quota = initial;
        self.detail_cost = detail_cost;
        self
    }

    /// Detail fetch for `id` answers NotFound.
    pub fn with_missing(mut self, id: u64) -> Self {
        self.missing.insert(id);
        self
    }

    /// Detail fetch for `id` fails with a transport-style error.
    pub fn with_failure(mut self, id: u64) -> Self {
        self.failing.insert(id);
        self
    }

    /// Cancel `token` once `fetches` detail fetches have completed.
    pub fn cancel_after(mut self, fetches: usize, token: CancellationToken) -> Self {
        self.cancel_after = Some((fetches, token));
        self
    }

    /// IDs passed to `fetch_detail`, in call order.
    pub fn fetched(&self) -> Vec<u64> {
        self.fetched.lock().unwrap().clone()
    }

    pub fn pages_served(&self) -> u32 {
        *self.pages_served.lock().unwrap()
    }
}

#[async_trait]
impl GitHubApi for FakeGitHub {
    async fn remaining_quota(&self) -> Result<u64> {
        let spent = self.fetched.lock().unwrap().len() as u64 * self.detail_cost;
        Ok(self.initial_quota.saturating_sub(spent))
    }

    async fn users_since(&self, since: u64) -> Result<Vec<RemoteUser>> {
        *self.pages_served.lock().unwrap() += 1;
        Ok(self
            .population
            .iter()
            .filter(|u| u.id > since)
            .take(self.page_size)
            .map(|u| RemoteUser {
                star_count: None,
                ..u.clone()
            })
            .collect())
    }

    async fn fetch_detail(&self, user: &RemoteUser) -> Result<RemoteUser> {
        let count = {
            let mut fetched = self.fetched.lock().unwrap();
            fetched.push(user.id);
            fetched.len()
        };
        if let Some((after, token)) = &self.cancel_after {
            if count >= *after {
                token.cancel();
            }
        }

        if self.failing.contains(&user.id) {
            return Err(AppError::GitHubApi("HTTP 502 Bad Gateway: ".to_string()));
        }
        if self.missing.contains(&user.id) {
            return Err(AppError::NotFound(format!("GitHub user {}", user.login)));
        }

        let known = self.population.iter().find(|u| u.id == user.id);
        Ok(RemoteUser {
            star_count: known.and_then(|u| u.star_count).or(Some(0)),
            updated_at: Some(DateTime::UNIX_EPOCH + chrono::Duration::days(1)),
            ..user.clone()
        })
    }
}

/// Scan settings for tests: no inter-user delay.
#[allow(dead_code)]
pub fn test_scan_config() -> ScanConfig {
    ScanConfig {
        user_update_delay: Duration::ZERO,
        trigger_poll_interval: Duration::from_millis(10),
        ..ScanConfig::default()
    }
}

/// Stored row never refreshed locally.
#[allow(dead_code)]
pub fn stale_record(id: u64, login: &str, stars: u64) -> UserRecord {
    UserRecord {
        stargazers_count: stars,
        ..UserRecord::discovered(&RemoteUser::discovered(id, login))
    }
}

/// Stored row refreshed just now.
#[allow(dead_code)]
pub fn fresh_record(id: u64, login: &str, stars: u64) -> UserRecord {
    UserRecord {
        updated_at: Utc::now(),
        ..stale_record(id, login, stars)
    }
}

#[allow(dead_code)]
pub async fn memory_db_with(records: Vec<UserRecord>) -> MemoryDb {
    let db = MemoryDb::new();
    for record in records {
        db.put_user(record).await;
    }
    db
}

#[allow(dead_code)]
pub fn full_scan_worker(github: Arc<FakeGitHub>, db: MemoryDb, config: ScanConfig) -> FullScanWorker {
    let store: Arc<dyn Store> = Arc::new(db);
    let github: Arc<dyn GitHubApi> = github;
    let updater = UserUpdater::new(github.clone(), store.clone(), config.user_update_delay);
    let skip = SkipSet::from_logins(config.skip_logins.iter().cloned());
    FullScanWorker::new(github, store, updater, skip, config)
}

#[allow(dead_code)]
pub fn star_scan_worker(github: Arc<FakeGitHub>, db: MemoryDb, config: ScanConfig) -> StarScanWorker {
    let store: Arc<dyn Store> = Arc::new(db);
    let github: Arc<dyn GitHubApi> = github;
    let updater = UserUpdater::new(github.clone(), store.clone(), config.user_update_delay);
    let skip = SkipSet::from_logins(config.skip_logins.iter().cloned());
    StarScanWorker::new(github, store, updater, skip, config)
}

/// Router plus the worker ends of both trigger channels.
#[allow(dead_code)]
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub full_scan: TriggerSource,
    pub star_scan: TriggerSource,
}

/// Create a test app around `config`.
#[allow(dead_code)]
pub fn create_test_app_with(config: Config) -> TestApp {
    let (full_tx, full_rx) = trigger::channel();
    let (star_tx, star_rx) = trigger::channel();

    let state = Arc::new(AppState {
        config,
        triggers: ScanTriggers {
            full_scan: full_tx,
            star_scan: star_tx,
        },
    });

    TestApp {
        router: create_router(state.clone()),
        state,
        full_scan: full_rx,
        star_scan: star_rx,
    }
}

/// Create a test app with the default test config.
#[allow(dead_code)]
pub fn create_test_app() -> TestApp {
    create_test_app_with(Config::test_default())
}
