// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! gitstar-worker
//!
//! Runs the full scan and star scan workers and the HTTP endpoint that
//! triggers their sessions.

use gitstar_worker::{
    config::{Config, ConfigError, StoreBackend},
    db::{FirestoreDb, MemoryDb, Store},
    services::{
        run_worker, trigger, FullScanWorker, GitHubApi, GitHubClient, ScanTriggers, SkipSet,
        StarScanWorker, UserUpdater,
    },
    shutdown, AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting gitstar-worker");

    let cancel = shutdown::install_signal_handler()?;

    let store: Arc<dyn Store> = match config.store_backend {
        StoreBackend::Firestore => Arc::new(FirestoreDb::new(&config.gcp_project_id).await?),
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store, nothing will persist");
            Arc::new(MemoryDb::new())
        }
    };

    // The token owner's stored token selects the quota bucket
    let token = match &config.github_token {
        Some(token) => token.clone(),
        None => store
            .get_access_token(config.github_token_user_id)
            .await?
            .ok_or(ConfigError::Missing("GITHUB_TOKEN"))?,
    };
    let github: Arc<dyn GitHubApi> = Arc::new(GitHubClient::new(&config.github_api_url, token));

    let skip = SkipSet::from_logins(config.scan.skip_logins.iter().cloned());
    tracing::info!(skip_logins = config.scan.skip_logins.len(), "Skip list loaded");
    let updater = UserUpdater::new(github.clone(), store.clone(), config.scan.user_update_delay);

    let (full_tx, full_rx) = trigger::channel();
    let (star_tx, star_rx) = trigger::channel();
    let poll = config.scan.trigger_poll_interval;

    let full_scan = FullScanWorker::new(
        github.clone(),
        store.clone(),
        updater.clone(),
        skip.clone(),
        config.scan.clone(),
    );
    let star_scan = StarScanWorker::new(github, store, updater, skip, config.scan.clone());

    let full_handle = tokio::spawn({
        let cancel = cancel.child_token();
        async move { run_worker(&full_scan, full_rx, poll, cancel).await }
    });
    let star_handle = tokio::spawn({
        let cancel = cancel.child_token();
        async move { run_worker(&star_scan, star_rx, poll, cancel).await }
    });

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        triggers: ScanTriggers {
            full_scan: full_tx,
            star_scan: star_tx,
        },
    });

    // Build router
    let app = gitstar_worker::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    let server_cancel = cancel.child_token();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { server_cancel.cancelled().await })
        .await?;

    // Workers stop on the same token; wait for them to finish their user
    let (full, star) = tokio::join!(full_handle, star_handle);
    full?;
    star?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("gitstar_worker=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .try_init()?;
    Ok(())
}
