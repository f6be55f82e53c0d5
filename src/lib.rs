// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! gitstar-worker: keep a Firestore snapshot of GitHub users and their stars
//!
//! Two background scans share one store and one GitHub quota: a full scan
//! that discovers users in ID order, and a star scan that re-visits known
//! users from the most starred down. Each scan session is started by a
//! trigger delivered over HTTP.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod shutdown;
pub mod time_utils;

use config::Config;
use services::ScanTriggers;

/// Shared application state for the trigger intake.
pub struct AppState {
    pub config: Config,
    pub triggers: ScanTriggers,
}
