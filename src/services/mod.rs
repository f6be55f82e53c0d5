// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod full_scan;
pub mod github;
pub mod scan;
pub mod skip;
pub mod star_scan;
pub mod trigger;
pub mod updater;

pub use full_scan::FullScanWorker;
pub use github::{GitHubApi, GitHubClient};
pub use scan::{run_once, run_worker, ScanOutcome, ScanReport, ScanSession};
pub use skip::SkipSet;
pub use star_scan::StarScanWorker;
pub use trigger::{ScanTriggers, TriggerSender, TriggerSource};
pub use updater::UserUpdater;
