// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod checkpoint;
pub mod user;

pub use checkpoint::{Checkpoint, CursorName, StarScanCursor};
pub use user::{RemoteUser, UserRecord};
