// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Scan checkpoint (cursor) model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Named resume positions, one stored row each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CursorName {
    /// Last user ID fully processed by the identifier-ordered scan.
    FullScanUser,
    /// Last user ID processed inside the current star bucket.
    StarScanUser,
    /// Star bucket currently being scanned (0 = start a new pass).
    StarScanStars,
}

impl CursorName {
    pub const ALL: [CursorName; 3] = [
        CursorName::FullScanUser,
        CursorName::StarScanUser,
        CursorName::StarScanStars,
    ];

    /// Document ID used for this cursor.
    pub fn as_str(&self) -> &'static str {
        match self {
            CursorName::FullScanUser => "full_scan_user_id",
            CursorName::StarScanUser => "star_scan_user_id",
            CursorName::StarScanStars => "star_scan_stars",
        }
    }
}

impl std::fmt::Display for CursorName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored cursor document in `last_updates`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Cursor value (0 = unset)
    pub cursor: u64,
    /// When the cursor was last written
    #[serde(with = "firestore::serialize_as_timestamp")]
    pub updated_at: DateTime<Utc>,
}

/// Position of the star-ordered scan. Both halves are always written together.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StarScanCursor {
    /// Star bucket being scanned
    pub stars: u64,
    /// Last user ID processed within `stars`
    pub user_id: u64,
}

impl StarScanCursor {
    /// True when no pass is in progress.
    pub fn is_unset(&self) -> bool {
        self.stars == 0
    }
}
