// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Logins that are never refreshed individually.

use crate::config::DEFAULT_SKIP_LOGINS;
use std::collections::HashSet;

/// Fixed set of logins excluded from refresh. Matching is case-sensitive.
#[derive(Debug, Clone)]
pub struct SkipSet {
    logins: HashSet<String>,
}

impl SkipSet {
    pub fn from_logins<I, S>(logins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            logins: logins.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, login: &str) -> bool {
        self.logins.contains(login)
    }
}

impl Default for SkipSet {
    fn default() -> Self {
        Self::from_logins(DEFAULT_SKIP_LOGINS.iter().copied())
    }
}
