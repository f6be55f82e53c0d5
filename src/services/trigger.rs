// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Scan triggers.
//!
//! Each worker owns a [`TriggerSource`]; producers hold cloneable
//! [`TriggerSender`]s. The channel holds at most one pending signal, so
//! triggers fired while one is already pending collapse into it.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Create a connected sender/source pair.
pub fn channel() -> (TriggerSender, TriggerSource) {
    let (tx, rx) = mpsc::channel(1);
    (TriggerSender { tx }, TriggerSource { rx })
}

/// Producer half.
#[derive(Debug, Clone)]
pub struct TriggerSender {
    tx: mpsc::Sender<()>,
}

impl TriggerSender {
    /// Request one session. Returns false if a request was already pending
    /// (the two are coalesced) or the worker has gone away.
    pub fn fire(&self) -> bool {
        self.tx.try_send(()).is_ok()
    }
}

/// Consumer half, owned by one worker.
#[derive(Debug)]
pub struct TriggerSource {
    rx: mpsc::Receiver<()>,
}

impl TriggerSource {
    /// Wait for the next trigger, waking every `poll` to re-check `cancel`.
    ///
    /// Returns true when a trigger arrived; false on cancellation or when
    /// every sender has been dropped.
    pub async fn wait(&mut self, poll: Duration, cancel: &CancellationToken) -> bool {
        loop {
            if cancel.is_cancelled() {
                return false;
            }

            tokio::select! {
                _ = cancel.cancelled() => return false,
                received = tokio::time::timeout(poll, self.rx.recv()) => match received {
                    Ok(Some(())) => return true,
                    Ok(None) => return false,
                    Err(_) => continue,
                },
            }
        }
    }
}

/// Senders for both workers, shared with the HTTP intake.
#[derive(Debug, Clone)]
pub struct ScanTriggers {
    pub full_scan: TriggerSender,
    pub star_scan: TriggerSender,
}
