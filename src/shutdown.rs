//! Process shutdown for the scan workers and the HTTP server.
//!
//! The first SIGINT, SIGTERM or SIGHUP cancels the root token handed out by
//! [`install_signal_handler`]. Workers stop after the user they are on and
//! the server drains. Any further signal exits with status 130.

use std::sync::atomic::{AtomicU32, Ordering};

use tokio_util::sync::CancellationToken;

/// What to do about a received signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SignalAction {
    /// Cancel the root token and let sessions wind down
    Drain,
    /// Already draining; leave now
    ForceExit,
}

/// Counts signals against one root token.
#[derive(Debug, Default)]
struct ShutdownState {
    token: CancellationToken,
    received: AtomicU32,
}

impl ShutdownState {
    fn on_signal(&self, signal: &'static str) -> SignalAction {
        if self.received.fetch_add(1, Ordering::SeqCst) == 0 {
            tracing::info!(signal, "Shutdown requested, finishing current user");
            self.token.cancel();
            SignalAction::Drain
        } else {
            tracing::warn!(signal, "Second shutdown signal, exiting");
            SignalAction::ForceExit
        }
    }
}

#[cfg(unix)]
struct Signals {
    term: tokio::signal::unix::Signal,
    hup: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl Signals {
    fn register() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};
        Ok(Self {
            term: signal(SignalKind::terminate())?,
            hup: signal(SignalKind::hangup())?,
        })
    }

    async fn next(&mut self) -> std::io::Result<&'static str> {
        tokio::select! {
            res = tokio::signal::ctrl_c() => res.map(|_| "SIGINT"),
            _ = self.term.recv() => Ok("SIGTERM"),
            _ = self.hup.recv() => Ok("SIGHUP"),
        }
    }
}

#[cfg(not(unix))]
struct Signals;

#[cfg(not(unix))]
impl Signals {
    fn register() -> std::io::Result<Self> {
        Ok(Self)
    }

    async fn next(&mut self) -> std::io::Result<&'static str> {
        tokio::signal::ctrl_c().await.map(|_| "Ctrl+C")
    }
}

/// Register signal handlers and return the root token for the process.
///
/// Registration errors are returned before anything is spawned.
pub fn install_signal_handler() -> std::io::Result<CancellationToken> {
    let mut signals = Signals::register()?;
    let state = ShutdownState::default();
    let token = state.token.clone();

    tokio::spawn(async move {
        loop {
            let signal = match signals.next().await {
                Ok(signal) => signal,
                Err(e) => {
                    tracing::error!(error = %e, "Signal listener failed");
                    return;
                }
            };
            if state.on_signal(signal) == SignalAction::ForceExit {
                std::process::exit(130);
            }
        }
    });

    Ok(token)
}
