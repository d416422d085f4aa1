//! Resource-state polling primitives.
//!
//! Every mutating workflow in this crate observes completion by refreshing a
//! resource until it reports a target state. The poller blocks the calling
//! task, sleeping between refreshes, and fails with a timeout carrying the
//! last observed state once the deadline passes. Provider errors raised by a
//! refresh propagate unmodified.

use std::future::Future;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::watch;
use tokio::time::sleep;

/// Default pause between refreshes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Default deadline for a single wait.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(300);

/// Wire-format progress value reported by a completed snapshot.
pub const SNAPSHOT_COMPLETE: &str = "100%";

/// Tunable polling parameters.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct WaitOptions {
    /// Pause between consecutive refreshes.
    pub poll_interval: Duration,
    /// Wall-clock budget for the whole wait.
    pub timeout: Duration,
}

impl WaitOptions {
    /// Creates options with explicit interval and timeout.
    #[must_use]
    pub const fn new(poll_interval: Duration, timeout: Duration) -> Self {
        Self {
            poll_interval,
            timeout,
        }
    }
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL, DEFAULT_WAIT_TIMEOUT)
    }
}

/// Cooperative cancellation signal checked between polls.
///
/// Cancellation never interrupts an in-flight refresh; it takes effect at
/// the next loop iteration or during the inter-poll sleep.
#[derive(Clone, Debug)]
pub struct CancelToken {
    rx: Option<watch::Receiver<bool>>,
}

impl CancelToken {
    /// Returns a token that can never be cancelled.
    #[must_use]
    pub const fn never() -> Self {
        Self { rx: None }
    }

    /// Returns true once the paired handle has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Resolves once the paired handle cancels; pends forever for
    /// [`CancelToken::never`] tokens or when the handle is dropped without
    /// cancelling.
    pub async fn cancelled(&self) {
        let Some(shared) = self.rx.as_ref() else {
            std::future::pending::<()>().await;
            return;
        };
        let mut rx = shared.clone();
        loop {
            if *rx.borrow() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Owner side of a [`CancelToken`].
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Signals cancellation to every paired token.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// Creates a linked cancellation handle and token.
#[must_use]
pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelToken { rx: Some(rx) })
}

/// Errors raised by a wait.
#[derive(Debug, Error)]
pub enum WaitError<E>
where
    E: std::error::Error + 'static,
{
    /// Raised when the deadline passes before the target state is observed.
    #[error(
        "timeout waiting for {subject} to reach '{target}' (last observed state: {})",
        .last_state.as_deref().unwrap_or("none")
    )]
    Timeout {
        /// Description of the resource being watched.
        subject: String,
        /// State that was being waited for.
        target: String,
        /// Most recent state observed before the deadline, if any refresh
        /// completed.
        last_state: Option<String>,
    },
    /// Raised when the paired cancellation handle fires between polls.
    #[error("wait for {subject} cancelled")]
    Cancelled {
        /// Description of the resource being watched.
        subject: String,
    },
    /// Provider failure surfaced by a refresh, propagated unmodified.
    #[error(transparent)]
    Provider(E),
}

/// Polls `refresh` until it reports `target`.
///
/// `refresh` is a fetcher closure producing the resource's current state
/// string; it is invoked once per iteration. Returns only on success. The
/// `subject` string names the resource in errors.
///
/// # Errors
///
/// Returns [`WaitError::Timeout`] when the deadline passes,
/// [`WaitError::Cancelled`] when `cancel` fires, and
/// [`WaitError::Provider`] when a refresh fails.
pub async fn wait_for_state<F, Fut, E>(
    mut refresh: F,
    target: &str,
    subject: &str,
    options: WaitOptions,
    cancel: &CancelToken,
) -> Result<(), WaitError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<String, E>>,
    E: std::error::Error + 'static,
{
    let deadline = Instant::now() + options.timeout;
    let mut last_state = None;

    while Instant::now() <= deadline {
        if cancel.is_cancelled() {
            return Err(WaitError::Cancelled {
                subject: subject.to_owned(),
            });
        }

        let state = refresh().await.map_err(WaitError::Provider)?;
        if state == target {
            return Ok(());
        }
        last_state = Some(state);

        tokio::select! {
            () = cancel.cancelled() => {
                return Err(WaitError::Cancelled {
                    subject: subject.to_owned(),
                });
            }
            () = sleep(options.poll_interval) => {}
        }
    }

    Err(WaitError::Timeout {
        subject: subject.to_owned(),
        target: target.to_owned(),
        last_state,
    })
}
