//! Bounded, cancellable polling.
//!
//! Every wait in the session store (cookie confirmation, post-exchange
//! verification, waiting for the server config) goes through
//! [`poll_until`]: at most `max_attempts` probes with a fixed delay between
//! them, stopping early on success or cancellation.

use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;

/// Attempt budget for [`poll_until`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum probes (at least one probe always runs).
    pub max_attempts: u32,
    /// Delay between probes.
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Upper bound on time spent sleeping between probes.
    pub fn max_wait(&self) -> Duration {
        self.delay.saturating_mul(self.attempts() - 1)
    }
}

/// How a [`poll_until`] run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome<T> {
    Succeeded { value: T, attempts: u32 },
    Exhausted { attempts: u32 },
    Cancelled { attempts: u32 },
}

impl<T> RetryOutcome<T> {
    pub fn attempts(&self) -> u32 {
        match self {
            RetryOutcome::Succeeded { attempts, .. }
            | RetryOutcome::Exhausted { attempts }
            | RetryOutcome::Cancelled { attempts } => *attempts,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            RetryOutcome::Succeeded { value, .. } => Some(value),
            _ => None,
        }
    }
}

/// Owning side of a cancellation signal.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    pub fn token(&self) -> CancelToken {
        CancelToken {
            rx: self.tx.subscribe(),
        }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Observing side of a [`CancelHandle`]. Dropping the handle without
/// cancelling leaves the token live forever.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancelled; pends forever if the handle is dropped first.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        let cancelled = rx.wait_for(|cancelled| *cancelled).await.is_ok();
        if !cancelled {
            std::future::pending::<()>().await;
        }
    }

    /// Run `fut` unless cancellation fires first.
    pub async fn run<F: Future>(&self, fut: F) -> Option<F::Output> {
        if self.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            _ = self.cancelled() => None,
            output = fut => Some(output),
        }
    }
}

/// Probe until `probe` returns `Some`, the attempts run out, or `cancel`
/// fires. `probe` receives the 1-based attempt number.
pub async fn poll_until<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: Option<&CancelToken>,
    mut probe: F,
) -> RetryOutcome<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let max_attempts = policy.attempts();

    for attempt in 1..=max_attempts {
        if cancel.is_some_and(CancelToken::is_cancelled) {
            return RetryOutcome::Cancelled {
                attempts: attempt - 1,
            };
        }

        if let Some(value) = probe(attempt).await {
            return RetryOutcome::Succeeded {
                value,
                attempts: attempt,
            };
        }

        if attempt == max_attempts {
            break;
        }

        match cancel {
            Some(token) => {
                tokio::select! {
                    _ = tokio::time::sleep(policy.delay) => {}
                    _ = token.cancelled() => {
                        return RetryOutcome::Cancelled { attempts: attempt };
                    }
                }
            }
            None => tokio::time::sleep(policy.delay).await,
        }
    }

    RetryOutcome::Exhausted {
        attempts: max_attempts,
    }
}
