//! Bounded retry with per-outcome cooldowns.
//!
//! The caller supplies the operation and a classifier. After each attempt
//! the classifier decides whether to stop (`Accept` / `Abort`) or to wait
//! and go again (`Retry`). Nothing is slept after the final attempt.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How many attempts a retried operation gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
}

impl RetryPolicy {
    pub fn new(max_attempts: usize) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }
}

/// The classifier's decision about one attempt's result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Keep this result.
    Accept,
    /// Discard this result, wait, and try again.
    Retry {
        cooldown: Duration,
        reason: &'static str,
    },
    /// Stop immediately with this result.
    Abort,
}

/// How a retried operation ended.
#[derive(Debug)]
pub enum RetryOutcome<T, E> {
    /// A result was accepted.
    Succeeded { value: T, attempts: usize },
    /// The operation failed and the failure was not retryable.
    Aborted { error: E, attempts: usize },
    /// Every attempt asked for a retry.
    Exhausted { attempts: usize },
}

impl<T, E> RetryOutcome<T, E> {
    /// Attempts made before the loop ended.
    pub fn attempts(&self) -> usize {
        match self {
            Self::Succeeded { attempts, .. }
            | Self::Aborted { attempts, .. }
            | Self::Exhausted { attempts } => *attempts,
        }
    }

    fn finish(result: Result<T, E>, attempts: usize) -> Self {
        match result {
            Ok(value) => Self::Succeeded { value, attempts },
            Err(error) => Self::Aborted { error, attempts },
        }
    }
}

/// Run `op` until the classifier stops it or the policy runs out.
///
/// `op` receives the zero-based attempt number. A terminal verdict
/// (`Accept` or `Abort`) ends the loop with the attempt's own result, so an
/// accepted `Err` still surfaces as `Aborted`.
pub async fn retry<T, E, F, Fut, C>(policy: RetryPolicy, classify: C, mut op: F) -> RetryOutcome<T, E>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&Result<T, E>) -> Verdict,
{
    let max_attempts = policy.max_attempts.max(1);

    for attempt in 0..max_attempts {
        let result = op(attempt).await;
        let attempts = attempt + 1;

        match classify(&result) {
            Verdict::Accept => {
                debug!(attempts, "Attempt accepted");
                return RetryOutcome::finish(result, attempts);
            }
            Verdict::Abort => {
                warn!(attempts, "Attempt failed, not retrying");
                return RetryOutcome::finish(result, attempts);
            }
            Verdict::Retry { cooldown, reason } => {
                if attempts == max_attempts {
                    warn!(attempts, reason, "Final attempt failed, giving up");
                    break;
                }
                info!(
                    attempt = attempts,
                    max_attempts,
                    reason,
                    cooldown_secs = cooldown.as_secs_f32(),
                    "Retrying after cooldown"
                );
                tokio::time::sleep(cooldown).await;
            }
        }
    }

    RetryOutcome::Exhausted {
        attempts: max_attempts,
    }
}
