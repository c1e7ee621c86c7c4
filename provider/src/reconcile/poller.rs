//! Convergence poller

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::ProviderError;
use crate::utils::{calc_jittered_backoff, CooldownOptions};

/// Result of one poll attempt
#[derive(Debug)]
pub enum Attempt<T> {
    /// Condition satisfied
    Done(T),

    /// Not there yet; the string describes the observed state
    Retryable(T, String),

    /// Stop polling immediately
    Fatal(ProviderError),
}

/// Poller options
#[derive(Debug, Clone, Default)]
pub struct PollOptions {
    /// Delay between fetches
    pub backoff: CooldownOptions,
}

/// Fetch repeatedly until `fetch` reports done, a fatal error, or `timeout` elapses.
///
/// `on_observed` sees every non-fatal observation, including the final one.
/// Cancelling `cancel` aborts both an in-flight fetch and the sleep between
/// fetches.
pub async fn await_condition<T, F, Fut, O>(
    options: &PollOptions,
    timeout: Duration,
    cancel: &CancellationToken,
    mut fetch: F,
    mut on_observed: O,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Attempt<T>>,
    O: FnMut(&T),
{
    let started = Instant::now();
    // An unrepresentable deadline means wait until done or cancelled
    let deadline = started.checked_add(timeout);
    let mut attempt: u32 = 0;

    loop {
        attempt = attempt.saturating_add(1);

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(ProviderError::Cancelled(format!(
                    "polling cancelled after {} attempt(s)",
                    attempt - 1
                )));
            }
            outcome = fetch() => outcome,
        };

        let reason = match outcome {
            Attempt::Fatal(e) => {
                warn!("Polling stopped on attempt {}: {}", attempt, e);
                return Err(e);
            }
            Attempt::Done(value) => {
                on_observed(&value);
                info!(
                    "Condition reached after {} attempt(s) in {:?}",
                    attempt,
                    started.elapsed()
                );
                return Ok(value);
            }
            Attempt::Retryable(value, reason) => {
                on_observed(&value);
                reason
            }
        };

        let now = Instant::now();
        if deadline.is_some_and(|deadline| now >= deadline) {
            let elapsed = now.duration_since(started);
            warn!("Timed out after {:?} ({} attempts): {}", elapsed, attempt, reason);
            return Err(ProviderError::Timeout {
                elapsed,
                last: reason,
            });
        }

        let mut delay = calc_jittered_backoff(&options.backoff, attempt - 1);
        if let Some(deadline) = deadline {
            delay = delay.min(deadline.duration_since(now));
        }
        debug!("Attempt {}: {}; retrying in {:?}", attempt, reason, delay);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(ProviderError::Cancelled(format!(
                    "polling cancelled after {} attempt(s): {}",
                    attempt, reason
                )));
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
