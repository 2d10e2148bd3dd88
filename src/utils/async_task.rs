use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::warn;

use crate::BackoffPolicy;
use crate::Result;
use crate::WatchError;

/// Runs `task` until it succeeds, sleeping with exponential backoff between attempts.
///
/// Each attempt is bounded by `policy.timeout()`. Gives up with
/// `WatchError::ReconnectExhausted` after `policy.max_retries` attempts (0 = never), with
/// the first non-retryable error, or with `WatchError::Canceled` once `cancel` fires.
pub(crate) async fn task_with_timeout_and_exponential_backoff<F, T, P>(
    task: F,
    policy: BackoffPolicy,
    cancel: &CancellationToken,
) -> Result<P>
where
    F: Fn() -> T,                  // The type of the async function
    T: Future<Output = Result<P>>, // The future returned by the async function
{
    let mut attempts = 0;
    loop {
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(canceled()),
            outcome = timeout(policy.timeout(), task()) => outcome,
        };

        let reason = match outcome {
            Ok(Ok(r)) => return Ok(r),
            Ok(Err(e)) if !e.is_retryable() => return Err(e),
            Ok(Err(e)) => {
                warn!(attempts, error = %e, "Attempt failed");
                e.to_string()
            }
            Err(_) => {
                warn!(attempts, timeout = ?policy.timeout(), "Attempt timed out");
                format!("timed out after {:?}", policy.timeout())
            }
        };

        attempts += 1;
        if policy.max_retries != 0 && attempts >= policy.max_retries {
            warn!("Task failed after {} attempts", attempts);
            return Err(WatchError::ReconnectExhausted { attempts, reason }.into());
        }

        let delay = with_jitter(policy.delay_for(attempts - 1));
        debug!(attempts, ?delay, "Backing off");
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(canceled()),
            _ = sleep(delay) => {}
        }
    }
}

/// Adds up to 10% random jitter so that many watchers do not retry in lockstep.
fn with_jitter(delay: Duration) -> Duration {
    let max_jitter = delay.as_millis() as u64 / 10;
    if max_jitter == 0 {
        return delay;
    }
    delay + Duration::from_millis(rand::thread_rng().gen_range(0..=max_jitter))
}

fn canceled() -> crate::Error {
    WatchError::Canceled {
        reason: "retry canceled".to_string(),
    }
    .into()
}
