use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio::time::timeout;
use tracing::error;
use tracing::warn;

use crate::BackoffPolicy;
use crate::Error;
use crate::Result;

/// Runs `task` until it succeeds, each attempt bounded by the policy timeout
/// and separated by a doubling delay capped at `max_delay_ms`.
///
/// `max_retries == 0` retries forever.
pub(crate) async fn task_with_timeout_and_exponential_backoff<F, T, P>(
    mut task: F,
    policy: BackoffPolicy,
) -> Result<P>
where
    F: FnMut() -> T,
    T: Future<Output = Result<P>>,
{
    let max_delay = Duration::from_millis(policy.max_delay_ms);
    let mut delay = Duration::from_millis(policy.base_delay_ms).min(max_delay);
    let mut attempts = 0;

    loop {
        let last_error = match timeout(policy.timeout(), task()).await {
            Ok(Ok(r)) => return Ok(r),
            Ok(Err(e)) => {
                warn!(attempt = attempts + 1, "task failed with error: {:?}", e);
                e
            }
            Err(_) => {
                warn!(
                    attempt = attempts + 1,
                    timeout_ms = policy.timeout_ms,
                    "task_with_timeout_and_exponential_backoff timeout"
                );
                Error::RetryTimeout
            }
        };

        attempts += 1;
        if policy.max_retries != 0 && attempts >= policy.max_retries {
            warn!("Task failed after {} attempts", attempts);
            return Err(Error::RetryTaskFailed(format!(
                "task failed after {attempts} attempts, last error: {last_error}"
            )));
        }

        sleep(delay).await;
        delay = (delay * 2).min(max_delay);
    }
}

/// Spawns a fire-and-forget task, logging its error if it fails.
pub(crate) fn spawn_task<Fut>(
    name: &'static str,
    fut: Fut,
) -> JoinHandle<()>
where
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = fut.await {
            error!("spawned task: {name} stopped or encountered an error: {:?}", e);
        }
    })
}
