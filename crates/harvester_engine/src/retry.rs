use std::future::Future;

use engine_logging::engine_warn;
use tokio_util::sync::CancellationToken;

use crate::{FailureKind, FetchError, RetryPolicy};

/// Run `op` until it succeeds, the policy is exhausted, or `cancel` fires.
///
/// Cancellation is checked before each attempt and raced against the delay.
/// Errors that are themselves cancellations stop the loop immediately.
pub async fn retry_with<T, F, Fut>(
    label: &str,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut op: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut attempts: u32 = 0;
    loop {
        if cancel.is_cancelled() {
            return Err(FetchError::cancelled());
        }
        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_cancelled() => return Err(err),
            Err(err) => err,
        };
        attempts += 1;
        if policy.exhausted(attempts) {
            return Err(FetchError::new(
                FailureKind::RetriesExhausted { attempts },
                format!("{label}: {err}"),
            ));
        }
        engine_warn!("{} attempt {} failed: {}", label, attempts, err);
        tokio::select! {
            _ = cancel.cancelled() => return Err(FetchError::cancelled()),
            _ = tokio::time::sleep(policy.delay) => {}
        }
    }
}
