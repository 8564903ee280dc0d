use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::{FailureKind, FetchError};

/// Admission control for page tasks. The permit is released when dropped,
/// on every exit path of the task that holds it.
#[derive(Debug, Clone)]
pub struct RateGate {
    semaphore: Arc<Semaphore>,
    limit: usize,
}

impl RateGate {
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Wait for a permit, giving up if `cancel` fires first.
    pub async fn acquire(
        &self,
        cancel: &CancellationToken,
    ) -> Result<OwnedSemaphorePermit, FetchError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FetchError::cancelled()),
            permit = Arc::clone(&self.semaphore).acquire_owned() => permit.map_err(|err| {
                FetchError::new(FailureKind::Transport, format!("rate gate closed: {err}"))
            }),
        }
    }
}
