use async_trait::async_trait;

use crate::{completion::PendingJob, error::StdSyncSendError};

/// Processes a batch of jobs on tokio's blocking thread pool.
///
/// Every job in `batch` must be resolved or rejected. Returning `Err` fails
/// every job that has not been completed yet with
/// [`Error::BatchProcessingFailure`](crate::Error::BatchProcessingFailure).
pub trait BatchProcessor<T, R>: Send + Sync {
    type Error: StdSyncSendError;

    fn process(&self, batch: Vec<PendingJob<T, R, Self::Error>>) -> Result<(), Self::Error>;
}

/// Async flavour of [`BatchProcessor`], run as a tokio task.
#[async_trait]
pub trait AsyncBatchProcessor<T, R>: Send + Sync {
    type Error: StdSyncSendError;

    async fn process(&self, batch: Vec<PendingJob<T, R, Self::Error>>)
        -> Result<(), Self::Error>;
}
