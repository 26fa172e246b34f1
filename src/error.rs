use std::sync::Arc;

use thiserror::Error;

pub trait StdSyncSendError: std::error::Error + Send + Sync + 'static {}
impl<T: std::error::Error + Send + Sync + 'static> StdSyncSendError for T {}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("batch_size must be greater than zero")]
    ZeroBatchSize,

    #[error("max_parallel must be greater than zero")]
    ZeroParallelism,

    #[error("max_parallel ({0}) exceeds the supported maximum ({1})")]
    TooParallel(usize, usize),
}

/// Outcome error delivered to a job's [`JobHandle`](crate::JobHandle), or
/// returned when the batcher itself cannot accept work.
///
/// `E` is the error type of the batch processor.
#[derive(Debug, Error)]
pub enum Error<E> {
    #[error("Cannot submit job, shutdown in progress")]
    ShutdownInProgress,

    #[error("Batch processing failure: {0}")]
    BatchProcessingFailure(Arc<E>),

    #[error("Job failed: {0}")]
    JobFailed(E),

    #[error("Batch processor panicked: {0}")]
    ProcessorPanicked(String),

    #[error("Job was not completed by the batch processor")]
    Unresolved,

    #[error("Batch dispatcher is closed")]
    Closed,

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("No tokio runtime: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),
}

impl<E> Error<E> {
    #[inline]
    pub fn is_shutdown(&self) -> bool {
        matches!(self, Error::ShutdownInProgress)
    }

    /// Error the processor reported for the whole batch or for this job alone.
    pub fn processor_error(&self) -> Option<&E> {
        match self {
            Error::BatchProcessingFailure(err) => Some(err.as_ref()),
            Error::JobFailed(err) => Some(err),
            _ => None,
        }
    }
}
