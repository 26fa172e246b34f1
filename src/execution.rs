use std::{
    any::Any,
    panic::AssertUnwindSafe,
    sync::{atomic::Ordering, Arc},
};

use futures::FutureExt;
use tokio::sync::OwnedSemaphorePermit;

use crate::{
    completion::{Completer, PendingJob},
    error::{Error, StdSyncSendError},
    processor::{AsyncBatchProcessor, BatchProcessor},
    stats::MicroBatchStats,
};

/// Abstracts over sync vs async batch processors.
pub(crate) trait ExecutionMode<P, T, R, E>: Send + Sync + 'static
where
    P: Send + Sync + 'static,
    T: Send + 'static,
    R: Send + 'static,
    E: StdSyncSendError,
{
    /// Run the processor over `batch` in its own task.
    ///
    /// `permit` is released only after every job of the batch is completed.
    fn spawn_batch(
        processor: Arc<P>,
        batch: Vec<PendingJob<T, R, E>>,
        permit: OwnedSemaphorePermit,
        stats: Arc<MicroBatchStats>,
    );
}

/// Sync execution mode - spawns blocking tasks via `spawn_blocking`.
pub(crate) struct SyncExecution;

/// Async execution mode - spawns async tasks via `tokio::spawn`.
pub(crate) struct AsyncExecution;

impl<P, T, R> ExecutionMode<P, T, R, P::Error> for SyncExecution
where
    P: BatchProcessor<T, R> + 'static,
    T: Send + 'static,
    R: Send + 'static,
{
    fn spawn_batch(
        processor: Arc<P>,
        batch: Vec<PendingJob<T, R, P::Error>>,
        permit: OwnedSemaphorePermit,
        stats: Arc<MicroBatchStats>,
    ) {
        tokio::task::spawn_blocking(move || {
            let completers = share_completers(&batch);
            let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| processor.process(batch)));

            settle(completers, outcome, &stats);
            drop(permit);
        });
    }
}

impl<P, T, R> ExecutionMode<P, T, R, P::Error> for AsyncExecution
where
    P: AsyncBatchProcessor<T, R> + 'static,
    T: Send + 'static,
    R: Send + 'static,
{
    fn spawn_batch(
        processor: Arc<P>,
        batch: Vec<PendingJob<T, R, P::Error>>,
        permit: OwnedSemaphorePermit,
        stats: Arc<MicroBatchStats>,
    ) {
        tokio::spawn(async move {
            let completers = share_completers(&batch);
            let outcome = AssertUnwindSafe(processor.process(batch))
                .catch_unwind()
                .await;

            settle(completers, outcome, &stats);
            drop(permit);
        });
    }
}

fn share_completers<T, R, E>(batch: &[PendingJob<T, R, E>]) -> Vec<Completer<R, E>> {
    batch.iter().map(|job| job.completer().share()).collect()
}

/// Completes whatever a failed processor call left pending.
///
/// A failed or panicked call fails the rest of its batch. A successful call
/// completes nothing here, since the processor may still finish jobs it
/// handed off elsewhere. Jobs the processor already completed keep their
/// outcome.
fn settle<R, E: StdSyncSendError>(
    completers: Vec<Completer<R, E>>,
    outcome: std::thread::Result<Result<(), E>>,
    stats: &MicroBatchStats,
) {
    match outcome {
        // jobs still pending belong to the processor; a job dropped without
        // completion resolves its handle to `Unresolved`
        Ok(Ok(())) => {
            let pending = completers.iter().filter(|c| !c.is_completed()).count();

            if pending > 0 {
                log::trace!(
                    "batch processor returned with {} of {} jobs still pending",
                    pending,
                    completers.len()
                );
            }
        }

        Ok(Err(err)) => {
            log::error!("batch processor error: {err}");
            stats.failed_batches.fetch_add(1, Ordering::Relaxed);

            let err = Arc::new(err);
            for c in &completers {
                c.complete(Err(Error::BatchProcessingFailure(err.clone())));
            }
        }

        Err(panic) => {
            let msg = panic_message(panic.as_ref());
            log::error!("batch processor panicked: {msg}");
            stats.failed_batches.fetch_add(1, Ordering::Relaxed);

            for c in &completers {
                c.complete(Err(Error::ProcessorPanicked(msg.clone())));
            }
        }
    }

    stats.in_flight.fetch_sub(1, Ordering::Relaxed);
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        String::from("unknown panic payload")
    }
}
