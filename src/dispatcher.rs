use std::sync::{atomic::Ordering, Arc};

use tokio::sync::{mpsc, oneshot, Semaphore};

use crate::{
    completion::PendingJob,
    config::MicroBatchConfig,
    error::StdSyncSendError,
    execution::ExecutionMode,
    stats::MicroBatchStats,
};

pub(crate) enum Request<T, R, E> {
    Batch(Vec<PendingJob<T, R, E>>),
    /// Answered once every batch sent before it has been fully processed.
    Drain(oneshot::Sender<()>),
}

/// Runs cut batches through the processor, in the order they were cut.
pub(crate) async fn dispatch_poller<P, T, R, E, Mode>(
    mut rx: mpsc::UnboundedReceiver<Request<T, R, E>>,
    processor: Arc<P>,
    cfg: MicroBatchConfig,
    stats: Arc<MicroBatchStats>,
) where
    P: Send + Sync + 'static,
    T: Send + 'static,
    R: Send + 'static,
    E: StdSyncSendError,
    Mode: ExecutionMode<P, T, R, E>,
{
    let semaphore = Arc::new(Semaphore::new(cfg.max_parallel));

    while let Some(req) = rx.recv().await {
        match req {
            Request::Batch(batch) => {
                let Ok(permit) = semaphore.clone().acquire_owned().await else {
                    log::error!("dispatcher semaphore closed, dropping {} jobs", batch.len());
                    continue;
                };

                stats.in_flight.fetch_add(1, Ordering::Relaxed);
                Mode::spawn_batch(processor.clone(), batch, permit, stats.clone());
            }

            Request::Drain(done) => {
                // validated config keeps max_parallel within u32
                let _all = semaphore.acquire_many(cfg.max_parallel as u32).await;
                let _ = done.send(());
            }
        }
    }

    log::debug!("batch dispatcher stopped");
}
