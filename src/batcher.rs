use std::{
    collections::VecDeque,
    fmt,
    sync::{atomic::Ordering, Arc},
};

use parking_lot::Mutex;
use tokio::{
    runtime,
    sync::{mpsc, oneshot},
    task::JoinHandle,
};

use crate::{
    completion::{JobHandle, PendingJob},
    config::MicroBatchConfig,
    dispatcher::{dispatch_poller, Request},
    error::{Error, StdSyncSendError},
    execution::{AsyncExecution, ExecutionMode, SyncExecution},
    job::Job,
    processor::{AsyncBatchProcessor, BatchProcessor},
    stats::{FlushReason, MicroBatchStats, Stats},
};

/// The armed batch-interval timer.
struct Deadline {
    epoch: u64,
    task: JoinHandle<()>,
}

struct State<T, R, E> {
    queue: VecDeque<PendingJob<T, R, E>>,
    deadline: Option<Deadline>,
    epoch: u64,
    shutting_down: bool,
}

struct Inner<T, R, E> {
    cfg: MicroBatchConfig,
    state: Mutex<State<T, R, E>>,
    tx: mpsc::UnboundedSender<Request<T, R, E>>,
    runtime: runtime::Handle,
    stats: Arc<MicroBatchStats>,
}

/// Groups individually submitted jobs into batches for a batch processor.
///
/// A batch is cut as soon as `batch_size` jobs are queued, or once
/// `batch_interval` has passed since the first job of a partial batch.
/// Every submitter gets back a [`JobHandle`] resolving to the outcome of its
/// own job.
///
/// Cloning is cheap; all clones feed the same queue.
///
/// # Example
///
/// ```rust,ignore
/// let batcher: MicroBatcher<String, usize, MyError> =
///     MicroBatcher::new(LenProcessor, MicroBatchConfig::default())?;
///
/// let len = batcher.submit_job("hello".to_string()).await?;
/// batcher.shutdown().await;
/// ```
pub struct MicroBatcher<T, R, E> {
    inner: Arc<Inner<T, R, E>>,
}

impl<T, R, E> Clone for MicroBatcher<T, R, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T, R, E> fmt::Debug for MicroBatcher<T, R, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MicroBatcher")
            .field("cfg", &self.inner.cfg)
            .field("pending", &self.pending())
            .field("shutting_down", &self.is_shutting_down())
            .finish()
    }
}

impl<T, R, E> MicroBatcher<T, R, E>
where
    T: Send + 'static,
    R: Send + 'static,
    E: StdSyncSendError,
{
    /// Creates a batcher driving an async processor.
    ///
    /// Must be called from within a tokio runtime; the batcher keeps using
    /// that runtime afterwards, so jobs may be submitted from any thread.
    pub fn new<P>(processor: P, cfg: MicroBatchConfig) -> Result<Self, Error<E>>
    where
        P: AsyncBatchProcessor<T, R, Error = E> + 'static,
    {
        Self::build::<P, AsyncExecution>(processor, cfg)
    }

    /// Creates a batcher driving a blocking processor, run on tokio's
    /// blocking thread pool.
    pub fn new_sync<P>(processor: P, cfg: MicroBatchConfig) -> Result<Self, Error<E>>
    where
        P: BatchProcessor<T, R, Error = E> + 'static,
    {
        Self::build::<P, SyncExecution>(processor, cfg)
    }

    fn build<P, Mode>(processor: P, cfg: MicroBatchConfig) -> Result<Self, Error<E>>
    where
        P: Send + Sync + 'static,
        Mode: ExecutionMode<P, T, R, E>,
    {
        cfg.validate()?;
        let runtime = runtime::Handle::try_current()?;

        let stats = Arc::new(MicroBatchStats::default());
        let (tx, rx) = mpsc::unbounded_channel();

        runtime.spawn(dispatch_poller::<P, T, R, E, Mode>(
            rx,
            Arc::new(processor),
            cfg,
            stats.clone(),
        ));

        Ok(Self {
            inner: Arc::new(Inner {
                cfg,
                state: Mutex::new(State {
                    queue: VecDeque::with_capacity(cfg.batch_size),
                    deadline: None,
                    epoch: 0,
                    shutting_down: false,
                }),
                tx,
                runtime,
                stats,
            }),
        })
    }

    /// Queues a job without waiting for its result.
    ///
    /// If this job fills the batch, the batch is cut before `submit`
    /// returns. Fails with [`Error::ShutdownInProgress`] once
    /// [`shutdown`](Self::shutdown) has been called; the job is then never
    /// queued.
    pub fn submit(&self, data: T) -> Result<JobHandle<R, E>, Error<E>> {
        let mut state = self.inner.state.lock();

        if state.shutting_down {
            self.inner.stats.rejected.fetch_add(1, Ordering::Relaxed);
            return Err(Error::ShutdownInProgress);
        }

        let (pending, handle) = PendingJob::new(Job::new(data));
        state.queue.push_back(pending);
        self.inner.stats.submitted.fetch_add(1, Ordering::Relaxed);

        if state.queue.len() >= self.inner.cfg.batch_size {
            self.inner.flush(&mut state, FlushReason::Size);
        } else if state.deadline.is_none() {
            self.inner.arm_deadline(&mut state);
        }

        Ok(handle)
    }

    /// Submits a job and waits for its outcome.
    pub async fn submit_job(&self, data: T) -> Result<R, Error<E>> {
        self.submit(data)?.await
    }

    /// Stops accepting jobs and drains the queue.
    ///
    /// Returns once every job accepted before the call has been completed,
    /// including batches that were already being processed. Calling it again
    /// is harmless.
    pub async fn shutdown(&self) {
        {
            let mut state = self.inner.state.lock();
            state.shutting_down = true;

            if let Some(deadline) = state.deadline.take() {
                deadline.task.abort();
            }

            if !state.queue.is_empty() {
                log::debug!("draining {} queued jobs", state.queue.len());
            }

            while !state.queue.is_empty() {
                self.inner.flush(&mut state, FlushReason::Drain);
            }
        }

        let (done_tx, done_rx) = oneshot::channel();
        if self.inner.tx.send(Request::Drain(done_tx)).is_err() {
            return;
        }

        if done_rx.await.is_err() {
            log::warn!("batch dispatcher stopped before the drain finished");
        }
    }
}

impl<T, R, E> MicroBatcher<T, R, E> {
    /// Number of jobs queued but not yet cut into a batch.
    pub fn pending(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.inner.state.lock().shutting_down
    }

    pub fn config(&self) -> &MicroBatchConfig {
        &self.inner.cfg
    }

    pub fn stats(&self) -> Stats {
        let queued = self.pending();
        self.inner.stats.snapshot(&self.inner.cfg, queued)
    }
}

impl<T, R, E> Inner<T, R, E>
where
    T: Send + 'static,
    R: Send + 'static,
    E: StdSyncSendError,
{
    /// Cuts one batch from the front of the queue and hands it to the
    /// dispatcher. Called with the state lock held.
    fn flush(self: &Arc<Self>, state: &mut State<T, R, E>, reason: FlushReason) {
        if let Some(deadline) = state.deadline.take() {
            deadline.task.abort();
        }

        let count = self.cfg.batch_size.min(state.queue.len());
        if count > 0 {
            let batch: Vec<_> = state.queue.drain(..count).collect();

            log::debug!("flushing batch of {} jobs ({:?})", count, reason);
            self.stats.on_flush(reason);

            if let Err(mpsc::error::SendError(req)) = self.tx.send(Request::Batch(batch)) {
                log::error!("batch dispatcher is gone, failing {} jobs", count);

                if let Request::Batch(batch) = req {
                    for job in batch {
                        job.completer().complete(Err(Error::Closed));
                    }
                }
            }
        }

        if !state.queue.is_empty() && !state.shutting_down {
            self.arm_deadline(state);
        }
    }

    fn arm_deadline(self: &Arc<Self>, state: &mut State<T, R, E>) {
        state.epoch = state.epoch.wrapping_add(1);

        let epoch = state.epoch;
        let interval = self.cfg.batch_interval;
        let weak = Arc::downgrade(self);

        let task = self.runtime.spawn(async move {
            tokio::time::sleep(interval).await;

            if let Some(inner) = weak.upgrade() {
                inner.on_deadline(epoch);
            }
        });

        state.deadline = Some(Deadline { epoch, task });
    }

    fn on_deadline(self: &Arc<Self>, epoch: u64) {
        let mut state = self.state.lock();

        // a flush since this timer was armed has already cancelled it
        match &state.deadline {
            Some(deadline) if deadline.epoch == epoch => {}
            _ => return,
        }

        state.deadline = None;
        self.flush(&mut state, FlushReason::Time);
    }
}

impl<T, R, E> Drop for Inner<T, R, E> {
    fn drop(&mut self) {
        if let Some(deadline) = self.state.get_mut().deadline.take() {
            deadline.task.abort();
        }
    }
}
