//! One-shot completion of individual jobs.
//!
//! Every accepted job owns a [`Completer`] (handed to the batch processor
//! inside a [`PendingJob`]) and a [`JobHandle`] (handed to the submitter).
//! The completer's slot is shared with the dispatcher, so whichever side
//! completes first wins and every later attempt is ignored.

use std::{
    fmt,
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{ready, Context, Poll},
};

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::{error::Error, job::Job};

type Outcome<R, E> = Result<R, Error<E>>;

struct Slot<R, E> {
    tx: Mutex<Option<oneshot::Sender<Outcome<R, E>>>>,
}

/// Delivers the outcome of one job to its submitter, exactly once.
pub struct Completer<R, E> {
    slot: Arc<Slot<R, E>>,
}

impl<R, E> Completer<R, E> {
    pub(crate) fn new() -> (Self, JobHandle<R, E>) {
        let (tx, rx) = oneshot::channel();
        let completer = Self {
            slot: Arc::new(Slot {
                tx: Mutex::new(Some(tx)),
            }),
        };

        (completer, JobHandle { rx })
    }

    /// Second reference to the same slot, kept by the dispatcher while the
    /// processor owns the original.
    pub(crate) fn share(&self) -> Self {
        Self {
            slot: self.slot.clone(),
        }
    }

    /// Returns `false` if the job had already been completed.
    pub(crate) fn complete(&self, outcome: Outcome<R, E>) -> bool {
        let Some(tx) = self.slot.tx.lock().take() else {
            return false;
        };

        if tx.send(outcome).is_err() {
            log::trace!("job handle dropped before completion");
        }

        true
    }

    #[inline]
    pub fn resolve(self, result: R) -> bool {
        self.complete(Ok(result))
    }

    #[inline]
    pub fn reject(self, err: E) -> bool {
        self.complete(Err(Error::JobFailed(err)))
    }

    #[inline]
    pub fn is_completed(&self) -> bool {
        self.slot.tx.lock().is_none()
    }
}

impl<R, E> fmt::Debug for Completer<R, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completer")
            .field("completed", &self.is_completed())
            .finish()
    }
}

/// A queued job together with the means to complete it.
///
/// This is what a batch processor receives. Consuming [`resolve`](Self::resolve)
/// or [`reject`](Self::reject) delivers the outcome to the submitter.
pub struct PendingJob<T, R, E> {
    job: Job<T>,
    completer: Completer<R, E>,
}

impl<T, R, E> PendingJob<T, R, E> {
    pub(crate) fn new(job: Job<T>) -> (Self, JobHandle<R, E>) {
        let (completer, handle) = Completer::new();
        (Self { job, completer }, handle)
    }

    #[inline]
    pub fn job(&self) -> &Job<T> {
        &self.job
    }

    #[inline]
    pub fn data(&self) -> &T {
        self.job.data()
    }

    #[inline]
    pub fn resolve(self, result: R) -> bool {
        self.completer.resolve(result)
    }

    #[inline]
    pub fn reject(self, err: E) -> bool {
        self.completer.reject(err)
    }

    #[inline]
    pub fn is_completed(&self) -> bool {
        self.completer.is_completed()
    }

    pub fn into_parts(self) -> (Job<T>, Completer<R, E>) {
        (self.job, self.completer)
    }

    pub(crate) fn completer(&self) -> &Completer<R, E> {
        &self.completer
    }
}

impl<T: fmt::Debug, R, E> fmt::Debug for PendingJob<T, R, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingJob")
            .field("job", &self.job)
            .field("completed", &self.is_completed())
            .finish()
    }
}

/// Resolves once with the outcome of the submitted job.
///
/// If the job is dropped without ever being completed, the handle resolves
/// to [`Error::Unresolved`] instead of waiting forever.
#[must_use = "a job handle does nothing unless awaited"]
pub struct JobHandle<R, E> {
    rx: oneshot::Receiver<Outcome<R, E>>,
}

impl<R, E> Future for JobHandle<R, E> {
    type Output = Outcome<R, E>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Poll::Ready(match ready!(Pin::new(&mut self.rx).poll(cx)) {
            Ok(outcome) => outcome,
            Err(_) => Err(Error::Unresolved),
        })
    }
}

impl<R, E> fmt::Debug for JobHandle<R, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobHandle").finish_non_exhaustive()
    }
}
