//! Micro-batching of individually submitted jobs.
//!
//! Callers [`submit`](MicroBatcher::submit) one job at a time and get a
//! [`JobHandle`] back. Jobs are grouped and handed to a batch processor
//! either when `batch_size` jobs have accumulated or when `batch_interval`
//! has elapsed since the first job of the group, whichever comes first. The
//! processor completes each [`PendingJob`] individually, and the outcome is
//! routed to that job's handle.

mod batcher;
mod completion;
mod dispatcher;
mod execution;

pub mod config;
pub mod error;
pub mod job;
pub mod processor;
pub mod stats;

pub use batcher::MicroBatcher;
pub use completion::{Completer, JobHandle, PendingJob};
pub use config::MicroBatchConfig;
pub use error::{ConfigError, Error, StdSyncSendError};
pub use job::Job;
pub use processor::{AsyncBatchProcessor, BatchProcessor};
pub use stats::Stats;
