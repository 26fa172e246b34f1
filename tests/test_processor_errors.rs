use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use microbatch::{
    AsyncBatchProcessor, Error as MbError, MicroBatchConfig, MicroBatcher, PendingJob,
};
use parking_lot::Mutex;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
enum Error {
    #[error("Error({0})")]
    Error(Arc<anyhow::Error>),

    #[error("Rejected({0})")]
    Rejected(String),
}

impl Error {
    fn other(msg: &'static str) -> Self {
        Self::Error(Arc::new(anyhow::anyhow!(msg)))
    }
}

fn cfg(batch_size: usize) -> MicroBatchConfig {
    MicroBatchConfig::new(batch_size, Duration::from_secs(60))
}

/// Fails the whole call without touching any job.
struct FailingProcessor;

#[async_trait]
impl AsyncBatchProcessor<String, String> for FailingProcessor {
    type Error = Error;

    async fn process(
        &self,
        _batch: Vec<PendingJob<String, String, Error>>,
    ) -> Result<(), Error> {
        Err(Error::other("database unavailable"))
    }
}

#[tokio::test]
async fn test_batch_failure_rejects_all() {
    let _ = env_logger::builder().is_test(true).try_init();

    let b: MicroBatcher<String, String, Error> =
        MicroBatcher::new(FailingProcessor, cfg(2)).unwrap();

    let h1 = b.submit("a".to_string()).unwrap();
    let h2 = b.submit("b".to_string()).unwrap();

    let e1 = h1.await.unwrap_err();
    let e2 = h2.await.unwrap_err();

    match (&e1, &e2) {
        (MbError::BatchProcessingFailure(x), MbError::BatchProcessingFailure(y)) => {
            assert!(Arc::ptr_eq(x, y));
            assert_eq!(x.to_string(), "Error(database unavailable)");
        }
        other => panic!("unexpected errors: {:?}", other),
    }

    assert!(e1.processor_error().is_some());
    assert_eq!(b.stats().failed_batches, 1);

    b.shutdown().await;
}

/// Resolves the first job, then fails.
struct PartialProcessor;

#[async_trait]
impl AsyncBatchProcessor<u32, u32> for PartialProcessor {
    type Error = Error;

    async fn process(&self, batch: Vec<PendingJob<u32, u32, Error>>) -> Result<(), Error> {
        let mut jobs = batch.into_iter();

        if let Some(first) = jobs.next() {
            let value = *first.data();
            first.resolve(value);
        }

        Err(Error::other("failed halfway"))
    }
}

#[tokio::test]
async fn test_partial_failure_keeps_resolved() {
    let b: MicroBatcher<u32, u32, Error> = MicroBatcher::new(PartialProcessor, cfg(3)).unwrap();

    let h1 = b.submit(1).unwrap();
    let h2 = b.submit(2).unwrap();
    let h3 = b.submit(3).unwrap();

    assert_eq!(h1.await.unwrap(), 1);
    assert!(matches!(h2.await, Err(MbError::BatchProcessingFailure(_))));
    assert!(matches!(h3.await, Err(MbError::BatchProcessingFailure(_))));

    b.shutdown().await;
}

/// Rejects odd numbers individually, resolves the rest.
struct ParityProcessor;

#[async_trait]
impl AsyncBatchProcessor<u32, u32> for ParityProcessor {
    type Error = Error;

    async fn process(&self, batch: Vec<PendingJob<u32, u32, Error>>) -> Result<(), Error> {
        for job in batch {
            let value = *job.data();

            if value % 2 == 1 {
                job.reject(Error::Rejected(format!("{} is odd", value)));
            } else {
                job.resolve(value / 2);
            }
        }

        Ok(())
    }
}

#[tokio::test]
async fn test_individual_rejections() {
    let b: MicroBatcher<u32, u32, Error> = MicroBatcher::new(ParityProcessor, cfg(4)).unwrap();

    let handles: Vec<_> = (0..4).map(|i| b.submit(i).unwrap()).collect();
    let mut results = Vec::new();
    for h in handles {
        results.push(h.await);
    }

    assert_eq!(*results[0].as_ref().unwrap(), 0);
    assert_eq!(*results[2].as_ref().unwrap(), 1);

    match &results[1] {
        Err(MbError::JobFailed(Error::Rejected(msg))) => assert_eq!(msg, "1 is odd"),
        other => panic!("unexpected result: {:?}", other),
    }
    assert!(matches!(results[3], Err(MbError::JobFailed(_))));

    assert_eq!(b.stats().failed_batches, 0);
    b.shutdown().await;
}

/// Panics on "boom", echoes anything else.
struct PanickyProcessor;

#[async_trait]
impl AsyncBatchProcessor<String, String> for PanickyProcessor {
    type Error = Error;

    async fn process(
        &self,
        batch: Vec<PendingJob<String, String, Error>>,
    ) -> Result<(), Error> {
        if batch.iter().any(|job| job.data() == "boom") {
            panic!("kaboom");
        }

        for job in batch {
            let data = job.data().clone();
            job.resolve(data);
        }

        Ok(())
    }
}

#[tokio::test]
async fn test_panic_rejects_batch_and_engine_survives() {
    let b: MicroBatcher<String, String, Error> =
        MicroBatcher::new(PanickyProcessor, cfg(2)).unwrap();

    let h1 = b.submit("ok".to_string()).unwrap();
    let h2 = b.submit("boom".to_string()).unwrap();

    match h1.await {
        Err(MbError::ProcessorPanicked(msg)) => assert!(msg.contains("kaboom")),
        other => panic!("unexpected result: {:?}", other),
    }
    assert!(matches!(h2.await, Err(MbError::ProcessorPanicked(_))));

    let h3 = b.submit("fine".to_string()).unwrap();
    let h4 = b.submit("also fine".to_string()).unwrap();

    assert_eq!(h3.await.unwrap(), "fine");
    assert_eq!(h4.await.unwrap(), "also fine");

    let stats = b.stats();
    assert_eq!(stats.failed_batches, 1);
    assert_eq!(stats.batches, 2);

    b.shutdown().await;
}

/// Returns success without completing anything.
struct ForgetfulProcessor;

#[async_trait]
impl AsyncBatchProcessor<u32, u32> for ForgetfulProcessor {
    type Error = Error;

    async fn process(&self, batch: Vec<PendingJob<u32, u32, Error>>) -> Result<(), Error> {
        drop(batch);
        Ok(())
    }
}

#[tokio::test]
async fn test_unresolved_jobs_do_not_hang() {
    let b: MicroBatcher<u32, u32, Error> = MicroBatcher::new(ForgetfulProcessor, cfg(2)).unwrap();

    let h1 = b.submit(1).unwrap();
    let h2 = b.submit(2).unwrap();

    assert!(matches!(h1.await, Err(MbError::Unresolved)));
    assert!(matches!(h2.await, Err(MbError::Unresolved)));

    b.shutdown().await;
}

/// Hands the jobs to a background task and returns before completing any.
struct DeferredProcessor {
    accepted: Arc<Mutex<Vec<bool>>>,
}

#[async_trait]
impl AsyncBatchProcessor<u32, u32> for DeferredProcessor {
    type Error = Error;

    async fn process(&self, batch: Vec<PendingJob<u32, u32, Error>>) -> Result<(), Error> {
        let accepted = self.accepted.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;

            for job in batch {
                let value = *job.data();
                let ok = job.resolve(value * 10);
                accepted.lock().push(ok);
            }
        });

        Ok(())
    }
}

#[tokio::test]
async fn test_deferred_completion_after_ok() {
    let accepted = Arc::new(Mutex::new(Vec::new()));
    let b: MicroBatcher<u32, u32, Error> = MicroBatcher::new(
        DeferredProcessor {
            accepted: accepted.clone(),
        },
        cfg(2),
    )
    .unwrap();

    let h1 = b.submit(1).unwrap();
    let h2 = b.submit(2).unwrap();

    assert_eq!(h1.await.unwrap(), 10);
    assert_eq!(h2.await.unwrap(), 20);

    assert_eq!(accepted.lock().as_slice(), &[true, true]);
    assert_eq!(b.stats().failed_batches, 0);

    b.shutdown().await;
}

#[tokio::test]
async fn test_failure_during_drain_does_not_fail_shutdown() {
    let b: MicroBatcher<String, String, Error> =
        MicroBatcher::new(FailingProcessor, cfg(5)).unwrap();

    let h = b.submit("late".to_string()).unwrap();
    b.shutdown().await;

    assert!(matches!(h.await, Err(MbError::BatchProcessingFailure(_))));
    assert_eq!(b.stats().drain_flushes, 1);
}
