use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use microbatch::{
    AsyncBatchProcessor, BatchProcessor, MicroBatchConfig, MicroBatcher, PendingJob,
};
use thiserror::Error;

#[derive(Debug, Error, Clone)]
enum Error {
    #[error("Error({0})")]
    Error(Arc<anyhow::Error>),
}

struct Squares;

#[async_trait]
impl AsyncBatchProcessor<i32, i64> for Squares {
    type Error = Error;

    async fn process(&self, batch: Vec<PendingJob<i32, i64, Error>>) -> Result<(), Error> {
        let values: Vec<i32> = batch.iter().map(|job| *job.data()).collect();
        println!("---> [i32; {}] {:?}", values.len(), values);

        for job in batch {
            let v = *job.data() as i64;
            job.resolve(v * v);
        }

        Ok(())
    }
}

struct Shouter;

impl BatchProcessor<String, String> for Shouter {
    type Error = Error;

    fn process(&self, batch: Vec<PendingJob<String, String, Error>>) -> Result<(), Error> {
        println!("---> [String; {}]", batch.len());

        if batch.iter().any(|job| job.data().is_empty()) {
            return Err(Error::Error(Arc::new(anyhow::anyhow!("empty string in batch"))));
        }

        for job in batch {
            let loud = job.data().to_uppercase();
            job.resolve(loud);
        }

        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let squares: MicroBatcher<i32, i64, Error> = MicroBatcher::new(
        Squares,
        MicroBatchConfig::new(16, Duration::from_millis(10)),
    )?;

    let handles = (1..100i32)
        .map(|i| squares.submit(i))
        .collect::<Result<Vec<_>, _>>()?;

    let mut sum = 0;
    for h in handles {
        sum += h.await?;
    }
    println!("sum of squares: {}", sum);

    let shouter: MicroBatcher<String, String, Error> =
        MicroBatcher::new_sync(Shouter, MicroBatchConfig::new(3, Duration::from_millis(50)))?;

    let words = ["micro", "batching", "", "works"];
    let handles = words
        .iter()
        .map(|w| shouter.submit(w.to_string()))
        .collect::<Result<Vec<_>, _>>()?;

    for (word, h) in words.iter().zip(handles) {
        match h.await {
            Ok(loud) => println!("{:?} -> {:?}", word, loud),
            Err(err) => println!("{:?} failed: {}", word, err),
        }
    }

    println!("shutdown");
    squares.shutdown().await;
    shouter.shutdown().await;

    println!("stats: {:?}", squares.stats());
    println!("[done]");

    Ok(())
}
