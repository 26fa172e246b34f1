use std::time::Duration;

use serde_derive::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configuration of a [`MicroBatcher`](crate::MicroBatcher).
///
/// Fixed at construction time.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use microbatch::MicroBatchConfig;
///
/// let cfg = MicroBatchConfig {
///     batch_size: 50,
///     batch_interval: Duration::from_millis(20),
///     ..Default::default()
/// };
///
/// assert!(cfg.validate().is_ok());
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MicroBatchConfig {
    /// Number of jobs that triggers a flush.
    ///
    /// A batch never holds more than this many jobs. Default: 8
    pub batch_size: usize,

    /// Maximum time a partial batch waits before it is flushed.
    ///
    /// Measured from the first job of the current accumulation window, not
    /// from the most recent one. Default: 100ms
    #[serde(rename = "batch_interval_ms", with = "duration_ms")]
    pub batch_interval: Duration,

    /// Number of processor calls allowed to run at the same time.
    ///
    /// With the default of 1 batches are processed one after another, so
    /// results are delivered in batch order.
    pub max_parallel: usize,
}

impl Default for MicroBatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 8,
            batch_interval: Duration::from_millis(100),
            max_parallel: 1,
        }
    }
}

impl MicroBatchConfig {
    pub fn new(batch_size: usize, batch_interval: Duration) -> Self {
        Self {
            batch_size,
            batch_interval,
            ..Default::default()
        }
    }

    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }

        if self.max_parallel == 0 {
            return Err(ConfigError::ZeroParallelism);
        }

        let limit = max_parallel_limit();
        if self.max_parallel > limit {
            return Err(ConfigError::TooParallel(self.max_parallel, limit));
        }

        Ok(())
    }
}

// drain acquires every permit in one call, which takes a u32
fn max_parallel_limit() -> usize {
    tokio::sync::Semaphore::MAX_PERMITS.min(u32::MAX as usize)
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
