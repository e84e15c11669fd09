//! Configuration for pool behaviour.
//!
//! `PoolConfig` stores the knobs shared by [`MapPool`] and [`ReducePool`].
//! The worker count is never configured here: it is always the length of the
//! construction-argument list passed to the pool.
//!
//! Example:
//! ```ignore
//! let config = PoolConfig::builder()
//!     .batch_size(64)
//!     .task_name("decode")
//!     .build();
//! ```
//!
//! [`MapPool`]: crate::pool::MapPool
//! [`ReducePool`]: crate::pool::ReducePool

use std::time::Duration;

/// Configuration shared by both pool orchestrators.
#[derive(Clone)]
pub struct PoolConfig {
    /// Cap on the in-flight inbound depth during map submission. The queue is
    /// topped up by one batch whenever it falls below this value. `0` submits
    /// every sample up front.
    pub batch_size: usize,
    /// Human-readable label used in progress output only. Defaults to the
    /// task's type name.
    pub task_name: Option<String>,
    /// How long drain loops wait on the outbound channel before re-checking
    /// worker liveness. Not an error timeout, just a polling interval.
    pub poll_interval: Duration,
    /// Minimum time between periodic progress log lines.
    pub progress_interval: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            batch_size: 0,
            task_name: None,
            poll_interval: Duration::from_millis(10),
            progress_interval: Duration::from_secs(5),
        }
    }
}

impl PoolConfig {
    pub fn builder() -> PoolConfigBuilder {
        PoolConfigBuilder::default()
    }
}

/// Builder for [`PoolConfig`] with method chaining.
#[derive(Default)]
pub struct PoolConfigBuilder {
    config: PoolConfig,
}

impl PoolConfigBuilder {
    /// Set the in-flight submission cap. `0` (the default) submits every
    /// sample up front; a smaller value bounds memory at the cost of extra
    /// bookkeeping.
    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size;
        self
    }

    /// Set the label used in progress output.
    pub fn task_name(mut self, name: impl Into<String>) -> Self {
        self.config.task_name = Some(name.into());
        self
    }

    /// Set the drain polling interval.
    ///
    /// - Too low: more wakeups on an idle channel.
    /// - Too high: slower detection of a dead worker.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Set the minimum time between progress log lines.
    pub fn progress_interval(mut self, interval: Duration) -> Self {
        self.config.progress_interval = interval;
        self
    }

    pub fn build(self) -> PoolConfig {
        self.config
    }
}
