//! Progress reporting collaborators.
//!
//! Pools report progress through the [`Progress`] trait: display only, never
//! control flow. The default sink, [`LogProgress`], writes a periodic line
//! through `tracing`; [`NullProgress`] discards everything.

use std::time::{Duration, Instant};
use tracing::info;

/// Sink for pool progress updates.
pub trait Progress: Send {
    /// Announces the total number of samples for the call about to start.
    fn begin(&mut self, total: usize);

    /// Advances the completed-sample count by `n`.
    fn advance(&mut self, n: usize);

    /// Sets the human-readable label shown alongside progress.
    fn set_description(&mut self, description: &str);
}

/// Logs `description: done/total` through `tracing` at most once per
/// `interval`.
pub struct LogProgress {
    interval: Duration,
    last_emit: Instant,
    description: String,
    done: usize,
    total: usize,
}

impl LogProgress {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_emit: Instant::now(),
            description: "progress".to_string(),
            done: 0,
            total: 0,
        }
    }
}

impl Progress for LogProgress {
    fn begin(&mut self, total: usize) {
        self.total = total;
        self.done = 0;
        self.last_emit = Instant::now();
    }

    fn advance(&mut self, n: usize) {
        self.done += n;
        if self.last_emit.elapsed() >= self.interval && self.done < self.total {
            info!("{}: {}/{}", self.description, self.done, self.total);
            self.last_emit = Instant::now();
        }
    }

    fn set_description(&mut self, description: &str) {
        self.description = description.to_string();
    }
}

/// Discards all progress updates.
pub struct NullProgress;

impl Progress for NullProgress {
    fn begin(&mut self, _total: usize) {}

    fn advance(&mut self, _n: usize) {}

    fn set_description(&mut self, _description: &str) {}
}
