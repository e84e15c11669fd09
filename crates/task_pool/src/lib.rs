//! Thread-based worker pools with per-worker initialization.
//!
//! The core abstraction is a pool that spawns one worker per entry of a
//! construction-argument list, where each worker builds its own task
//! instance from its own entry. Two execution modes are provided:
//! [`MapPool`] returns one result per sample in submission order, and
//! [`ReducePool`] folds samples into per-worker aggregates. See the
//! [`pool`] module docs for the architecture.
//!
//! For one-off jobs the function front door covers most uses:
//!
//! ```ignore
//! let results = MapPool::map(4, |x: u64, _: &()| Ok(x + 1), samples, ())?;
//! ```

pub mod fileio;
pub mod logging;
pub mod pool;
pub mod progress;
pub mod task;

pub use pool::{MapPool, PoolConfig, PoolConfigBuilder, ReducePool};
pub use progress::{LogProgress, NullProgress, Progress};
pub use task::{FnTask, MapTask, ReduceTask};
