//! Worker pools with per-worker initialization.
//!
//! A standard homogeneous pool initializes every worker identically. The
//! pools in this module instead take a list of per-worker construction
//! arguments: one worker is spawned per entry, and each worker builds its
//! own task instance from its own entry, inside its own thread. This is what
//! lets a batch pipeline give each worker distinct state, such as a distinct
//! accelerator index for model evaluation across several devices.
//!
//! # Architecture
//!
//! ```text
//!                 caller
//!                   │ samples + per-worker args
//!                   ↓
//!         ┌──────────────────────┐
//!         │ MapPool / ReducePool │ ←──── PoolConfig (batch size, labels, ...)
//!         └──────────┬───────────┘
//!                    │ inbound channel: Work(..) / Stop sentinel
//!        ┌───────────┼───────────┐
//!        ↓           ↓           ↓
//!    [worker 0]  [worker 1]  [worker N-1]     one task each, built in-thread
//!        │           │           │
//!        └───────────┼───────────┘
//!                    │ outbound channel: tagged results / aggregates
//!                    ↓
//!              ordered results (map)
//!              per-worker aggregates (reduce)
//! ```
//!
//! # Module structure
//!
//! ```text
//! src/pool/
//! ├── mod.rs       # Public exports + architecture docs
//! ├── config.rs    # PoolConfig and builder
//! ├── worker.rs    # WorkerSet: spawn/readiness, liveness, sentinel shutdown
//! ├── map.rs       # MapPool: sequence ids, batched submission, reordering
//! └── reduce.rs    # ReducePool: per-worker aggregates
//! ```
//!
//! # Execution modes
//!
//! - **Map**: every sample produces one result; results come back in
//!   submission order no matter which worker produced them or when.
//! - **Reduce**: workers fold samples into private running aggregates;
//!   shutdown yields one aggregate per worker, unmerged.
//!
//! A construction-argument list of length 1 selects the in-process fallback
//! for either mode: the task runs synchronously in the caller's thread with
//! identical output, no threads or channels involved.
//!
//! # Lifecycle
//!
//! `process()`/`accumulate()` may cycle any number of times. Shutdown is a
//! single terminal `finish()`/`get_result()` call that consumes the pool,
//! sends each worker a stop sentinel, and joins every thread. Dropping a
//! pool without the terminal call disconnects the channels and joins the
//! workers, so threads never leak.

mod config;
mod map;
mod reduce;
mod worker;

pub use config::{PoolConfig, PoolConfigBuilder};
pub use map::MapPool;
pub use reduce::ReducePool;
