//! Maps a slow function over a worker pool and logs the timing.
//!
//! Run with: `cargo run --example sleep_map`

use anyhow::Result;
use std::time::{Duration, Instant};
use task_pool::MapPool;
use tracing::info;

fn sleep_and_add_one(value: u64, _args: &()) -> Result<u64> {
    std::thread::sleep(Duration::from_millis(value * 100));
    Ok(value + 1)
}

fn main() -> Result<()> {
    task_pool::logging::init()?;

    let start = Instant::now();
    let samples: Vec<u64> = (1..10).collect();
    let results = MapPool::map(4, sleep_and_add_one, samples.clone(), ())?;

    info!("samples: {:?}", samples);
    info!("results: {:?}", results);
    info!("elapsed: {:.2?}", start.elapsed());
    Ok(())
}
