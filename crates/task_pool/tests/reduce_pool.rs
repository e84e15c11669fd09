//! Reduce-mode pool tests.
//!
//! Tests cover:
//! - One aggregate per worker, unmerged
//! - Exactly-once consumption (no dropped or duplicated samples)
//! - Per-worker construction from the worker's own entry
//! - Multi-call accumulation, empty input, single-worker fallback
//! - Accumulate errors surfacing from get_result()
//! - Worker panics surfaced as errors instead of hanging

use anyhow::{anyhow, Result};
use task_pool::{ReducePool, ReduceTask};

/// Counts how many samples this worker consumed.
struct CounterTask {
    count: u64,
}

impl ReduceTask for CounterTask {
    type Sample = u64;
    type Aggregate = u64;

    fn accumulate(&mut self, _sample: u64) -> Result<()> {
        self.count += 1;
        Ok(())
    }

    fn into_aggregate(self) -> u64 {
        self.count
    }
}

/// Remembers every sample this worker consumed, tagged with its own
/// construction argument.
struct CollectorTask {
    tag: u64,
    seen: Vec<u64>,
}

impl ReduceTask for CollectorTask {
    type Sample = u64;
    type Aggregate = (u64, Vec<u64>);

    fn accumulate(&mut self, sample: u64) -> Result<()> {
        self.seen.push(sample);
        Ok(())
    }

    fn into_aggregate(self) -> (u64, Vec<u64>) {
        (self.tag, self.seen)
    }
}

#[test]
fn test_reduce_counts_sum_to_total() -> Result<()> {
    let counts = ReducePool::reduce(
        4,
        |_: ()| Ok(CounterTask { count: 0 }),
        (0..100).collect(),
        (),
    )?;
    assert_eq!(counts.len(), 4);
    assert_eq!(counts.iter().sum::<u64>(), 100);
    Ok(())
}

#[test]
fn test_reduce_single_worker() -> Result<()> {
    let counts = ReducePool::reduce(
        1,
        |_: ()| Ok(CounterTask { count: 0 }),
        (0..100).collect(),
        (),
    )?;
    assert_eq!(counts, vec![100]);
    Ok(())
}

#[test]
fn test_reduce_consumes_every_sample_exactly_once() -> Result<()> {
    let samples: Vec<u64> = (0..100).collect();
    let mut pool = ReducePool::new(
        |tag: u64| {
            Ok(CollectorTask {
                tag,
                seen: Vec::new(),
            })
        },
        vec![0, 1, 2, 3],
    )?;
    pool.accumulate(samples.clone())?;
    let aggregates = pool.get_result()?;
    assert_eq!(aggregates.len(), 4);

    // Each worker was built from its own entry of the argument list.
    let mut tags: Vec<u64> = aggregates.iter().map(|(tag, _)| *tag).collect();
    tags.sort_unstable();
    assert_eq!(tags, vec![0, 1, 2, 3]);

    // The multiset union of consumed samples is exactly the input.
    let mut consumed: Vec<u64> = aggregates
        .into_iter()
        .flat_map(|(_, seen)| seen)
        .collect();
    consumed.sort_unstable();
    assert_eq!(consumed, samples);
    Ok(())
}

#[test]
fn test_reduce_multiple_accumulate_calls() -> Result<()> {
    let mut pool = ReducePool::new(|_: ()| Ok(CounterTask { count: 0 }), vec![(); 4])?;
    pool.accumulate((0..50).collect())?;
    pool.accumulate((50..100).collect())?;
    let counts = pool.get_result()?;
    assert_eq!(counts.iter().sum::<u64>(), 100);
    Ok(())
}

#[test]
fn test_reduce_empty_samples() -> Result<()> {
    let mut pool = ReducePool::new(|_: ()| Ok(CounterTask { count: 0 }), vec![(); 4])?;
    pool.accumulate(Vec::new())?;
    let counts = pool.get_result()?;
    assert_eq!(counts, vec![0, 0, 0, 0]);
    Ok(())
}

#[test]
fn test_reduce_accumulate_error_surfaces_from_get_result() -> Result<()> {
    struct Fussy {
        count: u64,
    }
    impl ReduceTask for Fussy {
        type Sample = u64;
        type Aggregate = u64;
        fn accumulate(&mut self, sample: u64) -> Result<()> {
            if sample == 7 {
                return Err(anyhow!("refusing sample 7"));
            }
            self.count += 1;
            Ok(())
        }
        fn into_aggregate(self) -> u64 {
            self.count
        }
    }

    let mut pool = ReducePool::new(|_: ()| Ok(Fussy { count: 0 }), vec![(); 4])?;
    // The failing worker keeps draining, so accumulate itself succeeds.
    pool.accumulate((0..20).collect())?;
    let err = pool
        .get_result()
        .err()
        .map(|e| format!("{:#}", e))
        .unwrap_or_default();
    assert!(
        err.contains("failed to accumulate"),
        "unexpected: {}",
        err
    );
    Ok(())
}

#[test]
fn test_reduce_worker_panic_reported_not_hung() -> Result<()> {
    struct Bomb {
        count: u64,
    }
    impl ReduceTask for Bomb {
        type Sample = u64;
        type Aggregate = u64;
        fn accumulate(&mut self, sample: u64) -> Result<()> {
            if sample == 3 {
                panic!("task blew up");
            }
            self.count += 1;
            Ok(())
        }
        fn into_aggregate(self) -> u64 {
            self.count
        }
    }

    let mut pool = ReducePool::new(|_: ()| Ok(Bomb { count: 0 }), vec![(); 4])?;
    // The surviving workers may drain the channel before the dead one is
    // noticed, in which case the error arrives from get_result() instead.
    let err = match pool.accumulate((0..8).collect()) {
        Err(e) => format!("{:#}", e),
        Ok(()) => pool
            .get_result()
            .err()
            .map(|e| format!("{:#}", e))
            .unwrap_or_default(),
    };
    assert!(
        err.contains("exited without delivering"),
        "unexpected: {}",
        err
    );
    Ok(())
}

#[test]
fn test_reduce_empty_worker_args_rejected() {
    let result = ReducePool::new(|_: ()| Ok(CounterTask { count: 0 }), Vec::<()>::new());
    let err = result.err().map(|e| e.to_string()).unwrap_or_default();
    assert!(err.contains("worker_args is empty"), "unexpected: {}", err);
}
