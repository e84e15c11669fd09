//! Map-mode orchestrator.
//!
//! `MapPool` distributes a finite sequence of samples across its workers and
//! returns one result per sample, in submission order. Samples are tagged
//! with a sequence id at submission; workers return `(sequence_id, result)`
//! pairs in whatever order they complete, and the orchestrator sorts the
//! pairs back into submission order before stripping the ids.
//!
//! Submission is optionally batched: with a non-zero `batch_size` the
//! orchestrator keeps the inbound queue topped up to one batch instead of
//! enqueueing everything up front, bounding memory for large sample lists.
//! An inbound queue observed empty while samples remain means the workers
//! are starving; this is logged as a warning and otherwise ignored.

use anyhow::{ensure, Context, Result};
use crossbeam_channel::{Receiver, Sender};
use std::sync::Arc;
use tracing::warn;

use super::config::PoolConfig;
use super::worker::{Message, WorkerSet};
use crate::progress::{LogProgress, Progress};
use crate::task::{short_type_name, FnTask, MapTask};

/// Worker pool with per-worker initialization, map mode.
///
/// Each worker owns one task instance, built inside the worker's thread from
/// that worker's entry of the construction-argument list. A list of length 1
/// selects the in-process fallback: no threads, no channels, identical
/// output.
///
/// `process()` may be called any number of times; `finish()` consumes the
/// pool, so use after shutdown is a compile error.
pub struct MapPool<T: MapTask> {
    backend: MapBackend<T>,
    config: PoolConfig,
    progress: Box<dyn Progress>,
}

enum MapBackend<T: MapTask> {
    /// Exactly one worker requested: run the task inline in the caller's
    /// thread.
    Single { task: T },
    Threaded {
        workers: WorkerSet<(usize, T::Sample), (usize, Result<T::Output>)>,
    },
}

impl<T: MapTask + 'static> MapPool<T> {
    /// Creates a pool with one worker per entry of `worker_args`, using the
    /// default configuration.
    pub fn new<A, F>(factory: F, worker_args: Vec<A>) -> Result<Self>
    where
        A: Send + 'static,
        F: Fn(A) -> Result<T> + Send + Sync + 'static,
    {
        Self::with_config(factory, worker_args, PoolConfig::default())
    }

    /// Creates a pool with one worker per entry of `worker_args`.
    ///
    /// Workers start immediately and block on the inbound channel. Construction
    /// errors (an empty argument list, or `factory` failing in any worker) are
    /// returned here, before the pool accepts work.
    pub fn with_config<A, F>(factory: F, mut worker_args: Vec<A>, config: PoolConfig) -> Result<Self>
    where
        A: Send + 'static,
        F: Fn(A) -> Result<T> + Send + Sync + 'static,
    {
        ensure!(
            !worker_args.is_empty(),
            "a pool needs at least one worker: worker_args is empty"
        );

        let backend = if worker_args.len() == 1 {
            let task = factory(worker_args.remove(0))
                .context("failed to construct task for single-worker pool")?;
            MapBackend::Single { task }
        } else {
            let workers = WorkerSet::spawn(
                worker_args,
                move |_worker_id, args| factory(args),
                |worker_id: usize,
                 mut task: T,
                 input: &Receiver<Message<(usize, T::Sample)>>,
                 output: &Sender<(usize, Result<T::Output>)>| {
                    while let Ok(Message::Work((seq, sample))) = input.recv() {
                        let result = task.process(sample).with_context(|| {
                            format!("worker {} failed on sample {}", worker_id, seq)
                        });
                        if output.send((seq, result)).is_err() {
                            break;
                        }
                    }
                },
            )?;
            MapBackend::Threaded { workers }
        };

        let progress = Box::new(LogProgress::new(config.progress_interval));
        Ok(Self {
            backend,
            config,
            progress,
        })
    }

    /// Replaces the progress sink. The default logs through `tracing`.
    pub fn set_progress(&mut self, progress: Box<dyn Progress>) {
        self.progress = progress;
    }

    /// Number of workers in the pool.
    pub fn worker_count(&self) -> usize {
        match &self.backend {
            MapBackend::Single { .. } => 1,
            MapBackend::Threaded { workers } => workers.worker_count(),
        }
    }

    /// Maps `samples` through the pool, returning results in submission
    /// order regardless of which worker produced which result.
    ///
    /// The first per-sample task error is returned after every sample has
    /// been accounted for, so the channels are drained and the pool remains
    /// usable. An error is also returned if a worker dies (task panic): the
    /// pool can then only be torn down.
    pub fn process(&mut self, samples: Vec<T::Sample>) -> Result<Vec<T::Output>> {
        let label = self.task_label();
        self.progress.set_description(&label);
        match &mut self.backend {
            MapBackend::Single { task } => {
                process_inline(task, samples, self.progress.as_mut())
            }
            MapBackend::Threaded { workers } => {
                process_parallel::<T>(workers, samples, &self.config, self.progress.as_mut())
            }
        }
    }

    /// Shuts the pool down: one sentinel per worker, then joins them all.
    /// Returns an error if a worker panicked at any point.
    pub fn finish(self) -> Result<()> {
        match self.backend {
            MapBackend::Single { .. } => Ok(()),
            MapBackend::Threaded { mut workers } => {
                ensure!(
                    workers.output_is_empty(),
                    "internal error: outbound channel must be empty before finish()"
                );
                workers.shutdown()
            }
        }
    }

    fn task_label(&self) -> String {
        self.config
            .task_name
            .clone()
            .unwrap_or_else(|| short_type_name::<T>().to_string())
    }
}

impl<F, A, S, R> MapPool<FnTask<F, A, S, R>>
where
    F: Fn(S, &A) -> Result<R> + Send + Sync + 'static,
    A: Clone + Send + 'static,
    S: Send + 'static,
    R: Send + 'static,
{
    /// Builds a pool of `num_workers` identical function tasks. `args` are
    /// the fixed trailing arguments bound to the function, replicated across
    /// all workers; pass `()` when the function takes none.
    pub fn with_fn(num_workers: usize, func: F, args: A) -> Result<Self> {
        ensure!(num_workers >= 1, "num_workers must be at least 1");
        let func = Arc::new(func);
        Self::new(
            move |a| Ok(FnTask::new(func.clone(), a)),
            vec![args; num_workers],
        )
    }

    /// One-shot map: builds a function pool, processes `samples`, shuts the
    /// pool down, and returns the flat result list in input order.
    pub fn map(num_workers: usize, func: F, samples: Vec<S>, args: A) -> Result<Vec<R>> {
        let mut pool = Self::with_fn(num_workers, func, args)?;
        let results = pool.process(samples)?;
        pool.finish()?;
        Ok(results)
    }
}

/// Single-worker fallback: same output as the threaded path, sequentially.
fn process_inline<T: MapTask>(
    task: &mut T,
    samples: Vec<T::Sample>,
    progress: &mut dyn Progress,
) -> Result<Vec<T::Output>> {
    progress.begin(samples.len());
    let mut results = Vec::with_capacity(samples.len());
    for (seq, sample) in samples.into_iter().enumerate() {
        let output = task
            .process(sample)
            .with_context(|| format!("task failed on sample {}", seq))?;
        results.push(output);
        progress.advance(1);
    }
    Ok(results)
}

fn process_parallel<T: MapTask>(
    workers: &WorkerSet<(usize, T::Sample), (usize, Result<T::Output>)>,
    samples: Vec<T::Sample>,
    config: &PoolConfig,
    progress: &mut dyn Progress,
) -> Result<Vec<T::Output>> {
    ensure!(
        workers.input_is_empty() && workers.output_is_empty(),
        "internal error: channels must be empty before submission"
    );

    let total = samples.len();
    if total == 0 {
        return Ok(Vec::new());
    }
    progress.begin(total);

    let batch = if config.batch_size == 0 {
        total
    } else {
        config.batch_size.min(total)
    };

    let mut pending = samples.into_iter().enumerate();
    let mut submitted = 0;
    for _ in 0..batch {
        if let Some(item) = pending.next() {
            workers.submit(item)?;
            submitted += 1;
        }
    }

    let mut tagged: Vec<(usize, Result<T::Output>)> = Vec::with_capacity(total);
    while tagged.len() < total {
        // Top up the inbound queue whenever its depth falls below one batch.
        if submitted < total && workers.pending_input() < batch {
            if workers.input_is_empty() {
                warn!(
                    "inbound queue ran empty with {} samples unsubmitted; \
                     consider a larger batch size",
                    total - submitted
                );
            }
            for _ in 0..batch {
                match pending.next() {
                    Some(item) => {
                        workers.submit(item)?;
                        submitted += 1;
                    }
                    None => break,
                }
            }
        }

        while let Some(out) = workers.try_recv() {
            tagged.push(out);
            progress.advance(1);
        }
        if tagged.len() < total {
            match workers.recv_timeout(config.poll_interval)? {
                Some(out) => {
                    tagged.push(out);
                    progress.advance(1);
                }
                None => workers.ensure_live().context("map call cannot complete")?,
            }
        }
    }

    // Restore submission order.
    tagged.sort_unstable_by_key(|(seq, _)| *seq);
    let mut results = Vec::with_capacity(total);
    for (_, result) in tagged {
        results.push(result?);
    }
    Ok(results)
}
