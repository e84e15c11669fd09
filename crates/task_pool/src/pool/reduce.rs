//! Reduce-mode orchestrator.
//!
//! `ReducePool` workers fold samples into a per-worker running aggregate
//! instead of returning one result per sample. Samples carry no sequence id:
//! no per-item result is ever reassembled, and which worker consumes which
//! sample is deliberately unspecified. On shutdown each worker emits its
//! final aggregate; the pool returns the unmerged list of one aggregate per
//! worker, and merging across workers is the caller's job.

use anyhow::{bail, ensure, Context, Result};
use crossbeam_channel::{Receiver, Sender};
use std::thread;
use tracing::warn;

use super::config::PoolConfig;
use super::worker::{Message, WorkerSet};
use crate::progress::{LogProgress, Progress};
use crate::task::{short_type_name, ReduceTask};

/// Worker pool with per-worker initialization, reduce mode.
///
/// `accumulate()` may be called any number of times; `get_result()` consumes
/// the pool and returns one aggregate per worker.
pub struct ReducePool<T: ReduceTask> {
    backend: ReduceBackend<T>,
    config: PoolConfig,
    progress: Box<dyn Progress>,
}

enum ReduceBackend<T: ReduceTask> {
    /// Exactly one worker requested: accumulate inline in the caller's
    /// thread.
    Single { task: T },
    Threaded {
        workers: WorkerSet<T::Sample, (usize, Result<T::Aggregate>)>,
    },
}

impl<T: ReduceTask + 'static> ReducePool<T> {
    /// Creates a pool with one worker per entry of `worker_args`, using the
    /// default configuration.
    pub fn new<A, F>(factory: F, worker_args: Vec<A>) -> Result<Self>
    where
        A: Send + 'static,
        F: Fn(A) -> Result<T> + Send + Sync + 'static,
    {
        Self::with_config(factory, worker_args, PoolConfig::default())
    }

    /// Creates a pool with one worker per entry of `worker_args`. Same
    /// construction semantics as [`MapPool::with_config`]: eager errors, one
    /// task per worker built inside the worker's own thread.
    ///
    /// [`MapPool::with_config`]: crate::pool::MapPool::with_config
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
            ReduceBackend::Single { task }
        } else {
            let workers = WorkerSet::spawn(
                worker_args,
                move |_worker_id, args| factory(args),
                |worker_id: usize,
                 mut task: T,
                 input: &Receiver<Message<T::Sample>>,
                 output: &Sender<(usize, Result<T::Aggregate>)>| {
                    // On an accumulate error the worker stays in protocol: it
                    // keeps draining samples (without folding them) so the
                    // inbound channel still empties, and reports the error in
                    // place of its aggregate.
                    let mut failure: Option<anyhow::Error> = None;
                    while let Ok(message) = input.recv() {
                        match message {
                            Message::Work(sample) => {
                                if failure.is_some() {
                                    continue;
                                }
                                if let Err(e) = task.accumulate(sample) {
                                    failure = Some(e.context(format!(
                                        "worker {} failed to accumulate a sample",
                                        worker_id
                                    )));
                                }
                            }
                            Message::Stop => break,
                        }
                    }
                    let report = match failure {
                        Some(e) => Err(e),
                        None => Ok(task.into_aggregate()),
                    };
                    let _ = output.send((worker_id, report));
                },
            )?;
            ReduceBackend::Threaded { workers }
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
            ReduceBackend::Single { .. } => 1,
            ReduceBackend::Threaded { workers } => workers.worker_count(),
        }
    }

    /// Submits every sample and blocks until the workers have taken them all
    /// off the inbound channel. Progress is the remaining channel depth.
    ///
    /// An accumulate error inside a worker does not fail this call: the
    /// worker keeps draining, and the error surfaces from [`get_result`].
    /// An error here means a worker died (task panic).
    ///
    /// [`get_result`]: ReducePool::get_result
    pub fn accumulate(&mut self, samples: Vec<T::Sample>) -> Result<()> {
        let label = self.task_label();
        self.progress.set_description(&label);
        match &mut self.backend {
            ReduceBackend::Single { task } => {
                self.progress.begin(samples.len());
                for (seq, sample) in samples.into_iter().enumerate() {
                    task.accumulate(sample)
                        .with_context(|| format!("task failed to accumulate sample {}", seq))?;
                    self.progress.advance(1);
                }
                Ok(())
            }
            ReduceBackend::Threaded { workers } => {
                ensure!(
                    workers.output_is_empty(),
                    "internal error: outbound channel must be empty before accumulate()"
                );
                let total = samples.len();
                if total == 0 {
                    return Ok(());
                }
                self.progress.begin(total);
                for sample in samples {
                    workers.submit(sample)?;
                }

                let mut consumed = 0;
                loop {
                    let depth = workers.pending_input();
                    let now_consumed = total - depth;
                    if now_consumed > consumed {
                        self.progress.advance(now_consumed - consumed);
                        consumed = now_consumed;
                    }
                    if depth == 0 {
                        break;
                    }
                    workers
                        .ensure_live()
                        .context("reduce call cannot complete")?;
                    thread::sleep(self.config.poll_interval);
                }
                Ok(())
            }
        }
    }

    /// Shuts the pool down and returns one aggregate per worker, unmerged.
    /// There is no ordering relationship between the returned aggregates.
    pub fn get_result(self) -> Result<Vec<T::Aggregate>> {
        let poll_interval = self.config.poll_interval;
        match self.backend {
            ReduceBackend::Single { task } => Ok(vec![task.into_aggregate()]),
            ReduceBackend::Threaded { mut workers } => {
                let count = workers.worker_count();
                workers.send_stop_all();

                let mut delivered = vec![false; count];
                let mut reports: Vec<(usize, Result<T::Aggregate>)> = Vec::with_capacity(count);
                while reports.len() < count {
                    match workers.recv_timeout(poll_interval)? {
                        Some((worker_id, report)) => {
                            delivered[worker_id] = true;
                            reports.push((worker_id, report));
                        }
                        None => {
                            // Workers exit right after delivering, so a
                            // finished thread is only a failure if its
                            // aggregate never arrived.
                            for worker_id in 0..count {
                                if !delivered[worker_id] && workers.worker_finished(worker_id) {
                                    match workers.try_recv() {
                                        Some((late_id, report)) => {
                                            delivered[late_id] = true;
                                            reports.push((late_id, report));
                                        }
                                        None => bail!(
                                            "worker {} exited without delivering its aggregate \
                                             (task panicked)",
                                            worker_id
                                        ),
                                    }
                                }
                            }
                        }
                    }
                }
                workers.join_all()?;

                if !workers.output_is_empty() {
                    warn!("outbound channel not empty after collecting all aggregates");
                }

                let mut aggregates = Vec::with_capacity(count);
                for (_, report) in reports {
                    aggregates.push(report?);
                }
                Ok(aggregates)
            }
        }
    }

    /// One-shot reduce: builds the pool with `args` replicated across
    /// `num_workers` workers, accumulates `samples`, and returns the unmerged
    /// per-worker aggregate list.
    pub fn reduce<A, F>(
        num_workers: usize,
        factory: F,
        samples: Vec<T::Sample>,
        args: A,
    ) -> Result<Vec<T::Aggregate>>
    where
        A: Clone + Send + 'static,
        F: Fn(A) -> Result<T> + Send + Sync + 'static,
    {
        ensure!(num_workers >= 1, "num_workers must be at least 1");
        let mut pool = Self::new(factory, vec![args; num_workers])?;
        pool.accumulate(samples)?;
        pool.get_result()
    }

    fn task_label(&self) -> String {
        self.config
            .task_name
            .clone()
            .unwrap_or_else(|| short_type_name::<T>().to_string())
    }
}
