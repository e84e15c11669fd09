//! Worker runtime and shared pool scaffolding.
//!
//! [`WorkerSet`] owns the pieces both orchestrators have in common: the
//! inbound/outbound channels, the worker thread handles, startup readiness,
//! the liveness watchdog and the sentinel shutdown protocol. The map and
//! reduce pools differ only in the loop each worker runs and in how the
//! orchestrating thread drains the outbound channel.
//!
//! # Worker lifecycle
//!
//! Each worker thread:
//! 1. Builds its task by calling the init closure with its own entry of the
//!    construction-argument list. The task is created inside the thread, so
//!    only the factory crosses the spawn boundary, never a task value.
//! 2. Reports construction success or failure on a startup channel. The
//!    spawning thread collects every report and tears the whole set down if
//!    any worker failed, before the pool accepts work.
//! 3. Enters the mode-specific run loop: receive a message, process it, send
//!    the result. The loop ends on a [`Message::Stop`] sentinel or when the
//!    inbound channel disconnects.
//!
//! A panic inside the task kills its worker thread. The watchdog methods
//! ([`WorkerSet::ensure_live`], [`WorkerSet::worker_finished`]) let the
//! orchestrator notice the dead worker and fail the call instead of waiting
//! forever on a result that can no longer arrive.

use anyhow::{anyhow, bail, Context, Result};
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// How often the spawning thread re-checks worker health while waiting for
/// startup reports.
const STARTUP_POLL: Duration = Duration::from_millis(50);

/// Inbound channel message. `Stop` is the reserved shutdown sentinel: each
/// worker consumes exactly one and exits its loop.
pub(crate) enum Message<P> {
    Work(P),
    Stop,
}

/// A fixed set of worker threads sharing one inbound and one outbound
/// channel.
pub(crate) struct WorkerSet<In, Out> {
    input_tx: Option<Sender<Message<In>>>,
    output_rx: Receiver<Out>,
    handles: Vec<thread::JoinHandle<()>>,
}

impl<In, Out> WorkerSet<In, Out>
where
    In: Send + 'static,
    Out: Send + 'static,
{
    /// Spawns one worker thread per entry of `worker_args`.
    ///
    /// `init` builds the task (exactly once per worker, inside the worker's
    /// thread); `run` is the mode-specific message loop. Returns an error if
    /// any worker fails to construct its task; in that case every thread that
    /// did start is shut down before returning.
    pub(crate) fn spawn<A, T, I, R>(worker_args: Vec<A>, init: I, run: R) -> Result<Self>
    where
        A: Send + 'static,
        T: 'static,
        I: Fn(usize, A) -> Result<T> + Send + Sync + 'static,
        R: Fn(usize, T, &Receiver<Message<In>>, &Sender<Out>) + Send + Sync + 'static,
    {
        let (input_tx, input_rx) = unbounded::<Message<In>>();
        let (output_tx, output_rx) = unbounded::<Out>();
        let (ready_tx, ready_rx) = bounded::<(usize, Result<()>)>(worker_args.len());

        let init = Arc::new(init);
        let run = Arc::new(run);

        let mut handles = Vec::with_capacity(worker_args.len());
        for (worker_id, args) in worker_args.into_iter().enumerate() {
            let input_rx = input_rx.clone();
            let output_tx = output_tx.clone();
            let ready_tx = ready_tx.clone();
            let init = init.clone();
            let run = run.clone();
            let handle = thread::Builder::new()
                .name(format!("task-pool-worker-{}", worker_id))
                .spawn(move || {
                    let task = match init(worker_id, args) {
                        Ok(task) => {
                            let _ = ready_tx.send((worker_id, Ok(())));
                            task
                        }
                        Err(e) => {
                            let _ = ready_tx.send((worker_id, Err(e)));
                            return;
                        }
                    };
                    drop(ready_tx);
                    run(worker_id, task, &input_rx, &output_tx);
                })
                .with_context(|| format!("failed to spawn worker thread {}", worker_id))?;
            handles.push(handle);
        }
        drop(ready_tx);

        let set = Self {
            input_tx: Some(input_tx),
            output_rx,
            handles,
        };
        // On error the set is dropped here: dropping the input sender
        // disconnects the channel, so workers that did start exit their loop
        // and get joined.
        set.await_ready(ready_rx)?;
        Ok(set)
    }

    /// Blocks until every worker has reported task construction success.
    fn await_ready(&self, ready_rx: Receiver<(usize, Result<()>)>) -> Result<()> {
        let mut reported = vec![false; self.handles.len()];
        let mut pending = self.handles.len();
        while pending > 0 {
            match ready_rx.recv_timeout(STARTUP_POLL) {
                Ok((worker_id, result)) => {
                    reported[worker_id] = true;
                    pending -= 1;
                    result.with_context(|| {
                        format!("worker {} failed to construct its task", worker_id)
                    })?;
                }
                Err(RecvTimeoutError::Timeout) => {
                    // A worker that panicked while constructing its task never
                    // reports; without this check we would wait forever.
                    while let Ok((worker_id, result)) = ready_rx.try_recv() {
                        reported[worker_id] = true;
                        pending -= 1;
                        result.with_context(|| {
                            format!("worker {} failed to construct its task", worker_id)
                        })?;
                    }
                    for (worker_id, handle) in self.handles.iter().enumerate() {
                        if !reported[worker_id] && handle.is_finished() {
                            bail!(
                                "worker {} exited during startup without reporting \
                                 (task construction panicked)",
                                worker_id
                            );
                        }
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    bail!("all workers exited during startup");
                }
            }
        }
        Ok(())
    }

    pub(crate) fn worker_count(&self) -> usize {
        self.handles.len()
    }

    /// Sends one work item on the shared inbound channel.
    pub(crate) fn submit(&self, item: In) -> Result<()> {
        let input_tx = self
            .input_tx
            .as_ref()
            .ok_or_else(|| anyhow!("worker set used after shutdown"))?;
        input_tx
            .send(Message::Work(item))
            .map_err(|_| anyhow!("inbound channel disconnected: all workers have exited"))
    }

    /// Number of messages currently queued on the inbound channel.
    pub(crate) fn pending_input(&self) -> usize {
        self.input_tx.as_ref().map_or(0, Sender::len)
    }

    pub(crate) fn input_is_empty(&self) -> bool {
        self.input_tx.as_ref().map_or(true, Sender::is_empty)
    }

    pub(crate) fn output_is_empty(&self) -> bool {
        self.output_rx.is_empty()
    }

    pub(crate) fn try_recv(&self) -> Option<Out> {
        self.output_rx.try_recv().ok()
    }

    /// Waits up to `timeout` for the next outbound message. `Ok(None)` means
    /// the wait timed out; the caller should check liveness and retry.
    pub(crate) fn recv_timeout(&self, timeout: Duration) -> Result<Option<Out>> {
        match self.output_rx.recv_timeout(timeout) {
            Ok(out) => Ok(Some(out)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                bail!("outbound channel disconnected: all workers have exited")
            }
        }
    }

    /// Errors if any worker thread has exited. Only meaningful while no
    /// sentinel has been sent: before shutdown, the one way a worker exits is
    /// a panic inside its task.
    pub(crate) fn ensure_live(&self) -> Result<()> {
        for (worker_id, handle) in self.handles.iter().enumerate() {
            if handle.is_finished() {
                bail!(
                    "worker {} exited without delivering its results \
                     (task panicked); the pool can no longer complete this call",
                    worker_id
                );
            }
        }
        Ok(())
    }

    /// Whether the given worker thread has exited.
    pub(crate) fn worker_finished(&self, worker_id: usize) -> bool {
        self.handles[worker_id].is_finished()
    }

    /// Sends one `Stop` sentinel per worker.
    pub(crate) fn send_stop_all(&self) {
        if let Some(input_tx) = &self.input_tx {
            for _ in 0..self.handles.len() {
                let _ = input_tx.send(Message::Stop);
            }
        }
    }

    /// Drops the inbound sender and joins every worker thread. A worker that
    /// panicked at any point is reported as an error after all joins.
    pub(crate) fn join_all(&mut self) -> Result<()> {
        // Disconnecting the channel stops any worker whose sentinel was
        // consumed by a thread that died earlier.
        self.input_tx.take();
        let mut panicked = None;
        for (worker_id, handle) in self.handles.drain(..).enumerate() {
            if handle.join().is_err() && panicked.is_none() {
                panicked = Some(worker_id);
            }
        }
        if let Some(worker_id) = panicked {
            bail!("worker {} panicked before shutting down cleanly", worker_id);
        }
        Ok(())
    }

    /// Graceful shutdown: one sentinel per worker, then join them all.
    pub(crate) fn shutdown(&mut self) -> Result<()> {
        self.send_stop_all();
        self.join_all()
    }
}

impl<In, Out> Drop for WorkerSet<In, Out> {
    fn drop(&mut self) {
        // Disconnect so workers blocked on recv exit their loop.
        self.input_tx.take();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}
