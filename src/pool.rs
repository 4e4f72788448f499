//! WorkerPool — bounded-concurrency execution of a task source.
//!
//! The pool is an explicit pipeline with one owner per channel:
//!
//! ```text
//! TaskSource ──(producer)──▶ bounded task queue ──▶ N workers ──▶ outcome queue ──▶ aggregator
//! ```
//!
//! 1. A producer drains the [`TaskSource`] on a blocking thread and pushes
//!    descriptors into a bounded queue (`concurrency * queue_factor` slots).
//!    When the queue is full the producer blocks, so discovery never runs far
//!    ahead of execution.
//! 2. Exactly `concurrency` worker tasks pull from that queue. Each runs one
//!    task at a time under its own deadline, so at most `concurrency`
//!    executions are ever in flight, and one task timing out never affects
//!    its siblings.
//! 3. Every started task yields exactly one [`Outcome`], including tasks that
//!    time out or whose executor panics. Workers own the only senders of the
//!    outcome queue; it closes once the last worker exits, which happens only
//!    after the task queue is closed and drained.
//!
//! Admission follows the source's order; completion order is whatever the
//! executors make it.
//!
//! # Stopping early
//! Sending `true` on the stop channel makes the producer stop reading the
//! source and the workers discard queued tasks instead of starting them.
//! Tasks already running finish or time out normally, and the outcome stream
//! still closes cleanly.

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use tokio::sync::{mpsc, watch};
use typed_builder::TypedBuilder;

use crate::{executor::TaskExecutor, outcome::Outcome, source::TaskSource};
use internals::*;

/// Task queue slots per worker.
pub const QUEUE_FACTOR: usize = 2;

/// A fixed-size pool of workers.
///
/// ```rust,ignore
/// let pool = WorkerPool::builder()
///     .concurrency(8)
///     .timeout(Some(Duration::from_secs(30)))
///     .build();
/// let mut outcomes = pool.run(source, Arc::new(executor), stop_rx);
/// while let Some(outcome) = outcomes.recv().await { /* ... */ }
/// ```
#[derive(Debug, Clone, TypedBuilder)]
pub struct WorkerPool {
    /// Number of tasks executing at once. Zero is treated as one.
    #[builder(default = num_cpus::get())]
    pub concurrency: usize,
    /// Per-task deadline, measured from the moment a worker starts the task.
    #[builder(default)]
    pub timeout: Option<Duration>,
    #[builder(default = QUEUE_FACTOR)]
    pub queue_factor: usize,
}

impl WorkerPool {
    /// Start draining `source` through `executor`.
    ///
    /// Must be called from within a Tokio runtime. The returned stream yields
    /// outcomes in completion order and ends once every started task has
    /// reported.
    pub fn run<S, E>(
        &self,
        source: S,
        executor: Arc<E>,
        stop: watch::Receiver<bool>,
    ) -> OutcomeStream
    where
        S: TaskSource,
        E: TaskExecutor + 'static,
    {
        let workers = self.concurrency.max(1);
        let capacity = workers * self.queue_factor.max(1);
        let (task_tx, task_rx) = mpsc::channel(capacity);
        let (outcome_tx, outcome_rx) = mpsc::channel(capacity);
        let started = Arc::new(AtomicUsize::new(0));

        tracing::info!("Spawning task producer (queue capacity {capacity})...");
        spawn_producer(source, task_tx, stop.clone());

        tracing::info!("Spawning {workers} workers...");
        let ctx = WorkerContext {
            tasks: Arc::new(tokio::sync::Mutex::new(task_rx)),
            outcomes: outcome_tx,
            stop,
            started: started.clone(),
            timeout: self.timeout,
        };
        spawn_workers(ctx, workers, executor);

        OutcomeStream {
            rx: outcome_rx,
            started,
        }
    }
}

/// Receiving end of a running pool.
pub struct OutcomeStream {
    rx: mpsc::Receiver<Outcome>,
    started: Arc<AtomicUsize>,
}

impl OutcomeStream {
    /// Next outcome, or `None` once all workers are done.
    pub async fn recv(&mut self) -> Option<Outcome> {
        self.rx.recv().await
    }

    /// An outcome that is already waiting, without suspending.
    pub fn try_recv(&mut self) -> Option<Outcome> {
        self.rx.try_recv().ok()
    }

    /// Number of tasks handed to an executor so far.
    pub fn started(&self) -> usize {
        self.started.load(Ordering::Acquire)
    }
}

#[cfg(feature = "internals")]
pub use internals::*;

/// Building blocks of [`WorkerPool::run`], kept separate so they can be
/// exercised on their own.
mod internals {
    use std::panic::AssertUnwindSafe;

    use futures::FutureExt;
    use tokio::{sync::Mutex, task::JoinHandle, time::Instant};

    use super::*;
    use crate::task::TaskDescriptor;

    /// State shared by all workers of one run.
    #[derive(Clone)]
    pub struct WorkerContext {
        /// Shared end of the task queue; a worker holds the lock only while
        /// waiting for its next task.
        pub tasks: Arc<Mutex<mpsc::Receiver<TaskDescriptor>>>,
        pub outcomes: mpsc::Sender<Outcome>,
        pub stop: watch::Receiver<bool>,
        pub started: Arc<AtomicUsize>,
        pub timeout: Option<Duration>,
    }

    /// Feed `source` into the task queue from a blocking thread.
    ///
    /// Returns the number of tasks queued. Dropping `tx` at the end closes
    /// the queue, which is what lets idle workers exit.
    pub fn spawn_producer<S: TaskSource>(
        source: S,
        tx: mpsc::Sender<TaskDescriptor>,
        stop: watch::Receiver<bool>,
    ) -> JoinHandle<usize> {
        tokio::task::spawn_blocking(move || {
            let mut queued = 0;
            for task in source {
                if *stop.borrow() {
                    tracing::info!("Stop requested, no further tasks will be queued.");
                    break;
                }
                if tx.blocking_send(task).is_err() {
                    tracing::debug!("Task queue closed, producer exiting.");
                    break;
                }
                queued += 1;
            }
            tracing::debug!("Producer finished after queueing {queued} tasks.");
            queued
        })
    }

    /// Spawn `workers` Tokio tasks that pull from the task queue until it is
    /// closed and drained.
    ///
    /// Each handle resolves to the number of tasks that worker executed.
    pub fn spawn_workers<E>(
        ctx: WorkerContext,
        workers: usize,
        executor: Arc<E>,
    ) -> Vec<JoinHandle<usize>>
    where
        E: TaskExecutor + 'static,
    {
        (0..workers)
            .map(|i| {
                let ctx = ctx.clone();
                let executor = executor.clone();
                tokio::spawn(async move {
                    tracing::debug!("Worker {i} started.");
                    let mut executed = 0;

                    loop {
                        let next = ctx.tasks.lock().await.recv().await;
                        let Some(task) = next else {
                            break;
                        };
                        if *ctx.stop.borrow() {
                            tracing::debug!("Worker {i} discarding task {} after stop.", task.index);
                            continue;
                        }

                        ctx.started.fetch_add(1, Ordering::AcqRel);
                        let outcome = run_task(executor.as_ref(), &task, ctx.timeout).await;
                        executed += 1;

                        if ctx.outcomes.send(outcome).await.is_err() {
                            tracing::warn!("Worker {i}: outcome receiver dropped, stopping.");
                            break;
                        }
                    }

                    tracing::debug!("Worker {i} shutting down after {executed} tasks.");
                    executed
                })
            })
            .collect()
    }

    /// Run a single task under its deadline, always producing an outcome.
    ///
    /// A deadline overrun drops the executor's future (releasing whatever it
    /// held) and reports [`crate::Status::TimedOut`]; a panic is reported as
    /// an infrastructure failure.
    pub async fn run_task<E: TaskExecutor>(
        executor: &E,
        task: &TaskDescriptor,
        timeout: Option<Duration>,
    ) -> Outcome {
        let started = Instant::now();
        // a timeout too large to represent is no deadline at all
        let deadline = timeout.and_then(|t| started.checked_add(t));
        let call = AssertUnwindSafe(executor.execute(task, deadline)).catch_unwind();

        let result = match deadline {
            Some(deadline) => match tokio::time::timeout_at(deadline, call).await {
                Ok(result) => result,
                Err(_) => return Outcome::timed_out(task, started.elapsed()),
            },
            None => call.await,
        };

        match result {
            Ok(outcome) => outcome,
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!("Executor panicked on task {}: {reason}", task.index);
                Outcome::failed(task, started.elapsed(), format!("executor panicked: {reason}"))
            }
        }
    }
}
