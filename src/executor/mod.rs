//! Executor — how a single task is carried out.
//!
//! A [`TaskExecutor`] takes one [`TaskDescriptor`] and turns it into exactly one
//! [`Outcome`]. Executors never return errors: a refused connection, a 500
//! from the remote service or an unreadable payload all end up in the
//! outcome's [`Status`] and `detail`, so one bad task can never stall the pool.
//!
//! The crate provides three interchangeable executors:
//! - [`HttpExecutor`]: POSTs the payload to an endpoint with a shared client.
//! - [`ProcessExecutor`]: hands the payload to an external program.
//! - [`DryRun`]: performs no I/O at all, for validating task discovery.
//!
//! [`Backend`] tags them so the variant can be picked from configuration.
//!
//! # Deadlines
//!
//! Each call receives the task's own deadline (`None` for no limit). Executors
//! may use it to bound their I/O, but the pool enforces it regardless: a task
//! still running when its deadline passes is dropped and reported with
//! [`Status::TimedOut`]. Executors must therefore release what they hold on
//! drop (`kill_on_drop` for child processes, scoped file handles).
pub mod dry;
pub mod http;
pub mod process;

pub use dry::DryRun;
pub use http::HttpExecutor;
pub use process::ProcessExecutor;

use std::future::Future;
use tokio::time::Instant;

use crate::{
    outcome::{Outcome, Status},
    task::TaskDescriptor,
};

/// Performs the side effect of one task.
///
/// Implementations are shared by all workers of a pool, so any connection pool
/// or client they hold is used concurrently and must be `Sync`.
pub trait TaskExecutor
where
    Self: Send + Sync + Sized,
{
    /// Execute `task`, finishing before `deadline` if one is given.
    ///
    /// Elapsed time is measured around the whole call, failure paths
    /// included.
    fn execute(
        &self,
        task: &TaskDescriptor,
        deadline: Option<Instant>,
    ) -> impl Future<Output = Outcome> + Send;
}

/// Time left until `deadline`, or `None` when there is no deadline.
pub(crate) fn remaining(deadline: Option<Instant>) -> Option<std::time::Duration> {
    deadline.map(|d| d.saturating_duration_since(Instant::now()))
}

/// The executor variant chosen for a run.
pub enum Backend {
    Http(HttpExecutor),
    Process(ProcessExecutor),
    DryRun(DryRun),
}

impl Backend {
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Http(_) => "http",
            Backend::Process(_) => "process",
            Backend::DryRun(_) => "dry-run",
        }
    }
}

impl TaskExecutor for Backend {
    async fn execute(&self, task: &TaskDescriptor, deadline: Option<Instant>) -> Outcome {
        match self {
            Backend::Http(e) => e.execute(task, deadline).await,
            Backend::Process(e) => e.execute(task, deadline).await,
            Backend::DryRun(e) => e.execute(task, deadline).await,
        }
    }
}

/// Marks a task as failed before it reached the remote side.
pub(crate) fn infra_failure(
    task: &TaskDescriptor,
    started: Instant,
    reason: impl std::fmt::Display,
) -> Outcome {
    Outcome::new(task, started.elapsed(), Status::Failed, reason.to_string())
}
