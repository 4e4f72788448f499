//! batchrun — a bounded-concurrency batch task runner.
//!
//! batchrun takes a finite list of discrete units of work (files to submit,
//! synthetic records to inject), runs each one as a network call or external
//! command under its own timeout, with a fixed number in flight, and
//! summarizes how it went: success and failure counts plus latency
//! percentiles.
//!
//! # Architecture
//!
//! ```text
//! TaskSource → bounded task queue → N × TaskExecutor → outcome queue → Aggregate → Report
//! ```
//!
//! - [`TaskSource`]: a lazy, finite iterator of [`TaskDescriptor`]s. See
//!   [`source::FsSource`] and [`source::SyntheticSource`].
//! - [`TaskExecutor`]: performs one task and always returns an [`Outcome`], never
//!   an error. HTTP, external-process and dry-run executors are provided.
//! - [`WorkerPool`]: keeps exactly `concurrency` executions in flight, applies
//!   per-task deadlines and funnels outcomes into a single stream.
//! - [`Aggregate`]: a mergeable tally of outcomes (counts and raw latencies).
//! - [`Report`]: derived statistics ([`RunSummary`]: percentiles, min, max, average).
//! - [`Reporter`]: sends a report somewhere (stdout as text or JSON).
//! - [`Runner`]: builds all of the above from a [`RunConfig`] and runs them.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use batchrun::{
//!     RunSummary, WorkerPool,
//!     aggregate::{Tally, aggregator_task},
//!     executor::DryRun,
//!     report::OutcomeLog,
//!     source::FsSource,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let source = FsSource::new("/data/records", "*.json")?;
//!     let (_stop_tx, stop_rx) = tokio::sync::watch::channel(false);
//!
//!     let outcomes = WorkerPool::builder()
//!         .concurrency(8)
//!         .build()
//!         .run(source, Arc::new(DryRun), stop_rx);
//!
//!     let mut log = OutcomeLog::stdout();
//!     let tally: Tally = aggregator_task(outcomes, &mut log, 64).await;
//!     print!("{}", RunSummary::from(tally));
//!     Ok(())
//! }
//! ```
//!
//! # Feature flags
//! - `internals`: expose the pool's building blocks (producer, workers, single
//!   task runner). Unstable.

/// Outcome aggregation
pub mod aggregate;
/// Configuration object and its TOML form
pub mod config;
/// Setup errors
pub mod error;
/// How individual tasks are executed
pub mod executor;
/// Results of individual tasks
pub mod outcome;
/// The worker pool
pub mod pool;
/// Reports and Reporters
pub mod report;
/// Glue that turns a configuration into a finished run
pub mod runner;
/// Where tasks come from
pub mod source;
/// Units of work
pub mod task;
/// Credential resolution
pub mod token;

pub use aggregate::Aggregate;
pub use config::RunConfig;
pub use error::SetupError;
pub use executor::TaskExecutor;
pub use outcome::{Outcome, Status};
pub use pool::WorkerPool;
pub use report::{Report, Reporter, RunSummary};
pub use runner::Runner;
pub use source::TaskSource;
pub use task::{Payload, TaskDescriptor};
