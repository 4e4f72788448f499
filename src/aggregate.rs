use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::{outcome::Outcome, pool::OutcomeStream, report::OutcomeLog};

/// Number of already-waiting outcomes handled per wakeup of the aggregator.
pub const AGGREGATE_BATCH: usize = 64;

/// Collects [`Outcome`]s into a compact, mergeable representation.
///
/// Aggregates only store raw data (counts, latency samples). Derived values
/// such as averages and percentiles are computed when the aggregate is turned
/// into a [`crate::Report`], so several reports can be produced from the same
/// aggregate.
///
/// `merge` must be associative and commutative: partial aggregates may be
/// combined in any order.
pub trait Aggregate
where
    Self: Send + Sync + Debug + Clone,
{
    fn new() -> Self;

    /// Fold a batch of outcomes into this aggregate.
    fn aggregate(&mut self, outcomes: &[Outcome]) {
        outcomes.iter().for_each(|o| self.consume(o));
    }

    /// Fold a single outcome into this aggregate.
    fn consume(&mut self, outcome: &Outcome);

    /// Combine two aggregates into one.
    fn merge(&mut self, other: Self);
}

/// Running counters of a batch run plus the latencies of its successes.
///
/// Dry-run outcomes are counted as `skipped`; everything else is either a
/// success or a failure, so `succeeded + failed == attempted` always holds.
/// Only successful tasks contribute latency samples.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tally {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Milliseconds, in arrival order.
    pub latencies_ms: Vec<f64>,
}

impl Tally {
    pub fn total(&self) -> usize {
        self.attempted + self.skipped
    }
}

impl Aggregate for Tally {
    fn new() -> Self {
        Tally::default()
    }

    fn consume(&mut self, outcome: &Outcome) {
        if outcome.status.is_skipped() {
            self.skipped += 1;
            return;
        }
        self.attempted += 1;
        if outcome.status.is_success() {
            self.succeeded += 1;
            self.latencies_ms.push(outcome.elapsed_ms());
        } else {
            self.failed += 1;
        }
    }

    fn merge(&mut self, other: Self) {
        self.attempted += other.attempted;
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.skipped += other.skipped;
        self.latencies_ms.extend(other.latencies_ms);
    }
}

/// Drain an outcome stream into an aggregate, writing one log line per
/// outcome.
///
/// This is the single consumer of the stream: it alone writes the log and
/// mutates the aggregate, so neither needs locking. Outcomes that are already
/// queued are handled in batches of up to `batch_size` with one flush per
/// batch. A failing log sink is reported once and then skipped; it never
/// stops aggregation.
pub async fn aggregator_task<A: Aggregate>(
    mut outcomes: OutcomeStream,
    log: &mut OutcomeLog,
    batch_size: usize,
) -> A {
    let mut agg = A::new();
    let mut batch = Vec::with_capacity(batch_size);
    let mut log_ok = true;

    // Receive the first outcome or stop once every worker is done
    while let Some(outcome) = outcomes.recv().await {
        batch.push(outcome);
        // Take whatever else is already waiting
        while batch.len() < batch_size {
            match outcomes.try_recv() {
                Some(outcome) => batch.push(outcome),
                None => break,
            }
        }

        if log_ok {
            if let Err(e) = log.write_batch(&batch).await {
                tracing::warn!("Cannot write to {}: {e}; per-task lines disabled", log.target());
                log_ok = false;
            }
        }
        agg.aggregate(&batch);
        batch.clear();
    }

    tracing::debug!(
        "Outcome stream closed after {} started tasks.",
        outcomes.started()
    );
    agg
}
