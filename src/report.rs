use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::{fmt, future::Future, io, path::Path};
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};

use crate::{
    aggregate::{Aggregate, Tally},
    error::SetupError,
    outcome::Outcome,
};

/// The processed form of an [`Aggregate`].
///
/// Reports are pure data: they derive averages, percentiles and totals from
/// the raw aggregate and carry no I/O of their own. Printing or exporting a
/// report is the job of a [`Reporter`].
pub trait Report<A>
where
    Self: Send + Sync + fmt::Debug + From<A> + Serialize + DeserializeOwned,
    A: Aggregate,
{
}

/// Consumes a [`Report`] and sends it somewhere (stdout, a file, a service).
pub trait Reporter<A: Aggregate, R: Report<A>> {
    fn report(&self, report: &R) -> impl Future<Output = Result<(), Box<dyn std::error::Error>>>;
}

/// The `p`-th percentile of an ascending slice, by linear interpolation
/// between the two nearest ranks.
///
/// For `n` samples the position is `p/100 * (n-1)`; a fractional position
/// interpolates between its floor and ceiling neighbours. `p <= 0` yields the
/// minimum and `p >= 100` the maximum. Returns `None` for an empty slice.
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    let (first, last) = (sorted.first()?, sorted.last()?);
    if p <= 0.0 {
        return Some(*first);
    }
    if p >= 100.0 {
        return Some(*last);
    }

    let pos = p / 100.0 * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    if lower == upper {
        return Some(sorted[lower]);
    }
    let weight = pos - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

/// Latency statistics over successful tasks, in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    pub count: usize,
    pub avg: f64,
    pub min: f64,
    pub p50: f64,
    pub p90: f64,
    pub p99: f64,
    pub max: f64,
}

impl LatencyStats {
    /// `None` when there were no successful tasks.
    pub fn from_sorted(sorted: &[f64]) -> Option<Self> {
        let (min, max) = (*sorted.first()?, *sorted.last()?);
        Some(Self {
            count: sorted.len(),
            avg: sorted.iter().sum::<f64>() / sorted.len() as f64,
            min,
            p50: percentile(sorted, 50.0)?,
            p90: percentile(sorted, 90.0)?,
            p99: percentile(sorted, 99.0)?,
            max,
        })
    }
}

/// Final summary of a run.
///
/// Dry-run outcomes are never attempted: they count only towards `skipped`.
/// So `succeeded + failed == attempted` always holds, and
/// `attempted + skipped == total`. A dry run reports `attempted == 0` with
/// every task in `skipped`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Every task that produced an outcome, attempted or skipped.
    pub total: usize,
    /// Tasks actually executed; excludes dry-run tasks.
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Successful latencies in milliseconds, ascending.
    #[serde(skip)]
    pub latencies_ms: Vec<f64>,
    /// `None` when no task succeeded.
    pub latency: Option<LatencyStats>,
}

impl From<Tally> for RunSummary {
    fn from(tally: Tally) -> Self {
        assert_eq!(
            tally.succeeded + tally.failed,
            tally.attempted,
            "tally counters out of sync"
        );
        assert_eq!(tally.latencies_ms.len(), tally.succeeded, "latency samples out of sync");

        let total = tally.total();
        let mut latencies_ms = tally.latencies_ms;
        latencies_ms.sort_by(f64::total_cmp);
        Self {
            total,
            attempted: tally.attempted,
            succeeded: tally.succeeded,
            failed: tally.failed,
            skipped: tally.skipped,
            latency: LatencyStats::from_sorted(&latencies_ms),
            latencies_ms,
        }
    }
}

impl Report<Tally> for RunSummary {}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total tasks:  {}", self.total)?;
        writeln!(f, "Attempted:    {}", self.attempted)?;
        writeln!(f, "Succeeded:    {}", self.succeeded)?;
        writeln!(f, "Failed:       {}", self.failed)?;
        if self.skipped > 0 {
            writeln!(f, "Skipped:      {} (dry run)", self.skipped)?;
        }
        let Some(l) = &self.latency else {
            return writeln!(f, "No successful tasks.");
        };
        writeln!(f, "Latency of {} successful tasks (ms):", l.count)?;
        writeln!(f, "  avg  {:.2}", l.avg)?;
        writeln!(f, "  min  {:.2}", l.min)?;
        writeln!(f, "  p50  {:.2}", l.p50)?;
        writeln!(f, "  p90  {:.2}", l.p90)?;
        writeln!(f, "  p99  {:.2}", l.p99)?;
        writeln!(f, "  max  {:.2}", l.max)
    }
}

/// Prints the summary as text.
pub struct StdoutReporter;

impl Reporter<Tally, RunSummary> for StdoutReporter {
    async fn report(&self, report: &RunSummary) -> Result<(), Box<dyn std::error::Error>> {
        print!("{report}");
        Ok(())
    }
}

/// Prints the summary as a single JSON document.
pub struct JsonReporter;

impl Reporter<Tally, RunSummary> for JsonReporter {
    async fn report(&self, report: &RunSummary) -> Result<(), Box<dyn std::error::Error>> {
        println!("{}", serde_json::to_string_pretty(report)?);
        Ok(())
    }
}

/// Destination of the per-task lines: standard output or an append-only
/// file, never both.
///
/// Only the aggregator writes to it, so lines never interleave.
pub struct OutcomeLog {
    writer: BufWriter<Box<dyn AsyncWrite + Unpin + Send>>,
    target: String,
}

impl OutcomeLog {
    pub fn stdout() -> Self {
        Self::from_writer(tokio::io::stdout(), "stdout")
    }

    /// Open `path` for appending, creating it if needed.
    pub async fn append(path: impl AsRef<Path>) -> Result<Self, SetupError> {
        let path = path.as_ref();
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|source| SetupError::LogFile {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self::from_writer(file, path.display().to_string()))
    }

    pub fn from_writer(writer: impl AsyncWrite + Unpin + Send + 'static, target: impl Into<String>) -> Self {
        Self {
            writer: BufWriter::new(Box::new(writer)),
            target: target.into(),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Write one line per outcome and flush.
    pub async fn write_batch(&mut self, outcomes: &[Outcome]) -> io::Result<()> {
        for outcome in outcomes {
            self.writer.write_all(outcome.log_line().as_bytes()).await?;
            self.writer.write_all(b"\n").await?;
        }
        self.writer.flush().await
    }
}
