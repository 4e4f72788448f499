use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::task::TaskDescriptor;

/// Code reported for a task whose deadline elapsed, following the
/// convention of the shell `timeout` utility.
pub const TIMEOUT_CODE: i32 = 124;
/// Code reported for infrastructure failures (connection refused,
/// unreadable payload, executor panic, ...).
pub const FAILURE_CODE: i32 = -1;

/// How a single task ended.
///
/// Three classes share this type: success (`Http` 2xx or `Exit(0)`),
/// application failure (any other `Http`/`Exit`), and infrastructure
/// failure (`TimedOut`, `Failed`). `Skipped` means the task was never
/// attempted, as in dry-run mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Skipped,
    Http(u16),
    Exit(i32),
    TimedOut,
    Failed,
}

impl Status {
    pub fn code(&self) -> i32 {
        match self {
            Status::Skipped => 0,
            Status::Http(c) => *c as i32,
            Status::Exit(c) => *c,
            Status::TimedOut => TIMEOUT_CODE,
            Status::Failed => FAILURE_CODE,
        }
    }

    pub fn is_success(&self) -> bool {
        match self {
            Status::Http(c) => (200..300).contains(c),
            Status::Exit(c) => *c == 0,
            _ => false,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Status::Skipped)
    }
}

/// The recorded result of executing one [`TaskDescriptor`].
///
/// Outcomes are the smallest sample the runner produces; they flow from the
/// workers to the aggregator and are never modified on the way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub index: usize,
    pub label: String,
    pub elapsed: Duration,
    pub status: Status,
    /// Response body, process output or error text. Empty on plain success.
    pub detail: String,
}

impl Outcome {
    pub fn new(
        task: &TaskDescriptor,
        elapsed: Duration,
        status: Status,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            index: task.index,
            label: task.label.clone(),
            elapsed,
            status,
            detail: detail.into(),
        }
    }

    pub fn timed_out(task: &TaskDescriptor, elapsed: Duration) -> Self {
        Self::new(task, elapsed, Status::TimedOut, "deadline exceeded")
    }

    pub fn failed(task: &TaskDescriptor, elapsed: Duration, reason: impl Into<String>) -> Self {
        Self::new(task, elapsed, Status::Failed, reason)
    }

    /// Wall-clock time in fractional milliseconds.
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1000.0
    }

    /// Single-line rendering used by the per-task log.
    pub fn log_line(&self) -> String {
        let mut line = format!(
            "[{}] status={} elapsed={:.2}ms {}",
            self.index,
            self.status.code(),
            self.elapsed_ms(),
            self.label
        );
        if self.status.is_success() || self.detail.is_empty() {
            return line;
        }
        let key = if self.status.is_skipped() { "note" } else { "error" };
        let detail = self.detail.split_whitespace().collect::<Vec<_>>().join(" ");
        line.push_str(&format!(" {key}={detail}"));
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classes() {
        assert!(Status::Http(201).is_success());
        assert!(!Status::Http(404).is_success());
        assert!(Status::Exit(0).is_success());
        assert!(!Status::Exit(2).is_success());
        assert!(!Status::TimedOut.is_success());
        assert!(!Status::Skipped.is_success());
        assert_eq!(Status::Skipped.code(), 0);
        assert_eq!(Status::TimedOut.code(), TIMEOUT_CODE);
        assert_eq!(Status::Failed.code(), FAILURE_CODE);
    }

    #[test]
    fn log_line_carries_error_text_on_failure() {
        let task = TaskDescriptor::file(7, "/data/a.json");
        let ok = Outcome::new(&task, Duration::from_micros(1500), Status::Http(200), "fine");
        assert_eq!(ok.log_line(), "[7] status=200 elapsed=1.50ms /data/a.json");

        let bad = Outcome::new(&task, Duration::from_millis(3), Status::Http(500), "boom\nstack");
        assert_eq!(
            bad.log_line(),
            "[7] status=500 elapsed=3.00ms /data/a.json error=boom stack"
        );
    }
}
