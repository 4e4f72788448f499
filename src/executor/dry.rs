use std::time::Duration;

use tokio::time::Instant;

use super::TaskExecutor;
use crate::{
    outcome::{Outcome, Status},
    task::TaskDescriptor,
};

pub const DRY_RUN_MESSAGE: &str = "dry run: not submitted";

/// Executor that never touches the network; every task is reported as
/// [`Status::Skipped`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRun;

impl TaskExecutor for DryRun {
    async fn execute(&self, task: &TaskDescriptor, _: Option<Instant>) -> Outcome {
        Outcome::new(task, Duration::ZERO, Status::Skipped, DRY_RUN_MESSAGE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reports_status_zero() {
        let task = TaskDescriptor::file(3, "/tmp/x.json");
        let outcome = DryRun.execute(&task, None).await;
        assert_eq!(outcome.index, 3);
        assert_eq!(outcome.status.code(), 0);
        assert_eq!(outcome.detail, DRY_RUN_MESSAGE);
        assert_eq!(outcome.elapsed, Duration::ZERO);
    }
}
