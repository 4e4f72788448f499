use std::{
    io,
    path::PathBuf,
    process::{Output, Stdio},
};

use tokio::{io::AsyncWriteExt, process::Command, time::Instant};

use super::{TaskExecutor, infra_failure};
use crate::{
    outcome::{Outcome, Status},
    task::{Payload, TaskDescriptor},
    token::TOKEN_ENV,
};

/// Hands each task to an external program.
///
/// File tasks run `<program> [args..] <path>`; record tasks run
/// `<program> [args..]` with the record written to stdin as JSON. The token,
/// when set, is exported to the child as `BATCHRUN_TOKEN`. The exit code
/// becomes [`Status::Exit`]; on a nonzero exit the child's stderr (or stdout
/// when stderr is empty) is kept as the outcome detail.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    program: PathBuf,
    args: Vec<String>,
    token: Option<String>,
}

impl ProcessExecutor {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>, token: Option<String>) -> Self {
        Self {
            program: program.into(),
            args,
            token,
        }
    }

    async fn spawn(&self, task: &TaskDescriptor) -> io::Result<Output> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // a child outliving its deadline is killed when the future is dropped
            .kill_on_drop(true);
        if let Some(token) = &self.token {
            cmd.env(TOKEN_ENV, token);
        }

        match &task.payload {
            Payload::File(path) => {
                cmd.arg(path).stdin(Stdio::null());
                cmd.output().await
            }
            Payload::Record(record) => {
                let body = serde_json::to_vec(record)?;
                let mut child = cmd.stdin(Stdio::piped()).spawn()?;
                let stdin = child.stdin.take();
                // feed stdin while draining stdout and stderr, or a chatty tool
                // and a large record block each other on full pipes
                let feed = async move {
                    let Some(mut stdin) = stdin else {
                        return Ok(());
                    };
                    match stdin.write_all(&body).await {
                        // the tool may exit without reading its input
                        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
                        other => other,
                    }
                };
                let (fed, output) = tokio::join!(feed, child.wait_with_output());
                fed?;
                output
            }
        }
    }
}

impl TaskExecutor for ProcessExecutor {
    async fn execute(&self, task: &TaskDescriptor, deadline: Option<Instant>) -> Outcome {
        let started = Instant::now();
        let output = match deadline {
            Some(deadline) => match tokio::time::timeout_at(deadline, self.spawn(task)).await {
                Ok(output) => output,
                Err(_) => return Outcome::timed_out(task, started.elapsed()),
            },
            None => self.spawn(task).await,
        };

        let output = match output {
            Ok(output) => output,
            Err(e) => return infra_failure(task, started, format!("{}: {e}", self.program.display())),
        };
        let Some(code) = output.status.code() else {
            return infra_failure(task, started, format!("{} terminated by signal", self.program.display()));
        };

        let detail = if code == 0 || output.stderr.is_empty() {
            String::from_utf8_lossy(&output.stdout)
        } else {
            String::from_utf8_lossy(&output.stderr)
        };
        Outcome::new(task, started.elapsed(), Status::Exit(code), detail.trim_end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn sh(script: &str, token: Option<&str>) -> ProcessExecutor {
        ProcessExecutor::new(
            "sh",
            vec!["-c".into(), script.into()],
            token.map(str::to_string),
        )
    }

    fn record_task() -> TaskDescriptor {
        let record = json!({"did": "exp-1-0"}).as_object().cloned().unwrap();
        TaskDescriptor::record(2, "exp-1-0", record)
    }

    #[tokio::test]
    async fn file_path_is_passed_as_last_argument() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "payload").unwrap();

        // with `sh -c`, the first extra argument lands in $0
        let outcome = sh(r#"cat "$0""#, None)
            .execute(&TaskDescriptor::file(0, &path), None)
            .await;
        assert_eq!(outcome.status, Status::Exit(0));
        assert!(outcome.status.is_success());
        assert_eq!(outcome.detail, "payload");
    }

    #[tokio::test]
    async fn record_goes_to_stdin_and_failure_keeps_output() {
        let outcome = sh("cat; exit 3", None).execute(&record_task(), None).await;
        assert_eq!(outcome.status, Status::Exit(3));
        assert!(!outcome.status.is_success());
        assert_eq!(outcome.detail, r#"{"did":"exp-1-0"}"#);
        assert_eq!(outcome.index, 2);
    }

    #[tokio::test]
    async fn large_record_and_large_output_do_not_deadlock() {
        let record = json!({"did": "exp-1-0", "blob": "x".repeat(512 * 1024)})
            .as_object()
            .cloned()
            .unwrap();
        let task = TaskDescriptor::record(0, "exp-1-0", record);
        let deadline = Instant::now() + Duration::from_secs(10);

        // writes well past a pipe buffer before reading any input
        let outcome = sh("head -c 200000 /dev/zero; wc -c", None)
            .execute(&task, Some(deadline))
            .await;
        assert_eq!(outcome.status, Status::Exit(0));
        let read: usize = outcome.detail.trim_start_matches('\0').trim().parse().unwrap();
        assert!(read > 512 * 1024, "tool read {read} bytes");
    }

    #[tokio::test]
    async fn stderr_preferred_on_failure() {
        let outcome = sh("echo out; echo denied >&2; exit 1", None)
            .execute(&record_task(), None)
            .await;
        assert_eq!(outcome.status, Status::Exit(1));
        assert_eq!(outcome.detail, "denied");
    }

    #[tokio::test]
    async fn token_is_exported() {
        let outcome = sh(r#"test "$BATCHRUN_TOKEN" = "tok-abcdefghijklmnop""#, Some("tok-abcdefghijklmnop"))
            .execute(&record_task(), None)
            .await;
        assert_eq!(outcome.status, Status::Exit(0));
    }

    #[tokio::test]
    async fn deadline_kills_the_child() {
        let deadline = Instant::now() + Duration::from_millis(100);
        let outcome = sh("sleep 5", None).execute(&record_task(), Some(deadline)).await;
        assert_eq!(outcome.status, Status::TimedOut);
        assert!(outcome.elapsed < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn missing_program_is_infrastructure_failure() {
        let executor = ProcessExecutor::new("/no/such/tool", vec![], None);
        let outcome = executor.execute(&record_task(), None).await;
        assert_eq!(outcome.status, Status::Failed);
        assert!(outcome.detail.contains("/no/such/tool"));
    }
}
