use std::sync::Arc;

use reqwest::Client;
use tokio::sync::watch;

use crate::{
    aggregate::{AGGREGATE_BATCH, Tally, aggregator_task},
    config::{RunConfig, SourceConfig},
    error::SetupError,
    executor::{Backend, DryRun, HttpExecutor, ProcessExecutor},
    pool::WorkerPool,
    report::{OutcomeLog, RunSummary},
    source::{BoxSource, FsSource, SyntheticSource},
    token,
};

/// Ties a [`RunConfig`] to the pipeline: builds the source, the executor and
/// the log sink, runs the pool and summarizes the outcomes.
///
/// All setup happens before the first task starts, so configuration errors
/// surface as [`SetupError`] and never as half-finished runs. Nothing built
/// here outlives [`Runner::run`]; every run gets its own client and counters.
#[derive(Debug, Clone)]
pub struct Runner {
    config: RunConfig,
}

impl Runner {
    pub fn new(config: RunConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn source(&self) -> Result<BoxSource, SetupError> {
        match &self.config.source {
            Some(SourceConfig::Crawl { path, file }) => Ok(Box::new(FsSource::new(path, file)?)),
            Some(SourceConfig::Inject { template, n, field }) => {
                Ok(Box::new(SyntheticSource::from_template(template, field, *n)?))
            }
            None => Err(SetupError::Invalid("no task source configured".into())),
        }
    }

    pub fn backend(&self) -> Result<Backend, SetupError> {
        if self.config.dry_run {
            return Ok(Backend::DryRun(DryRun));
        }

        let (url, tool) = (&self.config.url, &self.config.endpoint_tool);
        if url.is_some() && tool.is_some() {
            return Err(SetupError::Invalid(
                "url and endpoint tool are mutually exclusive".into(),
            ));
        }
        if url.is_none() && tool.is_none() {
            return Err(SetupError::Invalid(
                "either a url or an endpoint tool is required unless running dry".into(),
            ));
        }

        let token = token::resolve(self.config.token.as_deref())?;
        if let Some(program) = tool {
            return Ok(Backend::Process(ProcessExecutor::new(
                program,
                self.config.tool_args.clone(),
                Some(token),
            )));
        }

        let client = Client::builder()
            .build()
            .map_err(|e| SetupError::Invalid(format!("cannot build http client: {e}")))?;
        let url = url.clone().unwrap_or_default();
        Ok(Backend::Http(HttpExecutor::new(client, url, Some(token))))
    }

    /// Execute the whole run.
    ///
    /// Per-task failures are part of the returned summary; only setup errors
    /// are returned as `Err`. Sending `true` on `stop` ends the run early.
    pub async fn run(&self, stop: watch::Receiver<bool>) -> Result<RunSummary, SetupError> {
        let source = self.source()?;
        let backend = Arc::new(self.backend()?);
        let mut log = match &self.config.output {
            Some(path) => OutcomeLog::append(path).await?,
            None => OutcomeLog::stdout(),
        };

        let pool = WorkerPool::builder()
            .concurrency(self.config.workers())
            .timeout(self.config.timeout())
            .build();
        tracing::info!(
            "Starting run: backend={}, workers={}, timeout={:?}, log={}",
            backend.name(),
            pool.concurrency,
            pool.timeout,
            log.target()
        );

        let outcomes = pool.run(source, backend, stop);
        let tally: Tally = aggregator_task(outcomes, &mut log, AGGREGATE_BATCH).await;

        tracing::info!(
            "Run finished: {} succeeded, {} failed, {} skipped",
            tally.succeeded,
            tally.failed,
            tally.skipped
        );
        Ok(RunSummary::from(tally))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(source: Option<SourceConfig>) -> RunConfig {
        RunConfig {
            source,
            ..Default::default()
        }
    }

    #[test]
    fn missing_source_is_rejected() {
        let runner = Runner::new(config(None));
        assert!(matches!(runner.source(), Err(SetupError::Invalid(_))));
    }

    #[test]
    fn dry_run_needs_no_endpoint_or_token() {
        let runner = Runner::new(RunConfig {
            dry_run: true,
            ..Default::default()
        });
        assert_eq!(runner.backend().unwrap().name(), "dry-run");
    }

    #[test]
    fn endpoint_choices() {
        let token = Some("0123456789abcdef0123".to_string());

        let neither = Runner::new(RunConfig {
            token: token.clone(),
            ..Default::default()
        });
        assert!(matches!(neither.backend(), Err(SetupError::Invalid(_))));

        let both = Runner::new(RunConfig {
            token: token.clone(),
            url: Some("http://localhost:1/".into()),
            endpoint_tool: Some("/bin/true".into()),
            ..Default::default()
        });
        assert!(matches!(both.backend(), Err(SetupError::Invalid(_))));

        let tool = Runner::new(RunConfig {
            token: token.clone(),
            endpoint_tool: Some("/bin/true".into()),
            ..Default::default()
        });
        assert_eq!(tool.backend().unwrap().name(), "process");

        let http = Runner::new(RunConfig {
            token,
            url: Some("http://localhost:1/".into()),
            ..Default::default()
        });
        assert_eq!(http.backend().unwrap().name(), "http");
    }

    #[test]
    fn invalid_token_is_fatal() {
        let runner = Runner::new(RunConfig {
            token: Some("short".into()),
            url: Some("http://localhost:1/".into()),
            ..Default::default()
        });
        assert!(matches!(runner.backend(), Err(SetupError::TokenInvalid(_))));
    }

    #[tokio::test]
    async fn bad_root_fails_before_running() {
        let dir = tempfile::TempDir::new().unwrap();
        let runner = Runner::new(RunConfig {
            dry_run: true,
            ..config(Some(SourceConfig::Crawl {
                path: dir.path().join("absent"),
                file: "*".into(),
            }))
        });
        let (_tx, rx) = watch::channel(false);
        assert!(matches!(runner.run(rx).await, Err(SetupError::SourceRoot { .. })));
    }
}
