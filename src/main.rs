//! batchrun binary entry point.

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use batchrun::{
    Reporter, RunConfig, Runner,
    config::SourceConfig,
    report::{JsonReporter, StdoutReporter},
    source::synthetic::DEFAULT_ID_FIELD,
};
use clap::{Args, Parser, Subcommand};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

/// Submit files or synthetic records to a service with bounded concurrency
#[derive(Debug, Parser)]
#[command(name = "batchrun", version, about)]
struct Cli {
    /// TOML file with default settings; flags override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbosity level (use -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(flatten)]
    run: RunArgs,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Submit every file under a directory whose name matches a pattern
    Crawl {
        /// Root directory to walk
        #[arg(long)]
        path: PathBuf,
        /// Glob pattern matched against file base names
        #[arg(long, default_value = "*")]
        file: String,
    },
    /// Inject N copies of a template record, each with a unique id
    Inject {
        /// JSON file holding the base record
        #[arg(long)]
        template: PathBuf,
        /// Number of records to inject
        #[arg(short)]
        n: usize,
        /// Field that receives the generated id
        #[arg(long, default_value = DEFAULT_ID_FIELD)]
        field: String,
    },
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Number of concurrent workers [default: number of CPUs]
    #[arg(short = 'c', long = "workers", global = true)]
    workers: Option<usize>,

    /// HTTP endpoint each task is POSTed to
    #[arg(long, global = true)]
    url: Option<String>,

    /// Program run once per task instead of an HTTP call
    #[arg(long, global = true)]
    endpoint_tool: Option<PathBuf>,

    /// Extra argument for the endpoint tool (repeatable)
    #[arg(long = "tool-arg", global = true, allow_hyphen_values = true)]
    tool_args: Vec<String>,

    /// Token, or path to a file containing it [env: BATCHRUN_TOKEN]
    #[arg(long, global = true)]
    token: Option<String>,

    /// Per-task timeout in seconds, 0 for none
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Discover tasks without executing them
    #[arg(long, global = true)]
    dry_run: bool,

    /// Append per-task lines to this file instead of printing them
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Print the summary as JSON
    #[arg(long, global = true)]
    json: bool,
}

impl Cli {
    fn init_tracing(&self) {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            let directive = match self.verbose {
                0 => "warn",
                1 => "batchrun=info",
                2 => "batchrun=debug",
                _ => "trace",
            };
            EnvFilter::new(directive)
        });

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(self.verbose > 1)
            .init();
    }

    /// Layer the flags over the config file, if any.
    fn into_config(self) -> Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::from_file(path)?,
            None => RunConfig::default(),
        };

        match self.command {
            Some(Command::Crawl { path, file }) => {
                config.source = Some(SourceConfig::Crawl { path, file });
            }
            Some(Command::Inject { template, n, field }) => {
                config.source = Some(SourceConfig::Inject { template, n, field });
            }
            None => {}
        }

        let run = self.run;
        if run.workers.is_some() {
            config.workers = run.workers;
        }
        if run.url.is_some() {
            config.url = run.url;
        }
        if run.endpoint_tool.is_some() {
            config.endpoint_tool = run.endpoint_tool;
        }
        if !run.tool_args.is_empty() {
            config.tool_args = run.tool_args;
        }
        if run.token.is_some() {
            config.token = run.token;
        }
        if let Some(timeout) = run.timeout {
            config.timeout = timeout;
        }
        if run.output.is_some() {
            config.output = run.output;
        }
        config.dry_run |= run.dry_run;
        config.json |= run.json;

        if config.source.is_none() {
            return Err(anyhow!(
                "no task source: use the `crawl` or `inject` subcommand, or set [source] in the config file"
            ));
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    cli.init_tracing();
    let config = cli.into_config()?;
    let json = config.json;

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, letting in-flight tasks finish...");
            let _ = stop_tx.send(true);
        }
    });

    let summary = Runner::new(config)
        .run(stop_rx)
        .await
        .context("run setup failed")?;

    let reported = if json {
        JsonReporter.report(&summary).await
    } else {
        StdoutReporter.report(&summary).await
    };
    reported.map_err(|e| anyhow!("cannot print summary: {e}"))
}
