//! Run configuration.
//!
//! A [`RunConfig`] can be written by hand, loaded from a TOML file, or built
//! from command-line flags (the binary does both: file first, flags on top).
//!
//! ```toml
//! workers = 16
//! url = "https://ingest.example.org/records"
//! timeout = 30
//! output = "inject.log"
//!
//! [source]
//! kind = "inject"
//! template = "record.json"
//! n = 1000
//! ```

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{error::SetupError, source::synthetic::DEFAULT_ID_FIELD};

/// Which task source feeds the run.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceConfig {
    /// Files below `path` whose base name matches the glob `file`.
    Crawl { path: PathBuf, file: String },
    /// `n` copies of the JSON record in `template`, each with a unique `field`.
    Inject {
        template: PathBuf,
        n: usize,
        #[serde(default = "default_field")]
        field: String,
    },
}

fn default_field() -> String {
    DEFAULT_ID_FIELD.to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub source: Option<SourceConfig>,
    /// Number of concurrent workers; defaults to the number of CPUs.
    pub workers: Option<usize>,
    /// HTTP endpoint every task is POSTed to.
    pub url: Option<String>,
    /// External program run once per task, used instead of `url`.
    pub endpoint_tool: Option<PathBuf>,
    pub tool_args: Vec<String>,
    /// Token literal or path to a token file.
    pub token: Option<String>,
    /// Per-task deadline in seconds, 0 for none.
    pub timeout: u64,
    pub dry_run: bool,
    /// Append per-task lines here instead of printing them.
    pub output: Option<PathBuf>,
    /// Print the final summary as JSON.
    pub json: bool,
}

impl RunConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SetupError> {
        let path = path.as_ref();
        let config_err = |reason: String| SetupError::Config {
            path: path.to_path_buf(),
            reason,
        };
        let raw = std::fs::read_to_string(path).map_err(|e| config_err(e.to_string()))?;
        toml::from_str(&raw).map_err(|e| config_err(e.to_string()))
    }

    pub fn workers(&self) -> usize {
        self.workers.unwrap_or_else(num_cpus::get).max(1)
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout > 0).then(|| Duration::from_secs(self.timeout))
    }
}
