use std::{io, path::PathBuf};

use thiserror::Error;

/// Failures that abort a run before any task is started.
///
/// Anything that goes wrong *while* a task runs is captured in its
/// [`crate::Outcome`] instead and never shows up here.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("cannot read source root {path}: {source}")]
    SourceRoot {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid glob pattern {pattern:?}: {reason}")]
    Pattern { pattern: String, reason: String },

    #[error("cannot read template {path}: {source}")]
    TemplateRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed template {path}: {reason}")]
    TemplateFormat { path: PathBuf, reason: String },

    #[error("template {path} has no string field {field:?}")]
    TemplateField { path: PathBuf, field: String },

    #[error("no token given and {env} is not set")]
    TokenMissing { env: &'static str },

    #[error("invalid token: {0}")]
    TokenInvalid(String),

    #[error("cannot open log file {path}: {source}")]
    LogFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot read config {path}: {reason}")]
    Config { path: PathBuf, reason: String },

    #[error("{0}")]
    Invalid(String),
}
