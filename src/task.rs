use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

/// What a task carries to its executor.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// A file on disk; its bytes are read when the task runs.
    File(PathBuf),
    /// A structured record, sent as a JSON object.
    Record(Map<String, Value>),
}

/// One discrete unit of pending work.
///
/// Descriptors are produced by a [`crate::source::TaskSource`], handed to
/// exactly one worker and never mutated afterwards. The `index` is the
/// position in the source's emission order and is unique within a run.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDescriptor {
    pub index: usize,
    /// Human-readable identifier used in per-task log lines
    /// (a file path or a generated record id).
    pub label: String,
    pub payload: Payload,
}

impl TaskDescriptor {
    pub fn file(index: usize, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            index,
            label: path.display().to_string(),
            payload: Payload::File(path),
        }
    }

    pub fn record(index: usize, label: impl Into<String>, record: Map<String, Value>) -> Self {
        Self {
            index,
            label: label.into(),
            payload: Payload::Record(record),
        }
    }

    /// The file path for file tasks.
    pub fn path(&self) -> Option<&Path> {
        match &self.payload {
            Payload::File(p) => Some(p),
            Payload::Record(_) => None,
        }
    }
}
