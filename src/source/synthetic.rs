use std::{
    path::Path,
    sync::atomic::{AtomicU64, Ordering},
};

use rand::Rng;
use serde_json::{Map, Value};

use crate::{error::SetupError, task::TaskDescriptor};

/// Default name of the field that identifies a record.
pub const DEFAULT_ID_FIELD: &str = "did";

/// Generates identifiers of the form `<base>-<counter>-<nanos>-<suffix>`.
///
/// The counter alone makes ids unique for one generator; the timestamp and
/// random suffix keep them unique across generators and across runs. Safe
/// to share between threads.
#[derive(Debug)]
pub struct IdGenerator {
    base: String,
    counter: AtomicU64,
}

impl IdGenerator {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            counter: AtomicU64::new(0),
        }
    }

    pub fn next_id(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let suffix: u32 = rand::rng().random_range(0..0x100_0000);
        format!("{}-{n}-{nanos}-{suffix:06x}", self.base)
    }
}

/// Yields `count` copies of a base record, each with its identity field
/// replaced by a fresh id derived from the base record's own value.
pub struct SyntheticSource {
    base: Map<String, Value>,
    field: String,
    ids: IdGenerator,
    count: usize,
    next_index: usize,
}

impl SyntheticSource {
    /// Returns `None` when `base` has no string value under `field`.
    pub fn new(base: Map<String, Value>, field: impl Into<String>, count: usize) -> Option<Self> {
        let field = field.into();
        let prefix = base.get(&field)?.as_str()?.to_string();
        Some(Self {
            base,
            ids: IdGenerator::new(prefix),
            field,
            count,
            next_index: 0,
        })
    }

    /// Load the base record from a JSON template file.
    pub fn from_template(
        path: impl AsRef<Path>,
        field: &str,
        count: usize,
    ) -> Result<Self, SetupError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| SetupError::TemplateRead {
            path: path.to_path_buf(),
            source,
        })?;
        let base = match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                return Err(SetupError::TemplateFormat {
                    path: path.to_path_buf(),
                    reason: "expected a JSON object".into(),
                });
            }
            Err(e) => {
                return Err(SetupError::TemplateFormat {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                });
            }
        };

        Self::new(base, field, count).ok_or_else(|| SetupError::TemplateField {
            path: path.to_path_buf(),
            field: field.to_string(),
        })
    }
}

impl Iterator for SyntheticSource {
    type Item = TaskDescriptor;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_index >= self.count {
            return None;
        }
        let id = self.ids.next_id();
        let mut record = self.base.clone();
        record.insert(self.field.clone(), Value::String(id.clone()));

        let task = TaskDescriptor::record(self.next_index, id, record);
        self.next_index += 1;
        Some(task)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.count - self.next_index;
        (left, Some(left))
    }
}
