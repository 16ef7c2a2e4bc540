//! The run metadata document.
//!
//! A flat JSON object keyed by field name. The file at
//! `<out_dir>/wandb-metadata.json` is the durable copy; [`MetadataDocument`]
//! is the working copy mutated by the collector and the heartbeat.
//!
//! # File shape
//!
//! ```text
//! {
//!     "root": "/home/me/project",
//!     "program": "train.py",
//!     "git": { "remote": "...", "commit": "..." },
//!     "startedAt": "2024-05-01T12:00:00.000000",
//!     "heartbeatAt": "2024-05-01T12:00:16.000000",
//!     "host": "worker-7",
//!     ...
//!     "state": "running"
//! }
//! ```
//!
//! Every key is optional; consumers must tolerate missing fields.

use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::safe_json;

/// File name of the metadata document inside the output directory.
pub const METADATA_FILE_NAME: &str = "wandb-metadata.json";

/// Recognized top-level keys.
pub mod fields {
    pub const ROOT: &str = "root";
    pub const PROGRAM: &str = "program";
    pub const COLAB: &str = "colab";
    pub const GIT: &str = "git";
    pub const EMAIL: &str = "email";
    pub const CODE_SAVED: &str = "codeSaved";
    pub const STARTED_AT: &str = "startedAt";
    pub const HEARTBEAT_AT: &str = "heartbeatAt";
    pub const HOST: &str = "host";
    pub const USERNAME: &str = "username";
    pub const OS: &str = "os";
    /// Runtime (interpreter) version of the tracked program.
    pub const RUNTIME: &str = "python";
    pub const EXECUTABLE: &str = "executable";
    pub const DOCKER: &str = "docker";
    pub const GPU: &str = "gpu";
    pub const GPU_COUNT: &str = "gpu_count";
    pub const CPU_COUNT: &str = "cpu_count";
    pub const CUDA: &str = "cuda";
    pub const ARGS: &str = "args";
    pub const STATE: &str = "state";
    pub const EXIT_CODE: &str = "exitcode";
}

/// Render a timestamp the way the document stores it: naive UTC, microseconds.
pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.naive_utc().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

/// Lifecycle state recorded under `state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Running,
    Finished,
    Failed,
    Killed,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Finished => "finished",
            Self::Failed => "failed",
            Self::Killed => "killed",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Insertion-ordered mapping from field name to JSON value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataDocument {
    fields: Map<String, Value>,
}

impl MetadataDocument {
    /// Create an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a document from disk.
    ///
    /// A missing, unreadable or malformed file (including a non-object top
    /// level) yields an empty document.
    pub fn load(path: &Path) -> Self {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "no existing metadata, starting empty");
                return Self::new();
            }
        };

        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(fields)) => Self { fields },
            Ok(_) => {
                debug!(path = %path.display(), "metadata is not a JSON object, starting empty");
                Self::new()
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "malformed metadata, starting empty");
                Self::new()
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Get a string field.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Set a field, replacing any prior value in place.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    /// Set a field from any serializable value.
    ///
    /// Values that cannot be represented as JSON are stored as a placeholder
    /// string rather than rejected.
    pub fn set_lossy<T: Serialize + ?Sized>(&mut self, key: impl Into<String>, value: &T) {
        self.fields.insert(key.into(), safe_json::to_value_lossy(value));
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Render as the on-disk text: 4-space indented JSON plus a trailing newline.
    pub fn to_file_contents(&self) -> String {
        let mut text = safe_json::encode_pretty(&self.fields);
        text.push('\n');
        text
    }
}
