//! Durable error log for sprint-close runs. The core only ever appends;
//! the CLI reads the list back for display and nothing truncates it.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::config::data_dir;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_item_id: Option<i64>,
    pub timestamp: String,
}

impl ErrorRecord {
    pub fn new(error: String, work_item_id: Option<i64>) -> Self {
        Self {
            error,
            work_item_id,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Where the processor reports per-item failures. Injected so the orchestrator
/// has a single collaborator instead of ambient shared storage.
pub trait ErrorSink: Send + Sync {
    fn record(&self, record: ErrorRecord);
}

/// File-backed error log: one JSON array in a single named slot under the
/// data directory.
pub struct FileErrorLog {
    path: PathBuf,
}

impl FileErrorLog {
    pub fn new() -> Self {
        Self {
            path: data_dir().join("errors.json"),
        }
    }

    #[cfg(test)]
    pub fn at(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn read_all(&self) -> Vec<ErrorRecord> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(_) => return Vec::new(),
        };
        serde_json::from_str(&contents).unwrap_or_default()
    }

    fn append(&self, record: ErrorRecord) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut records = self.read_all();
        records.push(record);
        std::fs::write(&self.path, serde_json::to_string(&records)?)?;
        Ok(())
    }
}

impl Default for FileErrorLog {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorSink for FileErrorLog {
    fn record(&self, record: ErrorRecord) {
        // A failure to persist must not abort the run it is reporting on.
        if let Err(e) = self.append(record) {
            error!("failed to persist error record: {e}");
        }
    }
}
