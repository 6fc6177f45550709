use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// How one supervised scan ended.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScanOutcome {
    /// Exit code zero.
    Success,
    /// Non-zero exit. `code` is `None` when the process was killed by a signal.
    Failure { code: Option<i32> },
    /// The process could not be started.
    LaunchError { reason: String },
    /// Interrupted by the operator; the child was killed.
    Cancelled,
}

/// Record of one run: what was executed and everything it printed.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ScanExecution {
    pub arguments: Vec<String>,
    /// RFC 3339 UTC.
    pub started_at: String,
    pub lines: Vec<String>,
    pub last_progress: f64,
    pub outcome: ScanOutcome,
}

impl ScanExecution {
    /// Write this record as pretty JSON, replacing any existing file.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("failed to create transcript: {}", path.display()))?;
        serde_json::to_writer_pretty(file, self)
            .with_context(|| format!("failed to write transcript: {}", path.display()))?;
        Ok(())
    }
}
