//! Per-file batch results and summaries.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Success,
    Error,
}

/// One row per processed candidate. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    pub input: PathBuf,
    /// Absent on analysis-only runs and on failures before an output path
    /// was determined.
    pub output: Option<PathBuf>,
    pub status: BatchStatus,
    pub message: String,
}

impl BatchResult {
    pub fn success(input: PathBuf, output: Option<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            input,
            output,
            status: BatchStatus::Success,
            message: message.into(),
        }
    }

    pub fn error(input: PathBuf, message: impl Into<String>) -> Self {
        Self {
            input,
            output: None,
            status: BatchStatus::Error,
            message: message.into(),
        }
    }
}

/// Aggregate counts, derived after the full sequence completes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn of(results: &[BatchResult]) -> Self {
        let succeeded = results
            .iter()
            .filter(|r| r.status == BatchStatus::Success)
            .count();
        Self {
            total: results.len(),
            succeeded,
            failed: results.len() - succeeded,
        }
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}
