use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::error::{JobError, JobResult};
use crate::source::ArchiveSummary;

/// A file that could not be extracted, and why.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: String,
}

impl fmt::Display for FileFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.error)
    }
}

/// Outcome of an extraction job.
#[derive(Clone, Debug, Default, Serialize)]
pub struct JobReport {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub documents: u64,
    pub failures: Vec<FileFailure>,
    /// Output files written, sorted.
    pub outputs: Vec<PathBuf>,
    pub source: ArchiveSummary,
}

impl JobReport {
    pub(crate) fn record_failure(&mut self, path: PathBuf, error: String) {
        self.failed += 1;
        self.failures.push(FileFailure { path, error });
    }

    pub(crate) fn record_success(&mut self, documents: u64, output: Option<PathBuf>) {
        self.succeeded += 1;
        self.documents += documents;
        if let Some(output) = output {
            if let Err(at) = self.outputs.binary_search(&output) {
                self.outputs.insert(at, output);
            }
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.source.success
    }

    /// The report if every file succeeded, otherwise the failures.
    pub fn into_result(self) -> JobResult<Self> {
        if self.failed > 0 {
            return Err(JobError::FilesFailed {
                failed: self.failed,
                total: self.processed,
                failures: self.failures,
            });
        }
        if !self.source.success {
            return Err(JobError::Source(
                self.source.error.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }
        Ok(self)
    }
}
