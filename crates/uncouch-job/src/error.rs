use thiserror::Error;
use uncouch_couch::CouchError;

use crate::report::FileFailure;

#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Couch(#[from] CouchError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("unsupported URI: {0}")]
    UnsupportedUri(String),

    #[error("input source failed: {0}")]
    Source(String),

    #[error("worker panicked: {0}")]
    WorkerPanicked(String),

    #[error("{failed} of {total} files failed")]
    FilesFailed {
        failed: usize,
        total: usize,
        failures: Vec<FileFailure>,
    },
}

pub type JobResult<T> = Result<T, JobError>;
