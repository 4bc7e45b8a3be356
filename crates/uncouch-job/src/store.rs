use std::path::PathBuf;

use tracing::debug;

use crate::error::{JobError, JobResult};

/// Whole-object byte storage addressed by URI.
pub trait ByteStore: Send + Sync {
    /// Fetch an object and its size in bytes.
    fn get(&self, uri: &str) -> JobResult<(Vec<u8>, u64)>;

    fn put(&self, bytes: &[u8], uri: &str) -> JobResult<()>;
}

/// Local filesystem. Accepts plain paths and `file://` URIs.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalStore;

impl LocalStore {
    fn path(uri: &str) -> JobResult<PathBuf> {
        if let Some(path) = uri.strip_prefix("file://") {
            return Ok(PathBuf::from(path));
        }
        match uri.split_once("://") {
            Some(_) => Err(JobError::UnsupportedUri(uri.to_string())),
            None => Ok(PathBuf::from(uri)),
        }
    }
}

impl ByteStore for LocalStore {
    fn get(&self, uri: &str) -> JobResult<(Vec<u8>, u64)> {
        let bytes = std::fs::read(Self::path(uri)?)?;
        let size = bytes.len() as u64;
        debug!(uri, size, "read object");
        Ok((bytes, size))
    }

    fn put(&self, bytes: &[u8], uri: &str) -> JobResult<()> {
        let path = Self::path(uri)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, bytes)?;
        debug!(uri, size = bytes.len(), "wrote object");
        Ok(())
    }
}
