use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use flate2::read::MultiGzDecoder;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{JobError, JobResult};
use crate::store::ByteStore;

const COUCH_SUFFIX: &str = ".couch";
const GZ_COUCH_SUFFIX: &str = ".couch.gz";
const TAR_SUFFIXES: [&str; 3] = [".tar", ".tar.gz", ".tgz"];

/// One input database, fully read into memory.
#[derive(Clone, Debug)]
pub struct ArchiveEntry {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
    pub size: u64,
}

/// Completion signal of an [`InputSource`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ArchiveSummary {
    pub success: bool,
    pub error: Option<String>,
    pub total_files: u64,
}

/// Producer of input databases.
///
/// `produce` sends every accepted entry and returns once the source is
/// exhausted, closing the channel by dropping `tx`.
pub trait InputSource: Send + Sync {
    fn produce(&self, tx: mpsc::Sender<ArchiveEntry>) -> ArchiveSummary;
}

/// Whether `path` is a database this crate should read: `.couch` or
/// `.couch.gz`, not an internal `_`-prefixed database.
pub fn is_database_path(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    !name.starts_with('_') && (name.ends_with(COUCH_SUFFIX) || name.ends_with(GZ_COUCH_SUFFIX))
}

/// Whether `path` names a tar bundle, optionally gzipped.
pub fn is_tar_path(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| TAR_SUFFIXES.iter().any(|suffix| name.ends_with(suffix)))
}

/// Fetch `path` via `store`. `None` for entries that are skipped.
fn load_entry(store: &dyn ByteStore, path: &Path) -> JobResult<Option<ArchiveEntry>> {
    let (bytes, _) = store.get(&path.to_string_lossy())?;
    entry_from_bytes(path, bytes)
}

/// Wrap the bytes of one database, inflating `.couch.gz`. Empty files are
/// skipped.
fn entry_from_bytes(path: &Path, bytes: Vec<u8>) -> JobResult<Option<ArchiveEntry>> {
    if bytes.is_empty() {
        debug!(path = %path.display(), "skipping empty file");
        return Ok(None);
    }
    if !path.to_string_lossy().ends_with(GZ_COUCH_SUFFIX) {
        let size = bytes.len() as u64;
        return Ok(Some(ArchiveEntry {
            path: path.to_path_buf(),
            bytes,
            size,
        }));
    }
    let mut inflated = Vec::new();
    MultiGzDecoder::new(bytes.as_slice()).read_to_end(&mut inflated)?;
    if inflated.is_empty() {
        return Ok(None);
    }
    let size = inflated.len() as u64;
    Ok(Some(ArchiveEntry {
        path: path.with_extension(""),
        bytes: inflated,
        size,
    }))
}

/// Load each path and send it. Stops at the first failure or when the
/// receiver is gone.
fn send_all<I>(store: &dyn ByteStore, paths: I, tx: &mpsc::Sender<ArchiveEntry>) -> ArchiveSummary
where
    I: IntoIterator<Item = JobResult<PathBuf>>,
{
    let mut summary = ArchiveSummary {
        success: true,
        ..Default::default()
    };
    for path in paths {
        let entry = path.and_then(|p| {
            load_entry(store, &p).map_err(|e| JobError::Source(format!("{}: {e}", p.display())))
        });
        match entry {
            Ok(Some(entry)) => {
                summary.total_files += 1;
                if tx.blocking_send(entry).is_err() {
                    warn!("input receiver closed early");
                    break;
                }
            }
            Ok(None) => {}
            Err(e) => {
                summary.success = false;
                summary.error = Some(e.to_string());
                break;
            }
        }
    }
    info!(files = summary.total_files, success = summary.success, "input exhausted");
    summary
}

/// Every database below a directory, in file-name order.
pub struct DirectorySource {
    root: PathBuf,
    store: Arc<dyn ByteStore>,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>, store: Arc<dyn ByteStore>) -> Self {
        Self {
            root: root.into(),
            store,
        }
    }
}

impl InputSource for DirectorySource {
    fn produce(&self, tx: mpsc::Sender<ArchiveEntry>) -> ArchiveSummary {
        let paths = WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(e) if e.file_type().is_file() && is_database_path(e.path()) => {
                    Some(Ok(e.into_path()))
                }
                Ok(_) => None,
                Err(e) => Some(Err(JobError::Source(e.to_string()))),
            });
        send_all(self.store.as_ref(), paths, &tx)
    }
}

/// An explicit list of paths or URIs.
pub struct FileListSource {
    paths: Vec<PathBuf>,
    store: Arc<dyn ByteStore>,
}

impl FileListSource {
    pub fn new(paths: Vec<PathBuf>, store: Arc<dyn ByteStore>) -> Self {
        Self { paths, store }
    }
}

impl InputSource for FileListSource {
    fn produce(&self, tx: mpsc::Sender<ArchiveEntry>) -> ArchiveSummary {
        let paths = self
            .paths
            .iter()
            .filter(|p| is_database_path(p))
            .cloned()
            .map(Ok);
        send_all(self.store.as_ref(), paths, &tx)
    }
}

/// Every database inside a `.tar`, `.tar.gz` or `.tgz` bundle, in archive
/// order. Directory members and other non-database members are skipped.
pub struct TarSource {
    archive: PathBuf,
    store: Arc<dyn ByteStore>,
}

impl TarSource {
    pub fn new(archive: impl Into<PathBuf>, store: Arc<dyn ByteStore>) -> Self {
        Self {
            archive: archive.into(),
            store,
        }
    }

    fn send_members(
        &self,
        tx: &mpsc::Sender<ArchiveEntry>,
        summary: &mut ArchiveSummary,
    ) -> JobResult<()> {
        let (bytes, size) = self.store.get(&self.archive.to_string_lossy())?;
        let name = self.archive.to_string_lossy();
        let gzipped = name.ends_with(".gz") || name.ends_with(".tgz");
        info!(archive = %self.archive.display(), size, gzipped, "reading tar bundle");
        let reader: Box<dyn Read + '_> = if gzipped {
            Box::new(MultiGzDecoder::new(bytes.as_slice()))
        } else {
            Box::new(bytes.as_slice())
        };

        let mut archive = tar::Archive::new(reader);
        for member in archive.entries()? {
            let mut member = member?;
            if !member.header().entry_type().is_file() {
                continue;
            }
            let path = member.path()?.into_owned();
            if !is_database_path(&path) {
                debug!(path = %path.display(), "skipping tar member");
                continue;
            }
            let mut data = Vec::with_capacity(member.size() as usize);
            member.read_to_end(&mut data)?;
            let Some(entry) = entry_from_bytes(&path, data)? else {
                continue;
            };
            summary.total_files += 1;
            if tx.blocking_send(entry).is_err() {
                warn!("input receiver closed early");
                break;
            }
        }
        Ok(())
    }
}

impl InputSource for TarSource {
    fn produce(&self, tx: mpsc::Sender<ArchiveEntry>) -> ArchiveSummary {
        let mut summary = ArchiveSummary {
            success: true,
            ..Default::default()
        };
        if let Err(e) = self.send_members(&tx, &mut summary) {
            summary.success = false;
            summary.error = Some(format!("{}: {e}", self.archive.display()));
        }
        info!(files = summary.total_files, success = summary.success, "input exhausted");
        summary
    }
}
