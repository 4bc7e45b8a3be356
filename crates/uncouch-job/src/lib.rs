//! Many-file extraction: input sources feed a pool of decode workers, whose
//! per-file NDJSON batches a pool of writers appends to rotating output
//! files, one lock per destination.

pub mod config;
pub mod error;
pub mod job;
pub mod locks;
pub mod naming;
pub mod report;
pub mod source;
pub mod store;
pub mod writer;

pub use config::ExtractConfig;
pub use error::{JobError, JobResult};
pub use job::ExtractJob;
pub use locks::{LockLease, LockRegistry};
pub use naming::{highest_index, output_file_name, parse_output_index};
pub use report::{FileFailure, JobReport};
pub use source::{
    is_database_path, is_tar_path, ArchiveEntry, ArchiveSummary, DirectorySource, FileListSource,
    InputSource, TarSource,
};
pub use store::{ByteStore, LocalStore};
pub use writer::OutputWriter;
