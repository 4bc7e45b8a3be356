//! Reading CouchDB `.couch` database files without CouchDB.
//!
//! [`CouchFile::open`] finds the newest commit header by scanning 4 KiB
//! block boundaries backwards from the end of the file. From its by-sequence
//! root, [`DocumentStream`] walks the B-tree depth-first and renders the
//! latest stored revision of each document as JSON.
//!
//! ```no_run
//! use uncouch_couch::{extract, ExtractOptions};
//!
//! let file = std::fs::File::open("users.couch")?;
//! let size = file.metadata()?.len();
//! for doc in extract(file, size, ExtractOptions::new("users"))? {
//!     println!("{}", doc?.to_json_line()?);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod document;
pub mod error;
pub mod file;
pub mod header;
pub mod node;
pub mod render;
pub mod stream;

use std::io::{Read, Seek};
use std::path::Path;

pub use document::Document;
pub use error::{CouchError, CouchResult};
pub use file::{CouchFile, NodeVisit};
pub use header::{find_header, parse_header, FileHeader, TreeState};
pub use node::{DocumentInfo, Node, NodeKind, Pointer, PointerKey, Revision, Sizes, TreeKind};
pub use render::render_json;
pub use stream::{DocumentStream, ExtractOptions};

/// Open `input` and stream its documents.
pub fn extract<R: Read + Seek>(
    input: R,
    size: u64,
    options: ExtractOptions,
) -> CouchResult<DocumentStream<R>> {
    Ok(CouchFile::open(input, size)?.into_documents(options))
}

/// Database name of a file: its file name up to the first `.`.
///
/// Shard files such as `shards/00000000-1fffffff/users.1510000000.couch`
/// map to `users`.
pub fn db_name_from_path(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();
    name.split('.').next().unwrap_or_default().to_string()
}
