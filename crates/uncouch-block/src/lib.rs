//! Block-level access to CouchDB database files.
//!
//! Every byte range in a `.couch` file is interleaved with one marker byte
//! per 4 KiB block. This crate hides those markers ([`framing`]), reads the
//! length-prefixed chunks CouchDB appends ([`BlockReader`]) and undoes the
//! per-chunk compression ([`decompress`]).

pub mod compression;
pub mod error;
pub mod framing;
pub mod reader;

pub use compression::{decompress, DEFLATE_TAG, SNAPPY_PREFIX, TERM_MAGIC};
pub use error::{BlockError, BlockResult};
pub use framing::{insert_markers, raw_len, strip_markers, BLOCK_SIZE};
pub use reader::{BlockReader, HEADER_PREFIX_LEN, MD5_FLAG, MD5_LEN};
