//! Synthetic CouchDB database images for tests.
//!
//! [`Value`] encodes terms, [`CouchFileBuilder`] lays chunks out with block
//! markers and header blocks, and [`shapes`] produces the header, node and
//! revision tree terms CouchDB writes.

pub mod builder;
pub mod fixtures;
pub mod shapes;
pub mod value;

pub use builder::{stored_term, Compression, CouchFileBuilder};
pub use fixtures::{empty_db, single_leaf_db};
pub use value::Value;
