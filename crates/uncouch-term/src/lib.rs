//! Erlang external term decoding for CouchDB database files.
//!
//! CouchDB persists its commit headers, B-tree nodes and document bodies
//! with `term_to_binary`. Only a small subset of the external term format
//! ever shows up on disk, and this crate implements exactly that subset.
//!
//! # Layers
//!
//! - [`TermDecoder`] -- cursor over a byte slice; every [`TermDecoder::scan`]
//!   yields one flat [`Term`] and advances the cursor
//! - [`TermTree`] -- the nested structure implied by a flat term stream
//!   (tuples own `arity` children, lists own `len + 1` children including
//!   their trailing nil)
//!
//! # Format quirks
//!
//! 1. `NEW_FLOAT_EXT` payloads are read as little-endian IEEE-754 bits.
//! 2. `STRING_EXT` is an array of small integers, not text.
//! 3. Every list is followed by an explicit nil that its length does not count.

pub mod decoder;
pub mod error;
pub mod term;
pub mod tree;

pub use decoder::TermDecoder;
pub use error::{TermError, TermResult};
pub use term::{Term, TermTag};
pub use tree::{TermTree, TermTreeBuilder, DEFAULT_MAX_DEPTH};
