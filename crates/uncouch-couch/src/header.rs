use std::io::{ErrorKind, Read, Seek, SeekFrom};

use serde::Serialize;
use tracing::debug;
use uncouch_block::BLOCK_SIZE;
use uncouch_term::{TermTree, TermTag};

use crate::error::{CouchError, CouchResult};

const HEADER_ATOM: &str = "db_header";

/// Root of one B-tree as recorded in the header.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TreeState {
    pub offset: i64,
    pub size: i64,
}

impl TreeState {
    /// An empty database has no root node.
    pub fn is_empty(&self) -> bool {
        self.offset == 0
    }

    /// `{Offset, Reduction, Size}`; nil for an empty tree. Older files
    /// omit the size.
    fn from_tree(tree: &TermTree) -> CouchResult<Self> {
        if tree.is_nil() {
            return Ok(Self::default());
        }
        let fields = tree.tuple()?;
        let offset = tree.child(0)?.as_i64()?;
        if offset < 0 {
            return Err(CouchError::InvalidOffset(offset));
        }
        let size = match fields.get(2) {
            Some(size) => size.as_i64()?,
            None => 0,
        };
        Ok(Self { offset, size })
    }
}

/// The latest committed database header.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct FileHeader {
    pub disk_version: u8,
    pub update_seq: i64,
    pub id_tree_root: TreeState,
    pub seq_tree_root: TreeState,
}

/// Locate the newest header, scanning block boundaries backwards from the
/// end of the file. Returns the offset just past the header's marker byte.
pub fn find_header<R: Read + Seek>(input: &mut R, file_size: u64) -> CouchResult<u64> {
    let mut block = file_size / BLOCK_SIZE;
    loop {
        let pos = block * BLOCK_SIZE;
        input.seek(SeekFrom::Start(pos))?;
        let mut tag = [0u8; 1];
        match input.read_exact(&mut tag) {
            Ok(()) => match tag[0] {
                0 => {}
                1 => {
                    debug!(offset = pos + 1, "found header block");
                    return Ok(pos + 1);
                }
                byte => return Err(CouchError::UnknownHeaderByte { offset: pos, byte }),
            },
            // A file whose size is a multiple of the block size ends exactly
            // on the boundary we start from.
            Err(e) if e.kind() == ErrorKind::UnexpectedEof && pos >= file_size => {}
            Err(e) => return Err(e.into()),
        }
        if block == 0 {
            return Err(CouchError::HeaderNotFound);
        }
        block -= 1;
    }
}

/// Read the fields of a `db_header` record.
pub fn parse_header(tree: &TermTree) -> CouchResult<FileHeader> {
    if tree.tag() != TermTag::SmallTuple {
        return Err(CouchError::UnexpectedHeaderTag(tree.tag().name().to_string()));
    }
    let tag = tree.child(0)?;
    match tag.atom() {
        Ok(HEADER_ATOM) => {}
        Ok(other) => return Err(CouchError::UnexpectedHeaderTag(other.to_string())),
        Err(_) => return Err(CouchError::UnexpectedHeaderTag(tag.tag().name().to_string())),
    }
    Ok(FileHeader {
        disk_version: tree.child(1)?.as_u8()?,
        update_seq: tree.child(2)?.as_i64()?,
        id_tree_root: TreeState::from_tree(tree.child(4)?)?,
        seq_tree_root: TreeState::from_tree(tree.child(5)?)?,
    })
}
