use thiserror::Error;
use uncouch_block::BlockError;
use uncouch_term::TermError;

#[derive(Debug, Error)]
pub enum CouchError {
    #[error(transparent)]
    Block(#[from] BlockError),

    #[error(transparent)]
    Term(#[from] TermError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not find a database header in the file")]
    HeaderNotFound,

    #[error("unknown header starting byte {byte} at offset {offset}")]
    UnknownHeaderByte { offset: u64, byte: u8 },

    #[error("term header is {0:?}, expected \"db_header\"")]
    UnexpectedHeaderTag(String),

    #[error("invalid file offset {0}")]
    InvalidOffset(i64),

    #[error("node at offset {parent} points forward to offset {child}")]
    ForwardPointer { parent: u64, child: u64 },

    #[error("unknown node type {atom:?} at offset {offset}")]
    UnknownNodeType { offset: u64, atom: String },

    #[error("cannot render term as JSON at byte {offset}: {reason}")]
    Render { offset: usize, reason: String },

    #[error("invalid JSON: {0}")]
    InvalidJson(String),
}

pub type CouchResult<T> = Result<T, CouchError>;
