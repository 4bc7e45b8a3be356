use thiserror::Error;

#[derive(Debug, Error)]
pub enum BlockError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("file truncated: wanted {wanted} bytes at offset {offset}")]
    Truncated { offset: u64, wanted: usize },

    #[error("empty payload at offset {offset}")]
    EmptyPayload { offset: u64 },

    #[error("unknown block prefix {0}")]
    UnknownBlockPrefix(u8),

    #[error("deflate decompression is not implemented")]
    DeflateNotSupported,

    #[error("unknown document block header {0:#010x}")]
    UnknownDocumentHeader(u32),

    #[error("snappy decompression failed: {0}")]
    Snappy(String),

    #[error("document body declares {declared} bytes but only {available} are stored")]
    DocumentSizeMismatch { declared: usize, available: usize },
}

pub type BlockResult<T> = Result<T, BlockError>;
