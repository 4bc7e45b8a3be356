use thiserror::Error;

use crate::term::TermTag;

#[derive(Debug, Error)]
pub enum TermError {
    #[error("unhandled term type {tag} at offset {offset}")]
    UnhandledTermType { tag: u8, offset: usize },

    #[error("term truncated at offset {offset}: need {needed} bytes, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("list should end with nil, but ends with {found} (offset {offset})")]
    ListMissingNil { offset: usize, found: TermTag },

    #[error("term nesting deeper than {limit} levels")]
    DepthExceeded { limit: usize },

    #[error("small big integer of {bytes} bytes at offset {offset} does not fit in 64 bits")]
    BigIntegerTooLarge { offset: usize, bytes: usize },

    #[error("expected {expected}, got {found}")]
    UnexpectedTerm {
        expected: &'static str,
        found: TermTag,
    },

    #[error("missing child {index} in term with {arity} children")]
    MissingChild { index: usize, arity: usize },

    #[error("integer {value} out of range for {target}")]
    IntegerOutOfRange { value: i128, target: &'static str },
}

pub type TermResult<T> = Result<T, TermError>;
