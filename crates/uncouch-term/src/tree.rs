use std::fmt;

use crate::decoder::TermDecoder;
use crate::error::{TermError, TermResult};
use crate::term::{Term, TermTag};

/// Nesting ceiling applied by [`TermTreeBuilder::default`].
pub const DEFAULT_MAX_DEPTH: usize = 1024;

/// A term together with the children that followed it in the stream.
///
/// Tuples own exactly `arity` children. Lists own `len + 1`, the last of
/// which is always the trailing nil.
#[derive(Clone, Debug, PartialEq)]
pub struct TermTree {
    pub term: Term,
    pub children: Vec<TermTree>,
}

/// Builds [`TermTree`]s from a [`TermDecoder`], refusing inputs nested deeper
/// than `max_depth`.
#[derive(Clone, Copy, Debug)]
pub struct TermTreeBuilder {
    max_depth: usize,
}

impl Default for TermTreeBuilder {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl TermTreeBuilder {
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// Scan one term and, recursively, everything it owns.
    pub fn build(&self, decoder: &mut TermDecoder<'_>) -> TermResult<TermTree> {
        self.build_at(decoder, 0)
    }

    fn build_at(&self, decoder: &mut TermDecoder<'_>, depth: usize) -> TermResult<TermTree> {
        if depth > self.max_depth {
            return Err(TermError::DepthExceeded {
                limit: self.max_depth,
            });
        }
        let term = decoder.scan()?;
        let count = term.child_count();
        let is_list = matches!(term, Term::List(_));

        let mut children = Vec::with_capacity(count.min(decoder.remaining()));
        for i in 0..count {
            let offset = decoder.position();
            let child = self.build_at(decoder, depth + 1)?;
            if is_list && i + 1 == count && !child.term.is_nil() {
                return Err(TermError::ListMissingNil {
                    offset,
                    found: child.term.tag(),
                });
            }
            children.push(child);
        }
        Ok(TermTree { term, children })
    }
}

impl TermTree {
    /// Decode a whole buffer as a single tree with the default depth limit.
    pub fn from_bytes(data: &[u8]) -> TermResult<Self> {
        TermTreeBuilder::default().build(&mut TermDecoder::new(data))
    }

    pub fn tag(&self) -> TermTag {
        self.term.tag()
    }

    pub fn child(&self, index: usize) -> TermResult<&TermTree> {
        self.children.get(index).ok_or(TermError::MissingChild {
            index,
            arity: self.children.len(),
        })
    }

    pub fn is_nil(&self) -> bool {
        self.term.is_nil()
    }

    pub fn atom(&self) -> TermResult<&str> {
        self.term.atom().ok_or_else(|| self.unexpected("atom"))
    }

    pub fn binary(&self) -> TermResult<&[u8]> {
        self.term.binary().ok_or_else(|| self.unexpected("binary"))
    }

    pub fn integer(&self) -> TermResult<i128> {
        self.term.integer().ok_or_else(|| self.unexpected("integer"))
    }

    pub fn as_i64(&self) -> TermResult<i64> {
        let value = self.integer()?;
        i64::try_from(value).map_err(|_| TermError::IntegerOutOfRange {
            value,
            target: "i64",
        })
    }

    pub fn as_i32(&self) -> TermResult<i32> {
        let value = self.integer()?;
        i32::try_from(value).map_err(|_| TermError::IntegerOutOfRange {
            value,
            target: "i32",
        })
    }

    pub fn as_u8(&self) -> TermResult<u8> {
        let value = self.integer()?;
        u8::try_from(value).map_err(|_| TermError::IntegerOutOfRange {
            value,
            target: "u8",
        })
    }

    /// Elements of a tuple.
    pub fn tuple(&self) -> TermResult<&[TermTree]> {
        match self.term {
            Term::SmallTuple(_) => Ok(&self.children),
            _ => Err(self.unexpected("tuple")),
        }
    }

    /// Elements of a list without its trailing nil. A bare nil is the empty
    /// list.
    pub fn elements(&self) -> TermResult<&[TermTree]> {
        match self.term {
            Term::List(_) => Ok(&self.children[..self.children.len().saturating_sub(1)]),
            Term::Nil => Ok(&[]),
            _ => Err(self.unexpected("list")),
        }
    }

    fn unexpected(&self, expected: &'static str) -> TermError {
        TermError::UnexpectedTerm {
            expected,
            found: self.tag(),
        }
    }

    fn fmt_at(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        write!(f, "{:indent$}{depth} ", "", indent = depth * 2)?;
        match &self.term {
            Term::NewFloat(v) => writeln!(f, "float {v}")?,
            Term::SmallInteger(v) => writeln!(f, "small int {v}")?,
            Term::Integer(v) => writeln!(f, "int {v}")?,
            Term::SmallBig(v) => writeln!(f, "big int {v}")?,
            Term::Atom(name) => writeln!(f, "atom {name}")?,
            Term::SmallTuple(arity) => writeln!(f, "tuple/{arity}")?,
            Term::Nil => writeln!(f, "nil")?,
            Term::String(bytes) => writeln!(f, "string {bytes:?}")?,
            Term::List(len) => writeln!(f, "list/{len}")?,
            Term::Binary(bytes) => writeln!(
                f,
                "binary {} {:?}",
                hex::encode(bytes),
                String::from_utf8_lossy(bytes)
            )?,
        }
        for child in &self.children {
            child.fmt_at(f, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for TermTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_at(f, 0)
    }
}
