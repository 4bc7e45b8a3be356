use crate::error::{TermError, TermResult};
use crate::term::{Term, TermTag};

/// Largest `SMALL_BIG_EXT` magnitude accepted, in bytes.
const MAX_BIG_BYTES: usize = 8;

/// Cursor over an encoded term stream.
///
/// Each [`scan`](Self::scan) consumes exactly one tag and its fixed or
/// length-prefixed payload. Composite terms are not descended into; their
/// children are simply the next terms in the stream.
#[derive(Debug, Clone)]
pub struct TermDecoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> TermDecoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Reset the cursor to the start of the buffer.
    pub fn rewind(&mut self) {
        self.pos = 0;
    }

    /// Tag of the next term without consuming it.
    pub fn peek_tag(&self) -> TermResult<TermTag> {
        let byte = *self.data.get(self.pos).ok_or(TermError::Truncated {
            offset: self.pos,
            needed: 1,
            available: 0,
        })?;
        TermTag::from_byte(byte).ok_or(TermError::UnhandledTermType {
            tag: byte,
            offset: self.pos,
        })
    }

    /// Decode the next term and advance past it.
    pub fn scan(&mut self) -> TermResult<Term> {
        let start = self.pos;
        let byte = self.take_u8()?;
        let tag = TermTag::from_byte(byte).ok_or(TermError::UnhandledTermType {
            tag: byte,
            offset: start,
        })?;

        let term = match tag {
            TermTag::NewFloat => {
                let bytes = self.take_array::<8>()?;
                Term::NewFloat(f64::from_le_bytes(bytes))
            }
            TermTag::SmallInteger => Term::SmallInteger(self.take_u8()?),
            TermTag::Integer => Term::Integer(i32::from_be_bytes(self.take_array::<4>()?)),
            TermTag::Atom | TermTag::AtomUtf8 => {
                let len = usize::from(self.take_u16()?);
                Term::Atom(String::from_utf8_lossy(self.take(len)?).into_owned())
            }
            TermTag::SmallAtomUtf8 => {
                let len = usize::from(self.take_u8()?);
                Term::Atom(String::from_utf8_lossy(self.take(len)?).into_owned())
            }
            TermTag::SmallTuple => Term::SmallTuple(self.take_u8()?),
            TermTag::Nil => Term::Nil,
            TermTag::String => {
                let len = usize::from(self.take_u16()?);
                Term::String(self.take(len)?.to_vec())
            }
            TermTag::List => Term::List(self.take_u32()?),
            TermTag::Binary => {
                let len = self.take_u32()? as usize;
                Term::Binary(self.take(len)?.to_vec())
            }
            TermTag::SmallBig => self.small_big(start)?,
        };
        Ok(term)
    }

    fn small_big(&mut self, start: usize) -> TermResult<Term> {
        let len = usize::from(self.take_u8()?);
        let sign = self.take_u8()?;
        if len > MAX_BIG_BYTES {
            return Err(TermError::BigIntegerTooLarge {
                offset: start,
                bytes: len,
            });
        }
        let digits = self.take(len)?;
        let magnitude = digits
            .iter()
            .rev()
            .fold(0u64, |acc, &d| (acc << 8) | u64::from(d));
        let value = i128::from(magnitude);
        Ok(Term::SmallBig(if sign == 0 { value } else { -value }))
    }

    fn take(&mut self, n: usize) -> TermResult<&'a [u8]> {
        let available = self.remaining();
        if n > available {
            return Err(TermError::Truncated {
                offset: self.pos,
                needed: n,
                available,
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> TermResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn take_u8(&mut self) -> TermResult<u8> {
        Ok(self.take_array::<1>()?[0])
    }

    fn take_u16(&mut self) -> TermResult<u16> {
        Ok(u16::from_be_bytes(self.take_array::<2>()?))
    }

    fn take_u32(&mut self) -> TermResult<u32> {
        Ok(u32::from_be_bytes(self.take_array::<4>()?))
    }
}
