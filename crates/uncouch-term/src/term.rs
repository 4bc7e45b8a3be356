use std::fmt;

/// Leading tag byte of an encoded term.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TermTag {
    /// `NEW_FLOAT_EXT` ('F'): 8 bytes of IEEE-754 bits.
    NewFloat = b'F',
    /// `SMALL_INTEGER_EXT` ('a'): one unsigned byte.
    SmallInteger = b'a',
    /// `INTEGER_EXT` ('b'): 32-bit signed, big-endian.
    Integer = b'b',
    /// `ATOM_EXT` ('d'): u16 length + name.
    Atom = b'd',
    /// `SMALL_TUPLE_EXT` ('h'): u8 arity, elements follow.
    SmallTuple = b'h',
    /// `NIL_EXT` ('j'): the empty list.
    Nil = b'j',
    /// `STRING_EXT` ('k'): u16 length + bytes, really a list of small integers.
    String = b'k',
    /// `LIST_EXT` ('l'): u32 length, elements and a trailing nil follow.
    List = b'l',
    /// `BINARY_EXT` ('m'): u32 length + raw bytes.
    Binary = b'm',
    /// `SMALL_BIG_EXT` ('n'): u8 digit count, sign byte, little-endian digits.
    SmallBig = b'n',
    /// `ATOM_UTF8_EXT` ('v'): u16 length + UTF-8 name.
    AtomUtf8 = b'v',
    /// `SMALL_ATOM_UTF8_EXT` ('w'): u8 length + UTF-8 name.
    SmallAtomUtf8 = b'w',
}

impl TermTag {
    /// Parse a tag byte; `None` for tags outside the supported subset.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'F' => Some(Self::NewFloat),
            b'a' => Some(Self::SmallInteger),
            b'b' => Some(Self::Integer),
            b'd' => Some(Self::Atom),
            b'h' => Some(Self::SmallTuple),
            b'j' => Some(Self::Nil),
            b'k' => Some(Self::String),
            b'l' => Some(Self::List),
            b'm' => Some(Self::Binary),
            b'n' => Some(Self::SmallBig),
            b'v' => Some(Self::AtomUtf8),
            b'w' => Some(Self::SmallAtomUtf8),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::NewFloat => "new float",
            Self::SmallInteger => "small integer",
            Self::Integer => "integer",
            Self::Atom | Self::AtomUtf8 | Self::SmallAtomUtf8 => "atom",
            Self::SmallTuple => "small tuple",
            Self::Nil => "nil",
            Self::String => "string",
            Self::List => "list",
            Self::Binary => "binary",
            Self::SmallBig => "small big",
        }
    }
}

impl fmt::Display for TermTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.as_byte())
    }
}

/// One decoded unit of the term stream.
///
/// Composite terms only carry their element count. The elements themselves
/// are the next terms in the stream; [`crate::TermTree`] materializes them.
#[derive(Clone, Debug, PartialEq)]
pub enum Term {
    NewFloat(f64),
    SmallInteger(u8),
    Integer(i32),
    SmallBig(i128),
    Atom(String),
    SmallTuple(u8),
    Nil,
    String(Vec<u8>),
    List(u32),
    Binary(Vec<u8>),
}

impl Term {
    /// The canonical tag for this term. All atom encodings report [`TermTag::Atom`].
    pub fn tag(&self) -> TermTag {
        match self {
            Self::NewFloat(_) => TermTag::NewFloat,
            Self::SmallInteger(_) => TermTag::SmallInteger,
            Self::Integer(_) => TermTag::Integer,
            Self::SmallBig(_) => TermTag::SmallBig,
            Self::Atom(_) => TermTag::Atom,
            Self::SmallTuple(_) => TermTag::SmallTuple,
            Self::Nil => TermTag::Nil,
            Self::String(_) => TermTag::String,
            Self::List(_) => TermTag::List,
            Self::Binary(_) => TermTag::Binary,
        }
    }

    /// Any of the integer encodings, widened.
    pub fn integer(&self) -> Option<i128> {
        match self {
            Self::SmallInteger(v) => Some(i128::from(*v)),
            Self::Integer(v) => Some(i128::from(*v)),
            Self::SmallBig(v) => Some(*v),
            _ => None,
        }
    }

    pub fn atom(&self) -> Option<&str> {
        match self {
            Self::Atom(name) => Some(name),
            _ => None,
        }
    }

    pub fn binary(&self) -> Option<&[u8]> {
        match self {
            Self::Binary(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    /// Number of child terms that follow this one in the stream.
    pub fn child_count(&self) -> usize {
        match self {
            Self::SmallTuple(arity) => usize::from(*arity),
            // The trailing nil is a child too.
            Self::List(len) => *len as usize + 1,
            _ => 0,
        }
    }
}
