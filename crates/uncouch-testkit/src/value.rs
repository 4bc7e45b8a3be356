use uncouch_term::TermTag;

/// A term to encode, in the shape CouchDB writes it.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Float(f64),
    Int(i64),
    Atom(String),
    /// Atom written with `SMALL_ATOM_UTF8_EXT`.
    SmallAtomUtf8(String),
    Tuple(Vec<Value>),
    Nil,
    /// `STRING_EXT`: a list of small integers.
    Str(Vec<u8>),
    List(Vec<Value>),
    /// A list whose trailer is not nil. Only useful for negative tests.
    ImproperList(Vec<Value>, Box<Value>),
    Binary(Vec<u8>),
}

impl Value {
    pub fn atom(name: &str) -> Self {
        Self::Atom(name.to_string())
    }

    pub fn bin(bytes: impl AsRef<[u8]>) -> Self {
        Self::Binary(bytes.as_ref().to_vec())
    }

    pub fn int(v: i64) -> Self {
        Self::Int(v)
    }

    pub fn tuple(items: Vec<Value>) -> Self {
        Self::Tuple(items)
    }

    pub fn list(items: Vec<Value>) -> Self {
        Self::List(items)
    }

    /// A JSON object the way CouchDB stores one: `{[{Key, Value}, ...]}`.
    pub fn object(pairs: Vec<(&str, Value)>) -> Self {
        let pairs = pairs
            .into_iter()
            .map(|(k, v)| Self::Tuple(vec![Self::bin(k), v]))
            .collect();
        Self::Tuple(vec![Self::List(pairs)])
    }

    /// Encoded term without the leading version magic.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_into(&mut out);
        out
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            Self::Float(v) => {
                out.push(TermTag::NewFloat.as_byte());
                out.extend_from_slice(&v.to_le_bytes());
            }
            Self::Int(v) => encode_int(*v, out),
            Self::Atom(name) => {
                out.push(TermTag::Atom.as_byte());
                out.extend_from_slice(&(name.len() as u16).to_be_bytes());
                out.extend_from_slice(name.as_bytes());
            }
            Self::SmallAtomUtf8(name) => {
                out.push(TermTag::SmallAtomUtf8.as_byte());
                out.push(name.len() as u8);
                out.extend_from_slice(name.as_bytes());
            }
            Self::Tuple(items) => {
                assert!(items.len() <= 255, "small tuples hold at most 255 elements");
                out.push(TermTag::SmallTuple.as_byte());
                out.push(items.len() as u8);
                for item in items {
                    item.encode_into(out);
                }
            }
            Self::Nil => out.push(TermTag::Nil.as_byte()),
            Self::Str(bytes) => {
                out.push(TermTag::String.as_byte());
                out.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
                out.extend_from_slice(bytes);
            }
            Self::List(items) => encode_list(items, &Self::Nil, out),
            Self::ImproperList(items, tail) => encode_list(items, tail, out),
            Self::Binary(bytes) => {
                out.push(TermTag::Binary.as_byte());
                out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
                out.extend_from_slice(bytes);
            }
        }
    }
}

fn encode_list(items: &[Value], tail: &Value, out: &mut Vec<u8>) {
    if items.is_empty() && matches!(tail, Value::Nil) {
        out.push(TermTag::Nil.as_byte());
        return;
    }
    out.push(TermTag::List.as_byte());
    out.extend_from_slice(&(items.len() as u32).to_be_bytes());
    for item in items {
        item.encode_into(out);
    }
    tail.encode_into(out);
}

fn encode_int(v: i64, out: &mut Vec<u8>) {
    if (0..=255).contains(&v) {
        out.push(TermTag::SmallInteger.as_byte());
        out.push(v as u8);
    } else if let Ok(v) = i32::try_from(v) {
        out.push(TermTag::Integer.as_byte());
        out.extend_from_slice(&v.to_be_bytes());
    } else {
        let magnitude = v.unsigned_abs().to_le_bytes();
        let digits = magnitude.iter().rposition(|&b| b != 0).map_or(1, |i| i + 1);
        out.push(TermTag::SmallBig.as_byte());
        out.push(digits as u8);
        out.push(u8::from(v < 0));
        out.extend_from_slice(&magnitude[..digits]);
    }
}
