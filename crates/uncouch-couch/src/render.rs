use std::fmt::Write as _;

use uncouch_term::{Term, TermDecoder, TermError, DEFAULT_MAX_DEPTH};

use crate::error::{CouchError, CouchResult};

/// Render one encoded document body as JSON text.
pub fn render_json(term: &[u8]) -> CouchResult<String> {
    let mut renderer = JsonRenderer::new(term);
    renderer.value(0)?;
    Ok(renderer.out)
}

/// Streams terms straight into JSON text without building a tree.
struct JsonRenderer<'a> {
    decoder: TermDecoder<'a>,
    out: String,
}

impl<'a> JsonRenderer<'a> {
    fn new(term: &'a [u8]) -> Self {
        Self {
            decoder: TermDecoder::new(term),
            out: String::with_capacity(term.len() * 2),
        }
    }

    fn value(&mut self, depth: usize) -> CouchResult<()> {
        if depth > DEFAULT_MAX_DEPTH {
            return Err(TermError::DepthExceeded {
                limit: DEFAULT_MAX_DEPTH,
            }
            .into());
        }
        let offset = self.decoder.position();
        match self.decoder.scan()? {
            Term::NewFloat(v) => self.float(v, offset)?,
            Term::SmallInteger(v) => self.push_display(v),
            Term::Integer(v) => self.push_display(v),
            Term::SmallBig(v) => self.push_display(v),
            // true, false and null are atoms.
            Term::Atom(name) => self.out.push_str(&name),
            Term::SmallTuple(arity) => self.object(arity, offset, depth)?,
            Term::Nil => self.out.push_str("null"),
            Term::String(bytes) => {
                self.out.push('[');
                for (i, b) in bytes.iter().enumerate() {
                    if i > 0 {
                        self.out.push(',');
                    }
                    self.push_display(b);
                }
                self.out.push(']');
            }
            Term::List(len) => {
                self.out.push('[');
                for i in 0..len {
                    if i > 0 {
                        self.out.push(',');
                    }
                    self.value(depth + 1)?;
                }
                self.trailing_nil()?;
                self.out.push(']');
            }
            Term::Binary(bytes) => self.string(&bytes)?,
        }
        Ok(())
    }

    /// `{[{Key, Value}, ...]}`, or `{[]}` written as a tuple around nil.
    fn object(&mut self, arity: u8, offset: usize, depth: usize) -> CouchResult<()> {
        if arity != 1 {
            return Err(render_error(
                offset,
                format!("tuple of arity {arity} is not a JSON object"),
            ));
        }
        let list_at = self.decoder.position();
        match self.decoder.scan()? {
            Term::Nil => self.out.push_str("{}"),
            Term::List(len) => {
                self.out.push('{');
                for i in 0..len {
                    if i > 0 {
                        self.out.push(',');
                    }
                    self.pair(depth + 1)?;
                }
                self.trailing_nil()?;
                self.out.push('}');
            }
            other => {
                return Err(render_error(
                    list_at,
                    format!("JSON object should wrap a list, got {}", other.tag()),
                ))
            }
        }
        Ok(())
    }

    fn pair(&mut self, depth: usize) -> CouchResult<()> {
        let offset = self.decoder.position();
        match self.decoder.scan()? {
            Term::SmallTuple(2) => {}
            other => {
                return Err(render_error(
                    offset,
                    format!("key-value pair should be a 2-tuple, got {}", other.tag()),
                ))
            }
        }
        let key_at = self.decoder.position();
        match self.decoder.scan()? {
            Term::Binary(key) => self.string(&key)?,
            other => {
                return Err(render_error(
                    key_at,
                    format!("object key should be binary, got {}", other.tag()),
                ))
            }
        }
        self.out.push(':');
        self.value(depth + 1)
    }

    fn trailing_nil(&mut self) -> CouchResult<()> {
        let offset = self.decoder.position();
        match self.decoder.scan()? {
            Term::Nil => Ok(()),
            other => Err(TermError::ListMissingNil {
                offset,
                found: other.tag(),
            }
            .into()),
        }
    }

    fn float(&mut self, v: f64, offset: usize) -> CouchResult<()> {
        if !v.is_finite() {
            return Err(render_error(offset, format!("{v} has no JSON representation")));
        }
        let abs = v.abs();
        if abs == 0.0 || (1e-5..1e21).contains(&abs) {
            self.push_display(v);
        } else {
            let _ = write!(self.out, "{v:e}");
        }
        Ok(())
    }

    fn string(&mut self, bytes: &[u8]) -> CouchResult<()> {
        let text = String::from_utf8_lossy(bytes);
        let quoted = serde_json::to_string(text.as_ref())
            .map_err(|e| CouchError::InvalidJson(e.to_string()))?;
        self.out.push_str(&quoted);
        Ok(())
    }

    fn push_display(&mut self, v: impl std::fmt::Display) {
        let _ = write!(self.out, "{v}");
    }
}

fn render_error(offset: usize, reason: String) -> CouchError {
    CouchError::Render { offset, reason }
}
