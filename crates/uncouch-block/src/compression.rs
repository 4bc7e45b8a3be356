use tracing::debug;

use crate::error::{BlockError, BlockResult};

/// Leading byte of a snappy-compressed term.
pub const SNAPPY_PREFIX: u8 = 1;
/// Version magic that opens every `term_to_binary` output.
pub const TERM_MAGIC: u8 = 131;
/// Byte after [`TERM_MAGIC`] marking a zlib-compressed term.
pub const DEFLATE_TAG: u8 = 80;

/// Turn a stored term payload into plain term bytes, without the leading
/// [`TERM_MAGIC`].
pub fn decompress(buf: &[u8]) -> BlockResult<Vec<u8>> {
    let (&prefix, rest) = buf
        .split_first()
        .ok_or(BlockError::EmptyPayload { offset: 0 })?;
    match prefix {
        SNAPPY_PREFIX => {
            let plain = snap::raw::Decoder::new()
                .decompress_vec(rest)
                .map_err(|e| BlockError::Snappy(e.to_string()))?;
            debug!(compressed = rest.len(), plain = plain.len(), "snappy payload");
            match plain.split_first() {
                Some((_, term)) => Ok(term.to_vec()),
                None => Err(BlockError::EmptyPayload { offset: 0 }),
            }
        }
        TERM_MAGIC => {
            if rest.first() == Some(&DEFLATE_TAG) {
                return Err(BlockError::DeflateNotSupported);
            }
            Ok(rest.to_vec())
        }
        other => Err(BlockError::UnknownBlockPrefix(other)),
    }
}
