use std::io::{ErrorKind, Read, Seek, SeekFrom};

use tracing::{debug, warn};

use crate::compression::{decompress, TERM_MAGIC};
use crate::error::{BlockError, BlockResult};
use crate::framing::{raw_len, strip_markers};

/// Length of the md5 digest stored in front of checksummed chunks.
pub const MD5_LEN: usize = 16;
/// Top bit of a chunk length prefix: an md5 digest precedes the data.
pub const MD5_FLAG: u32 = 1 << 31;
/// Bytes in front of a header term: the md5 digest and the term magic.
pub const HEADER_PREFIX_LEN: usize = MD5_LEN + 1;
/// Bytes in front of a document body length: md5, term magic, a 2-tuple
/// header and the binary tag.
const DOCUMENT_PREFIX_LEN: usize = MD5_LEN + 4;

/// Reads deframed chunks out of a seekable CouchDB file.
#[derive(Debug)]
pub struct BlockReader<R> {
    inner: R,
}

impl<R: Read + Seek> BlockReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Read `size` logical bytes at raw position `offset`.
    ///
    /// Returns the payload and the number of raw bytes it occupied, so the
    /// next chunk starts at `offset + raw`.
    pub fn read_range(&mut self, offset: u64, size: usize) -> BlockResult<(Vec<u8>, u64)> {
        let raw = raw_len(offset, size);
        self.inner.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; raw];
        self.inner.read_exact(&mut buf).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => BlockError::Truncated {
                offset,
                wanted: raw,
            },
            _ => BlockError::Io(e),
        })?;
        let payload = strip_markers(&buf, offset);
        debug_assert_eq!(payload.len(), size);
        Ok((payload, raw as u64))
    }

    /// Big-endian `u32` at `offset` and the raw bytes it spanned.
    pub fn read_u32(&mut self, offset: u64) -> BlockResult<(u32, u64)> {
        let (bytes, raw) = self.read_range(offset, 4)?;
        let mut be = [0u8; 4];
        be.copy_from_slice(&bytes);
        Ok((u32::from_be_bytes(be), raw))
    }

    /// Length-prefixed chunk. Returns the payload and the raw bytes taken
    /// by the length prefix.
    pub fn read_length_prefixed(&mut self, offset: u64) -> BlockResult<(Vec<u8>, u64)> {
        let (len, prefix_raw) = self.read_u32(offset)?;
        let (payload, _) = self.read_range(offset + prefix_raw, len as usize)?;
        Ok((payload, prefix_raw))
    }

    /// Term bytes of the header written at `offset` (just past its block
    /// marker).
    pub fn read_header_payload(&mut self, offset: u64) -> BlockResult<Vec<u8>> {
        let (payload, _) = self.read_length_prefixed(offset)?;
        if payload.len() < HEADER_PREFIX_LEN {
            return Err(BlockError::Truncated {
                offset,
                wanted: HEADER_PREFIX_LEN,
            });
        }
        if payload[MD5_LEN] != TERM_MAGIC {
            warn!(offset, magic = payload[MD5_LEN], "unexpected header magic");
        }
        debug!(offset, len = payload.len(), "header payload");
        Ok(payload[HEADER_PREFIX_LEN..].to_vec())
    }

    /// Decompressed term bytes of the B-tree node at `offset`.
    pub fn read_node_payload(&mut self, offset: u64) -> BlockResult<Vec<u8>> {
        let (prefix, prefix_raw) = self.read_u32(offset)?;
        let (size, digest) = if prefix & MD5_FLAG != 0 {
            ((prefix & !MD5_FLAG) as usize, MD5_LEN)
        } else {
            (prefix as usize, 0)
        };
        let (payload, _) = self.read_range(offset + prefix_raw, size + digest)?;
        let data = &payload[digest..];
        if data.is_empty() {
            return Err(BlockError::EmptyPayload { offset });
        }
        debug!(offset, len = data.len(), md5 = digest != 0, "node payload");
        decompress(data)
    }

    /// Decompressed body term of the document summary at `offset`.
    pub fn read_document_payload(&mut self, offset: u64) -> BlockResult<Vec<u8>> {
        let (prefix, prefix_raw) = self.read_u32(offset)?;
        if prefix & MD5_FLAG == 0 {
            return Err(BlockError::UnknownDocumentHeader(prefix));
        }
        let size = (prefix & !MD5_FLAG) as usize;
        let (payload, _) = self.read_range(offset + prefix_raw, size + MD5_LEN)?;
        let body_at = DOCUMENT_PREFIX_LEN + 4;
        if payload.len() < body_at {
            return Err(BlockError::DocumentSizeMismatch {
                declared: body_at,
                available: payload.len(),
            });
        }
        let mut be = [0u8; 4];
        be.copy_from_slice(&payload[DOCUMENT_PREFIX_LEN..body_at]);
        let declared = u32::from_be_bytes(be) as usize;
        let available = payload.len() - body_at;
        if declared > available {
            return Err(BlockError::DocumentSizeMismatch {
                declared,
                available,
            });
        }
        if declared == 0 {
            return Err(BlockError::EmptyPayload { offset });
        }
        debug!(offset, len = declared, "document payload");
        decompress(&payload[body_at..body_at + declared])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::{DEFLATE_TAG, SNAPPY_PREFIX};
    use crate::framing::insert_markers;
    use std::io::Cursor;

    /// Place `logical` at raw `offset` inside an otherwise zeroed image.
    fn image_with(offset: u64, logical: &[u8]) -> Vec<u8> {
        let framed = insert_markers(logical, offset, 0);
        let mut image = vec![0u8; offset as usize];
        image.extend_from_slice(&framed);
        image
    }

    fn chunk(payload: &[u8], prefix: u32) -> Vec<u8> {
        let mut out = prefix.to_be_bytes().to_vec();
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn range_across_boundary() {
        let logical: Vec<u8> = (0..200).collect();
        let image = image_with(4000, &logical);
        let mut reader = BlockReader::new(Cursor::new(image));
        let (payload, raw) = reader.read_range(4000, 200).unwrap();
        assert_eq!(payload, logical);
        assert_eq!(raw, 201);
    }

    #[test]
    fn length_prefix_split_by_boundary() {
        let payload = b"hello world".to_vec();
        let logical = chunk(&payload, payload.len() as u32);
        // Prefix straddles the boundary at 4096.
        let image = image_with(4094, &logical);
        let mut reader = BlockReader::new(Cursor::new(image));
        let (got, prefix_raw) = reader.read_length_prefixed(4094).unwrap();
        assert_eq!(got, payload);
        assert_eq!(prefix_raw, 5);
    }

    #[test]
    fn truncated_read() {
        let mut reader = BlockReader::new(Cursor::new(vec![0u8; 10]));
        assert!(matches!(
            reader.read_range(5, 20),
            Err(BlockError::Truncated { offset: 5, .. })
        ));
    }

    #[test]
    fn header_payload_skips_digest_and_magic() {
        let mut body = vec![0xAB; MD5_LEN];
        body.push(TERM_MAGIC);
        body.extend_from_slice(&[b'h', 0]);
        let image = image_with(4097, &chunk(&body, body.len() as u32));
        let mut reader = BlockReader::new(Cursor::new(image));
        assert_eq!(reader.read_header_payload(4097).unwrap(), vec![b'h', 0]);
    }

    #[test]
    fn node_payload_plain_and_snappy() {
        let plain = chunk(&[TERM_MAGIC, b'j'], 2);
        let mut reader = BlockReader::new(Cursor::new(image_with(10, &plain)));
        assert_eq!(reader.read_node_payload(10).unwrap(), vec![b'j']);

        let mut compressed = vec![SNAPPY_PREFIX];
        compressed.extend(
            snap::raw::Encoder::new()
                .compress_vec(&[TERM_MAGIC, b'a', 42])
                .unwrap(),
        );
        let image = image_with(4090, &chunk(&compressed, compressed.len() as u32));
        let mut reader = BlockReader::new(Cursor::new(image));
        assert_eq!(reader.read_node_payload(4090).unwrap(), vec![b'a', 42]);
    }

    #[test]
    fn node_payload_with_digest() {
        let mut body = vec![0u8; MD5_LEN];
        body.extend_from_slice(&[TERM_MAGIC, b'j']);
        let image = image_with(0, &chunk(&body, 2 | MD5_FLAG));
        let mut reader = BlockReader::new(Cursor::new(image));
        assert_eq!(reader.read_node_payload(0).unwrap(), vec![b'j']);
    }

    #[test]
    fn node_payload_deflate() {
        let image = image_with(10, &chunk(&[TERM_MAGIC, DEFLATE_TAG, 0], 3));
        let mut reader = BlockReader::new(Cursor::new(image));
        assert!(matches!(
            reader.read_node_payload(10),
            Err(BlockError::DeflateNotSupported)
        ));
    }

    fn document_chunk(body: &[u8]) -> Vec<u8> {
        let mut data = vec![0u8; MD5_LEN];
        data.extend_from_slice(&[TERM_MAGIC, b'h', 2, b'm']);
        data.extend_from_slice(&(body.len() as u32).to_be_bytes());
        data.extend_from_slice(body);
        // Attachment list after the body binary.
        data.push(b'j');
        chunk(&data, (data.len() - MD5_LEN) as u32 | MD5_FLAG)
    }

    #[test]
    fn document_payload() {
        let image = image_with(8190, &document_chunk(&[TERM_MAGIC, b'a', 1]));
        let mut reader = BlockReader::new(Cursor::new(image));
        assert_eq!(reader.read_document_payload(8190).unwrap(), vec![b'a', 1]);
    }

    #[test]
    fn document_without_md5_flag() {
        let image = image_with(10, &chunk(&[0; 30], 30));
        let mut reader = BlockReader::new(Cursor::new(image));
        assert!(matches!(
            reader.read_document_payload(10),
            Err(BlockError::UnknownDocumentHeader(30))
        ));
    }

    #[test]
    fn document_body_longer_than_chunk() {
        let mut data = vec![0u8; MD5_LEN];
        data.extend_from_slice(&[TERM_MAGIC, b'h', 2, b'm', 0, 0, 1, 0, TERM_MAGIC]);
        let image = image_with(10, &chunk(&data, (data.len() - MD5_LEN) as u32 | MD5_FLAG));
        let mut reader = BlockReader::new(Cursor::new(image));
        assert!(matches!(
            reader.read_document_payload(10),
            Err(BlockError::DocumentSizeMismatch { declared: 256, available: 1 })
        ));
    }
}
