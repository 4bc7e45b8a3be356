use uncouch_block::{insert_markers, BLOCK_SIZE, MD5_FLAG, MD5_LEN, SNAPPY_PREFIX, TERM_MAGIC};

use crate::value::Value;

/// How a node or document body is stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Compression {
    None,
    Snappy,
}

/// Appends chunks to an in-memory `.couch` image, inserting block markers
/// exactly where CouchDB would.
#[derive(Debug, Default)]
pub struct CouchFileBuilder {
    data: Vec<u8>,
}

impl CouchFileBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw position the next chunk will start at.
    pub fn position(&self) -> u64 {
        self.data.len() as u64
    }

    /// Append logical bytes, with a `0` marker at every boundary crossed.
    pub fn push_logical(&mut self, bytes: &[u8]) {
        let framed = insert_markers(bytes, self.position(), 0);
        self.data.extend_from_slice(&framed);
    }

    /// Zero-fill up to the next block boundary.
    pub fn pad_to_block(&mut self) {
        let rem = self.position() % BLOCK_SIZE;
        if rem != 0 {
            let len = self.data.len() + (BLOCK_SIZE - rem) as usize;
            self.data.resize(len, 0);
        }
    }

    /// Length-prefixed chunk; returns its offset.
    pub fn append_chunk(&mut self, payload: &[u8]) -> u64 {
        self.append_prefixed(payload.len() as u32, payload)
    }

    fn append_prefixed(&mut self, prefix: u32, payload: &[u8]) -> u64 {
        let offset = self.position();
        let mut logical = prefix.to_be_bytes().to_vec();
        logical.extend_from_slice(payload);
        self.push_logical(&logical);
        offset
    }

    /// B-tree node chunk; returns its offset.
    pub fn append_node(&mut self, node: &Value, compression: Compression) -> u64 {
        let payload = stored_term(node, compression);
        self.append_chunk(&payload)
    }

    /// Node chunk written with an md5 digest in front.
    pub fn append_node_with_digest(&mut self, node: &Value) -> u64 {
        let mut data = vec![0u8; MD5_LEN];
        data.extend(stored_term(node, Compression::None));
        self.append_prefixed((data.len() - MD5_LEN) as u32 | MD5_FLAG, &data)
    }

    /// Document summary chunk holding `body`; returns its offset.
    pub fn append_document(&mut self, body: &Value, compression: Compression) -> u64 {
        let stored = stored_term(body, compression);
        // {Body, Atts} as written by couch_bt_engine, with the body binary
        // first and an empty attachment list.
        let mut data = vec![0u8; MD5_LEN];
        data.extend_from_slice(&[TERM_MAGIC, b'h', 2, b'm']);
        data.extend_from_slice(&(stored.len() as u32).to_be_bytes());
        data.extend_from_slice(&stored);
        data.push(b'j');
        self.append_prefixed((data.len() - MD5_LEN) as u32 | MD5_FLAG, &data)
    }

    /// Header at the next block boundary; returns the offset just past
    /// its `1` marker.
    pub fn write_header(&mut self, header: &Value) -> u64 {
        self.pad_to_block();
        self.data.push(1);
        let mut data = vec![0u8; MD5_LEN];
        data.push(TERM_MAGIC);
        header.encode_into(&mut data);
        self.append_chunk(&data)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn finish(self) -> Vec<u8> {
        self.data
    }
}

/// Term bytes as they appear inside a node or document chunk.
pub fn stored_term(value: &Value, compression: Compression) -> Vec<u8> {
    let mut term = vec![TERM_MAGIC];
    value.encode_into(&mut term);
    match compression {
        Compression::None => term,
        Compression::Snappy => {
            let mut out = vec![SNAPPY_PREFIX];
            out.extend(
                snap::raw::Encoder::new()
                    .compress_vec(&term)
                    .expect("snappy compression of an in-memory buffer"),
            );
            out
        }
    }
}
