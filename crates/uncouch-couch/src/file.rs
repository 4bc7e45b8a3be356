use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use tracing::{debug, info};
use uncouch_block::BlockReader;
use uncouch_term::TermTree;

use crate::error::{CouchError, CouchResult};
use crate::header::{find_header, parse_header, FileHeader};
use crate::node::{Node, NodeKind, TreeKind};
use crate::render::render_json;
use crate::stream::{DocumentStream, ExtractOptions};

/// What [`CouchFile::visit_nodes`] hands its visitor for every node.
#[derive(Debug)]
pub struct NodeVisit<'a> {
    pub offset: u64,
    pub tree: TreeKind,
    pub kind: NodeKind,
    /// Decompressed term bytes of the node.
    pub payload: &'a [u8],
    pub node: &'a Node,
}

/// An open CouchDB database file with its latest header.
#[derive(Debug)]
pub struct CouchFile<R> {
    reader: BlockReader<R>,
    size: u64,
    header_offset: u64,
    header: FileHeader,
}

impl CouchFile<BufReader<File>> {
    pub fn open_path(path: &Path) -> CouchResult<Self> {
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        Self::open(BufReader::new(file), size)
    }
}

impl<R: Read + Seek> CouchFile<R> {
    /// Locate and parse the newest header of a `size`-byte file.
    pub fn open(mut input: R, size: u64) -> CouchResult<Self> {
        let header_offset = find_header(&mut input, size)?;
        let mut reader = BlockReader::new(input);
        let payload = reader.read_header_payload(header_offset)?;
        let header = parse_header(&TermTree::from_bytes(&payload)?)?;
        info!(
            header_offset,
            disk_version = header.disk_version,
            update_seq = header.update_seq,
            "opened database file"
        );
        Ok(Self {
            reader,
            size,
            header_offset,
            header,
        })
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    pub fn header_offset(&self) -> u64 {
        self.header_offset
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn into_inner(self) -> R {
        self.reader.into_inner()
    }

    /// Root offset of `tree`, `None` for an empty tree.
    pub fn root(&self, tree: TreeKind) -> Option<u64> {
        let state = match tree {
            TreeKind::ById => self.header.id_tree_root,
            TreeKind::BySeq => self.header.seq_tree_root,
        };
        (!state.is_empty()).then_some(state.offset as u64)
    }

    /// Decompressed term bytes of the node at `offset`.
    pub fn read_node_bytes(&mut self, offset: u64) -> CouchResult<Vec<u8>> {
        Ok(self.reader.read_node_payload(offset)?)
    }

    /// Term tree of the node at `offset`.
    pub fn read_node_tree(&mut self, offset: u64) -> CouchResult<TermTree> {
        let payload = self.read_node_bytes(offset)?;
        Ok(TermTree::from_bytes(&payload)?)
    }

    /// Decode the node at `offset`. Offset `0` is the empty tree.
    pub fn read_node(&mut self, offset: u64, tree: TreeKind) -> CouchResult<Option<Node>> {
        if offset == 0 {
            return Ok(None);
        }
        let node = Node::parse(&self.read_node_tree(offset)?, tree, offset)?;
        debug!(offset, %tree, kind = %node.kind(), "read node");
        Ok(Some(node))
    }

    /// JSON text of the document body stored at `offset`.
    pub fn render_document(&mut self, offset: i64) -> CouchResult<String> {
        let offset = u64::try_from(offset).map_err(|_| CouchError::InvalidOffset(offset))?;
        let payload = self.reader.read_document_payload(offset)?;
        render_json(&payload)
    }

    /// Walk every node of `tree` depth-first, left to right. Returns the
    /// number of nodes visited.
    pub fn visit_nodes<F>(&mut self, tree: TreeKind, mut visitor: F) -> CouchResult<usize>
    where
        F: FnMut(NodeVisit<'_>) -> CouchResult<()>,
    {
        let mut stack: Vec<u64> = self.root(tree).into_iter().collect();
        let mut visited = 0;
        while let Some(offset) = stack.pop() {
            let payload = self.read_node_bytes(offset)?;
            let node = Node::parse(&TermTree::from_bytes(&payload)?, tree, offset)?;
            visitor(NodeVisit {
                offset,
                tree,
                kind: node.kind(),
                payload: &payload,
                node: &node,
            })?;
            visited += 1;
            if let Node::Pointers(pointers) = &node {
                for pointer in pointers.iter().rev() {
                    stack.extend(child_offset(pointer.offset, offset)?);
                }
            }
        }
        Ok(visited)
    }

    /// Stream the documents of the by-sequence tree in update order.
    pub fn into_documents(self, options: ExtractOptions) -> DocumentStream<R> {
        DocumentStream::new(self, options)
    }
}

/// Child offset of a pointer stored in the node at `parent`; `None` for an
/// absent subtree. The file is append-only, so a child always lies before
/// its parent.
pub(crate) fn child_offset(offset: i64, parent: u64) -> CouchResult<Option<u64>> {
    let child = u64::try_from(offset).map_err(|_| CouchError::InvalidOffset(offset))?;
    if child == 0 {
        return Ok(None);
    }
    if child >= parent {
        return Err(CouchError::ForwardPointer { parent, child });
    }
    Ok(Some(child))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use uncouch_testkit::shapes::{db_header, kp_node, kv_node, seq_pointer, seq_row, Rev};
    use uncouch_testkit::{empty_db, single_leaf_db, Compression, CouchFileBuilder, Value};

    fn open(image: Vec<u8>) -> CouchFile<Cursor<Vec<u8>>> {
        let size = image.len() as u64;
        CouchFile::open(Cursor::new(image), size).unwrap()
    }

    #[test]
    fn opens_and_caches_header() {
        let file = open(single_leaf_db(&[("a", Value::object(vec![]))]));
        assert_eq!(file.header().update_seq, 1);
        assert!(file.root(TreeKind::BySeq).is_some());
        assert!(file.root(TreeKind::ById).is_some());
        assert_eq!(file.header_offset() % 4096, 1);
    }

    #[test]
    fn empty_database_has_no_roots() {
        let mut file = open(empty_db());
        assert_eq!(file.root(TreeKind::BySeq), None);
        assert_eq!(file.read_node(0, TreeKind::BySeq).unwrap(), None);
        assert_eq!(file.visit_nodes(TreeKind::ById, |_| Ok(())).unwrap(), 0);
    }

    #[test]
    fn renders_document_body() {
        let mut builder = CouchFileBuilder::new();
        let body = builder.append_document(
            &Value::object(vec![("n", Value::int(3))]),
            Compression::None,
        );
        let leaf = builder.append_node(
            &kv_node(vec![seq_row(1, "d", false, &[Rev::stored(b"\x01", body, 1)])]),
            Compression::Snappy,
        );
        builder.write_header(&db_header(1, None, Some((leaf, 10))));
        let mut file = open(builder.finish());
        assert_eq!(file.render_document(body as i64).unwrap(), r#"{"n":3}"#);
        assert!(matches!(file.render_document(-1), Err(CouchError::InvalidOffset(-1))));
    }

    #[test]
    fn open_path_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.couch");
        std::fs::write(&path, single_leaf_db(&[("a", Value::int(1))])).unwrap();
        let file = CouchFile::open_path(&path).unwrap();
        assert_eq!(file.size(), std::fs::metadata(&path).unwrap().len());
    }

    #[test]
    fn visit_reports_nodes_with_payloads() {
        let mut file = open(single_leaf_db(&[("a", Value::int(1)), ("b", Value::int(2))]));
        let mut seen = Vec::new();
        let count = file
            .visit_nodes(TreeKind::ById, |visit| {
                assert!(!visit.payload.is_empty());
                seen.push((visit.tree.to_string(), visit.kind.to_string()));
                Ok(())
            })
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(seen, vec![("id".to_string(), "kv".to_string())]);
    }

    #[test]
    fn visit_skips_absent_subtrees_and_rejects_forward_pointers() {
        let mut builder = CouchFileBuilder::new();
        let body = builder.append_document(&Value::int(1), Compression::None);
        let leaf = builder.append_node(
            &kv_node(vec![seq_row(1, "a", false, &[Rev::stored(b"\x01", body, 1)])]),
            Compression::Snappy,
        );
        let root = builder.append_node(
            &kp_node(vec![seq_pointer(0, 0, 0), seq_pointer(1, leaf, 1)]),
            Compression::Snappy,
        );
        builder.write_header(&db_header(1, None, Some((root, 10))));
        let mut file = open(builder.finish());
        let mut offsets = Vec::new();
        file.visit_nodes(TreeKind::BySeq, |visit| {
            offsets.push(visit.offset);
            Ok(())
        })
        .unwrap();
        assert_eq!(offsets, vec![root, leaf]);

        let mut builder = CouchFileBuilder::new();
        builder.append_chunk(b"padding");
        let here = builder.position();
        let root = builder.append_node(
            &kp_node(vec![seq_pointer(1, here + 4096, 1)]),
            Compression::None,
        );
        builder.write_header(&db_header(1, None, Some((root, 10))));
        let mut file = open(builder.finish());
        assert!(matches!(
            file.visit_nodes(TreeKind::BySeq, |_| Ok(())),
            Err(CouchError::ForwardPointer { child, .. }) if child == here + 4096
        ));
    }

    #[test]
    fn nodes_written_with_a_digest() {
        let mut builder = CouchFileBuilder::new();
        let body = builder.append_document(
            &Value::object(vec![("k", Value::int(7))]),
            Compression::Snappy,
        );
        let leaf = builder.append_node_with_digest(&kv_node(vec![seq_row(
            1,
            "md5",
            false,
            &[Rev::stored(b"\x01", body, 1)],
        )]));
        builder.write_header(&db_header(1, None, Some((leaf, 10))));
        let file = open(builder.finish());
        let lines: Vec<String> = file
            .into_documents(ExtractOptions::new("db"))
            .map(|doc| doc.unwrap().to_json_line().unwrap())
            .collect();
        assert_eq!(lines, vec![r#"{"_id":"md5","_db":"db","doc":{"k":7}}"#.to_string()]);
    }
}
