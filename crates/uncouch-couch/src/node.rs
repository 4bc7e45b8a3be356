use std::fmt;

use tracing::warn;
use uncouch_term::{Term, TermResult, TermTree};

use crate::error::{CouchError, CouchResult};

/// Which of the two B-trees a node belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TreeKind {
    ById,
    BySeq,
}

impl fmt::Display for TreeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ById => "id",
            Self::BySeq => "seq",
        })
    }
}

/// `kp_node` or `kv_node`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Pointer,
    Value,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pointer => "kp",
            Self::Value => "kv",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PointerKey {
    Id(Vec<u8>),
    Seq(i64),
}

/// Reference from a `kp_node` to a child node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pointer {
    pub key: PointerKey,
    pub offset: i64,
    pub count: i64,
    pub secondary_count: i64,
    pub size: i64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Sizes {
    pub active: i64,
    pub external: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Revision {
    pub rev_id: Vec<u8>,
    /// Revision number, the `N` of `N-<rev_id>`.
    pub pos: i64,
    /// Body offset, `-1` when the body is not stored.
    pub offset: i64,
    pub update_seq: i64,
    pub deleted: bool,
    pub sizes: Sizes,
}

impl Revision {
    pub fn has_body(&self) -> bool {
        self.offset >= 0
    }

    /// `N-hex` as CouchDB shows it in `_rev`.
    pub fn rev_string(&self) -> String {
        format!("{}-{}", self.pos, hex::encode(&self.rev_id))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentInfo {
    pub id: Vec<u8>,
    pub update_seq: i64,
    pub deleted: bool,
    pub sizes: Sizes,
    /// Oldest first.
    pub revisions: Vec<Revision>,
}

impl DocumentInfo {
    /// The newest revision that still has a stored body.
    pub fn latest_stored_revision(&self) -> Option<&Revision> {
        self.revisions.iter().rev().find(|r| r.has_body())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    Pointers(Vec<Pointer>),
    Documents(Vec<DocumentInfo>),
}

impl Node {
    /// Interpret a decoded node term. A node with no entries, or one that is
    /// not `{Atom, List}` shaped, is logged and yields an empty node.
    pub fn parse(tree: &TermTree, kind: TreeKind, offset: u64) -> CouchResult<Self> {
        let (atom, entries) = match node_parts(tree) {
            Some(parts) => parts,
            None => {
                warn!(offset, tag = %tree.tag(), "unrecognised node shape");
                return Ok(Self::Documents(Vec::new()));
            }
        };
        let entries = entries.elements()?;
        if entries.is_empty() {
            warn!(offset, %kind, "empty node");
        }
        match atom {
            "kp_node" => {
                let pointers = entries
                    .iter()
                    .map(|e| parse_pointer(e, kind))
                    .collect::<TermResult<Vec<_>>>()?;
                Ok(Self::Pointers(pointers))
            }
            "kv_node" => {
                let docs = entries
                    .iter()
                    .map(|e| parse_document_info(e, kind))
                    .collect::<TermResult<Vec<_>>>()?;
                Ok(Self::Documents(docs))
            }
            other => Err(CouchError::UnknownNodeType {
                offset,
                atom: other.to_string(),
            }),
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Pointers(_) => NodeKind::Pointer,
            Self::Documents(_) => NodeKind::Value,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Pointers(p) => p.is_empty(),
            Self::Documents(d) => d.is_empty(),
        }
    }
}

fn node_parts(tree: &TermTree) -> Option<(&str, &TermTree)> {
    let fields = tree.tuple().ok()?;
    match fields {
        [tag, entries] => Some((tag.atom().ok()?, entries)),
        _ => None,
    }
}

/// An integer, or the first integer of a tuple. Anything else counts as 0.
fn leading_int(tree: &TermTree) -> TermResult<i64> {
    match &tree.term {
        Term::SmallTuple(_) => match tree.children.first() {
            Some(first) if first.term.integer().is_some() => first.as_i64(),
            _ => Ok(0),
        },
        t if t.integer().is_some() => tree.as_i64(),
        _ => Ok(0),
    }
}

fn second_int(tree: &TermTree) -> TermResult<i64> {
    match tree.tuple().ok().and_then(|f| f.get(1)) {
        Some(second) if second.term.integer().is_some() => second.as_i64(),
        _ => Ok(0),
    }
}

fn parse_sizes(tree: &TermTree) -> TermResult<Sizes> {
    Ok(Sizes {
        active: leading_int(tree)?,
        external: second_int(tree)?,
    })
}

/// `{Key, {Offset, Reduction, Size}}` where the key is the doc id or the
/// update sequence.
fn parse_pointer(entry: &TermTree, kind: TreeKind) -> TermResult<Pointer> {
    let key = entry.child(0)?;
    let key = match kind {
        TreeKind::ById => PointerKey::Id(key.binary()?.to_vec()),
        TreeKind::BySeq => PointerKey::Seq(key.as_i64()?),
    };
    let location = entry.child(1)?;
    let fields = location.tuple()?;
    let reduction = location.child(1)?;
    let size = match fields.get(2) {
        Some(size) if size.term.integer().is_some() => size.as_i64()?,
        _ => 0,
    };
    Ok(Pointer {
        key,
        offset: location.child(0)?.as_i64()?,
        count: leading_int(reduction)?,
        secondary_count: second_int(reduction)?,
        size,
    })
}

/// Value rows are `{Id, {Seq, Deleted, Sizes, RevTree}}` in the by-id tree
/// and `{Seq, {Id, Deleted, Sizes, RevTree}}` in the by-seq tree.
fn parse_document_info(entry: &TermTree, kind: TreeKind) -> TermResult<DocumentInfo> {
    let key = entry.child(0)?;
    let value = entry.child(1)?;
    let (id, update_seq) = match kind {
        TreeKind::ById => (key.binary()?.to_vec(), value.child(0)?.as_i64()?),
        TreeKind::BySeq => (value.child(0)?.binary()?.to_vec(), key.as_i64()?),
    };
    Ok(DocumentInfo {
        id,
        update_seq,
        deleted: parse_flag(value.child(1)?)?,
        sizes: parse_sizes(value.child(2)?)?,
        revisions: parse_rev_tree(value.child(3)?)?,
    })
}

/// Deleted flags are `0`/`1`, or `true`/`false` in very old files.
fn parse_flag(tree: &TermTree) -> TermResult<bool> {
    match tree.term.atom() {
        Some(atom) => Ok(atom == "true"),
        None => Ok(tree.as_i64()? != 0),
    }
}

/// Follow the first branch of `[{Start, {RevId, Value, Children}}]`, taking
/// the first child at every level.
fn parse_rev_tree(tree: &TermTree) -> TermResult<Vec<Revision>> {
    let mut revisions = Vec::new();
    let Some(branch) = tree.elements()?.first() else {
        return Ok(revisions);
    };
    let start = branch.child(0)?.as_i64()?;
    let mut node = branch.child(1)?;
    loop {
        let pos = start + revisions.len() as i64;
        revisions.push(parse_revision(node, pos)?);
        match node.child(2)?.elements()?.first() {
            Some(child) => node = child,
            None => break,
        }
    }
    Ok(revisions)
}

/// `{RevId, Leaf, Children}` with `Leaf` being `{Deleted, Offset, Seq[, Sizes, ...]}`
/// or a missing-body marker.
fn parse_revision(node: &TermTree, pos: i64) -> TermResult<Revision> {
    let rev_id = node.child(0)?.binary()?.to_vec();
    let leaf = node.child(1)?;
    let mut revision = Revision {
        rev_id,
        pos,
        offset: -1,
        update_seq: 0,
        deleted: false,
        sizes: Sizes::default(),
    };
    let Ok(fields) = leaf.tuple() else {
        return Ok(revision);
    };
    if fields.len() < 3 {
        return Ok(revision);
    }
    revision.deleted = parse_flag(&fields[0])?;
    revision.offset = fields[1].as_i64()?;
    revision.update_seq = fields[2].as_i64()?;
    if let Some(sizes) = fields.get(3) {
        revision.sizes = parse_sizes(sizes)?;
    }
    Ok(revision)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uncouch_testkit::shapes::{
        id_pointer, id_row, kp_node, kv_node, rev_tree, seq_pointer, seq_row, Rev,
    };
    use uncouch_testkit::Value;

    fn parse(value: &Value, kind: TreeKind) -> CouchResult<Node> {
        Node::parse(&TermTree::from_bytes(&value.encode()).unwrap(), kind, 1234)
    }

    #[test]
    fn seq_pointer_node() {
        let node = parse(
            &kp_node(vec![seq_pointer(5, 4000, 3), seq_pointer(9, 8000, 4)]),
            TreeKind::BySeq,
        )
        .unwrap();
        let Node::Pointers(pointers) = node else { panic!("expected pointers") };
        assert_eq!(pointers.len(), 2);
        assert_eq!(pointers[0].key, PointerKey::Seq(5));
        assert_eq!(pointers[0].offset, 4000);
        assert_eq!(pointers[0].count, 3);
        assert_eq!(pointers[1].offset, 8000);
        assert_eq!(pointers[1].size, 100);
    }

    #[test]
    fn id_pointer_node() {
        let node = parse(&kp_node(vec![id_pointer("doc-a", 77, 12)]), TreeKind::ById).unwrap();
        let Node::Pointers(pointers) = node else { panic!("expected pointers") };
        assert_eq!(pointers[0].key, PointerKey::Id(b"doc-a".to_vec()));
        assert_eq!(pointers[0].count, 12);
        assert_eq!(pointers[0].secondary_count, 0);
    }

    #[test]
    fn seq_value_node_with_revision_chain() {
        let revs = [
            Rev::missing(b"\x01\x02"),
            Rev::missing(b"\x03"),
            Rev::stored(b"\xAB\xCD", 900, 7),
        ];
        let node =
            parse(&kv_node(vec![seq_row(7, "doc-1", false, &revs)]), TreeKind::BySeq).unwrap();
        let Node::Documents(docs) = node else { panic!("expected documents") };
        let doc = &docs[0];
        assert_eq!(doc.id, b"doc-1");
        assert_eq!(doc.update_seq, 7);
        assert!(!doc.deleted);
        assert_eq!(doc.sizes, Sizes { active: 10, external: 20 });
        assert_eq!(doc.revisions.len(), 3);
        assert_eq!(doc.revisions[0].offset, -1);
        let latest = doc.latest_stored_revision().unwrap();
        assert_eq!(latest.offset, 900);
        assert_eq!(latest.update_seq, 7);
        assert_eq!(latest.rev_string(), "3-abcd");
    }

    #[test]
    fn id_value_node() {
        let revs = [Rev::stored(b"\x01", 50, 2)];
        let node = parse(&kv_node(vec![id_row("x", 2, true, &revs)]), TreeKind::ById).unwrap();
        let Node::Documents(docs) = node else { panic!("expected documents") };
        assert_eq!(docs[0].id, b"x");
        assert_eq!(docs[0].update_seq, 2);
        assert!(docs[0].deleted);
    }

    #[test]
    fn integer_sizes_are_accepted() {
        let row = Value::tuple(vec![
            Value::int(1),
            Value::tuple(vec![
                Value::bin("old"),
                Value::int(0),
                Value::int(321),
                rev_tree(1, &[Rev::stored(b"\x01", 10, 1)]),
            ]),
        ]);
        let Node::Documents(docs) = parse(&kv_node(vec![row]), TreeKind::BySeq).unwrap() else {
            panic!("expected documents")
        };
        assert_eq!(docs[0].sizes, Sizes { active: 321, external: 0 });
    }

    #[test]
    fn unknown_node_atom() {
        let value = Value::tuple(vec![Value::atom("xx_node"), Value::list(vec![Value::int(1)])]);
        assert!(matches!(
            parse(&value, TreeKind::BySeq),
            Err(CouchError::UnknownNodeType { offset: 1234, ref atom }) if atom == "xx_node"
        ));
    }

    #[test]
    fn empty_node_is_survivable() {
        let node = parse(&kv_node(vec![]), TreeKind::BySeq).unwrap();
        assert!(node.is_empty());
        let odd = parse(&Value::int(3), TreeKind::BySeq).unwrap();
        assert!(odd.is_empty());
    }

    #[test]
    fn malformed_row_is_fatal() {
        let value = kv_node(vec![Value::tuple(vec![Value::int(1)])]);
        assert!(matches!(parse(&value, TreeKind::BySeq), Err(CouchError::Term(_))));
    }
}
