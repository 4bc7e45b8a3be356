//! Term shapes of CouchDB headers and B-tree nodes.

use crate::value::Value;

/// Disk version written by CouchDB 2.x and 3.x.
pub const DISK_VERSION: i64 = 8;

/// A tree root as stored in the header: `{Offset, Reduction, Size}`, or
/// nil for an empty tree.
pub fn tree_state(root: Option<(u64, i64)>) -> Value {
    match root {
        Some((offset, size)) => Value::tuple(vec![
            Value::int(offset as i64),
            Value::int(0),
            Value::int(size),
        ]),
        None => Value::Nil,
    }
}

/// `db_header` record with the fields the extractor reads filled in.
pub fn db_header(
    update_seq: i64,
    id_root: Option<(u64, i64)>,
    seq_root: Option<(u64, i64)>,
) -> Value {
    Value::tuple(vec![
        Value::atom("db_header"),
        Value::int(DISK_VERSION),
        Value::int(update_seq),
        Value::int(0),
        tree_state(id_root),
        tree_state(seq_root),
        Value::Nil,
        Value::int(0),
        Value::Nil,
        Value::Nil,
        Value::int(1000),
        Value::bin(b"0123456789abcdef0123456789abcdef"),
    ])
}

pub fn kp_node(pointers: Vec<Value>) -> Value {
    Value::tuple(vec![Value::atom("kp_node"), Value::list(pointers)])
}

pub fn kv_node(rows: Vec<Value>) -> Value {
    Value::tuple(vec![Value::atom("kv_node"), Value::list(rows)])
}

/// By-sequence pointer: `{Seq, {Offset, Count, Size}}`.
pub fn seq_pointer(seq: i64, offset: u64, count: i64) -> Value {
    Value::tuple(vec![
        Value::int(seq),
        Value::tuple(vec![Value::int(offset as i64), Value::int(count), Value::int(100)]),
    ])
}

/// By-id pointer: `{Key, {Offset, {NotDeleted, Deleted, Sizes}, Size}}`.
pub fn id_pointer(key: &str, offset: u64, count: i64) -> Value {
    Value::tuple(vec![
        Value::bin(key),
        Value::tuple(vec![
            Value::int(offset as i64),
            Value::tuple(vec![
                Value::int(count),
                Value::int(0),
                Value::tuple(vec![Value::int(10), Value::int(20)]),
            ]),
            Value::int(100),
        ]),
    ])
}

/// One revision of a document: the rev id and where its body lives.
#[derive(Clone, Debug)]
pub struct Rev {
    pub id: Vec<u8>,
    pub body: Option<u64>,
    pub deleted: bool,
    pub seq: i64,
}

impl Rev {
    pub fn stored(id: &[u8], body: u64, seq: i64) -> Self {
        Self {
            id: id.to_vec(),
            body: Some(body),
            deleted: false,
            seq,
        }
    }

    pub fn missing(id: &[u8]) -> Self {
        Self {
            id: id.to_vec(),
            body: None,
            deleted: false,
            seq: 0,
        }
    }

    fn leaf(&self) -> Value {
        match self.body {
            Some(offset) => Value::tuple(vec![
                Value::int(i64::from(self.deleted)),
                Value::int(offset as i64),
                Value::int(self.seq),
                Value::tuple(vec![Value::int(10), Value::int(20)]),
            ]),
            None => Value::Nil,
        }
    }
}

/// Revision tree `[{Start, {RevId, Value, [Child]}}]` holding a single
/// linear branch, oldest revision first.
pub fn rev_tree(start: i64, revs: &[Rev]) -> Value {
    let mut node: Option<Value> = None;
    for rev in revs.iter().rev() {
        let children = match node.take() {
            Some(child) => Value::list(vec![child]),
            None => Value::Nil,
        };
        node = Some(Value::tuple(vec![Value::bin(&rev.id), rev.leaf(), children]));
    }
    let branch = node.map(|n| Value::tuple(vec![Value::int(start), n]));
    Value::list(branch.into_iter().collect())
}

fn sizes() -> Value {
    Value::tuple(vec![Value::int(10), Value::int(20)])
}

/// By-sequence leaf row: `{Seq, {Id, Deleted, Sizes, RevTree}}`.
pub fn seq_row(seq: i64, id: &str, deleted: bool, revs: &[Rev]) -> Value {
    Value::tuple(vec![
        Value::int(seq),
        Value::tuple(vec![
            Value::bin(id),
            Value::int(i64::from(deleted)),
            sizes(),
            rev_tree(1, revs),
        ]),
    ])
}

/// By-id leaf row: `{Id, {Seq, Deleted, Sizes, RevTree}}`.
pub fn id_row(id: &str, seq: i64, deleted: bool, revs: &[Rev]) -> Value {
    Value::tuple(vec![
        Value::bin(id),
        Value::tuple(vec![
            Value::int(seq),
            Value::int(i64::from(deleted)),
            sizes(),
            rev_tree(1, revs),
        ]),
    ])
}
