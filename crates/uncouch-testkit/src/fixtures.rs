use crate::builder::{Compression, CouchFileBuilder};
use crate::shapes::{db_header, id_row, kv_node, seq_row, Rev};
use crate::value::Value;

/// A database with one leaf per tree holding `docs` in sequence order,
/// preceded by the empty header a fresh database starts with.
pub fn single_leaf_db(docs: &[(&str, Value)]) -> Vec<u8> {
    let mut builder = CouchFileBuilder::new();
    builder.write_header(&db_header(0, None, None));

    let mut seq_rows = Vec::new();
    let mut id_rows = Vec::new();
    for (i, (id, body)) in docs.iter().enumerate() {
        let seq = i as i64 + 1;
        let offset = builder.append_document(body, Compression::Snappy);
        let revs = [Rev::stored(format!("{seq:032x}").as_bytes(), offset, seq)];
        seq_rows.push(seq_row(seq, id, false, &revs));
        id_rows.push((id.to_string(), id_row(id, seq, false, &revs)));
    }
    id_rows.sort_by(|a, b| a.0.cmp(&b.0));
    let id_rows = id_rows.into_iter().map(|(_, row)| row).collect();

    let seq_root = builder.append_node(&kv_node(seq_rows), Compression::Snappy);
    let id_root = builder.append_node(&kv_node(id_rows), Compression::Snappy);
    builder.write_header(&db_header(
        docs.len() as i64,
        Some((id_root, 200)),
        Some((seq_root, 200)),
    ));
    builder.finish()
}

/// A database with no documents: only the initial header.
pub fn empty_db() -> Vec<u8> {
    let mut builder = CouchFileBuilder::new();
    builder.write_header(&db_header(0, None, None));
    builder.finish()
}
