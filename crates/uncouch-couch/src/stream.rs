use std::collections::VecDeque;
use std::io::{Read, Seek};

use tracing::debug;

use crate::document::Document;
use crate::error::CouchResult;
use crate::file::{child_offset, CouchFile};
use crate::node::{DocumentInfo, Node, TreeKind};

/// Per-file extraction settings.
#[derive(Clone, Debug)]
pub struct ExtractOptions {
    /// Value of the `_db` field on every emitted document.
    pub db_name: String,
    /// Emit `_deleted` lines for deleted documents instead of skipping them.
    pub include_deleted: bool,
}

impl ExtractOptions {
    pub fn new(db_name: impl Into<String>) -> Self {
        Self {
            db_name: db_name.into(),
            include_deleted: true,
        }
    }
}

/// Documents of the by-sequence tree in ascending update order.
///
/// Nodes are read lazily, one at a time, from an explicit stack of pending
/// offsets. The first error ends the stream.
#[derive(Debug)]
pub struct DocumentStream<R> {
    file: CouchFile<R>,
    options: ExtractOptions,
    stack: Vec<u64>,
    pending: VecDeque<DocumentInfo>,
    done: bool,
}

impl<R: Read + Seek> DocumentStream<R> {
    pub(crate) fn new(file: CouchFile<R>, options: ExtractOptions) -> Self {
        let stack = file.root(TreeKind::BySeq).into_iter().collect();
        Self {
            file,
            options,
            stack,
            pending: VecDeque::new(),
            done: false,
        }
    }

    pub fn into_file(self) -> CouchFile<R> {
        self.file
    }

    fn descend(&mut self, offset: u64) -> CouchResult<()> {
        match self.file.read_node(offset, TreeKind::BySeq)? {
            Some(Node::Pointers(pointers)) => {
                for pointer in pointers.iter().rev() {
                    self.stack.extend(child_offset(pointer.offset, offset)?);
                }
            }
            Some(Node::Documents(docs)) => self.pending.extend(docs),
            None => {}
        }
        Ok(())
    }

    fn emit(&mut self, info: DocumentInfo) -> CouchResult<Option<Document>> {
        let Some(revision) = info.latest_stored_revision() else {
            debug!(id = %String::from_utf8_lossy(&info.id), "no stored revision");
            return Ok(None);
        };
        if info.deleted {
            if !self.options.include_deleted {
                return Ok(None);
            }
            return Ok(Some(Document::deleted(&info.id, &self.options.db_name)));
        }
        let body = self.file.render_document(revision.offset)?;
        Document::live(&info.id, &self.options.db_name, body).map(Some)
    }

    fn step(&mut self) -> CouchResult<Option<Document>> {
        loop {
            if let Some(info) = self.pending.pop_front() {
                if let Some(doc) = self.emit(info)? {
                    return Ok(Some(doc));
                }
                continue;
            }
            match self.stack.pop() {
                Some(offset) => self.descend(offset)?,
                None => return Ok(None),
            }
        }
    }
}

impl<R: Read + Seek> Iterator for DocumentStream<R> {
    type Item = CouchResult<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.step() {
            Ok(Some(doc)) => Some(Ok(doc)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
