use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::paths::DocPath;
use crate::store::state::{Document, to_document};

/// One write inside a batch. Ops are applied in order.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum BatchOp {
    /// Create or replace; with `merge`, top-level fields are merged into an existing document.
    Set {
        path: DocPath,
        doc: Document,
        merge: bool,
    },
    /// Create a document that must not exist yet.
    Create { path: DocPath, doc: Document },
    /// Overwrite the given top-level fields of an existing document.
    Update { path: DocPath, fields: Document },
    /// Remove the document if present.
    Delete { path: DocPath },
    /// Append each value to the array `field` unless already present.
    ArrayUnion {
        path: DocPath,
        field: String,
        values: Vec<Value>,
    },
}

impl BatchOp {
    pub fn path(&self) -> &DocPath {
        match self {
            BatchOp::Set { path, .. }
            | BatchOp::Create { path, .. }
            | BatchOp::Update { path, .. }
            | BatchOp::Delete { path }
            | BatchOp::ArrayUnion { path, .. } => path,
        }
    }
}

/// An atomic multi-document write.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, path: DocPath, doc: Document) -> &mut Self {
        self.ops.push(BatchOp::Set {
            path,
            doc,
            merge: false,
        });
        self
    }

    pub fn set_merge(&mut self, path: DocPath, doc: Document) -> &mut Self {
        self.ops.push(BatchOp::Set {
            path,
            doc,
            merge: true,
        });
        self
    }

    /// Serialize `value` and queue it as a full `Set`.
    pub fn insert<T: Serialize>(&mut self, path: DocPath, value: &T) -> Result<&mut Self> {
        let doc = to_document(value)?;
        Ok(self.set(path, doc))
    }

    /// Queue a create that fails the whole batch if `path` already exists.
    pub fn create<T: Serialize>(&mut self, path: DocPath, value: &T) -> Result<&mut Self> {
        let doc = to_document(value)?;
        self.ops.push(BatchOp::Create { path, doc });
        Ok(self)
    }

    pub fn update(&mut self, path: DocPath, fields: Document) -> &mut Self {
        self.ops.push(BatchOp::Update { path, fields });
        self
    }

    pub fn delete(&mut self, path: DocPath) -> &mut Self {
        self.ops.push(BatchOp::Delete { path });
        self
    }

    pub fn array_union(&mut self, path: DocPath, field: &str, values: Vec<Value>) -> &mut Self {
        self.ops.push(BatchOp::ArrayUnion {
            path,
            field: field.to_string(),
            values,
        });
        self
    }

    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}
