use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{FreightError, Result};
use crate::paths::{CollectionPath, DocPath};
use crate::store::batch::BatchOp;

pub type Document = serde_json::Map<String, Value>;

pub fn to_document<T: Serialize>(value: &T) -> Result<Document> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(FreightError::Format(format!(
            "expected an object document, got {other}"
        ))),
    }
}

pub fn from_document<T: DeserializeOwned>(doc: Document) -> Result<T> {
    Ok(serde_json::from_value(Value::Object(doc))?)
}

/// Materialized documents keyed by full path. Shared by every backend.
#[derive(Clone, Debug, Default)]
pub struct StoreState {
    pub docs: BTreeMap<String, Document>,
    pub commits: u64,
}

impl StoreState {
    pub fn get(&self, path: &DocPath) -> Option<Document> {
        self.docs.get(path.as_str()).cloned()
    }

    pub fn list(
        &self,
        collection: &CollectionPath,
        start: Bound<&str>,
        end: Bound<&str>,
    ) -> Vec<(String, Document)> {
        let prefix = format!("{}/", collection.as_str());
        let from = match start {
            Bound::Included(s) => Bound::Included(format!("{prefix}{s}")),
            Bound::Excluded(s) => Bound::Excluded(format!("{prefix}{s}")),
            Bound::Unbounded => Bound::Included(prefix.clone()),
        };
        self.docs
            .range::<String, _>((from, Bound::Unbounded))
            .take_while(|(k, _)| {
                // Keys are ordered, so the first direct-child id past `end` ends the scan.
                k.strip_prefix(&prefix).is_some_and(|rest| {
                    let id = rest.split('/').next().unwrap_or(rest);
                    !past_end(id, end)
                })
            })
            .filter_map(|(k, doc)| {
                let id = &k[prefix.len()..];
                if id.contains('/') || !in_bounds(id, start, end) {
                    return None;
                }
                Some((id.to_string(), doc.clone()))
            })
            .collect()
    }

    /// Reject the batch if any op would fail against the state the earlier ops leave behind.
    pub fn check(&self, ops: &[BatchOp]) -> Result<()> {
        let mut overlay: HashMap<&str, bool> = HashMap::new();
        for op in ops {
            let key = op.path().as_str();
            let exists = overlay
                .get(key)
                .copied()
                .unwrap_or_else(|| self.docs.contains_key(key));
            match op {
                BatchOp::Set { .. } => {
                    overlay.insert(key, true);
                }
                BatchOp::Create { .. } => {
                    if exists {
                        return Err(FreightError::WriteFailure(format!(
                            "document already exists at {key}"
                        )));
                    }
                    overlay.insert(key, true);
                }
                BatchOp::Delete { .. } => {
                    overlay.insert(key, false);
                }
                BatchOp::Update { .. } | BatchOp::ArrayUnion { .. } => {
                    if !exists {
                        return Err(FreightError::NotFound(format!(
                            "no document to update at {key}"
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    pub fn apply(&mut self, op: &BatchOp) {
        match op {
            BatchOp::Set { path, doc, merge } => {
                let key = path.as_str().to_string();
                match self.docs.get_mut(&key) {
                    Some(existing) if *merge => {
                        for (k, v) in doc {
                            existing.insert(k.clone(), v.clone());
                        }
                    }
                    _ => {
                        self.docs.insert(key, doc.clone());
                    }
                }
            }
            BatchOp::Create { path, doc } => {
                self.docs.insert(path.as_str().to_string(), doc.clone());
            }
            BatchOp::Update { path, fields } => {
                if let Some(existing) = self.docs.get_mut(path.as_str()) {
                    for (k, v) in fields {
                        existing.insert(k.clone(), v.clone());
                    }
                }
            }
            BatchOp::Delete { path } => {
                self.docs.remove(path.as_str());
            }
            BatchOp::ArrayUnion {
                path,
                field,
                values,
            } => {
                if let Some(existing) = self.docs.get_mut(path.as_str()) {
                    let slot = existing
                        .entry(field.clone())
                        .or_insert_with(|| Value::Array(Vec::new()));
                    if !slot.is_array() {
                        *slot = Value::Array(Vec::new());
                    }
                    if let Value::Array(arr) = slot {
                        for v in values {
                            if !arr.contains(v) {
                                arr.push(v.clone());
                            }
                        }
                    }
                }
            }
        }
    }

    pub fn apply_all(&mut self, ops: &[BatchOp]) {
        for op in ops {
            self.apply(op);
        }
        self.commits += 1;
    }
}

fn past_end(id: &str, end: Bound<&str>) -> bool {
    match end {
        Bound::Included(e) => id > e,
        Bound::Excluded(e) => id >= e,
        Bound::Unbounded => false,
    }
}

fn in_bounds(id: &str, start: Bound<&str>, end: Bound<&str>) -> bool {
    let lower = match start {
        Bound::Included(s) => id >= s,
        Bound::Excluded(s) => id > s,
        Bound::Unbounded => true,
    };
    let upper = match end {
        Bound::Included(e) => id <= e,
        Bound::Excluded(e) => id < e,
        Bound::Unbounded => true,
    };
    lower && upper
}
