use std::ops::Bound;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use crate::error::{FreightError, Result};
use crate::paths::{CollectionPath, DocPath};
use crate::store::state::{Document, StoreState};
use crate::store::{DocumentStore, WriteBatch};

/// Volatile store; everything is lost on drop.
#[derive(Default)]
pub struct MemStore {
    state: RwLock<StoreState>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, StoreState>> {
        self.state
            .read()
            .map_err(|_| FreightError::Format("store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, StoreState>> {
        self.state
            .write()
            .map_err(|_| FreightError::WriteFailure("store lock poisoned".into()))
    }
}

impl DocumentStore for MemStore {
    fn get(&self, path: &DocPath) -> Result<Option<Document>> {
        Ok(self.read()?.get(path))
    }

    fn list(&self, collection: &CollectionPath) -> Result<Vec<(String, Document)>> {
        Ok(self
            .read()?
            .list(collection, Bound::Unbounded, Bound::Unbounded))
    }

    fn list_range(
        &self,
        collection: &CollectionPath,
        start: &str,
        end: &str,
    ) -> Result<Vec<(String, Document)>> {
        Ok(self
            .read()?
            .list(collection, Bound::Included(start), Bound::Included(end)))
    }

    fn commit(&self, batch: WriteBatch) -> Result<()> {
        let mut st = self.write()?;
        st.check(batch.ops())?;
        st.apply_all(batch.ops());
        debug!(ops = batch.len(), commits = st.commits, "batch committed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(v: serde_json::Value) -> Document {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn failed_batch_leaves_nothing_behind() {
        let store = MemStore::new();
        let coll = CollectionPath::root("things").unwrap();
        let a = coll.doc("a").unwrap();
        let missing = coll.doc("missing").unwrap();

        let mut batch = WriteBatch::new();
        batch
            .set(a.clone(), doc(json!({"v": 1})))
            .update(missing, doc(json!({"v": 2})));
        assert!(matches!(
            store.commit(batch),
            Err(FreightError::NotFound(_))
        ));
        assert!(store.get(&a).unwrap().is_none());
    }

    #[test]
    fn range_is_inclusive_on_both_ends() {
        let store = MemStore::new();
        let coll = CollectionPath::root("days").unwrap();
        let mut batch = WriteBatch::new();
        for id in ["2024-02-29", "2024-03-01", "2024-03-31", "2024-04-01"] {
            batch.set(coll.doc(id).unwrap(), Document::new());
        }
        store.commit(batch).unwrap();

        let ids: Vec<String> = store
            .list_range(&coll, "2024-03-01", "2024-03-31")
            .unwrap()
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(ids, vec!["2024-03-01", "2024-03-31"]);
    }

    #[test]
    fn new_ids_sort_in_creation_order() {
        let store = MemStore::new();
        let ids: Vec<String> = (0..50).map(|_| store.new_id()).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }
}
