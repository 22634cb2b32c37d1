use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info};

use crate::date::now_millis;
use crate::error::{FreightError, Result};
use crate::paths::{CollectionPath, DocPath};
use crate::store::journal::{Journal, LogRecord};
use crate::store::state::{Document, StoreState};
use crate::store::{DocumentStore, WriteBatch};

struct Inner {
    journal: Journal,
    state: StoreState,
}

/// Journal-backed store. State is rebuilt by replaying the journal on open.
pub struct FsStore {
    path: PathBuf,
    inner: RwLock<Inner>,
}

impl FsStore {
    pub fn open(path: &Path) -> Result<Self> {
        let mut journal = Journal::open(path)?;
        let mut state = StoreState::default();
        for rec in journal.replay()? {
            match rec {
                LogRecord::Commit { ops, .. } => state.apply_all(&ops),
            }
        }
        info!(
            journal = %path.display(),
            commits = state.commits,
            documents = state.docs.len(),
            "store opened"
        );
        Ok(Self {
            path: path.to_path_buf(),
            inner: RwLock::new(Inner { journal, state }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|_| FreightError::Format("store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|_| FreightError::WriteFailure("store lock poisoned".into()))
    }
}

impl DocumentStore for FsStore {
    fn get(&self, path: &DocPath) -> Result<Option<Document>> {
        Ok(self.read()?.state.get(path))
    }

    fn list(&self, collection: &CollectionPath) -> Result<Vec<(String, Document)>> {
        Ok(self
            .read()?
            .state
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
            .state
            .list(collection, Bound::Included(start), Bound::Included(end)))
    }

    fn commit(&self, batch: WriteBatch) -> Result<()> {
        let mut inner = self.write()?;
        inner.state.check(batch.ops())?;
        let ops = batch.into_ops();
        let rec = LogRecord::Commit {
            at_ms: now_millis(),
            ops,
        };
        inner.journal.append(&rec)?;
        let LogRecord::Commit { ops, .. } = &rec;
        inner.state.apply_all(ops);
        debug!(ops = ops.len(), commits = inner.state.commits, "batch committed");
        Ok(())
    }
}
