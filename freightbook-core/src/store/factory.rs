use std::path::PathBuf;
use std::sync::Arc;

use crate::error::Result;
use crate::store::DocumentStore;
use crate::store::fs::FsStore;
use crate::store::mem::MemStore;

pub enum Backend {
    Mem,
    Fs(PathBuf),
}

pub fn open_store(backend: Backend) -> Result<Arc<dyn DocumentStore>> {
    match backend {
        Backend::Mem => Ok(Arc::new(MemStore::new())),
        Backend::Fs(path) => Ok(Arc::new(FsStore::open(&path)?)),
    }
}
