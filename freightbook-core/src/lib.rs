#![forbid(unsafe_code)]

pub mod error;

pub mod config;
pub mod date;
pub mod domain;
pub mod paths;

pub mod store {
    pub mod batch;
    pub mod factory;
    pub mod fs;
    pub mod journal;
    pub mod mem;
    pub mod state;

    pub use batch::{BatchOp, WriteBatch};
    pub use factory::{Backend, open_store};
    pub use state::Document;

    use crate::error::Result;
    use crate::paths::{CollectionPath, DocPath};

    /// Hierarchical document store: documents addressed by slash-separated
    /// paths, grouped into collections by their parent path.
    pub trait DocumentStore: Send + Sync {
        fn get(&self, path: &DocPath) -> Result<Option<Document>>;

        /// Direct children of `collection`, ordered by document id.
        fn list(&self, collection: &CollectionPath) -> Result<Vec<(String, Document)>>;

        /// Direct children whose id lies in `[start, end]` (inclusive, byte order).
        fn list_range(
            &self,
            collection: &CollectionPath,
            start: &str,
            end: &str,
        ) -> Result<Vec<(String, Document)>>;

        /// Apply every op in `batch` or none of them.
        fn commit(&self, batch: WriteBatch) -> Result<()>;

        /// Fresh document id. Ids sort in creation order.
        fn new_id(&self) -> String {
            uuid::Uuid::now_v7().simple().to_string()
        }
    }
}

pub mod auth;
pub mod calendar;
pub mod editor;
pub mod registration;
pub mod session;

// Re-exports: stable API surface
pub use auth::AuthService;
pub use calendar::{CalendarEntry, CalendarLister, MonthView, list_month};
pub use date::DayKey;
pub use editor::{SaveSummary, ShipmentEditor};
pub use error::{FreightError, Result};
pub use registration::{ShipRegistration, register_ship};
pub use session::{Role, Session};
pub use store::{Backend, DocumentStore, WriteBatch, open_store};
