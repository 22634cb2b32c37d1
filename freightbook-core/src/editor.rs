//! Shipment detail editing: a working copy of one shipment's line items and
//! comments, diffed against the last fetched snapshot and saved as one batch.
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use crate::date::{DayKey, now_millis};
use crate::domain::{
    Comment, ItemField, LineItem, RowKey, ShipDetails, Totals, cell_number, format_total,
};
use crate::error::{FreightError, Result};
use crate::paths;
use crate::session::{Session, require_editor};
use crate::store::state::{Document, from_document, to_document};
use crate::store::{DocumentStore, WriteBatch};

#[derive(Clone, Debug, PartialEq)]
pub struct Row<T> {
    pub key: RowKey,
    pub value: T,
}

/// What one `save` wrote.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SaveSummary {
    pub deleted: usize,
    pub inserted: usize,
    pub updated: usize,
    pub comments_added: usize,
    /// False when the batch committed but the follow-up fetch failed; local state
    /// was rebased onto the committed ids instead.
    pub resynced: bool,
}

impl SaveSummary {
    pub fn is_noop(&self) -> bool {
        self.deleted + self.inserted + self.updated + self.comments_added == 0
    }
}

struct SavePlan {
    batch: WriteBatch,
    assigned: HashMap<RowKey, String>,
    summary: SaveSummary,
}

pub struct ShipmentEditor {
    store: Arc<dyn DocumentStore>,
    date: DayKey,
    ship_id: String,
    header: ShipDetails,
    items: Vec<Row<LineItem>>,
    comments: Vec<Row<Comment>>,
    snapshot_items: BTreeMap<String, LineItem>,
    snapshot_comments: Vec<Row<Comment>>,
    selected: BTreeSet<RowKey>,
    pending_deletes: BTreeSet<String>,
    next_local: u64,
}

impl ShipmentEditor {
    /// Fetch the header, line items and comments of `(date, ship_id)`.
    pub fn load(store: Arc<dyn DocumentStore>, date: DayKey, ship_id: &str) -> Result<Self> {
        let mut editor = Self {
            store,
            date,
            ship_id: ship_id.to_string(),
            header: ShipDetails::default(),
            items: Vec::new(),
            comments: Vec::new(),
            snapshot_items: BTreeMap::new(),
            snapshot_comments: Vec::new(),
            selected: BTreeSet::new(),
            pending_deletes: BTreeSet::new(),
            next_local: 0,
        };
        editor.reload()?;
        Ok(editor)
    }

    /// Replace all in-memory state with what the store holds now.
    pub fn reload(&mut self) -> Result<()> {
        let path = paths::ship(&self.date, &self.ship_id)?;
        let doc = self.store.get(&path)?.ok_or_else(|| {
            FreightError::NotFound(format!("shipment {} on {}", self.ship_id, self.date))
        })?;
        let header: ShipDetails = from_document(doc)?;
        let (items, comments) = self.fetch_children()?;
        self.header = header;
        self.install(items, comments);
        self.selected.clear();
        self.pending_deletes.clear();
        Ok(())
    }

    fn fetch_children(&self) -> Result<(Vec<Row<LineItem>>, Vec<Row<Comment>>)> {
        let items = self
            .store
            .list(&paths::items(&self.date, &self.ship_id)?)?
            .into_iter()
            .map(|(id, doc)| {
                Ok(Row {
                    key: RowKey::Persisted(id),
                    value: from_document::<LineItem>(doc)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut comments = self
            .store
            .list(&paths::comments(&self.date, &self.ship_id)?)?
            .into_iter()
            .map(|(id, doc)| {
                Ok(Row {
                    key: RowKey::Persisted(id),
                    value: from_document::<Comment>(doc)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        comments.sort_by(|a, b| {
            a.value
                .created_at
                .cmp(&b.value.created_at)
                .then_with(|| a.key.cmp(&b.key))
        });
        Ok((items, comments))
    }

    fn install(&mut self, items: Vec<Row<LineItem>>, comments: Vec<Row<Comment>>) {
        self.snapshot_items = items
            .iter()
            .filter_map(|r| r.key.persisted_id().map(|id| (id.to_string(), r.value.clone())))
            .collect();
        self.snapshot_comments = comments.clone();
        self.items = items;
        self.comments = comments;
    }

    pub fn date(&self) -> &DayKey {
        &self.date
    }

    pub fn ship_id(&self) -> &str {
        &self.ship_id
    }

    pub fn header(&self) -> &ShipDetails {
        &self.header
    }

    pub fn items(&self) -> &[Row<LineItem>] {
        &self.items
    }

    pub fn comments(&self) -> &[Row<Comment>] {
        &self.comments
    }

    pub fn selected(&self) -> &BTreeSet<RowKey> {
        &self.selected
    }

    pub fn pending_deletions(&self) -> &BTreeSet<String> {
        &self.pending_deletes
    }

    pub fn item(&self, key: &RowKey) -> Option<&LineItem> {
        self.items.iter().find(|r| &r.key == key).map(|r| &r.value)
    }

    /// True when a save would write something.
    pub fn has_unsaved_changes(&self) -> bool {
        !self.pending_deletes.is_empty()
            || self.comments.len() != self.snapshot_comments.len()
            || self.items.len() != self.snapshot_items.len()
            || self.items.iter().any(|r| match &r.key {
                RowKey::Pending(_) => true,
                RowKey::Persisted(id) => self.snapshot_items.get(id) != Some(&r.value),
            })
    }

    pub fn edit_cell(&mut self, key: &RowKey, field: ItemField, value: &str) -> Result<()> {
        let row = self
            .items
            .iter_mut()
            .find(|r| &r.key == key)
            .ok_or_else(|| FreightError::NotFound(format!("row {key}")))?;
        row.value.set(field, value);
        Ok(())
    }

    /// Append an empty row that will be inserted on the next save.
    pub fn add_row(&mut self) -> RowKey {
        let key = self.next_pending();
        self.items.push(Row {
            key: key.clone(),
            value: LineItem::default(),
        });
        key
    }

    fn next_pending(&mut self) -> RowKey {
        self.next_local += 1;
        RowKey::Pending(self.next_local)
    }

    /// Flip one row's selection; returns whether it is now selected.
    pub fn toggle_select(&mut self, key: &RowKey) -> Result<bool> {
        if !self.items.iter().any(|r| &r.key == key) {
            return Err(FreightError::NotFound(format!("row {key}")));
        }
        if self.selected.remove(key) {
            Ok(false)
        } else {
            self.selected.insert(key.clone());
            Ok(true)
        }
    }

    /// Clear the selection when every row is selected, otherwise select every row.
    pub fn toggle_select_all(&mut self) {
        let all_selected = !self.items.is_empty() && self.selected.len() == self.items.len();
        if all_selected {
            self.selected.clear();
        } else {
            self.selected = self.items.iter().map(|r| r.key.clone()).collect();
        }
    }

    /// Drop selected rows from the working set. Stored rows are queued for deletion on
    /// the next save; local-only rows just disappear. Returns the number of rows removed.
    pub fn delete_selected(&mut self) -> usize {
        for key in &self.selected {
            if let RowKey::Persisted(id) = key {
                if self.snapshot_items.contains_key(id) {
                    self.pending_deletes.insert(id.clone());
                }
            }
        }
        let before = self.items.len();
        let selected = std::mem::take(&mut self.selected);
        self.items.retain(|r| !selected.contains(&r.key));
        before - self.items.len()
    }

    fn plan(&self) -> Result<SavePlan> {
        let mut batch = WriteBatch::new();
        let mut assigned = HashMap::new();
        let mut summary = SaveSummary::default();

        for id in &self.pending_deletes {
            batch.delete(paths::item(&self.date, &self.ship_id, id)?);
            summary.deleted += 1;
        }

        for row in &self.items {
            match &row.key {
                RowKey::Pending(_) => {
                    let id = self.store.new_id();
                    batch.insert(paths::item(&self.date, &self.ship_id, &id)?, &row.value)?;
                    assigned.insert(row.key.clone(), id);
                    summary.inserted += 1;
                }
                RowKey::Persisted(id) => {
                    if self.snapshot_items.get(id) == Some(&row.value) {
                        continue;
                    }
                    let path = paths::item(&self.date, &self.ship_id, id)?;
                    batch.update(path, to_document(&row.value)?);
                    summary.updated += 1;
                }
            }
        }

        for row in &self.comments {
            if row.key.is_pending() {
                let id = self.store.new_id();
                batch.insert(paths::comment(&self.date, &self.ship_id, &id)?, &row.value)?;
                assigned.insert(row.key.clone(), id);
                summary.comments_added += 1;
            }
        }

        Ok(SavePlan {
            batch,
            assigned,
            summary,
        })
    }

    /// Commit deletions, inserts, changed rows and staged comments as one batch.
    ///
    /// When the commit fails nothing in the editor changes, so the edits can be saved
    /// again.
    pub fn save(&mut self, session: Option<&Session>) -> Result<SaveSummary> {
        let session = require_editor(session)?;
        let SavePlan {
            batch,
            assigned,
            mut summary,
        } = self.plan()?;

        if batch.is_empty() {
            summary.resynced = true;
            return Ok(summary);
        }

        if let Err(e) = self.store.commit(batch) {
            warn!(
                ship = %self.ship_id,
                date = %self.date,
                error = %e,
                "shipment save rejected"
            );
            return Err(e);
        }
        info!(
            ship = %self.ship_id,
            date = %self.date,
            user = %session.uid,
            deleted = summary.deleted,
            inserted = summary.inserted,
            updated = summary.updated,
            comments = summary.comments_added,
            "shipment saved"
        );

        self.rebase(&assigned);
        self.pending_deletes.clear();
        match self.fetch_children() {
            Ok((items, comments)) => {
                self.install(items, comments);
                summary.resynced = true;
            }
            Err(e) => {
                warn!(ship = %self.ship_id, error = %e, "refetch after save failed");
            }
        }
        Ok(summary)
    }

    /// Adopt the ids a committed batch assigned to local rows.
    fn rebase(&mut self, assigned: &HashMap<RowKey, String>) {
        let rekey = |key: &mut RowKey| {
            if let Some(id) = assigned.get(key) {
                *key = RowKey::Persisted(id.clone());
            }
        };
        for row in &mut self.items {
            rekey(&mut row.key);
        }
        for row in &mut self.comments {
            rekey(&mut row.key);
        }
        self.selected = std::mem::take(&mut self.selected)
            .into_iter()
            .map(|mut k| {
                rekey(&mut k);
                k
            })
            .collect();
        let items = self.items.clone();
        let comments = self.comments.clone();
        self.install(items, comments);
    }

    fn author(session: Option<&Session>, text: &str) -> Option<Comment> {
        let session = session.filter(|s| s.can_edit())?;
        if text.trim().is_empty() {
            return None;
        }
        Some(Comment {
            user: session.author_label().to_string(),
            comment: text.to_string(),
            created_at: now_millis(),
        })
    }

    /// Write one comment right away. Blank text or an unknown actor is a silent no-op.
    pub fn add_comment(&mut self, session: Option<&Session>, text: &str) -> Result<Option<RowKey>> {
        let Some(comment) = Self::author(session, text) else {
            return Ok(None);
        };
        let id = self.store.new_id();
        let mut batch = WriteBatch::new();
        batch.insert(paths::comment(&self.date, &self.ship_id, &id)?, &comment)?;
        self.store.commit(batch)?;

        let row = Row {
            key: RowKey::Persisted(id),
            value: comment,
        };
        self.snapshot_comments.push(row.clone());
        let key = row.key.clone();
        self.comments.push(row);
        Ok(Some(key))
    }

    /// Queue a comment to be written with the next save.
    pub fn stage_comment(&mut self, session: Option<&Session>, text: &str) -> Option<RowKey> {
        let comment = Self::author(session, text)?;
        let key = self.next_pending();
        self.comments.push(Row {
            key: key.clone(),
            value: comment,
        });
        Some(key)
    }

    pub fn totals(&self) -> Totals {
        self.items.iter().fold(Totals::default(), |acc, r| Totals {
            kgs: acc.kgs + cell_number(&r.value.kgs),
            cbm: acc.cbm + cell_number(&r.value.cbm),
            pkg: acc.pkg + cell_number(&r.value.pkg),
        })
    }

    /// Write the working-copy totals into the header's aggregate fields.
    pub fn write_header_totals(&mut self, session: Option<&Session>) -> Result<ShipDetails> {
        require_editor(session)?;
        let t = self.totals();
        let mut fields = Document::new();
        fields.insert("KGS".into(), Value::String(format_total(t.kgs)));
        fields.insert("CBM".into(), Value::String(format_total(t.cbm)));
        fields.insert("TOTAL_PKG".into(), Value::String(format_total(t.pkg)));

        let mut batch = WriteBatch::new();
        batch.update(paths::ship(&self.date, &self.ship_id)?, fields);
        self.store.commit(batch)?;

        self.header.kgs = format_total(t.kgs);
        self.header.cbm = format_total(t.cbm);
        self.header.total_pkg = format_total(t.pkg);
        Ok(self.header.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::{CollectionPath, DocPath};
    use crate::session::{Role, UserProfile};
    use crate::store::BatchOp;
    use crate::store::mem::MemStore;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Records every batch and can be told to reject commits.
    #[derive(Default)]
    struct RecordingStore {
        inner: MemStore,
        batches: Mutex<Vec<WriteBatch>>,
        reject: AtomicBool,
        fail_lists: AtomicBool,
    }

    impl DocumentStore for RecordingStore {
        fn get(&self, path: &DocPath) -> Result<Option<Document>> {
            self.inner.get(path)
        }
        fn list(&self, c: &CollectionPath) -> Result<Vec<(String, Document)>> {
            if self.fail_lists.load(Ordering::SeqCst) {
                return Err(FreightError::Io(std::io::Error::other("list unavailable")));
            }
            self.inner.list(c)
        }
        fn list_range(
            &self,
            c: &CollectionPath,
            start: &str,
            end: &str,
        ) -> Result<Vec<(String, Document)>> {
            self.inner.list_range(c, start, end)
        }
        fn commit(&self, batch: WriteBatch) -> Result<()> {
            if self.reject.load(Ordering::SeqCst) {
                return Err(FreightError::WriteFailure("rejected by test".into()));
            }
            self.batches.lock().unwrap().push(batch.clone());
            self.inner.commit(batch)
        }
    }

    impl RecordingStore {
        fn last_batch(&self) -> WriteBatch {
            self.batches.lock().unwrap().last().cloned().unwrap()
        }
        fn batch_count(&self) -> usize {
            self.batches.lock().unwrap().len()
        }
    }

    fn operator() -> Session {
        Session {
            uid: "u-op".into(),
            profile: UserProfile {
                email: "op@example.com".into(),
                display_name: "Ops".into(),
                role: Role::Operator,
                company: "GOLDWAY".into(),
            },
        }
    }

    fn viewer() -> Session {
        let mut s = operator();
        s.profile.role = Role::Viewer;
        s
    }

    fn day() -> DayKey {
        "2024-03-05".parse().unwrap()
    }

    fn seed(store: &RecordingStore, items: &[(&str, &str)]) {
        let mut batch = WriteBatch::new();
        let header = ShipDetails {
            carrier_line: "CAMELLIA".into(),
            voy: "3211N".into(),
            ..Default::default()
        };
        batch
            .insert(paths::ship(&day(), "SHIP1").unwrap(), &header)
            .unwrap();
        for (id, forwarder) in items {
            let item = LineItem {
                forwarder: forwarder.to_string(),
                kgs: "100".into(),
                ..Default::default()
            };
            batch
                .insert(paths::item(&day(), "SHIP1", id).unwrap(), &item)
                .unwrap();
        }
        store.inner.commit(batch).unwrap();
    }

    fn open(items: &[(&str, &str)]) -> (Arc<RecordingStore>, ShipmentEditor) {
        let store = Arc::new(RecordingStore::default());
        seed(&store, items);
        let editor = ShipmentEditor::load(store.clone(), day(), "SHIP1").unwrap();
        (store, editor)
    }

    fn persisted(id: &str) -> RowKey {
        RowKey::Persisted(id.into())
    }

    #[test]
    fn load_missing_shipment_is_not_found() {
        let store = Arc::new(RecordingStore::default());
        let err = ShipmentEditor::load(store, day(), "GHOST").err().unwrap();
        assert!(matches!(err, FreightError::NotFound(_)));
    }

    #[test]
    fn load_reads_header_and_items_in_fetch_order() {
        let (_, ed) = open(&[("b", "NISSIN"), ("a", "KINTETSU")]);
        assert_eq!(ed.header().carrier_line, "CAMELLIA");
        let keys: Vec<_> = ed.items().iter().map(|r| r.key.clone()).collect();
        assert_eq!(keys, vec![persisted("a"), persisted("b")]);
        assert!(!ed.has_unsaved_changes());
    }

    #[test]
    fn unchanged_rows_produce_no_update() {
        let (store, mut ed) = open(&[("a", "KINTETSU"), ("b", "NISSIN")]);
        ed.edit_cell(&persisted("b"), ItemField::Kgs, "250").unwrap();
        let summary = ed.save(Some(&operator())).unwrap();

        assert_eq!(summary.updated, 1);
        assert_eq!(summary.inserted, 0);
        let ops = store.last_batch().into_ops();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].path().id(), "b");
        assert_eq!(ed.item(&persisted("b")).unwrap().kgs, "250");
        assert!(!ed.has_unsaved_changes());
    }

    #[test]
    fn edits_survive_the_refetch() {
        let (store, mut ed) = open(&[("a", "KINTETSU")]);
        ed.edit_cell(&persisted("a"), ItemField::Remark, "fragile").unwrap();
        let new_key = ed.add_row();
        ed.edit_cell(&new_key, ItemField::BlNo, "BL-77").unwrap();
        let summary = ed.save(Some(&operator())).unwrap();
        assert!(summary.resynced);

        let fresh = ShipmentEditor::load(store, day(), "SHIP1").unwrap();
        assert_eq!(fresh.items().len(), 2);
        assert_eq!(fresh.item(&persisted("a")).unwrap().remark, "fragile");
        assert!(fresh.items().iter().any(|r| r.value.bl_no == "BL-77"));
        assert_eq!(fresh.items(), ed.items());
    }

    #[test]
    fn deleting_persisted_and_new_rows_queues_only_persisted() {
        let (store, mut ed) = open(&[("A", "KINTETSU")]);
        let b = ed.add_row();
        ed.toggle_select(&persisted("A")).unwrap();
        ed.toggle_select(&b).unwrap();
        assert_eq!(ed.delete_selected(), 2);

        assert_eq!(
            ed.pending_deletions().iter().cloned().collect::<Vec<_>>(),
            vec!["A".to_string()]
        );
        assert!(ed.items().is_empty());
        assert!(ed.selected().is_empty());

        let summary = ed.save(Some(&operator())).unwrap();
        assert_eq!(summary.deleted, 1);
        assert_eq!(summary.inserted + summary.updated, 0);
        let ops = store.last_batch().into_ops();
        assert_eq!(ops.len(), 1);
        assert!(matches!(&ops[0], BatchOp::Delete { path } if path.id() == "A"));
        assert!(ed.pending_deletions().is_empty());
    }

    #[test]
    fn new_row_deleted_before_save_writes_nothing() {
        let (store, mut ed) = open(&[]);
        let k = ed.add_row();
        ed.toggle_select(&k).unwrap();
        ed.delete_selected();
        assert!(ed.pending_deletions().is_empty());
        let summary = ed.save(Some(&operator())).unwrap();
        assert!(summary.is_noop());
        assert_eq!(store.batch_count(), 0);
    }

    #[test]
    fn select_all_toggles_between_empty_and_full() {
        let (_, mut ed) = open(&[("a", "X"), ("b", "Y")]);
        ed.toggle_select_all();
        assert_eq!(ed.selected().len(), 2);
        ed.toggle_select_all();
        assert!(ed.selected().is_empty());

        ed.toggle_select_all();
        let full = ed.selected().clone();
        ed.toggle_select_all();
        ed.toggle_select_all();
        assert_eq!(ed.selected(), &full);
    }

    #[test]
    fn toggle_unknown_row_is_not_found() {
        let (_, mut ed) = open(&[("a", "X")]);
        assert!(ed.toggle_select(&persisted("zzz")).is_err());
        assert!(ed.edit_cell(&RowKey::Pending(99), ItemField::Kgs, "1").is_err());
    }

    #[test]
    fn failed_save_keeps_every_edit() {
        let (store, mut ed) = open(&[("a", "X"), ("b", "Y")]);
        ed.edit_cell(&persisted("a"), ItemField::Dest, "BUSAN").unwrap();
        let k = ed.add_row();
        ed.edit_cell(&k, ItemField::Pkg, "3").unwrap();
        ed.toggle_select(&persisted("b")).unwrap();
        ed.delete_selected();
        ed.stage_comment(Some(&operator()), "check B/L");

        let items_before = ed.items().to_vec();
        let comments_before = ed.comments().to_vec();
        let deletes_before = ed.pending_deletions().clone();

        store.reject.store(true, Ordering::SeqCst);
        let err = ed.save(Some(&operator())).unwrap_err();
        assert!(matches!(err, FreightError::WriteFailure(_)));
        assert_eq!(ed.items(), &items_before[..]);
        assert_eq!(ed.comments(), &comments_before[..]);
        assert_eq!(ed.pending_deletions(), &deletes_before);

        store.reject.store(false, Ordering::SeqCst);
        let summary = ed.save(Some(&operator())).unwrap();
        assert_eq!(
            (summary.deleted, summary.inserted, summary.updated, summary.comments_added),
            (1, 1, 1, 1)
        );
    }

    #[test]
    fn viewers_cannot_save() {
        let (store, mut ed) = open(&[("a", "X")]);
        ed.edit_cell(&persisted("a"), ItemField::Kgs, "5").unwrap();
        assert!(matches!(
            ed.save(Some(&viewer())),
            Err(FreightError::PermissionDenied(_))
        ));
        assert!(matches!(ed.save(None), Err(FreightError::PermissionDenied(_))));
        assert_eq!(store.batch_count(), 0);
        assert!(ed.has_unsaved_changes());
    }

    #[test]
    fn blank_comments_are_ignored() {
        let (store, mut ed) = open(&[]);
        assert_eq!(ed.add_comment(Some(&operator()), "").unwrap(), None);
        assert_eq!(ed.add_comment(Some(&operator()), "   ").unwrap(), None);
        assert_eq!(ed.add_comment(None, "hello").unwrap(), None);
        assert!(ed.comments().is_empty());
        assert_eq!(store.batch_count(), 0);
    }

    #[test]
    fn add_comment_writes_immediately_with_store_id() {
        let (store, mut ed) = open(&[]);
        let key = ed
            .add_comment(Some(&operator()), "cut-off moved to 15:00")
            .unwrap()
            .unwrap();
        assert!(!key.is_pending());
        assert_eq!(store.batch_count(), 1);
        assert_eq!(ed.comments().len(), 1);
        assert_eq!(ed.comments()[0].value.user, "Ops");
        assert!(!ed.has_unsaved_changes());

        let fresh = ShipmentEditor::load(store, day(), "SHIP1").unwrap();
        assert_eq!(fresh.comments()[0].key, key);
    }

    #[test]
    fn comments_are_ordered_by_creation_time() {
        let store = Arc::new(RecordingStore::default());
        seed(&store, &[]);
        let mut batch = WriteBatch::new();
        for (id, at) in [("x", 30), ("y", 10), ("z", 20)] {
            let c = Comment {
                user: "a".into(),
                comment: id.into(),
                created_at: at,
            };
            batch
                .insert(paths::comment(&day(), "SHIP1", id).unwrap(), &c)
                .unwrap();
        }
        store.inner.commit(batch).unwrap();
        let ed = ShipmentEditor::load(store, day(), "SHIP1").unwrap();
        let texts: Vec<_> = ed.comments().iter().map(|r| r.value.comment.as_str()).collect();
        assert_eq!(texts, vec!["y", "z", "x"]);
    }

    #[test]
    fn totals_sum_working_rows_and_write_to_header() {
        let (store, mut ed) = open(&[("a", "X"), ("b", "Y")]);
        ed.edit_cell(&persisted("a"), ItemField::Cbm, "1.5").unwrap();
        ed.edit_cell(&persisted("a"), ItemField::Pkg, "4").unwrap();
        let t = ed.totals();
        assert_eq!((t.kgs, t.cbm, t.pkg), (200.0, 1.5, 4.0));

        let header = ed.write_header_totals(Some(&operator())).unwrap();
        assert_eq!(header.kgs, "200");
        let stored = store
            .get(&paths::ship(&day(), "SHIP1").unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(stored["CBM"], "1.5");
        assert_eq!(stored["CARRIER_LINE"], "CAMELLIA");
    }

    #[test]
    fn refetch_failure_keeps_committed_ids_and_never_inserts_twice() {
        let (store, mut ed) = open(&[("a", "KINTETSU")]);
        let row = ed.add_row();
        ed.edit_cell(&row, ItemField::Forwarder, "NISSIN").unwrap();

        store.fail_lists.store(true, Ordering::SeqCst);
        let summary = ed.save(Some(&operator())).unwrap();
        assert_eq!(summary.inserted, 1);
        assert!(!summary.resynced);

        let new_key = ed.items()[1].key.clone();
        let id = new_key.persisted_id().unwrap().to_string();
        assert!(
            store
                .inner
                .get(&paths::item(&day(), "SHIP1", &id).unwrap())
                .unwrap()
                .is_some()
        );
        assert!(!ed.has_unsaved_changes());

        store.fail_lists.store(false, Ordering::SeqCst);
        let commits = store.batch_count();
        let again = ed.save(Some(&operator())).unwrap();
        assert!(again.is_noop());
        assert_eq!(store.batch_count(), commits);
        let stored = store
            .inner
            .list(&paths::items(&day(), "SHIP1").unwrap())
            .unwrap();
        assert_eq!(stored.len(), 2);
    }
}
