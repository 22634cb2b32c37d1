use serde_json::Value;
use tracing::{error, info};

use crate::date::DayKey;
use crate::domain::{DAILY_INDEX_FIELD, DailyIndex, ShipDetails};
use crate::error::{FreightError, Result};
use crate::paths;
use crate::session::{Session, require_editor};
use crate::store::state::to_document;
use crate::store::{DocumentStore, WriteBatch};

/// Input of the "add ship" form.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ShipRegistration {
    pub ship_id: String,
    pub date: String,
    pub carrier_line: String,
    pub voy: String,
    pub etd: String,
    pub eta: String,
}

/// Add a sailing: put the ship id on the day's index, then create or merge its header.
///
/// The two writes are separate commits. If the header write fails the index keeps the
/// new id and the error is returned as is; nothing is rolled back.
pub fn register_ship(
    store: &dyn DocumentStore,
    session: Option<&Session>,
    req: &ShipRegistration,
) -> Result<(DayKey, String)> {
    let session = require_editor(session)?;

    let ship_id = req.ship_id.trim();
    if ship_id.is_empty() {
        return Err(FreightError::ValidationFailure("ship id is required".into()));
    }
    if req.date.trim().is_empty() {
        return Err(FreightError::ValidationFailure("date is required".into()));
    }
    let date: DayKey = req.date.parse()?;
    let ship_path = paths::ship(&date, ship_id)?;

    let index_path = paths::daily_index(&date);
    let mut batch = WriteBatch::new();
    if store.get(&index_path)?.is_some() {
        batch.array_union(
            index_path,
            DAILY_INDEX_FIELD,
            vec![Value::String(ship_id.to_string())],
        );
    } else {
        let idx = DailyIndex {
            ships: vec![ship_id.to_string()],
        };
        batch.insert(index_path, &idx)?;
    }
    store.commit(batch)?;

    let header = ShipDetails {
        carrier_line: req.carrier_line.trim().to_string(),
        voy: req.voy.trim().to_string(),
        etd: req.etd.trim().to_string(),
        eta: req.eta.trim().to_string(),
        ..Default::default()
    };
    let mut batch = WriteBatch::new();
    batch.set_merge(ship_path, to_document(&header)?);
    if let Err(e) = store.commit(batch) {
        error!(
            ship = %ship_id,
            date = %date,
            error = %e,
            "ship added to daily index but header write failed"
        );
        return Err(e);
    }

    info!(ship = %ship_id, date = %date, user = %session.uid, "ship registered");
    Ok((date, ship_id.to_string()))
}
