use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{FreightError, Result};

/// Shipment header stored at `daily_ships/{date}/ships/{shipId}`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", default)]
pub struct ShipDetails {
    pub carrier_line: String,
    pub voy: String,
    pub etd: String,
    pub eta: String,
    pub kgs: String,
    pub cbm: String,
    pub total_pkg: String,
}

/// One freight manifest row. Cell values are kept as the raw text that was typed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineItem {
    #[serde(rename = "FORWARDER")]
    pub forwarder: String,
    #[serde(rename = "BLNO")]
    pub bl_no: String,
    #[serde(rename = "PIC")]
    pub pic: String,
    #[serde(rename = "DEST")]
    pub dest: String,
    #[serde(rename = "HANDLING")]
    pub handling: String,
    #[serde(rename = "OANDF")]
    pub o_and_f: String,
    #[serde(rename = "KGS")]
    pub kgs: String,
    #[serde(rename = "CBM")]
    pub cbm: String,
    #[serde(rename = "PKG")]
    pub pkg: String,
    #[serde(rename = "UNIT")]
    pub unit: String,
    #[serde(rename = "SHIPPER")]
    pub shipper: String,
    #[serde(rename = "REMARK")]
    pub remark: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ItemField {
    Forwarder,
    BlNo,
    Pic,
    Dest,
    Handling,
    OAndF,
    Kgs,
    Cbm,
    Pkg,
    Unit,
    Shipper,
    Remark,
}

impl ItemField {
    pub const ALL: [ItemField; 12] = [
        ItemField::Forwarder,
        ItemField::BlNo,
        ItemField::Pic,
        ItemField::Dest,
        ItemField::Handling,
        ItemField::OAndF,
        ItemField::Kgs,
        ItemField::Cbm,
        ItemField::Pkg,
        ItemField::Unit,
        ItemField::Shipper,
        ItemField::Remark,
    ];

    /// Column name as stored and as shown in the manifest header.
    pub fn column(self) -> &'static str {
        match self {
            ItemField::Forwarder => "FORWARDER",
            ItemField::BlNo => "BLNO",
            ItemField::Pic => "PIC",
            ItemField::Dest => "DEST",
            ItemField::Handling => "HANDLING",
            ItemField::OAndF => "OANDF",
            ItemField::Kgs => "KGS",
            ItemField::Cbm => "CBM",
            ItemField::Pkg => "PKG",
            ItemField::Unit => "UNIT",
            ItemField::Shipper => "SHIPPER",
            ItemField::Remark => "REMARK",
        }
    }
}

impl FromStr for ItemField {
    type Err = FreightError;

    fn from_str(s: &str) -> Result<Self> {
        let norm: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_uppercase();
        if norm == "OF" {
            return Ok(ItemField::OAndF);
        }
        ItemField::ALL
            .into_iter()
            .find(|f| f.column() == norm)
            .ok_or_else(|| FreightError::ValidationFailure(format!("unknown column `{s}`")))
    }
}

impl fmt::Display for ItemField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl LineItem {
    pub fn get(&self, field: ItemField) -> &str {
        match field {
            ItemField::Forwarder => &self.forwarder,
            ItemField::BlNo => &self.bl_no,
            ItemField::Pic => &self.pic,
            ItemField::Dest => &self.dest,
            ItemField::Handling => &self.handling,
            ItemField::OAndF => &self.o_and_f,
            ItemField::Kgs => &self.kgs,
            ItemField::Cbm => &self.cbm,
            ItemField::Pkg => &self.pkg,
            ItemField::Unit => &self.unit,
            ItemField::Shipper => &self.shipper,
            ItemField::Remark => &self.remark,
        }
    }

    pub fn set(&mut self, field: ItemField, value: impl Into<String>) {
        let slot = match field {
            ItemField::Forwarder => &mut self.forwarder,
            ItemField::BlNo => &mut self.bl_no,
            ItemField::Pic => &mut self.pic,
            ItemField::Dest => &mut self.dest,
            ItemField::Handling => &mut self.handling,
            ItemField::OAndF => &mut self.o_and_f,
            ItemField::Kgs => &mut self.kgs,
            ItemField::Cbm => &mut self.cbm,
            ItemField::Pkg => &mut self.pkg,
            ItemField::Unit => &mut self.unit,
            ItemField::Shipper => &mut self.shipper,
            ItemField::Remark => &mut self.remark,
        };
        *slot = value.into();
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub user: String,
    pub comment: String,
    /// Unix milliseconds.
    pub created_at: i64,
}

/// Ship identifiers sailing on one day, stored at `daily_ships/{date}`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DailyIndex {
    pub ships: Vec<String>,
}

pub const DAILY_INDEX_FIELD: &str = "ships";

/// Identity of a working row: either only local, or backed by a stored document.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RowKey {
    Pending(u64),
    Persisted(String),
}

impl RowKey {
    pub fn is_pending(&self) -> bool {
        matches!(self, RowKey::Pending(_))
    }

    pub fn persisted_id(&self) -> Option<&str> {
        match self {
            RowKey::Persisted(id) => Some(id),
            RowKey::Pending(_) => None,
        }
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowKey::Pending(n) => write!(f, "new#{n}"),
            RowKey::Persisted(id) => f.write_str(id),
        }
    }
}

/// Column sums shown under the manifest.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Totals {
    pub kgs: f64,
    pub cbm: f64,
    pub pkg: f64,
}

/// Lenient numeric read of a cell: thousands separators and blanks are tolerated,
/// anything else counts as zero.
pub fn cell_number(raw: &str) -> f64 {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite()).unwrap_or(0.0)
}

/// Format a total without a trailing `.0` for whole numbers.
pub fn format_total(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        let s = format!("{v:.3}");
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}
