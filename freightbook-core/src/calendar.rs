use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use time::{Date, Month};
use tracing::{debug, warn};

use crate::date::DayKey;
use crate::domain::DailyIndex;
use crate::error::{FreightError, Result};
use crate::paths;
use crate::store::DocumentStore;
use crate::store::state::from_document;

/// One visible calendar month.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthView {
    year: i32,
    month: Month,
}

impl MonthView {
    pub fn new(year: i32, month: u8) -> Result<Self> {
        let first = DayKey::from_ymd(year, month, 1)?;
        Ok(Self::containing(&first))
    }

    pub fn containing(day: &DayKey) -> Self {
        let d = day.date();
        Self {
            year: d.year(),
            month: d.month(),
        }
    }

    pub fn current() -> Self {
        Self::containing(&DayKey::today())
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u8 {
        self.month as u8
    }

    fn first_date(&self) -> Date {
        // Day 1 exists for every month of a year `new`/`containing` accepted.
        Date::from_calendar_date(self.year, self.month, 1).unwrap_or(Date::MIN)
    }

    pub fn first_day(&self) -> DayKey {
        DayKey::from_date(self.first_date())
    }

    pub fn last_day(&self) -> DayKey {
        let next = self.next().first_date();
        DayKey::from_date(next.previous_day().unwrap_or(next))
    }

    pub fn next(&self) -> Self {
        match self.month {
            Month::December => Self {
                year: self.year + 1,
                month: Month::January,
            },
            m => Self {
                year: self.year,
                month: m.next(),
            },
        }
    }

    pub fn prev(&self) -> Self {
        match self.month {
            Month::January => Self {
                year: self.year - 1,
                month: Month::December,
            },
            m => Self {
                year: self.year,
                month: m.previous(),
            },
        }
    }
}

impl FromStr for MonthView {
    type Err = FreightError;

    fn from_str(s: &str) -> Result<Self> {
        let bad = || FreightError::ValidationFailure(format!("month `{s}` must be written as YYYY-MM"));
        let (y, m) = s.trim().split_once('-').ok_or_else(bad)?;
        if y.len() != 4 || m.len() != 2 {
            return Err(bad());
        }
        let year: i32 = y.parse().map_err(|_| bad())?;
        let month: u8 = m.parse().map_err(|_| bad())?;
        Self::new(year, month)
    }
}

impl fmt::Display for MonthView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month as u8)
    }
}

/// One sailing shown on a calendar day.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CalendarEntry {
    pub date: DayKey,
    pub ship_id: String,
}

/// Every sailing in `month`: one entry per ship id in each day's index, days ascending.
pub fn list_month(store: &dyn DocumentStore, month: MonthView) -> Result<Vec<CalendarEntry>> {
    let first = month.first_day().to_string();
    let last = month.last_day().to_string();
    let docs = store.list_range(&paths::daily_ships(), &first, &last)?;

    let mut days = Vec::with_capacity(docs.len());
    for (id, doc) in docs {
        let Ok(day) = id.parse::<DayKey>() else {
            warn!(key = %id, "skipping daily index with a malformed date key");
            continue;
        };
        match from_document::<DailyIndex>(doc) {
            Ok(idx) => days.push((day, idx)),
            Err(e) => warn!(date = %day, error = %e, "skipping unreadable daily index"),
        }
    }
    days.sort_by_key(|(day, _)| *day);

    let entries: Vec<CalendarEntry> = days
        .into_iter()
        .flat_map(|(date, idx)| {
            idx.ships
                .into_iter()
                .map(move |ship_id| CalendarEntry { date, ship_id })
        })
        .collect();
    debug!(month = %month, entries = entries.len(), "calendar month listed");
    Ok(entries)
}

/// The calendar screen: a visible month and the sailings in it.
pub struct CalendarLister {
    store: Arc<dyn DocumentStore>,
    month: MonthView,
    entries: Vec<CalendarEntry>,
}

impl CalendarLister {
    pub fn open(store: Arc<dyn DocumentStore>, month: MonthView) -> Result<Self> {
        let entries = list_month(store.as_ref(), month)?;
        Ok(Self {
            store,
            month,
            entries,
        })
    }

    pub fn month(&self) -> MonthView {
        self.month
    }

    pub fn entries(&self) -> &[CalendarEntry] {
        &self.entries
    }

    /// Switch the visible month; re-queries only when it actually changes.
    pub fn set_month(&mut self, month: MonthView) -> Result<bool> {
        if month == self.month {
            return Ok(false);
        }
        self.entries = list_month(self.store.as_ref(), month)?;
        self.month = month;
        Ok(true)
    }

    pub fn next_month(&mut self) -> Result<bool> {
        self.set_month(self.month.next())
    }

    pub fn prev_month(&mut self) -> Result<bool> {
        self.set_month(self.month.prev())
    }

    pub fn refresh(&mut self) -> Result<()> {
        self.entries = list_month(self.store.as_ref(), self.month)?;
        Ok(())
    }

    /// The `(date, shipId)` an entry opens in the detail editor.
    pub fn select(&self, index: usize) -> Option<(DayKey, &str)> {
        self.entries
            .get(index)
            .map(|e| (e.date, e.ship_id.as_str()))
    }
}
