//! Bounded per-day calorie history.
//!
//! The ledger maps calendar dates to the calories consumed that day and keeps
//! at most [`LEDGER_CAPACITY`] entries once trimmed.

use crate::DailyRecord;
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Number of days retained in the ledger
pub const LEDGER_CAPACITY: usize = 31;

/// In-memory ledger of daily calorie totals
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ledger {
    entries: BTreeMap<NaiveDate, u32>,
    capacity: usize,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    /// Create an empty ledger with the default capacity
    pub fn new() -> Self {
        Self::with_capacity(LEDGER_CAPACITY)
    }

    /// Create an empty ledger retaining `capacity` days (at least one)
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, date: NaiveDate) -> Option<u32> {
        self.entries.get(&date).copied()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.entries.contains_key(&date)
    }

    /// Insert or overwrite the total for `date`
    pub fn put(&mut self, date: NaiveDate, total_calories: u32) {
        self.entries.insert(date, total_calories);
    }

    /// All entries in ascending date order
    pub fn list_sorted(&self) -> Vec<DailyRecord> {
        self.entries
            .iter()
            .map(|(date, total)| DailyRecord::new(*date, *total))
            .collect()
    }

    /// Remove the single oldest entry if the ledger is over capacity
    ///
    /// Removes at most one entry per call; returns it when something was trimmed.
    pub fn evict_oldest_if_over_capacity(&mut self) -> Option<DailyRecord> {
        if self.entries.len() <= self.capacity {
            return None;
        }

        let (date, total) = self.entries.pop_first()?;
        tracing::debug!("Evicted {} ({} kcal) from ledger", date, total);
        Some(DailyRecord::new(date, total))
    }

    /// Evict oldest entries until the ledger is within capacity
    pub fn trim_to_capacity(&mut self) -> Vec<DailyRecord> {
        std::iter::from_fn(|| self.evict_oldest_if_over_capacity()).collect()
    }
}

impl FromIterator<DailyRecord> for Ledger {
    fn from_iter<I: IntoIterator<Item = DailyRecord>>(iter: I) -> Self {
        let mut ledger = Ledger::new();
        ledger.extend(iter);
        ledger
    }
}

impl Extend<DailyRecord> for Ledger {
    fn extend<I: IntoIterator<Item = DailyRecord>>(&mut self, iter: I) {
        for record in iter {
            self.put(record.date, record.total_calories);
        }
    }
}
