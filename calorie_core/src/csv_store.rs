//! CSV persistence for the calorie ledger.
//!
//! The ledger is stored as a flat two-column table:
//!
//! ```text
//! Day,Total Calories
//! 2024-01-01,1850
//! 2024-01-02,0
//! ```
//!
//! Loading never fails: a missing file, an unreadable file or a malformed row
//! all degrade to "no prior data" for the affected rows. Saving rewrites the
//! whole file atomically.

use crate::atomic::write_atomic;
use crate::{Ledger, Result};
use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use std::path::Path;

/// Default file name inside the data directory
pub const LEDGER_FILE_NAME: &str = "monthly_calorie_records.csv";

const HEADER: [&str; 2] = ["Day", "Total Calories"];
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Load the ledger from `path`, skipping anything that does not parse
///
/// The first line is always treated as the header.
pub fn load_ledger(path: &Path, capacity: usize) -> Ledger {
    let mut ledger = Ledger::with_capacity(capacity);

    if !path.exists() {
        tracing::info!("No ledger file at {:?}, starting with empty history", path);
        return ledger;
    }

    let mut reader = match ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
    {
        Ok(reader) => reader,
        Err(e) => {
            tracing::warn!(
                "Unable to open ledger file {:?}: {}. Starting with empty history.",
                path,
                e
            );
            return ledger;
        }
    };

    let mut skipped = 0;
    for (index, result) in reader.records().enumerate() {
        // +2: one for the header, one for 1-based line numbers
        let line = index + 2;
        match result {
            Ok(record) => match parse_row(&record) {
                Some((date, total)) => ledger.put(date, total),
                None => {
                    tracing::warn!("Skipping malformed ledger row at line {}: {:?}", line, record);
                    skipped += 1;
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read ledger row at line {}: {}", line, e);
                skipped += 1;
            }
        }
    }

    let trimmed = ledger.trim_to_capacity();
    if !trimmed.is_empty() {
        tracing::warn!(
            "Ledger file {:?} holds more than {} days; dropped {} oldest",
            path,
            ledger.capacity(),
            trimmed.len()
        );
    }

    tracing::debug!(
        "Loaded {} ledger entries from {:?} ({} skipped)",
        ledger.len(),
        path,
        skipped
    );
    ledger
}

/// Parse a `date,total` row; anything other than exactly two valid fields is rejected
fn parse_row(record: &StringRecord) -> Option<(NaiveDate, u32)> {
    if record.len() != 2 {
        return None;
    }
    let date = NaiveDate::parse_from_str(record.get(0)?, DATE_FORMAT).ok()?;
    let total = record.get(1)?.parse::<u32>().ok()?;
    Some((date, total))
}

/// Rewrite the ledger file at `path` in ascending date order
pub fn save_ledger(path: &Path, ledger: &Ledger) -> Result<()> {
    write_atomic(path, |out| {
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(out);
        writer.write_record(HEADER)?;
        for record in ledger.list_sorted() {
            writer.write_record([
                record.date.format(DATE_FORMAT).to_string(),
                record.total_calories.to_string(),
            ])?;
        }
        writer.flush()?;
        Ok(())
    })?;

    tracing::debug!("Saved {} ledger entries to {:?}", ledger.len(), path);
    Ok(())
}
