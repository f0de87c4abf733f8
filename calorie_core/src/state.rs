//! Session state persistence with file locking.
//!
//! `state.json` carries the active day's running counters and the user's goals
//! between process invocations. The ledger itself is stored separately in CSV.

use crate::atomic::write_atomic;
use crate::{Goals, Result, SessionState};
use chrono::NaiveDate;
use fs2::FileExt;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// Default file name inside the data directory
pub const STATE_FILE_NAME: &str = "state.json";

impl SessionState {
    /// Fresh state for `day` with the given goals
    pub fn fresh(active_day: NaiveDate, goals: Goals) -> Self {
        Self {
            active_day,
            daily_calories: 0,
            food_log: Vec::new(),
            goals,
        }
    }

    /// Load session state from a file with shared locking
    ///
    /// Returns `None` if the file doesn't exist or cannot be read or parsed;
    /// corruption is logged as a warning.
    pub fn load(path: &Path) -> Option<Self> {
        if !path.exists() {
            tracing::info!("No state file found at {:?}", path);
            return None;
        }

        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!("Unable to open state file {:?}: {}. Using defaults.", path, e);
                return None;
            }
        };

        if let Err(e) = file.lock_shared() {
            tracing::warn!("Unable to lock state file {:?}: {}. Using defaults.", path, e);
            return None;
        }

        let mut contents = String::new();
        let read = std::io::BufReader::new(&file).read_to_string(&mut contents);
        let _ = file.unlock();
        if let Err(e) = read {
            tracing::warn!("Failed to read state file {:?}: {}. Using defaults.", path, e);
            return None;
        }

        match serde_json::from_str::<SessionState>(&contents) {
            Ok(state) => {
                tracing::debug!("Loaded session state from {:?}", path);
                Some(state)
            }
            Err(e) => {
                tracing::warn!("Failed to parse state file {:?}: {}. Using defaults.", path, e);
                None
            }
        }
    }

    /// Save session state atomically
    pub fn save(&self, path: &Path) -> Result<()> {
        write_atomic(path, |writer| {
            let contents = serde_json::to_string_pretty(self)?;
            writer.write_all(contents.as_bytes())?;
            Ok(())
        })?;

        tracing::debug!("Saved session state to {:?}", path);
        Ok(())
    }
}
