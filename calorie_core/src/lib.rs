#![forbid(unsafe_code)]

//! Core domain model and business logic for the caltrack calorie tracker.
//!
//! This crate provides:
//! - Domain types (daily records, food entries, goals)
//! - The bounded daily ledger
//! - The tracker owning the ledger and the running counters
//! - Rollover scheduling
//! - Persistence (CSV ledger, JSON session state)

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
mod atomic;
pub mod ledger;
pub mod csv_store;
pub mod state;
pub mod tracker;
pub mod scheduler;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::Config;
pub use ledger::{Ledger, LEDGER_CAPACITY};
pub use tracker::{Logged, SharedTracker, Tracker, TrackerPaths};
pub use scheduler::{Clock, RolloverTrigger, Scheduler, SchedulerEvent, SchedulerHandle, SystemClock};
