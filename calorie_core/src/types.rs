//! Core domain types for the calorie tracker.
//!
//! This module defines the fundamental types used throughout the system:
//! - Daily records (one calendar day's calorie total)
//! - Food log entries for the active day
//! - Goals and the persisted session state
//! - Rollover notifications

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Ledger Types
// ============================================================================

/// One day's calorie total
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DailyRecord {
    pub date: NaiveDate,
    pub total_calories: u32,
}

impl DailyRecord {
    pub fn new(date: NaiveDate, total_calories: u32) -> Self {
        Self {
            date,
            total_calories,
        }
    }
}

// ============================================================================
// Food Log Types
// ============================================================================

/// A single food item logged against the active day
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FoodEntry {
    pub id: Uuid,
    pub name: String,
    pub calories: u32,
    pub logged_at: DateTime<Utc>,
}

impl FoodEntry {
    pub fn new(name: impl Into<String>, calories: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            calories,
            logged_at: Utc::now(),
        }
    }
}

impl fmt::Display for FoodEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {} kcal", self.name, self.calories)
    }
}

// ============================================================================
// Goals and Session State
// ============================================================================

pub const DEFAULT_CALORIE_GOAL: f64 = 2000.0;
pub const DEFAULT_WEIGHT_GOAL_KG: u8 = 50;
pub const MAX_WEIGHT_GOAL_KG: u8 = 100;

/// User goals shown alongside the running total and the history
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Goals {
    #[serde(default = "default_calorie_goal")]
    pub calorie_goal: f64,

    #[serde(default = "default_weight_goal_kg")]
    pub weight_goal_kg: u8,
}

impl Default for Goals {
    fn default() -> Self {
        Self {
            calorie_goal: DEFAULT_CALORIE_GOAL,
            weight_goal_kg: DEFAULT_WEIGHT_GOAL_KG,
        }
    }
}

fn default_calorie_goal() -> f64 {
    DEFAULT_CALORIE_GOAL
}

fn default_weight_goal_kg() -> u8 {
    DEFAULT_WEIGHT_GOAL_KG
}

/// Running counters and goals persisted between process invocations
///
/// The ledger itself lives in the CSV file; this only carries what the CSV
/// cannot: the food log for the active day and the user's goals.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub active_day: NaiveDate,
    pub daily_calories: u32,
    #[serde(default)]
    pub food_log: Vec<FoodEntry>,
    #[serde(default)]
    pub goals: Goals,
}

// ============================================================================
// Rollover Types
// ============================================================================

/// Notification emitted after a day has been closed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RolloverEvent {
    /// The day that was closed
    pub closed_day: NaiveDate,
    /// Total recorded in the ledger for the closed day
    pub closed_total: u32,
    /// The new active day
    pub next_day: NaiveDate,
    /// Entry trimmed from the ledger to stay within capacity, if any
    pub evicted: Option<DailyRecord>,
}
