//! The tracker: ledger, running counters and goals behind one owner.
//!
//! Every mutation of calorie state goes through [`Tracker`]. Threads share it
//! as a [`SharedTracker`] and take the lock for the duration of one operation,
//! so a rollover is never observed half-applied.

use crate::csv_store::{self, LEDGER_FILE_NAME};
use crate::state::STATE_FILE_NAME;
use crate::{
    Config, DailyRecord, Error, FoodEntry, Goals, Ledger, Result, RolloverEvent, SessionState,
    MAX_WEIGHT_GOAL_KG,
};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// Tracker shared between the scheduler thread and the presentation layer
pub type SharedTracker = Arc<Mutex<Tracker>>;

/// Lock a shared tracker, recovering from a poisoned mutex
///
/// The tracker's state is valid between operations, so a panic in another
/// holder does not leave it inconsistent.
pub fn lock(tracker: &SharedTracker) -> MutexGuard<'_, Tracker> {
    tracker.lock().unwrap_or_else(|poisoned| {
        tracing::warn!("Tracker mutex was poisoned, recovering");
        poisoned.into_inner()
    })
}

/// Locations of the files backing a tracker
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackerPaths {
    pub ledger: PathBuf,
    pub state: PathBuf,
}

impl TrackerPaths {
    /// Standard file names inside `data_dir`
    pub fn in_dir(data_dir: &Path) -> Self {
        Self {
            ledger: data_dir.join(LEDGER_FILE_NAME),
            state: data_dir.join(STATE_FILE_NAME),
        }
    }
}

/// Outcome of logging a food item
///
/// The addition is applied even when the immediate flush fails; the caller
/// reports `flush_error` as "logged but not saved" instead of retrying.
#[derive(Debug)]
pub struct Logged {
    pub total: u32,
    pub flush_error: Option<Error>,
}

/// Owner of the calorie ledger and the active day's counters
#[derive(Debug)]
pub struct Tracker {
    ledger: Ledger,
    active_day: NaiveDate,
    daily_calories: u32,
    food_log: Vec<FoodEntry>,
    goals: Goals,
    paths: TrackerPaths,
    flush_on_add: bool,
}

impl Tracker {
    /// Load the ledger and session state from disk
    ///
    /// Never fails on missing or corrupt files. When the saved session belongs
    /// to an earlier day its counters are restored as-is; call
    /// [`Tracker::catch_up`] to roll the missed days over.
    pub fn open(paths: TrackerPaths, config: &Config, today: NaiveDate) -> Self {
        let mut ledger = csv_store::load_ledger(&paths.ledger, config.ledger.capacity);

        let state = match SessionState::load(&paths.state) {
            Some(state) => {
                if state.active_day > today {
                    tracing::warn!(
                        "Saved active day {} is ahead of today {}; keeping saved day",
                        state.active_day,
                        today
                    );
                }
                // Lazy flush means the ledger may lag behind the saved counter
                if state.daily_calories > 0 {
                    ledger.put(state.active_day, state.daily_calories);
                }
                state
            }
            None => {
                let mut state = SessionState::fresh(today, config.default_goals());
                state.daily_calories = ledger.get(today).unwrap_or(0);
                state
            }
        };
        ledger.trim_to_capacity();

        tracing::info!(
            "Opened tracker: {} ledger entries, active day {}, {} kcal so far",
            ledger.len(),
            state.active_day,
            state.daily_calories
        );

        Self {
            ledger,
            active_day: state.active_day,
            daily_calories: state.daily_calories,
            food_log: state.food_log,
            goals: state.goals,
            paths,
            flush_on_add: config.persistence.flush_on_add,
        }
    }

    /// Wrap the tracker for sharing with the scheduler
    pub fn into_shared(self) -> SharedTracker {
        Arc::new(Mutex::new(self))
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn paths(&self) -> &TrackerPaths {
        &self.paths
    }

    /// The day currently accumulating calories
    pub fn active_day(&self) -> NaiveDate {
        self.active_day
    }

    pub fn today_total(&self) -> u32 {
        self.daily_calories
    }

    pub fn food_log(&self) -> &[FoodEntry] {
        &self.food_log
    }

    pub fn goals(&self) -> Goals {
        self.goals
    }

    /// Daily calorie goal
    pub fn goal(&self) -> f64 {
        self.goals.calorie_goal
    }

    pub fn set_goal(&mut self, calorie_goal: f64) -> Result<()> {
        if !(calorie_goal.is_finite() && calorie_goal > 0.0) {
            return Err(Error::InvalidInput(format!(
                "calorie goal must be a positive number, got {}",
                calorie_goal
            )));
        }
        self.goals.calorie_goal = calorie_goal;
        tracing::info!("Calorie goal set to {}", calorie_goal);
        Ok(())
    }

    pub fn weight_goal(&self) -> u8 {
        self.goals.weight_goal_kg
    }

    pub fn set_weight_goal(&mut self, kg: u8) -> Result<()> {
        if kg > MAX_WEIGHT_GOAL_KG {
            return Err(Error::InvalidInput(format!(
                "weight goal must be between 0 and {} kg, got {}",
                MAX_WEIGHT_GOAL_KG, kg
            )));
        }
        self.goals.weight_goal_kg = kg;
        tracing::info!("Weight goal set to {} kg", kg);
        Ok(())
    }

    /// Log a food item against the active day
    ///
    /// The ledger entry for the active day is kept equal to the running total.
    /// Only invalid input is an error; a failed flush is carried in [`Logged`].
    pub fn add_to_today(&mut self, name: &str, calories: u32) -> Result<Logged> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("food name must not be empty".into()));
        }

        self.daily_calories = self.daily_calories.saturating_add(calories);
        self.ledger.put(self.active_day, self.daily_calories);
        self.food_log.push(FoodEntry::new(name, calories));

        tracing::debug!(
            "Logged {} ({} kcal), total {} for {}",
            name,
            calories,
            self.daily_calories,
            self.active_day
        );

        let flush_error = if self.flush_on_add {
            self.export_now().err()
        } else {
            None
        };
        if let Some(e) = &flush_error {
            tracing::warn!("Logged {} but could not save: {}", name, e);
        }

        Ok(Logged {
            total: self.daily_calories,
            flush_error,
        })
    }

    /// Zero the running total and food log without advancing the day
    pub fn clear_today(&mut self) {
        self.daily_calories = 0;
        self.food_log.clear();
        tracing::info!("Cleared food log for {}", self.active_day);
    }

    /// Ledger entries in ascending date order
    pub fn history(&self) -> Vec<DailyRecord> {
        self.ledger.list_sorted()
    }

    /// Write the ledger and session state immediately
    pub fn export_now(&self) -> Result<()> {
        csv_store::save_ledger(&self.paths.ledger, &self.ledger)?;
        self.save_state()?;
        tracing::info!("Exported {} ledger entries", self.ledger.len());
        Ok(())
    }

    /// Write the session state (counters and goals)
    pub fn save_state(&self) -> Result<()> {
        let state = SessionState {
            active_day: self.active_day,
            daily_calories: self.daily_calories,
            food_log: self.food_log.clone(),
            goals: self.goals,
        };
        state.save(&self.paths.state)
    }

    /// Close the active day and start the next one
    pub fn rollover(&mut self) -> Result<RolloverEvent> {
        self.close_day(self.active_day)
    }

    /// Roll over every day between the active day and `today`
    ///
    /// Stops at the first failure; days already closed stay closed.
    pub fn catch_up(&mut self, today: NaiveDate) -> Result<Vec<RolloverEvent>> {
        let mut events = Vec::new();
        while self.active_day < today {
            events.push(self.rollover()?);
        }
        if !events.is_empty() {
            tracing::info!("Caught up {} day(s) to {}", events.len(), today);
        }
        Ok(events)
    }

    /// Snapshot `day` into the ledger, persist, and reset the counters
    ///
    /// The ledger is written before the counters are reset, so a failed write
    /// leaves the running total intact for the next attempt. An existing entry
    /// for `day` is never overwritten. The counters belong to the active day:
    /// closing a day that is already behind it leaves them alone.
    pub fn close_day(&mut self, day: NaiveDate) -> Result<RolloverEvent> {
        let next_day = day
            .succ_opt()
            .ok_or_else(|| Error::Other(format!("no calendar day after {}", day)))?;

        if !self.ledger.contains(day) {
            self.ledger.put(day, self.daily_calories);
        }
        if !self.ledger.contains(next_day) {
            self.ledger.put(next_day, 0);
        }

        csv_store::save_ledger(&self.paths.ledger, &self.ledger)?;

        let closed_total = self.ledger.get(day).unwrap_or(0);
        if day >= self.active_day {
            self.daily_calories = 0;
            self.food_log.clear();
        }

        let evicted = self.ledger.evict_oldest_if_over_capacity();

        if next_day > self.active_day {
            self.active_day = next_day;
        }

        if let Err(e) = self.save_state() {
            tracing::warn!("Failed to save session state after rollover: {}", e);
        }

        tracing::info!(
            "Rolled over {} ({} kcal); active day is now {}",
            day,
            closed_total,
            self.active_day
        );

        Ok(RolloverEvent {
            closed_day: day,
            closed_total,
            next_day: self.active_day,
            evicted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    fn day(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(offset)
    }

    fn open_in(temp_dir: &TempDir, today: NaiveDate) -> Tracker {
        Tracker::open(
            TrackerPaths::in_dir(temp_dir.path()),
            &Config::default(),
            today,
        )
    }

    #[test]
    fn test_add_then_rollover_scenario() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut tracker = open_in(&temp_dir, day(0));

        assert_eq!(tracker.add_to_today("Lunch", 1850).unwrap().total, 1850);
        assert_eq!(tracker.today_total(), 1850);

        let event = tracker.rollover().unwrap();
        assert_eq!(event.closed_day, day(0));
        assert_eq!(event.closed_total, 1850);
        assert_eq!(event.next_day, day(1));
        assert_eq!(event.evicted, None);

        assert_eq!(tracker.ledger().get(day(0)), Some(1850));
        assert_eq!(tracker.ledger().get(day(1)), Some(0));
        assert_eq!(tracker.today_total(), 0);
        assert!(tracker.food_log().is_empty());
        assert_eq!(tracker.active_day(), day(1));
    }

    #[test]
    fn test_rollover_persists_ledger() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut tracker = open_in(&temp_dir, day(0));
        tracker.add_to_today("Dinner", 700).unwrap();
        tracker.rollover().unwrap();

        let contents =
            std::fs::read_to_string(temp_dir.path().join(LEDGER_FILE_NAME)).unwrap();
        assert_eq!(contents, "Day,Total Calories\n2024-01-01,700\n2024-01-02,0\n");
    }

    #[test]
    fn test_closing_same_day_twice_keeps_total() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut tracker = open_in(&temp_dir, day(0));
        tracker.add_to_today("Pasta", 900).unwrap();

        tracker.close_day(day(0)).unwrap();
        let second = tracker.close_day(day(0)).unwrap();

        assert_eq!(second.closed_total, 900);
        assert_eq!(tracker.ledger().get(day(0)), Some(900));
        assert_eq!(tracker.ledger().len(), 2);
    }

    #[test]
    fn test_closing_past_day_keeps_active_counters() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut tracker = open_in(&temp_dir, day(0));
        tracker.add_to_today("Pasta", 900).unwrap();
        tracker.close_day(day(0)).unwrap();

        tracker.add_to_today("Sandwich", 300).unwrap();
        let event = tracker.close_day(day(0)).unwrap();

        assert_eq!(event.closed_total, 900);
        assert_eq!(event.next_day, day(1));
        assert_eq!(tracker.active_day(), day(1));
        assert_eq!(tracker.today_total(), 300);
        assert_eq!(tracker.food_log().len(), 1);
        assert_eq!(tracker.ledger().get(day(1)), Some(300));

        tracker.add_to_today("Apple", 50).unwrap();
        assert_eq!(tracker.ledger().get(day(1)), Some(350));
        assert_eq!(tracker.ledger().get(day(0)), Some(900));
    }

    #[test]
    fn test_rollover_without_additions_records_zero() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut tracker = open_in(&temp_dir, day(0));

        tracker.rollover().unwrap();
        assert_eq!(tracker.ledger().get(day(0)), Some(0));
        assert_eq!(tracker.ledger().get(day(1)), Some(0));
    }

    #[test]
    fn test_additions_after_rollover_update_seeded_day() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut tracker = open_in(&temp_dir, day(0));
        tracker.rollover().unwrap();

        tracker.add_to_today("Apple", 95).unwrap();
        assert_eq!(tracker.ledger().get(day(1)), Some(95));

        tracker.rollover().unwrap();
        assert_eq!(tracker.ledger().get(day(1)), Some(95));
        assert_eq!(tracker.ledger().get(day(2)), Some(0));
    }

    #[test]
    fn test_history_bounded_after_every_rollover() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut tracker = open_in(&temp_dir, day(0));

        for i in 0..60 {
            tracker.add_to_today("Meal", 100 + i).unwrap();
            tracker.rollover().unwrap();
            assert!(tracker.ledger().len() <= 31);
        }

        let history = tracker.history();
        assert_eq!(history.len(), 31);
        assert_eq!(history.last().unwrap().date, day(60));
        assert_eq!(history.first().unwrap().date, day(30));
    }

    #[test]
    fn test_full_ledger_evicts_oldest_on_rollover() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut ledger = Ledger::new();
        for offset in 0..31 {
            ledger.put(day(offset), 1000);
        }
        csv_store::save_ledger(&temp_dir.path().join(LEDGER_FILE_NAME), &ledger).unwrap();

        // Active day is the last stored day; closing it seeds day 31
        let mut tracker = open_in(&temp_dir, day(30));
        let event = tracker.rollover().unwrap();

        assert_eq!(event.evicted, Some(DailyRecord::new(day(0), 1000)));
        assert_eq!(tracker.ledger().len(), 31);
        assert!(!tracker.ledger().contains(day(0)));
        assert!(tracker.ledger().contains(day(31)));
    }

    #[test]
    fn test_failed_persist_keeps_counters() {
        let temp_dir = tempfile::tempdir().unwrap();
        let blocker = temp_dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();

        let mut tracker = Tracker::open(
            TrackerPaths::in_dir(&blocker),
            &Config::default(),
            day(0),
        );
        tracker.add_to_today("Burrito", 1100).unwrap();

        assert!(tracker.rollover().is_err());
        assert_eq!(tracker.today_total(), 1100);
        assert_eq!(tracker.food_log().len(), 1);
        assert_eq!(tracker.active_day(), day(0));
        assert!(tracker.export_now().is_err());
    }

    #[test]
    fn test_clear_today_keeps_day() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut tracker = open_in(&temp_dir, day(0));
        tracker.add_to_today("Cake", 450).unwrap();

        tracker.clear_today();
        assert_eq!(tracker.today_total(), 0);
        assert!(tracker.food_log().is_empty());
        assert_eq!(tracker.active_day(), day(0));

        tracker.add_to_today("Salad", 200).unwrap();
        assert_eq!(tracker.ledger().get(day(0)), Some(200));
    }

    #[test]
    fn test_empty_food_name_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut tracker = open_in(&temp_dir, day(0));

        let result = tracker.add_to_today("   ", 100);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert_eq!(tracker.today_total(), 0);
        assert!(tracker.ledger().is_empty());
    }

    #[test]
    fn test_goal_validation() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut tracker = open_in(&temp_dir, day(0));
        assert_eq!(tracker.goal(), 2000.0);

        tracker.set_goal(1750.0).unwrap();
        assert_eq!(tracker.goal(), 1750.0);
        assert!(tracker.set_goal(0.0).is_err());
        assert!(tracker.set_goal(f64::NAN).is_err());
        assert_eq!(tracker.goal(), 1750.0);

        tracker.set_weight_goal(72).unwrap();
        assert_eq!(tracker.weight_goal(), 72);
        assert!(tracker.set_weight_goal(101).is_err());
    }

    #[test]
    fn test_session_state_survives_reopen() {
        let temp_dir = tempfile::tempdir().unwrap();
        {
            let mut tracker = open_in(&temp_dir, day(0));
            tracker.add_to_today("Eggs", 300).unwrap();
            tracker.set_goal(2200.0).unwrap();
            tracker.save_state().unwrap();
        }

        let tracker = open_in(&temp_dir, day(0));
        assert_eq!(tracker.today_total(), 300);
        assert_eq!(tracker.food_log().len(), 1);
        assert_eq!(tracker.food_log()[0].to_string(), "Eggs - 300 kcal");
        assert_eq!(tracker.goal(), 2200.0);
        assert_eq!(tracker.ledger().get(day(0)), Some(300));
    }

    #[test]
    fn test_catch_up_rolls_missed_days() {
        let temp_dir = tempfile::tempdir().unwrap();
        {
            let mut tracker = open_in(&temp_dir, day(0));
            tracker.add_to_today("Toast", 250).unwrap();
            tracker.save_state().unwrap();
        }

        let mut tracker = open_in(&temp_dir, day(3));
        assert_eq!(tracker.active_day(), day(0));

        let events = tracker.catch_up(day(3)).unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(tracker.active_day(), day(3));
        assert_eq!(tracker.ledger().get(day(0)), Some(250));
        assert_eq!(tracker.ledger().get(day(1)), Some(0));
        assert_eq!(tracker.ledger().get(day(2)), Some(0));
        assert_eq!(tracker.ledger().get(day(3)), Some(0));
        assert_eq!(tracker.today_total(), 0);
    }

    #[test]
    fn test_fresh_open_resumes_total_from_ledger() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut ledger = Ledger::new();
        ledger.put(day(5), 640);
        csv_store::save_ledger(&temp_dir.path().join(LEDGER_FILE_NAME), &ledger).unwrap();

        let tracker = open_in(&temp_dir, day(5));
        assert_eq!(tracker.today_total(), 640);
    }

    #[test]
    fn test_flush_on_add_writes_immediately() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.persistence.flush_on_add = true;

        let mut tracker =
            Tracker::open(TrackerPaths::in_dir(temp_dir.path()), &config, day(0));
        tracker.add_to_today("Soup", 320).unwrap();

        let contents =
            std::fs::read_to_string(temp_dir.path().join(LEDGER_FILE_NAME)).unwrap();
        assert!(contents.contains("2024-01-01,320"));
        assert!(temp_dir.path().join(STATE_FILE_NAME).exists());
    }

    #[test]
    fn test_flush_failure_applies_addition_once() {
        let temp_dir = tempfile::tempdir().unwrap();
        let blocker = temp_dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let mut config = Config::default();
        config.persistence.flush_on_add = true;

        let mut tracker = Tracker::open(TrackerPaths::in_dir(&blocker), &config, day(0));

        let logged = tracker.add_to_today("Tea", 100).unwrap();
        assert_eq!(logged.total, 100);
        assert!(logged.flush_error.is_some());
        assert_eq!(tracker.today_total(), 100);
        assert_eq!(tracker.food_log().len(), 1);
        assert_eq!(tracker.ledger().get(day(0)), Some(100));

        let logged = tracker.add_to_today("Biscuit", 40).unwrap();
        assert_eq!(logged.total, 140);
        assert_eq!(tracker.food_log().len(), 2);
    }

    #[test]
    fn test_open_trims_oversized_history() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut ledger = Ledger::with_capacity(40);
        for offset in 0..35 {
            ledger.put(day(offset), 500);
        }
        csv_store::save_ledger(&temp_dir.path().join(LEDGER_FILE_NAME), &ledger).unwrap();

        let mut tracker = open_in(&temp_dir, day(34));
        assert_eq!(tracker.ledger().len(), 31);
        assert!(!tracker.ledger().contains(day(3)));
        assert!(tracker.ledger().contains(day(4)));

        tracker.rollover().unwrap();
        assert_eq!(tracker.ledger().len(), 31);
        assert!(tracker.ledger().contains(day(35)));
    }

    #[test]
    fn test_lock_recovers_from_poison() {
        let temp_dir = tempfile::tempdir().unwrap();
        let shared = open_in(&temp_dir, day(0)).into_shared();

        let clone = Arc::clone(&shared);
        let _ = std::thread::spawn(move || {
            let _guard = clone.lock().unwrap();
            panic!("poison the mutex");
        })
        .join();

        let mut guard = lock(&shared);
        guard.add_to_today("Tea", 5).unwrap();
        assert_eq!(guard.today_total(), 5);
    }
}
