//! Configuration file support for caltrack.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/caltrack/config.toml`.

use crate::ledger::LEDGER_CAPACITY;
use crate::scheduler::RolloverTrigger;
use crate::{Error, Goals, Result, DEFAULT_CALORIE_GOAL, DEFAULT_WEIGHT_GOAL_KG};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub goals: GoalsConfig,

    #[serde(default)]
    pub ledger: LedgerConfig,

    #[serde(default)]
    pub rollover: RolloverConfig,

    #[serde(default)]
    pub persistence: PersistenceConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Default goals used until the user sets their own
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GoalsConfig {
    #[serde(default = "default_calorie_goal")]
    pub calorie_goal: f64,

    #[serde(default = "default_weight_goal_kg")]
    pub weight_goal_kg: u8,
}

impl Default for GoalsConfig {
    fn default() -> Self {
        Self {
            calorie_goal: default_calorie_goal(),
            weight_goal_kg: default_weight_goal_kg(),
        }
    }
}

/// Ledger retention configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

/// How day boundaries are detected
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RolloverMode {
    /// Roll over when the local calendar date changes
    #[default]
    Calendar,
    /// Roll over on a fixed interval, each tick simulating one day
    Interval,
}

/// Rollover scheduler configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RolloverConfig {
    #[serde(default)]
    pub mode: RolloverMode,

    #[serde(default = "default_poll_secs")]
    pub poll_secs: u64,

    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for RolloverConfig {
    fn default() -> Self {
        Self {
            mode: RolloverMode::default(),
            poll_secs: default_poll_secs(),
            interval_secs: default_interval_secs(),
        }
    }
}

/// Flush behavior configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct PersistenceConfig {
    /// Persist the ledger and session state after every food-log addition
    #[serde(default)]
    pub flush_on_add: bool,
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("caltrack")
}

fn default_calorie_goal() -> f64 {
    DEFAULT_CALORIE_GOAL
}

fn default_weight_goal_kg() -> u8 {
    DEFAULT_WEIGHT_GOAL_KG
}

fn default_capacity() -> usize {
    LEDGER_CAPACITY
}

fn default_poll_secs() -> u64 {
    60
}

fn default_interval_secs() -> u64 {
    60
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .unwrap_or_else(|| PathBuf::from("."));
        base.join("caltrack").join("config.toml")
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }

    /// Reject values the tracker cannot work with
    pub fn validate(&self) -> Result<()> {
        if !(self.goals.calorie_goal.is_finite() && self.goals.calorie_goal > 0.0) {
            return Err(Error::Config(format!(
                "goals.calorie_goal must be a positive number, got {}",
                self.goals.calorie_goal
            )));
        }
        if self.goals.weight_goal_kg > crate::MAX_WEIGHT_GOAL_KG {
            return Err(Error::Config(format!(
                "goals.weight_goal_kg must be at most {}, got {}",
                crate::MAX_WEIGHT_GOAL_KG,
                self.goals.weight_goal_kg
            )));
        }
        if self.ledger.capacity == 0 {
            return Err(Error::Config("ledger.capacity must be at least 1".into()));
        }
        if self.rollover.poll_secs == 0 || self.rollover.interval_secs == 0 {
            return Err(Error::Config(
                "rollover.poll_secs and rollover.interval_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Goals to use when no session state has been saved yet
    pub fn default_goals(&self) -> Goals {
        Goals {
            calorie_goal: self.goals.calorie_goal,
            weight_goal_kg: self.goals.weight_goal_kg,
        }
    }

    /// Scheduler trigger described by the `[rollover]` section
    pub fn rollover_trigger(&self) -> RolloverTrigger {
        match self.rollover.mode {
            RolloverMode::Calendar => RolloverTrigger::Calendar {
                poll: Duration::from_secs(self.rollover.poll_secs),
            },
            RolloverMode::Interval => RolloverTrigger::Interval {
                every: Duration::from_secs(self.rollover.interval_secs),
            },
        }
    }
}
