//! # Match Configuration
//!
//! All tuning constants for a match live here: period length, halftime mark,
//! roster size, per-step prompt windows and the overtime policy.
//!
//! ## Usage
//! ```rust
//! use bb_core::config::MatchConfig;
//!
//! let config = MatchConfig::default();
//! let quick = MatchConfig::quick();
//! assert!(quick.max_moves < config.max_moves);
//! ```

mod env;
mod timeouts;

pub use env::{MATCH_CONFIG_PATH_ENV, from_env_var};
pub use timeouts::StepTimeouts;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Regulation length in completed possessions.
pub const MAX_MOVES: u32 = 36;
/// Move count at which halftime is observed.
pub const HALFTIME_MOVE: u32 = 18;
/// Number of joiners that locks the roster (two teams of three).
pub const JOIN_LIMIT: usize = 6;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// How a tied game continues once a period ends level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OvertimeRule {
    /// A fresh window of `max_moves` completed possessions.
    #[default]
    FullWindow,
    /// The period ends on the first completed possession that leaves the
    /// scores unequal (still capped at `max_moves`).
    SuddenDeath,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Completed possessions per period (기본: 36)
    pub max_moves: u32,
    /// Halftime mark within regulation (기본: 18)
    pub halftime_move: u32,
    /// Joiners needed to lock the roster (기본: 6)
    pub join_limit: usize,
    pub step_timeouts: StepTimeouts,
    pub overtime_rule: OvertimeRule,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            max_moves: MAX_MOVES,
            halftime_move: HALFTIME_MOVE,
            join_limit: JOIN_LIMIT,
            step_timeouts: StepTimeouts::default(),
            overtime_rule: OvertimeRule::FullWindow,
        }
    }
}

impl MatchConfig {
    /// Standard 36-possession game.
    pub fn standard() -> Self {
        Self::default()
    }

    /// Short game for demos and smoke runs.
    pub fn quick() -> Self {
        Self {
            max_moves: 12,
            halftime_move: 6,
            step_timeouts: StepTimeouts::uniform(15),
            ..Self::default()
        }
    }

    /// Standard length, sudden-death overtime.
    pub fn sudden_death() -> Self {
        Self { overtime_rule: OvertimeRule::SuddenDeath, ..Self::default() }
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_moves < 2 {
            return Err(ConfigError::Invalid(format!(
                "max_moves must be at least 2, got {}",
                self.max_moves
            )));
        }
        if self.halftime_move == 0 || self.halftime_move >= self.max_moves {
            return Err(ConfigError::Invalid(format!(
                "halftime_move must lie in 1..{}, got {}",
                self.max_moves, self.halftime_move
            )));
        }
        if self.join_limit != JOIN_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "join_limit must be {} (two teams of three), got {}",
                JOIN_LIMIT, self.join_limit
            )));
        }
        self.step_timeouts.validate()
    }

    /// Defaults, overridden by the JSON file named in `BB_MATCH_CONFIG_PATH`.
    pub fn from_env() -> Result<Self, ConfigError> {
        from_env_var(MATCH_CONFIG_PATH_ENV)
    }
}
