//! Per-step prompt windows

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Seconds each addressed player gets to answer a prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepTimeouts {
    pub attacker_secs: u32,
    pub defender_secs: u32,
    pub sidepass_secs: u32,
    pub save_secs: u32,
    /// Window shown on a substitution offer; an unanswered offer stays pending.
    pub substitution_secs: u32,
}

impl Default for StepTimeouts {
    fn default() -> Self {
        Self {
            attacker_secs: 30,
            defender_secs: 30,
            sidepass_secs: 30,
            save_secs: 30,
            substitution_secs: 15,
        }
    }
}

impl StepTimeouts {
    pub fn uniform(secs: u32) -> Self {
        Self {
            attacker_secs: secs,
            defender_secs: secs,
            sidepass_secs: secs,
            save_secs: secs,
            substitution_secs: secs,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        let all = [
            ("attacker_secs", self.attacker_secs),
            ("defender_secs", self.defender_secs),
            ("sidepass_secs", self.sidepass_secs),
            ("save_secs", self.save_secs),
            ("substitution_secs", self.substitution_secs),
        ];
        for (name, secs) in all {
            if secs == 0 {
                return Err(ConfigError::Invalid(format!("{name} must be positive")));
            }
        }
        Ok(())
    }
}
