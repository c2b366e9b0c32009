//! Coin toss sub-protocol
//!
//! Both captains pick HIGH or LOW; the coordinator draws the outcome and,
//! when no single team matched, falls back to a uniform pick between teams.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::info;

use super::{Match, PossessionPointer};
use crate::error::{EngineError, Result};
use crate::models::{Position, TeamId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TossSide {
    High,
    Low,
}

impl TossSide {
    pub const ALL: [TossSide; 2] = [TossSide::High, TossSide::Low];

    pub fn as_str(self) -> &'static str {
        match self {
            TossSide::High => "high",
            TossSide::Low => "low",
        }
    }
}

impl FromStr for TossSide {
    type Err = EngineError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(TossSide::High),
            "low" => Ok(TossSide::Low),
            other => Err(EngineError::rejected(format!("choose HIGH or LOW, not '{other}'"))),
        }
    }
}

impl fmt::Display for TossSide {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.as_str().to_ascii_uppercase())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TossState {
    pub(crate) active: bool,
    /// Indexed by `TeamId::index()`
    pub(crate) choices: [Option<TossSide>; 2],
}

impl TossState {
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn choice(&self, team: TeamId) -> Option<TossSide> {
        self.choices[team.index()]
    }

    pub fn both_chosen(&self) -> bool {
        self.choices.iter().all(Option::is_some)
    }
}

impl Match {
    pub fn toss(&self) -> &TossState {
        &self.toss
    }

    pub fn start_toss(&mut self) -> Result<()> {
        self.ensure_active()?;
        if self.live.is_some() {
            return Err(EngineError::invalid_state("cannot toss during a possession"));
        }
        self.toss = TossState { active: true, choices: [None, None] };
        Ok(())
    }

    /// Record a team's pick. A team may change its pick until resolution.
    pub fn choose_side(&mut self, team: TeamId, side: TossSide) -> Result<()> {
        if !self.toss.active {
            return Err(EngineError::invalid_state("no toss in progress"));
        }
        self.toss.choices[team.index()] = Some(side);
        Ok(())
    }

    /// Deactivate the toss; the winner is the one team whose pick equals
    /// `outcome`, or `None` when both or neither matched.
    pub fn resolve_toss(&mut self, outcome: TossSide) -> Option<TeamId> {
        if !self.toss.active {
            return None;
        }
        let state = std::mem::take(&mut self.toss);

        let mut winners = TeamId::ALL.into_iter().filter(|team| state.choice(*team) == Some(outcome));
        match (winners.next(), winners.next()) {
            (Some(team), None) => Some(team),
            _ => None,
        }
    }

    /// Toss winner takes possession at point guard.
    pub fn award_toss(&mut self, winner: TeamId) -> Result<()> {
        if self.live.is_some() {
            return Err(EngineError::invalid_state("cannot change possession mid-play"));
        }
        self.possession = Some(PossessionPointer { team: winner, position: Position::Pg });
        info!(%winner, "toss awarded");
        Ok(())
    }
}
