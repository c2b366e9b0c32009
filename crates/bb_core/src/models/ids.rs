//! Identity types shared across the engine

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::EngineError;

/// Chat-platform identity of a human player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Chat venue hosting at most one match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VenueId(pub u64);

impl fmt::Display for VenueId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum TeamId {
    One,
    Two,
}

impl TeamId {
    pub const ALL: [TeamId; 2] = [TeamId::One, TeamId::Two];

    pub fn index(self) -> usize {
        match self {
            TeamId::One => 0,
            TeamId::Two => 1,
        }
    }

    pub fn number(self) -> u8 {
        match self {
            TeamId::One => 1,
            TeamId::Two => 2,
        }
    }

    pub fn opponent(self) -> TeamId {
        match self {
            TeamId::One => TeamId::Two,
            TeamId::Two => TeamId::One,
        }
    }
}

impl TryFrom<u8> for TeamId {
    type Error = EngineError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(TeamId::One),
            2 => Ok(TeamId::Two),
            other => Err(EngineError::rejected(format!("unknown team {other}"))),
        }
    }
}

impl From<TeamId> for u8 {
    fn from(team: TeamId) -> u8 {
        team.number()
    }
}

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Tactical slot on a team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    /// Point guard
    Pg,
    /// Shooting guard
    Sg,
    /// Centre, the team's defender
    Ce,
}

impl Position {
    /// Fill order for joins.
    pub const ALL: [Position; 3] = [Position::Pg, Position::Sg, Position::Ce];

    pub fn index(self) -> usize {
        match self {
            Position::Pg => 0,
            Position::Sg => 1,
            Position::Ce => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Position::Pg => "pg",
            Position::Sg => "sg",
            Position::Ce => "ce",
        }
    }
}

impl FromStr for Position {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pg" => Ok(Position::Pg),
            "sg" => Ok(Position::Sg),
            "ce" => Ok(Position::Ce),
            other => Err(EngineError::rejected(format!("unknown position '{other}'"))),
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.as_str().to_ascii_uppercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_team_opponent_is_involution() {
        for team in TeamId::ALL {
            assert_ne!(team, team.opponent());
            assert_eq!(team, team.opponent().opponent());
        }
    }

    #[test]
    fn test_team_from_number() {
        assert_eq!(TeamId::try_from(1).unwrap(), TeamId::One);
        assert_eq!(TeamId::try_from(2).unwrap(), TeamId::Two);
        assert!(TeamId::try_from(3).is_err());
        assert_eq!(serde_json::to_string(&TeamId::Two).unwrap(), "2");
        assert_eq!(serde_json::from_str::<TeamId>("1").unwrap(), TeamId::One);
    }

    #[test]
    fn test_position_parse_is_case_insensitive() {
        assert_eq!("PG".parse::<Position>().unwrap(), Position::Pg);
        assert_eq!(" ce ".parse::<Position>().unwrap(), Position::Ce);
        assert!("c".parse::<Position>().is_err());
        assert_eq!(Position::Sg.to_string(), "SG");
    }
}
