//! Live score snapshot

use serde::{Deserialize, Serialize};

use super::{Match, Period, Phase, PossessionPointer};
use crate::models::{PlayerId, Position, TeamId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotView {
    pub position: Position,
    pub name: Option<String>,
    pub afk: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamScore {
    pub team: TeamId,
    pub name: String,
    pub score: u32,
    pub captain_id: Option<PlayerId>,
    pub captain_name: Option<String>,
    pub slots: Vec<SlotView>,
}

/// Read-only view taken under one lock, so it never mixes two transitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveScore {
    pub phase: Phase,
    pub period: Period,
    pub move_count: u32,
    pub max_moves: u32,
    pub possession: Option<PossessionPointer>,
    pub teams: Vec<TeamScore>,
}

impl LiveScore {
    pub fn team(&self, team: TeamId) -> Option<&TeamScore> {
        self.teams.iter().find(|t| t.team == team)
    }

    /// One line per team, e.g. `Team 1 (Hoopers) | Captain: Kai | Score: 12 | PG: Kai, SG: -, CE: Lee`
    pub fn summary_lines(&self) -> Vec<String> {
        self.teams
            .iter()
            .map(|t| {
                let slots = t
                    .slots
                    .iter()
                    .map(|s| {
                        let name = s.name.as_deref().unwrap_or("-");
                        let afk = if s.afk { " (AFK)" } else { "" };
                        format!("{}: {}{}", s.position, name, afk)
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                format!(
                    "Team {} ({}) | Captain: {} | Score: {} | {}",
                    t.team,
                    t.name,
                    t.captain_name.as_deref().unwrap_or("None"),
                    t.score,
                    slots
                )
            })
            .collect()
    }
}

impl Match {
    pub fn live_score(&self) -> LiveScore {
        let teams = self
            .teams()
            .map(|team| TeamScore {
                team: team.id,
                name: team.name.clone(),
                score: team.score,
                captain_id: team.captain,
                captain_name: team.captain_name().map(str::to_string),
                slots: Position::ALL
                    .into_iter()
                    .map(|position| {
                        let slot = team.slot(position);
                        SlotView {
                            position,
                            name: slot.map(|s| s.name.clone()),
                            afk: slot.is_some_and(|s| s.afk),
                        }
                    })
                    .collect(),
            })
            .collect();

        LiveScore {
            phase: self.phase,
            period: self.period,
            move_count: self.move_count,
            max_moves: self.config.max_moves,
            possession: self.possession,
            teams,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchConfig;
    use crate::state::test_support::started;

    #[test]
    fn test_live_score_reflects_roster() {
        let mut m = started(MatchConfig::default());
        m.score_points(TeamId::Two, 5).unwrap();
        m.mark_afk(PlayerId(6));

        let live = m.live_score();
        assert_eq!(live.move_count, 0);
        assert_eq!(live.max_moves, 36);

        let two = live.team(TeamId::Two).unwrap();
        assert_eq!(two.score, 5);
        assert_eq!(two.captain_name.as_deref(), Some("p4"));
        assert!(two.slots[2].afk);

        let lines = live.summary_lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("Score: 5"));
        assert!(lines[1].contains("CE: p6 (AFK)"));
    }

    #[test]
    fn test_live_score_serializes() {
        let m = started(MatchConfig::default());
        let json = serde_json::to_string(&m.live_score()).unwrap();
        let back: LiveScore = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m.live_score());
    }
}
