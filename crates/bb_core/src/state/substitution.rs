//! Substitution Manager
//!
//! Captain-initiated request, accepted or declined by the incoming player.
//! At most one pending request per incoming identity; a newer request for
//! the same player overwrites the older one. Unanswered requests stay
//! pending until resolved or the match ends.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{Match, Phase};
use crate::error::{EngineError, Result};
use crate::models::{PlayerId, PlayerSlot, Position, TeamId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubstitutionRequest {
    pub team: TeamId,
    pub out_position: Position,
    pub in_player: PlayerId,
    pub in_name: String,
    pub created_at: DateTime<Utc>,
}

impl Match {
    /// Captain gating is the caller's job.
    pub fn request_substitution(
        &mut self,
        team: TeamId,
        out_position: Position,
        in_player: PlayerId,
        in_name: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<SubstitutionRequest> {
        match self.phase {
            Phase::Lobby => {
                return Err(EngineError::invalid_state(
                    "substitutions open once the game has started",
                ))
            }
            Phase::Finished => return Err(EngineError::invalid_state("the game is over")),
            Phase::Active | Phase::PeriodOver => {}
        }
        if self.slot(team, out_position).is_none() {
            return Err(EngineError::invalid_state(format!(
                "no player at {out_position} on team {team}"
            )));
        }
        if self.find_slot(in_player).is_some() {
            return Err(EngineError::invalid_state("that player already holds a slot"));
        }

        let request = SubstitutionRequest {
            team,
            out_position,
            in_player,
            in_name: in_name.into(),
            created_at: now,
        };
        self.sub_requests.insert(in_player, request.clone());
        info!(%team, position = %out_position, %in_player, "substitution requested");
        Ok(request)
    }

    /// Resolve the pending request for `in_player`. Returns true only when
    /// the slot was replaced.
    pub fn complete_substitution(&mut self, in_player: PlayerId, accepted: bool) -> bool {
        let Some(request) = self.sub_requests.remove(&in_player) else {
            return false;
        };
        if !accepted {
            info!(%in_player, "substitution declined");
            return false;
        }
        if self.phase == Phase::Finished || self.find_slot(in_player).is_some() {
            return false;
        }

        let team = self.team_mut(request.team);
        let outgoing = team.set_slot(request.out_position, PlayerSlot::new(in_player, request.in_name));
        let Some(outgoing) = outgoing else {
            return true;
        };

        if team.is_captain(outgoing.player_id) {
            team.captain = Some(in_player);
        }
        for id in self.join_order.iter_mut().filter(|id| **id == outgoing.player_id) {
            *id = in_player;
        }
        if let Some(live) = self.live.as_mut() {
            live.readdress(outgoing.player_id, in_player);
        }

        info!(
            team = %request.team,
            position = %request.out_position,
            outgoing = %outgoing.player_id,
            incoming = %in_player,
            "substitution completed"
        );
        true
    }

    pub fn pending_substitution(&self, in_player: PlayerId) -> Option<&SubstitutionRequest> {
        self.sub_requests.get(&in_player)
    }

    pub fn pending_substitutions(&self) -> impl Iterator<Item = &SubstitutionRequest> {
        self.sub_requests.values()
    }
}
