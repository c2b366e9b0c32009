//! Roster operations: join, leave, kick, captaincy

use tracing::{debug, info};

use super::{Match, Phase};
use crate::error::{EngineError, Result};
use crate::models::{PlayerId, PlayerSlot, Position, TeamId};

const MAX_TEAM_NAME_LEN: usize = 32;

impl Match {
    /// Seat a player in the first empty slot: team 1 then team 2, PG, SG, CE.
    pub fn join(&mut self, player: PlayerId, name: impl Into<String>) -> Result<(TeamId, Position)> {
        if self.phase != Phase::Lobby {
            return Err(EngineError::invalid_state("the game has already started"));
        }
        if self.locked || self.join_order.len() >= self.config.join_limit {
            return Err(EngineError::capacity("the lobby is full"));
        }
        if self.find_slot(player).is_some() {
            return Err(EngineError::rejected("you have already joined"));
        }

        let (team, position) = TeamId::ALL
            .into_iter()
            .find_map(|team| self.team(team).first_empty().map(|pos| (team, pos)))
            .ok_or_else(|| EngineError::capacity("no empty slot"))?;

        self.seat(player, name.into(), team, position);
        Ok((team, position))
    }

    pub(crate) fn seat(&mut self, player: PlayerId, name: String, team: TeamId, position: Position) {
        self.team_mut(team).set_slot(position, PlayerSlot::new(player, name));
        self.assign_captain_if_vacant(team, player);
        self.join_order.push(player);
        self.locked = self.join_order.len() >= self.config.join_limit;
        debug!(%player, %team, %position, joined = self.join_order.len(), "player seated");
    }

    /// First joiner on a team becomes captain unless one is already set.
    pub fn assign_captain_if_vacant(&mut self, team: TeamId, player: PlayerId) -> bool {
        let team = self.team_mut(team);
        if team.captain.is_some() {
            return false;
        }
        team.captain = Some(player);
        true
    }

    /// Pre-start only. Frees the slot and re-evaluates the lock.
    pub fn leave(&mut self, player: PlayerId) -> Result<(TeamId, Position)> {
        if self.phase != Phase::Lobby {
            return Err(EngineError::invalid_state("cannot leave once the game has started"));
        }
        let (team, position) =
            self.find_slot(player).ok_or_else(|| EngineError::rejected("you are not in the lobby"))?;

        self.team_mut(team).clear_slot(position);
        self.join_order.retain(|id| *id != player);
        self.locked = self.join_order.len() >= self.config.join_limit;

        if self.team(team).is_captain(player) {
            // earliest remaining joiner on the same team inherits the armband
            let heir = self.join_order.iter().copied().find(|id| self.team(team).contains(*id));
            self.team_mut(team).captain = heir;
        }

        debug!(%player, %team, %position, "player left");
        Ok((team, position))
    }

    /// Host removes another player before the start.
    pub fn kick(&mut self, requester: PlayerId, target: PlayerId) -> Result<(TeamId, Position)> {
        if requester != self.host {
            return Err(EngineError::rejected("only the host can kick players"));
        }
        self.leave(target)
    }

    pub fn find_team_of(&self, player: PlayerId) -> Option<TeamId> {
        self.find_slot(player).map(|(team, _)| team)
    }

    pub fn find_slot(&self, player: PlayerId) -> Option<(TeamId, Position)> {
        TeamId::ALL
            .into_iter()
            .find_map(|team| self.team(team).position_of(player).map(|pos| (team, pos)))
    }

    pub fn join_order(&self) -> &[PlayerId] {
        &self.join_order
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Team captained by `player`, if any.
    pub fn captain_of(&self, player: PlayerId) -> Option<TeamId> {
        TeamId::ALL.into_iter().find(|team| self.team(*team).is_captain(player))
    }

    /// Current captain hands the armband to a teammate.
    pub fn transfer_captaincy(&mut self, requester: PlayerId, target: PlayerId) -> Result<TeamId> {
        let team = self
            .captain_of(requester)
            .ok_or_else(|| EngineError::rejected("you are not a captain on any team"))?;
        if self.find_team_of(target) != Some(team) {
            return Err(EngineError::rejected("target player is not on your team"));
        }
        self.team_mut(team).captain = Some(target);
        info!(%team, from = %requester, to = %target, "captaincy transferred");
        Ok(team)
    }

    pub fn rename_team(&mut self, requester: PlayerId, team: TeamId, name: &str) -> Result<()> {
        if !self.team(team).is_captain(requester) {
            return Err(EngineError::rejected("only the team captain can rename the team"));
        }
        let name = name.trim();
        if name.is_empty() || name.chars().count() > MAX_TEAM_NAME_LEN {
            return Err(EngineError::rejected(format!(
                "team names must be 1..={MAX_TEAM_NAME_LEN} characters"
            )));
        }
        self.team_mut(team).name = name.to_string();
        Ok(())
    }
}
