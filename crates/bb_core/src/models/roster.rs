//! Teams and their three tactical slots

use serde::{Deserialize, Serialize};

use super::ids::{PlayerId, Position, TeamId};

/// Occupant of one tactical position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSlot {
    pub player_id: PlayerId,
    pub name: String,
    /// Set after the player lets a prompt time out.
    #[serde(default)]
    pub afk: bool,
}

impl PlayerSlot {
    pub fn new(player_id: PlayerId, name: impl Into<String>) -> Self {
        Self { player_id, name: name.into(), afk: false }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    /// Indexed by `Position::index()`
    slots: [Option<PlayerSlot>; 3],
    pub captain: Option<PlayerId>,
    pub score: u32,
}

impl Team {
    pub fn new(id: TeamId) -> Self {
        Self {
            id,
            name: format!("Team {}", id.number()),
            slots: [None, None, None],
            captain: None,
            score: 0,
        }
    }

    pub fn slot(&self, position: Position) -> Option<&PlayerSlot> {
        self.slots[position.index()].as_ref()
    }

    pub(crate) fn slot_mut(&mut self, position: Position) -> Option<&mut PlayerSlot> {
        self.slots[position.index()].as_mut()
    }

    /// Put `slot` at `position`, returning the previous occupant.
    pub(crate) fn set_slot(&mut self, position: Position, slot: PlayerSlot) -> Option<PlayerSlot> {
        self.slots[position.index()].replace(slot)
    }

    pub(crate) fn clear_slot(&mut self, position: Position) -> Option<PlayerSlot> {
        self.slots[position.index()].take()
    }

    pub fn first_empty(&self) -> Option<Position> {
        Position::ALL.into_iter().find(|pos| self.slot(*pos).is_none())
    }

    pub fn is_full(&self) -> bool {
        self.first_empty().is_none()
    }

    pub fn position_of(&self, player: PlayerId) -> Option<Position> {
        Position::ALL
            .into_iter()
            .find(|pos| self.slot(*pos).is_some_and(|s| s.player_id == player))
    }

    pub fn contains(&self, player: PlayerId) -> bool {
        self.position_of(player).is_some()
    }

    /// Occupied slots in position order.
    pub fn occupants(&self) -> impl Iterator<Item = (Position, &PlayerSlot)> {
        Position::ALL.into_iter().filter_map(move |pos| self.slot(pos).map(|s| (pos, s)))
    }

    pub fn is_captain(&self, player: PlayerId) -> bool {
        self.captain == Some(player)
    }

    /// Display name of the captain, if the captain still holds a slot.
    pub fn captain_name(&self) -> Option<&str> {
        let captain = self.captain?;
        self.occupants().find(|(_, s)| s.player_id == captain).map(|(_, s)| s.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_team_is_empty() {
        let team = Team::new(TeamId::Two);
        assert_eq!(team.name, "Team 2");
        assert_eq!(team.first_empty(), Some(Position::Pg));
        assert!(!team.is_full());
        assert_eq!(team.occupants().count(), 0);
    }

    #[test]
    fn test_slot_replacement_returns_previous() {
        let mut team = Team::new(TeamId::One);
        assert!(team.set_slot(Position::Sg, PlayerSlot::new(PlayerId(1), "a")).is_none());
        let old = team.set_slot(Position::Sg, PlayerSlot::new(PlayerId(2), "b"));
        assert_eq!(old.unwrap().player_id, PlayerId(1));
        assert_eq!(team.position_of(PlayerId(2)), Some(Position::Sg));
        assert_eq!(team.first_empty(), Some(Position::Pg));
    }

    #[test]
    fn test_captain_name_requires_slot() {
        let mut team = Team::new(TeamId::One);
        team.set_slot(Position::Pg, PlayerSlot::new(PlayerId(7), "Kai"));
        team.captain = Some(PlayerId(7));
        assert_eq!(team.captain_name(), Some("Kai"));

        team.clear_slot(Position::Pg);
        assert_eq!(team.captain_name(), None);
    }
}
