//! Match aggregate
//!
//! `Match` owns both teams, the lifecycle phase, the move counter, the
//! possession pointer, toss sub-state, pending substitutions and the open
//! possession (if any). Every mutation goes through `&mut self`, so a
//! caller holding the match behind a lock publishes each transition whole.
//!
//! Operations are split across files by concern:
//! - `lobby.rs` - join / leave / kick / captaincy
//! - `toss.rs` - coin toss sub-protocol
//! - `substitution.rs` - request / accept protocol
//! - `livescore.rs` - read-only snapshot
//! - `crate::engine::possession` - the possession state machine

mod livescore;
mod lobby;
mod substitution;
mod toss;

pub use livescore::{LiveScore, SlotView, TeamScore};
pub use substitution::SubstitutionRequest;
pub use toss::{TossSide, TossState};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::info;

use crate::config::{MatchConfig, OvertimeRule};
use crate::engine::possession::LivePossession;
use crate::error::{EngineError, Result};
use crate::models::{PlayerId, PlayerSlot, Position, Team, TeamId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Players joining, roster mutable.
    Lobby,
    /// Possessions may be played.
    Active,
    /// The current period's move window is exhausted; the caller decides
    /// between overtime and game over.
    PeriodOver,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Regulation,
    Overtime(u8),
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Period::Regulation => f.write_str("regulation"),
            Period::Overtime(n) => write!(f, "overtime {n}"),
        }
    }
}

/// Who starts the next possession.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PossessionPointer {
    pub team: TeamId,
    pub position: Position,
}

/// Result of one move-counter increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveTick {
    pub move_count: u32,
    /// The counter just crossed the halftime mark.
    pub halftime: bool,
    /// The period just ended (the match is no longer active).
    pub period_over: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub(crate) host: PlayerId,
    pub(crate) config: MatchConfig,
    pub(crate) teams: [Team; 2],
    pub(crate) phase: Phase,
    pub(crate) period: Period,
    pub(crate) move_count: u32,
    pub(crate) possession: Option<PossessionPointer>,
    pub(crate) toss: TossState,
    pub(crate) sub_requests: BTreeMap<PlayerId, SubstitutionRequest>,
    pub(crate) join_order: Vec<PlayerId>,
    pub(crate) locked: bool,
    pub(crate) live: Option<LivePossession>,
    /// Last issued step sequence number; never reused within a match.
    #[serde(default)]
    pub(crate) step_seq: u32,
}

impl Match {
    /// Empty lobby owned by `host`. Use `open_lobby` to also seat the host.
    pub fn new(host: PlayerId, config: MatchConfig) -> Self {
        Self {
            host,
            config,
            teams: [Team::new(TeamId::One), Team::new(TeamId::Two)],
            phase: Phase::Lobby,
            period: Period::Regulation,
            move_count: 0,
            possession: None,
            toss: TossState::default(),
            sub_requests: BTreeMap::new(),
            join_order: Vec::new(),
            locked: false,
            live: None,
            step_seq: 0,
        }
    }

    /// Lobby creation: the creator becomes host and first joiner (team 1 PG).
    pub fn open_lobby(host: PlayerId, host_name: impl Into<String>, config: MatchConfig) -> Self {
        let mut lobby = Self::new(host, config);
        lobby.seat(host, host_name.into(), TeamId::One, Position::Pg);
        lobby
    }

    // ========================
    // Accessors
    // ========================

    pub fn host(&self) -> PlayerId {
        self.host
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn team(&self, id: TeamId) -> &Team {
        &self.teams[id.index()]
    }

    pub(crate) fn team_mut(&mut self, id: TeamId) -> &mut Team {
        &mut self.teams[id.index()]
    }

    pub fn teams(&self) -> impl Iterator<Item = &Team> {
        self.teams.iter()
    }

    pub fn slot(&self, team: TeamId, position: Position) -> Option<&PlayerSlot> {
        self.team(team).slot(position)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Between a successful start and the end of the current period.
    pub fn is_active(&self) -> bool {
        self.phase == Phase::Active
    }

    pub fn period(&self) -> Period {
        self.period
    }

    pub fn move_count(&self) -> u32 {
        self.move_count
    }

    pub fn possession(&self) -> Option<PossessionPointer> {
        self.possession
    }

    pub fn score(&self, team: TeamId) -> u32 {
        self.team(team).score
    }

    pub fn is_tied(&self) -> bool {
        self.score(TeamId::One) == self.score(TeamId::Two)
    }

    /// Leading team, `None` when level.
    pub fn leader(&self) -> Option<TeamId> {
        let (one, two) = (self.score(TeamId::One), self.score(TeamId::Two));
        match one.cmp(&two) {
            std::cmp::Ordering::Greater => Some(TeamId::One),
            std::cmp::Ordering::Less => Some(TeamId::Two),
            std::cmp::Ordering::Equal => None,
        }
    }

    // ========================
    // Start / Move Accounting
    // ========================

    /// Host-only; every slot on both teams must be filled.
    pub fn start(&mut self, requester: PlayerId) -> Result<()> {
        if requester != self.host {
            return Err(EngineError::rejected("only the host can start the game"));
        }
        if self.phase != Phase::Lobby {
            return Err(EngineError::invalid_state("game already started"));
        }
        if let Some(team) = self.teams.iter().find(|t| !t.is_full()) {
            return Err(EngineError::invalid_state(format!("{} is not full", team.name)));
        }

        self.phase = Phase::Active;
        self.period = Period::Regulation;
        self.move_count = 0;
        self.possession = Some(PossessionPointer { team: TeamId::One, position: Position::Pg });
        info!(host = %self.host, "match started");
        Ok(())
    }

    /// Count one fully resolved possession outside the possession engine
    /// (manual play, tooling). Refused while a possession is open.
    pub fn complete_possession(&mut self) -> Result<MoveTick> {
        self.ensure_active()?;
        if self.live.is_some() {
            return Err(EngineError::invalid_state("a possession is still open"));
        }
        Ok(self.advance_move_counter())
    }

    /// Increment the counter once and end the period when its window closes.
    pub(crate) fn advance_move_counter(&mut self) -> MoveTick {
        self.move_count += 1;

        let window_closed = self.move_count >= self.config.max_moves;
        let sudden_death_decided = matches!(self.period, Period::Overtime(_))
            && self.config.overtime_rule == OvertimeRule::SuddenDeath
            && !self.is_tied();

        let period_over = window_closed || sudden_death_decided;
        if period_over {
            self.phase = Phase::PeriodOver;
            info!(
                period = %self.period,
                move_count = self.move_count,
                score_1 = self.score(TeamId::One),
                score_2 = self.score(TeamId::Two),
                "period over"
            );
        }

        MoveTick { move_count: self.move_count, halftime: self.is_halftime(), period_over }
    }

    /// True at exactly one counter value in regulation.
    pub fn is_halftime(&self) -> bool {
        self.period == Period::Regulation && self.move_count == self.config.halftime_move
    }

    /// A period just ended level.
    pub fn overtime_due(&self) -> bool {
        self.phase == Phase::PeriodOver && self.is_tied()
    }

    /// Reactivate for another period. Scores carry over, the counter restarts.
    pub fn begin_overtime(&mut self) -> Result<Period> {
        if !self.overtime_due() {
            return Err(EngineError::invalid_state("overtime requires a period that ended tied"));
        }
        let next = match self.period {
            Period::Regulation => 1,
            Period::Overtime(n) => n.saturating_add(1),
        };
        self.period = Period::Overtime(next);
        self.move_count = 0;
        self.phase = Phase::Active;
        info!(period = %self.period, rule = ?self.config.overtime_rule, "overtime started");
        Ok(self.period)
    }

    /// Close a finished period as the final result. Returns the winner.
    pub fn finish(&mut self) -> Result<Option<TeamId>> {
        if self.phase != Phase::PeriodOver {
            return Err(EngineError::invalid_state("the current period is still running"));
        }
        self.phase = Phase::Finished;
        info!(winner = ?self.leader(), "game over");
        Ok(self.leader())
    }

    /// Manual termination from any phase.
    pub fn end_game(&mut self) {
        if self.live.take().is_some() {
            info!("open possession discarded by manual end");
        }
        self.toss = TossState::default();
        self.phase = Phase::Finished;
    }

    // ========================
    // Overrides
    // ========================

    pub fn set_possession(&mut self, team: TeamId, position: Position) -> Result<()> {
        self.ensure_no_open_possession()?;
        self.possession = Some(PossessionPointer { team, position });
        Ok(())
    }

    pub fn score_points(&mut self, team: TeamId, points: u32) -> Result<()> {
        self.ensure_no_open_possession()?;
        self.team_mut(team).score += points;
        Ok(())
    }

    // ========================
    // AFK
    // ========================

    /// Returns whether the player holds a slot.
    pub fn mark_afk(&mut self, player: PlayerId) -> bool {
        self.set_afk(player, true)
    }

    pub fn clear_afk(&mut self, player: PlayerId) -> bool {
        self.set_afk(player, false)
    }

    fn set_afk(&mut self, player: PlayerId, afk: bool) -> bool {
        let Some((team, position)) = self.find_slot(player) else {
            return false;
        };
        if let Some(slot) = self.team_mut(team).slot_mut(position) {
            slot.afk = afk;
        }
        true
    }

    // ========================
    // Helpers
    // ========================

    pub(crate) fn ensure_active(&self) -> Result<()> {
        if self.phase != Phase::Active {
            return Err(EngineError::invalid_state("no active game"));
        }
        Ok(())
    }

    pub(crate) fn ensure_no_open_possession(&self) -> Result<()> {
        if self.live.is_some() {
            return Err(EngineError::invalid_state("a possession is in progress"));
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_start_requires_host() {
        let mut m = full_lobby(MatchConfig::default());
        assert!(matches!(m.start(PlayerId(2)), Err(EngineError::RejectedAction(_))));
        assert_eq!(m.phase(), Phase::Lobby);
    }

    #[test]
    fn test_start_requires_full_rosters() {
        let mut m = Match::open_lobby(PlayerId(1), "host", MatchConfig::default());
        for id in 2..=5 {
            m.join(PlayerId(id), format!("p{id}")).unwrap();
        }
        assert!(matches!(m.start(PlayerId(1)), Err(EngineError::InvalidState(_))));
        assert!(!m.is_active());
    }

    #[test]
    fn test_start_sets_initial_possession() {
        let m = started(MatchConfig::default());
        assert!(m.is_active());
        assert_eq!(m.move_count(), 0);
        assert_eq!(
            m.possession(),
            Some(PossessionPointer { team: TeamId::One, position: Position::Pg })
        );
    }

    #[test]
    fn test_halftime_is_a_single_crossing() {
        let mut m = started(MatchConfig::default());
        let mut halftimes = Vec::new();
        while m.is_active() {
            let tick = m.complete_possession().unwrap();
            if tick.halftime {
                halftimes.push(tick.move_count);
            }
        }
        assert_eq!(halftimes, vec![18]);
        assert_eq!(m.move_count(), 36);
        assert_eq!(m.phase(), Phase::PeriodOver);
    }

    #[test]
    fn test_counter_stops_at_period_end() {
        let mut m = started(MatchConfig::default());
        for _ in 0..36 {
            m.complete_possession().unwrap();
        }
        assert!(m.complete_possession().is_err());
        assert_eq!(m.move_count(), 36);
    }

    #[test]
    fn test_overtime_only_when_tied() {
        let mut m = started(MatchConfig::default());
        for _ in 0..35 {
            m.complete_possession().unwrap();
        }
        assert!(!m.overtime_due());
        m.complete_possession().unwrap();
        assert!(m.overtime_due());

        assert_eq!(m.begin_overtime().unwrap(), Period::Overtime(1));
        assert!(m.is_active());
        assert_eq!(m.move_count(), 0);
    }

    #[test]
    fn test_no_overtime_when_decided() {
        let mut m = started(MatchConfig::default());
        m.score_points(TeamId::Two, 3).unwrap();
        for _ in 0..36 {
            m.complete_possession().unwrap();
        }
        assert!(!m.overtime_due());
        assert!(m.begin_overtime().is_err());
        assert_eq!(m.finish().unwrap(), Some(TeamId::Two));
        assert_eq!(m.phase(), Phase::Finished);
    }

    #[test]
    fn test_overtime_keeps_scores_and_skips_halftime() {
        let mut m = started(MatchConfig::default());
        m.score_points(TeamId::One, 4).unwrap();
        m.score_points(TeamId::Two, 4).unwrap();
        for _ in 0..36 {
            m.complete_possession().unwrap();
        }
        m.begin_overtime().unwrap();
        assert_eq!(m.score(TeamId::One), 4);
        for _ in 0..18 {
            assert!(!m.complete_possession().unwrap().halftime);
        }
    }

    #[test]
    fn test_sudden_death_ends_on_first_lead() {
        let mut m = started(MatchConfig::sudden_death());
        for _ in 0..36 {
            m.complete_possession().unwrap();
        }
        m.begin_overtime().unwrap();

        // level possessions keep overtime going
        assert!(!m.complete_possession().unwrap().period_over);
        m.score_points(TeamId::One, 2).unwrap();
        assert!(m.complete_possession().unwrap().period_over);
        assert_eq!(m.finish().unwrap(), Some(TeamId::One));
    }

    #[test]
    fn test_end_game_from_any_phase() {
        let mut m = full_lobby(MatchConfig::default());
        m.end_game();
        assert_eq!(m.phase(), Phase::Finished);
        assert!(!m.is_active());
    }

    #[test]
    fn test_afk_flags() {
        let mut m = full_lobby(MatchConfig::default());
        assert!(m.mark_afk(PlayerId(3)));
        assert!(m.slot(TeamId::One, Position::Ce).unwrap().afk);
        assert!(m.clear_afk(PlayerId(3)));
        assert!(!m.slot(TeamId::One, Position::Ce).unwrap().afk);
        assert!(!m.mark_afk(PlayerId(99)));
    }
}
