//! Presentation collaborator
//!
//! The coordinator never assumes delivery succeeded: a presenter that cannot
//! reach the player answers `Selection::Timeout` and play continues under
//! the step's timeout policy.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::config::OvertimeRule;
use crate::engine::{ChoiceSet, OutcomeKind, StepKind};
use crate::models::{PlayerId, Position, TeamId, VenueId};
use crate::state::{Period, TossSide};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Selection {
    /// Option code (or 1-based option number) picked by the player.
    Chosen(String),
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "to", content = "id", rename_all = "snake_case")]
pub enum Audience {
    Venue,
    Team(TeamId),
    Player(PlayerId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "notice", rename_all = "snake_case")]
pub enum Notice {
    LobbyCreated { host: String },
    PlayerJoined { name: String, team: TeamId, position: Position },
    PlayerLeft { name: String },
    PlayerKicked { name: String },
    GameStarted,
    TossStarted,
    TossChoice { team: TeamId, side: TossSide },
    TossResult { draw: TossSide, winner: TeamId, fallback: bool },
    OnTheClock { player: String, step: StepKind, seconds: i64 },
    StepTimedOut { player: String, step: StepKind },
    PossessionResolved { outcome: OutcomeKind, team: TeamId, points: u32, next_team: TeamId, next_position: Position },
    Halftime { score_1: u32, score_2: u32 },
    PeriodOver { period: Period, score_1: u32, score_2: u32 },
    OvertimeStarted { period: Period, rule: OvertimeRule },
    GameOver { winner: Option<TeamId>, score_1: u32, score_2: u32 },
    SubstitutionRequested { team: TeamId, position: Position, incoming: String },
    SubstitutionCompleted { team: TeamId, position: Position, incoming: String },
    SubstitutionDeclined { incoming: String },
    CaptainChanged { team: TeamId, name: String },
    TeamRenamed { team: TeamId, name: String },
    GameEnded,
    /// An input was refused; shown to the actor only.
    Rejected { reason: String },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Notice::LobbyCreated { host } => {
                write!(f, "Lobby created. {host} joined as Team 1 PG. Players may now join.")
            }
            Notice::PlayerJoined { name, team, position } => {
                write!(f, "{name} joined Team {team} as {position}.")
            }
            Notice::PlayerLeft { name } => write!(f, "{name} left the lobby."),
            Notice::PlayerKicked { name } => write!(f, "{name} was removed from the lobby."),
            Notice::GameStarted => f.write_str("Game started! Begin the coin toss."),
            Notice::TossStarted => f.write_str("Coin toss started: both captains, choose HIGH or LOW."),
            Notice::TossChoice { team, side } => write!(f, "Team {team} chose {side}."),
            Notice::TossResult { draw, winner, fallback } => {
                write!(f, "Toss result: {draw}. Team {winner} gets possession at PG")?;
                if *fallback {
                    f.write_str(" (decided by coin flip)")?;
                }
                f.write_str(".")
            }
            Notice::OnTheClock { player, step, seconds } => {
                write!(f, "{player}: {} ({seconds}s).", step.prompt_text())
            }
            Notice::StepTimedOut { player, step } => {
                write!(f, "{player} ran out of time ({step:?}) and is marked AFK.")
            }
            Notice::PossessionResolved { outcome, team, points, next_team, next_position } => {
                match outcome {
                    OutcomeKind::DefenderSteal => write!(f, "Defence reads it! Ball to Team {next_team} {next_position}.")?,
                    OutcomeKind::PassFailureToScore => {
                        write!(f, "SG not present; automatic score of {points} for Team {team}.")?
                    }
                    OutcomeKind::ShotScored => write!(f, "Team {team} scores {points}!")?,
                    OutcomeKind::AttackerForfeit => write!(f, "Team {team} forfeits the possession.")?,
                }
                write!(f, " Next: Team {next_team} {next_position}.")
            }
            Notice::Halftime { score_1, score_2 } => {
                write!(f, "HALFTIME. Team 1: {score_1}, Team 2: {score_2}.")
            }
            Notice::PeriodOver { period, score_1, score_2 } => {
                write!(f, "End of {period}. Team 1: {score_1}, Team 2: {score_2}.")
            }
            Notice::OvertimeStarted { period, rule } => match rule {
                OvertimeRule::SuddenDeath => write!(f, "SUDDEN DEATH {period}: first lead wins!"),
                OvertimeRule::FullWindow => write!(f, "Tied! Starting {period}."),
            },
            Notice::GameOver { winner, score_1, score_2 } => {
                write!(f, "GAME OVER. Team 1: {score_1}, Team 2: {score_2}. ")?;
                match winner {
                    Some(team) => write!(f, "Team {team} wins!"),
                    None => f.write_str("It's a draw."),
                }
            }
            Notice::SubstitutionRequested { team, position, incoming } => {
                write!(f, "{incoming}, you have a sub request to join Team {team} as {position}.")
            }
            Notice::SubstitutionCompleted { team, position, incoming } => {
                write!(f, "{incoming} is in for Team {team} at {position}.")
            }
            Notice::SubstitutionDeclined { incoming } => {
                write!(f, "{incoming} declined the substitution.")
            }
            Notice::CaptainChanged { team, name } => write!(f, "{name} is now captain of Team {team}."),
            Notice::TeamRenamed { team, name } => write!(f, "Team {team} is now called {name}."),
            Notice::GameEnded => f.write_str("Game ended."),
            Notice::Rejected { reason } => f.write_str(reason),
        }
    }
}

pub trait Presenter {
    /// Show `choices` to `user` and wait for an answer or the prompt's timeout.
    fn present_choices(&self, venue: VenueId, user: PlayerId, choices: &ChoiceSet) -> Selection;

    fn notify(&self, venue: VenueId, audience: Audience, notice: &Notice);
}

/// Records notices and never answers a prompt. Used by the JSON API, where
/// answers arrive as separate commands.
#[derive(Debug, Default)]
pub struct NoticeLog {
    notices: Mutex<Vec<(Audience, Notice)>>,
}

impl NoticeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<(Audience, Notice)> {
        std::mem::take(&mut *self.notices.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl Presenter for NoticeLog {
    fn present_choices(&self, _venue: VenueId, _user: PlayerId, _choices: &ChoiceSet) -> Selection {
        Selection::Timeout
    }

    fn notify(&self, _venue: VenueId, audience: Audience, notice: &Notice) {
        self.notices.lock().unwrap_or_else(PoisonError::into_inner).push((audience, notice.clone()));
    }
}
