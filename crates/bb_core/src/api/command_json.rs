//! JSON command surface
//!
//! One request object per command, tagged by `cmd`. Every response is an
//! `ApiResponse`; notices raised while executing are returned alongside the
//! data instead of being pushed to a chat venue.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::coordinator::{Audience, Coordinator, Notice, NoticeLog};
use crate::engine::{ChoiceSet, OpenStep, PossessionOutcome, StepResult};
use crate::error::EngineError;
use crate::models::{PlayerId, Position, TeamId, VenueId};
use crate::save::MatchStore;
use crate::state::TossSide;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum CommandRequest {
    CreateLobby { venue: VenueId, player: PlayerId, name: String },
    Join { venue: VenueId, player: PlayerId, name: String },
    Leave { venue: VenueId, player: PlayerId },
    Kick { venue: VenueId, player: PlayerId, target: PlayerId },
    Start { venue: VenueId, player: PlayerId },
    BeginToss { venue: VenueId, player: PlayerId },
    ChooseTossSide { venue: VenueId, player: PlayerId, team: TeamId, side: TossSide },
    BeginPossession { venue: VenueId },
    Respond { venue: VenueId, player: PlayerId, seq: u32, choice: String },
    ExpireStep { venue: VenueId },
    RequestSubstitution {
        venue: VenueId,
        player: PlayerId,
        team: TeamId,
        position: Position,
        in_player: PlayerId,
        in_name: String,
    },
    AnswerSubstitution { venue: VenueId, player: PlayerId, accept: bool },
    TransferCaptaincy { venue: VenueId, player: PlayerId, target: PlayerId },
    RenameTeam { venue: VenueId, player: PlayerId, team: TeamId, name: String },
    ForceEnd { venue: VenueId, player: PlayerId },
    LiveScore { venue: VenueId },
    ListActive,
    SetPossession { venue: VenueId, player: PlayerId, team: TeamId, position: Position },
    ScorePoints { venue: VenueId, player: PlayerId, team: TeamId, points: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl ApiError {
    fn new(code: &str, message: impl std::fmt::Display) -> Self {
        Self { code: code.to_string(), message: message.to_string() }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        Self::new(err.code(), &err)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoticeEntry {
    pub audience: Audience,
    pub text: String,
    pub notice: Notice,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notices: Vec<NoticeEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum StepView {
    Continue { step: OpenStep, choices: Option<ChoiceSet> },
    Finished { outcome: PossessionOutcome },
}

/// Parse, execute and serialize one command.
pub fn execute_command_json<S: MatchStore>(coordinator: &Coordinator<S>, request_json: &str) -> String {
    let response = match serde_json::from_str::<CommandRequest>(request_json) {
        Ok(request) => {
            let log = NoticeLog::new();
            let result = execute_command(coordinator, request, &log);
            let notices = log
                .take()
                .into_iter()
                .map(|(audience, notice)| NoticeEntry { audience, text: notice.to_string(), notice })
                .collect();
            match result {
                Ok(data) => ApiResponse { success: true, data: Some(data), notices, error: None },
                Err(error) => ApiResponse { success: false, data: None, notices, error: Some(error) },
            }
        }
        Err(e) => ApiResponse {
            success: false,
            data: None,
            notices: Vec::new(),
            error: Some(ApiError::new("INVALID_REQUEST", format!("Invalid request format: {e}"))),
        },
    };

    serde_json::to_string(&response).unwrap_or_else(|_| {
        r#"{"success":false,"error":{"code":"SERIALIZATION","message":"Serialization failed"}}"#
            .to_string()
    })
}

pub fn execute_command<S: MatchStore>(
    coordinator: &Coordinator<S>,
    request: CommandRequest,
    log: &NoticeLog,
) -> Result<Value, ApiError> {
    let c = coordinator;
    let value = match request {
        CommandRequest::CreateLobby { venue, player, name } => {
            c.create_lobby(venue, player, &name, log)?;
            json!({ "venue": venue })
        }
        CommandRequest::Join { venue, player, name } => {
            let (team, position) = c.join(venue, player, &name, log)?;
            json!({ "team": team, "position": position })
        }
        CommandRequest::Leave { venue, player } => {
            let (team, position) = c.leave(venue, player, log)?;
            json!({ "team": team, "position": position })
        }
        CommandRequest::Kick { venue, player, target } => {
            let (team, position) = c.kick(venue, player, target, log)?;
            json!({ "team": team, "position": position })
        }
        CommandRequest::Start { venue, player } => {
            c.start(venue, player, log)?;
            Value::Null
        }
        CommandRequest::BeginToss { venue, player } => {
            c.begin_toss(venue, player, log)?;
            Value::Null
        }
        CommandRequest::ChooseTossSide { venue, player, team, side } => {
            to_value(&c.choose_toss_side(venue, player, team, side, log)?)?
        }
        CommandRequest::BeginPossession { venue } => {
            let (step, choices) = c.begin_possession(venue, Utc::now(), log)?;
            to_value(&StepView::Continue { step, choices: Some(choices) })?
        }
        CommandRequest::Respond { venue, player, seq, choice } => {
            let result = c.respond(venue, seq, player, &choice, Utc::now(), log)?;
            step_view(c, venue, result)?
        }
        CommandRequest::ExpireStep { venue } => match c.expire_step(venue, Utc::now(), log)? {
            Some(result) => step_view(c, venue, result)?,
            None => Value::Null,
        },
        CommandRequest::RequestSubstitution { venue, player, team, position, in_player, in_name } => {
            to_value(&c.request_substitution(venue, player, team, position, in_player, &in_name, log)?)?
        }
        CommandRequest::AnswerSubstitution { venue, player, accept } => {
            json!({ "replaced": c.answer_substitution(venue, player, accept, log)? })
        }
        CommandRequest::TransferCaptaincy { venue, player, target } => {
            json!({ "team": c.transfer_captaincy(venue, player, target, log)? })
        }
        CommandRequest::RenameTeam { venue, player, team, name } => {
            c.rename_team(venue, player, team, &name, log)?;
            Value::Null
        }
        CommandRequest::ForceEnd { venue, player } => to_value(&c.force_end(venue, player, log)?)?,
        CommandRequest::LiveScore { venue } => to_value(&c.live_score(venue)?)?,
        CommandRequest::ListActive => to_value(&c.list_active()?)?,
        CommandRequest::SetPossession { venue, player, team, position } => {
            c.set_possession(venue, player, team, position)?;
            Value::Null
        }
        CommandRequest::ScorePoints { venue, player, team, points } => {
            c.score_points(venue, player, team, points)?;
            Value::Null
        }
    };
    Ok(value)
}

fn step_view<S: MatchStore>(
    c: &Coordinator<S>,
    venue: VenueId,
    result: StepResult,
) -> Result<Value, ApiError> {
    let view = match result {
        StepResult::Continue(step) => StepView::Continue { step, choices: c.step_choices(venue)? },
        StepResult::Finished(outcome) => StepView::Finished { outcome },
    };
    to_value(&view)
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, ApiError> {
    serde_json::to_value(value).map_err(|e| ApiError::new("SERIALIZATION", e))
}
