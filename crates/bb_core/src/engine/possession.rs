//! Possession state machine
//!
//! One possession runs from the attacker's choice to a terminal outcome:
//!
//! ```text
//! AttackerChoosing ──(no opposing ce)──────────────────────────▶ ShotScored
//!        │ action                         ┌─(no sg)────────────▶ PassFailureToScore
//!        ▼                                │
//! DefenderGuessing ──miss/timeout, sidepass┴─▶ SidepassChoosing ─▶ SaveAttempt
//!        │ match        │ miss/timeout, other                        │
//!        ▼              └──────────────────────────▶ SaveAttempt ────┤
//!  DefenderSteal                                       match ◀───────┤
//!                                                      miss ─▶ ShotScored
//! ```
//!
//! The engine never waits. Callers drive it with `respond`, `timeout_step`
//! or `expire_step` and a clock value; each call resolves at most one step.
//! A terminal outcome is applied in a single `&mut self` call: score,
//! move counter and the next possession pointer change together.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::matcher::guess_matches;
use super::step::{ChoiceSet, OpenStep, ResolvedStep, StepInput, StepKind};
use crate::error::{EngineError, Result};
use crate::models::{
    legal_actions, sidepass_shots, ActionTag, Guess, PlayerId, Position, TeamId, DEFENDER_GUESSES,
    SAVE_GUESSES,
};
use crate::state::{Match, MoveTick, PossessionPointer};

/// Where an open possession currently stands, with the data each stage needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum Stage {
    AttackerChoosing,
    DefenderGuessing { action: ActionTag },
    SidepassChoosing,
    SaveAttempt { shot: ActionTag },
}

impl Stage {
    pub fn kind(self) -> StepKind {
        match self {
            Stage::AttackerChoosing => StepKind::AttackerChoosing,
            Stage::DefenderGuessing { .. } => StepKind::DefenderGuessing,
            Stage::SidepassChoosing => StepKind::SidepassChoosing,
            Stage::SaveAttempt { .. } => StepKind::SaveAttempt,
        }
    }
}

/// The open possession of a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LivePossession {
    pub attacking_team: TeamId,
    pub attacker_position: Position,
    pub stage: Stage,
    /// The attacker's chosen action, once made.
    pub action: Option<ActionTag>,
    pub step: OpenStep,
    pub trail: Vec<ResolvedStep>,
}

impl LivePossession {
    pub fn defending_team(&self) -> TeamId {
        self.attacking_team.opponent()
    }

    /// Point an open step at a substituted-in player.
    pub(crate) fn readdress(&mut self, from: PlayerId, to: PlayerId) {
        if self.step.addressed == from {
            debug!(seq = self.step.seq, %from, %to, "open step re-addressed");
            self.step.addressed = to;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    DefenderSteal,
    PassFailureToScore,
    ShotScored,
    AttackerForfeit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PossessionOutcome {
    pub kind: OutcomeKind,
    pub attacking_team: TeamId,
    /// Zero unless the attacking team scored.
    pub points: u32,
    /// The shot that decided a scoring outcome.
    pub shot: Option<ActionTag>,
    pub next: PossessionPointer,
    /// Present when the outcome advanced the move counter.
    pub tick: Option<MoveTick>,
    pub trail: Vec<ResolvedStep>,
}

impl PossessionOutcome {
    pub fn counted(&self) -> bool {
        self.tick.is_some()
    }

    pub fn period_over(&self) -> bool {
        self.tick.is_some_and(|t| t.period_over)
    }

    pub fn halftime(&self) -> bool {
        self.tick.is_some_and(|t| t.halftime)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepResult {
    /// The possession moved on to another interactive step.
    Continue(OpenStep),
    Finished(PossessionOutcome),
}

impl Match {
    pub fn live_possession(&self) -> Option<&LivePossession> {
        self.live.as_ref()
    }

    pub fn open_step(&self) -> Option<&OpenStep> {
        self.live.as_ref().map(|live| &live.step)
    }

    /// Choices for the open step.
    pub fn step_choices(&self) -> Option<ChoiceSet> {
        let live = self.live.as_ref()?;
        let set = match live.stage {
            Stage::AttackerChoosing => {
                ChoiceSet::for_actions(&live.step, legal_actions(live.attacker_position))
            }
            Stage::SidepassChoosing => ChoiceSet::for_actions(&live.step, sidepass_shots()),
            Stage::DefenderGuessing { .. } => ChoiceSet::for_guesses(&live.step, &DEFENDER_GUESSES),
            Stage::SaveAttempt { .. } => ChoiceSet::for_guesses(&live.step, &SAVE_GUESSES),
        };
        Some(set)
    }

    /// Open a possession at the current possession pointer.
    pub fn begin_possession(&mut self, now: DateTime<Utc>) -> Result<OpenStep> {
        self.ensure_active()?;
        if self.live.is_some() {
            return Err(EngineError::invalid_state("a possession is already in progress"));
        }
        if self.toss.is_active() {
            return Err(EngineError::invalid_state("the coin toss is still open"));
        }
        let pointer = self
            .possession
            .ok_or_else(|| EngineError::invalid_state("no team holds the ball"))?;
        let attacker = self.slot(pointer.team, pointer.position).map(|s| s.player_id).ok_or_else(
            || {
                EngineError::invalid_state(format!(
                    "no player at {} on team {}",
                    pointer.position, pointer.team
                ))
            },
        )?;

        let step = self.issue_step(StepKind::AttackerChoosing, pointer.team, pointer.position, attacker, now);
        self.live = Some(LivePossession {
            attacking_team: pointer.team,
            attacker_position: pointer.position,
            stage: Stage::AttackerChoosing,
            action: None,
            step: step.clone(),
            trail: Vec::new(),
        });
        info!(team = %pointer.team, position = %pointer.position, %attacker, "possession opened");
        Ok(step)
    }

    /// Answer the open step. Only the addressed player may answer, quoting
    /// the step's sequence number. An answer arriving at or after the
    /// deadline is discarded and the step resolves as a timeout.
    pub fn respond(
        &mut self,
        seq: u32,
        actor: PlayerId,
        choice: &str,
        now: DateTime<Utc>,
    ) -> Result<StepResult> {
        let live = self
            .live
            .as_ref()
            .ok_or_else(|| EngineError::invalid_state("no possession is in progress"))?;
        if live.step.seq != seq {
            debug!(seq, open = live.step.seq, %actor, "stale response ignored");
            return Err(EngineError::rejected("that prompt has already closed"));
        }
        if live.step.addressed != actor {
            return Err(EngineError::rejected("this prompt is not addressed to you"));
        }

        if live.step.is_expired(now) {
            warn!(seq, %actor, "response arrived after the deadline");
            return self.resolve_open(StepInput::TimedOut, now);
        }

        let input = parse_input(live, choice)?;
        self.clear_afk(actor);
        self.resolve_open(input, now)
    }

    /// Resolve the open step as timed out, if it is still step `seq`.
    pub fn timeout_step(&mut self, seq: u32, now: DateTime<Utc>) -> Result<StepResult> {
        match self.open_step() {
            Some(step) if step.seq == seq => self.resolve_open(StepInput::TimedOut, now),
            Some(_) => Err(EngineError::rejected("that prompt has already closed")),
            None => Err(EngineError::invalid_state("no possession is in progress")),
        }
    }

    /// Time out the open step when its deadline has passed.
    pub fn expire_step(&mut self, now: DateTime<Utc>) -> Option<StepResult> {
        let seq = self.open_step().filter(|step| step.is_expired(now))?.seq;
        self.timeout_step(seq, now).ok()
    }

    fn resolve_open(&mut self, input: StepInput, now: DateTime<Utc>) -> Result<StepResult> {
        let mut live = self
            .live
            .take()
            .ok_or_else(|| EngineError::invalid_state("no possession is in progress"))?;

        if input == StepInput::TimedOut {
            self.mark_afk(live.step.addressed);
            info!(
                seq = live.step.seq,
                step = ?live.step.kind,
                player = %live.step.addressed,
                "step timed out"
            );
        }
        live.step.resolved = true;
        live.trail.push(ResolvedStep { step: live.step.clone(), input });

        Ok(self.transition(live, input, now))
    }

    fn transition(&mut self, mut live: LivePossession, input: StepInput, now: DateTime<Utc>) -> StepResult {
        let attack = live.attacking_team;
        let defend = live.defending_team();

        match (live.stage, input) {
            (Stage::AttackerChoosing, StepInput::Action(action)) => {
                live.action = Some(action);
                match self.ce_of(defend) {
                    None => self.settle(live, OutcomeKind::ShotScored, Some(action)),
                    Some(ce) => self.advance_to(live, Stage::DefenderGuessing { action }, defend, Position::Ce, ce, now),
                }
            }
            (Stage::AttackerChoosing | Stage::SidepassChoosing, StepInput::TimedOut) => {
                self.settle(live, OutcomeKind::AttackerForfeit, None)
            }
            (Stage::DefenderGuessing { action }, input) => {
                if guessed(action, input) {
                    return self.settle(live, OutcomeKind::DefenderSteal, None);
                }
                if action != ActionTag::SidePass {
                    return match self.ce_of(defend) {
                        Some(ce) => self.advance_to(live, Stage::SaveAttempt { shot: action }, defend, Position::Ce, ce, now),
                        None => self.settle(live, OutcomeKind::ShotScored, Some(action)),
                    };
                }
                match self.slot(attack, Position::Sg).map(|s| s.player_id) {
                    None => self.settle(live, OutcomeKind::PassFailureToScore, Some(action)),
                    Some(sg) => self.advance_to(live, Stage::SidepassChoosing, attack, Position::Sg, sg, now),
                }
            }
            (Stage::SidepassChoosing, StepInput::Action(shot)) => match self.ce_of(defend) {
                None => self.settle(live, OutcomeKind::ShotScored, Some(shot)),
                Some(ce) => self.advance_to(live, Stage::SaveAttempt { shot }, defend, Position::Ce, ce, now),
            },
            (Stage::SaveAttempt { shot }, input) => {
                if guessed(shot, input) {
                    self.settle(live, OutcomeKind::DefenderSteal, None)
                } else {
                    self.settle(live, OutcomeKind::ShotScored, Some(shot))
                }
            }
            // a guess can never be parsed for an action stage
            (Stage::AttackerChoosing | Stage::SidepassChoosing, StepInput::Guess(_)) => {
                self.settle(live, OutcomeKind::AttackerForfeit, None)
            }
        }
    }

    fn advance_to(
        &mut self,
        mut live: LivePossession,
        stage: Stage,
        team: TeamId,
        position: Position,
        addressed: PlayerId,
        now: DateTime<Utc>,
    ) -> StepResult {
        let step = self.issue_step(stage.kind(), team, position, addressed, now);
        debug!(seq = step.seq, step = ?step.kind, %addressed, "step opened");
        live.stage = stage;
        live.step = step.clone();
        self.live = Some(live);
        StepResult::Continue(step)
    }

    /// Apply a terminal outcome. `self.live` is already cleared.
    fn settle(&mut self, live: LivePossession, kind: OutcomeKind, shot: Option<ActionTag>) -> StepResult {
        let attack = live.attacking_team;
        let defend = live.defending_team();

        let (points, next_position, counted) = match kind {
            OutcomeKind::DefenderSteal => (0, Position::Ce, true),
            OutcomeKind::PassFailureToScore => (2, Position::Pg, true),
            OutcomeKind::ShotScored => (shot.map_or(0, ActionTag::points), Position::Pg, true),
            OutcomeKind::AttackerForfeit => (0, Position::Pg, false),
        };

        self.team_mut(attack).score += points;
        let next = PossessionPointer { team: defend, position: next_position };
        self.possession = Some(next);
        let tick = counted.then(|| self.advance_move_counter());

        info!(
            outcome = ?kind,
            team = %attack,
            points,
            next_team = %next.team,
            next_position = %next.position,
            move_count = self.move_count,
            "possession resolved"
        );

        StepResult::Finished(PossessionOutcome {
            kind,
            attacking_team: attack,
            points,
            shot,
            next,
            tick,
            trail: live.trail,
        })
    }

    fn issue_step(
        &mut self,
        kind: StepKind,
        team: TeamId,
        position: Position,
        addressed: PlayerId,
        now: DateTime<Utc>,
    ) -> OpenStep {
        self.step_seq += 1;
        OpenStep::open(self.step_seq, kind, team, position, addressed, now, &self.config.step_timeouts)
    }

    fn ce_of(&self, team: TeamId) -> Option<PlayerId> {
        self.slot(team, Position::Ce).map(|s| s.player_id)
    }
}

fn guessed(live_shot: ActionTag, input: StepInput) -> bool {
    match input {
        StepInput::Guess(guess) => guess_matches(live_shot, guess),
        StepInput::Action(_) | StepInput::TimedOut => false,
    }
}

fn parse_input(live: &LivePossession, choice: &str) -> Result<StepInput> {
    let choice = choice.trim();
    match live.stage {
        Stage::AttackerChoosing | Stage::SidepassChoosing => {
            let menu = match live.stage {
                Stage::SidepassChoosing => sidepass_shots(),
                _ => legal_actions(live.attacker_position),
            };
            ActionTag::from_code(choice)
                .filter(|action| menu.contains(action))
                .map(StepInput::Action)
                .ok_or_else(|| EngineError::rejected(format!("'{choice}' is not on the menu")))
        }
        Stage::DefenderGuessing { .. } | Stage::SaveAttempt { .. } => {
            let vocabulary: &[Guess] = match live.stage {
                Stage::SaveAttempt { .. } => &SAVE_GUESSES,
                _ => &DEFENDER_GUESSES,
            };
            Guess::parse(choice)
                .filter(|guess| vocabulary.contains(guess))
                .map(StepInput::Guess)
                .ok_or_else(|| EngineError::rejected(format!("'{choice}' is not a valid guess")))
        }
    }
}
