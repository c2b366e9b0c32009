//! Interactive steps and the choice sets presented for them
//!
//! Each open step is a value object: which prompt, who is addressed, when it
//! closes, and whether it has been resolved. The possession engine owns the
//! single open step of a match, so timeouts can be tested by passing a clock
//! value instead of running a scheduler.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::StepTimeouts;
use crate::models::{ActionTag, Guess, PlayerId, Position, TeamId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    AttackerChoosing,
    DefenderGuessing,
    SidepassChoosing,
    SaveAttempt,
}

impl StepKind {
    pub fn timeout(self, timeouts: &StepTimeouts) -> Duration {
        let secs = match self {
            StepKind::AttackerChoosing => timeouts.attacker_secs,
            StepKind::DefenderGuessing => timeouts.defender_secs,
            StepKind::SidepassChoosing => timeouts.sidepass_secs,
            StepKind::SaveAttempt => timeouts.save_secs,
        };
        Duration::seconds(i64::from(secs))
    }

    pub fn prompt_text(self) -> &'static str {
        match self {
            StepKind::AttackerChoosing => "Choose your action",
            StepKind::DefenderGuessing => "Attacker has committed. Make your guess",
            StepKind::SidepassChoosing => "You received a side-pass. Choose your shot",
            StepKind::SaveAttempt => "Attempt a save (guess the shot type)",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenStep {
    /// Match-wide sequence number; responses must quote it.
    pub seq: u32,
    pub kind: StepKind,
    /// Team and slot of the addressed player.
    pub team: TeamId,
    pub position: Position,
    pub addressed: PlayerId,
    pub opened_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    pub resolved: bool,
}

impl OpenStep {
    pub(crate) fn open(
        seq: u32,
        kind: StepKind,
        team: TeamId,
        position: Position,
        addressed: PlayerId,
        now: DateTime<Utc>,
        timeouts: &StepTimeouts,
    ) -> Self {
        Self {
            seq,
            kind,
            team,
            position,
            addressed,
            opened_at: now,
            deadline: now + kind.timeout(timeouts),
            resolved: false,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.deadline
    }

    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.deadline - now).max(Duration::zero())
    }
}

/// What an addressed player answered, or that the clock ran out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum StepInput {
    Action(ActionTag),
    Guess(Guess),
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedStep {
    pub step: OpenStep,
    pub input: StepInput,
}

/// Which prompt a choice set belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "prompt", rename_all = "snake_case")]
pub enum PromptKind {
    Step { seq: u32, kind: StepKind },
    TossSide { team: TeamId },
    SubstitutionOffer { team: TeamId, position: Position },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub code: String,
    pub label: String,
}

impl ChoiceOption {
    pub fn new(code: impl Into<String>, label: impl Into<String>) -> Self {
        Self { code: code.into(), label: label.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceSet {
    pub prompt: PromptKind,
    pub text: String,
    pub options: Vec<ChoiceOption>,
    pub timeout_secs: i64,
}

impl ChoiceSet {
    pub fn for_actions(step: &OpenStep, actions: &[ActionTag]) -> Self {
        Self::for_step(step, actions.iter().map(|a| ChoiceOption::new(a.code(), a.label())).collect())
    }

    pub fn for_guesses(step: &OpenStep, guesses: &[Guess]) -> Self {
        Self::for_step(step, guesses.iter().map(|g| ChoiceOption::new(g.code(), g.code())).collect())
    }

    fn for_step(step: &OpenStep, options: Vec<ChoiceOption>) -> Self {
        Self {
            prompt: PromptKind::Step { seq: step.seq, kind: step.kind },
            text: step.kind.prompt_text().to_string(),
            options,
            timeout_secs: (step.deadline - step.opened_at).num_seconds(),
        }
    }

    pub fn contains(&self, code: &str) -> bool {
        let code = code.trim();
        self.options.iter().any(|o| o.code.eq_ignore_ascii_case(code))
    }

    /// Resolve a typed answer: an option code, or its 1-based number.
    pub fn pick(&self, input: &str) -> Option<&ChoiceOption> {
        let input = input.trim();
        if let Ok(n) = input.parse::<usize>() {
            if let Some(option) = n.checked_sub(1).and_then(|i| self.options.get(i)) {
                return Some(option);
            }
        }
        self.options.iter().find(|o| o.code.eq_ignore_ascii_case(input))
    }
}
