//! Possession resolution engine
//!
//! - `matcher` - defender guess vs attacker action
//! - `step` - open interactive steps and their choice sets
//! - `possession` - the per-possession state machine on `Match`

pub mod matcher;
pub mod possession;
pub mod step;

pub use matcher::{guess_matches, matches};
pub use possession::{LivePossession, OutcomeKind, PossessionOutcome, Stage, StepResult};
pub use step::{ChoiceOption, ChoiceSet, OpenStep, PromptKind, ResolvedStep, StepInput, StepKind};
