//! # bb_core - Turn-Based Basketball Match Engine
//!
//! Three-a-side basketball played as a guessing game over chat: the attacker
//! picks a move in secret, the defender guesses it, and a correct guess
//! steals the ball.
//!
//! ## Features
//! - Lobby, captaincy and coin toss management per chat venue
//! - Possession state machine with per-step deadlines and AFK tracking
//! - Substitutions that re-address an open step
//! - Compressed, checksummed match saves restored after a restart
//! - JSON command API for bot front ends

// Command entry points mirror the chat commands one to one.
#![allow(clippy::too_many_arguments)]

pub mod api;
pub mod config;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod models;
pub mod registry;
pub mod save;
pub mod state;

// Re-export main API
pub use api::{execute_command_json, ApiResponse, CommandRequest};
pub use config::MatchConfig;
pub use coordinator::{Audience, Coordinator, Notice, NoticeLog, Presenter, Selection};
pub use engine::{ChoiceSet, OpenStep, PossessionOutcome, StepResult};
pub use error::{EngineError, Result};
pub use models::{PlayerId, Position, TeamId, VenueId};
pub use registry::MatchRegistry;
pub use save::{FileMatchStore, MatchStore, MemoryMatchStore};
pub use state::{LiveScore, Match};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
