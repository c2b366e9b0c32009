pub mod action;
pub mod ids;
pub mod roster;

pub use action::{legal_actions, sidepass_shots, ActionTag, Guess, DEFENDER_GUESSES, SAVE_GUESSES};
pub use ids::{PlayerId, Position, TeamId, VenueId};
pub use roster::{PlayerSlot, Team};
