//! Action Matcher
//!
//! Decides whether a defender's guess identifies the attacker's chosen
//! action. Case-insensitive and deliberately asymmetric:
//!
//! 1. 3-point-class actions (code contains `3`, `halfcourt` or `fullcourt`)
//!    match any 3-point-class guess and nothing else. Only the point-value
//!    class is discriminated, so `halfcourt` catches a fullcourt three.
//! 2. Dribble actions match the guess `dribble`.
//! 3. Otherwise the guess must equal the code, or name its finishing move
//!    (`layup` against `pg_dribble_layup`).

use crate::models::{ActionTag, Guess};

/// Guesses that name the 3-point class.
const THREE_POINT_GUESSES: [&str; 5] = ["3-pointer", "3 pointer", "halfcourt", "fullcourt", "3"];

/// Internal connector used by compound action codes.
const CONNECTOR: &str = "_";

pub fn is_three_point_action(action: &str) -> bool {
    let a = action.to_ascii_lowercase();
    a.contains('3') || a.contains("halfcourt") || a.contains("fullcourt")
}

pub fn is_dribble_action(action: &str) -> bool {
    action.to_ascii_lowercase().contains("dribble")
}

/// Raw matcher over action codes and guess strings.
pub fn matches(attacker_action: &str, defender_guess: &str) -> bool {
    let a = attacker_action.trim().to_ascii_lowercase();
    let g = defender_guess.trim().to_ascii_lowercase();
    if a.is_empty() || g.is_empty() {
        return false;
    }

    if is_three_point_action(&a) {
        return THREE_POINT_GUESSES.contains(&g.as_str());
    }
    // dribble actions still fall through to the suffix rule so "layup" catches pg_dribble_layup
    if is_dribble_action(&a) && g == "dribble" {
        return true;
    }

    a == g || a.ends_with(&g.replace(' ', CONNECTOR))
}

/// Typed wrapper used by the possession engine.
pub fn guess_matches(action: ActionTag, guess: Guess) -> bool {
    matches(action.code(), guess.code())
}
