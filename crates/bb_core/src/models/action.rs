//! Attacker action vocabulary and defender guess vocabulary
//!
//! Menus are derived from `legal_actions(position)`; the prompt builder and
//! the point-value class checks both read from here.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::Position;
use crate::engine::matcher;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionTag {
    // Point guard
    SidePass,
    PgDribbleLayup,
    PgDribbleJump,
    PgHalfcourt,
    PgFullcourt,
    Hold,
    PlayBack,
    // Shooting guard (also the side-pass receiver menu)
    SgDribbleLayup,
    SgDribbleDunk,
    SgThreeHalf,
    SgThreeFull,
    // Centre after recovering the ball
    CeDribbleLayup,
    CeDribbleDunk,
    CeThreeHalf,
}

const PG_ACTIONS: [ActionTag; 7] = [
    ActionTag::SidePass,
    ActionTag::PgDribbleLayup,
    ActionTag::PgDribbleJump,
    ActionTag::PgHalfcourt,
    ActionTag::PgFullcourt,
    ActionTag::Hold,
    ActionTag::PlayBack,
];

const SG_ACTIONS: [ActionTag; 4] = [
    ActionTag::SgDribbleLayup,
    ActionTag::SgDribbleDunk,
    ActionTag::SgThreeHalf,
    ActionTag::SgThreeFull,
];

const CE_ACTIONS: [ActionTag; 3] =
    [ActionTag::CeDribbleLayup, ActionTag::CeDribbleDunk, ActionTag::CeThreeHalf];

/// Attacker menu for a position.
pub fn legal_actions(position: Position) -> &'static [ActionTag] {
    match position {
        Position::Pg => &PG_ACTIONS,
        Position::Sg => &SG_ACTIONS,
        Position::Ce => &CE_ACTIONS,
    }
}

/// Shots the shooting guard may take after receiving a side-pass.
pub fn sidepass_shots() -> &'static [ActionTag] {
    &SG_ACTIONS
}

impl ActionTag {
    /// Wire code, also the string the matcher sees.
    pub fn code(self) -> &'static str {
        match self {
            ActionTag::SidePass => "sidepass",
            ActionTag::PgDribbleLayup => "pg_dribble_layup",
            ActionTag::PgDribbleJump => "pg_dribble_jump",
            ActionTag::PgHalfcourt => "pg_halfcourt",
            ActionTag::PgFullcourt => "pg_fullcourt",
            ActionTag::Hold => "hold",
            ActionTag::PlayBack => "play_back",
            ActionTag::SgDribbleLayup => "sg_dribble_layup",
            ActionTag::SgDribbleDunk => "sg_dribble_dunk",
            ActionTag::SgThreeHalf => "sg_3_half",
            ActionTag::SgThreeFull => "sg_3_full",
            ActionTag::CeDribbleLayup => "ce_dribble_layup",
            ActionTag::CeDribbleDunk => "ce_dribble_dunk",
            ActionTag::CeThreeHalf => "ce_3_half",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ActionTag::SidePass => "Side-pass to SG",
            ActionTag::PgDribbleLayup | ActionTag::SgDribbleLayup | ActionTag::CeDribbleLayup => {
                "Dribble → Layup"
            }
            ActionTag::PgDribbleJump => "Dribble → Jump shot",
            ActionTag::PgHalfcourt => "Halfcourt shot",
            ActionTag::PgFullcourt => "Fullcourt shot",
            ActionTag::Hold => "Hold (bounce pass)",
            ActionTag::PlayBack => "Play back",
            ActionTag::SgDribbleDunk | ActionTag::CeDribbleDunk => "Dribble → Dunk",
            ActionTag::SgThreeHalf | ActionTag::CeThreeHalf => "3-pointer Halfcourt",
            ActionTag::SgThreeFull => "3-pointer Fullcourt",
        }
    }

    pub fn from_code(code: &str) -> Option<ActionTag> {
        let code = code.trim().to_ascii_lowercase();
        PG_ACTIONS
            .iter()
            .chain(SG_ACTIONS.iter())
            .chain(CE_ACTIONS.iter())
            .copied()
            .find(|tag| tag.code() == code)
    }

    pub fn is_three_point_class(self) -> bool {
        matcher::is_three_point_action(self.code())
    }

    pub fn is_dribble(self) -> bool {
        matcher::is_dribble_action(self.code())
    }

    /// Points credited if this shot goes in.
    pub fn points(self) -> u32 {
        if self.is_three_point_class() {
            3
        } else {
            2
        }
    }
}

impl fmt::Display for ActionTag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Defender guess vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Guess {
    #[serde(rename = "3-pointer")]
    ThreePointer,
    Dribble,
    Sidepass,
    Layup,
    Dunk,
    Halfcourt,
    Fullcourt,
    JumpShot,
}

/// Choices offered to the centre when the attacker has committed.
pub const DEFENDER_GUESSES: [Guess; 8] = [
    Guess::ThreePointer,
    Guess::Dribble,
    Guess::Sidepass,
    Guess::Layup,
    Guess::Dunk,
    Guess::Halfcourt,
    Guess::Fullcourt,
    Guess::JumpShot,
];

/// Choices offered to the centre on a save attempt.
pub const SAVE_GUESSES: [Guess; 4] =
    [Guess::ThreePointer, Guess::Layup, Guess::Dunk, Guess::Dribble];

impl Guess {
    pub fn code(self) -> &'static str {
        match self {
            Guess::ThreePointer => "3-pointer",
            Guess::Dribble => "dribble",
            Guess::Sidepass => "sidepass",
            Guess::Layup => "layup",
            Guess::Dunk => "dunk",
            Guess::Halfcourt => "halfcourt",
            Guess::Fullcourt => "fullcourt",
            Guess::JumpShot => "jump-shot",
        }
    }

    /// Accepts the codes plus the spellings players type by hand.
    pub fn parse(input: &str) -> Option<Guess> {
        match input.trim().to_ascii_lowercase().as_str() {
            "3-pointer" | "3 pointer" | "3" => Some(Guess::ThreePointer),
            "dribble" => Some(Guess::Dribble),
            "sidepass" | "side-pass" => Some(Guess::Sidepass),
            "layup" => Some(Guess::Layup),
            "dunk" => Some(Guess::Dunk),
            "halfcourt" => Some(Guess::Halfcourt),
            "fullcourt" => Some(Guess::Fullcourt),
            "jump-shot" | "jump shot" | "jump" => Some(Guess::JumpShot),
            _ => None,
        }
    }
}

impl fmt::Display for Guess {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_menus_per_position() {
        assert_eq!(legal_actions(Position::Pg).len(), 7);
        assert_eq!(legal_actions(Position::Sg).len(), 4);
        assert!(legal_actions(Position::Pg).contains(&ActionTag::SidePass));
        assert!(!legal_actions(Position::Sg).contains(&ActionTag::SidePass));
        assert_eq!(sidepass_shots(), legal_actions(Position::Sg));
    }

    #[test]
    fn test_codes_roundtrip_through_lookup() {
        for pos in Position::ALL {
            for tag in legal_actions(pos) {
                assert_eq!(ActionTag::from_code(tag.code()), Some(*tag));
            }
        }
        assert_eq!(ActionTag::from_code("PG_HALFCOURT"), Some(ActionTag::PgHalfcourt));
        assert_eq!(ActionTag::from_code("action"), None);
    }

    #[test]
    fn test_point_values() {
        assert_eq!(ActionTag::SgThreeFull.points(), 3);
        assert_eq!(ActionTag::PgHalfcourt.points(), 3);
        assert_eq!(ActionTag::PgFullcourt.points(), 3);
        assert_eq!(ActionTag::PgDribbleLayup.points(), 2);
        assert_eq!(ActionTag::SidePass.points(), 2);
        assert_eq!(ActionTag::Hold.points(), 2);
    }

    #[test]
    fn test_guess_aliases() {
        assert_eq!(Guess::parse("3 pointer"), Some(Guess::ThreePointer));
        assert_eq!(Guess::parse("Jump Shot"), Some(Guess::JumpShot));
        assert_eq!(Guess::parse("steal"), None);
        assert_eq!(serde_json::to_string(&Guess::ThreePointer).unwrap(), "\"3-pointer\"");
        assert_eq!(serde_json::to_string(&Guess::JumpShot).unwrap(), "\"jump-shot\"");
    }
}
