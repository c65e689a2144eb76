//! Core game entities: seats, phases, actions, settings, errors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use super::cards::{Card, Suit, Trick};
use crate::ai::Difficulty;

/// Minimum occupied seats required to start a game.
pub const MIN_SEATS: usize = 4;
/// Maximum seats in a room.
pub const MAX_SEATS: usize = 8;
/// A seat whose score exceeds this is eliminated.
pub const ELIMINATION_SCORE: i32 = 32;
/// Reaching this score (or below) wins the game outright.
pub const WINNING_SCORE: i32 = 0;
/// Score added for punting (zero tricks, or the bidder falling short).
pub const PUNT_PENALTY: i32 = 5;
/// Score swing applied when everyone sits and the bidder picks a penalty.
pub const EVERYONE_SAT_PENALTY: i32 = 5;
/// Default starting stake when the room creator doesn't choose one.
pub const DEFAULT_STARTING_STAKE: i32 = 15;
/// Bids run 0 (punt) through 5.
pub const MAX_BID: u8 = 5;

/// Errors surfaced to protocol clients. Every variant carries a stable
/// machine-readable code; the display string is the human message.
#[derive(Clone, Debug, Deserialize, Eq, Error, PartialEq, Serialize)]
pub enum GameError {
    #[error("not your turn")]
    NotYourTurn,
    #[error("invalid bid: {0}")]
    InvalidBid(String),
    #[error("invalid card: {0}")]
    InvalidCard(String),
    #[error("invalid decision: {0}")]
    InvalidDecision(String),
    #[error("sat out twice in a row, must play this round")]
    MustyMustPlay,
    #[error("action not allowed in the current phase")]
    InvalidPhase,
    #[error("room not found")]
    RoomNotFound,
    #[error("room is full")]
    RoomFull,
    #[error("game already started")]
    GameAlreadyStarted,
    #[error("game has not started")]
    GameNotStarted,
    #[error("need at least {MIN_SEATS} players")]
    NotEnoughPlayers,
    #[error("only the host can do that")]
    NotHost,
    #[error("player not found")]
    PlayerNotFound,
    #[error("invalid message")]
    InvalidMessage,
    #[error("internal error: {0}")]
    Internal(String),
}

impl GameError {
    /// Stable protocol error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotYourTurn => "NOT_YOUR_TURN",
            Self::InvalidBid(_) => "INVALID_BID",
            Self::InvalidCard(_) => "INVALID_CARD",
            Self::InvalidDecision(_) => "INVALID_DECISION",
            Self::MustyMustPlay => "MUSTY_MUST_PLAY",
            Self::InvalidPhase => "INVALID_PHASE",
            Self::RoomNotFound => "ROOM_NOT_FOUND",
            Self::RoomFull => "ROOM_FULL",
            Self::GameAlreadyStarted => "GAME_ALREADY_STARTED",
            Self::GameNotStarted => "GAME_NOT_STARTED",
            Self::NotEnoughPlayers => "NOT_ENOUGH_PLAYERS",
            Self::NotHost => "NOT_HOST",
            Self::PlayerNotFound => "PLAYER_NOT_FOUND",
            Self::InvalidMessage => "INVALID_MESSAGE",
            Self::Internal(_) => "INTERNAL",
        }
    }
}

/// Game phases. The engine rejects any transition absent from
/// [`Phase::can_transition`]; everything else is an invariant bug.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Setup,
    Bidding,
    TrumpSelection,
    SitPass,
    EveryoneSat,
    HandPlay,
    TrickComplete,
    RoundComplete,
    GameOver,
}

impl Phase {
    /// The closed transition table. `Bidding -> Bidding` covers the
    /// everyone-punted redeal, `GameOver -> Setup` the reset.
    #[must_use]
    pub fn can_transition(self, to: Phase) -> bool {
        use Phase::*;
        matches!(
            (self, to),
            (Setup, Bidding)
                | (Bidding, Bidding)
                | (Bidding, TrumpSelection)
                | (TrumpSelection, SitPass)
                | (TrumpSelection, HandPlay)
                | (SitPass, EveryoneSat)
                | (SitPass, HandPlay)
                | (EveryoneSat, RoundComplete)
                | (HandPlay, TrickComplete)
                | (TrickComplete, HandPlay)
                | (TrickComplete, RoundComplete)
                | (RoundComplete, Bidding)
                | (RoundComplete, GameOver)
                | (GameOver, Setup)
        )
    }

    /// Phases in which a seat is expected to act.
    #[must_use]
    pub fn awaits_action(self) -> bool {
        matches!(
            self,
            Phase::Bidding
                | Phase::TrumpSelection
                | Phase::SitPass
                | Phase::EveryoneSat
                | Phase::HandPlay
        )
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Setup => "setup",
            Self::Bidding => "bidding",
            Self::TrumpSelection => "trump_selection",
            Self::SitPass => "sit_pass",
            Self::EveryoneSat => "everyone_sat",
            Self::HandPlay => "hand_play",
            Self::TrickComplete => "trick_complete",
            Self::RoundComplete => "round_complete",
            Self::GameOver => "game_over",
        };
        write!(f, "{repr}")
    }
}

/// One seat in the room. Owned exclusively by the room's engine; the hand
/// is only ever mutated by a validated deal or play.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Seat {
    pub id: Uuid,
    pub name: String,
    pub hand: Vec<Card>,
    pub is_active: bool,
    pub is_ai: bool,
    pub ai_difficulty: Option<Difficulty>,
    pub consecutive_sits: u8,
    pub connected: bool,
}

impl Seat {
    #[must_use]
    pub fn human(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            hand: Vec::new(),
            is_active: true,
            is_ai: false,
            ai_difficulty: None,
            consecutive_sits: 0,
            connected: true,
        }
    }

    #[must_use]
    pub fn ai(name: impl Into<String>, difficulty: Difficulty) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            hand: Vec::new(),
            is_active: true,
            is_ai: true,
            ai_difficulty: Some(difficulty),
            consecutive_sits: 0,
            connected: true,
        }
    }
}

/// The bidder's choice when every other seat sat out.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PenaltyTarget {
    /// Bidder takes -5 themselves.
    #[serde(rename = "self")]
    Bidder,
    /// Every other active seat takes +5.
    Others,
}

/// A validated player action. AI seats submit these through exactly the
/// same path as humans.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(tag = "action", content = "payload", rename_all = "snake_case")]
pub enum GameAction {
    Bid { value: u8 },
    Trump { suit: Suit },
    #[serde(rename = "sitpass")]
    SitPass { sit: bool },
    #[serde(rename = "playcard")]
    PlayCard { card: Card },
    Penalty { target: PenaltyTarget },
    /// Client acknowledgement that it finished rendering a paused
    /// transition; releases the room's state lock.
    SyncState,
}

/// Append-only audit record for one completed round. Never read back by
/// the engine; kept for replay display.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RoundHistory {
    pub round: u32,
    pub recorded_at: DateTime<Utc>,
    pub bids: HashMap<Uuid, u8>,
    pub trump: Option<Suit>,
    pub tricks_won: HashMap<Uuid, u8>,
    pub deltas: HashMap<Uuid, i32>,
    pub scores: HashMap<Uuid, i32>,
}

/// Per-game rules settings, fixed at room creation.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct GameSettings {
    /// Score every seat starts on; play counts down toward zero.
    pub starting_stake: i32,
    /// Seed for the deal RNG. `None` seeds from the OS; a fixed seed
    /// makes every deal of the game reproducible from the action log.
    pub rng_seed: Option<u64>,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            starting_stake: DEFAULT_STARTING_STAKE,
            rng_seed: None,
        }
    }
}

/// A completed trick annotated with its winner.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CompletedTrick {
    pub trick: Trick,
    pub winner: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_table_accepts_documented_edges() {
        assert!(Phase::Setup.can_transition(Phase::Bidding));
        assert!(Phase::Bidding.can_transition(Phase::Bidding));
        assert!(Phase::TrumpSelection.can_transition(Phase::HandPlay));
        assert!(Phase::SitPass.can_transition(Phase::EveryoneSat));
        assert!(Phase::TrickComplete.can_transition(Phase::RoundComplete));
        assert!(Phase::RoundComplete.can_transition(Phase::GameOver));
        assert!(Phase::GameOver.can_transition(Phase::Setup));
    }

    #[test]
    fn transition_table_rejects_undeclared_edges() {
        assert!(!Phase::Setup.can_transition(Phase::HandPlay));
        assert!(!Phase::Bidding.can_transition(Phase::HandPlay));
        assert!(!Phase::HandPlay.can_transition(Phase::Bidding));
        assert!(!Phase::GameOver.can_transition(Phase::Bidding));
        assert!(!Phase::EveryoneSat.can_transition(Phase::HandPlay));
    }

    #[test]
    fn game_action_wire_shape() {
        let action: GameAction =
            serde_json::from_str(r#"{"action":"bid","payload":{"value":3}}"#).unwrap();
        assert_eq!(action, GameAction::Bid { value: 3 });

        let action: GameAction = serde_json::from_str(
            r#"{"action":"playcard","payload":{"card":{"suit":"hearts","value":12}}}"#,
        )
        .unwrap();
        assert!(matches!(action, GameAction::PlayCard { .. }));

        let action: GameAction =
            serde_json::from_str(r#"{"action":"penalty","payload":{"target":"self"}}"#).unwrap();
        assert_eq!(
            action,
            GameAction::Penalty {
                target: PenaltyTarget::Bidder
            }
        );
    }

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(GameError::NotYourTurn.code(), "NOT_YOUR_TURN");
        assert_eq!(GameError::MustyMustPlay.code(), "MUSTY_MUST_PLAY");
        assert_eq!(GameError::RoomFull.code(), "ROOM_FULL");
    }
}
