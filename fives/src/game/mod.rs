//! Game rules, validation, and the state machine engine.

pub mod cards;
pub mod engine;
pub mod entities;
pub mod validate;

pub use cards::{Card, Deck, Suit, Trick};
pub use engine::{EngineEvent, GameState};
pub use entities::{
    GameAction, GameError, GameSettings, PenaltyTarget, Phase, RoundHistory, Seat,
};
