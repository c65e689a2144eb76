//! Redacted snapshots of game state for the wire.
//!
//! Every outbound state message is built through [`GameStateView::for_viewer`]
//! so hidden information (other seats' hands) can never leak by accident:
//! a player's view only ever contains their own cards. Spectators own no
//! seat and see every hand.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::game::cards::{Card, Suit};
use crate::game::engine::GameState;
use crate::game::entities::{CompletedTrick, Phase, RoundHistory};
use crate::ai::Difficulty;

/// Who a view is being rendered for.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Viewer {
    Seat(Uuid),
    Spectator,
}

/// One seat as seen over the wire. `hand` is present only in the view
/// built for that seat's own player, or for a spectator.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatView {
    pub id: Uuid,
    pub name: String,
    pub is_ai: bool,
    pub difficulty: Option<Difficulty>,
    pub is_active: bool,
    pub connected: bool,
    pub consecutive_sits: u8,
    pub card_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hand: Option<Vec<Card>>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrickPlayView {
    pub seat_id: Uuid,
    pub card: Card,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedTrickView {
    pub plays: Vec<TrickPlayView>,
    pub winner: Uuid,
}

impl From<&CompletedTrick> for CompletedTrickView {
    fn from(completed: &CompletedTrick) -> Self {
        Self {
            plays: completed
                .trick
                .plays
                .iter()
                .map(|(seat_id, card)| TrickPlayView {
                    seat_id: *seat_id,
                    card: *card,
                })
                .collect(),
            winner: completed.winner,
        }
    }
}

/// Full personalized snapshot, sent on join/rejoin and after every
/// state change.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStateView {
    pub phase: Phase,
    pub round: u32,
    pub starting_stake: i32,
    pub seats: Vec<SeatView>,
    pub current_seat: Option<Uuid>,
    pub dealer: Option<Uuid>,
    pub bids: HashMap<Uuid, u8>,
    pub trump: Option<Suit>,
    pub highest_bidder: Option<Uuid>,
    pub winning_bid: Option<u8>,
    pub playing: Vec<Uuid>,
    pub sat: Vec<Uuid>,
    pub scores: HashMap<Uuid, i32>,
    pub current_trick: Vec<TrickPlayView>,
    pub completed_tricks: Vec<CompletedTrickView>,
    pub history: Vec<RoundHistory>,
}

impl GameStateView {
    #[must_use]
    pub fn for_viewer(state: &GameState, viewer: Viewer) -> Self {
        let seats = state
            .seats
            .iter()
            .map(|seat| {
                let own = match viewer {
                    Viewer::Seat(id) => id == seat.id,
                    Viewer::Spectator => true,
                };
                SeatView {
                    id: seat.id,
                    name: seat.name.clone(),
                    is_ai: seat.is_ai,
                    difficulty: seat.ai_difficulty,
                    is_active: seat.is_active,
                    connected: seat.connected,
                    consecutive_sits: seat.consecutive_sits,
                    card_count: seat.hand.len(),
                    hand: own.then(|| seat.hand.clone()),
                }
            })
            .collect();

        let dealer = (state.phase != Phase::Setup)
            .then(|| state.seats.get(state.dealer_index).map(|s| s.id))
            .flatten();

        Self {
            phase: state.phase,
            round: state.round,
            starting_stake: state.settings().starting_stake,
            seats,
            current_seat: state.turn_seat().map(|s| s.id),
            dealer,
            bids: state.bids.clone(),
            trump: state.trump,
            highest_bidder: state.highest_bidder,
            winning_bid: state.winning_bid(),
            playing: state.playing.iter().copied().collect(),
            sat: state.sat.iter().copied().collect(),
            scores: state.scores.clone(),
            current_trick: state
                .current_trick
                .plays
                .iter()
                .map(|(seat_id, card)| TrickPlayView {
                    seat_id: *seat_id,
                    card: *card,
                })
                .collect(),
            completed_tricks: state.completed_tricks.iter().map(Into::into).collect(),
            history: state.history.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::entities::{GameAction, GameSettings};

    fn started_game() -> GameState {
        let mut state = GameState::new(GameSettings::default());
        for name in ["ann", "ben", "cal", "dot"] {
            state.add_human_seat(name).unwrap();
        }
        state.start().unwrap();
        state
    }

    #[test]
    fn view_only_contains_the_viewers_hand() {
        let state = started_game();
        let me = state.seats[1].id;
        let view = GameStateView::for_viewer(&state, Viewer::Seat(me));
        for seat in &view.seats {
            if seat.id == me {
                assert_eq!(seat.hand.as_ref().map(Vec::len), Some(5));
            } else {
                assert!(seat.hand.is_none());
                assert_eq!(seat.card_count, 5);
            }
        }
    }

    #[test]
    fn spectator_view_reveals_every_hand() {
        let state = started_game();
        let view = GameStateView::for_viewer(&state, Viewer::Spectator);
        assert!(view
            .seats
            .iter()
            .all(|s| s.hand.as_ref().map(Vec::len) == Some(5)));
    }

    #[test]
    fn serialized_view_never_mentions_other_hands() {
        // Belt and braces on the serde shape: a redacted hand must not
        // appear as null, it must be absent.
        let state = started_game();
        let me = state.seats[0].id;
        let json =
            serde_json::to_value(GameStateView::for_viewer(&state, Viewer::Seat(me))).unwrap();
        let seats = json["seats"].as_array().unwrap();
        let mut with_hand = 0;
        for seat in seats {
            if seat.get("hand").is_some() {
                with_hand += 1;
                assert_eq!(seat["id"], serde_json::json!(me));
            }
        }
        assert_eq!(with_hand, 1);
    }

    #[test]
    fn view_tracks_bidding_progress() {
        let mut state = started_game();
        let first = state.turn_seat().unwrap().id;
        state.apply(first, GameAction::Bid { value: 2 }).unwrap();
        let view = GameStateView::for_viewer(&state, Viewer::Spectator);
        assert_eq!(view.bids.get(&first), Some(&2));
        assert_ne!(view.current_seat, Some(first));
    }
}
