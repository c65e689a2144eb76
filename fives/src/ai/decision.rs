//! Decision heuristics for AI seats, plus the simpler auto-play fallback.
//!
//! AI decisions feed back into the engine through exactly the same
//! validated action path a human uses; nothing here mutates state. The
//! [`safe_default`] policy is deliberately distinct from the difficulty
//! heuristics: it is the conservative fallback for turn-timer expiry and
//! disconnected seats (pass, lowest legal card, first available option).

use rand::prelude::IndexedRandom;
use rand::Rng;
use uuid::Uuid;

use super::models::DifficultyParams;
use crate::game::cards::{self, Card, Suit, Trick};
use crate::game::engine::GameState;
use crate::game::entities::{GameAction, PenaltyTarget, Phase, MAX_BID, WINNING_SCORE};
use crate::game::validate;

/// Synthesize the AI action for `seat_id` given the current phase.
/// Returns `None` when the phase doesn't await this seat.
#[must_use]
pub fn decide(state: &GameState, seat_id: Uuid, params: &DifficultyParams) -> Option<GameAction> {
    if state.turn_seat().map(|s| s.id) != Some(seat_id) {
        return None;
    }
    let action = match state.phase {
        Phase::Bidding => choose_bid(state, seat_id, params),
        Phase::TrumpSelection => choose_trump(state, seat_id, params),
        Phase::SitPass => choose_sit(state, seat_id, params),
        Phase::EveryoneSat => choose_penalty(state, seat_id),
        Phase::HandPlay => choose_card(state, seat_id, params)?,
        _ => return None,
    };
    Some(action)
}

/// Best achievable hand strength across candidate trump suits.
fn best_suit(hand: &[Card]) -> (Suit, u8) {
    Suit::ALL
        .into_iter()
        .map(|suit| (suit, cards::hand_strength(hand, Some(suit))))
        .max_by_key(|(_, strength)| *strength)
        .unwrap_or((Suit::Hearts, 0))
}

fn choose_bid(state: &GameState, seat_id: Uuid, params: &DifficultyParams) -> GameAction {
    let mut rng = rand::rng();
    let hand = state.seat(seat_id).map(|s| s.hand.as_slice()).unwrap_or(&[]);
    let (_, strength) = best_suit(hand);

    let mut desired = strength.min(MAX_BID);
    if rng.random_bool(params.mistake_rate) {
        desired = desired.saturating_sub(rng.random_range(1..=2));
    } else if rng.random_bool(params.bluff_frequency) {
        desired = (desired + 1).min(MAX_BID);
    }

    let highest = state.bids.values().copied().max().unwrap_or(0);
    let is_dealer = state
        .seats
        .get(state.dealer_index)
        .is_some_and(|s| s.id == seat_id);
    let floor = if is_dealer { highest } else { highest + 1 };
    if desired < floor || desired == 0 {
        GameAction::Bid { value: 0 }
    } else {
        GameAction::Bid { value: desired }
    }
}

fn choose_trump(state: &GameState, seat_id: Uuid, params: &DifficultyParams) -> GameAction {
    let mut rng = rand::rng();
    let hand = state.seat(seat_id).map(|s| s.hand.as_slice()).unwrap_or(&[]);
    let suit = if rng.random_bool(params.mistake_rate) {
        *Suit::ALL.choose(&mut rng).unwrap_or(&Suit::Hearts)
    } else {
        best_suit(hand).0
    };
    GameAction::Trump { suit }
}

fn choose_sit(state: &GameState, seat_id: Uuid, params: &DifficultyParams) -> GameAction {
    // Forced to play when sitting would be rejected (musty, bid of 1,
    // spades trump).
    if validate::sit_pass(state, seat_id, true).is_err() {
        return GameAction::SitPass { sit: false };
    }

    // Collusion heuristic: contest the win when an opponent is close.
    if let Some(margin) = params.contest_margin {
        let threatened = state
            .scores
            .iter()
            .any(|(id, score)| *id != seat_id && *score <= WINNING_SCORE + margin);
        if threatened {
            return GameAction::SitPass { sit: false };
        }
    }

    let mut rng = rand::rng();
    let hand = state.seat(seat_id).map(|s| s.hand.as_slice()).unwrap_or(&[]);
    let strength = cards::hand_strength(hand, state.trump);
    let mut sit = strength < params.sit_threshold;
    if sit && rng.random_bool(params.bluff_frequency) {
        // Occasionally play a weak hand to stay unpredictable.
        sit = false;
    }
    GameAction::SitPass { sit }
}

fn choose_penalty(state: &GameState, seat_id: Uuid) -> GameAction {
    // Taking the -5 personally is strictly better when it wins outright;
    // otherwise push +5 onto everyone else.
    let score = state.scores.get(&seat_id).copied().unwrap_or(i32::MAX);
    let target = if score - 5 <= WINNING_SCORE {
        PenaltyTarget::Bidder
    } else {
        PenaltyTarget::Others
    };
    GameAction::Penalty { target }
}

fn legal_cards(hand: &[Card], trick: &Trick, trump: Option<Suit>) -> Vec<Card> {
    hand.iter()
        .copied()
        .filter(|card| cards::is_legal_play(*card, hand, trick, trump))
        .collect()
}

/// Would playing `card` take the trick as it currently stands?
fn takes_trick(seat_id: Uuid, card: Card, trick: &Trick, trump: Option<Suit>) -> bool {
    let mut probe = trick.clone();
    probe.plays.push((seat_id, card));
    cards::trick_winner(&probe, trump) == Some(seat_id)
}

fn choose_card(state: &GameState, seat_id: Uuid, params: &DifficultyParams) -> Option<GameAction> {
    let mut rng = rand::rng();
    let hand = state.seat(seat_id)?.hand.clone();
    let legal = legal_cards(&hand, &state.current_trick, state.trump);
    if legal.is_empty() {
        return None;
    }

    if rng.random_bool(params.mistake_rate) {
        let card = *legal.choose(&mut rng)?;
        return Some(GameAction::PlayCard { card });
    }

    let card = if state.current_trick.is_empty() {
        // Lead the strongest card: trump first, then highest value.
        *legal
            .iter()
            .max_by_key(|c| {
                let trumpy = u16::from(Some(c.suit) == state.trump) * 100;
                trumpy + u16::from(c.value)
            })?
    } else {
        // Win as cheaply as possible, otherwise shed the lowest card
        // (preferring to keep trump).
        let winners: Vec<Card> = legal
            .iter()
            .copied()
            .filter(|c| takes_trick(seat_id, *c, &state.current_trick, state.trump))
            .collect();
        if winners.is_empty() {
            *legal.iter().min_by_key(|c| {
                let trumpy = u16::from(Some(c.suit) == state.trump) * 100;
                trumpy + u16::from(c.value)
            })?
        } else {
            *winners.iter().min_by_key(|c| {
                let trumpy = u16::from(Some(c.suit) == state.trump) * 100;
                trumpy + u16::from(c.value)
            })?
        }
    };
    Some(GameAction::PlayCard { card })
}

/// Conservative auto-play for timer expiry and disconnected seats:
/// punt the bid, sit when allowed, play the lowest legal card, take the
/// first available penalty option. Never consults difficulty parameters.
#[must_use]
pub fn safe_default(state: &GameState, seat_id: Uuid) -> Option<GameAction> {
    if state.turn_seat().map(|s| s.id) != Some(seat_id) {
        return None;
    }
    match state.phase {
        Phase::Bidding => Some(GameAction::Bid { value: 0 }),
        Phase::TrumpSelection => {
            let hand = state.seat(seat_id)?.hand.clone();
            Some(GameAction::Trump {
                suit: best_suit(&hand).0,
            })
        }
        Phase::SitPass => {
            let sit = validate::sit_pass(state, seat_id, true).is_ok();
            Some(GameAction::SitPass { sit })
        }
        Phase::EveryoneSat => Some(GameAction::Penalty {
            target: PenaltyTarget::Bidder,
        }),
        Phase::HandPlay => {
            let hand = state.seat(seat_id)?.hand.clone();
            let legal = legal_cards(&hand, &state.current_trick, state.trump);
            let card = legal.into_iter().min_by_key(|c| c.value)?;
            Some(GameAction::PlayCard { card })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::engine::GameState;
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
    fn decide_returns_none_off_turn() {
        let state = started_game();
        let off_turn = state.seats[3].id;
        let params = DifficultyParams::hard();
        assert_eq!(decide(&state, off_turn, &params), None);
    }

    #[test]
    fn decisions_always_validate() {
        // Whatever the randomness does, a decided action must pass the
        // validators it will be checked against.
        let params = DifficultyParams::easy();
        for _ in 0..50 {
            let mut state = started_game();
            let mut guard = 0;
            while state.phase.awaits_action() && guard < 200 {
                let seat_id = state.turn_seat().unwrap().id;
                let action = decide(&state, seat_id, &params).expect("action for seat on turn");
                state
                    .apply(seat_id, action.clone())
                    .unwrap_or_else(|e| panic!("AI produced invalid action {action:?}: {e}"));
                if state.phase == crate::game::entities::Phase::TrickComplete {
                    state.advance_after_trick().unwrap();
                }
                guard += 1;
            }
        }
    }

    #[test]
    fn safe_default_punts_in_bidding() {
        let state = started_game();
        let seat_id = state.turn_seat().unwrap().id;
        assert_eq!(
            safe_default(&state, seat_id),
            Some(GameAction::Bid { value: 0 })
        );
    }

    #[test]
    fn safe_default_plays_lowest_legal_card() {
        let mut state = started_game();
        // Bid through to forced hand play with spades trump.
        let mut first = true;
        while state.phase == Phase::Bidding {
            let seat_id = state.turn_seat().unwrap().id;
            let value = if first { 2 } else { 0 };
            first = false;
            state.apply(seat_id, GameAction::Bid { value }).unwrap();
        }
        let bidder = state.highest_bidder.unwrap();
        state
            .apply(bidder, GameAction::Trump { suit: Suit::Spades })
            .unwrap();
        assert_eq!(state.phase, Phase::HandPlay);

        let seat_id = state.turn_seat().unwrap().id;
        let Some(GameAction::PlayCard { card }) = safe_default(&state, seat_id) else {
            panic!("expected a card play");
        };
        let hand = &state.seat(seat_id).unwrap().hand;
        let legal = legal_cards(hand, &state.current_trick, state.trump);
        assert_eq!(card.value, legal.iter().map(|c| c.value).min().unwrap());
    }
}
