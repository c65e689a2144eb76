//! Per-action validators.
//!
//! Each validator is a pure function of the current state and the proposed
//! payload. The engine runs the matching validator before any mutation; a
//! failure leaves state untouched and the coded error goes back to the
//! submitter.

use uuid::Uuid;

use super::cards::{self, Card, Suit};
use super::engine::GameState;
use super::entities::{GameError, PenaltyTarget, Phase, MAX_BID};

fn require_turn(state: &GameState, seat_id: Uuid) -> Result<(), GameError> {
    match state.turn_seat() {
        Some(seat) if seat.id == seat_id => Ok(()),
        _ => Err(GameError::NotYourTurn),
    }
}

/// Bid rules: value in [0, MAX_BID]; a punt (0) is always legal; a
/// non-dealer must strictly exceed the running highest bid; the dealer may
/// tie it (last-bidder advantage).
pub fn bid(state: &GameState, seat_id: Uuid, value: u8) -> Result<(), GameError> {
    if state.phase != Phase::Bidding {
        return Err(GameError::InvalidPhase);
    }
    require_turn(state, seat_id)?;
    if value > MAX_BID {
        return Err(GameError::InvalidBid(format!(
            "bid must be between 0 and {MAX_BID}"
        )));
    }
    if value == 0 {
        return Ok(());
    }
    let highest = state.bids.values().copied().max().unwrap_or(0);
    let is_dealer = state
        .seats
        .get(state.dealer_index)
        .is_some_and(|s| s.id == seat_id);
    if is_dealer {
        if value < highest {
            return Err(GameError::InvalidBid(format!(
                "dealer must at least tie the highest bid of {highest}"
            )));
        }
    } else if value <= highest {
        return Err(GameError::InvalidBid(format!(
            "must exceed the highest bid of {highest} or punt"
        )));
    }
    Ok(())
}

/// Only the highest bidder chooses trump. The suit itself is
/// type-constrained, so there is nothing further to check.
pub fn trump(state: &GameState, seat_id: Uuid, _suit: Suit) -> Result<(), GameError> {
    if state.phase != Phase::TrumpSelection {
        return Err(GameError::InvalidPhase);
    }
    if state.highest_bidder != Some(seat_id) {
        return Err(GameError::NotYourTurn);
    }
    Ok(())
}

/// Sit/play rules: the bidder can never sit; sitting is illegal when the
/// winning bid is exactly 1 or trump is spades (everyone is forced to
/// play), and a seat that already sat twice in a row is musty.
pub fn sit_pass(state: &GameState, seat_id: Uuid, sit: bool) -> Result<(), GameError> {
    if state.phase != Phase::SitPass {
        return Err(GameError::InvalidPhase);
    }
    require_turn(state, seat_id)?;
    if !sit {
        return Ok(());
    }
    if state.highest_bidder == Some(seat_id) {
        return Err(GameError::InvalidDecision(
            "the highest bidder must play".to_string(),
        ));
    }
    if state.winning_bid() == Some(1) {
        return Err(GameError::InvalidDecision(
            "no sitting when the winning bid is 1".to_string(),
        ));
    }
    if state.trump == Some(Suit::Spades) {
        return Err(GameError::InvalidDecision(
            "no sitting when trump is spades".to_string(),
        ));
    }
    let seat = state.seat(seat_id).ok_or(GameError::PlayerNotFound)?;
    if seat.consecutive_sits >= 2 {
        return Err(GameError::MustyMustPlay);
    }
    Ok(())
}

/// Play rules: acting seat's turn, seat among this round's playing set,
/// card in hand, suit-following mandatory when possible.
pub fn play_card(state: &GameState, seat_id: Uuid, card: Card) -> Result<(), GameError> {
    if state.phase != Phase::HandPlay {
        return Err(GameError::InvalidPhase);
    }
    require_turn(state, seat_id)?;
    if !state.playing.contains(&seat_id) {
        return Err(GameError::InvalidDecision(
            "seat is sitting out this round".to_string(),
        ));
    }
    let seat = state.seat(seat_id).ok_or(GameError::PlayerNotFound)?;
    if !seat.hand.contains(&card) {
        return Err(GameError::InvalidCard("card not in hand".to_string()));
    }
    if !cards::is_legal_play(card, &seat.hand, &state.current_trick, state.trump) {
        return Err(GameError::InvalidCard("must follow suit".to_string()));
    }
    Ok(())
}

/// Only the bidder chooses the everyone-sat penalty.
pub fn penalty(state: &GameState, seat_id: Uuid, _target: PenaltyTarget) -> Result<(), GameError> {
    if state.phase != Phase::EveryoneSat {
        return Err(GameError::InvalidPhase);
    }
    if state.highest_bidder != Some(seat_id) {
        return Err(GameError::NotYourTurn);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::engine::GameState;
    use crate::game::entities::GameSettings;

    fn four_seat_game() -> GameState {
        let mut state = GameState::new(GameSettings::default());
        for name in ["ann", "ben", "cal", "dot"] {
            state.add_human_seat(name).unwrap();
        }
        state.start().unwrap();
        state
    }

    #[test]
    fn bid_out_of_turn_is_rejected() {
        let state = four_seat_game();
        // Dealer is seat 0, so seat 1 opens; seat 2 bidding is out of turn.
        let wrong = state.seats[2].id;
        assert_eq!(bid(&state, wrong, 3), Err(GameError::NotYourTurn));
    }

    #[test]
    fn bid_above_maximum_is_rejected() {
        let state = four_seat_game();
        let turn = state.turn_seat().unwrap().id;
        assert!(matches!(bid(&state, turn, 6), Err(GameError::InvalidBid(_))));
    }

    #[test]
    fn punt_is_always_legal() {
        let mut state = four_seat_game();
        let first = state.turn_seat().unwrap().id;
        state.apply(first, crate::game::entities::GameAction::Bid { value: 4 }).unwrap();
        let second = state.turn_seat().unwrap().id;
        assert_eq!(bid(&state, second, 0), Ok(()));
        assert!(matches!(bid(&state, second, 4), Err(GameError::InvalidBid(_))));
    }

    #[test]
    fn dealer_may_tie_the_highest_bid() {
        let mut state = four_seat_game();
        use crate::game::entities::GameAction;
        for value in [3u8, 0, 0] {
            let turn = state.turn_seat().unwrap().id;
            state.apply(turn, GameAction::Bid { value }).unwrap();
        }
        let dealer = state.seats[state.dealer_index].id;
        assert_eq!(state.turn_seat().unwrap().id, dealer);
        assert_eq!(bid(&state, dealer, 3), Ok(()));
        assert!(matches!(bid(&state, dealer, 2), Err(GameError::InvalidBid(_))));
    }
}
