//! Card primitives and pure rules functions.
//!
//! Nothing in here holds shared state. The engine and the AI layer both
//! lean on these helpers; the engine trusts them for legality and trick
//! resolution, the AI only for hand strength estimates.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

/// Cards dealt to each seat per round.
pub const HAND_SIZE: usize = 5;

/// Suit ordering doubles as the hand sort order: spades sort first,
/// clubs last. Trick comparisons never rely on this ordering.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Suit {
    Spades,
    Hearts,
    Diamonds,
    Clubs,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Spades, Suit::Hearts, Suit::Diamonds, Suit::Clubs];
}

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Spades => "♠",
            Self::Hearts => "♥",
            Self::Diamonds => "♦",
            Self::Clubs => "♣",
        };
        write!(f, "{repr}")
    }
}

/// Card values run 2..=14, ace high.
pub type Value = u8;

pub const VALUE_JACK: Value = 11;
pub const VALUE_ACE: Value = 14;

/// Immutable card value type. A standard deck holds exactly one of each
/// (suit, value) pair, which is what makes trick ties impossible.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Card {
    pub suit: Suit,
    pub value: Value,
}

impl Card {
    #[must_use]
    pub const fn new(suit: Suit, value: Value) -> Self {
        Self { suit, value }
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self.value {
            VALUE_ACE => "A".to_string(),
            13 => "K".to_string(),
            12 => "Q".to_string(),
            VALUE_JACK => "J".to_string(),
            v => v.to_string(),
        };
        write!(f, "{value}{}", self.suit)
    }
}

/// A full 52-card deck.
#[derive(Debug)]
pub struct Deck {
    cards: Vec<Card>,
}

impl Default for Deck {
    fn default() -> Self {
        Self::standard()
    }
}

impl Deck {
    /// Build an unshuffled standard deck: 52 unique (suit, value) pairs.
    #[must_use]
    pub fn standard() -> Self {
        let mut cards = Vec::with_capacity(52);
        for suit in Suit::ALL {
            for value in 2..=VALUE_ACE {
                cards.push(Card::new(suit, value));
            }
        }
        Self { cards }
    }

    /// Fisher-Yates shuffle with a caller-supplied RNG, so a seeded game
    /// deals reproducibly.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.cards.shuffle(rng);
        debug_assert!(all_unique(&self.cards));
    }

    /// Deal `seat_count` sorted hands round-robin, `HAND_SIZE` cards each.
    ///
    /// Returns `None` if the deck cannot cover the request; callers treat
    /// that as an internal invariant failure, not a user error.
    #[must_use]
    pub fn deal(&mut self, seat_count: usize) -> Option<Vec<Vec<Card>>> {
        if seat_count * HAND_SIZE > self.cards.len() {
            return None;
        }
        let mut hands = vec![Vec::with_capacity(HAND_SIZE); seat_count];
        for _ in 0..HAND_SIZE {
            for hand in hands.iter_mut() {
                hand.push(self.cards.pop()?);
            }
        }
        for hand in hands.iter_mut() {
            sort_hand(hand);
        }
        debug_assert!(all_unique(&hands.iter().flatten().copied().collect::<Vec<_>>()));
        Some(hands)
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.cards.len()
    }
}

/// True when no (suit, value) pair repeats.
#[must_use]
pub fn all_unique(cards: &[Card]) -> bool {
    let mut seen = HashSet::with_capacity(cards.len());
    cards.iter().all(|c| seen.insert(*c))
}

/// Sort key: suit in declaration order (spades first), then value descending.
pub fn sort_hand(hand: &mut [Card]) {
    hand.sort_by(|a, b| a.suit.cmp(&b.suit).then(b.value.cmp(&a.value)));
}

/// One trick in progress or completed: ordered plays, at most one per seat.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Trick {
    pub plays: Vec<(Uuid, Card)>,
}

impl Trick {
    #[must_use]
    pub fn lead_suit(&self) -> Option<Suit> {
        self.plays.first().map(|(_, card)| card.suit)
    }

    #[must_use]
    pub fn contains_seat(&self, seat_id: Uuid) -> bool {
        self.plays.iter().any(|(id, _)| *id == seat_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.plays.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plays.is_empty()
    }
}

/// Whether `card` may be played from `hand` onto `trick`.
///
/// Leading is unrestricted. Otherwise the lead suit must be followed
/// whenever the hand holds it; trump confers no exemption.
#[must_use]
pub fn is_legal_play(card: Card, hand: &[Card], trick: &Trick, _trump: Option<Suit>) -> bool {
    if !hand.contains(&card) {
        return false;
    }
    let Some(lead) = trick.lead_suit() else {
        return true;
    };
    if card.suit == lead {
        return true;
    }
    !hand.iter().any(|c| c.suit == lead)
}

/// Rank a card within a trick: trump beats lead suit beats everything else.
/// Off-suit non-trump cards can never win, so they rank zero.
fn trick_rank(card: Card, lead: Suit, trump: Option<Suit>) -> u16 {
    if Some(card.suit) == trump {
        100 + u16::from(card.value)
    } else if card.suit == lead {
        u16::from(card.value)
    } else {
        0
    }
}

/// Seat that wins a completed trick. Highest trump wins; with no trump
/// played, the highest card of the lead suit wins. Unique cards make ties
/// impossible.
#[must_use]
pub fn trick_winner(trick: &Trick, trump: Option<Suit>) -> Option<Uuid> {
    let lead = trick.lead_suit()?;
    trick
        .plays
        .iter()
        .max_by_key(|(_, card)| trick_rank(*card, lead, trump))
        .map(|(id, _)| *id)
}

/// Coarse 0-5 hand score: one point per high card (jack or better) plus one
/// per trump card, capped at 5. Only the AI layer consumes this.
#[must_use]
pub fn hand_strength(hand: &[Card], trump: Option<Suit>) -> u8 {
    let score = hand
        .iter()
        .map(|c| {
            let high = u8::from(c.value >= VALUE_JACK);
            let trumpy = u8::from(Some(c.suit) == trump);
            high + trumpy
        })
        .sum::<u8>();
    score.min(HAND_SIZE as u8)
}
