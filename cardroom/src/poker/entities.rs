use rand::{seq::SliceRandom, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{Chips, UserId};

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Suit {
    Club,
    Spade,
    Diamond,
    Heart,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Club, Suit::Spade, Suit::Diamond, Suit::Heart];
}

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Club => "♣",
            Self::Spade => "♠",
            Self::Diamond => "♦",
            Self::Heart => "♥",
        };
        write!(f, "{repr}")
    }
}

/// Card rank value. 2..=10 are themselves, J=11, Q=12, K=13, A=14.
/// The ace also counts as 1 inside the wheel straight.
pub type Value = u8;

pub const ACE: Value = 14;

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Card(pub Value, pub Suit);

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let value = match self.0 {
            14 => "A",
            13 => "K",
            12 => "Q",
            11 => "J",
            v => &v.to_string(),
        };
        write!(f, "{value}{}", self.1)
    }
}

/// A standard 52-card deck dealt from a cursor.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Deck {
    cards: Vec<Card>,
    deck_idx: usize,
}

impl Default for Deck {
    fn default() -> Self {
        let mut cards = Vec::with_capacity(52);
        for value in 2..=ACE {
            for suit in Suit::ALL {
                cards.push(Card(value, suit));
            }
        }
        Self { cards, deck_idx: 0 }
    }
}

impl Deck {
    /// Fresh deck shuffled in place with the lobby's RNG (Fisher–Yates).
    #[must_use]
    pub fn new_shuffled(rng: &mut (dyn RngCore + Send)) -> Self {
        let mut deck = Self::default();
        deck.cards.shuffle(rng);
        deck
    }

    pub fn deal_card(&mut self) -> Card {
        let card = self.cards[self.deck_idx];
        self.deck_idx += 1;
        card
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        52 - self.deck_idx
    }
}

/// Poker betting round.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Street {
    Preflop,
    Flop,
    Turn,
    River,
    Showdown,
}

impl fmt::Display for Street {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Preflop => "preflop",
            Self::Flop => "flop",
            Self::Turn => "turn",
            Self::River => "river",
            Self::Showdown => "showdown",
        };
        write!(f, "{repr}")
    }
}

/// A player command at the table.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PokerAction {
    Fold,
    Check,
    Call,
    Bet { amount: Chips },
    Raise { amount: Chips },
    AllIn,
}

impl fmt::Display for PokerAction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Fold => "folds".to_string(),
            Self::Check => "checks".to_string(),
            Self::Call => "calls".to_string(),
            Self::Bet { amount } => format!("bets {amount}"),
            Self::Raise { amount } => format!("raises to {amount}"),
            Self::AllIn => "goes all-in".to_string(),
        };
        write!(f, "{repr}")
    }
}

/// A seated participant in the current poker game.
///
/// Seats are frozen for the duration of a hand; lobby-phase joins and leaves
/// go through the lobby roster first.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct PokerSeat {
    pub user_id: UserId,
    pub stack: Chips,
    /// Chips committed on the current street.
    pub street_bet: Chips,
    /// Total chips committed across the whole hand; drives side pots.
    pub committed: Chips,
    pub hole: Option<[Card; 2]>,
    pub folded: bool,
    pub all_in: bool,
    pub last_action: Option<PokerAction>,
    /// Showdown reveal choice: None = engine default, Some(v) = player chose.
    pub revealed: Option<bool>,
    pub is_connected: bool,
}

impl PokerSeat {
    #[must_use]
    pub fn new(user_id: UserId, stack: Chips) -> Self {
        Self {
            user_id,
            stack,
            street_bet: 0,
            committed: 0,
            hole: None,
            folded: false,
            all_in: false,
            last_action: None,
            revealed: None,
            is_connected: true,
        }
    }

    /// Still eligible to win the hand.
    #[must_use]
    pub fn live(&self) -> bool {
        !self.folded
    }

    /// Still has decisions to make this hand.
    #[must_use]
    pub fn can_act(&self) -> bool {
        !self.folded && !self.all_in
    }

    pub fn reset_for_hand(&mut self) {
        self.street_bet = 0;
        self.committed = 0;
        self.hole = None;
        self.folded = false;
        self.all_in = false;
        self.last_action = None;
        self.revealed = None;
    }
}

/// A pot with the set of players eligible to win it. The main pot is index 0;
/// side pots are appended at each all-in boundary.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Pot {
    pub amount: Chips,
    pub eligible: Vec<UserId>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::seeded_rng;
    use std::collections::BTreeSet;

    // === Deck ===

    #[test]
    fn test_deck_has_52_unique_cards() {
        let mut deck = Deck::default();
        let cards: BTreeSet<Card> = (0..52).map(|_| deck.deal_card()).collect();
        assert_eq!(cards.len(), 52);
    }

    #[test]
    fn test_deck_values_in_range() {
        let mut deck = Deck::default();
        for _ in 0..52 {
            let Card(value, _) = deck.deal_card();
            assert!((2..=ACE).contains(&value));
        }
    }

    #[test]
    fn test_shuffled_deck_is_permutation() {
        let mut rng = seeded_rng(3);
        let mut shuffled = Deck::new_shuffled(&mut *rng);
        let cards: BTreeSet<Card> = (0..52).map(|_| shuffled.deal_card()).collect();
        assert_eq!(cards.len(), 52);
    }

    #[test]
    fn test_shuffle_deterministic_under_seed() {
        let mut a = Deck::new_shuffled(&mut *seeded_rng(11));
        let mut b = Deck::new_shuffled(&mut *seeded_rng(11));
        for _ in 0..52 {
            assert_eq!(a.deal_card(), b.deal_card());
        }
    }

    #[test]
    fn test_deck_remaining() {
        let mut deck = Deck::default();
        assert_eq!(deck.remaining(), 52);
        deck.deal_card();
        deck.deal_card();
        assert_eq!(deck.remaining(), 50);
    }

    // === Display ===

    #[test]
    fn test_card_display_faces() {
        assert_eq!(Card(14, Suit::Spade).to_string(), "A♠");
        assert_eq!(Card(13, Suit::Heart).to_string(), "K♥");
        assert_eq!(Card(10, Suit::Club).to_string(), "10♣");
        assert_eq!(Card(2, Suit::Diamond).to_string(), "2♦");
    }

    #[test]
    fn test_action_display() {
        assert_eq!(PokerAction::Fold.to_string(), "folds");
        assert_eq!(PokerAction::Raise { amount: 60 }.to_string(), "raises to 60");
    }

    // === Seats ===

    #[test]
    fn test_seat_flags() {
        let mut seat = PokerSeat::new(1, 500);
        assert!(seat.live());
        assert!(seat.can_act());
        seat.all_in = true;
        assert!(seat.live());
        assert!(!seat.can_act());
        seat.folded = true;
        assert!(!seat.live());
    }

    #[test]
    fn test_seat_reset_keeps_stack() {
        let mut seat = PokerSeat::new(1, 500);
        seat.committed = 40;
        seat.folded = true;
        seat.hole = Some([Card(2, Suit::Club), Card(3, Suit::Club)]);
        seat.reset_for_hand();
        assert_eq!(seat.stack, 500);
        assert_eq!(seat.committed, 0);
        assert!(!seat.folded);
        assert!(seat.hole.is_none());
    }

    #[test]
    fn test_action_serde_tagging() {
        let json = serde_json::to_string(&PokerAction::Bet { amount: 40 }).unwrap();
        assert!(json.contains("\"action\":\"bet\""));
        let back: PokerAction = serde_json::from_str(&json).unwrap();
        assert_eq!(back, PokerAction::Bet { amount: 40 });
    }
}
