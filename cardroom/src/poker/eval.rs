//! Seven-card hand evaluation.
//!
//! `eval` selects the best five-card hand out of up to seven cards (two hole
//! plus five community) and returns its class, a high-to-low tiebreak vector,
//! and the cards forming the hand. `find_winners` compares evaluated hands
//! and returns every index tied for strongest.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::entities::{Card, Suit, Value, ACE};

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HandRank {
    HighCard,
    OnePair,
    TwoPair,
    ThreeOfAKind,
    Straight,
    Flush,
    FullHouse,
    FourOfAKind,
    StraightFlush,
    RoyalFlush,
}

/// An evaluated hand. Ordering ignores the concrete cards: rank class first,
/// then the tiebreak vector lexicographically.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct HandValue {
    pub rank: HandRank,
    pub tiebreak: Vec<Value>,
    pub cards: Vec<Card>,
}

impl Ord for HandValue {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank
            .cmp(&other.rank)
            .then_with(|| self.tiebreak.cmp(&other.tiebreak))
    }
}

impl PartialOrd for HandValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Evaluate the best five-card hand among `cards` (2..=7 cards).
#[must_use]
pub fn eval(cards: &[Card]) -> HandValue {
    debug_assert!((2..=7).contains(&cards.len()));

    // Cards per value, each bucket's cards in an arbitrary suit order.
    let mut by_value: BTreeMap<Value, Vec<Card>> = BTreeMap::new();
    let mut by_suit: BTreeMap<Suit, Vec<Card>> = BTreeMap::new();
    for &card in cards {
        by_value.entry(card.0).or_default().push(card);
        by_suit.entry(card.1).or_default().push(card);
    }

    let flush_suit = by_suit
        .iter()
        .find(|(_, suited)| suited.len() >= 5)
        .map(|(&suit, _)| suit);

    // Straight flush outranks everything else, so check it first.
    if let Some(suit) = flush_suit {
        let suited: Vec<Card> = cards.iter().copied().filter(|c| c.1 == suit).collect();
        if let Some(run) = straight_cards(&suited) {
            let rank = if straight_high(&run) == ACE {
                HandRank::RoyalFlush
            } else {
                HandRank::StraightFlush
            };
            return HandValue {
                rank,
                tiebreak: vec![straight_high(&run)],
                cards: run,
            };
        }
    }

    // Value groups sorted by (count, value) descending.
    let mut groups: Vec<(usize, Value)> = by_value
        .iter()
        .map(|(&value, bucket)| (bucket.len(), value))
        .collect();
    groups.sort_unstable_by(|a, b| b.cmp(a));

    if let Some(&(4, quad_value)) = groups.first() {
        let mut hand = by_value[&quad_value].clone();
        let kicker = best_kickers(&by_value, &[quad_value], 1);
        let tiebreak = std::iter::once(quad_value)
            .chain(kicker.iter().map(|c| c.0))
            .collect();
        hand.extend(kicker);
        return HandValue {
            rank: HandRank::FourOfAKind,
            tiebreak,
            cards: hand,
        };
    }

    // Full house: highest trips, then the best pair (a second trip set
    // contributes its top two cards).
    let trips: Vec<Value> = groups
        .iter()
        .filter(|&&(n, _)| n == 3)
        .map(|&(_, v)| v)
        .collect();
    let pairs: Vec<Value> = groups
        .iter()
        .filter(|&&(n, _)| n == 2)
        .map(|&(_, v)| v)
        .collect();
    if let Some(&trip_value) = trips.first() {
        let pair_value = trips
            .get(1)
            .copied()
            .into_iter()
            .chain(pairs.first().copied())
            .max();
        if let Some(pair_value) = pair_value {
            let mut hand = by_value[&trip_value].clone();
            hand.extend(by_value[&pair_value].iter().take(2));
            return HandValue {
                rank: HandRank::FullHouse,
                tiebreak: vec![trip_value, pair_value],
                cards: hand,
            };
        }
    }

    if let Some(suit) = flush_suit {
        let mut suited: Vec<Card> = cards.iter().copied().filter(|c| c.1 == suit).collect();
        suited.sort_unstable_by(|a, b| b.0.cmp(&a.0));
        suited.truncate(5);
        return HandValue {
            rank: HandRank::Flush,
            tiebreak: suited.iter().map(|c| c.0).collect(),
            cards: suited,
        };
    }

    if let Some(run) = straight_cards(cards) {
        return HandValue {
            rank: HandRank::Straight,
            tiebreak: vec![straight_high(&run)],
            cards: run,
        };
    }

    if let Some(&trip_value) = trips.first() {
        let mut hand = by_value[&trip_value].clone();
        let kickers = best_kickers(&by_value, &[trip_value], 2);
        let tiebreak = std::iter::once(trip_value)
            .chain(kickers.iter().map(|c| c.0))
            .collect();
        hand.extend(kickers);
        return HandValue {
            rank: HandRank::ThreeOfAKind,
            tiebreak,
            cards: hand,
        };
    }

    if pairs.len() >= 2 {
        let (high, low) = (pairs[0], pairs[1]);
        let mut hand: Vec<Card> = by_value[&high].clone();
        hand.extend(by_value[&low].iter());
        let kicker = best_kickers(&by_value, &[high, low], 1);
        let tiebreak = [high, low]
            .into_iter()
            .chain(kicker.iter().map(|c| c.0))
            .collect();
        hand.extend(kicker);
        return HandValue {
            rank: HandRank::TwoPair,
            tiebreak,
            cards: hand,
        };
    }

    if let Some(&pair_value) = pairs.first() {
        let mut hand = by_value[&pair_value].clone();
        let kickers = best_kickers(&by_value, &[pair_value], 3);
        let tiebreak = std::iter::once(pair_value)
            .chain(kickers.iter().map(|c| c.0))
            .collect();
        hand.extend(kickers);
        return HandValue {
            rank: HandRank::OnePair,
            tiebreak,
            cards: hand,
        };
    }

    let hand = best_kickers(&by_value, &[], 5);
    HandValue {
        rank: HandRank::HighCard,
        tiebreak: hand.iter().map(|c| c.0).collect(),
        cards: hand,
    }
}

/// All indices whose hands tie for strongest. Non-empty for non-empty input.
#[must_use]
pub fn find_winners(hands: &[HandValue]) -> Vec<usize> {
    let Some(best) = hands.iter().max() else {
        return Vec::new();
    };
    hands
        .iter()
        .enumerate()
        .filter(|(_, hand)| *hand == best)
        .map(|(i, _)| i)
        .collect()
}

/// Highest five-in-a-row among `cards`, one card per value, highest first.
/// The wheel (A-2-3-4-5) counts with the ace low.
fn straight_cards(cards: &[Card]) -> Option<Vec<Card>> {
    // One representative card per value, ace duplicated at value 1.
    let mut reps: BTreeMap<Value, Card> = BTreeMap::new();
    for &card in cards {
        reps.entry(card.0).or_insert(card);
        if card.0 == ACE {
            reps.entry(1).or_insert(card);
        }
    }
    let values: Vec<Value> = reps.keys().copied().collect();

    // Scan highs from the top so the first hit is the best straight.
    for window_high in (5..=ACE).rev() {
        let wanted: Vec<Value> = (window_high - 4..=window_high).rev().collect();
        if wanted.iter().all(|v| values.contains(v)) {
            return Some(wanted.iter().map(|v| reps[v]).collect());
        }
    }
    None
}

/// Reported high card of a straight run. Runs are built highest-first and the
/// wheel run leads with its 5 (the ace sits in the value-1 slot), so the
/// ace-low case needs no special treatment here.
fn straight_high(run: &[Card]) -> Value {
    run[0].0
}

/// The `n` highest single cards excluding the listed values.
fn best_kickers(by_value: &BTreeMap<Value, Vec<Card>>, exclude: &[Value], n: usize) -> Vec<Card> {
    by_value
        .iter()
        .rev()
        .filter(|(value, _)| !exclude.contains(value))
        .map(|(_, bucket)| bucket[0])
        .take(n)
        .collect()
}
