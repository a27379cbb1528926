//! Authoritative Texas Hold'em table state machine.
//!
//! One `PokerTable` lives per poker lobby and persists stacks across hands.
//! All methods are synchronous pure-compute; the lobby actor serializes
//! access and owns timers and broadcasting.

use chrono::{DateTime, Duration, Utc};
use log::debug;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use super::entities::{Card, Deck, PokerAction, PokerSeat, Pot, Street};
use super::eval::{eval, find_winners, HandValue};
use crate::errors::GameError;
use crate::types::{Chips, UserId};

/// What an accepted action did to the hand.
#[derive(Clone, Debug, PartialEq)]
pub enum PokerUpdate {
    /// Betting continues on the same street.
    NextToAct,
    /// The street closed and new community cards were dealt.
    StreetDealt(Street),
    /// The hand is over and chips have moved.
    HandComplete(HandResult),
}

/// Terminal outcome of a hand.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct HandResult {
    /// Chips awarded per player, aggregated across pots.
    pub payouts: Vec<(UserId, Chips)>,
    /// Winners of the main pot, used for the celebration payload.
    pub winners: Vec<UserId>,
    /// True when the hand went to showdown (cards exposed by default).
    pub showdown: bool,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct PokerTable {
    pub seats: Vec<PokerSeat>,
    pub small_blind: Chips,
    pub big_blind: Chips,
    pub buy_in: Chips,
    pub max_players: usize,

    pub deck: Deck,
    pub board: Vec<Card>,
    pub street: Street,
    pub hand_active: bool,
    pub hand_no: u32,

    /// Seat indices participating in the current hand, in seat order.
    pub order: Vec<usize>,
    /// Positions below are indices into `order`.
    pub btn_pos: usize,
    pub sb_pos: usize,
    pub bb_pos: usize,
    pub current_pos: Option<usize>,

    pub current_bet: Chips,
    pub last_raise: Chips,
    /// Players that have acknowledged the current bet level this round.
    pub acted: HashSet<UserId>,

    /// Side pots; populated at showdown.
    pub pots: Vec<Pot>,
    pub last_result: Option<HandResult>,

    /// Dealer seat index carried across hands for rotation.
    dealer_seat: Option<usize>,

    pub turn_started: DateTime<Utc>,
    pub turn_timeout_secs: u64,
}

impl PokerTable {
    #[must_use]
    pub fn new(small_blind: Chips, big_blind: Chips, buy_in: Chips, max_players: usize) -> Self {
        Self {
            seats: Vec::with_capacity(max_players),
            small_blind,
            big_blind,
            buy_in,
            max_players,
            deck: Deck::default(),
            board: Vec::with_capacity(5),
            street: Street::Preflop,
            hand_active: false,
            hand_no: 0,
            order: Vec::new(),
            btn_pos: 0,
            sb_pos: 0,
            bb_pos: 0,
            current_pos: None,
            current_bet: 0,
            last_raise: 0,
            acted: HashSet::new(),
            pots: Vec::new(),
            last_result: None,
            dealer_seat: None,
            turn_started: Utc::now(),
            turn_timeout_secs: 30,
        }
    }

    // === Roster ===

    pub fn add_player(&mut self, user_id: UserId) -> Result<(), GameError> {
        if self.seats.iter().any(|s| s.user_id == user_id) {
            return Ok(());
        }
        if self.seats.len() >= self.max_players {
            return Err(GameError::Capacity);
        }
        self.seats.push(PokerSeat::new(user_id, self.buy_in));
        Ok(())
    }

    pub fn remove_player(&mut self, user_id: UserId) -> Result<(), GameError> {
        if self.hand_active {
            return Err(GameError::PhaseViolation);
        }
        let before = self.seats.len();
        self.seats.retain(|s| s.user_id != user_id);
        if self.seats.len() == before {
            return Err(GameError::NotFound);
        }
        Ok(())
    }

    pub fn set_connected(&mut self, user_id: UserId, connected: bool) {
        if let Some(seat) = self.seats.iter_mut().find(|s| s.user_id == user_id) {
            seat.is_connected = connected;
        }
    }

    fn seat_of(&self, user_id: UserId) -> Option<usize> {
        self.seats.iter().position(|s| s.user_id == user_id)
    }

    // === Hand setup ===

    /// Deal a new hand. Requires at least two connected players with chips.
    /// Returns `Some(result)` when the blinds already consumed every stack
    /// and the hand resolved on the spot.
    pub fn start_hand(
        &mut self,
        rng: &mut (dyn RngCore + Send),
    ) -> Result<Option<HandResult>, GameError> {
        if self.hand_active {
            return Err(GameError::PhaseViolation);
        }
        for seat in &mut self.seats {
            seat.reset_for_hand();
        }
        self.order = self
            .seats
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_connected && s.stack > 0)
            .map(|(i, _)| i)
            .collect();
        if self.order.len() < 2 {
            return Err(GameError::invalid("need 2+ players with chips"));
        }

        self.deck = Deck::new_shuffled(rng);
        self.board.clear();
        self.pots.clear();
        self.last_result = None;
        self.street = Street::Preflop;
        self.hand_active = true;
        self.hand_no += 1;
        self.acted.clear();

        // Rotate the button to the next eligible seat.
        let dealer_seat = match self.dealer_seat {
            Some(prev) => *self
                .order
                .iter()
                .find(|&&i| i > prev)
                .unwrap_or(&self.order[0]),
            None => self.order[0],
        };
        self.dealer_seat = Some(dealer_seat);
        self.btn_pos = self
            .order
            .iter()
            .position(|&i| i == dealer_seat)
            .unwrap_or(0);

        let n = self.order.len();
        if n == 2 {
            // Heads-up: the dealer posts the small blind and acts first preflop.
            self.sb_pos = self.btn_pos;
            self.bb_pos = (self.btn_pos + 1) % n;
        } else {
            self.sb_pos = (self.btn_pos + 1) % n;
            self.bb_pos = (self.btn_pos + 2) % n;
        }
        let (sb, bb) = (self.small_blind, self.big_blind);
        self.commit(self.sb_pos, sb);
        self.commit(self.bb_pos, bb);
        self.current_bet = self.big_blind;
        self.last_raise = self.big_blind;

        // Two hole cards each, starting left of the button.
        for _ in 0..2 {
            for offset in 1..=n {
                let pos = (self.btn_pos + offset) % n;
                let card = self.deck.deal_card();
                let seat = &mut self.seats[self.order[pos]];
                match &mut seat.hole {
                    None => seat.hole = Some([card, card]),
                    Some(pair) => pair[1] = card,
                }
            }
        }

        let first = if n == 2 {
            self.btn_pos
        } else {
            (self.bb_pos + 1) % n
        };
        self.current_pos = self.next_can_act_from(first);
        self.turn_started = Utc::now();
        debug!("hand {} dealt to {} players", self.hand_no, n);
        if self.current_pos.is_none() {
            // The blinds put everyone all-in; there is no betting to do.
            while self.street != Street::Showdown {
                self.deal_next_board();
            }
            return Ok(Some(self.award_showdown()));
        }
        Ok(None)
    }

    // === Queries ===

    #[must_use]
    pub fn current_user(&self) -> Option<UserId> {
        self.current_pos
            .map(|p| self.seats[self.order[p]].user_id)
    }

    #[must_use]
    pub fn to_call(&self, user_id: UserId) -> Chips {
        self.seat_of(user_id)
            .map(|i| self.current_bet.saturating_sub(self.seats[i].street_bet))
            .unwrap_or(0)
    }

    #[must_use]
    pub fn pot_total(&self) -> Chips {
        self.seats.iter().map(|s| s.committed).sum()
    }

    /// The action the engine takes on behalf of a player whose turn expired.
    #[must_use]
    pub fn auto_action_for_current(&self) -> Option<(UserId, PokerAction)> {
        let user = self.current_user()?;
        let action = if self.to_call(user) == 0 {
            PokerAction::Check
        } else {
            PokerAction::Fold
        };
        Some((user, action))
    }

    /// True once the acting player's turn clock has expired.
    #[must_use]
    pub fn turn_expired(&self, now: DateTime<Utc>) -> bool {
        self.hand_active
            && self.current_pos.is_some()
            && now - self.turn_started >= Duration::seconds(self.turn_timeout_secs as i64)
    }

    fn live_positions(&self) -> Vec<usize> {
        (0..self.order.len())
            .filter(|&p| self.seats[self.order[p]].live())
            .collect()
    }

    fn can_act_count(&self) -> usize {
        self.order
            .iter()
            .filter(|&&i| self.seats[i].can_act())
            .count()
    }

    fn next_can_act_from(&self, start: usize) -> Option<usize> {
        let n = self.order.len();
        (0..n)
            .map(|k| (start + k) % n)
            .find(|&p| self.seats[self.order[p]].can_act())
    }

    // === Actions ===

    pub fn apply(&mut self, user_id: UserId, action: PokerAction) -> Result<PokerUpdate, GameError> {
        if !self.hand_active {
            return Err(GameError::PhaseViolation);
        }
        let pos = match self.current_pos {
            Some(p) if self.seats[self.order[p]].user_id == user_id => p,
            Some(_) => return Err(GameError::NotYourTurn),
            None => return Err(GameError::NotYourTurn),
        };
        let conserved = self.chips_in_play();
        let seat_idx = self.order[pos];
        let to_call = self
            .current_bet
            .saturating_sub(self.seats[seat_idx].street_bet);

        match action {
            PokerAction::Fold => {
                self.seats[seat_idx].folded = true;
                self.acted.insert(user_id);
            }
            PokerAction::Check => {
                if to_call > 0 {
                    return Err(GameError::invalid("check with a call owed"));
                }
                self.acted.insert(user_id);
            }
            PokerAction::Call => {
                if to_call == 0 {
                    return Err(GameError::invalid("nothing to call"));
                }
                self.commit(pos, to_call);
                self.acted.insert(user_id);
            }
            PokerAction::Bet { amount } => {
                if self.current_bet > 0 {
                    return Err(GameError::invalid("bet after a bet; raise instead"));
                }
                self.raise_to(pos, amount)?;
            }
            PokerAction::Raise { amount } => {
                if self.current_bet == 0 {
                    return Err(GameError::invalid("raise with no bet; bet instead"));
                }
                self.raise_to(pos, amount)?;
            }
            PokerAction::AllIn => {
                let target = self.seats[seat_idx].street_bet + self.seats[seat_idx].stack;
                if target > self.current_bet {
                    self.raise_to(pos, target)?;
                } else {
                    self.commit(pos, self.seats[seat_idx].stack);
                    self.acted.insert(user_id);
                }
            }
        }
        self.seats[seat_idx].last_action = Some(action);
        debug_assert_eq!(conserved, self.chips_in_play());

        self.advance_after_action()
    }

    /// Commit up to `amount` chips from the seat's stack onto the street.
    fn commit(&mut self, pos: usize, amount: Chips) {
        let seat = &mut self.seats[self.order[pos]];
        let paid = amount.min(seat.stack);
        seat.stack -= paid;
        seat.street_bet += paid;
        seat.committed += paid;
        if seat.stack == 0 {
            seat.all_in = true;
        }
    }

    /// Raise the street bet to `amount` total. Short all-ins are allowed but
    /// only a full raise reopens the action.
    fn raise_to(&mut self, pos: usize, amount: Chips) -> Result<(), GameError> {
        let seat_idx = self.order[pos];
        let user_id = self.seats[seat_idx].user_id;
        let seat = &self.seats[seat_idx];
        let max_total = seat.street_bet + seat.stack;
        if amount > max_total {
            return Err(GameError::invalid("raise exceeds stack"));
        }
        if amount <= self.current_bet {
            return Err(GameError::invalid("raise must exceed the current bet"));
        }
        let min_total = if self.current_bet == 0 {
            self.big_blind
        } else {
            self.current_bet + self.last_raise
        };
        let is_all_in = amount == max_total;
        if amount < min_total && !is_all_in {
            return Err(GameError::invalid(format!("minimum is {min_total}")));
        }

        let increment = amount - self.current_bet;
        let needed = amount - seat.street_bet;
        self.commit(pos, needed);
        self.current_bet = amount;
        if increment >= self.last_raise {
            // Full raise: everyone gets to respond again.
            self.last_raise = increment;
            self.acted.clear();
        }
        self.acted.insert(user_id);
        Ok(())
    }

    fn round_closed(&self) -> bool {
        for &i in &self.order {
            let seat = &self.seats[i];
            if seat.folded {
                continue;
            }
            if seat.can_act() && !self.acted.contains(&seat.user_id) {
                return false;
            }
            if !seat.all_in && seat.street_bet != self.current_bet {
                return false;
            }
        }
        true
    }

    fn advance_after_action(&mut self) -> Result<PokerUpdate, GameError> {
        let live = self.live_positions();
        if live.len() == 1 {
            return Ok(PokerUpdate::HandComplete(self.award_fold_win(live[0])));
        }
        if !self.round_closed() {
            let from = self.current_pos.map(|p| p + 1).unwrap_or(0) % self.order.len();
            self.current_pos = self.next_can_act_from(from);
            self.turn_started = Utc::now();
            return Ok(PokerUpdate::NextToAct);
        }
        self.advance_street()
    }

    fn open_street(&mut self) {
        self.current_bet = 0;
        self.last_raise = self.big_blind;
        self.acted.clear();
        for &i in &self.order {
            self.seats[i].street_bet = 0;
        }
    }

    fn deal_next_board(&mut self) {
        let count = match self.street {
            Street::Preflop => 3,
            Street::Flop | Street::Turn => 1,
            Street::River | Street::Showdown => 0,
        };
        for _ in 0..count {
            let card = self.deck.deal_card();
            self.board.push(card);
        }
        self.street = match self.street {
            Street::Preflop => Street::Flop,
            Street::Flop => Street::Turn,
            Street::Turn => Street::River,
            Street::River | Street::Showdown => Street::Showdown,
        };
    }

    fn advance_street(&mut self) -> Result<PokerUpdate, GameError> {
        // With one or zero players still able to act the betting is over:
        // run the board out and resolve at showdown.
        if self.can_act_count() <= 1 {
            while self.street != Street::Showdown {
                self.deal_next_board();
            }
            return Ok(PokerUpdate::HandComplete(self.award_showdown()));
        }
        if self.street == Street::River {
            self.street = Street::Showdown;
            return Ok(PokerUpdate::HandComplete(self.award_showdown()));
        }
        self.deal_next_board();
        self.open_street();
        self.current_pos = self.next_can_act_from((self.btn_pos + 1) % self.order.len());
        self.turn_started = Utc::now();
        Ok(PokerUpdate::StreetDealt(self.street))
    }

    // === Resolution ===

    fn award_fold_win(&mut self, winner_pos: usize) -> HandResult {
        let total = self.pot_total();
        let winner_idx = self.order[winner_pos];
        let winner = self.seats[winner_idx].user_id;
        for seat in &mut self.seats {
            seat.committed = 0;
            seat.street_bet = 0;
        }
        self.seats[winner_idx].stack += total;
        self.finish_hand(HandResult {
            payouts: vec![(winner, total)],
            winners: vec![winner],
            showdown: false,
        })
    }

    /// Layered side pots: one pot per distinct live commitment level.
    /// Folded chips flow into the pots but folded players are never eligible.
    fn build_pots(&mut self) {
        let mut levels: Vec<Chips> = self
            .order
            .iter()
            .filter(|&&i| self.seats[i].live())
            .map(|&i| self.seats[i].committed)
            .filter(|&c| c > 0)
            .collect();
        levels.sort_unstable();
        levels.dedup();

        self.pots.clear();
        let mut prev = 0;
        for level in levels {
            let mut amount = 0;
            let mut eligible = Vec::new();
            for &i in &self.order {
                let seat = &self.seats[i];
                let slice = seat.committed.min(level).saturating_sub(prev);
                amount += slice;
                if seat.live() && seat.committed >= level {
                    eligible.push(seat.user_id);
                }
            }
            if amount > 0 {
                self.pots.push(Pot { amount, eligible });
            }
            prev = level;
        }
    }

    fn award_showdown(&mut self) -> HandResult {
        self.build_pots();
        let board = self.board.clone();
        let hand_of = |seat: &PokerSeat| -> Option<HandValue> {
            seat.hole.map(|hole| {
                let mut cards: Vec<Card> = hole.to_vec();
                cards.extend_from_slice(&board);
                eval(&cards)
            })
        };

        let mut payouts: HashMap<UserId, Chips> = HashMap::new();
        let mut main_winners = Vec::new();
        let pots = self.pots.clone();
        for (pot_idx, pot) in pots.iter().enumerate() {
            let contenders: Vec<(usize, HandValue)> = self
                .order
                .iter()
                .map(|&i| &self.seats[i])
                .filter(|s| pot.eligible.contains(&s.user_id))
                .filter_map(|s| hand_of(s).map(|h| (self.seat_of(s.user_id).unwrap_or(0), h)))
                .collect();
            let hands: Vec<HandValue> = contenders.iter().map(|(_, h)| h.clone()).collect();
            let winner_idxs = find_winners(&hands);
            let winners: Vec<usize> = winner_idxs.iter().map(|&w| contenders[w].0).collect();
            if winners.is_empty() {
                continue;
            }
            let share = pot.amount / winners.len() as Chips;
            let mut remainder = pot.amount % winners.len() as Chips;

            // Odd chips go to the earliest seats clockwise from the button.
            let mut ordered = winners.clone();
            let n = self.order.len();
            let dist = |seat_idx: usize| -> usize {
                let pos = self.order.iter().position(|&i| i == seat_idx).unwrap_or(0);
                (pos + n - (self.btn_pos + 1) % n) % n
            };
            ordered.sort_by_key(|&i| dist(i));

            for seat_idx in ordered {
                let mut won = share;
                if remainder > 0 {
                    won += 1;
                    remainder -= 1;
                }
                let user = self.seats[seat_idx].user_id;
                self.seats[seat_idx].stack += won;
                *payouts.entry(user).or_default() += won;
                if pot_idx == 0 {
                    main_winners.push(user);
                }
            }
        }

        for seat in &mut self.seats {
            seat.committed = 0;
            seat.street_bet = 0;
        }

        let mut payouts: Vec<(UserId, Chips)> = payouts.into_iter().collect();
        payouts.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        self.finish_hand(HandResult {
            payouts,
            winners: main_winners,
            showdown: true,
        })
    }

    fn finish_hand(&mut self, result: HandResult) -> HandResult {
        self.hand_active = false;
        self.street = Street::Showdown;
        self.current_pos = None;
        self.last_result = Some(result.clone());
        result
    }

    /// Winner's post-showdown choice to muck or show.
    pub fn set_revealed(&mut self, user_id: UserId, reveal: bool) -> Result<(), GameError> {
        if self.hand_active {
            return Err(GameError::PhaseViolation);
        }
        let Some(result) = &self.last_result else {
            return Err(GameError::PhaseViolation);
        };
        if !result.showdown || !result.winners.contains(&user_id) {
            return Err(GameError::NotAuthorized);
        }
        let idx = self.seat_of(user_id).ok_or(GameError::NotFound)?;
        self.seats[idx].revealed = Some(reveal);
        Ok(())
    }

    fn chips_in_play(&self) -> Chips {
        self.seats.iter().map(|s| s.stack + s.committed).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poker::entities::Suit;
    use crate::rng::seeded_rng;

    fn table_with(players: usize) -> PokerTable {
        let mut table = PokerTable::new(10, 20, 1000, 8);
        for i in 0..players {
            table.add_player(i as UserId + 1).unwrap();
        }
        table
    }

    fn started(players: usize, seed: u64) -> PokerTable {
        let mut table = table_with(players);
        table.start_hand(&mut *seeded_rng(seed)).unwrap();
        table
    }

    #[test]
    fn test_start_requires_two_players() {
        let mut table = table_with(1);
        let err = table.start_hand(&mut *seeded_rng(0)).unwrap_err();
        assert!(matches!(err, GameError::InvalidAction(_)));
    }

    #[test]
    fn test_heads_up_dealer_posts_small_blind_and_acts_first() {
        let table = started(2, 1);
        assert_eq!(table.sb_pos, table.btn_pos);
        assert_eq!(table.current_pos, Some(table.btn_pos));
        let sb_seat = &table.seats[table.order[table.sb_pos]];
        let bb_seat = &table.seats[table.order[table.bb_pos]];
        assert_eq!(sb_seat.street_bet, 10);
        assert_eq!(bb_seat.street_bet, 20);
    }

    #[test]
    fn test_three_handed_blind_positions_and_utg() {
        let table = started(3, 1);
        assert_eq!(table.sb_pos, (table.btn_pos + 1) % 3);
        assert_eq!(table.bb_pos, (table.btn_pos + 2) % 3);
        assert_eq!(table.current_pos, Some((table.bb_pos + 1) % 3));
    }

    #[test]
    fn test_everyone_gets_two_cards() {
        let table = started(4, 2);
        for &i in &table.order {
            let hole = table.seats[i].hole.unwrap();
            assert_ne!(hole[0], hole[1]);
        }
    }

    #[test]
    fn test_check_with_call_owed_rejected() {
        let mut table = started(3, 1);
        let user = table.current_user().unwrap();
        let err = table.apply(user, PokerAction::Check).unwrap_err();
        assert_eq!(err.code(), "invalid_action");
        // State untouched: still that player's turn.
        assert_eq!(table.current_user(), Some(user));
    }

    #[test]
    fn test_out_of_turn_rejected() {
        let mut table = started(3, 1);
        let current = table.current_user().unwrap();
        let other = table
            .seats
            .iter()
            .map(|s| s.user_id)
            .find(|&u| u != current)
            .unwrap();
        let err = table.apply(other, PokerAction::Call).unwrap_err();
        assert_eq!(err, GameError::NotYourTurn);
    }

    #[test]
    fn test_min_raise_enforced() {
        let mut table = started(3, 1);
        let user = table.current_user().unwrap();
        // Current bet 20, last raise 20: raising to 30 is short of 40.
        let err = table.apply(user, PokerAction::Raise { amount: 30 }).unwrap_err();
        assert_eq!(err.code(), "invalid_action");
        assert!(table.apply(user, PokerAction::Raise { amount: 40 }).is_ok());
        assert_eq!(table.current_bet, 40);
        assert_eq!(table.last_raise, 20);
    }

    #[test]
    fn test_full_raise_reopens_action() {
        let mut table = started(3, 1);
        let utg = table.current_user().unwrap();
        table.apply(utg, PokerAction::Call).unwrap();
        let sb = table.current_user().unwrap();
        table.apply(sb, PokerAction::Raise { amount: 60 }).unwrap();
        // Only the raiser counts as acted now.
        assert_eq!(table.acted.len(), 1);
        assert!(table.acted.contains(&sb));
    }

    #[test]
    fn test_fold_win_awards_pot_without_showdown() {
        let mut table = started(2, 3);
        let first = table.current_user().unwrap();
        let stacks_before: Chips = table.seats.iter().map(|s| s.stack).sum();
        let pot = table.pot_total();
        let update = table.apply(first, PokerAction::Fold).unwrap();
        match update {
            PokerUpdate::HandComplete(result) => {
                assert!(!result.showdown);
                assert_eq!(result.payouts.len(), 1);
                assert_eq!(result.payouts[0].1, pot);
            }
            other => panic!("expected hand completion, got {other:?}"),
        }
        let stacks_after: Chips = table.seats.iter().map(|s| s.stack).sum();
        assert_eq!(stacks_after, stacks_before + pot);
        assert!(!table.hand_active);
    }

    #[test]
    fn test_calls_and_checks_advance_to_flop() {
        let mut table = started(3, 1);
        let utg = table.current_user().unwrap();
        table.apply(utg, PokerAction::Call).unwrap();
        let sb = table.current_user().unwrap();
        table.apply(sb, PokerAction::Call).unwrap();
        let bb = table.current_user().unwrap();
        let update = table.apply(bb, PokerAction::Check).unwrap();
        assert_eq!(update, PokerUpdate::StreetDealt(Street::Flop));
        assert_eq!(table.board.len(), 3);
        assert_eq!(table.current_bet, 0);
        // Post-flop action starts left of the button.
        assert_eq!(
            table.current_pos,
            table.next_can_act_from((table.btn_pos + 1) % table.order.len())
        );
    }

    #[test]
    fn test_big_blind_has_option_preflop() {
        let mut table = started(3, 1);
        let utg = table.current_user().unwrap();
        table.apply(utg, PokerAction::Call).unwrap();
        let sb = table.current_user().unwrap();
        table.apply(sb, PokerAction::Call).unwrap();
        // Everyone matched, but the big blind still gets to act.
        let bb_user = table.seats[table.order[table.bb_pos]].user_id;
        assert_eq!(table.current_user(), Some(bb_user));
    }

    #[test]
    fn test_all_in_run_out_reaches_showdown() {
        let mut table = started(2, 5);
        let first = table.current_user().unwrap();
        table.apply(first, PokerAction::AllIn).unwrap();
        let second = table.current_user().unwrap();
        let update = table.apply(second, PokerAction::Call).unwrap();
        match update {
            PokerUpdate::HandComplete(result) => {
                assert!(result.showdown);
                assert_eq!(table.board.len(), 5);
                let total: Chips = result.payouts.iter().map(|(_, c)| c).sum();
                assert_eq!(total, 2000);
            }
            other => panic!("expected showdown, got {other:?}"),
        }
    }

    #[test]
    fn test_chip_conservation_across_hand() {
        let mut table = started(3, 9);
        let before: Chips = table.chips_in_play();
        loop {
            let Some(user) = table.current_user() else { break };
            let action = if table.to_call(user) > 0 {
                PokerAction::Call
            } else {
                PokerAction::Check
            };
            if let PokerUpdate::HandComplete(_) = table.apply(user, action).unwrap() {
                break;
            }
        }
        let after: Chips = table.seats.iter().map(|s| s.stack).sum();
        assert_eq!(before, after);
    }

    #[test]
    fn test_side_pot_layers() {
        let mut table = table_with(3);
        table.start_hand(&mut *seeded_rng(4)).unwrap();
        // Craft commitments: seat order 0,1,2 with committed 25 / 75 / 75,
        // seat 0 all-in short.
        for (pos, committed) in [(0usize, 25u32), (1, 75), (2, 75)] {
            let idx = table.order[pos];
            let seat = &mut table.seats[idx];
            seat.committed = committed;
            seat.street_bet = committed;
        }
        table.seats[table.order[0]].all_in = true;
        table.build_pots();
        assert_eq!(table.pots.len(), 2);
        assert_eq!(table.pots[0].amount, 75);
        assert_eq!(table.pots[0].eligible.len(), 3);
        assert_eq!(table.pots[1].amount, 100);
        assert_eq!(table.pots[1].eligible.len(), 2);
    }

    #[test]
    fn test_folded_chips_feed_pots_but_not_eligibility() {
        let mut table = table_with(3);
        table.start_hand(&mut *seeded_rng(4)).unwrap();
        for (pos, committed) in [(0usize, 50u32), (1, 100), (2, 100)] {
            let idx = table.order[pos];
            let seat = &mut table.seats[idx];
            seat.committed = committed;
            seat.street_bet = committed;
        }
        table.seats[table.order[0]].folded = true;
        table.build_pots();
        assert_eq!(table.pots.len(), 1);
        assert_eq!(table.pots[0].amount, 250);
        assert_eq!(table.pots[0].eligible.len(), 2);
    }

    #[test]
    fn test_split_pot_odd_chip_goes_left_of_button() {
        let mut table = table_with(3);
        table.start_hand(&mut *seeded_rng(4)).unwrap();
        // 201-chip pot: three players committed 67 each, the button folded.
        // The two remaining players hold identical two pair.
        let board = vec![
            Card(13, Suit::Club),
            Card(13, Suit::Diamond),
            Card(8, Suit::Heart),
            Card(8, Suit::Spade),
            Card(2, Suit::Club),
        ];
        table.board = board;
        table.street = Street::River;
        let btn_idx = table.order[table.btn_pos];
        let idx1 = table.order[(table.btn_pos + 1) % 3];
        let idx2 = table.order[(table.btn_pos + 2) % 3];
        for idx in [btn_idx, idx1, idx2] {
            table.seats[idx].committed = 67;
            table.seats[idx].street_bet = 0;
        }
        table.seats[btn_idx].folded = true;
        table.seats[idx1].hole = Some([Card(14, Suit::Club), Card(3, Suit::Diamond)]);
        table.seats[idx2].hole = Some([Card(14, Suit::Diamond), Card(3, Suit::Club)]);
        let stack1 = table.seats[idx1].stack;
        let stack2 = table.seats[idx2].stack;

        let result = table.award_showdown();
        assert_eq!(result.winners.len(), 2);
        // 201 splits 100/100 with the odd chip to the earliest seat
        // clockwise from the button.
        assert_eq!(table.seats[idx1].stack - stack1, 101);
        assert_eq!(table.seats[idx2].stack - stack2, 100);
    }

    #[test]
    fn test_timeout_auto_action() {
        let table = started(3, 1);
        let (user, action) = table.auto_action_for_current().unwrap();
        // UTG owes the big blind: times out into a fold.
        assert_eq!(user, table.current_user().unwrap());
        assert_eq!(action, PokerAction::Fold);
        let later = Utc::now() + Duration::seconds(31);
        assert!(table.turn_expired(later));
        assert!(!table.turn_expired(Utc::now()));
    }

    #[test]
    fn test_reveal_choice_winner_only() {
        let mut table = started(2, 3);
        let first = table.current_user().unwrap();
        let update = table.apply(first, PokerAction::Fold).unwrap();
        let PokerUpdate::HandComplete(result) = update else {
            panic!("expected completion");
        };
        // Fold win: no showdown, so no reveal choice for anyone.
        let err = table.set_revealed(result.winners[0], true).unwrap_err();
        assert_eq!(err, GameError::NotAuthorized);
    }

    #[test]
    fn test_dealer_rotates_between_hands() {
        let mut table = started(3, 1);
        let dealer_first = table.dealer_seat;
        let first = table.current_user().unwrap();
        table.apply(first, PokerAction::Fold).unwrap();
        let second = table.current_user().unwrap();
        table.apply(second, PokerAction::Fold).unwrap();
        assert!(!table.hand_active);
        table.start_hand(&mut *seeded_rng(2)).unwrap();
        assert_ne!(table.dealer_seat, dealer_first);
    }

    #[test]
    fn test_partial_blind_post_sets_all_in() {
        let mut table = table_with(2);
        table.seats[1].stack = 5;
        table.start_hand(&mut *seeded_rng(1)).unwrap();
        assert!(table.hand_active);
        let short = &table.seats[1];
        assert!(short.all_in);
        assert_eq!(short.committed, 5);
    }

    #[test]
    fn test_blinds_consuming_both_stacks_resolve_instantly() {
        let mut table = table_with(2);
        table.seats[0].stack = 8;
        table.seats[1].stack = 5;
        let result = table
            .start_hand(&mut *seeded_rng(1))
            .unwrap()
            .expect("hand must resolve at deal time");
        assert!(result.showdown);
        assert!(!table.hand_active);
        assert_eq!(table.board.len(), 5);
        let total: Chips = table.seats.iter().map(|s| s.stack).sum();
        assert_eq!(total, 13);
    }
}
