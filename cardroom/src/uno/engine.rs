//! Authoritative UNO game state machine.
//!
//! One `UnoGame` is created per started game and dropped when the lobby
//! returns to the lobby phase. The lobby actor serializes access, owns the
//! RNG, and turns updates into broadcasts and FX events.

use chrono::{DateTime, Utc};
use log::debug;
use rand::{seq::SliceRandom, Rng, RngCore};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::entities::{is_playable, CardId, Color, Face, UnoCard};
use crate::errors::GameError;
use crate::types::UserId;

/// How many times the opening flip re-draws a wild before giving up.
const START_CARD_RETRIES: usize = 20;

/// Challenge button placement broadcast with the must-call-UNO prompt, in
/// percent units so every client renders the same target.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct ButtonPos {
    pub x: u8,
    pub y: u8,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct UnoPrompt {
    pub target: UserId,
    pub button_pos: ButtonPos,
    pub created_at: DateTime<Utc>,
}

/// What an accepted UNO action did.
#[derive(Clone, Debug, PartialEq)]
pub struct UnoUpdate {
    pub kind: UnoUpdateKind,
    /// Draw FX per player: (who, how many). Faces never leave the engine here.
    pub draws: Vec<(UserId, usize)>,
    pub winner: Option<UserId>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum UnoUpdateKind {
    Played(Face),
    DrewPlayable,
    DrewAndPassed,
    Passed,
    UnoCalled,
    UnoCaught { violator: UserId },
}

#[derive(Debug, Deserialize, Serialize)]
pub struct UnoGame {
    /// Turn order, fixed at deal time from the lobby roster.
    pub order: Vec<UserId>,
    pub hands: HashMap<UserId, Vec<UnoCard>>,
    pub draw_pile: Vec<UnoCard>,
    pub discard: Vec<UnoCard>,
    pub current_color: Option<Color>,
    /// +1 clockwise, -1 counter-clockwise.
    pub direction: i8,
    pub current_idx: usize,
    pub dealer_idx: usize,
    pub drawn_playable: Option<(UserId, CardId)>,
    pub must_call_uno: Option<UserId>,
    pub prompt: Option<UnoPrompt>,
    pub winner: Option<UserId>,
}

impl UnoGame {
    /// Deal seven cards to each player and flip the starting discard,
    /// applying its effect as if the dealer had played it.
    pub fn new(
        order: Vec<UserId>,
        dealer_idx: usize,
        rng: &mut (dyn RngCore + Send),
    ) -> Result<Self, GameError> {
        if order.len() < 2 {
            return Err(GameError::invalid("need 2+ players"));
        }
        let mut draw_pile = super::entities::build_deck(rng);
        let mut hands: HashMap<UserId, Vec<UnoCard>> = HashMap::new();
        for &user in &order {
            let at = draw_pile.len() - 7;
            hands.insert(user, draw_pile.split_off(at));
        }

        let mut game = Self {
            current_idx: (dealer_idx + 1) % order.len(),
            order,
            hands,
            draw_pile,
            discard: Vec::with_capacity(108),
            current_color: None,
            direction: 1,
            dealer_idx,
            drawn_playable: None,
            must_call_uno: None,
            prompt: None,
            winner: None,
        };

        // Wild starters go back into the pile and the pile is reshuffled.
        let mut starter = None;
        for _ in 0..START_CARD_RETRIES {
            let card = match game.draw_pile.pop() {
                Some(card) => card,
                None => break,
            };
            if card.face.is_wild() {
                game.draw_pile.push(card);
                game.draw_pile.shuffle(rng);
            } else {
                starter = Some(card);
                break;
            }
        }
        if let Some(card) = starter {
            game.current_color = card.face.color();
            game.discard.push(card);
            game.apply_effect(game.dealer_idx, card.face, rng);
            debug!("uno game opened on {}", card.face);
        }
        Ok(game)
    }

    // === Queries ===

    #[must_use]
    pub fn current_user(&self) -> UserId {
        self.order[self.current_idx]
    }

    #[must_use]
    pub fn top_face(&self) -> Option<Face> {
        self.discard.last().map(|c| c.face)
    }

    #[must_use]
    pub fn hand_len(&self, user: UserId) -> usize {
        self.hands.get(&user).map(Vec::len).unwrap_or(0)
    }

    #[must_use]
    pub fn total_cards(&self) -> usize {
        self.hands.values().map(Vec::len).sum::<usize>() + self.draw_pile.len() + self.discard.len()
    }

    /// Server-side playability, including the Wild4 hand restriction.
    #[must_use]
    pub fn playable_for(&self, user: UserId, face: Face) -> bool {
        // An unavoidable wild opener leaves no active color; everything goes.
        if self.current_color.is_none() && self.discard.is_empty() {
            return true;
        }
        if !is_playable(face, self.top_face(), self.current_color) {
            return false;
        }
        if matches!(face, Face::Wild4) {
            return !self.holds_current_color(user);
        }
        true
    }

    fn holds_current_color(&self, user: UserId) -> bool {
        let Some(color) = self.current_color else {
            return false;
        };
        self.hands
            .get(&user)
            .map(|hand| hand.iter().any(|c| c.face.color() == Some(color)))
            .unwrap_or(false)
    }

    fn has_playable_card(&self, user: UserId) -> bool {
        self.hands
            .get(&user)
            .map(|hand| hand.iter().any(|c| self.playable_for(user, c.face)))
            .unwrap_or(false)
    }

    fn idx_of(&self, user: UserId) -> Option<usize> {
        self.order.iter().position(|&u| u == user)
    }

    fn step(&self, from: usize, steps: usize) -> usize {
        let n = self.order.len() as isize;
        (from as isize + self.direction as isize * steps as isize).rem_euclid(n) as usize
    }

    fn ensure_running(&self) -> Result<(), GameError> {
        if self.winner.is_some() {
            return Err(GameError::PhaseViolation);
        }
        Ok(())
    }

    fn ensure_turn(&self, user: UserId) -> Result<(), GameError> {
        self.idx_of(user).ok_or(GameError::NotFound)?;
        if self.current_user() != user {
            return Err(GameError::NotYourTurn);
        }
        Ok(())
    }

    /// Any accepted play/draw/pass closes the catch window.
    fn clear_uno_window(&mut self) {
        self.must_call_uno = None;
        self.prompt = None;
    }

    // === Actions ===

    pub fn play(
        &mut self,
        user: UserId,
        card_id: CardId,
        chosen_color: Option<Color>,
        rng: &mut (dyn RngCore + Send),
    ) -> Result<UnoUpdate, GameError> {
        self.ensure_running()?;
        self.ensure_turn(user)?;
        if let Some((drawer, drawn_id)) = self.drawn_playable {
            if drawer == user && drawn_id != card_id {
                return Err(GameError::invalid("play the drawn card or pass"));
            }
        }

        let hand = self.hands.get(&user).ok_or(GameError::NotFound)?;
        let pos = hand
            .iter()
            .position(|c| c.id == card_id)
            .ok_or(GameError::NotFound)?;
        let face = hand[pos].face;

        if face.is_wild() && chosen_color.is_none() {
            return Err(GameError::invalid("wild needs a color"));
        }
        if matches!(face, Face::Wild4) && self.holds_current_color(user) {
            return Err(GameError::invalid(
                "wild draw four with the current color in hand",
            ));
        }
        if !self.playable_for(user, face) {
            return Err(GameError::invalid("card does not match the discard"));
        }

        // Validation done; mutate.
        let card = self.hands.get_mut(&user).map(|h| h.remove(pos)).ok_or(GameError::Internal)?;
        self.discard.push(card);
        // Only a wild carries the chosen color; printed cards keep their own.
        self.current_color = if face.is_wild() {
            chosen_color
        } else {
            face.color()
        };
        self.drawn_playable = None;
        self.clear_uno_window();

        let remaining = self.hand_len(user);
        if remaining == 0 {
            self.winner = Some(user);
            return Ok(UnoUpdate {
                kind: UnoUpdateKind::Played(face),
                draws: Vec::new(),
                winner: Some(user),
            });
        }
        if remaining == 1 {
            self.must_call_uno = Some(user);
            self.prompt = Some(UnoPrompt {
                target: user,
                button_pos: ButtonPos {
                    x: rng.gen_range(15..=85),
                    y: rng.gen_range(20..=75),
                },
                created_at: Utc::now(),
            });
        }

        let actor_idx = self.idx_of(user).unwrap_or(self.current_idx);
        let draws = self.apply_effect(actor_idx, face, rng);
        Ok(UnoUpdate {
            kind: UnoUpdateKind::Played(face),
            draws,
            winner: None,
        })
    }

    pub fn draw(
        &mut self,
        user: UserId,
        rng: &mut (dyn RngCore + Send),
    ) -> Result<UnoUpdate, GameError> {
        self.ensure_running()?;
        self.ensure_turn(user)?;
        if matches!(self.drawn_playable, Some((u, _)) if u == user) {
            return Err(GameError::invalid("already drew; play it or pass"));
        }
        if self.has_playable_card(user) {
            return Err(GameError::invalid("a playable card is in hand"));
        }

        self.clear_uno_window();
        let drawn = self.draw_n(user, 1, rng);
        let drawn_card = drawn
            .first()
            .copied()
            .and_then(|id| {
                self.hands
                    .get(&user)
                    .and_then(|h| h.iter().find(|c| c.id == id).copied())
            });

        if let Some(card) = drawn_card {
            if self.playable_for(user, card.face) {
                self.drawn_playable = Some((user, card.id));
                return Ok(UnoUpdate {
                    kind: UnoUpdateKind::DrewPlayable,
                    draws: vec![(user, 1)],
                    winner: None,
                });
            }
        }
        let count = drawn.len();
        self.current_idx = self.step(self.current_idx, 1);
        Ok(UnoUpdate {
            kind: UnoUpdateKind::DrewAndPassed,
            draws: if count > 0 { vec![(user, count)] } else { Vec::new() },
            winner: None,
        })
    }

    pub fn pass(&mut self, user: UserId) -> Result<UnoUpdate, GameError> {
        self.ensure_running()?;
        self.ensure_turn(user)?;
        if !matches!(self.drawn_playable, Some((u, _)) if u == user) {
            return Err(GameError::invalid("nothing drawn to pass on"));
        }
        self.drawn_playable = None;
        self.clear_uno_window();
        self.current_idx = self.step(self.current_idx, 1);
        Ok(UnoUpdate {
            kind: UnoUpdateKind::Passed,
            draws: Vec::new(),
            winner: None,
        })
    }

    /// Turn-independent: the mandated player declares UNO.
    pub fn call_uno(&mut self, user: UserId) -> Result<UnoUpdate, GameError> {
        self.ensure_running()?;
        self.idx_of(user).ok_or(GameError::NotFound)?;
        if self.must_call_uno != Some(user) {
            return Err(GameError::invalid("no UNO to call"));
        }
        self.clear_uno_window();
        Ok(UnoUpdate {
            kind: UnoUpdateKind::UnoCalled,
            draws: Vec::new(),
            winner: None,
        })
    }

    /// Turn-independent: an opponent catches the mandated player. The
    /// violator draws two penalty cards.
    pub fn catch_uno(
        &mut self,
        user: UserId,
        rng: &mut (dyn RngCore + Send),
    ) -> Result<UnoUpdate, GameError> {
        self.ensure_running()?;
        self.idx_of(user).ok_or(GameError::NotFound)?;
        let violator = match self.must_call_uno {
            Some(target) if target != user => target,
            _ => return Err(GameError::invalid("nobody to catch")),
        };
        self.clear_uno_window();
        let drawn = self.draw_n(violator, 2, rng);
        Ok(UnoUpdate {
            kind: UnoUpdateKind::UnoCaught { violator },
            draws: if drawn.is_empty() {
                Vec::new()
            } else {
                vec![(violator, drawn.len())]
            },
            winner: None,
        })
    }

    // === Internals ===

    /// Move up to `n` cards from the draw pile into `user`'s hand, reshuffling
    /// the discard under its top card when the pile runs dry. Returns the ids
    /// actually drawn (possibly fewer than requested).
    fn draw_n(&mut self, user: UserId, n: usize, rng: &mut (dyn RngCore + Send)) -> Vec<CardId> {
        let mut drawn = Vec::with_capacity(n);
        for _ in 0..n {
            if self.draw_pile.is_empty() {
                self.refill_draw_pile(rng);
            }
            let Some(card) = self.draw_pile.pop() else {
                break;
            };
            drawn.push(card.id);
            if let Some(hand) = self.hands.get_mut(&user) {
                hand.push(card);
            }
        }
        drawn
    }

    fn refill_draw_pile(&mut self, rng: &mut (dyn RngCore + Send)) {
        if self.discard.len() <= 1 {
            return;
        }
        let top = self.discard.pop();
        self.draw_pile.append(&mut self.discard);
        if let Some(top) = top {
            self.discard.push(top);
        }
        self.draw_pile.shuffle(rng);
        debug!("draw pile refilled with {} cards", self.draw_pile.len());
    }

    /// Advance the turn and apply the card's effect from `actor_idx`.
    fn apply_effect(
        &mut self,
        actor_idx: usize,
        face: Face,
        rng: &mut (dyn RngCore + Send),
    ) -> Vec<(UserId, usize)> {
        let mut draws = Vec::new();
        match face {
            Face::Skip { .. } => {
                self.current_idx = self.step(actor_idx, 2);
            }
            Face::Reverse { .. } => {
                self.direction = -self.direction;
                self.current_idx = if self.order.len() == 2 {
                    actor_idx
                } else {
                    self.step(actor_idx, 1)
                };
            }
            Face::Draw2 { .. } => {
                let target = self.order[self.step(actor_idx, 1)];
                let got = self.draw_n(target, 2, rng).len();
                if got > 0 {
                    draws.push((target, got));
                }
                self.current_idx = self.step(actor_idx, 2);
            }
            Face::Wild4 => {
                let target = self.order[self.step(actor_idx, 1)];
                let got = self.draw_n(target, 4, rng).len();
                if got > 0 {
                    draws.push((target, got));
                }
                self.current_idx = self.step(actor_idx, 2);
            }
            Face::Number { .. } | Face::Wild => {
                self.current_idx = self.step(actor_idx, 1);
            }
        }
        draws
    }
}
