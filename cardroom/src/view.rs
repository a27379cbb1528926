//! Per-viewer state projection.
//!
//! Every broadcast snapshot is built for one viewer: their own cards are
//! visible, everyone else's are hidden or reduced to counts. Poker hole
//! cards surface only at a showdown (subject to the winner's muck choice);
//! opponent UNO hands become placeholder entries with synthetic ids so the
//! wire shape survives without leaking faces.

use serde::{Deserialize, Serialize};

use crate::lobby::{ActionLogEntry, ActiveGame, Celebration, Lobby, Phase, Seat};
use crate::poker::{Card, PokerAction, PokerTable, Street};
use crate::types::{Chips, Cosmetics, GameKind, SeatIndex, UserId};
use crate::uno::{CardId, Color, Face, UnoGame, UnoPrompt};

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct SeatView {
    pub user_id: UserId,
    pub seat_idx: SeatIndex,
    pub nickname: String,
    pub avatar: Option<String>,
    pub is_connected: bool,
    pub cosmetics: Cosmetics,
}

impl From<&Seat> for SeatView {
    fn from(seat: &Seat) -> Self {
        Self {
            user_id: seat.user_id,
            seat_idx: seat.seat_idx,
            nickname: seat.nickname.clone(),
            avatar: seat.avatar.clone(),
            is_connected: seat.is_connected,
            cosmetics: seat.cosmetics.clone(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct LobbySnapshot {
    pub game: GameKind,
    pub code: String,
    pub host: UserId,
    pub phase: Phase,
    pub version: u64,
    pub is_public: bool,
    pub max_players: usize,
    pub players: Vec<SeatView>,
    pub log: Vec<ActionLogEntry>,
    pub celebration: Option<Celebration>,
    pub state: Option<GameSnapshot>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(tag = "game_state", rename_all = "snake_case")]
pub enum GameSnapshot {
    Poker(PokerSnapshot),
    Uno(UnoSnapshot),
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct PokerSeatView {
    pub user_id: UserId,
    pub stack: Chips,
    pub street_bet: Chips,
    pub folded: bool,
    pub all_in: bool,
    pub last_action: Option<PokerAction>,
    /// Present for the viewer's own seat and at showdown for unmucked hands.
    pub hole: Option<[Card; 2]>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct PokerSnapshot {
    pub street: Street,
    pub hand_active: bool,
    pub hand_no: u32,
    pub board: Vec<Card>,
    pub pot_total: Chips,
    /// Individual pot amounts, populated at showdown.
    pub pots: Vec<Chips>,
    pub current_bet: Chips,
    pub min_raise_to: Chips,
    pub dealer: Option<UserId>,
    pub current: Option<UserId>,
    pub turn_timeout_secs: u64,
    pub seats: Vec<PokerSeatView>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct UnoCardView {
    pub id: CardId,
    /// `None` for opponents' cards: a placeholder with a synthetic id.
    pub face: Option<Face>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct UnoPlayerView {
    pub user_id: UserId,
    pub cards: Vec<UnoCardView>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct UnoSnapshot {
    pub top: Option<Face>,
    pub current_color: Option<Color>,
    pub direction: i8,
    pub current: UserId,
    pub draw_pile_count: usize,
    pub discard_count: usize,
    pub must_call_uno: Option<UserId>,
    pub prompt: Option<UnoPrompt>,
    /// Set only on the drawer's own snapshot.
    pub drawn_playable: Option<CardId>,
    pub winner: Option<UserId>,
    pub hands: Vec<UnoPlayerView>,
}

/// Build the personalized snapshot for `viewer`.
#[must_use]
pub fn snapshot_for(lobby: &Lobby, viewer: UserId) -> LobbySnapshot {
    let state = match &lobby.game {
        ActiveGame::Idle => None,
        ActiveGame::Poker(table) => Some(GameSnapshot::Poker(poker_snapshot(table, viewer))),
        ActiveGame::Uno(game) => Some(GameSnapshot::Uno(uno_snapshot(game, viewer))),
    };
    LobbySnapshot {
        game: lobby.game_kind,
        code: lobby.code.clone(),
        host: lobby.host,
        phase: lobby.phase,
        version: lobby.version,
        is_public: lobby.is_public,
        max_players: lobby.settings.max_players,
        players: lobby.seats.iter().map(SeatView::from).collect(),
        log: lobby.log_tail(),
        celebration: lobby.celebration.clone(),
        state,
    }
}

fn poker_snapshot(table: &PokerTable, viewer: UserId) -> PokerSnapshot {
    // Hole cards of others stay hidden until a real showdown, and a winner
    // may still muck afterwards.
    let showdown_reveal = !table.hand_active
        && table
            .last_result
            .as_ref()
            .map(|r| r.showdown)
            .unwrap_or(false);

    let seats = table
        .seats
        .iter()
        .map(|seat| {
            let own = seat.user_id == viewer;
            let exposed =
                showdown_reveal && seat.live() && seat.revealed != Some(false);
            PokerSeatView {
                user_id: seat.user_id,
                stack: seat.stack,
                street_bet: seat.street_bet,
                folded: seat.folded,
                all_in: seat.all_in,
                last_action: seat.last_action,
                hole: if own || exposed { seat.hole } else { None },
            }
        })
        .collect();

    PokerSnapshot {
        street: table.street,
        hand_active: table.hand_active,
        hand_no: table.hand_no,
        board: table.board.clone(),
        pot_total: table.pot_total(),
        pots: table.pots.iter().map(|p| p.amount).collect(),
        current_bet: table.current_bet,
        min_raise_to: table.current_bet + table.last_raise,
        dealer: table
            .order
            .get(table.btn_pos)
            .map(|&i| table.seats[i].user_id),
        current: table.current_user(),
        turn_timeout_secs: table.turn_timeout_secs,
        seats,
    }
}

fn uno_snapshot(game: &UnoGame, viewer: UserId) -> UnoSnapshot {
    let hands = game
        .order
        .iter()
        .map(|&user| {
            let cards = game
                .hands
                .get(&user)
                .map(|hand| {
                    hand.iter()
                        .map(|card| {
                            if user == viewer {
                                UnoCardView {
                                    id: card.id,
                                    face: Some(card.face),
                                }
                            } else {
                                UnoCardView {
                                    id: CardId::new(),
                                    face: None,
                                }
                            }
                        })
                        .collect()
                })
                .unwrap_or_default();
            UnoPlayerView { user_id: user, cards }
        })
        .collect();

    UnoSnapshot {
        top: game.top_face(),
        current_color: game.current_color,
        direction: game.direction,
        current: game.current_user(),
        draw_pile_count: game.draw_pile.len(),
        discard_count: game.discard.len(),
        must_call_uno: game.must_call_uno,
        prompt: game.prompt.clone(),
        drawn_playable: match game.drawn_playable {
            Some((user, card)) if user == viewer => Some(card),
            _ => None,
        },
        winner: game.winner,
        hands,
    }
}
