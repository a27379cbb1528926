//! Per-lobby actor. One task per lobby owns all of its state; commands are
//! linearized through the inbox, so engine methods never race. A one-second
//! tick drives the poker turn clock.

use chrono::Utc;
use log::{debug, info, warn};
use std::collections::{HashMap, HashSet};
use tokio::sync::mpsc;
use tokio::time::{interval, Duration};
use uuid::Uuid;

use super::messages::{
    LobbyCommand, LobbyHandle, LobbyNotice, LobbyStatus, RewardEvent,
};
use super::{ActiveGame, Celebration, Lobby, Phase, PlayerProfile};
use crate::errors::GameError;
use crate::poker::{PokerAction, PokerTable, PokerUpdate};
use crate::protocol::{ServerEvent, UnoAction};
use crate::rng::LobbyRng;
use crate::types::{ConnectionId, GameKind, UserId};
use crate::uno::{UnoGame, UnoUpdate, UnoUpdateKind};
use crate::view::{snapshot_for, SeatView};

const INBOX_CAPACITY: usize = 64;
const SUBSCRIBER_CAPACITY: usize = 32;

pub struct LobbyActor {
    lobby: Lobby,
    rng: LobbyRng,
    inbox: mpsc::Receiver<LobbyCommand>,
    subscribers: HashMap<UserId, (ConnectionId, mpsc::Sender<ServerEvent>)>,
    /// One-shot event ids already pushed; never emit twice.
    emitted: HashSet<Uuid>,
    rewards: mpsc::UnboundedSender<RewardEvent>,
    notices: mpsc::UnboundedSender<LobbyNotice>,
    games_played: u32,
    closed: bool,
}

impl LobbyActor {
    /// Build the actor and its handle; the caller spawns [`LobbyActor::run`].
    pub fn new(
        lobby: Lobby,
        rng: LobbyRng,
        rewards: mpsc::UnboundedSender<RewardEvent>,
        notices: mpsc::UnboundedSender<LobbyNotice>,
    ) -> (Self, LobbyHandle) {
        let (sender, inbox) = mpsc::channel(INBOX_CAPACITY);
        let handle = LobbyHandle::new(lobby.game_kind, lobby.code.clone(), sender);
        let actor = Self {
            lobby,
            rng,
            inbox,
            subscribers: HashMap::new(),
            emitted: HashSet::new(),
            rewards,
            notices,
            games_played: 0,
            closed: false,
        };
        (actor, handle)
    }

    /// Build and spawn in one step.
    pub fn spawn(
        lobby: Lobby,
        rng: LobbyRng,
        rewards: mpsc::UnboundedSender<RewardEvent>,
        notices: mpsc::UnboundedSender<LobbyNotice>,
    ) -> LobbyHandle {
        let (actor, handle) = Self::new(lobby, rng, rewards, notices);
        tokio::spawn(actor.run());
        handle
    }

    pub async fn run(mut self) {
        info!(
            "lobby {} ({}) starting",
            self.lobby.code, self.lobby.game_kind
        );
        let mut tick = interval(Duration::from_secs(1));
        loop {
            tokio::select! {
                maybe = self.inbox.recv() => match maybe {
                    Some(command) => {
                        self.handle(command);
                        if self.closed {
                            break;
                        }
                    }
                    None => break,
                },
                _ = tick.tick() => self.on_tick(),
            }
        }
        info!("lobby {} ({}) closed", self.lobby.code, self.lobby.game_kind);
    }

    fn handle(&mut self, command: LobbyCommand) {
        match command {
            LobbyCommand::Join {
                user_id,
                profile,
                reply,
            } => {
                let result = self.on_join(user_id, profile);
                let accepted = result.is_ok();
                let snapshot = result.map(|_| snapshot_for(&self.lobby, user_id));
                let _ = reply.send(snapshot);
                if accepted {
                    self.broadcast();
                    self.send_roster();
                }
            }
            LobbyCommand::Leave { user_id, reply } => {
                let result = self.on_leave(user_id, "left", "leaves");
                let accepted = result.is_ok();
                let _ = reply.send(result);
                if accepted {
                    self.broadcast();
                    self.send_roster();
                    self.check_abandoned();
                }
            }
            LobbyCommand::Start { user_id, reply } => {
                let result = self.on_start(user_id);
                let accepted = result.is_ok();
                let _ = reply.send(result);
                if accepted {
                    self.broadcast();
                }
            }
            LobbyCommand::PokerAct {
                user_id,
                action,
                reply,
            } => {
                let result = self.on_poker_act(user_id, action);
                let accepted = result.is_ok();
                let _ = reply.send(result);
                if accepted {
                    self.broadcast();
                }
            }
            LobbyCommand::UnoAct {
                user_id,
                action,
                reply,
            } => {
                let result = self.on_uno_act(user_id, action);
                let accepted = result.is_ok();
                let _ = reply.send(result);
                if accepted {
                    self.broadcast();
                }
            }
            LobbyCommand::RevealCards {
                user_id,
                reveal,
                reply,
            } => {
                let result = self.on_reveal(user_id, reveal);
                let accepted = result.is_ok();
                let _ = reply.send(result);
                if accepted {
                    self.broadcast();
                }
            }
            LobbyCommand::RequestState { user_id, reply } => {
                let result = if self.lobby.seat(user_id).is_some() {
                    Ok(snapshot_for(&self.lobby, user_id))
                } else {
                    Err(GameError::NotFound)
                };
                let _ = reply.send(result);
            }
            LobbyCommand::End { user_id, reply } => {
                let result = self.on_end(user_id);
                let _ = reply.send(result);
            }
            LobbyCommand::Subscribe {
                user_id,
                conn,
                sender,
            } => {
                // Hand the fresh subscriber a snapshot right away.
                let snapshot = snapshot_for(&self.lobby, user_id);
                let _ = sender.try_send(ServerEvent::GameState {
                    state: Box::new(snapshot),
                });
                self.subscribers.insert(user_id, (conn, sender));
            }
            LobbyCommand::Unsubscribe { user_id, conn } => {
                // A newer connection may already own the slot.
                if let Some((owner, _)) = self.subscribers.get(&user_id) {
                    if *owner == conn {
                        self.subscribers.remove(&user_id);
                    }
                }
            }
            LobbyCommand::MarkDisconnected { user_id } => {
                self.on_mark_disconnected(user_id);
                self.broadcast();
            }
            LobbyCommand::FinalizeLeave { user_id } => {
                if self.lobby.seat(user_id).is_some() {
                    let _ = self.on_leave(user_id, "timed_out", "left (connection lost)");
                    self.broadcast();
                    self.send_roster();
                    self.check_abandoned();
                }
            }
            LobbyCommand::Status { reply } => {
                let _ = reply.send(LobbyStatus {
                    game: self.lobby.game_kind,
                    code: self.lobby.code.clone(),
                    player_count: self.lobby.seats.len(),
                    connected_count: self.lobby.connected_count(),
                    phase: self.lobby.phase,
                    max_players: self.lobby.settings.max_players,
                    is_public: self.lobby.is_public,
                });
            }
        }
    }

    // === Command handlers ===

    fn on_join(&mut self, user_id: UserId, profile: PlayerProfile) -> Result<u64, GameError> {
        if let Some(seat) = self.lobby.seat_mut(user_id) {
            // Reconnect path: same identity returns to its seat.
            seat.is_connected = true;
            seat.last_seen = Utc::now();
            if let ActiveGame::Poker(table) = &mut self.lobby.game {
                table.set_connected(user_id, true);
            }
            let nick = self.nick(user_id);
            self.lobby
                .push_log(Some(user_id), "reconnected", format!("{nick} reconnected"));
            return Ok(self.lobby.bump());
        }

        self.lobby.add_seat(user_id, profile)?;
        if let ActiveGame::Poker(table) = &mut self.lobby.game {
            // New players are dealt in from the next hand.
            table.add_player(user_id)?;
        }
        let nick = self.nick(user_id);
        self.lobby
            .push_log(Some(user_id), "joined", format!("{nick} joined"));
        Ok(self.lobby.bump())
    }

    fn on_leave(&mut self, user_id: UserId, kind: &str, verb: &str) -> Result<u64, GameError> {
        if self.lobby.seat(user_id).is_none() {
            return Err(GameError::NotFound);
        }
        let nick = self.nick(user_id);
        if self.lobby.phase == Phase::Playing {
            // Seats are frozen mid-game; the player goes dark instead.
            if let Some(seat) = self.lobby.seat_mut(user_id) {
                seat.is_connected = false;
                seat.last_seen = Utc::now();
            }
            if let ActiveGame::Poker(table) = &mut self.lobby.game {
                table.set_connected(user_id, false);
            }
        } else {
            self.lobby.remove_seat(user_id)?;
            if let ActiveGame::Poker(table) = &mut self.lobby.game {
                let _ = table.remove_player(user_id);
            }
        }
        self.subscribers.remove(&user_id);
        self.lobby
            .push_log(Some(user_id), kind, format!("{nick} {verb}"));
        Ok(self.lobby.bump())
    }

    fn on_start(&mut self, user_id: UserId) -> Result<u64, GameError> {
        if !matches!(self.lobby.phase, Phase::Lobby | Phase::Finished) {
            return Err(GameError::PhaseViolation);
        }
        if self.lobby.seat(user_id).is_none() {
            return Err(GameError::NotFound);
        }
        // Private lobbies start on the host's word; public ones let any
        // seated participant kick things off.
        if !self.lobby.is_public && !self.lobby.is_host(user_id) {
            return Err(GameError::NotAuthorized);
        }
        if self.lobby.connected_count() < 2 {
            return Err(GameError::invalid("need 2+ connected players"));
        }

        let mut instant_result = None;
        match self.lobby.game_kind {
            GameKind::Poker => {
                if !matches!(self.lobby.game, ActiveGame::Poker(_)) {
                    let s = &self.lobby.settings;
                    let mut table =
                        PokerTable::new(s.small_blind, s.big_blind, s.buy_in, s.max_players);
                    table.turn_timeout_secs = s.turn_timeout_secs;
                    self.lobby.game = ActiveGame::Poker(table);
                }
                let roster: Vec<(UserId, bool)> = self
                    .lobby
                    .seats
                    .iter()
                    .map(|s| (s.user_id, s.is_connected))
                    .collect();
                let ActiveGame::Poker(table) = &mut self.lobby.game else {
                    return Err(GameError::Internal);
                };
                for (user, connected) in roster {
                    table.add_player(user)?;
                    table.set_connected(user, connected);
                }
                instant_result = table.start_hand(&mut *self.rng)?;
                self.lobby
                    .push_log(Some(user_id), "hand_started", "new hand dealt");
            }
            GameKind::Uno => {
                let order: Vec<UserId> = self
                    .lobby
                    .seats
                    .iter()
                    .filter(|s| s.is_connected)
                    .map(|s| s.user_id)
                    .collect();
                let dealer = self.games_played as usize % order.len();
                let game = UnoGame::new(order, dealer, &mut *self.rng)?;
                self.lobby.game = ActiveGame::Uno(game);
                self.lobby
                    .push_log(Some(user_id), "game_started", "cards dealt");
            }
        }

        self.games_played += 1;
        self.lobby.phase = Phase::Playing;
        self.lobby.reward_issued = false;
        self.lobby.celebration = None;
        // Blinds can consume every stack; the hand then resolved at deal.
        if let Some(result) = instant_result {
            self.on_poker_complete(result);
        }
        Ok(self.lobby.bump())
    }

    fn on_poker_act(&mut self, user_id: UserId, action: PokerAction) -> Result<u64, GameError> {
        if self.lobby.phase != Phase::Playing {
            return Err(GameError::PhaseViolation);
        }
        let ActiveGame::Poker(table) = &mut self.lobby.game else {
            return Err(GameError::PhaseViolation);
        };
        let update = table.apply(user_id, action)?;
        self.after_poker_update(user_id, action, update);
        Ok(self.lobby.bump())
    }

    fn after_poker_update(&mut self, user_id: UserId, action: PokerAction, update: PokerUpdate) {
        let nick = self.nick(user_id);
        self.lobby
            .push_log(Some(user_id), "poker_action", format!("{nick} {action}"));
        match update {
            PokerUpdate::NextToAct => {}
            PokerUpdate::StreetDealt(street) => {
                self.lobby
                    .push_log(None, "street", format!("{street} dealt"));
            }
            PokerUpdate::HandComplete(result) => self.on_poker_complete(result),
        }
    }

    fn on_poker_complete(&mut self, result: crate::poker::HandResult) {
        self.lobby.phase = Phase::Finished;
        for (user, amount) in &result.payouts {
            let winner_nick = self.nick(*user);
            self.lobby.push_log(
                Some(*user),
                "hand_result",
                format!("{winner_nick} wins {amount}"),
            );
        }
        if let Some(&winner) = result.winners.first() {
            self.lobby.celebration = Some(Celebration {
                id: Uuid::new_v4(),
                winner_id: winner,
                effect_id: "poker_win".to_string(),
                created_at: Utc::now(),
            });
        }
        self.issue_rewards(&result.winners);
        if result.showdown {
            for &winner in &result.winners {
                self.send_to(
                    winner,
                    ServerEvent::ShowdownChoice {
                        code: self.lobby.code.clone(),
                    },
                );
            }
        }
    }

    fn on_uno_act(&mut self, user_id: UserId, action: UnoAction) -> Result<u64, GameError> {
        if self.lobby.phase != Phase::Playing {
            return Err(GameError::PhaseViolation);
        }
        let ActiveGame::Uno(uno) = &mut self.lobby.game else {
            return Err(GameError::PhaseViolation);
        };
        let rng = &mut *self.rng;
        let update = match action {
            UnoAction::Play {
                card_id,
                chosen_color,
            } => uno.play(user_id, card_id, chosen_color, rng)?,
            UnoAction::Draw => uno.draw(user_id, rng)?,
            UnoAction::Pass => uno.pass(user_id)?,
            UnoAction::CallUno => uno.call_uno(user_id)?,
            UnoAction::CatchUno => uno.catch_uno(user_id, rng)?,
        };
        self.after_uno_update(user_id, update);
        Ok(self.lobby.bump())
    }

    fn after_uno_update(&mut self, user_id: UserId, update: UnoUpdate) {
        let nick = self.nick(user_id);
        match &update.kind {
            UnoUpdateKind::Played(face) => {
                self.lobby
                    .push_log(Some(user_id), "uno_play", format!("{nick} plays {face}"));
            }
            UnoUpdateKind::DrewPlayable | UnoUpdateKind::DrewAndPassed => {
                self.lobby
                    .push_log(Some(user_id), "uno_draw", format!("{nick} draws a card"));
            }
            UnoUpdateKind::Passed => {
                self.lobby
                    .push_log(Some(user_id), "uno_pass", format!("{nick} passes"));
            }
            UnoUpdateKind::UnoCalled => {
                self.lobby
                    .push_log(Some(user_id), "uno_called", format!("{nick} calls UNO"));
            }
            UnoUpdateKind::UnoCaught { violator } => {
                let violator_nick = self.nick(*violator);
                self.lobby.push_log(
                    Some(user_id),
                    "uno_caught",
                    format!("{nick} catches {violator_nick} without UNO"),
                );
            }
        }

        for &(player, count) in &update.draws {
            self.send_all(ServerEvent::DrawFx {
                player_id: player,
                count,
            });
        }

        if let Some(winner) = update.winner {
            self.lobby.phase = Phase::Finished;
            let winner_nick = self.nick(winner);
            self.lobby
                .push_log(Some(winner), "uno_won", format!("{winner_nick} wins"));
            self.lobby.celebration = Some(Celebration {
                id: Uuid::new_v4(),
                winner_id: winner,
                effect_id: "uno_win".to_string(),
                created_at: Utc::now(),
            });
            self.issue_rewards(&[winner]);
        }
    }

    fn on_reveal(&mut self, user_id: UserId, reveal: bool) -> Result<u64, GameError> {
        let ActiveGame::Poker(table) = &mut self.lobby.game else {
            return Err(GameError::PhaseViolation);
        };
        table.set_revealed(user_id, reveal)?;
        Ok(self.lobby.bump())
    }

    fn on_end(&mut self, user_id: UserId) -> Result<u64, GameError> {
        if self.lobby.is_public {
            return Err(GameError::NotAuthorized);
        }
        if !self.lobby.is_host(user_id) {
            return Err(GameError::NotAuthorized);
        }
        let version = self.lobby.bump();
        self.close();
        Ok(version)
    }

    fn on_mark_disconnected(&mut self, user_id: UserId) {
        let Some(seat) = self.lobby.seat_mut(user_id) else {
            return;
        };
        seat.is_connected = false;
        seat.last_seen = Utc::now();
        if let ActiveGame::Poker(table) = &mut self.lobby.game {
            table.set_connected(user_id, false);
        }
        let nick = self.nick(user_id);
        self.lobby
            .push_log(Some(user_id), "disconnected", format!("{nick} disconnected"));
        self.lobby.bump();
    }

    fn on_tick(&mut self) {
        let ActiveGame::Poker(table) = &mut self.lobby.game else {
            return;
        };
        if !table.turn_expired(Utc::now()) {
            return;
        }
        let Some((user_id, action)) = table.auto_action_for_current() else {
            return;
        };
        match table.apply(user_id, action) {
            Ok(update) => {
                let nick = self.nick(user_id);
                self.lobby
                    .push_log(Some(user_id), "timed_out", format!("{nick} timed out"));
                self.after_poker_update(user_id, action, update);
                self.lobby.bump();
                self.broadcast();
            }
            Err(err) => warn!(
                "lobby {}: auto action failed: {err}",
                self.lobby.code
            ),
        }
    }

    // === Lifecycle helpers ===

    fn issue_rewards(&mut self, winners: &[UserId]) {
        if self.lobby.reward_issued {
            return;
        }
        self.lobby.reward_issued = true;
        for &winner in winners {
            let _ = self.rewards.send(RewardEvent {
                user_id: winner,
                game: self.lobby.game_kind,
                code: self.lobby.code.clone(),
            });
        }
    }

    fn check_abandoned(&mut self) {
        let abandoned = self.lobby.seats.is_empty()
            || self.lobby.seats.iter().all(|s| !s.is_connected);
        if !abandoned {
            return;
        }
        if self.lobby.is_public {
            debug!("public lobby {} reset", self.lobby.code);
            self.lobby.reset_public();
        } else {
            self.close();
        }
    }

    fn close(&mut self) {
        let members: Vec<UserId> = self.lobby.seats.iter().map(|s| s.user_id).collect();
        self.send_all(ServerEvent::LobbyEnded {
            game: self.lobby.game_kind,
            code: self.lobby.code.clone(),
        });
        let _ = self.notices.send(LobbyNotice::Closed {
            game: self.lobby.game_kind,
            code: self.lobby.code.clone(),
            members,
        });
        self.closed = true;
    }

    // === Broadcast ===

    /// One-shot events first, then a personalized snapshot per subscriber.
    fn broadcast(&mut self) {
        self.flush_one_shots();
        let lobby = &self.lobby;
        self.subscribers.retain(|&user_id, (_, sender)| {
            let snapshot = snapshot_for(lobby, user_id);
            match sender.try_send(ServerEvent::GameState {
                state: Box::new(snapshot),
            }) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!("subscriber {user_id} lagging, dropping snapshot");
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            }
        });
    }

    fn flush_one_shots(&mut self) {
        let Some(celebration) = self.lobby.celebration.clone() else {
            return;
        };
        if !self.emitted.insert(celebration.id) {
            return;
        }
        self.send_all(ServerEvent::Celebration {
            id: celebration.id,
            winner_id: celebration.winner_id,
            effect_id: celebration.effect_id,
        });
    }

    fn send_roster(&mut self) {
        if self.lobby.phase != Phase::Lobby {
            return;
        }
        let players: Vec<SeatView> = self.lobby.seats.iter().map(SeatView::from).collect();
        self.send_all(ServerEvent::Roster {
            code: self.lobby.code.clone(),
            players,
            version: self.lobby.version,
        });
    }

    fn send_all(&self, event: ServerEvent) {
        for (_, (_, sender)) in &self.subscribers {
            let _ = sender.try_send(event.clone());
        }
    }

    fn send_to(&self, user_id: UserId, event: ServerEvent) {
        if let Some((_, sender)) = self.subscribers.get(&user_id) {
            let _ = sender.try_send(event);
        }
    }

    fn nick(&self, user_id: UserId) -> String {
        self.lobby
            .seat(user_id)
            .map(|s| s.nickname.clone())
            .unwrap_or_else(|| user_id.to_string())
    }
}

/// Channel capacity for per-subscriber event queues.
#[must_use]
pub fn subscriber_channel() -> (mpsc::Sender<ServerEvent>, mpsc::Receiver<ServerEvent>) {
    mpsc::channel(SUBSCRIBER_CAPACITY)
}
