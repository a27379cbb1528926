//! Common lobby state shared by both games: code, roster, phase, version,
//! action log, and celebration bookkeeping. Game rules live in the engines;
//! the actor in [`actor`] serializes everything.

pub mod actor;
pub mod config;
pub mod messages;
pub mod registry;

use chrono::{DateTime, Utc};
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use uuid::Uuid;

use crate::poker::PokerTable;
use crate::types::{Cosmetics, GameKind, SeatIndex, UserId};
use crate::uno::UnoGame;
use config::LobbySettings;

/// Alphabet for private lobby codes.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
pub const CODE_LEN: usize = 6;

/// Retained action-log entries per lobby.
pub const LOG_CAP: usize = 200;
/// Entries projected onto the wire.
pub const LOG_WIRE_TAIL: usize = 40;

/// Fixed codes for the always-on public lobbies.
pub const POKER_PUBLIC_CODES: [&str; 3] = ["POKER_PUBLIC_1", "POKER_PUBLIC_2", "POKER_PUBLIC_3"];
pub const UNO_PUBLIC_CODES: [&str; 3] = ["UNO_PUBLIC_1", "UNO_PUBLIC_2", "UNO_PUBLIC_3"];

/// Generate a 6-character lobby code from A-Z0-9.
#[must_use]
pub fn generate_code(rng: &mut (dyn RngCore + Send)) -> String {
    (0..CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Lobby,
    Playing,
    Finished,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Lobby => "lobby",
            Self::Playing => "playing",
            Self::Finished => "finished",
        };
        write!(f, "{repr}")
    }
}

/// Profile data resolved by the transport layer at join time.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct PlayerProfile {
    pub nickname: String,
    pub avatar: Option<String>,
    pub cosmetics: Cosmetics,
}

/// A roster entry. Game-specific per-player state lives in the engines.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Seat {
    pub user_id: UserId,
    pub seat_idx: SeatIndex,
    pub nickname: String,
    pub avatar: Option<String>,
    pub is_connected: bool,
    pub last_seen: DateTime<Utc>,
    pub cosmetics: Cosmetics,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ActionLogEntry {
    pub seq: u64,
    pub at: DateTime<Utc>,
    pub actor: Option<UserId>,
    /// Stable machine tag, e.g. `uno_caught`, `hand_result`.
    pub kind: String,
    pub message: String,
}

/// One-shot celebration payload; `id` keys broadcast dedupe.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Celebration {
    pub id: Uuid,
    pub winner_id: UserId,
    pub effect_id: String,
    pub created_at: DateTime<Utc>,
}

/// The running game, if any. Poker tables persist across hands so stacks
/// survive; UNO games are rebuilt per start.
#[derive(Debug)]
pub enum ActiveGame {
    Idle,
    Poker(PokerTable),
    Uno(UnoGame),
}

#[derive(Debug)]
pub struct Lobby {
    pub game_kind: GameKind,
    pub code: String,
    pub host: UserId,
    pub seats: Vec<Seat>,
    pub phase: Phase,
    pub is_public: bool,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub settings: LobbySettings,
    pub log: VecDeque<ActionLogEntry>,
    log_seq: u64,
    pub reward_issued: bool,
    pub celebration: Option<Celebration>,
    pub game: ActiveGame,
}

impl Lobby {
    #[must_use]
    pub fn new(
        game_kind: GameKind,
        code: String,
        host: UserId,
        is_public: bool,
        settings: LobbySettings,
    ) -> Self {
        let now = Utc::now();
        Self {
            game_kind,
            code,
            host,
            seats: Vec::new(),
            phase: Phase::Lobby,
            is_public,
            version: 0,
            created_at: now,
            updated_at: now,
            settings,
            log: VecDeque::with_capacity(LOG_CAP),
            log_seq: 0,
            reward_issued: false,
            celebration: None,
            game: ActiveGame::Idle,
        }
    }

    /// Every observable mutation goes through here.
    pub fn bump(&mut self) -> u64 {
        self.version += 1;
        self.updated_at = Utc::now();
        self.version
    }

    pub fn push_log(
        &mut self,
        actor: Option<UserId>,
        kind: &str,
        message: impl Into<String>,
    ) {
        self.log_seq += 1;
        if self.log.len() == LOG_CAP {
            self.log.pop_front();
        }
        self.log.push_back(ActionLogEntry {
            seq: self.log_seq,
            at: Utc::now(),
            actor,
            kind: kind.to_string(),
            message: message.into(),
        });
    }

    #[must_use]
    pub fn seat(&self, user_id: UserId) -> Option<&Seat> {
        self.seats.iter().find(|s| s.user_id == user_id)
    }

    #[must_use]
    pub fn seat_mut(&mut self, user_id: UserId) -> Option<&mut Seat> {
        self.seats.iter_mut().find(|s| s.user_id == user_id)
    }

    #[must_use]
    pub fn connected_count(&self) -> usize {
        self.seats.iter().filter(|s| s.is_connected).count()
    }

    #[must_use]
    pub fn is_host(&self, user_id: UserId) -> bool {
        self.host == user_id
    }

    /// Add a seat at the next dense index.
    pub fn add_seat(&mut self, user_id: UserId, profile: PlayerProfile) -> Result<(), crate::errors::GameError> {
        if self.seat(user_id).is_some() {
            return Ok(());
        }
        if self.seats.len() >= self.settings.max_players {
            return Err(crate::errors::GameError::Capacity);
        }
        self.seats.push(Seat {
            user_id,
            seat_idx: self.seats.len(),
            nickname: profile.nickname,
            avatar: profile.avatar,
            is_connected: true,
            last_seen: Utc::now(),
            cosmetics: profile.cosmetics,
        });
        Ok(())
    }

    /// Remove a seat and re-densify indices. Only legal in lobby phase;
    /// mid-game departures keep the seat and drop the connection flag.
    pub fn remove_seat(&mut self, user_id: UserId) -> Result<(), crate::errors::GameError> {
        let before = self.seats.len();
        self.seats.retain(|s| s.user_id != user_id);
        if self.seats.len() == before {
            return Err(crate::errors::GameError::NotFound);
        }
        for (i, seat) in self.seats.iter_mut().enumerate() {
            seat.seat_idx = i;
        }
        if self.host == user_id {
            if let Some(next) = self.seats.first() {
                self.host = next.user_id;
            }
        }
        Ok(())
    }

    /// Wipe a public lobby back to an empty lobby phase with a fresh version.
    pub fn reset_public(&mut self) {
        debug_assert!(self.is_public);
        self.seats.clear();
        self.phase = Phase::Lobby;
        self.game = ActiveGame::Idle;
        self.celebration = None;
        self.reward_issued = false;
        self.log.clear();
        self.bump();
    }

    /// Wire projection of the log: the most recent entries only.
    #[must_use]
    pub fn log_tail(&self) -> Vec<ActionLogEntry> {
        self.log
            .iter()
            .rev()
            .take(LOG_WIRE_TAIL)
            .rev()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::seeded_rng;

    fn lobby() -> Lobby {
        Lobby::new(
            GameKind::Uno,
            "ABC123".to_string(),
            1,
            false,
            LobbySettings::default(),
        )
    }

    fn profile(name: &str) -> PlayerProfile {
        PlayerProfile {
            nickname: name.to_string(),
            ..PlayerProfile::default()
        }
    }

    #[test]
    fn test_generated_codes_are_six_chars_from_alphabet() {
        let mut rng = seeded_rng(1);
        for _ in 0..50 {
            let code = generate_code(&mut *rng);
            assert_eq!(code.len(), CODE_LEN);
            assert!(code
                .bytes()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit()));
        }
    }

    #[test]
    fn test_version_strictly_increases() {
        let mut lobby = lobby();
        let v1 = lobby.bump();
        let v2 = lobby.bump();
        assert!(v2 > v1);
    }

    #[test]
    fn test_seat_indices_stay_dense_after_removal() {
        let mut lobby = lobby();
        for user in 1..=4 {
            lobby.add_seat(user, profile(&format!("p{user}"))).unwrap();
        }
        lobby.remove_seat(2).unwrap();
        let idxs: Vec<usize> = lobby.seats.iter().map(|s| s.seat_idx).collect();
        assert_eq!(idxs, vec![0, 1, 2]);
    }

    #[test]
    fn test_capacity_enforced() {
        let mut lobby = lobby();
        lobby.settings.max_players = 2;
        lobby.add_seat(1, profile("a")).unwrap();
        lobby.add_seat(2, profile("b")).unwrap();
        let err = lobby.add_seat(3, profile("c")).unwrap_err();
        assert_eq!(err, crate::errors::GameError::Capacity);
    }

    #[test]
    fn test_rejoin_is_idempotent() {
        let mut lobby = lobby();
        lobby.add_seat(1, profile("a")).unwrap();
        lobby.add_seat(1, profile("a")).unwrap();
        assert_eq!(lobby.seats.len(), 1);
    }

    #[test]
    fn test_host_migrates_on_removal() {
        let mut lobby = lobby();
        lobby.add_seat(1, profile("a")).unwrap();
        lobby.add_seat(2, profile("b")).unwrap();
        lobby.remove_seat(1).unwrap();
        assert_eq!(lobby.host, 2);
    }

    #[test]
    fn test_log_bounded_and_tail_projected() {
        let mut lobby = lobby();
        for i in 0..(LOG_CAP + 30) {
            lobby.push_log(None, "note", format!("entry {i}"));
        }
        assert_eq!(lobby.log.len(), LOG_CAP);
        let tail = lobby.log_tail();
        assert_eq!(tail.len(), LOG_WIRE_TAIL);
        // Sequence numbers keep counting past the cap.
        assert_eq!(tail.last().unwrap().seq, (LOG_CAP + 30) as u64);
    }

    #[test]
    fn test_public_reset_clears_state_and_bumps_version() {
        let mut lobby = Lobby::new(
            GameKind::Poker,
            POKER_PUBLIC_CODES[0].to_string(),
            1,
            true,
            LobbySettings::default(),
        );
        lobby.add_seat(1, profile("a")).unwrap();
        lobby.phase = Phase::Playing;
        let v = lobby.version;
        lobby.reset_public();
        assert!(lobby.seats.is_empty());
        assert_eq!(lobby.phase, Phase::Lobby);
        assert!(lobby.version > v);
    }
}
