//! Wire protocol: client commands, acknowledgements, and server-pushed
//! events. Everything is internally tagged JSON.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::GameError;
use crate::lobby::Phase;
use crate::poker::PokerAction;
use crate::types::{GameKind, UserId};
use crate::uno::{CardId, Color};
use crate::view::{LobbySnapshot, SeatView};

/// UNO action union as sent by clients.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UnoAction {
    Play {
        card_id: CardId,
        chosen_color: Option<Color>,
    },
    Draw,
    Pass,
    CallUno,
    CatchUno,
}

/// Either game's action payload. The poker shape carries an `action` tag,
/// the UNO shape a `type` tag, so untagged deserialization is unambiguous.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PlayerAction {
    Poker(PokerAction),
    Uno(UnoAction),
}

/// Commands accepted over the transport.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    ListRooms {
        game: Option<GameKind>,
    },
    CreateLobby {
        game: GameKind,
    },
    JoinLobby {
        game: GameKind,
        code: String,
    },
    LeaveLobby {
        game: GameKind,
        code: String,
    },
    StartGame {
        game: GameKind,
        code: String,
    },
    Action {
        game: GameKind,
        code: String,
        action: PlayerAction,
    },
    RequestState {
        game: GameKind,
        code: String,
    },
    EndLobby {
        game: GameKind,
        code: String,
    },
    RevealCards {
        code: String,
        reveal: bool,
    },
}

/// Acknowledgement returned for every command. `error` carries the stable
/// code, `reason` the human-readable detail.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Ack {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl Ack {
    #[must_use]
    pub fn ok(version: u64) -> Self {
        Self {
            success: true,
            version: Some(version),
            error: None,
            reason: None,
            code: None,
        }
    }

    /// Success ack that also returns a created lobby code.
    #[must_use]
    pub fn created(version: u64, code: String) -> Self {
        Self {
            success: true,
            version: Some(version),
            error: None,
            reason: None,
            code: Some(code),
        }
    }

    #[must_use]
    pub fn err(error: &GameError) -> Self {
        Self {
            success: false,
            version: None,
            error: Some(error.code().to_string()),
            reason: Some(error.to_string()),
            code: None,
        }
    }
}

impl From<Result<u64, GameError>> for Ack {
    fn from(result: Result<u64, GameError>) -> Self {
        match result {
            Ok(version) => Self::ok(version),
            Err(error) => Self::err(&error),
        }
    }
}

/// One row of the public-room catalog.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct RoomInfo {
    pub game: GameKind,
    pub code: String,
    pub player_count: usize,
    pub status: Phase,
    pub max_players: usize,
}

/// Events pushed by the server outside the request/reply cycle.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServerEvent {
    GameState {
        state: Box<LobbySnapshot>,
    },
    Celebration {
        id: Uuid,
        winner_id: UserId,
        effect_id: String,
    },
    /// Card-draw effect; carries a count and never a face.
    DrawFx {
        player_id: UserId,
        count: usize,
    },
    /// Lobby-phase roster update.
    Roster {
        code: String,
        players: Vec<SeatView>,
        version: u64,
    },
    LobbyEnded {
        game: GameKind,
        code: String,
    },
    /// Winner-only prompt to show or muck after a showdown.
    ShowdownChoice {
        code: String,
    },
}
