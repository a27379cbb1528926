use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque authenticated user identity. The transport layer verifies tokens;
/// the engine only ever sees this id.
pub type UserId = i64;

/// Type alias for whole chips. All bets and stacks are whole chips.
pub type Chips = u32;

/// Seat position inside a lobby.
pub type SeatIndex = usize;

/// Identifier of a single transport connection.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Which of the two hosted games a lobby runs.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GameKind {
    Poker,
    Uno,
}

impl fmt::Display for GameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Poker => "poker",
            Self::Uno => "uno",
        };
        write!(f, "{repr}")
    }
}

/// Equipped cosmetic identifiers. Opaque to the engine; the rewards store
/// owns their meaning.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Cosmetics {
    pub card_back: Option<String>,
    pub table_theme: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_ids_unique() {
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_game_kind_display() {
        assert_eq!(GameKind::Poker.to_string(), "poker");
        assert_eq!(GameKind::Uno.to_string(), "uno");
    }

    #[test]
    fn test_game_kind_serde() {
        let json = serde_json::to_string(&GameKind::Uno).unwrap();
        assert_eq!(json, "\"uno\"");
        let back: GameKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, GameKind::Uno);
    }
}
