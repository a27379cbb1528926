use serde::{Deserialize, Serialize};

use crate::types::Chips;

pub const DEFAULT_SMALL_BLIND: Chips = 10;
pub const DEFAULT_BIG_BLIND: Chips = 20;
pub const DEFAULT_BUY_IN: Chips = 1000;
pub const DEFAULT_MAX_PLAYERS: usize = 8;
pub const DEFAULT_TURN_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_GRACE_SECS: u64 = 15;

/// Per-lobby settings, fixed at creation.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct LobbySettings {
    pub max_players: usize,
    pub small_blind: Chips,
    pub big_blind: Chips,
    pub buy_in: Chips,
    /// Poker acting clock.
    pub turn_timeout_secs: u64,
    /// Reconnect window after a transport drop.
    pub grace_secs: u64,
}

impl Default for LobbySettings {
    fn default() -> Self {
        Self {
            max_players: DEFAULT_MAX_PLAYERS,
            small_blind: DEFAULT_SMALL_BLIND,
            big_blind: DEFAULT_BIG_BLIND,
            buy_in: DEFAULT_BUY_IN,
            turn_timeout_secs: DEFAULT_TURN_TIMEOUT_SECS,
            grace_secs: DEFAULT_GRACE_SECS,
        }
    }
}

impl LobbySettings {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_players < 2 {
            return Err("max_players must be at least 2".to_string());
        }
        if self.small_blind == 0 || self.big_blind <= self.small_blind {
            return Err("big blind must exceed a nonzero small blind".to_string());
        }
        if self.buy_in < self.big_blind {
            return Err("buy-in must cover at least the big blind".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(LobbySettings::default().validate().is_ok());
    }

    #[test]
    fn test_blind_order_enforced() {
        let mut settings = LobbySettings::default();
        settings.big_blind = settings.small_blind;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_buy_in_must_cover_big_blind() {
        let settings = LobbySettings {
            buy_in: 5,
            ..LobbySettings::default()
        };
        assert!(settings.validate().is_err());
    }
}
