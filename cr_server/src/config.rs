//! Server configuration.
//!
//! Consolidates environment variable reads behind one validated struct.

use cardroom::LobbySettings;
use std::net::SocketAddr;

/// Complete server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address
    pub bind: SocketAddr,
    /// Postgres connection string for the rewards store; `None` runs the
    /// server without persistence (wins are logged and dropped).
    pub database_url: Option<String>,
    /// JWT signing secret (required)
    pub jwt_secret: String,
    /// Defaults applied to every lobby
    pub lobby: LobbySettings,
    /// Coins credited per win
    pub win_coins: i64,
}

impl ServerConfig {
    /// Load configuration from environment variables, with CLI overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if required variables are missing or invalid.
    pub fn from_env(
        bind_override: Option<SocketAddr>,
        database_url_override: Option<String>,
    ) -> Result<Self, ConfigError> {
        let bind = bind_override
            .or_else(|| {
                std::env::var("SERVER_BIND")
                    .ok()
                    .and_then(|s| s.parse().ok())
            })
            .unwrap_or_else(|| {
                "127.0.0.1:4000"
                    .parse()
                    .expect("default bind address is valid")
            });

        let database_url = database_url_override.or_else(|| std::env::var("DATABASE_URL").ok());

        let jwt_secret = std::env::var("JWT_SECRET").map_err(|_| ConfigError::MissingRequired {
            var: "JWT_SECRET".to_string(),
            hint: "Generate with: openssl rand -hex 32".to_string(),
        })?;
        if jwt_secret.len() < 32 {
            return Err(ConfigError::Invalid {
                var: "JWT_SECRET".to_string(),
                reason: "Must be at least 32 characters (128-bit security)".to_string(),
            });
        }

        let lobby = LobbySettings {
            max_players: parse_env_or("LOBBY_MAX_PLAYERS", 8),
            small_blind: parse_env_or("POKER_SMALL_BLIND", 10),
            big_blind: parse_env_or("POKER_BIG_BLIND", 20),
            buy_in: parse_env_or("POKER_BUY_IN", 1000),
            turn_timeout_secs: parse_env_or("POKER_TURN_TIMEOUT_SECS", 30),
            grace_secs: parse_env_or("RECONNECT_GRACE_SECS", 15),
        };

        Ok(Self {
            bind,
            database_url,
            jwt_secret,
            lobby,
            win_coins: parse_env_or("WIN_COINS", 100),
        })
    }

    /// Validate configuration after loading.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.lobby.validate().map_err(|reason| ConfigError::Invalid {
            var: "LOBBY_*".to_string(),
            reason,
        })?;
        if self.win_coins < 0 {
            return Err(ConfigError::Invalid {
                var: "WIN_COINS".to_string(),
                reason: "Must not be negative".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}\nHint: {hint}")]
    MissingRequired { var: String, hint: String },

    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

fn parse_env_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> ServerConfig {
        ServerConfig {
            bind: "127.0.0.1:4000".parse().unwrap(),
            database_url: None,
            jwt_secret: "a".repeat(32),
            lobby: LobbySettings::default(),
            win_coins: 100,
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn test_bad_blinds_rejected() {
        let mut config = base_config();
        config.lobby.big_blind = config.lobby.small_blind;
        assert!(matches!(
            config.validate().unwrap_err(),
            ConfigError::Invalid { .. }
        ));
    }

    #[test]
    fn test_negative_win_coins_rejected() {
        let mut config = base_config();
        config.win_coins = -5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::MissingRequired {
            var: "JWT_SECRET".to_string(),
            hint: "use openssl".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("JWT_SECRET"));
        assert!(message.contains("use openssl"));
    }
}
