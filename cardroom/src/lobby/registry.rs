//! Process-wide lobby registry. Allocates private codes (unique across both
//! games), bootstraps the fixed public lobbies at startup, and hands out
//! actor handles.

use log::info;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

use super::actor::LobbyActor;
use super::config::LobbySettings;
use super::messages::{LobbyHandle, LobbyNotice, RewardEvent};
use super::{generate_code, Lobby, POKER_PUBLIC_CODES, UNO_PUBLIC_CODES};
use crate::errors::GameError;
use crate::protocol::RoomInfo;
use crate::rng::entropy_rng;
use crate::session::SessionManager;
use crate::types::{GameKind, UserId};

const CODE_ATTEMPTS: usize = 32;

/// Sentinel host for public lobbies; start policy there is any participant.
pub const PUBLIC_HOST: UserId = 0;

pub struct LobbyRegistry {
    lobbies: RwLock<HashMap<(GameKind, String), LobbyHandle>>,
    settings: LobbySettings,
    rewards: mpsc::UnboundedSender<RewardEvent>,
    notices: mpsc::UnboundedSender<LobbyNotice>,
}

impl LobbyRegistry {
    /// Create the registry plus the reward and notice streams its lobbies
    /// feed. The caller wires the receivers to the rewards store and to
    /// [`run_maintenance`].
    #[must_use]
    pub fn new(
        settings: LobbySettings,
    ) -> (
        Arc<Self>,
        mpsc::UnboundedReceiver<RewardEvent>,
        mpsc::UnboundedReceiver<LobbyNotice>,
    ) {
        let (rewards, rewards_rx) = mpsc::unbounded_channel();
        let (notices, notices_rx) = mpsc::unbounded_channel();
        let registry = Arc::new(Self {
            lobbies: RwLock::new(HashMap::new()),
            settings,
            rewards,
            notices,
        });
        (registry, rewards_rx, notices_rx)
    }

    /// Spawn the six fixed public lobbies. Called once at boot.
    pub async fn bootstrap_public(&self) {
        for code in POKER_PUBLIC_CODES {
            self.insert_lobby(GameKind::Poker, code.to_string(), PUBLIC_HOST, true)
                .await;
        }
        for code in UNO_PUBLIC_CODES {
            self.insert_lobby(GameKind::Uno, code.to_string(), PUBLIC_HOST, true)
                .await;
        }
        info!("public lobbies bootstrapped");
    }

    /// Create a private lobby with a fresh code, unique across both games.
    pub async fn create_private(
        &self,
        game: GameKind,
        host: UserId,
    ) -> Result<LobbyHandle, GameError> {
        let mut rng = entropy_rng();
        let mut lobbies = self.lobbies.write().await;
        for _ in 0..CODE_ATTEMPTS {
            let code = generate_code(&mut *rng);
            if lobbies.keys().any(|(_, c)| c == &code) {
                continue;
            }
            let lobby = Lobby::new(game, code.clone(), host, false, self.settings.clone());
            let handle = LobbyActor::spawn(
                lobby,
                entropy_rng(),
                self.rewards.clone(),
                self.notices.clone(),
            );
            lobbies.insert((game, code.clone()), handle.clone());
            info!("created {game} lobby {code}");
            return Ok(handle);
        }
        Err(GameError::Internal)
    }

    async fn insert_lobby(&self, game: GameKind, code: String, host: UserId, is_public: bool) {
        let lobby = Lobby::new(game, code.clone(), host, is_public, self.settings.clone());
        let handle = LobbyActor::spawn(
            lobby,
            entropy_rng(),
            self.rewards.clone(),
            self.notices.clone(),
        );
        self.lobbies.write().await.insert((game, code), handle);
    }

    pub async fn get(&self, game: GameKind, code: &str) -> Option<LobbyHandle> {
        self.lobbies.read().await.get(&(game, code.to_string())).cloned()
    }

    pub async fn remove(&self, game: GameKind, code: &str) {
        self.lobbies.write().await.remove(&(game, code.to_string()));
        info!("removed {game} lobby {code}");
    }

    /// Catalog of public rooms, optionally filtered by game.
    pub async fn list_rooms(&self, game: Option<GameKind>) -> Vec<RoomInfo> {
        let handles: Vec<LobbyHandle> = {
            let lobbies = self.lobbies.read().await;
            lobbies
                .iter()
                .filter(|((g, _), _)| game.map_or(true, |want| *g == want))
                .map(|(_, handle)| handle.clone())
                .collect()
        };
        let mut rooms = Vec::new();
        for handle in handles {
            if let Ok(status) = handle.status().await {
                if !status.is_public {
                    continue;
                }
                rooms.push(RoomInfo {
                    game: status.game,
                    code: status.code,
                    player_count: status.player_count,
                    status: status.phase,
                    max_players: status.max_players,
                });
            }
        }
        rooms.sort_by(|a, b| a.code.cmp(&b.code));
        rooms
    }

    pub async fn lobby_count(&self) -> usize {
        self.lobbies.read().await.len()
    }

    /// Drop every handle; actors stop when their inboxes close.
    pub async fn shutdown(&self) {
        self.lobbies.write().await.clear();
    }
}

/// Consume actor close notices: drop the registry entry and clear session
/// state for everyone who was still seated. Public lobbies never send
/// `Closed` (they reset in place), so nothing special is needed here.
pub async fn run_maintenance(
    registry: Arc<LobbyRegistry>,
    sessions: Arc<SessionManager>,
    mut notices: mpsc::UnboundedReceiver<LobbyNotice>,
) {
    while let Some(notice) = notices.recv().await {
        match notice {
            LobbyNotice::Closed {
                game,
                code,
                members,
            } => {
                registry.remove(game, &code).await;
                for user in members {
                    sessions.unbind(user, game).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lobby::PlayerProfile;

    fn profile(name: &str) -> PlayerProfile {
        PlayerProfile {
            nickname: name.to_string(),
            ..PlayerProfile::default()
        }
    }

    #[tokio::test]
    async fn test_bootstrap_creates_six_public_lobbies() {
        let (registry, _r, _n) = LobbyRegistry::new(LobbySettings::default());
        registry.bootstrap_public().await;
        assert_eq!(registry.lobby_count().await, 6);
        assert!(registry
            .get(GameKind::Poker, POKER_PUBLIC_CODES[0])
            .await
            .is_some());
        assert!(registry
            .get(GameKind::Uno, UNO_PUBLIC_CODES[2])
            .await
            .is_some());
    }

    #[tokio::test]
    async fn test_private_codes_are_unique_and_well_formed() {
        let (registry, _r, _n) = LobbyRegistry::new(LobbySettings::default());
        let mut codes = std::collections::HashSet::new();
        for i in 0..20 {
            let handle = registry
                .create_private(GameKind::Uno, 100 + i)
                .await
                .unwrap();
            assert_eq!(handle.code.len(), 6);
            assert!(codes.insert(handle.code.clone()));
        }
    }

    #[tokio::test]
    async fn test_list_rooms_reports_public_only() {
        let (registry, _r, _n) = LobbyRegistry::new(LobbySettings::default());
        registry.bootstrap_public().await;
        registry.create_private(GameKind::Poker, 1).await.unwrap();

        let rooms = registry.list_rooms(None).await;
        assert_eq!(rooms.len(), 6);
        let poker_rooms = registry.list_rooms(Some(GameKind::Poker)).await;
        assert_eq!(poker_rooms.len(), 3);
        assert!(poker_rooms.iter().all(|r| r.game == GameKind::Poker));
    }

    #[tokio::test]
    async fn test_room_listing_sees_player_counts() {
        let (registry, _r, _n) = LobbyRegistry::new(LobbySettings::default());
        registry.bootstrap_public().await;
        let handle = registry
            .get(GameKind::Uno, UNO_PUBLIC_CODES[0])
            .await
            .unwrap();
        handle.join(1, profile("alice")).await.unwrap();
        handle.join(2, profile("bob")).await.unwrap();

        let rooms = registry.list_rooms(Some(GameKind::Uno)).await;
        let room = rooms
            .iter()
            .find(|r| r.code == UNO_PUBLIC_CODES[0])
            .unwrap();
        assert_eq!(room.player_count, 2);
    }
}
