//! Session and presence tracking.
//!
//! Three indices map transport connections to lobby membership:
//! connection → membership, (game, user) → connection, and user → lobby.
//! The last one enforces at most one active lobby per user across both
//! games. Disconnects start a cancellable grace timer; a reconnect by the
//! same identity within the window cancels the pending leave, and a stale
//! timer firing after a reconnect is a no-op.

use log::{debug, info};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};

use crate::errors::GameError;
use crate::lobby::messages::LobbyHandle;
use crate::types::{ConnectionId, GameKind, UserId};

#[derive(Clone, Debug)]
pub struct Membership {
    pub user_id: UserId,
    pub game: GameKind,
    pub code: String,
    pub handle: LobbyHandle,
}

struct GraceTimer {
    conn: ConnectionId,
    task: JoinHandle<()>,
}

#[derive(Default)]
struct Indices {
    by_conn: HashMap<ConnectionId, Membership>,
    by_user_game: HashMap<(GameKind, UserId), ConnectionId>,
    active: HashMap<UserId, (GameKind, String)>,
    grace: HashMap<(GameKind, UserId), GraceTimer>,
}

pub struct SessionManager {
    inner: Mutex<Indices>,
    grace: Duration,
}

/// Result of binding a connection into a lobby.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Bind {
    Fresh,
    /// Same identity returned to the same lobby: a pending grace timer was
    /// cancelled or a stale connection was replaced.
    Reconnect,
}

impl SessionManager {
    #[must_use]
    pub fn new(grace_secs: u64) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Indices::default()),
            grace: Duration::from_secs(grace_secs),
        })
    }

    /// The lobby a user is currently in, if any.
    pub async fn active_lobby(&self, user_id: UserId) -> Option<(GameKind, String)> {
        self.inner.lock().await.active.get(&user_id).cloned()
    }

    /// Record `conn` as `user`'s connection into a lobby. Rejects membership
    /// in a second lobby; rejoining the same lobby is a reconnect.
    pub async fn bind(
        &self,
        conn: ConnectionId,
        user_id: UserId,
        handle: LobbyHandle,
    ) -> Result<Bind, GameError> {
        let game = handle.game;
        let code = handle.code.clone();
        let mut inner = self.inner.lock().await;

        if let Some((active_game, active_code)) = inner.active.get(&user_id) {
            if (*active_game, active_code.as_str()) != (game, code.as_str()) {
                return Err(GameError::AlreadyInLobby);
            }
        }

        let mut kind = Bind::Fresh;
        if let Some(timer) = inner.grace.remove(&(game, user_id)) {
            timer.task.abort();
            kind = Bind::Reconnect;
        }
        if let Some(stale) = inner.by_user_game.insert((game, user_id), conn) {
            if stale != conn {
                inner.by_conn.remove(&stale);
                kind = Bind::Reconnect;
            }
        }
        inner.by_conn.insert(
            conn,
            Membership {
                user_id,
                game,
                code: code.clone(),
                handle,
            },
        );
        inner.active.insert(user_id, (game, code));
        debug!("session bind user={user_id} conn={conn} kind={kind:?}");
        Ok(kind)
    }

    /// Drop a user's membership entirely (voluntary leave or lobby close).
    pub async fn unbind(&self, user_id: UserId, game: GameKind) {
        let mut inner = self.inner.lock().await;
        if let Some(timer) = inner.grace.remove(&(game, user_id)) {
            timer.task.abort();
        }
        if let Some(conn) = inner.by_user_game.remove(&(game, user_id)) {
            inner.by_conn.remove(&conn);
        }
        if let Some((active_game, _)) = inner.active.get(&user_id) {
            if *active_game == game {
                inner.active.remove(&user_id);
            }
        }
    }

    /// Transport dropped. Marks the player disconnected and arms the grace
    /// timer. A disconnect from a connection that no longer owns the mapping
    /// is ignored.
    pub async fn on_disconnect(self: &Arc<Self>, conn: ConnectionId) {
        let membership = {
            let mut inner = self.inner.lock().await;
            let Some(membership) = inner.by_conn.get(&conn).cloned() else {
                return;
            };
            let key = (membership.game, membership.user_id);
            if inner.by_user_game.get(&key) != Some(&conn) {
                // A newer connection owns this user now; the stale record
                // just gets dropped.
                inner.by_conn.remove(&conn);
                return;
            }
            membership
        };

        let _ = membership.handle.mark_disconnected(membership.user_id).await;

        let key = (membership.game, membership.user_id);
        let manager = self.clone();
        let task = tokio::spawn(async move {
            sleep(manager.grace).await;
            manager.finalize_if_stale(key, conn).await;
        });

        let mut inner = self.inner.lock().await;
        // If the user reconnected while we were arming the timer, the
        // mapping moved on; kill the timer immediately.
        if inner.by_user_game.get(&key) != Some(&conn) {
            task.abort();
            return;
        }
        if let Some(old) = inner.grace.insert(key, GraceTimer { conn, task }) {
            old.task.abort();
        }
        info!(
            "grace timer armed for user {} in {} ({}s)",
            key.1,
            key.0,
            self.grace.as_secs()
        );
    }

    /// Grace expired: if the stale connection still owns the mapping, issue
    /// the full leave; otherwise the user reconnected and nothing happens.
    async fn finalize_if_stale(self: &Arc<Self>, key: (GameKind, UserId), conn: ConnectionId) {
        let membership = {
            let mut inner = self.inner.lock().await;
            match inner.grace.remove(&key) {
                Some(timer) if timer.conn == conn => {}
                Some(timer) => {
                    // A different timer owns the slot; put it back.
                    inner.grace.insert(key, timer);
                    return;
                }
                None => return,
            }
            if inner.by_user_game.get(&key) != Some(&conn) {
                return;
            }
            inner.by_user_game.remove(&key);
            let membership = inner.by_conn.remove(&conn);
            if let Some((active_game, _)) = inner.active.get(&key.1) {
                if *active_game == key.0 {
                    inner.active.remove(&key.1);
                }
            }
            membership
        };
        if let Some(membership) = membership {
            info!(
                "grace expired for user {} in lobby {}",
                membership.user_id, membership.code
            );
            let _ = membership.handle.finalize_leave(membership.user_id).await;
        }
    }

    /// Membership owned by a connection, if it is still current.
    pub async fn membership(&self, conn: ConnectionId) -> Option<Membership> {
        self.inner.lock().await.by_conn.get(&conn).cloned()
    }

    /// Cancel every grace timer; used at shutdown.
    pub async fn teardown(&self) {
        let mut inner = self.inner.lock().await;
        for (_, timer) in inner.grace.drain() {
            timer.task.abort();
        }
        inner.by_conn.clear();
        inner.by_user_game.clear();
        inner.active.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lobby::actor::LobbyActor;
    use crate::lobby::config::LobbySettings;
    use crate::lobby::{Lobby, PlayerProfile};
    use crate::rng::seeded_rng;
    use tokio::sync::mpsc;

    fn spawn_lobby(code: &str) -> LobbyHandle {
        let lobby = Lobby::new(
            GameKind::Poker,
            code.to_string(),
            1,
            false,
            LobbySettings::default(),
        );
        let (rewards, _r) = mpsc::unbounded_channel();
        let (notices, _n) = mpsc::unbounded_channel();
        LobbyActor::spawn(lobby, seeded_rng(5), rewards, notices)
    }

    fn profile(name: &str) -> PlayerProfile {
        PlayerProfile {
            nickname: name.to_string(),
            ..PlayerProfile::default()
        }
    }

    #[tokio::test]
    async fn test_second_lobby_rejected() {
        let sessions = SessionManager::new(15);
        let first = spawn_lobby("AAAAAA");
        let second = spawn_lobby("BBBBBB");
        let conn = ConnectionId::new();
        sessions.bind(conn, 7, first).await.unwrap();

        let other_conn = ConnectionId::new();
        let err = sessions.bind(other_conn, 7, second).await.unwrap_err();
        assert_eq!(err, GameError::AlreadyInLobby);
    }

    #[tokio::test]
    async fn test_rejoin_same_lobby_is_reconnect() {
        let sessions = SessionManager::new(15);
        let handle = spawn_lobby("CCCCCC");
        let conn = ConnectionId::new();
        sessions.bind(conn, 7, handle.clone()).await.unwrap();

        let newer = ConnectionId::new();
        let bind = sessions.bind(newer, 7, handle).await.unwrap();
        assert_eq!(bind, Bind::Reconnect);
        // The old connection no longer resolves.
        assert!(sessions.membership(conn).await.is_none());
        assert!(sessions.membership(newer).await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_grace_expiry_finalizes_leave() {
        let sessions = SessionManager::new(15);
        let handle = spawn_lobby("DDDDDD");
        handle.join(7, profile("gale")).await.unwrap();
        handle.join(8, profile("hugh")).await.unwrap();

        let conn = ConnectionId::new();
        sessions.bind(conn, 7, handle.clone()).await.unwrap();
        sessions.on_disconnect(conn).await;

        tokio::time::sleep(Duration::from_secs(20)).await;
        // Mapping cleared, lobby seat removed (lobby phase).
        assert!(sessions.membership(conn).await.is_none());
        assert!(sessions.active_lobby(7).await.is_none());
        let snapshot = handle.request_state(8).await.unwrap();
        assert!(snapshot.players.iter().all(|s| s.user_id != 7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_within_grace_cancels_leave() {
        let sessions = SessionManager::new(15);
        let handle = spawn_lobby("EEEEEE");
        handle.join(7, profile("gale")).await.unwrap();
        handle.join(8, profile("hugh")).await.unwrap();

        let conn = ConnectionId::new();
        sessions.bind(conn, 7, handle.clone()).await.unwrap();
        sessions.on_disconnect(conn).await;

        tokio::time::sleep(Duration::from_secs(5)).await;
        let newer = ConnectionId::new();
        let bind = sessions.bind(newer, 7, handle.clone()).await.unwrap();
        assert_eq!(bind, Bind::Reconnect);
        handle.join(7, profile("gale")).await.unwrap();

        tokio::time::sleep(Duration::from_secs(30)).await;
        // No leave happened: the seat is still there and connected.
        let snapshot = handle.request_state(7).await.unwrap();
        let seat = snapshot.players.iter().find(|s| s.user_id == 7).unwrap();
        assert!(seat.is_connected);
        assert!(sessions.active_lobby(7).await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_disconnect_is_noop() {
        let sessions = SessionManager::new(15);
        let handle = spawn_lobby("FFFFFF");
        handle.join(7, profile("gale")).await.unwrap();
        handle.join(8, profile("hugh")).await.unwrap();

        let old_conn = ConnectionId::new();
        sessions.bind(old_conn, 7, handle.clone()).await.unwrap();
        // User reconnects on a new socket before the old one reports its
        // disconnect.
        let new_conn = ConnectionId::new();
        sessions.bind(new_conn, 7, handle.clone()).await.unwrap();

        sessions.on_disconnect(old_conn).await;
        tokio::time::sleep(Duration::from_secs(30)).await;

        // The stale disconnect neither removed the seat nor the mapping.
        assert!(sessions.membership(new_conn).await.is_some());
        let snapshot = handle.request_state(7).await.unwrap();
        assert!(snapshot.players.iter().any(|s| s.user_id == 7));
    }
}
