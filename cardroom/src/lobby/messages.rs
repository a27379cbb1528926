//! Lobby actor message types and the cloneable handle used to reach it.

use tokio::sync::{mpsc, oneshot};

use super::{Phase, PlayerProfile};
use crate::errors::GameError;
use crate::poker::PokerAction;
use crate::protocol::{ServerEvent, UnoAction};
use crate::types::{ConnectionId, GameKind, UserId};
use crate::view::LobbySnapshot;

pub type AckReply = oneshot::Sender<Result<u64, GameError>>;
pub type StateReply = oneshot::Sender<Result<LobbySnapshot, GameError>>;

/// Commands processed serially by a lobby actor.
#[derive(Debug)]
pub enum LobbyCommand {
    /// Join or rejoin. A rejoin by a seated user is a reconnect.
    Join {
        user_id: UserId,
        profile: PlayerProfile,
        reply: StateReply,
    },
    Leave {
        user_id: UserId,
        reply: AckReply,
    },
    Start {
        user_id: UserId,
        reply: AckReply,
    },
    PokerAct {
        user_id: UserId,
        action: PokerAction,
        reply: AckReply,
    },
    UnoAct {
        user_id: UserId,
        action: UnoAction,
        reply: AckReply,
    },
    RevealCards {
        user_id: UserId,
        reveal: bool,
        reply: AckReply,
    },
    RequestState {
        user_id: UserId,
        reply: StateReply,
    },
    /// Host tears the lobby down. Public lobbies reject this.
    End {
        user_id: UserId,
        reply: AckReply,
    },
    Subscribe {
        user_id: UserId,
        conn: ConnectionId,
        sender: mpsc::Sender<ServerEvent>,
    },
    Unsubscribe {
        user_id: UserId,
        conn: ConnectionId,
    },
    /// Transport dropped; the session layer runs the grace window.
    MarkDisconnected {
        user_id: UserId,
    },
    /// Grace expired without a reconnect: finalize the departure.
    FinalizeLeave {
        user_id: UserId,
    },
    Status {
        reply: oneshot::Sender<LobbyStatus>,
    },
}

/// Summary for room listings.
#[derive(Clone, Debug)]
pub struct LobbyStatus {
    pub game: GameKind,
    pub code: String,
    pub player_count: usize,
    pub connected_count: usize,
    pub phase: Phase,
    pub max_players: usize,
    pub is_public: bool,
}

/// Notice from an actor back to the registry.
#[derive(Clone, Debug)]
pub enum LobbyNotice {
    Closed {
        game: GameKind,
        code: String,
        members: Vec<UserId>,
    },
}

/// Terminal transition observed; the rewards collaborator persists it.
#[derive(Clone, Debug, PartialEq)]
pub struct RewardEvent {
    pub user_id: UserId,
    pub game: GameKind,
    pub code: String,
}

/// Handle for sending commands into a lobby actor.
#[derive(Clone, Debug)]
pub struct LobbyHandle {
    pub game: GameKind,
    pub code: String,
    sender: mpsc::Sender<LobbyCommand>,
}

impl LobbyHandle {
    #[must_use]
    pub fn new(game: GameKind, code: String, sender: mpsc::Sender<LobbyCommand>) -> Self {
        Self { game, code, sender }
    }

    pub async fn send(&self, command: LobbyCommand) -> Result<(), GameError> {
        self.sender
            .send(command)
            .await
            .map_err(|_| GameError::NotFound)
    }

    async fn ask(
        &self,
        build: impl FnOnce(AckReply) -> LobbyCommand,
    ) -> Result<u64, GameError> {
        let (tx, rx) = oneshot::channel();
        self.send(build(tx)).await?;
        rx.await.map_err(|_| GameError::Internal)?
    }

    async fn ask_state(
        &self,
        build: impl FnOnce(StateReply) -> LobbyCommand,
    ) -> Result<LobbySnapshot, GameError> {
        let (tx, rx) = oneshot::channel();
        self.send(build(tx)).await?;
        rx.await.map_err(|_| GameError::Internal)?
    }

    pub async fn join(
        &self,
        user_id: UserId,
        profile: PlayerProfile,
    ) -> Result<LobbySnapshot, GameError> {
        self.ask_state(|reply| LobbyCommand::Join {
            user_id,
            profile,
            reply,
        })
        .await
    }

    pub async fn leave(&self, user_id: UserId) -> Result<u64, GameError> {
        self.ask(|reply| LobbyCommand::Leave { user_id, reply }).await
    }

    pub async fn start(&self, user_id: UserId) -> Result<u64, GameError> {
        self.ask(|reply| LobbyCommand::Start { user_id, reply }).await
    }

    pub async fn poker_act(
        &self,
        user_id: UserId,
        action: PokerAction,
    ) -> Result<u64, GameError> {
        self.ask(|reply| LobbyCommand::PokerAct {
            user_id,
            action,
            reply,
        })
        .await
    }

    pub async fn uno_act(&self, user_id: UserId, action: UnoAction) -> Result<u64, GameError> {
        self.ask(|reply| LobbyCommand::UnoAct {
            user_id,
            action,
            reply,
        })
        .await
    }

    pub async fn reveal_cards(&self, user_id: UserId, reveal: bool) -> Result<u64, GameError> {
        self.ask(|reply| LobbyCommand::RevealCards {
            user_id,
            reveal,
            reply,
        })
        .await
    }

    pub async fn request_state(&self, user_id: UserId) -> Result<LobbySnapshot, GameError> {
        self.ask_state(|reply| LobbyCommand::RequestState { user_id, reply })
            .await
    }

    pub async fn end(&self, user_id: UserId) -> Result<u64, GameError> {
        self.ask(|reply| LobbyCommand::End { user_id, reply }).await
    }

    pub async fn subscribe(
        &self,
        user_id: UserId,
        conn: ConnectionId,
        sender: mpsc::Sender<ServerEvent>,
    ) -> Result<(), GameError> {
        self.send(LobbyCommand::Subscribe {
            user_id,
            conn,
            sender,
        })
        .await
    }

    pub async fn unsubscribe(&self, user_id: UserId, conn: ConnectionId) -> Result<(), GameError> {
        self.send(LobbyCommand::Unsubscribe { user_id, conn }).await
    }

    pub async fn mark_disconnected(&self, user_id: UserId) -> Result<(), GameError> {
        self.send(LobbyCommand::MarkDisconnected { user_id }).await
    }

    pub async fn finalize_leave(&self, user_id: UserId) -> Result<(), GameError> {
        self.send(LobbyCommand::FinalizeLeave { user_id }).await
    }

    pub async fn status(&self) -> Result<LobbyStatus, GameError> {
        let (tx, rx) = oneshot::channel();
        self.send(LobbyCommand::Status { reply: tx }).await?;
        rx.await.map_err(|_| GameError::Internal)
    }
}
