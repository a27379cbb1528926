use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced to users through command acknowledgements.
///
/// Every variant maps to a stable wire code so clients can branch without
/// parsing messages.
#[derive(Clone, Debug, Deserialize, Eq, Error, PartialEq, Serialize)]
pub enum GameError {
    #[error("not found")]
    NotFound,
    #[error("not authorized")]
    NotAuthorized,
    #[error("not your turn")]
    NotYourTurn,
    #[error("invalid action: {0}")]
    InvalidAction(String),
    #[error("already in a lobby")]
    AlreadyInLobby,
    #[error("lobby is full")]
    Capacity,
    #[error("wrong phase for that")]
    PhaseViolation,
    #[error("temporary failure, try again")]
    Transient,
    #[error("internal error")]
    Internal,
}

impl GameError {
    /// Stable machine-readable code carried in acks.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::NotAuthorized => "not_authorized",
            Self::NotYourTurn => "not_your_turn",
            Self::InvalidAction(_) => "invalid_action",
            Self::AlreadyInLobby => "already_in_lobby",
            Self::Capacity => "capacity",
            Self::PhaseViolation => "phase_violation",
            Self::Transient => "transient",
            Self::Internal => "internal",
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidAction(reason.into())
    }
}
