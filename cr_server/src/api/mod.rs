//! WebSocket API surface.
//!
//! One endpoint, `GET /ws?token=<jwt>`, carries the whole command protocol;
//! `GET /health` answers liveness probes. Commands are validated here and
//! routed into lobby actors; every command gets an acknowledgement even when
//! the engine rejects it.

pub mod throttle;
pub mod websocket;

use axum::{routing::get, Router};
use std::sync::Arc;

use crate::auth::TokenVerifier;
use crate::rewards::RewardsStore;
use cardroom::{LobbyRegistry, SessionManager};

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<LobbyRegistry>,
    pub sessions: Arc<SessionManager>,
    pub verifier: Arc<TokenVerifier>,
    /// Absent when no database is configured; cosmetics fall back to
    /// defaults and wins are logged only.
    pub rewards: Option<Arc<RewardsStore>>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(websocket::websocket_handler))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
