//! WebSocket transport and command dispatch.
//!
//! Each connection is authenticated at upgrade, given a connection id, and
//! split into a send task (server events + command replies) and a receive
//! loop (rate-limited command dispatch). Disconnects flow into the session
//! layer, which owns the reconnect grace window.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{throttle::Throttle, AppState};
use crate::auth::Claims;
use cardroom::lobby::actor::subscriber_channel;
use cardroom::lobby::PlayerProfile;
use cardroom::protocol::{Ack, ClientCommand, PlayerAction};
use cardroom::types::Cosmetics;
use cardroom::{ConnectionId, GameError, GameKind, UserId};

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    token: String,
}

/// Upgrade to a WebSocket after validating the access token.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    let claims = match state.verifier.verify(&query.token) {
        Ok(claims) => claims,
        Err(_) => return (StatusCode::UNAUTHORIZED, "Invalid token").into_response(),
    };
    ws.on_upgrade(move |socket| handle_socket(socket, claims, state))
}

async fn handle_socket(socket: WebSocket, claims: Claims, state: AppState) {
    let conn = ConnectionId::new();
    let user_id: UserId = claims.sub;
    info!(%conn, user_id, "websocket connected");

    let (mut sender, mut receiver) = socket.split();
    let (event_tx, mut event_rx) = subscriber_channel();
    let (reply_tx, mut reply_rx) = mpsc::channel::<String>(32);

    // Send side: lobby events and command replies share the socket.
    let send_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                event = event_rx.recv() => match event {
                    Some(event) => {
                        let Ok(json) = serde_json::to_string(&event) else {
                            continue;
                        };
                        if sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                },
                reply = reply_rx.recv() => match reply {
                    Some(json) => {
                        if sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                },
            }
        }
    });

    let mut burst_guard = Throttle::per_second(10);
    let mut sustained_guard = Throttle::per_minute(100);

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                if !burst_guard.allow() || !sustained_guard.allow() {
                    warn!(user_id, "rate limit exceeded");
                    let ack = Ack::err(&GameError::invalid("slow down"));
                    send_reply(&reply_tx, &ack).await;
                    continue;
                }

                let reply = match serde_json::from_str::<ClientCommand>(&text) {
                    Ok(command) => {
                        dispatch(command, conn, user_id, &claims, &state, &event_tx).await
                    }
                    Err(err) => {
                        debug!(user_id, %err, "unparseable command");
                        serde_json::to_value(Ack::err(&GameError::invalid(
                            "unknown command shape",
                        )))
                        .unwrap_or_default()
                    }
                };
                if let Ok(json) = serde_json::to_string(&reply) {
                    if reply_tx.send(json).await.is_err() {
                        break;
                    }
                }
            }
            Ok(Message::Close(_)) => break,
            Err(err) => {
                debug!(user_id, %err, "websocket error");
                break;
            }
            _ => {}
        }
    }

    send_task.abort();
    // The grace window takes it from here.
    state.sessions.on_disconnect(conn).await;
    info!(%conn, user_id, "websocket disconnected");
}

async fn send_reply(reply_tx: &mpsc::Sender<String>, ack: &Ack) {
    if let Ok(json) = serde_json::to_string(ack) {
        let _ = reply_tx.send(json).await;
    }
}

/// Route one command to the engine and shape its acknowledgement. Every path
/// returns a reply; engine failures become `success=false` acks.
async fn dispatch(
    command: ClientCommand,
    conn: ConnectionId,
    user_id: UserId,
    claims: &Claims,
    state: &AppState,
    event_tx: &mpsc::Sender<cardroom::protocol::ServerEvent>,
) -> serde_json::Value {
    match command {
        ClientCommand::ListRooms { game } => {
            let rooms = state.registry.list_rooms(game).await;
            json!({ "success": true, "rooms": rooms })
        }

        ClientCommand::CreateLobby { game } => {
            if state.sessions.active_lobby(user_id).await.is_some() {
                return ack_value(Ack::err(&GameError::AlreadyInLobby));
            }
            match state.registry.create_private(game, user_id).await {
                Ok(handle) => ack_value(Ack::created(0, handle.code.clone())),
                Err(err) => ack_value(Ack::err(&err)),
            }
        }

        ClientCommand::JoinLobby { game, code } => {
            join_lobby(game, &code, conn, user_id, claims, state, event_tx).await
        }

        ClientCommand::LeaveLobby { game, code } => {
            let result = match state.registry.get(game, &code).await {
                Some(handle) => handle.leave(user_id).await,
                None => Err(GameError::NotFound),
            };
            if result.is_ok() {
                state.sessions.unbind(user_id, game).await;
            }
            ack_value(result.into())
        }

        ClientCommand::StartGame { game, code } => {
            let result = match state.registry.get(game, &code).await {
                Some(handle) => handle.start(user_id).await,
                None => Err(GameError::NotFound),
            };
            ack_value(result.into())
        }

        ClientCommand::Action { game, code, action } => {
            let Some(handle) = state.registry.get(game, &code).await else {
                return ack_value(Ack::err(&GameError::NotFound));
            };
            let result = match (game, action) {
                (GameKind::Poker, PlayerAction::Poker(action)) => {
                    handle.poker_act(user_id, action).await
                }
                (GameKind::Uno, PlayerAction::Uno(action)) => {
                    handle.uno_act(user_id, action).await
                }
                _ => Err(GameError::invalid("action does not match the game")),
            };
            ack_value(result.into())
        }

        ClientCommand::RequestState { game, code } => {
            let result = match state.registry.get(game, &code).await {
                Some(handle) => handle.request_state(user_id).await,
                None => Err(GameError::NotFound),
            };
            match result {
                Ok(snapshot) => {
                    json!({ "success": true, "version": snapshot.version, "state": snapshot })
                }
                Err(err) => ack_value(Ack::err(&err)),
            }
        }

        ClientCommand::EndLobby { game, code } => {
            let result = match state.registry.get(game, &code).await {
                Some(handle) => handle.end(user_id).await,
                None => Err(GameError::NotFound),
            };
            ack_value(result.into())
        }

        ClientCommand::RevealCards { code, reveal } => {
            let result = match state.registry.get(GameKind::Poker, &code).await {
                Some(handle) => handle.reveal_cards(user_id, reveal).await,
                None => Err(GameError::NotFound),
            };
            ack_value(result.into())
        }
    }
}

/// Join flow: resolve the lobby, fetch cosmetics under a bounded timeout,
/// bind the session (multi-lobby guard), seat the player, subscribe the
/// connection, and return the personalized state.
async fn join_lobby(
    game: GameKind,
    code: &str,
    conn: ConnectionId,
    user_id: UserId,
    claims: &Claims,
    state: &AppState,
    event_tx: &mpsc::Sender<cardroom::protocol::ServerEvent>,
) -> serde_json::Value {
    let Some(handle) = state.registry.get(game, code).await else {
        return ack_value(Ack::err(&GameError::NotFound));
    };

    let cosmetics = match &state.rewards {
        Some(store) => store.fetch_cosmetics(user_id).await,
        None => Cosmetics::default(),
    };
    let profile = PlayerProfile {
        nickname: claims
            .nickname
            .clone()
            .unwrap_or_else(|| format!("player{user_id}")),
        avatar: claims.avatar.clone(),
        cosmetics,
    };

    if let Err(err) = state.sessions.bind(conn, user_id, handle.clone()).await {
        return ack_value(Ack::err(&err));
    }
    match handle.join(user_id, profile).await {
        Ok(snapshot) => {
            let _ = handle.subscribe(user_id, conn, event_tx.clone()).await;
            json!({ "success": true, "version": snapshot.version, "state": snapshot })
        }
        Err(err) => {
            // Seat was refused; roll the session binding back.
            state.sessions.unbind(user_id, game).await;
            ack_value(Ack::err(&err))
        }
    }
}

fn ack_value(ack: Ack) -> serde_json::Value {
    serde_json::to_value(ack).unwrap_or_else(|_| json!({ "success": false, "error": "internal" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardroom::poker::PokerAction;
    use cardroom::protocol::UnoAction;

    #[test]
    fn test_command_parsing_matches_wire_shapes() {
        let join: ClientCommand =
            serde_json::from_str(r#"{"type":"join_lobby","game":"uno","code":"AB12CD"}"#).unwrap();
        assert!(matches!(join, ClientCommand::JoinLobby { .. }));

        let action: ClientCommand = serde_json::from_str(
            r#"{"type":"action","game":"poker","code":"AB12CD","action":{"action":"raise","amount":60}}"#,
        )
        .unwrap();
        match action {
            ClientCommand::Action {
                action: PlayerAction::Poker(PokerAction::Raise { amount }),
                ..
            } => assert_eq!(amount, 60),
            other => panic!("unexpected parse: {other:?}"),
        }

        let uno: ClientCommand = serde_json::from_str(
            r#"{"type":"action","game":"uno","code":"AB12CD","action":{"type":"catch_uno"}}"#,
        )
        .unwrap();
        assert!(matches!(
            uno,
            ClientCommand::Action {
                action: PlayerAction::Uno(UnoAction::CatchUno),
                ..
            }
        ));
    }

    #[test]
    fn test_ack_value_shape() {
        let value = ack_value(Ack::err(&GameError::Capacity));
        assert_eq!(value["success"], false);
        assert_eq!(value["error"], "capacity");
    }
}
