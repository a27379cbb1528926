//! Two-game lobby server: poker and UNO over WebSocket.
//!
//! Spawns one actor task per lobby, bootstraps the fixed public lobbies,
//! and wires the session layer, rewards store, and registry maintenance.

mod api;
mod auth;
mod config;
mod logging;
mod rewards;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Error;
use ctrlc::set_handler;
use pico_args::Arguments;

use api::AppState;
use auth::TokenVerifier;
use cardroom::{run_maintenance, LobbyRegistry, SessionManager};
use config::ServerConfig;
use rewards::{run_reward_worker, RewardsStore};

const HELP: &str = "\
Run the cardroom lobby server

USAGE:
  cr_server [OPTIONS]

OPTIONS:
  --bind       IP:PORT     Server socket bind address  [default: env SERVER_BIND or 127.0.0.1:4000]
  --db-url     URL         Postgres connection string  [default: env DATABASE_URL; optional]

FLAGS:
  -h, --help               Print help information

ENVIRONMENT:
  SERVER_BIND              Server bind address (e.g., 0.0.0.0:4000)
  DATABASE_URL             Rewards store connection string (optional)
  JWT_SECRET               JWT signing secret (required)
  RECONNECT_GRACE_SECS     Reconnect grace window          [default: 15]
  POKER_TURN_TIMEOUT_SECS  Poker acting clock              [default: 30]
  WIN_COINS                Coins credited per win          [default: 100]
";

#[tokio::main]
async fn main() -> Result<(), Error> {
    // .env does not override variables already present in the environment.
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }
    let bind_override: Option<SocketAddr> = pargs.opt_value_from_str("--bind")?;
    let db_override: Option<String> = pargs.opt_value_from_str("--db-url")?;

    set_handler(|| std::process::exit(0))?;
    logging::init();

    let config = ServerConfig::from_env(bind_override, db_override)
        .map_err(|e| anyhow::anyhow!("configuration error: {e}"))?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("configuration error: {e}"))?;

    let rewards_store = match &config.database_url {
        Some(url) => match RewardsStore::connect(url, config.win_coins).await {
            Ok(store) => Some(Arc::new(store)),
            Err(err) => {
                tracing::warn!(%err, "rewards store unavailable, wins will not persist");
                None
            }
        },
        None => {
            tracing::warn!("no DATABASE_URL configured, wins will not persist");
            None
        }
    };

    let (registry, rewards_rx, notices_rx) = LobbyRegistry::new(config.lobby.clone());
    registry.bootstrap_public().await;
    let sessions = SessionManager::new(config.lobby.grace_secs);

    tokio::spawn(run_reward_worker(rewards_store.clone(), rewards_rx));
    tokio::spawn(run_maintenance(
        registry.clone(),
        sessions.clone(),
        notices_rx,
    ));

    let state = AppState {
        registry: registry.clone(),
        sessions: sessions.clone(),
        verifier: Arc::new(TokenVerifier::new(&config.jwt_secret)),
        rewards: rewards_store,
    };
    let app = api::create_router(state);

    tracing::info!("listening on {}", config.bind);
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    axum::serve(listener, app).await?;

    // The listener stopped: cancel grace timers and drop every lobby.
    sessions.teardown().await;
    registry.shutdown().await;
    Ok(())
}
