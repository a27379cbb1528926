//! # cardroom
//!
//! Authoritative realtime engine for two turn-based card games — Texas
//! Hold'em and UNO — hosted in small code-addressed lobbies.
//!
//! The design is actor-per-lobby: every lobby runs as one task owning all of
//! its state, commands are linearized through an inbox, and each accepted
//! mutation bumps a monotonic version and fans out per-viewer snapshots that
//! never leak hidden cards. The session layer maps transport connections to
//! lobby membership, enforces one active lobby per user across both games,
//! and survives brief disconnects through a cancellable grace window.
//!
//! ## Modules
//!
//! - [`poker`]: deck, seven-card hand evaluation, betting state machine
//! - [`uno`]: the 108-card deck and UNO rules engine
//! - [`lobby`]: common lobby state, the actor, code registry
//! - [`session`]: connection/presence indices and reconnect grace
//! - [`view`]: per-viewer projection of authoritative state
//! - [`protocol`]: wire commands, acks, and server-pushed events

pub mod errors;
pub mod lobby;
pub mod poker;
pub mod protocol;
pub mod rng;
pub mod session;
pub mod types;
pub mod uno;
pub mod view;

pub use errors::GameError;
pub use lobby::actor::LobbyActor;
pub use lobby::config::LobbySettings;
pub use lobby::messages::{LobbyHandle, LobbyNotice, RewardEvent};
pub use lobby::registry::{run_maintenance, LobbyRegistry};
pub use lobby::{Lobby, Phase, PlayerProfile};
pub use session::{Bind, SessionManager};
pub use types::{Chips, ConnectionId, GameKind, UserId};
