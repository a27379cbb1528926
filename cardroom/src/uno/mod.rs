//! UNO: card primitives and the per-lobby rules engine.

pub mod engine;
pub mod entities;

pub use engine::{ButtonPos, UnoGame, UnoPrompt, UnoUpdate, UnoUpdateKind};
pub use entities::{build_deck, is_playable, CardId, Color, Face, UnoCard};
