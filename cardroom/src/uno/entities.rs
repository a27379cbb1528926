use rand::{seq::SliceRandom, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Color {
    Red,
    Green,
    Blue,
    Yellow,
}

impl Color {
    pub const ALL: [Color; 4] = [Color::Red, Color::Green, Color::Blue, Color::Yellow];
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Red => "red",
            Self::Green => "green",
            Self::Blue => "blue",
            Self::Yellow => "yellow",
        };
        write!(f, "{repr}")
    }
}

/// Stable per-instance card identifier, unique within a lobby's lifetime.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct CardId(pub Uuid);

impl CardId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CardId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Face {
    Number { color: Color, value: u8 },
    Skip { color: Color },
    Reverse { color: Color },
    Draw2 { color: Color },
    Wild,
    Wild4,
}

impl Face {
    /// The printed color; wilds have none.
    #[must_use]
    pub fn color(&self) -> Option<Color> {
        match self {
            Self::Number { color, .. }
            | Self::Skip { color }
            | Self::Reverse { color }
            | Self::Draw2 { color } => Some(*color),
            Self::Wild | Self::Wild4 => None,
        }
    }

    #[must_use]
    pub fn is_wild(&self) -> bool {
        matches!(self, Self::Wild | Self::Wild4)
    }
}

impl fmt::Display for Face {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Number { color, value } => format!("{color} {value}"),
            Self::Skip { color } => format!("{color} skip"),
            Self::Reverse { color } => format!("{color} reverse"),
            Self::Draw2 { color } => format!("{color} draw two"),
            Self::Wild => "wild".to_string(),
            Self::Wild4 => "wild draw four".to_string(),
        };
        write!(f, "{repr}")
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct UnoCard {
    pub id: CardId,
    pub face: Face,
}

impl UnoCard {
    #[must_use]
    pub fn new(face: Face) -> Self {
        Self {
            id: CardId::new(),
            face,
        }
    }
}

/// The full 108-card deck, shuffled: per color one 0, two of each 1..=9,
/// two Skip, two Reverse, two Draw2; four Wild and four Wild4.
#[must_use]
pub fn build_deck(rng: &mut (dyn RngCore + Send)) -> Vec<UnoCard> {
    let mut cards = Vec::with_capacity(108);
    for color in Color::ALL {
        cards.push(UnoCard::new(Face::Number { color, value: 0 }));
        for value in 1..=9 {
            cards.push(UnoCard::new(Face::Number { color, value }));
            cards.push(UnoCard::new(Face::Number { color, value }));
        }
        for _ in 0..2 {
            cards.push(UnoCard::new(Face::Skip { color }));
            cards.push(UnoCard::new(Face::Reverse { color }));
            cards.push(UnoCard::new(Face::Draw2 { color }));
        }
    }
    for _ in 0..4 {
        cards.push(UnoCard::new(Face::Wild));
        cards.push(UnoCard::new(Face::Wild4));
    }
    cards.shuffle(rng);
    cards
}

/// Whether `face` may be laid on `top` given the active color.
///
/// Wilds always match; matching color always matches; numbers match equal
/// numbers; action cards match the same action kind regardless of color.
/// The Wild4 hand restriction is enforced by the engine, not here.
#[must_use]
pub fn is_playable(face: Face, top: Option<Face>, current_color: Option<Color>) -> bool {
    if face.is_wild() {
        return true;
    }
    let Some(top) = top else {
        return true;
    };
    if face.color().is_some() && face.color() == current_color {
        return true;
    }
    match (face, top) {
        (Face::Number { value: a, .. }, Face::Number { value: b, .. }) => a == b,
        (Face::Skip { .. }, Face::Skip { .. }) => true,
        (Face::Reverse { .. }, Face::Reverse { .. }) => true,
        (Face::Draw2 { .. }, Face::Draw2 { .. }) => true,
        _ => false,
    }
}
