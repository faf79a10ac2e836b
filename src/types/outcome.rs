//! Game outcome types: one emitted "double" round.

// =============================================================================
// COLOR
// =============================================================================

/// Roulette-like color of a double round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    Red,
    Black,
    White,
}

impl Color {
    /// Parse the wire representation (`"red"`, `"black"`, `"white"`).
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "red" => Some(Color::Red),
            "black" => Some(Color::Black),
            "white" => Some(Color::White),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Color::Red => "red",
            Color::Black => "black",
            Color::White => "white",
        }
    }

    /// Opposite non-white color. White has no opposite.
    pub fn opposite(&self) -> Option<Color> {
        match self {
            Color::Red => Some(Color::Black),
            Color::Black => Some(Color::Red),
            Color::White => None,
        }
    }

    /// Board numbers paying out on this color.
    pub fn numbers(&self) -> Vec<i32> {
        match self {
            Color::Red => (1..=7).collect(),
            Color::Black => (8..=14).collect(),
            Color::White => vec![0],
        }
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// OUTCOME
// =============================================================================

/// One received round. Never mutated after parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub color: Color,
    pub number: i32,
    pub timestamp_ms: i64,
}

impl Outcome {
    pub fn new(color: Color, number: i32, timestamp_ms: i64) -> Self {
        Self {
            color,
            number,
            timestamp_ms,
        }
    }
}

// =============================================================================
// SIGNAL CLASSIFICATION
// =============================================================================

/// Terminal classification of a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resolution {
    Win,
    Loss,
}

impl Resolution {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "win" => Some(Resolution::Win),
            "loss" => Some(Resolution::Loss),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Win => "win",
            Resolution::Loss => "loss",
        }
    }

    pub fn is_win(&self) -> bool {
        matches!(self, Resolution::Win)
    }
}
