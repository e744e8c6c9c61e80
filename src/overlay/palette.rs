//! Node state encoding.
//!
//! One palette is shared by the map overlay, the fallback network view, the
//! count pills and the results chart, so a node always renders in the color of
//! the bucket it is counted in.

use egui::{Color32, Stroke};

/// Discrete per-node simulation state as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NodeState {
    #[default]
    Susceptible,
    Exposed,
    Infected,
    Quarantined,
    Recovered,
}

impl NodeState {
    /// All states in wire-code order.
    pub const ALL: [NodeState; 5] = [
        NodeState::Susceptible,
        NodeState::Exposed,
        NodeState::Infected,
        NodeState::Quarantined,
        NodeState::Recovered,
    ];

    /// Decode a wire state code. Anything outside `0..=4` is unknown.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(NodeState::Susceptible),
            1 => Some(NodeState::Exposed),
            2 => Some(NodeState::Infected),
            3 => Some(NodeState::Quarantined),
            4 => Some(NodeState::Recovered),
            _ => None,
        }
    }

    #[cfg(test)]
    pub fn code(self) -> u8 {
        match self {
            NodeState::Susceptible => 0,
            NodeState::Exposed => 1,
            NodeState::Infected => 2,
            NodeState::Quarantined => 3,
            NodeState::Recovered => 4,
        }
    }

    /// Single-letter key used by the backend's count and series objects.
    pub fn letter(self) -> &'static str {
        match self {
            NodeState::Susceptible => "S",
            NodeState::Exposed => "E",
            NodeState::Infected => "I",
            NodeState::Quarantined => "Q",
            NodeState::Recovered => "R",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            NodeState::Susceptible => "Susceptible",
            NodeState::Exposed => "Exposed",
            NodeState::Infected => "Infected",
            NodeState::Quarantined => "Quarantined",
            NodeState::Recovered => "Recovered",
        }
    }

    pub fn color(self) -> Color32 {
        match self {
            NodeState::Susceptible => Color32::from_rgb(0x94, 0xa3, 0xb8), // slate gray
            NodeState::Exposed => Color32::from_rgb(0xf5, 0x9e, 0x0b),     // amber
            NodeState::Infected => Color32::from_rgb(0xef, 0x44, 0x44),    // red
            NodeState::Quarantined => Color32::from_rgb(0x3b, 0x82, 0xf6), // blue
            NodeState::Recovered => Color32::from_rgb(0x22, 0xc5, 0x5e),   // green
        }
    }
}

/// Color for a raw state code; unknown codes fall back to Susceptible.
pub fn color_of(code: i64) -> Color32 {
    NodeState::from_code(code).unwrap_or_default().color()
}

/// Only quarantined nodes get the darker highlight ring.
pub fn needs_highlight_ring(code: i64) -> bool {
    NodeState::from_code(code) == Some(NodeState::Quarantined)
}

/// Stroke used for the quarantine highlight ring.
pub fn highlight_ring() -> Stroke {
    Stroke::new(1.2, Color32::from_rgba_unmultiplied(59, 130, 246, 230))
}
