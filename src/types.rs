// =============================================================================
// Shared types used across the SMC chart engine
// =============================================================================

use serde::{Deserialize, Serialize};

/// Which side of the market an order-block zone belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ZoneDirection {
    Bullish,
    Bearish,
}

impl std::fmt::Display for ZoneDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bullish => write!(f, "Bullish"),
            Self::Bearish => write!(f, "Bearish"),
        }
    }
}

/// Direction in which a break of structure pushed through the prior extreme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BreakDirection {
    Up,
    Down,
}

impl std::fmt::Display for BreakDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Up => write!(f, "Up"),
            Self::Down => write!(f, "Down"),
        }
    }
}
