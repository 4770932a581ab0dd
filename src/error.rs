// =============================================================================
// Error taxonomy for the chart pipeline
// =============================================================================
//
// Detector-level data shortage is recovered locally (empty result list), so
// `InsufficientData` only reaches callers that use the `*_checked` detector
// entry points.  Everything else is surfaced to the requester with its kind
// name so the reply can say what went wrong.
// =============================================================================

use thiserror::Error;

/// Failure kinds produced by normalization, detection and rendering.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SignalError {
    #[error("{detector} needs at least {required} candles, got {actual}")]
    InsufficientData {
        detector: &'static str,
        required: usize,
        actual: usize,
    },

    #[error("row {row} rejected: {reason}")]
    MalformedCandle { row: usize, reason: String },

    #[error("no valid candles for {symbol} {interval}")]
    NoData { symbol: String, interval: String },

    #[error("chart rendering failed: {0}")]
    RenderingFailure(String),

    #[error("collaborator failed: {0}")]
    Collaborator(String),
}

impl SignalError {
    /// Short, stable name of the failure kind (used in user-facing replies).
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InsufficientData { .. } => "InsufficientData",
            Self::MalformedCandle { .. } => "MalformedCandle",
            Self::NoData { .. } => "NoData",
            Self::RenderingFailure(_) => "RenderingFailure",
            Self::Collaborator(_) => "CollaboratorFailure",
        }
    }

    /// Wrap an `anyhow` error coming out of a network collaborator.
    pub fn collaborator(err: &anyhow::Error) -> Self {
        Self::Collaborator(format!("{err:#}"))
    }
}
