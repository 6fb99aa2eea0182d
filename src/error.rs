//! Error types for fairdice

use std::time::Duration;
use thiserror::Error;

/// Main error type for fairdice
///
/// Every protocol variant is terminal for the run that produced it. Callers may
/// reconnect the channel, but never replay a step of the same run.
#[derive(Error, Debug)]
pub enum DiceError {
    // Channel errors
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Timed out after {after:?} in state {state}")]
    Timeout { state: String, after: Duration },

    // Protocol errors
    #[error("Protocol violation in state {state}: expected {expected}, received {received}")]
    Protocol {
        state: String,
        expected: String,
        received: String,
    },

    #[error("Commitment mismatch for {identity}")]
    CommitmentMismatch { identity: String },

    // Domain errors
    #[error("Invalid die face: {0}")]
    InvalidDieFace(u8),

    #[error("Invalid identity: {0}")]
    InvalidIdentity(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    // General errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),
}

impl DiceError {
    /// Build a protocol violation from anything displayable
    pub fn protocol(
        state: impl ToString,
        expected: impl ToString,
        received: impl ToString,
    ) -> Self {
        DiceError::Protocol {
            state: state.to_string(),
            expected: expected.to_string(),
            received: received.to_string(),
        }
    }

    /// True when the peer must be treated as adversarial
    pub fn is_adversarial(&self) -> bool {
        matches!(self, DiceError::CommitmentMismatch { .. })
    }
}

/// Result type alias for fairdice operations
pub type Result<T> = std::result::Result<T, DiceError>;
