//! Protocol state machines

use serde::{Deserialize, Serialize};
use std::fmt;

/// Initiator state machine
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InitiatorState {
    Idle,
    /// Commitment computed and handed to the channel
    Committed,
    AwaitingPeerValue,
    PeerValueReceived,
    /// Opening handed to the channel
    Revealed,
    Done,
    Aborted,
}

impl InitiatorState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, InitiatorState::Done | InitiatorState::Aborted)
    }
}

impl fmt::Display for InitiatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Responder state machine
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponderState {
    Listening,
    CommitmentReceived,
    ValueGenerated,
    AwaitingReveal,
    Verified,
    /// Opening did not match the commitment; the peer is adversarial
    Failed,
    Done,
    Aborted,
}

impl ResponderState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ResponderState::Failed | ResponderState::Done | ResponderState::Aborted
        )
    }
}

impl fmt::Display for ResponderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
