//! Wire messages exchanged during a dice run

use crate::crypto::{Commitment, Nonce};
use crate::types::{DieFace, Identity};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opening of an earlier commitment, sent once the peer's value is known
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealPacket {
    pub identity: Identity,
    pub value: DieFace,
    pub nonce: Nonce,
    pub commitment: Commitment,
}

/// Network message envelope
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiceMessage {
    /// Initiator's commitment, always the first message of a run
    Commit {
        identity: Identity,
        commitment: Commitment,
    },
    /// Responder's face, in the clear
    PeerValue { value: DieFace },
    /// Initiator's opening
    Reveal(RevealPacket),
}

impl DiceMessage {
    /// Variant name, used in protocol errors and logs
    pub fn kind(&self) -> MessageKind {
        match self {
            DiceMessage::Commit { .. } => MessageKind::Commit,
            DiceMessage::PeerValue { .. } => MessageKind::PeerValue,
            DiceMessage::Reveal(_) => MessageKind::Reveal,
        }
    }

    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(data: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(data)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageKind {
    Commit,
    PeerValue,
    Reveal,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageKind::Commit => "Commit",
            MessageKind::PeerValue => "PeerValue",
            MessageKind::Reveal => "Reveal",
        };
        f.write_str(name)
    }
}
