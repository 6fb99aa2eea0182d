//! Core types used throughout fairdice

use crate::error::{DiceError, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of faces on the die
pub const DIE_SIDES: u8 = 6;

/// A single die face in `1..=DIE_SIDES`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct DieFace(u8);

impl DieFace {
    /// Create a face, rejecting anything outside `1..=6`
    pub fn new(value: u8) -> Result<Self> {
        if (1..=DIE_SIDES).contains(&value) {
            Ok(DieFace(value))
        } else {
            Err(DiceError::InvalidDieFace(value))
        }
    }

    /// Roll a face using the thread-local CSPRNG
    pub fn roll() -> Self {
        DieFace(rand::thread_rng().gen_range(1..=DIE_SIDES))
    }

    /// Face for a zero-based offset, wrapping modulo the number of sides
    pub fn from_offset(offset: u8) -> Self {
        DieFace(offset % DIE_SIDES + 1)
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    /// Canonical byte encoding bound into commitments
    pub fn to_bytes(&self) -> [u8; 1] {
        [self.0]
    }
}

impl TryFrom<u8> for DieFace {
    type Error = DiceError;

    fn try_from(value: u8) -> Result<Self> {
        DieFace::new(value)
    }
}

impl From<DieFace> for u8 {
    fn from(face: DieFace) -> u8 {
        face.0
    }
}

impl fmt::Display for DieFace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Label of the committing party, bound into its commitment
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity(String);

impl Identity {
    /// Longest identity accepted, in bytes
    pub const MAX_LEN: usize = 255;

    pub fn new(label: impl Into<String>) -> Result<Self> {
        let label = label.into();
        if label.is_empty() {
            return Err(DiceError::InvalidIdentity("identity is empty".to_string()));
        }
        if label.len() > Self::MAX_LEN {
            return Err(DiceError::InvalidIdentity(format!(
                "identity is {} bytes, max {}",
                label.len(),
                Self::MAX_LEN
            )));
        }
        Ok(Identity(label))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl TryFrom<String> for Identity {
    type Error = DiceError;

    fn try_from(label: String) -> Result<Self> {
        Identity::new(label)
    }
}

impl From<Identity> for String {
    fn from(identity: Identity) -> String {
        identity.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Peer identifier for a single connection on the responder node
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerID(pub String);

impl fmt::Display for PeerID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
