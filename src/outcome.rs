//! Outcome derivation
//!
//! Both parties hold both faces after the reveal and must agree without any
//! further messages, so the formula is fixed here:
//!
//! ```text
//! result = ((a - 1) + (b - 1)) mod 6 + 1
//! ```
//!
//! It is commutative, and the result is uniform whenever either input is.

use crate::types::DieFace;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Combine two faces into the shared result
pub fn combine(a: DieFace, b: DieFace) -> DieFace {
    DieFace::from_offset((a.value() - 1) + (b.value() - 1))
}

/// Agreed result of a completed run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub initiator_value: DieFace,
    pub responder_value: DieFace,
    pub result: DieFace,
}

impl Outcome {
    /// Both roles call this with the initiator's face first
    pub fn new(initiator_value: DieFace, responder_value: DieFace) -> Self {
        Self {
            initiator_value,
            responder_value,
            result: combine(initiator_value, responder_value),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "initiator rolled {}, responder rolled {}, result {}",
            self.initiator_value, self.responder_value, self.result
        )
    }
}
