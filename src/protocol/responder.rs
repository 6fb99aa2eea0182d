//! Responder side of a dice run

use crate::crypto::{Blake2bCommitment, Commitment, CommitmentScheme};
use crate::error::{DiceError, Result};
use crate::outcome::Outcome;
use crate::p2p::channel::RECEIVE_STATE;
use crate::p2p::{DiceMessage, RevealPacket};
use crate::types::{DieFace, Identity};
use subtle::ConstantTimeEq;

use super::types::ResponderState;

/// One run of the answering party
///
/// The responder moves second and never commits: its face is sent in the clear
/// after the initiator's commitment is stored.
pub struct ResponderSession<S: CommitmentScheme = Blake2bCommitment> {
    scheme: S,
    state: ResponderState,
    pick: Option<DieFace>,
    peer_identity: Option<Identity>,
    commitment: Option<Commitment>,
    own_value: Option<DieFace>,
    outcome: Option<Outcome>,
}

impl ResponderSession<Blake2bCommitment> {
    pub fn new() -> Self {
        Self::with_scheme(Blake2bCommitment)
    }

    /// Session answering with a chosen face
    pub fn with_pick(value: DieFace) -> Self {
        let mut session = Self::new();
        session.pick = Some(value);
        session
    }
}

impl Default for ResponderSession<Blake2bCommitment> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: CommitmentScheme> ResponderSession<S> {
    pub fn with_scheme(scheme: S) -> Self {
        Self {
            scheme,
            state: ResponderState::Listening,
            pick: None,
            peer_identity: None,
            commitment: None,
            own_value: None,
            outcome: None,
        }
    }

    pub fn state(&self) -> ResponderState {
        self.state
    }

    pub fn peer_identity(&self) -> Option<&Identity> {
        self.peer_identity.as_ref()
    }

    pub fn commitment(&self) -> Option<&Commitment> {
        self.commitment.as_ref()
    }

    pub fn own_value(&self) -> Option<DieFace> {
        self.own_value
    }

    /// Outcome, available once the opening verified
    pub fn outcome(&self) -> Option<&Outcome> {
        self.outcome.as_ref()
    }

    /// `Listening -> CommitmentReceived`
    pub fn receive_commit(&mut self, message: DiceMessage) -> Result<()> {
        self.expect_state(ResponderState::Listening, message.kind())?;

        match message {
            DiceMessage::Commit {
                identity,
                commitment,
            } => {
                tracing::info!(
                    "Received commitment {} from {}",
                    commitment.short(),
                    identity
                );
                self.peer_identity = Some(identity);
                self.commitment = Some(commitment);
                self.state = ResponderState::CommitmentReceived;
                Ok(())
            }
            other => Err(self.fail(DiceError::protocol(self.state, "Commit", other.kind()))),
        }
    }

    /// `CommitmentReceived -> ValueGenerated`: returns the PeerValue message
    pub fn generate_value(&mut self) -> Result<DiceMessage> {
        self.expect_state(ResponderState::CommitmentReceived, "generate value")?;

        let value = self.pick.take().unwrap_or_else(DieFace::roll);
        self.own_value = Some(value);
        self.state = ResponderState::ValueGenerated;
        tracing::info!("Responder rolled {}", value);

        Ok(DiceMessage::PeerValue { value })
    }

    /// `ValueGenerated -> AwaitingReveal`
    pub fn await_reveal(&mut self) -> Result<()> {
        self.expect_state(ResponderState::ValueGenerated, "await reveal")?;
        self.state = ResponderState::AwaitingReveal;
        Ok(())
    }

    /// `AwaitingReveal -> Verified | Failed`
    pub fn receive_reveal(&mut self, message: DiceMessage) -> Result<Outcome> {
        self.expect_state(ResponderState::AwaitingReveal, message.kind())?;

        let packet = match message {
            DiceMessage::Reveal(packet) => packet,
            other => {
                return Err(self.fail(DiceError::protocol(self.state, "Reveal", other.kind())))
            }
        };

        let (identity, commitment, own_value) =
            match (self.peer_identity.take(), self.commitment, self.own_value) {
                (Some(identity), Some(commitment), Some(own_value)) => {
                    (identity, commitment, own_value)
                }
                _ => {
                    return Err(self.fail(DiceError::protocol(
                        self.state,
                        "stored commitment",
                        "missing run state",
                    )))
                }
            };

        if let Err(err) = self.check_opening(&identity, &commitment, &packet) {
            tracing::warn!("Opening from {} failed verification", packet.identity);
            self.state = ResponderState::Failed;
            self.commitment = None;
            return Err(err);
        }

        let outcome = Outcome::new(packet.value, own_value);
        tracing::info!("Verified {}'s face {}", identity, packet.value);

        self.peer_identity = Some(identity);
        self.outcome = Some(outcome);
        self.state = ResponderState::Verified;
        Ok(outcome)
    }

    /// `Verified -> Done`
    pub fn finish(&mut self) -> Result<Outcome> {
        self.expect_state(ResponderState::Verified, "finish")?;

        match self.outcome {
            Some(outcome) => {
                self.state = ResponderState::Done;
                Ok(outcome)
            }
            None => Err(self.fail(DiceError::protocol(self.state, "outcome", "none"))),
        }
    }

    /// Move to `Aborted` and drop run state
    pub fn abort(&mut self) {
        if !self.state.is_terminal() {
            tracing::warn!("Responder aborted run in state {}", self.state);
            self.state = ResponderState::Aborted;
        }
        self.pick = None;
        self.commitment = None;
        self.outcome = None;
    }

    /// Abort, re-tagging channel-level errors with the state they hit
    pub fn abort_with(&mut self, err: DiceError) -> DiceError {
        let state = self.state.to_string();
        self.abort();
        match err {
            DiceError::Timeout { after, .. } => DiceError::Timeout { state, after },
            DiceError::Protocol {
                state: s,
                expected,
                received,
            } if s == RECEIVE_STATE => DiceError::Protocol {
                state,
                expected,
                received,
            },
            other => other,
        }
    }

    /// The opening must name the committed identity, carry the stored
    /// commitment, and recompute to it
    fn check_opening(
        &self,
        identity: &Identity,
        commitment: &Commitment,
        packet: &RevealPacket,
    ) -> Result<()> {
        let mismatch = || DiceError::CommitmentMismatch {
            identity: identity.to_string(),
        };

        if packet.identity != *identity {
            return Err(mismatch());
        }
        if !bool::from(packet.commitment.as_bytes().as_slice().ct_eq(commitment.as_bytes().as_slice())) {
            return Err(mismatch());
        }
        self.scheme
            .verify(&packet.identity, commitment, packet.value, &packet.nonce)
    }

    fn fail(&mut self, err: DiceError) -> DiceError {
        self.abort();
        err
    }

    fn expect_state(&mut self, expected: ResponderState, action: impl ToString) -> Result<()> {
        if self.state == expected {
            return Ok(());
        }
        let err = DiceError::protocol(self.state, format!("state {}", expected), action);
        Err(self.fail(err))
    }
}
