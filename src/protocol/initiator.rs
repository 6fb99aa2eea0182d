//! Initiator side of a dice run

use crate::crypto::{Blake2bCommitment, Commitment, CommitmentScheme, Nonce};
use crate::error::{DiceError, Result};
use crate::outcome::Outcome;
use crate::p2p::channel::RECEIVE_STATE;
use crate::p2p::{DiceMessage, RevealPacket};
use crate::types::{DieFace, Identity};

use super::types::InitiatorState;

/// One run of the committing party
///
/// Sessions are single-use: each owns a fresh nonce that never outlives the run.
pub struct InitiatorSession<S: CommitmentScheme = Blake2bCommitment> {
    identity: Identity,
    scheme: S,
    state: InitiatorState,
    pick: Option<(DieFace, Nonce)>,
    value: Option<DieFace>,
    nonce: Option<Nonce>,
    commitment: Option<Commitment>,
    peer_value: Option<DieFace>,
}

impl InitiatorSession<Blake2bCommitment> {
    /// Session that rolls its own face and nonce on commit
    pub fn new(identity: Identity) -> Self {
        Self::with_scheme(identity, Blake2bCommitment)
    }

    /// Session committing to a chosen face and nonce
    pub fn with_pick(identity: Identity, value: DieFace, nonce: Nonce) -> Self {
        let mut session = Self::new(identity);
        session.pick = Some((value, nonce));
        session
    }
}

impl<S: CommitmentScheme> InitiatorSession<S> {
    pub fn with_scheme(identity: Identity, scheme: S) -> Self {
        Self {
            identity,
            scheme,
            state: InitiatorState::Idle,
            pick: None,
            value: None,
            nonce: None,
            commitment: None,
            peer_value: None,
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn state(&self) -> InitiatorState {
        self.state
    }

    pub fn commitment(&self) -> Option<&Commitment> {
        self.commitment.as_ref()
    }

    pub fn peer_value(&self) -> Option<DieFace> {
        self.peer_value
    }

    /// Whether any secret material is still held
    pub fn holds_secret(&self) -> bool {
        self.nonce.is_some() || self.pick.is_some()
    }

    /// `Idle -> Committed`: returns the Commit message to emit
    pub fn commit(&mut self) -> Result<DiceMessage> {
        self.expect_state(InitiatorState::Idle, "commit")?;

        let (value, nonce) = self
            .pick
            .take()
            .unwrap_or_else(|| (DieFace::roll(), Nonce::generate()));
        let commitment = self.scheme.create(&self.identity, value, &nonce);

        self.value = Some(value);
        self.nonce = Some(nonce);
        self.commitment = Some(commitment);
        self.state = InitiatorState::Committed;

        tracing::info!(
            "{} committed to a face (commitment {})",
            self.identity,
            commitment.short()
        );

        Ok(DiceMessage::Commit {
            identity: self.identity.clone(),
            commitment,
        })
    }

    /// `Committed -> AwaitingPeerValue`
    pub fn await_peer_value(&mut self) -> Result<()> {
        self.expect_state(InitiatorState::Committed, "await peer value")?;
        self.state = InitiatorState::AwaitingPeerValue;
        Ok(())
    }

    /// `AwaitingPeerValue -> PeerValueReceived`
    pub fn receive_peer_value(&mut self, message: DiceMessage) -> Result<DieFace> {
        self.expect_state(InitiatorState::AwaitingPeerValue, message.kind())?;

        match message {
            DiceMessage::PeerValue { value } => {
                self.peer_value = Some(value);
                self.state = InitiatorState::PeerValueReceived;
                tracing::info!("Peer rolled {}", value);
                Ok(value)
            }
            other => Err(self.fail(DiceError::protocol(
                self.state,
                "PeerValue",
                other.kind(),
            ))),
        }
    }

    /// `PeerValueReceived -> Revealed`: returns the Reveal message and hands
    /// the nonce over to it
    pub fn reveal(&mut self) -> Result<DiceMessage> {
        self.expect_state(InitiatorState::PeerValueReceived, "reveal")?;

        let (value, nonce, commitment) =
            match (self.value, self.nonce.take(), self.commitment) {
                (Some(value), Some(nonce), Some(commitment)) => (value, nonce, commitment),
                _ => {
                    return Err(self.fail(DiceError::protocol(
                        self.state,
                        "committed secret",
                        "missing secret material",
                    )))
                }
            };

        self.state = InitiatorState::Revealed;
        tracing::info!("{} revealed {}", self.identity, value);

        Ok(DiceMessage::Reveal(RevealPacket {
            identity: self.identity.clone(),
            value,
            nonce,
            commitment,
        }))
    }

    /// `Revealed -> Done`: computes the outcome locally
    pub fn finish(&mut self) -> Result<Outcome> {
        self.expect_state(InitiatorState::Revealed, "finish")?;

        let (value, peer_value) = match (self.value, self.peer_value) {
            (Some(value), Some(peer_value)) => (value, peer_value),
            _ => {
                return Err(self.fail(DiceError::protocol(
                    self.state,
                    "both faces",
                    "missing face",
                )))
            }
        };

        self.state = InitiatorState::Done;
        Ok(Outcome::new(value, peer_value))
    }

    /// Move to `Aborted` and drop all secret material
    pub fn abort(&mut self) {
        if !self.state.is_terminal() {
            tracing::warn!("{} aborted run in state {}", self.identity, self.state);
            self.state = InitiatorState::Aborted;
        }
        self.pick = None;
        self.nonce = None;
        self.value = None;
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

    fn fail(&mut self, err: DiceError) -> DiceError {
        self.abort();
        err
    }

    fn expect_state(&mut self, expected: InitiatorState, action: impl ToString) -> Result<()> {
        if self.state == expected {
            return Ok(());
        }
        let err = DiceError::protocol(self.state, format!("state {}", expected), action);
        Err(self.fail(err))
    }
}
