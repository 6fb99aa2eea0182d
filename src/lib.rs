//! fairdice
//!
//! Two-party fair dice roll over a commit-reveal exchange. The initiator
//! commits to its face with a keyed BLAKE2b digest, the responder answers with
//! its own face in the clear, and the initiator then opens the commitment.
//! Neither side can pick its face after seeing the other's.
//!
//! - `crypto`: commitment scheme and nonces
//! - `outcome`: the shared combination rule
//! - `protocol`: per-role state machines, the responder engine, async drivers
//! - `p2p`: wire messages and channels (in-memory, framed TCP)
//! - `cli`: responder node and initiator client

pub mod cli;
pub mod config;
pub mod crypto;
pub mod error;
pub mod outcome;
pub mod p2p;
pub mod protocol;
pub mod types;

// Re-export commonly used types and functions
pub use config::Config;
pub use crypto::{
    create_commitment, verify_commitment, Blake2bCommitment, Commitment, CommitmentScheme, Nonce,
};
pub use error::{DiceError, Result};
pub use outcome::{combine, Outcome};
pub use p2p::{Channel, DiceMessage, MemoryChannel, RevealPacket, TcpChannel};
pub use protocol::{run_initiator, run_responder, InitiatorSession, ResponderEngine, ResponderSession};
pub use types::{DieFace, Identity, PeerID};
