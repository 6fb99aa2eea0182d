//! Cryptography module for fairdice

pub mod commitment;
pub mod types;

pub use commitment::{create_commitment, verify_commitment, Blake2bCommitment, CommitmentScheme};
pub use types::{Commitment, Nonce, COMMITMENT_LEN, NONCE_LEN};
