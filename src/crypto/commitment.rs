//! Commitment scheme for the dice exchange
//!
//! `C = BLAKE2b-256(key = nonce, personal = "fairdice/commit1",
//!      u32_be(|id|) || id || u32_be(|v|) || v)`
//!
//! Keying with the nonce makes the digest hiding even though the die face
//! has only six values. Length prefixes keep (id, v) pairs from colliding.

use crate::error::{DiceError, Result};
use crate::types::{DieFace, Identity};
use blake2::digest::{consts::U32, Mac};
use blake2::Blake2bMac;
use subtle::ConstantTimeEq;

use super::types::{Commitment, Nonce};

/// Personalization string, exactly 16 bytes as BLAKE2b allows
const PERSONA: &[u8; 16] = b"fairdice/commit1";

type Blake2bMac256 = Blake2bMac<U32>;

/// Create/verify contract for a binding, hiding commitment
pub trait CommitmentScheme: Clone + Send + Sync + 'static {
    /// Deterministically commit to `value` for `identity` under `nonce`
    fn create(&self, identity: &Identity, value: DieFace, nonce: &Nonce) -> Commitment;

    /// Recompute the commitment and compare in constant time
    fn verify(
        &self,
        identity: &Identity,
        commitment: &Commitment,
        value: DieFace,
        nonce: &Nonce,
    ) -> Result<()> {
        let expected = self.create(identity, value, nonce);
        if bool::from(expected.as_bytes().as_slice().ct_eq(commitment.as_bytes().as_slice())) {
            Ok(())
        } else {
            Err(DiceError::CommitmentMismatch {
                identity: identity.to_string(),
            })
        }
    }
}

/// Keyed BLAKE2b commitment scheme
#[derive(Clone, Copy, Debug, Default)]
pub struct Blake2bCommitment;

impl CommitmentScheme for Blake2bCommitment {
    fn create(&self, identity: &Identity, value: DieFace, nonce: &Nonce) -> Commitment {
        // Key and persona are fixed-size and within BLAKE2b limits
        let mut mac = Blake2bMac256::new_with_salt_and_personal(nonce.as_bytes(), &[], PERSONA)
            .expect("32-byte key and 16-byte persona are valid BLAKE2b parameters");

        let value_bytes = value.to_bytes();
        mac.update(&(identity.as_bytes().len() as u32).to_be_bytes());
        mac.update(identity.as_bytes());
        mac.update(&(value_bytes.len() as u32).to_be_bytes());
        mac.update(&value_bytes);

        Commitment::from_bytes(mac.finalize().into_bytes().into())
    }
}

/// Commit with the default scheme
pub fn create_commitment(identity: &Identity, value: DieFace, nonce: &Nonce) -> Commitment {
    Blake2bCommitment.create(identity, value, nonce)
}

/// Verify with the default scheme
pub fn verify_commitment(
    identity: &Identity,
    commitment: &Commitment,
    value: DieFace,
    nonce: &Nonce,
) -> Result<()> {
    Blake2bCommitment.verify(identity, commitment, value, nonce)
}
