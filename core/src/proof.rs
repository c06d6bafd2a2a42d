//! Pluggable range-proof interface
//!
//! The balance engine asks a `ProofSystem` for a proof that a committed amount
//! lies in range, and asks it to check proofs it receives. Only a placeholder
//! ships with this crate. It satisfies the interface for integration testing
//! and binds the proof bytes to the commitment, but proves nothing: a real
//! range prover (Bulletproofs-style) must be plugged in before any claim of
//! amount hiding is made.

use curve25519_dalek::scalar::Scalar;
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::elgamal::PedersenCommitment;
use crate::error::{ConfidentialError, Result};

/// Marker prefix carried by every placeholder proof
pub const PLACEHOLDER_MARKER: &[u8] = b"PLACEHOLDER-NOT-SECURE";

/// Identifier of the bundled placeholder
pub const PLACEHOLDER_SYSTEM_ID: &str = "placeholder";

/// Longest system id an `EncryptedAmount` can carry on the wire
pub const MAX_SYSTEM_ID_LEN: usize = u8::MAX as usize;

/// Domain separator binding placeholder proofs to a commitment
const PLACEHOLDER_DOMAIN: &[u8] = b"confidential_core/placeholder-proof/v1";

/// What a range proof attests: `commitment = amount·H + blinding·G2`
/// with `amount` in range
pub struct RangeStatement<'a> {
    pub amount: u64,
    pub blinding: &'a Scalar,
    pub commitment: &'a PedersenCommitment,
}

/// Proof bytes tagged with the system that produced them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeProof {
    pub system_id: String,
    pub bytes: Vec<u8>,
}

impl RangeProof {
    /// True if the bytes come from the non-cryptographic placeholder
    pub fn is_placeholder(&self) -> bool {
        self.system_id == PLACEHOLDER_SYSTEM_ID || self.bytes.starts_with(PLACEHOLDER_MARKER)
    }
}

pub trait ProofSystem: Send + Sync {
    /// Stable identifier recorded in every proof, at most `MAX_SYSTEM_ID_LEN` bytes
    fn id(&self) -> &'static str;

    /// True if proofs from this system carry no security guarantee
    fn is_placeholder(&self) -> bool;

    fn generate(&self, statement: &RangeStatement<'_>) -> Result<RangeProof>;

    fn verify(&self, proof: &RangeProof, commitment: &PedersenCommitment) -> Result<bool>;
}

/// Structurally valid, cryptographically meaningless proofs
///
/// Output is `PLACEHOLDER-NOT-SECURE || SHA-256(domain || commitment)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaceholderProofSystem;

impl PlaceholderProofSystem {
    fn binding(commitment: &PedersenCommitment) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(PLACEHOLDER_DOMAIN);
        hasher.update(commitment.to_bytes());
        let mut out = [0u8; 32];
        out.copy_from_slice(&hasher.finalize());
        out
    }
}

impl ProofSystem for PlaceholderProofSystem {
    fn id(&self) -> &'static str {
        PLACEHOLDER_SYSTEM_ID
    }

    fn is_placeholder(&self) -> bool {
        true
    }

    fn generate(&self, statement: &RangeStatement<'_>) -> Result<RangeProof> {
        warn!("generating placeholder range proof - provides no security guarantee");

        let mut bytes = Vec::with_capacity(PLACEHOLDER_MARKER.len() + 32);
        bytes.extend_from_slice(PLACEHOLDER_MARKER);
        bytes.extend_from_slice(&Self::binding(statement.commitment));

        Ok(RangeProof {
            system_id: PLACEHOLDER_SYSTEM_ID.to_string(),
            bytes,
        })
    }

    fn verify(&self, proof: &RangeProof, commitment: &PedersenCommitment) -> Result<bool> {
        if proof.system_id != PLACEHOLDER_SYSTEM_ID {
            return Ok(false);
        }
        let Some(binding) = proof.bytes.strip_prefix(PLACEHOLDER_MARKER) else {
            return Ok(false);
        };
        Ok(binding == Self::binding(commitment).as_slice())
    }
}

/// Fail with `ProofUnavailable` when `system` cannot back a security claim
pub fn require_sound(system: &dyn ProofSystem) -> Result<()> {
    if system.is_placeholder() {
        return Err(ConfidentialError::ProofUnavailable { system: system.id() });
    }
    Ok(())
}
