//! ElGamal encryption of amounts and Pedersen commitments
//!
//! Amounts are encoded as group elements so ciphertexts and commitments both
//! compose additively:
//!
//! - ciphertext: `C1 = r·G`, `C2 = amount·G + r·P` for recipient public `P`
//! - commitment: `amount·H + r2·G2` with an independent blinding `r2`
//!
//! `H` and `G2` are hashed to the group under their own labels, so nobody knows
//! their discrete logs relative to `G` or to each other.

use std::ops::{Add, AddAssign, Sub};

use curve25519_dalek::{
    ristretto::RistrettoPoint,
    scalar::Scalar,
    traits::{Identity, IsIdentity},
};
use rand::rngs::OsRng;

use crate::cache::DerivationCache;
use crate::curve::{basepoint, decode_point, derive_generator, encode_point, labels, random_scalar, Keypair, SecretScalar};
use crate::error::{ConfidentialError, Result};
use crate::keys::OwnerSecret;
use crate::proof::{RangeProof, MAX_SYSTEM_ID_LEN};

/// Serialized ciphertext length (`C1 || C2`)
pub const CIPHERTEXT_LEN: usize = 64;

/// Serialized commitment length
pub const COMMITMENT_LEN: usize = 32;

// ============================================================================
// Keypair
// ============================================================================

/// Owner's encryption identity; `public = private · G`
pub struct ElGamalKeypair {
    keypair: Keypair,
}

impl ElGamalKeypair {
    /// Derive deterministically from the owner secret
    pub fn derive(owner_secret: &OwnerSecret) -> Self {
        Self {
            keypair: Keypair::derive(owner_secret.as_bytes(), labels::ELGAMAL),
        }
    }

    pub fn generate() -> Self {
        Self {
            keypair: Keypair::generate(),
        }
    }

    pub fn from_secret_bytes(bytes: &[u8; 32]) -> Result<Self> {
        Ok(Self {
            keypair: Keypair::from_secret_bytes("elgamal_private", bytes)?,
        })
    }

    pub fn private_scalar(&self) -> &SecretScalar {
        self.keypair.secret()
    }

    pub fn public_point(&self) -> RistrettoPoint {
        self.keypair.public()
    }

    pub fn public_bytes(&self) -> [u8; 32] {
        self.keypair.public_bytes()
    }
}

impl std::fmt::Debug for ElGamalKeypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElGamalKeypair")
            .field("public", &hex::encode(self.public_bytes()))
            .finish_non_exhaustive()
    }
}

/// Decode a recipient's 32-byte ElGamal public key
pub fn decode_public_key(bytes: &[u8]) -> Result<RistrettoPoint> {
    let point = decode_point("recipient_public", bytes)?;
    check_public_key(&point)?;
    Ok(point)
}

/// Reject the identity: under it `C2 = amount·G` and the amount is public
pub fn check_public_key(point: &RistrettoPoint) -> Result<()> {
    if point.is_identity() {
        return Err(ConfidentialError::invalid_key("recipient_public", "point is the identity"));
    }
    Ok(())
}

// ============================================================================
// Ciphertext
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElGamalCiphertext {
    pub c1: RistrettoPoint,
    pub c2: RistrettoPoint,
}

impl ElGamalCiphertext {
    /// The trivial encryption of zero
    pub fn zero() -> Self {
        Self {
            c1: RistrettoPoint::identity(),
            c2: RistrettoPoint::identity(),
        }
    }

    /// Encrypt `amount` under `public` with caller-chosen randomness
    pub fn encrypt_with(amount: u64, public: &RistrettoPoint, randomness: &Scalar) -> Self {
        let g = basepoint();
        Self {
            c1: randomness * g,
            c2: Scalar::from(amount) * g + randomness * public,
        }
    }

    /// `M = C2 - private·C1`, the amount encoded as `amount·G`
    pub fn message_point(&self, private: &Scalar) -> RistrettoPoint {
        self.c2 - private * self.c1
    }

    /// Same plaintext, fresh randomness
    pub fn rerandomize(&self, public: &RistrettoPoint) -> Self {
        let r = random_scalar(&mut OsRng);
        *self + Self::encrypt_with(0, public, &r)
    }

    /// `C1 || C2`
    pub fn to_bytes(&self) -> [u8; CIPHERTEXT_LEN] {
        let mut out = [0u8; CIPHERTEXT_LEN];
        out[..32].copy_from_slice(&encode_point(&self.c1));
        out[32..].copy_from_slice(&encode_point(&self.c2));
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != CIPHERTEXT_LEN {
            return Err(ConfidentialError::malformed("ciphertext", "expected 64 bytes"));
        }
        let c1 = decode_point("c1", &bytes[..32])
            .map_err(|_| ConfidentialError::malformed("c1", "invalid curve encoding"))?;
        let c2 = decode_point("c2", &bytes[32..])
            .map_err(|_| ConfidentialError::malformed("c2", "invalid curve encoding"))?;
        Ok(Self { c1, c2 })
    }
}

impl Add for ElGamalCiphertext {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            c1: self.c1 + other.c1,
            c2: self.c2 + other.c2,
        }
    }
}

impl Sub for ElGamalCiphertext {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self {
            c1: self.c1 - other.c1,
            c2: self.c2 - other.c2,
        }
    }
}

// ============================================================================
// Pedersen Commitments
// ============================================================================

/// The commitment bases `H` (amount) and `G2` (blinding)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PedersenGenerators {
    pub h: RistrettoPoint,
    pub g2: RistrettoPoint,
}

impl PedersenGenerators {
    pub fn derive() -> Self {
        Self {
            h: derive_generator(labels::PEDERSEN_AMOUNT),
            g2: derive_generator(labels::PEDERSEN_BLINDING),
        }
    }

    pub fn from_cache(cache: &DerivationCache) -> Self {
        Self {
            h: cache.generator(labels::PEDERSEN_AMOUNT),
            g2: cache.generator(labels::PEDERSEN_BLINDING),
        }
    }

    pub fn commit(&self, value: &Scalar, blinding: &Scalar) -> PedersenCommitment {
        PedersenCommitment(value * self.h + blinding * self.g2)
    }
}

impl Default for PedersenGenerators {
    fn default() -> Self {
        Self::derive()
    }
}

/// `value·H + blinding·G2`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PedersenCommitment(RistrettoPoint);

impl PedersenCommitment {
    pub fn commit(value: &Scalar, blinding: &Scalar) -> Self {
        PedersenGenerators::derive().commit(value, blinding)
    }

    pub fn commit_amount(amount: u64, blinding: &Scalar) -> Self {
        Self::commit(&Scalar::from(amount), blinding)
    }

    /// The commitment to zero with zero blinding
    pub fn identity() -> Self {
        Self(RistrettoPoint::identity())
    }

    /// Check an opening against the given generators
    pub fn opens_to(&self, generators: &PedersenGenerators, amount: u64, blinding: &Scalar) -> bool {
        generators.commit(&Scalar::from(amount), blinding) == *self
    }

    pub fn point(&self) -> RistrettoPoint {
        self.0
    }

    pub fn to_bytes(&self) -> [u8; COMMITMENT_LEN] {
        encode_point(&self.0)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        decode_point("commitment", bytes)
            .map(Self)
            .map_err(|_| ConfidentialError::malformed("commitment", "invalid curve encoding"))
    }
}

impl Add for PedersenCommitment {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self(self.0 + other.0)
    }
}

impl AddAssign for PedersenCommitment {
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for PedersenCommitment {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self(self.0 - other.0)
    }
}

// ============================================================================
// Encrypted Amount
// ============================================================================

/// Creator-only secrets behind an `EncryptedAmount`
#[derive(Debug, Clone)]
pub struct AmountOpening {
    pub amount: u64,
    /// `r` in `C1 = r·G`
    pub ciphertext_randomness: SecretScalar,
    /// `r2` in `commitment = amount·H + r2·G2`
    pub commitment_blinding: SecretScalar,
}

/// One encrypted value in transit
#[derive(Debug, Clone)]
pub struct EncryptedAmount {
    pub ciphertext: ElGamalCiphertext,
    pub commitment: PedersenCommitment,
    pub range_proof: RangeProof,
    /// Present only on the creator's copy; never serialized
    pub opening: Option<AmountOpening>,
}

impl EncryptedAmount {
    /// Drop the creator-only opening before handing the value on
    pub fn without_opening(&self) -> Self {
        Self {
            opening: None,
            ..self.clone()
        }
    }

    /// `C1 || C2 || commitment || id_len(u8) || system_id || proof_len(u32 LE) || proof`
    ///
    /// Fails if the system id exceeds `MAX_SYSTEM_ID_LEN` bytes or the proof
    /// does not fit a 32-bit length.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let id = self.range_proof.system_id.as_bytes();
        let proof = &self.range_proof.bytes;
        let id_len = u8::try_from(id.len())
            .map_err(|_| ConfidentialError::malformed("range_proof", "system id longer than 255 bytes"))?;
        let proof_len = u32::try_from(proof.len())
            .map_err(|_| ConfidentialError::malformed("range_proof", "proof longer than u32::MAX bytes"))?;

        let mut out = Vec::with_capacity(CIPHERTEXT_LEN + COMMITMENT_LEN + 1 + id.len() + 4 + proof.len());
        out.extend_from_slice(&self.ciphertext.to_bytes());
        out.extend_from_slice(&self.commitment.to_bytes());
        out.push(id_len);
        out.extend_from_slice(id);
        out.extend_from_slice(&proof_len.to_le_bytes());
        out.extend_from_slice(proof);
        Ok(out)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let header = CIPHERTEXT_LEN + COMMITMENT_LEN;
        if bytes.len() < header + 1 {
            return Err(ConfidentialError::malformed("encrypted_amount", "truncated header"));
        }
        let ciphertext = ElGamalCiphertext::from_bytes(&bytes[..CIPHERTEXT_LEN])?;
        let commitment = PedersenCommitment::from_bytes(&bytes[CIPHERTEXT_LEN..header])?;

        let id_len = bytes[header] as usize;
        let id_start = header + 1;
        let id_end = id_start + id_len;
        if bytes.len() < id_end + 4 {
            return Err(ConfidentialError::malformed("range_proof", "truncated system id"));
        }
        let system_id = std::str::from_utf8(&bytes[id_start..id_end])
            .map_err(|_| ConfidentialError::malformed("range_proof", "system id is not UTF-8"))?
            .to_string();

        let mut len_bytes = [0u8; 4];
        len_bytes.copy_from_slice(&bytes[id_end..id_end + 4]);
        let proof_len = u32::from_le_bytes(len_bytes) as usize;
        let proof_start = id_end + 4;
        if bytes.len() != proof_start + proof_len {
            return Err(ConfidentialError::malformed("range_proof", "proof length mismatch"));
        }

        Ok(Self {
            ciphertext,
            commitment,
            range_proof: RangeProof {
                system_id,
                bytes: bytes[proof_start..].to_vec(),
            },
            opening: None,
        })
    }
}
