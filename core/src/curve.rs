//! Curve and key-derivation adapter
//!
//! Group arithmetic over Ristretto255 (prime order, 32-byte encodings) and
//! domain-separated derivation of scalars and generators from byte seeds.
//!
//! Security features:
//! - Secret scalars are zeroized on drop and never `Copy`
//! - Every protocol role hashes under its own label
//! - Derived scalars are never zero

use curve25519_dalek::{
    constants::RISTRETTO_BASEPOINT_POINT,
    ristretto::{CompressedRistretto, RistrettoPoint},
    scalar::Scalar,
};
use rand::{rngs::OsRng, CryptoRng, RngCore};
use sha2::{Digest, Sha512};
use zeroize::Zeroize;

use crate::error::{ConfidentialError, Result};

/// Domain separator for scalar derivation
const DERIVE_SCALAR_DOMAIN: &[u8] = b"confidential_core/scalar/v1";

/// Domain separator for hash-to-group generators
const DERIVE_GENERATOR_DOMAIN: &[u8] = b"confidential_core/generator/v1";

/// Length of a compressed group element
pub const POINT_LEN: usize = 32;

/// Length of a canonical scalar encoding
pub const SCALAR_LEN: usize = 32;

/// Domain labels, one per protocol role
pub mod labels {
    pub const ELGAMAL: &[u8] = b"elgamal";
    pub const PEDERSEN_AMOUNT: &[u8] = b"pedersen-amount";
    pub const PEDERSEN_BLINDING: &[u8] = b"pedersen-blinding";
    pub const STEALTH_VIEW: &[u8] = b"stealth-view";
    pub const STEALTH_SPEND: &[u8] = b"stealth-spend";
    pub const STEALTH_OFFSET: &[u8] = b"stealth-offset";
    pub const ACCOUNT_MASK: &[u8] = b"account-mask";
    pub const OWNER_BALANCE: &[u8] = b"owner-balance";
}

/// The Ristretto base point `G`
pub fn basepoint() -> RistrettoPoint {
    RISTRETTO_BASEPOINT_POINT
}

// ============================================================================
// Zeroizing Scalar Wrapper
// ============================================================================

/// A scalar that zeroizes its contents on drop
#[derive(Clone)]
pub struct SecretScalar {
    bytes: [u8; 32],
}

impl SecretScalar {
    /// Create from raw bytes, reducing mod the group order
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self::from_scalar(&Scalar::from_bytes_mod_order(bytes))
    }

    pub fn from_scalar(scalar: &Scalar) -> Self {
        Self {
            bytes: scalar.to_bytes(),
        }
    }

    pub fn to_scalar(&self) -> Scalar {
        Scalar::from_bytes_mod_order(self.bytes)
    }

    /// Get the raw bytes (use carefully)
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// `self · G`
    pub fn public_point(&self) -> RistrettoPoint {
        self.to_scalar() * RISTRETTO_BASEPOINT_POINT
    }
}

impl Drop for SecretScalar {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for SecretScalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretScalar(..)")
    }
}

// ============================================================================
// Keypair
// ============================================================================

/// A secret scalar together with its public point
///
/// Clone is NOT derived to prevent accidental secret duplication.
pub struct Keypair {
    secret: SecretScalar,
    public: RistrettoPoint,
}

impl Keypair {
    /// Generate a new random keypair from OS entropy
    pub fn generate() -> Self {
        Self::generate_with(&mut OsRng)
    }

    pub fn generate_with<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let scalar = random_scalar(rng);
        Self::from_scalar(&scalar)
    }

    pub fn from_scalar(scalar: &Scalar) -> Self {
        Self {
            secret: SecretScalar::from_scalar(scalar),
            public: scalar * RISTRETTO_BASEPOINT_POINT,
        }
    }

    /// Rebuild from stored secret bytes, rejecting non-canonical or zero scalars
    pub fn from_secret_bytes(field: &'static str, bytes: &[u8; 32]) -> Result<Self> {
        let scalar = decode_scalar(field, bytes)?;
        Ok(Self::from_scalar(&scalar))
    }

    /// Derive deterministically from a seed under a domain label
    pub fn derive(seed: &[u8], label: &[u8]) -> Self {
        Self::from_scalar(&derive_scalar(seed, label))
    }

    pub fn secret(&self) -> &SecretScalar {
        &self.secret
    }

    pub fn public(&self) -> RistrettoPoint {
        self.public
    }

    pub fn public_bytes(&self) -> [u8; 32] {
        encode_point(&self.public)
    }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keypair")
            .field("public", &hex::encode(self.public_bytes()))
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Derivation
// ============================================================================

/// Generate a uniformly random non-zero scalar
pub fn random_scalar<R: RngCore + CryptoRng>(rng: &mut R) -> Scalar {
    let mut wide = [0u8; 64];
    loop {
        rng.fill_bytes(&mut wide);
        let scalar = Scalar::from_bytes_mod_order_wide(&wide);
        if scalar != Scalar::zero() {
            wide.zeroize();
            return scalar;
        }
    }
}

/// Derive a non-zero scalar from `seed` under `label`
///
/// SHA-512(domain || len(label) || label || seed || counter) reduced mod the
/// group order. The counter only advances on a zero result.
pub fn derive_scalar(seed: &[u8], label: &[u8]) -> Scalar {
    let mut counter: u32 = 0;
    loop {
        let mut hasher = Sha512::new();
        hasher.update(DERIVE_SCALAR_DOMAIN);
        hasher.update((label.len() as u32).to_le_bytes());
        hasher.update(label);
        hasher.update(seed);
        hasher.update(counter.to_le_bytes());
        let hash = hasher.finalize();

        let mut wide = [0u8; 64];
        wide.copy_from_slice(&hash);
        let scalar = Scalar::from_bytes_mod_order_wide(&wide);
        wide.zeroize();

        if scalar != Scalar::zero() {
            return scalar;
        }
        counter = counter.wrapping_add(1);
    }
}

/// Hash protocol data to a scalar under a role label
pub fn hash_to_scalar(label: &[u8], data: &[u8]) -> Scalar {
    derive_scalar(data, label)
}

/// Hash a fixed label to an independent generator
///
/// Nobody knows the discrete log of the result relative to `G`.
pub fn derive_generator(label: &[u8]) -> RistrettoPoint {
    let mut hasher = Sha512::new();
    hasher.update(DERIVE_GENERATOR_DOMAIN);
    hasher.update(label);
    let hash = hasher.finalize();

    let mut uniform = [0u8; 64];
    uniform.copy_from_slice(&hash);
    RistrettoPoint::from_uniform_bytes(&uniform)
}

// ============================================================================
// Encodings
// ============================================================================

pub fn encode_point(point: &RistrettoPoint) -> [u8; 32] {
    point.compress().to_bytes()
}

/// Decode a compressed point, reporting `field` on failure
pub fn decode_point(field: &'static str, bytes: &[u8]) -> Result<RistrettoPoint> {
    let array: [u8; 32] = bytes
        .try_into()
        .map_err(|_| ConfidentialError::invalid_key(field, "expected 32 bytes"))?;
    CompressedRistretto(array)
        .decompress()
        .ok_or_else(|| ConfidentialError::invalid_key(field, "not a valid Ristretto encoding"))
}

/// Decode a canonical, non-zero scalar
pub fn decode_scalar(field: &'static str, bytes: &[u8; 32]) -> Result<Scalar> {
    let scalar = Scalar::from_canonical_bytes(*bytes)
        .ok_or_else(|| ConfidentialError::invalid_key(field, "scalar is not canonical"))?;
    if scalar == Scalar::zero() {
        return Err(ConfidentialError::invalid_key(field, "scalar is zero"));
    }
    Ok(scalar)
}
