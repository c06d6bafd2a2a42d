//! Symmetric sealing of derived key material
//!
//! AES-256-GCM with a fresh random nonce per call. Used only for key material
//! (ephemeral secrets, masked viewing secrets), never for amounts; amounts stay
//! ElGamal-encrypted so they compose additively.
//!
//! Three ways to get a key:
//! - a caller-held `SealingKey`
//! - ECDH against a recipient's public point (`seal_to_point`)
//! - a passphrase stretched with Argon2id (`PassphraseSealed`)

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use argon2::Argon2;
use curve25519_dalek::ristretto::RistrettoPoint;
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, Zeroizing};

use crate::curve::{decode_point, encode_point, random_scalar, SecretScalar};
use crate::error::{ConfidentialError, Result};

/// AES-GCM nonce length
pub const NONCE_LEN: usize = 12;

/// Salt length for passphrase sealing
const SALT_LEN: usize = 16;

/// Domain separator for sealing-key derivation
const SEALING_KEY_DOMAIN: &[u8] = b"confidential_core/sealing-key/v1";

/// Domain separator for ECDH sealing
const POINT_SEAL_DOMAIN: &[u8] = b"confidential_core/point-seal/v1";

/// Current passphrase envelope version
const PASSPHRASE_VERSION: u8 = 1;

// ============================================================================
// Sealing Key
// ============================================================================

/// A 256-bit AEAD key, zeroized on drop
pub struct SealingKey {
    bytes: [u8; 32],
}

impl SealingKey {
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    /// Derive a purpose-bound key from secret material
    pub fn derive(secret: &[u8], label: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(SEALING_KEY_DOMAIN);
        hasher.update((label.len() as u32).to_le_bytes());
        hasher.update(label);
        hasher.update(secret);
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&hasher.finalize());
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    fn cipher(&self) -> Result<Aes256Gcm> {
        Aes256Gcm::new_from_slice(&self.bytes).map_err(|_| ConfidentialError::SealingFailed {
            reason: "cipher creation failed",
        })
    }
}

impl Drop for SealingKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

// ============================================================================
// Sealed Box
// ============================================================================

/// Nonce and authenticated ciphertext
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedBox {
    pub nonce: [u8; NONCE_LEN],
    pub ciphertext: Vec<u8>,
}

impl SealedBox {
    /// `nonce || ciphertext`
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(NONCE_LEN + self.ciphertext.len());
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < NONCE_LEN {
            return Err(ConfidentialError::malformed("sealed_box", "shorter than a nonce"));
        }
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&bytes[..NONCE_LEN]);
        Ok(Self {
            nonce,
            ciphertext: bytes[NONCE_LEN..].to_vec(),
        })
    }
}

/// Encrypt under `key` with a fresh nonce, binding `aad`
pub fn seal(key: &SealingKey, plaintext: &[u8], aad: &[u8]) -> Result<SealedBox> {
    let cipher = key.cipher()?;

    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), Payload { msg: plaintext, aad })
        .map_err(|_| ConfidentialError::SealingFailed {
            reason: "encryption failed",
        })?;

    Ok(SealedBox { nonce, ciphertext })
}

/// Decrypt and authenticate; wrong key, wrong `aad` or tampering all fail
pub fn open(key: &SealingKey, sealed: &SealedBox, aad: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    let cipher = key.cipher()?;
    let plaintext = cipher
        .decrypt(
            Nonce::from_slice(&sealed.nonce),
            Payload {
                msg: &sealed.ciphertext,
                aad,
            },
        )
        .map_err(|_| ConfidentialError::SealingFailed {
            reason: "authentication failed - wrong key or corrupted data",
        })?;
    Ok(Zeroizing::new(plaintext))
}

// ============================================================================
// ECDH Sealing
// ============================================================================

/// Material sealed to a public point
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointSealed {
    /// Sender's one-time public point
    pub ephemeral_public: [u8; 32],
    pub sealed: SealedBox,
}

/// Seal so only the holder of `recipient_public`'s secret can open
pub fn seal_to_point(recipient_public: &RistrettoPoint, plaintext: &[u8], aad: &[u8]) -> Result<PointSealed> {
    let ephemeral = SecretScalar::from_scalar(&random_scalar(&mut OsRng));
    let ephemeral_public = encode_point(&ephemeral.public_point());
    let shared = ephemeral.to_scalar() * recipient_public;

    let key = point_key(&shared, &ephemeral_public, &encode_point(recipient_public));
    let sealed = seal(&key, plaintext, aad)?;

    Ok(PointSealed {
        ephemeral_public,
        sealed,
    })
}

/// Open material sealed to `recipient_secret · G`
pub fn open_with_scalar(
    recipient_secret: &SecretScalar,
    sealed: &PointSealed,
    aad: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    let ephemeral = decode_point("ephemeral_public", &sealed.ephemeral_public)?;
    let shared = recipient_secret.to_scalar() * ephemeral;
    let recipient_public = encode_point(&recipient_secret.public_point());

    let key = point_key(&shared, &sealed.ephemeral_public, &recipient_public);
    open(&key, &sealed.sealed, aad)
}

fn point_key(shared: &RistrettoPoint, ephemeral_public: &[u8; 32], recipient_public: &[u8; 32]) -> SealingKey {
    let mut hasher = Sha256::new();
    hasher.update(POINT_SEAL_DOMAIN);
    hasher.update(encode_point(shared));
    hasher.update(ephemeral_public);
    hasher.update(recipient_public);
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&hasher.finalize());
    SealingKey::from_bytes(bytes)
}

// ============================================================================
// Passphrase Sealing
// ============================================================================

/// Argon2id cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory in KiB
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: 65536, // 64 MB
            iterations: 3,
            parallelism: 4,
        }
    }
}

impl KdfParams {
    fn derive_key(&self, passphrase: &str, salt: &[u8]) -> Result<SealingKey> {
        let params = argon2::Params::new(self.memory_kib, self.iterations, self.parallelism, Some(32))
            .map_err(|_| ConfidentialError::SealingFailed {
                reason: "invalid Argon2 parameters",
            })?;
        let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

        let mut key_bytes = [0u8; 32];
        argon2
            .hash_password_into(passphrase.as_bytes(), salt, &mut key_bytes)
            .map_err(|_| ConfidentialError::SealingFailed {
                reason: "key derivation failed",
            })?;

        let key = SealingKey::from_bytes(key_bytes);
        key_bytes.zeroize();
        Ok(key)
    }
}

/// Passphrase-protected envelope for key material at rest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassphraseSealed {
    /// Version for future compatibility
    pub version: u8,
    pub kdf: KdfParams,
    /// Salt for Argon2 (base64)
    pub salt: String,
    /// Nonce for AES-GCM (base64)
    pub nonce: String,
    /// Encrypted data (base64)
    pub ciphertext: String,
    /// Creation timestamp
    pub created_at: String,
}

impl PassphraseSealed {
    pub fn seal(plaintext: &[u8], passphrase: &str, kdf: &KdfParams) -> Result<Self> {
        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);

        let key = kdf.derive_key(passphrase, &salt)?;
        let sealed = seal(&key, plaintext, &[PASSPHRASE_VERSION])?;

        Ok(Self {
            version: PASSPHRASE_VERSION,
            kdf: *kdf,
            salt: b64::encode(&salt),
            nonce: b64::encode(&sealed.nonce),
            ciphertext: b64::encode(&sealed.ciphertext),
            created_at: chrono::Utc::now().to_rfc3339(),
        })
    }

    pub fn open(&self, passphrase: &str) -> Result<Zeroizing<Vec<u8>>> {
        if self.version != PASSPHRASE_VERSION {
            return Err(ConfidentialError::malformed("version", "unsupported envelope version"));
        }

        let salt = b64::decode("salt", &self.salt)?;
        let nonce_bytes = b64::decode("nonce", &self.nonce)?;
        let ciphertext = b64::decode("ciphertext", &self.ciphertext)?;

        let nonce: [u8; NONCE_LEN] = nonce_bytes
            .try_into()
            .map_err(|_| ConfidentialError::malformed("nonce", "invalid nonce length"))?;

        let key = self.kdf.derive_key(passphrase, &salt)?;
        open(&key, &SealedBox { nonce, ciphertext }, &[self.version])
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|_| ConfidentialError::SealingFailed {
            reason: "failed to serialize envelope",
        })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|_| ConfidentialError::malformed("envelope", "invalid JSON envelope"))
    }
}

// Base64 encoding/decoding helpers
mod b64 {
    use base64::{engine::general_purpose::STANDARD, Engine};

    use crate::error::{ConfidentialError, Result};

    pub fn encode(data: &[u8]) -> String {
        STANDARD.encode(data)
    }

    pub fn decode(field: &'static str, s: &str) -> Result<Vec<u8>> {
        STANDARD
            .decode(s)
            .map_err(|_| ConfidentialError::malformed(field, "invalid base64"))
    }
}
