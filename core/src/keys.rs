//! Root key material
//!
//! A `MasterSeed` (random or from a BIP-39 mnemonic) fans out into
//! role-separated secrets:
//! - owner secret = SHA256("owner-balance" || seed), the balance decryption root
//! - stealth view/spend scalars, derived under their own labels
//!
//! A viewing key only ever re-derives the owner secret, so handing one to an
//! auditor never exposes stealth spend keys.

use bip39::Mnemonic;
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::curve::labels;
use crate::error::{ConfidentialError, Result};
use crate::stealth::StealthKeys;

// ============================================================================
// Owner Secret
// ============================================================================

/// 32-byte balance decryption root, zeroized on drop
#[derive(Clone, PartialEq, Eq)]
pub struct OwnerSecret {
    bytes: [u8; 32],
}

impl OwnerSecret {
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| ConfidentialError::invalid_key("owner_secret", "expected 32 bytes"))?;
        Ok(Self { bytes })
    }

    /// Get the raw bytes (use carefully)
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }
}

impl Drop for OwnerSecret {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for OwnerSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("OwnerSecret(..)")
    }
}

// ============================================================================
// Master Seed
// ============================================================================

/// 64-byte root from which every other secret derives
pub struct MasterSeed {
    bytes: [u8; 64],
}

impl MasterSeed {
    /// Generate a new random seed from OS entropy
    pub fn generate() -> Self {
        let mut bytes = [0u8; 64];
        OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self { bytes }
    }

    /// Recover a seed from a BIP-39 mnemonic phrase
    pub fn from_mnemonic(mnemonic_phrase: &str, passphrase: &str) -> Result<Self> {
        let mnemonic: Mnemonic = mnemonic_phrase
            .parse()
            .map_err(|_| ConfidentialError::invalid_key("mnemonic", "invalid BIP-39 mnemonic"))?;

        Ok(Self {
            bytes: mnemonic.to_seed(passphrase),
        })
    }

    /// Generate a new random 24-word mnemonic and the seed it encodes
    pub fn generate_with_mnemonic() -> Result<(Self, String)> {
        // 256 bits of entropy for a 24-word mnemonic
        let mut entropy = [0u8; 32];
        OsRng.fill_bytes(&mut entropy);

        let mnemonic = Mnemonic::from_entropy(&entropy)
            .map_err(|_| ConfidentialError::invalid_key("mnemonic", "failed to encode entropy"))?;
        entropy.zeroize();

        let phrase = mnemonic.to_string();
        let seed = Self::from_mnemonic(&phrase, "")?;
        Ok((seed, phrase))
    }

    /// The balance decryption root
    pub fn owner_secret(&self) -> OwnerSecret {
        let mut hasher = Sha256::new();
        hasher.update(labels::OWNER_BALANCE);
        hasher.update(self.bytes);
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&hasher.finalize());
        OwnerSecret { bytes }
    }

    /// Stealth view/spend keys, independent of the owner secret
    pub fn stealth_keys(&self) -> StealthKeys {
        StealthKeys::from_master_seed(self)
    }

    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.bytes
    }
}

impl Drop for MasterSeed {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}
