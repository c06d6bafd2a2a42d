//! Stealth addresses (dual-key Diffie-Hellman)
//!
//! A recipient publishes one meta-address `(V, S)`. For each payment the sender
//! picks an ephemeral scalar `e` and pays to
//!
//! ```text
//! shared  = SHA256(domain || e·V)
//! address = S + H("stealth-offset", shared)·G
//! ```
//!
//! publishing `e·G` alongside. The recipient recomputes `shared` as `v·(e·G)`
//! and can spend with `s + H(shared)`.
//!
//! Security features:
//! - Ephemeral keypairs are consumed by value and cannot be cloned
//! - Optional tracker rejects reuse of an ephemeral key
//! - Constant-time comparison when matching candidate destinations
//! - Secret material zeroized on drop

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use curve25519_dalek::{ristretto::RistrettoPoint, scalar::Scalar, traits::IsIdentity};
use dashmap::DashSet;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::debug;
use zeroize::Zeroize;

use crate::curve::{
    basepoint, decode_point, decode_scalar, encode_point, hash_to_scalar, labels, random_scalar, Keypair,
    SecretScalar,
};
use crate::error::{ConfidentialError, Result};
use crate::keys::MasterSeed;
use crate::sealing::{self, SealedBox, SealingKey};

/// Domain separator for the DH shared secret
const STEALTH_SHARED_DOMAIN: &[u8] = b"confidential_core/stealth-shared/v1";

/// Domain separator for view tags
const VIEW_TAG_DOMAIN: &[u8] = b"confidential_core/view-tag/v1";

/// AAD prefix for sealed ephemeral secrets
const EPHEMERAL_RECEIPT_DOMAIN: &[u8] = b"confidential_core/ephemeral-receipt/v1";

/// Prefix of the textual meta-address form
pub const META_ADDRESS_PREFIX: &str = "stealth:";

/// Serialized meta-address length (`view || spend`)
pub const META_ADDRESS_LEN: usize = 64;

// ============================================================================
// Stealth Keys
// ============================================================================

/// Complete stealth key set for a recipient
///
/// Clone is NOT derived to prevent accidental secret duplication.
pub struct StealthKeys {
    view: Keypair,
    spend: Keypair,
}

impl StealthKeys {
    /// Generate new random stealth keys from OS entropy
    pub fn generate() -> Self {
        Self {
            view: Keypair::generate(),
            spend: Keypair::generate(),
        }
    }

    /// Reconstruct keys from stored secrets
    pub fn from_secrets(view_secret: &[u8; 32], spend_secret: &[u8; 32]) -> Result<Self> {
        Ok(Self {
            view: Keypair::from_secret_bytes("view_secret", view_secret)?,
            spend: Keypair::from_secret_bytes("spend_secret", spend_secret)?,
        })
    }

    /// Derive both keys from a master seed under their own labels
    pub fn from_master_seed(seed: &MasterSeed) -> Self {
        Self {
            view: Keypair::derive(seed.as_bytes(), labels::STEALTH_VIEW),
            spend: Keypair::derive(seed.as_bytes(), labels::STEALTH_SPEND),
        }
    }

    pub fn view(&self) -> &Keypair {
        &self.view
    }

    pub fn spend(&self) -> &Keypair {
        &self.spend
    }

    pub fn meta_address(&self) -> StealthMetaAddress {
        generate_meta_address(&self.view, &self.spend)
    }

    /// Export secrets as bytes (for sealed storage)
    ///
    /// WARNING: Handle these bytes with extreme care!
    pub fn export_secrets(&self) -> ([u8; 32], [u8; 32]) {
        (*self.view.secret().as_bytes(), *self.spend.secret().as_bytes())
    }
}

impl fmt::Debug for StealthKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StealthKeys")
            .field("meta_address", &self.meta_address().to_string())
            .finish_non_exhaustive()
    }
}

/// Publish the public halves of a view/spend pair
pub fn generate_meta_address(view: &Keypair, spend: &Keypair) -> StealthMetaAddress {
    StealthMetaAddress {
        view_public: view.public(),
        spend_public: spend.public(),
    }
}

// ============================================================================
// Meta-Address
// ============================================================================

/// A recipient's long-lived public identity; never itself a destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StealthMetaAddress {
    pub view_public: RistrettoPoint,
    pub spend_public: RistrettoPoint,
}

impl StealthMetaAddress {
    pub fn to_bytes(&self) -> [u8; META_ADDRESS_LEN] {
        let mut out = [0u8; META_ADDRESS_LEN];
        out[..32].copy_from_slice(&encode_point(&self.view_public));
        out[32..].copy_from_slice(&encode_point(&self.spend_public));
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != META_ADDRESS_LEN {
            return Err(ConfidentialError::invalid_key("meta_address", "expected 64 bytes"));
        }
        Ok(Self {
            view_public: decode_public("view_public", &bytes[..32])?,
            spend_public: decode_public("spend_public", &bytes[32..])?,
        })
    }
}

impl fmt::Display for StealthMetaAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", META_ADDRESS_PREFIX, bs58::encode(self.to_bytes()).into_string())
    }
}

impl FromStr for StealthMetaAddress {
    type Err = ConfidentialError;

    fn from_str(s: &str) -> Result<Self> {
        let encoded = s
            .strip_prefix(META_ADDRESS_PREFIX)
            .ok_or_else(|| ConfidentialError::invalid_key("meta_address", "missing `stealth:` prefix"))?;
        let bytes = bs58::decode(encoded)
            .into_vec()
            .map_err(|_| ConfidentialError::invalid_key("meta_address", "invalid base58"))?;
        Self::from_bytes(&bytes)
    }
}

fn decode_public(field: &'static str, bytes: &[u8]) -> Result<RistrettoPoint> {
    let point = decode_point(field, bytes)?;
    if point.is_identity() {
        return Err(ConfidentialError::invalid_key(field, "point is the identity"));
    }
    Ok(point)
}

// ============================================================================
// Shared Secret
// ============================================================================

/// Hashed Diffie-Hellman secret between sender and recipient
#[derive(Clone, PartialEq, Eq)]
pub struct SharedSecret {
    bytes: [u8; 32],
}

impl SharedSecret {
    fn compute(secret: &Scalar, point: &RistrettoPoint) -> Self {
        let mut dh = encode_point(&(secret * point));
        let mut hasher = Sha256::new();
        hasher.update(STEALTH_SHARED_DOMAIN);
        hasher.update(dh);
        dh.zeroize();

        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&hasher.finalize());
        Self { bytes }
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// One-byte scan hint
    pub fn view_tag(&self) -> u8 {
        let mut hasher = Sha256::new();
        hasher.update(VIEW_TAG_DOMAIN);
        hasher.update(self.bytes);
        hasher.finalize()[0]
    }

    fn offset(&self) -> Scalar {
        hash_to_scalar(labels::STEALTH_OFFSET, &self.bytes)
    }
}

impl Drop for SharedSecret {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret(..)")
    }
}

/// `spend_public + H(shared)·G`
fn one_time_address(spend_public: &RistrettoPoint, shared: &SharedSecret) -> RistrettoPoint {
    spend_public + shared.offset() * basepoint()
}

// ============================================================================
// Ephemeral Keys
// ============================================================================

/// Per-payment sender keypair, consumed by address derivation
///
/// Clone is NOT derived: one keypair, one payment.
pub struct EphemeralKeypair {
    secret: SecretScalar,
    public: RistrettoPoint,
}

impl EphemeralKeypair {
    pub fn generate() -> Self {
        let scalar = random_scalar(&mut OsRng);
        Self::from_scalar(&scalar)
    }

    pub fn from_secret_bytes(bytes: &[u8; 32]) -> Result<Self> {
        let scalar = decode_scalar("ephemeral_secret", bytes)?;
        Ok(Self::from_scalar(&scalar))
    }

    fn from_scalar(scalar: &Scalar) -> Self {
        Self {
            secret: SecretScalar::from_scalar(scalar),
            public: scalar * basepoint(),
        }
    }

    pub fn public(&self) -> RistrettoPoint {
        self.public
    }
}

impl fmt::Debug for EphemeralKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EphemeralKeypair")
            .field("public", &hex::encode(encode_point(&self.public)))
            .finish_non_exhaustive()
    }
}

/// What the sender publishes for a payment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EphemeralKey {
    pub public_key: RistrettoPoint,
    /// Ephemeral secret sealed under the sender's own key, if requested
    pub sealed_secret: Option<SealedBox>,
}

impl EphemeralKey {
    pub fn to_bytes(&self) -> [u8; 32] {
        encode_point(&self.public_key)
    }

    /// Recover the ephemeral secret from a receipt
    pub fn open_secret(&self, sender_key: &SealingKey) -> Result<SecretScalar> {
        let sealed = self
            .sealed_secret
            .as_ref()
            .ok_or_else(|| ConfidentialError::invalid_key("sealed_secret", "no sealed secret attached"))?;

        let plaintext = sealing::open(sender_key, sealed, &receipt_aad(&self.public_key))?;
        let bytes: [u8; 32] = plaintext
            .as_slice()
            .try_into()
            .map_err(|_| ConfidentialError::invalid_key("sealed_secret", "expected 32 bytes"))?;
        let secret = SecretScalar::from_bytes(bytes);

        if secret.public_point() != self.public_key {
            return Err(ConfidentialError::invalid_key(
                "sealed_secret",
                "secret does not match the ephemeral public key",
            ));
        }
        Ok(secret)
    }
}

fn receipt_aad(public: &RistrettoPoint) -> Vec<u8> {
    let mut aad = Vec::with_capacity(EPHEMERAL_RECEIPT_DOMAIN.len() + 32);
    aad.extend_from_slice(EPHEMERAL_RECEIPT_DOMAIN);
    aad.extend_from_slice(&encode_point(public));
    aad
}

/// Concurrent record of ephemeral public keys already used
#[derive(Debug, Default)]
pub struct EphemeralKeyTracker {
    used: DashSet<[u8; 32]>,
}

impl EphemeralKeyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `public`, failing if it was seen before
    pub fn claim(&self, public: &RistrettoPoint) -> Result<()> {
        if !self.used.insert(encode_point(public)) {
            return Err(ConfidentialError::EphemeralKeyReused);
        }
        Ok(())
    }

    pub fn contains(&self, public: &RistrettoPoint) -> bool {
        self.used.contains(&encode_point(public))
    }

    pub fn len(&self) -> usize {
        self.used.len()
    }

    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }
}

// ============================================================================
// Stealth Address Computation (Sender Side)
// ============================================================================

/// A one-time destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StealthAddress {
    pub address: RistrettoPoint,
    pub ephemeral_public: RistrettoPoint,
    pub view_tag: u8,
}

impl StealthAddress {
    pub fn to_bytes(&self) -> [u8; 32] {
        encode_point(&self.address)
    }
}

/// Sender-side derivation, optionally guarded by an ephemeral-key tracker
#[derive(Debug, Default, Clone)]
pub struct StealthEngine {
    tracker: Option<Arc<EphemeralKeyTracker>>,
}

impl StealthEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tracker(tracker: Arc<EphemeralKeyTracker>) -> Self {
        Self { tracker: Some(tracker) }
    }

    pub fn tracker(&self) -> Option<&Arc<EphemeralKeyTracker>> {
        self.tracker.as_ref()
    }

    /// Derive a one-time address for `meta`
    ///
    /// A fresh ephemeral keypair is generated when none is supplied.
    pub fn derive_stealth_address(
        &self,
        meta: &StealthMetaAddress,
        ephemeral: Option<EphemeralKeypair>,
    ) -> Result<(StealthAddress, EphemeralKey)> {
        let ephemeral = ephemeral.unwrap_or_else(EphemeralKeypair::generate);
        self.derive_with(meta, ephemeral, None)
    }

    /// Like `derive_stealth_address`, sealing the ephemeral secret under
    /// `sender_key` so the sender can later prove the payment
    pub fn derive_stealth_address_with_receipt(
        &self,
        meta: &StealthMetaAddress,
        sender_key: &SealingKey,
    ) -> Result<(StealthAddress, EphemeralKey)> {
        self.derive_with(meta, EphemeralKeypair::generate(), Some(sender_key))
    }

    fn derive_with(
        &self,
        meta: &StealthMetaAddress,
        ephemeral: EphemeralKeypair,
        sender_key: Option<&SealingKey>,
    ) -> Result<(StealthAddress, EphemeralKey)> {
        if let Some(tracker) = &self.tracker {
            tracker.claim(&ephemeral.public)?;
        }

        let shared = SharedSecret::compute(&ephemeral.secret.to_scalar(), &meta.view_public);
        let address = StealthAddress {
            address: one_time_address(&meta.spend_public, &shared),
            ephemeral_public: ephemeral.public,
            view_tag: shared.view_tag(),
        };

        let sealed_secret = match sender_key {
            Some(key) => Some(sealing::seal(
                key,
                ephemeral.secret.as_bytes(),
                &receipt_aad(&ephemeral.public),
            )?),
            None => None,
        };

        Ok((
            address,
            EphemeralKey {
                public_key: ephemeral.public,
                sealed_secret,
            },
        ))
    }
}

/// Untracked derivation
pub fn derive_stealth_address(
    meta: &StealthMetaAddress,
    ephemeral: Option<EphemeralKeypair>,
) -> Result<(StealthAddress, EphemeralKey)> {
    StealthEngine::new().derive_stealth_address(meta, ephemeral)
}

// ============================================================================
// Payment Scanning (Recipient Side)
// ============================================================================

/// An observed `(ephemeral key, destination)` pair handed in by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentCandidate {
    pub ephemeral_public: [u8; 32],
    pub destination: [u8; 32],
    pub amount: u64,
    pub view_tag: Option<u8>,
}

/// A payment recognized as ours
#[derive(Debug, Clone)]
pub struct StealthPayment {
    pub stealth_address: RistrettoPoint,
    pub ephemeral_public_key: RistrettoPoint,
    pub shared_secret: SharedSecret,
    pub amount: u64,
    spent: bool,
}

impl StealthPayment {
    pub fn is_spent(&self) -> bool {
        self.spent
    }

    /// Flip `spent` to true; fails if it already was
    pub fn mark_spent(&mut self) -> Result<()> {
        if self.spent {
            return Err(ConfidentialError::PaymentAlreadySpent);
        }
        self.spent = true;
        Ok(())
    }

    /// Private key for the one-time address, checked against it
    pub fn spending_key(&self, spend_private: &SecretScalar) -> Result<SecretScalar> {
        let key = derive_spending_key(&self.shared_secret, spend_private);
        if key.public_point() != self.stealth_address {
            return Err(ConfidentialError::invalid_key(
                "spend_private",
                "derived key does not control the stealth address",
            ));
        }
        Ok(key)
    }
}

/// `spend_private + H(shared) mod n`
pub fn derive_spending_key(shared_secret: &SharedSecret, spend_private: &SecretScalar) -> SecretScalar {
    SecretScalar::from_scalar(&(spend_private.to_scalar() + shared_secret.offset()))
}

/// Check one candidate against our meta-address
pub fn check_payment(
    meta: &StealthMetaAddress,
    view_private: &SecretScalar,
    candidate: &PaymentCandidate,
) -> Option<StealthPayment> {
    let ephemeral = match decode_point("ephemeral_public", &candidate.ephemeral_public) {
        Ok(point) => point,
        Err(e) => {
            debug!("skipping undecodable payment candidate: {}", e);
            return None;
        }
    };

    let shared = SharedSecret::compute(&view_private.to_scalar(), &ephemeral);
    if let Some(tag) = candidate.view_tag {
        if tag != shared.view_tag() {
            return None;
        }
    }

    let expected = one_time_address(&meta.spend_public, &shared);
    let expected_bytes = encode_point(&expected);
    if !bool::from(expected_bytes[..].ct_eq(&candidate.destination[..])) {
        return None;
    }

    debug!("detected stealth payment");
    Some(StealthPayment {
        stealth_address: expected,
        ephemeral_public_key: ephemeral,
        shared_secret: shared,
        amount: candidate.amount,
        spent: false,
    })
}

/// Lazily filter `candidates` down to payments addressed to `meta`
pub fn detect_payments<'a>(
    meta: &StealthMetaAddress,
    view_private: &'a SecretScalar,
    candidates: &'a [PaymentCandidate],
) -> PaymentScanner<'a> {
    PaymentScanner {
        meta: *meta,
        view_private,
        candidates: candidates.iter(),
    }
}

/// Finite, restartable scan over a caller-bounded slice
#[derive(Clone)]
pub struct PaymentScanner<'a> {
    meta: StealthMetaAddress,
    view_private: &'a SecretScalar,
    candidates: std::slice::Iter<'a, PaymentCandidate>,
}

impl Iterator for PaymentScanner<'_> {
    type Item = StealthPayment;

    fn next(&mut self) -> Option<StealthPayment> {
        for candidate in self.candidates.by_ref() {
            if let Some(payment) = check_payment(&self.meta, self.view_private, candidate) {
                return Some(payment);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.candidates.len()))
    }
}

impl fmt::Debug for PaymentScanner<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentScanner")
            .field("remaining", &self.candidates.len())
            .finish_non_exhaustive()
    }
}
