//! Viewing keys
//!
//! A viewing key lets an auditor decrypt an account's balance without any
//! spending power. It carries the owner secret XOR-masked with an
//! account-specific value:
//!
//! ```text
//! mask          = SHA256("account-mask" || account_id)
//! masked_secret = owner_secret XOR mask
//! ```
//!
//! The mask is public, so the mask binds the key to an account rather than
//! hiding the owner secret: anyone holding the key can rebuild the balance
//! decryption key. Stealth spend keys derive from the master seed under other
//! labels and are never exposed.
//!
//! Revocation is local. Setting `expires_at` on one copy does not reach copies
//! already handed out.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use curve25519_dalek::ristretto::RistrettoPoint;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::balance::{BalanceEngine, EncryptedBalance};
use crate::curve::{labels, SecretScalar};
use crate::elgamal::{ElGamalKeypair, EncryptedAmount};
use crate::error::{ConfidentialError, Result};
use crate::keys::OwnerSecret;
use crate::sealing::{open_with_scalar, seal_to_point, PointSealed};

// ============================================================================
// Permissions
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewPermissions {
    pub can_view_balances: bool,
    pub can_view_amounts: bool,
    /// Accounts this key may read; empty means the key's own account
    #[serde(default)]
    pub allowed_accounts: Vec<String>,
}

impl ViewPermissions {
    /// Balances and individual amounts
    pub fn full() -> Self {
        Self {
            can_view_balances: true,
            can_view_amounts: true,
            allowed_accounts: Vec::new(),
        }
    }

    pub fn balances_only() -> Self {
        Self {
            can_view_balances: true,
            can_view_amounts: false,
            allowed_accounts: Vec::new(),
        }
    }

    pub fn allows(&self, account_id: &str) -> bool {
        self.allowed_accounts.iter().any(|allowed| allowed == account_id)
    }
}

impl Default for ViewPermissions {
    fn default() -> Self {
        Self::balances_only()
    }
}

// ============================================================================
// Viewing Key
// ============================================================================

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewingKey {
    #[serde(with = "hex32")]
    masked_secret: [u8; 32],
    pub account_id: String,
    pub permissions: ViewPermissions,
    pub expires_at: Option<DateTime<Utc>>,
}

impl ViewingKey {
    pub fn masked_secret(&self) -> &[u8; 32] {
        &self.masked_secret
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(expires_at) if expires_at <= now)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Expire this copy immediately
    pub fn revoke(&mut self) {
        self.revoke_at(Utc::now());
    }

    pub fn revoke_at(&mut self, now: DateTime<Utc>) {
        self.expires_at = Some(now);
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|_| ConfidentialError::SealingFailed {
            reason: "failed to serialize viewing key",
        })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|_| ConfidentialError::invalid_key("viewing_key", "invalid viewing key JSON"))
    }
}

impl Drop for ViewingKey {
    fn drop(&mut self) {
        self.masked_secret.zeroize();
    }
}

impl fmt::Debug for ViewingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewingKey")
            .field("account_id", &self.account_id)
            .field("permissions", &self.permissions)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// `SHA256("account-mask" || account_id)`
pub fn account_mask(account_id: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(labels::ACCOUNT_MASK);
    hasher.update(account_id.as_bytes());
    let mut mask = [0u8; 32];
    mask.copy_from_slice(&hasher.finalize());
    mask
}

fn xor32(a: &[u8; 32], b: &[u8; 32]) -> [u8; 32] {
    let mut out = [0u8; 32];
    for (o, (x, y)) in out.iter_mut().zip(a.iter().zip(b.iter())) {
        *o = x ^ y;
    }
    out
}

/// Undo the account mask
pub fn recover_owner_secret(masked_secret: &[u8; 32], account_id: &str) -> OwnerSecret {
    OwnerSecret::from_bytes(xor32(masked_secret, &account_mask(account_id)))
}

// ============================================================================
// Manager
// ============================================================================

/// Derives viewing keys and decrypts on their behalf
#[derive(Debug, Clone)]
pub struct ViewingKeyManager {
    engine: Arc<BalanceEngine>,
}

impl ViewingKeyManager {
    pub fn new(engine: Arc<BalanceEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &BalanceEngine {
        &self.engine
    }

    fn mask(&self, account_id: &str) -> [u8; 32] {
        self.engine.cache().account_mask(account_id, || account_mask(account_id))
    }

    pub fn derive_viewing_key(
        &self,
        owner_secret: &OwnerSecret,
        account_id: &str,
        mut permissions: ViewPermissions,
        expires_at: Option<DateTime<Utc>>,
    ) -> ViewingKey {
        if permissions.allowed_accounts.is_empty() {
            permissions.allowed_accounts.push(account_id.to_string());
        }
        ViewingKey {
            masked_secret: xor32(owner_secret.as_bytes(), &self.mask(account_id)),
            account_id: account_id.to_string(),
            permissions,
            expires_at,
        }
    }

    pub fn recover_owner_secret(&self, key: &ViewingKey) -> OwnerSecret {
        OwnerSecret::from_bytes(xor32(&key.masked_secret, &self.mask(&key.account_id)))
    }

    /// Check expiry first, then the capability, then the account scope
    fn authorize(&self, key: &ViewingKey, capability: &'static str, granted: bool, now: DateTime<Utc>) -> Result<ElGamalKeypair> {
        if let Some(expired_at) = key.expires_at {
            if expired_at <= now {
                return Err(ConfidentialError::KeyExpired { expired_at });
            }
        }
        if !granted {
            return Err(ConfidentialError::PermissionDenied { capability });
        }
        if !key.permissions.allows(&key.account_id) {
            return Err(ConfidentialError::PermissionDenied { capability: "account" });
        }
        Ok(ElGamalKeypair::derive(&self.recover_owner_secret(key)))
    }

    pub fn decrypt_balance(&self, balance: &EncryptedBalance, key: &ViewingKey) -> Result<u64> {
        self.decrypt_balance_at(balance, key, Utc::now())
    }

    pub fn decrypt_balance_at(&self, balance: &EncryptedBalance, key: &ViewingKey, now: DateTime<Utc>) -> Result<u64> {
        let keypair = self.authorize(key, "view_balances", key.permissions.can_view_balances, now)?;
        self.engine.decrypt_balance(balance, keypair.private_scalar())
    }

    pub fn decrypt_amount(&self, amount: &EncryptedAmount, key: &ViewingKey) -> Result<u64> {
        self.decrypt_amount_at(amount, key, Utc::now())
    }

    pub fn decrypt_amount_at(&self, amount: &EncryptedAmount, key: &ViewingKey, now: DateTime<Utc>) -> Result<u64> {
        let keypair = self.authorize(key, "view_amounts", key.permissions.can_view_amounts, now)?;
        self.engine.decrypt(&amount.ciphertext, keypair.private_scalar())
    }
}

// ============================================================================
// Sealing for an Auditor
// ============================================================================

/// A viewing key sealed to an auditor's public point
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedViewingKey {
    pub account_id: String,
    pub sealed: PointSealed,
}

impl SealedViewingKey {
    pub fn open(&self, auditor_secret: &SecretScalar) -> Result<ViewingKey> {
        let plaintext = open_with_scalar(auditor_secret, &self.sealed, self.account_id.as_bytes())?;
        let key: ViewingKey = serde_json::from_slice(&plaintext)
            .map_err(|_| ConfidentialError::invalid_key("viewing_key", "invalid viewing key JSON"))?;
        if key.account_id != self.account_id {
            return Err(ConfidentialError::invalid_key("account_id", "sealed key belongs to another account"));
        }
        Ok(key)
    }
}

/// Seal `key` so only the holder of `auditor_public`'s secret can open it
pub fn seal_for_auditor(key: &ViewingKey, auditor_public: &RistrettoPoint) -> Result<SealedViewingKey> {
    let mut json = serde_json::to_vec(key).map_err(|_| ConfidentialError::SealingFailed {
        reason: "failed to serialize viewing key",
    })?;
    let sealed = seal_to_point(auditor_public, &json, key.account_id.as_bytes());
    json.zeroize();

    Ok(SealedViewingKey {
        account_id: key.account_id.clone(),
        sealed: sealed?,
    })
}

// Hex encoding for fixed 32-byte fields
mod hex32 {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 32], serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<[u8; 32], D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(D::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| D::Error::custom("expected 32 bytes"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::curve::Keypair;
    use chrono::Duration;

    fn manager() -> ViewingKeyManager {
        let engine = BalanceEngine::new(EngineConfig {
            max_supported_amount: 1 << 20,
            linear_search_limit: 256,
            ..EngineConfig::default()
        })
        .unwrap();
        ViewingKeyManager::new(Arc::new(engine))
    }

    fn funded_balance(manager: &ViewingKeyManager, owner: &OwnerSecret, amount: u64) -> EncryptedBalance {
        let keypair = ElGamalKeypair::derive(owner);
        let engine = manager.engine();
        let opened = engine.open_account(&keypair.public_point()).unwrap();
        engine.deposit(&opened, amount, &keypair.public_point()).unwrap().balance
    }

    #[test]
    fn test_mask_roundtrip() {
        let manager = manager();
        let owner = OwnerSecret::generate();
        let key = manager.derive_viewing_key(&owner, "acct-1", ViewPermissions::default(), None);

        assert_ne!(key.masked_secret(), owner.as_bytes());
        assert_eq!(manager.recover_owner_secret(&key), owner);
        assert_eq!(recover_owner_secret(key.masked_secret(), "acct-1"), owner);
        assert_ne!(recover_owner_secret(key.masked_secret(), "acct-2"), owner);
    }

    #[test]
    fn test_empty_allowed_accounts_scoped_to_own_account() {
        let manager = manager();
        let owner = OwnerSecret::generate();
        let key = manager.derive_viewing_key(&owner, "acct-1", ViewPermissions::default(), None);
        assert_eq!(key.permissions.allowed_accounts, vec!["acct-1".to_string()]);
    }

    #[test]
    fn test_auditor_reads_balance() {
        let manager = manager();
        let owner = OwnerSecret::generate();
        let balance = funded_balance(&manager, &owner, 4_321);
        let key = manager.derive_viewing_key(&owner, "acct-1", ViewPermissions::default(), None);

        assert_eq!(manager.decrypt_balance(&balance, &key).unwrap(), 4_321);
    }

    #[test]
    fn test_expired_key_rejected() {
        let manager = manager();
        let owner = OwnerSecret::generate();
        let balance = funded_balance(&manager, &owner, 10);
        let now = Utc::now();
        let key = manager.derive_viewing_key(&owner, "acct-1", ViewPermissions::default(), Some(now));

        assert_eq!(
            manager.decrypt_balance_at(&balance, &key, now).unwrap_err(),
            ConfidentialError::KeyExpired { expired_at: now }
        );
        assert_eq!(
            manager
                .decrypt_balance_at(&balance, &key, now - Duration::seconds(1))
                .unwrap(),
            10
        );
    }

    #[test]
    fn test_permission_checks() {
        let manager = manager();
        let owner = OwnerSecret::generate();
        let balance = funded_balance(&manager, &owner, 10);

        let no_balances = ViewPermissions {
            can_view_balances: false,
            can_view_amounts: true,
            allowed_accounts: Vec::new(),
        };
        let key = manager.derive_viewing_key(&owner, "acct-1", no_balances, None);
        assert_eq!(
            manager.decrypt_balance(&balance, &key).unwrap_err(),
            ConfidentialError::PermissionDenied {
                capability: "view_balances"
            }
        );

        let other_account = ViewPermissions {
            allowed_accounts: vec!["acct-9".to_string()],
            ..ViewPermissions::default()
        };
        let key = manager.derive_viewing_key(&owner, "acct-1", other_account, None);
        assert_eq!(
            manager.decrypt_balance(&balance, &key).unwrap_err(),
            ConfidentialError::PermissionDenied { capability: "account" }
        );
    }

    #[test]
    fn test_amount_visibility() {
        let manager = manager();
        let owner = OwnerSecret::generate();
        let public = ElGamalKeypair::derive(&owner).public_point();
        let amount = manager.engine().encrypt(77, &public).unwrap();

        let balances_only = manager.derive_viewing_key(&owner, "acct-1", ViewPermissions::balances_only(), None);
        assert_eq!(
            manager.decrypt_amount(&amount, &balances_only).unwrap_err(),
            ConfidentialError::PermissionDenied {
                capability: "view_amounts"
            }
        );

        let full = manager.derive_viewing_key(&owner, "acct-1", ViewPermissions::full(), None);
        assert_eq!(manager.decrypt_amount(&amount, &full).unwrap(), 77);
    }

    #[test]
    fn test_revoke() {
        let manager = manager();
        let owner = OwnerSecret::generate();
        let balance = funded_balance(&manager, &owner, 10);
        let mut key = manager.derive_viewing_key(&owner, "acct-1", ViewPermissions::default(), None);
        let copy = key.clone();

        key.revoke();
        assert!(key.is_expired());
        assert!(matches!(
            manager.decrypt_balance(&balance, &key),
            Err(ConfidentialError::KeyExpired { .. })
        ));
        // Revocation does not reach copies
        assert_eq!(manager.decrypt_balance(&balance, &copy).unwrap(), 10);
    }

    #[test]
    fn test_json_roundtrip_hides_nothing_extra() {
        let manager = manager();
        let owner = OwnerSecret::generate();
        let key = manager.derive_viewing_key(&owner, "acct-1", ViewPermissions::full(), None);

        let json = key.to_json().unwrap();
        assert!(json.contains(&hex::encode(key.masked_secret())));
        assert!(!json.contains(&hex::encode(owner.as_bytes())));
        assert_eq!(ViewingKey::from_json(&json).unwrap(), key);
        assert!(ViewingKey::from_json("{}").is_err());
        assert!(!format!("{:?}", key).contains(&hex::encode(key.masked_secret())));
    }

    #[test]
    fn test_seal_for_auditor() {
        let manager = manager();
        let owner = OwnerSecret::generate();
        let auditor = Keypair::generate();
        let key = manager.derive_viewing_key(&owner, "acct-1", ViewPermissions::default(), None);

        let sealed = seal_for_auditor(&key, &auditor.public()).unwrap();
        assert_eq!(sealed.open(auditor.secret()).unwrap(), key);

        let stranger = Keypair::generate();
        assert!(sealed.open(stranger.secret()).is_err());

        let mut relabeled = sealed.clone();
        relabeled.account_id = "acct-2".to_string();
        assert!(relabeled.open(auditor.secret()).is_err());
    }

    #[test]
    fn test_masks_are_cached() {
        let manager = manager();
        let owner = OwnerSecret::generate();
        manager.derive_viewing_key(&owner, "acct-1", ViewPermissions::default(), None);
        manager.derive_viewing_key(&owner, "acct-1", ViewPermissions::full(), None);
        manager.derive_viewing_key(&owner, "acct-2", ViewPermissions::default(), None);
        assert_eq!(manager.engine().cache().cached_masks(), 2);
    }
}
