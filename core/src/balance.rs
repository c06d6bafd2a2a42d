//! Confidential balance engine
//!
//! Encrypts amounts for a recipient, decrypts them with bounded discrete-log
//! recovery, validates received values, and carries an `EncryptedBalance`
//! through deposit, transfer and withdrawal.
//!
//! Every balance-affecting call returns a brand-new `EncryptedBalance`; the
//! old one is never mutated. Callers must serialize operations on any single
//! balance, the engine provides no transactional isolation.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use curve25519_dalek::{ristretto::RistrettoPoint, scalar::Scalar, traits::IsIdentity};
use rand::rngs::OsRng;
use tracing::debug;

use crate::cache::DerivationCache;
use crate::config::EngineConfig;
use crate::curve::{random_scalar, SecretScalar};
use crate::dlog::DiscreteLogSolver;
use crate::elgamal::{
    check_public_key, AmountOpening, ElGamalCiphertext, ElGamalKeypair, EncryptedAmount, PedersenCommitment,
    PedersenGenerators, CIPHERTEXT_LEN, COMMITMENT_LEN,
};
use crate::error::{ConfidentialError, Result};
use crate::proof::{require_sound, PlaceholderProofSystem, ProofSystem, RangeStatement, MAX_SYSTEM_ID_LEN};

/// Serialized `EncryptedBalance` length
pub const BALANCE_LEN: usize = 1 + CIPHERTEXT_LEN + COMMITMENT_LEN + 8;

// ============================================================================
// Encrypted Balance
// ============================================================================

/// Persisted confidential account state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedBalance {
    pub ciphertext: ElGamalCiphertext,
    pub commitment: PedersenCommitment,
    pub last_updated: DateTime<Utc>,
    pub exists: bool,
}

impl EncryptedBalance {
    /// Placeholder state for an account that has not been opened
    pub fn uninitialized() -> Self {
        Self {
            ciphertext: ElGamalCiphertext::zero(),
            commitment: PedersenCommitment::identity(),
            last_updated: DateTime::<Utc>::default(),
            exists: false,
        }
    }

    /// `exists(1) || C1 || C2 || commitment || last_updated_unix_ms(i64 LE)`
    pub fn to_bytes(&self) -> [u8; BALANCE_LEN] {
        let mut out = [0u8; BALANCE_LEN];
        out[0] = self.exists as u8;
        out[1..1 + CIPHERTEXT_LEN].copy_from_slice(&self.ciphertext.to_bytes());
        let commitment_end = 1 + CIPHERTEXT_LEN + COMMITMENT_LEN;
        out[1 + CIPHERTEXT_LEN..commitment_end].copy_from_slice(&self.commitment.to_bytes());
        out[commitment_end..].copy_from_slice(&self.last_updated.timestamp_millis().to_le_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != BALANCE_LEN {
            return Err(ConfidentialError::malformed("encrypted_balance", "expected 105 bytes"));
        }
        let exists = match bytes[0] {
            0 => false,
            1 => true,
            _ => return Err(ConfidentialError::malformed("exists", "flag must be 0 or 1")),
        };
        let commitment_end = 1 + CIPHERTEXT_LEN + COMMITMENT_LEN;
        let ciphertext = ElGamalCiphertext::from_bytes(&bytes[1..1 + CIPHERTEXT_LEN])?;
        let commitment = PedersenCommitment::from_bytes(&bytes[1 + CIPHERTEXT_LEN..commitment_end])?;

        let mut millis = [0u8; 8];
        millis.copy_from_slice(&bytes[commitment_end..]);
        let last_updated = Utc
            .timestamp_millis_opt(i64::from_le_bytes(millis))
            .single()
            .ok_or_else(|| ConfidentialError::malformed("last_updated", "timestamp out of range"))?;

        Ok(Self {
            ciphertext,
            commitment,
            last_updated,
            exists,
        })
    }

    fn require_exists(&self) -> Result<()> {
        if !self.exists {
            return Err(ConfidentialError::BalanceNotInitialized);
        }
        Ok(())
    }
}

/// A new balance together with the encrypted delta that produced it
#[derive(Debug, Clone)]
pub struct BalanceUpdate {
    pub balance: EncryptedBalance,
    pub delta: EncryptedAmount,
}

/// Result of a confidential transfer
#[derive(Debug, Clone)]
pub struct TransferOutcome {
    /// Sender's balance after the debit
    pub sender_balance: EncryptedBalance,
    /// The debit, encrypted under the sender's own key
    pub sender_delta: EncryptedAmount,
    /// The credit, encrypted under the recipient's key
    pub recipient_amount: EncryptedAmount,
}

// ============================================================================
// Balance Engine
// ============================================================================

pub struct BalanceEngine {
    config: EngineConfig,
    cache: Arc<DerivationCache>,
    proofs: Arc<dyn ProofSystem>,
    generators: PedersenGenerators,
}

impl BalanceEngine {
    /// Engine with a private cache and the placeholder proof system
    pub fn new(config: EngineConfig) -> Result<Self> {
        Self::with_parts(config, DerivationCache::shared(), Arc::new(PlaceholderProofSystem))
    }

    pub fn with_parts(
        config: EngineConfig,
        cache: Arc<DerivationCache>,
        proofs: Arc<dyn ProofSystem>,
    ) -> Result<Self> {
        config.validate()?;
        if proofs.id().len() > MAX_SYSTEM_ID_LEN {
            return Err(ConfidentialError::Config {
                reason: format!("proof system id exceeds {} bytes", MAX_SYSTEM_ID_LEN),
            });
        }
        let generators = PedersenGenerators::from_cache(&cache);
        Ok(Self {
            config,
            cache,
            proofs,
            generators,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<DerivationCache> {
        &self.cache
    }

    pub fn proof_system(&self) -> &dyn ProofSystem {
        self.proofs.as_ref()
    }

    pub fn generators(&self) -> &PedersenGenerators {
        &self.generators
    }

    // ------------------------------------------------------------------------
    // Encrypt / decrypt / verify
    // ------------------------------------------------------------------------

    /// Encrypt `amount` for `recipient_public`, with commitment and range proof
    pub fn encrypt(&self, amount: u64, recipient_public: &RistrettoPoint) -> Result<EncryptedAmount> {
        check_public_key(recipient_public)?;
        if amount > self.config.max_supported_amount {
            return Err(ConfidentialError::out_of_range(
                "amount",
                format!(
                    "{} exceeds the supported maximum {}",
                    amount, self.config.max_supported_amount
                ),
            ));
        }
        if self.config.require_sound_proofs {
            require_sound(self.proof_system())?;
        }

        let r = random_scalar(&mut OsRng);
        let ciphertext = ElGamalCiphertext::encrypt_with(amount, recipient_public, &r);

        let r2 = random_scalar(&mut OsRng);
        let commitment = self.generators.commit(&Scalar::from(amount), &r2);

        let range_proof = self.proofs.generate(&RangeStatement {
            amount,
            blinding: &r2,
            commitment: &commitment,
        })?;

        Ok(EncryptedAmount {
            ciphertext,
            commitment,
            range_proof,
            opening: Some(AmountOpening {
                amount,
                ciphertext_randomness: SecretScalar::from_scalar(&r),
                commitment_blinding: SecretScalar::from_scalar(&r2),
            }),
        })
    }

    /// Recover the amount behind `ciphertext`
    ///
    /// Fails with `AmountOutOfRange` if the amount exceeds the configured
    /// maximum or the search budget runs out; never returns a silent zero.
    pub fn decrypt(&self, ciphertext: &ElGamalCiphertext, private: &SecretScalar) -> Result<u64> {
        let message = ciphertext.message_point(&private.to_scalar());
        if message.is_identity() {
            return Ok(0);
        }
        DiscreteLogSolver::new(&self.config, &self.cache).solve(&message)
    }

    /// Structural validity plus the proof system's verdict
    pub fn verify(&self, amount: &EncryptedAmount) -> bool {
        if amount.ciphertext.c1.is_identity() {
            return false;
        }
        if amount.range_proof.system_id != self.proofs.id() {
            return false;
        }
        self.proofs
            .verify(&amount.range_proof, &amount.commitment)
            .unwrap_or(false)
    }

    /// Decode serialized bytes, then `verify`
    pub fn verify_bytes(&self, bytes: &[u8]) -> bool {
        match EncryptedAmount::from_bytes(bytes) {
            Ok(amount) => self.verify(&amount),
            Err(_) => false,
        }
    }

    /// Verification for callers relying on the proof as a security claim
    pub fn verify_sound(&self, amount: &EncryptedAmount) -> Result<()> {
        require_sound(self.proof_system())?;
        if !self.verify(amount) {
            return Err(ConfidentialError::malformed("range_proof", "range proof rejected"));
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Balance lifecycle
    // ------------------------------------------------------------------------

    pub fn open_account(&self, owner_public: &RistrettoPoint) -> Result<EncryptedBalance> {
        self.open_account_at(owner_public, Utc::now())
    }

    pub fn open_account_at(&self, owner_public: &RistrettoPoint, now: DateTime<Utc>) -> Result<EncryptedBalance> {
        let initial = self.encrypt(0, owner_public)?;
        Ok(EncryptedBalance {
            ciphertext: initial.ciphertext,
            commitment: initial.commitment,
            last_updated: now,
            exists: true,
        })
    }

    pub fn deposit(&self, balance: &EncryptedBalance, amount: u64, owner_public: &RistrettoPoint) -> Result<BalanceUpdate> {
        self.deposit_at(balance, amount, owner_public, Utc::now())
    }

    pub fn deposit_at(
        &self,
        balance: &EncryptedBalance,
        amount: u64,
        owner_public: &RistrettoPoint,
        now: DateTime<Utc>,
    ) -> Result<BalanceUpdate> {
        balance.require_exists()?;
        let delta = self.encrypt(amount, owner_public)?;
        let balance = EncryptedBalance {
            ciphertext: balance.ciphertext + delta.ciphertext,
            commitment: balance.commitment + delta.commitment,
            last_updated: now,
            exists: true,
        };
        debug!("deposit applied to encrypted balance");
        Ok(BalanceUpdate { balance, delta })
    }

    /// Credit a received transfer after checking its proof
    pub fn apply_incoming(&self, balance: &EncryptedBalance, incoming: &EncryptedAmount) -> Result<EncryptedBalance> {
        self.apply_incoming_at(balance, incoming, Utc::now())
    }

    pub fn apply_incoming_at(
        &self,
        balance: &EncryptedBalance,
        incoming: &EncryptedAmount,
        now: DateTime<Utc>,
    ) -> Result<EncryptedBalance> {
        balance.require_exists()?;
        if !self.verify(incoming) {
            return Err(ConfidentialError::malformed("range_proof", "range proof rejected"));
        }
        Ok(EncryptedBalance {
            ciphertext: balance.ciphertext + incoming.ciphertext,
            commitment: balance.commitment + incoming.commitment,
            last_updated: now,
            exists: true,
        })
    }

    pub fn withdraw(&self, balance: &EncryptedBalance, amount: u64, owner: &ElGamalKeypair) -> Result<BalanceUpdate> {
        self.withdraw_at(balance, amount, owner, Utc::now())
    }

    pub fn withdraw_at(
        &self,
        balance: &EncryptedBalance,
        amount: u64,
        owner: &ElGamalKeypair,
        now: DateTime<Utc>,
    ) -> Result<BalanceUpdate> {
        let delta = self.debit(balance, amount, owner)?;
        let balance = EncryptedBalance {
            ciphertext: balance.ciphertext - delta.ciphertext,
            commitment: balance.commitment - delta.commitment,
            last_updated: now,
            exists: true,
        };
        Ok(BalanceUpdate { balance, delta })
    }

    pub fn transfer(
        &self,
        balance: &EncryptedBalance,
        amount: u64,
        owner: &ElGamalKeypair,
        recipient_public: &RistrettoPoint,
    ) -> Result<TransferOutcome> {
        self.transfer_at(balance, amount, owner, recipient_public, Utc::now())
    }

    pub fn transfer_at(
        &self,
        balance: &EncryptedBalance,
        amount: u64,
        owner: &ElGamalKeypair,
        recipient_public: &RistrettoPoint,
        now: DateTime<Utc>,
    ) -> Result<TransferOutcome> {
        check_public_key(recipient_public)?;
        let sender_delta = self.debit(balance, amount, owner)?;
        let recipient_amount = self.encrypt(amount, recipient_public)?;

        let sender_balance = EncryptedBalance {
            ciphertext: balance.ciphertext - sender_delta.ciphertext,
            commitment: balance.commitment - sender_delta.commitment,
            last_updated: now,
            exists: true,
        };

        Ok(TransferOutcome {
            sender_balance,
            sender_delta,
            recipient_amount,
        })
    }

    pub fn decrypt_balance(&self, balance: &EncryptedBalance, private: &SecretScalar) -> Result<u64> {
        balance.require_exists()?;
        self.decrypt(&balance.ciphertext, private)
    }

    /// Encrypt a debit of `amount` after checking the owner can cover it
    fn debit(&self, balance: &EncryptedBalance, amount: u64, owner: &ElGamalKeypair) -> Result<EncryptedAmount> {
        let available = self.decrypt_balance(balance, owner.private_scalar())?;
        if amount > available {
            return Err(ConfidentialError::InsufficientBalance {
                requested: amount,
                available,
            });
        }
        self.encrypt(amount, &owner.public_point())
    }
}

impl std::fmt::Debug for BalanceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BalanceEngine")
            .field("config", &self.config)
            .field("proof_system", &self.proofs.id())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proof::RangeProof;

    fn small_engine() -> BalanceEngine {
        BalanceEngine::new(EngineConfig {
            max_supported_amount: 1 << 20,
            linear_search_limit: 256,
            ..EngineConfig::default()
        })
        .unwrap()
    }

    /// Accepts everything and claims soundness, for exercising policy paths
    struct TrustingProofSystem;

    impl ProofSystem for TrustingProofSystem {
        fn id(&self) -> &'static str {
            "trusting"
        }

        fn is_placeholder(&self) -> bool {
            false
        }

        fn generate(&self, _statement: &RangeStatement<'_>) -> Result<RangeProof> {
            Ok(RangeProof {
                system_id: "trusting".to_string(),
                bytes: vec![1],
            })
        }

        fn verify(&self, proof: &RangeProof, _commitment: &PedersenCommitment) -> Result<bool> {
            Ok(proof.bytes == [1])
        }
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let engine = small_engine();
        let keypair = ElGamalKeypair::generate();
        for amount in [0, 1, 255, 256, 1000, 77_777, 1 << 20] {
            let encrypted = engine.encrypt(amount, &keypair.public_point()).unwrap();
            let decrypted = engine.decrypt(&encrypted.ciphertext, keypair.private_scalar()).unwrap();
            assert_eq!(decrypted, amount);
        }
    }

    #[test]
    fn test_encrypt_rejects_above_maximum() {
        let engine = small_engine();
        let keypair = ElGamalKeypair::generate();
        let result = engine.encrypt((1 << 20) + 1, &keypair.public_point());
        assert!(matches!(
            result,
            Err(ConfidentialError::AmountOutOfRange { field: "amount", .. })
        ));
    }

    #[test]
    fn test_identity_recipient_rejected() {
        use curve25519_dalek::traits::Identity;

        let engine = small_engine();
        let identity = RistrettoPoint::identity();
        let rejected = |result: Result<()>| {
            matches!(
                result,
                Err(ConfidentialError::InvalidKeyMaterial { field: "recipient_public", .. })
            )
        };

        assert!(rejected(engine.encrypt(777, &identity).map(|_| ())));
        assert!(rejected(engine.open_account(&identity).map(|_| ())));

        let owner = ElGamalKeypair::generate();
        let opened = engine.open_account(&owner.public_point()).unwrap();
        let funded = engine.deposit(&opened, 1_000, &owner.public_point()).unwrap().balance;
        assert!(rejected(engine.deposit(&funded, 1, &identity).map(|_| ())));
        assert!(rejected(engine.transfer(&funded, 10, &owner, &identity).map(|_| ())));
    }

    #[test]
    fn test_opening_matches_commitment() {
        let engine = small_engine();
        let keypair = ElGamalKeypair::generate();
        let encrypted = engine.encrypt(500, &keypair.public_point()).unwrap();
        let opening = encrypted.opening.as_ref().unwrap();

        assert_eq!(opening.amount, 500);
        assert!(encrypted
            .commitment
            .opens_to(engine.generators(), 500, &opening.commitment_blinding.to_scalar()));
        assert_eq!(
            encrypted.ciphertext.c1,
            opening.ciphertext_randomness.public_point()
        );
        assert!(encrypted.without_opening().opening.is_none());
    }

    #[test]
    fn test_wrong_key_does_not_decrypt() {
        let engine = small_engine();
        let owner = ElGamalKeypair::generate();
        let stranger = ElGamalKeypair::generate();
        let encrypted = engine.encrypt(42, &owner.public_point()).unwrap();
        assert!(engine.decrypt(&encrypted.ciphertext, stranger.private_scalar()).is_err());
    }

    #[test]
    fn test_verify_checks_proof_binding() {
        let engine = small_engine();
        let keypair = ElGamalKeypair::generate();
        let encrypted = engine.encrypt(10, &keypair.public_point()).unwrap();
        assert!(engine.verify(&encrypted));
        assert!(engine.verify_bytes(&encrypted.to_bytes().unwrap()));

        let other = engine.encrypt(11, &keypair.public_point()).unwrap();
        let mut swapped = encrypted.clone();
        swapped.commitment = other.commitment;
        assert!(!engine.verify(&swapped));

        assert!(!engine.verify_bytes(&[0u8; 10]));
    }

    #[test]
    fn test_placeholder_fails_loudly_when_relied_on() {
        let engine = small_engine();
        let keypair = ElGamalKeypair::generate();
        let encrypted = engine.encrypt(10, &keypair.public_point()).unwrap();

        let err = engine.verify_sound(&encrypted).unwrap_err();
        assert_eq!(err, ConfidentialError::ProofUnavailable { system: "placeholder" });
        assert!(err.is_configuration_error());

        let strict = BalanceEngine::new(EngineConfig {
            require_sound_proofs: true,
            ..EngineConfig::default()
        })
        .unwrap();
        assert!(matches!(
            strict.encrypt(10, &keypair.public_point()),
            Err(ConfidentialError::ProofUnavailable { .. })
        ));
    }

    #[test]
    fn test_sound_proof_system_accepted() {
        let engine = BalanceEngine::with_parts(
            EngineConfig {
                require_sound_proofs: true,
                ..EngineConfig::default()
            },
            DerivationCache::shared(),
            Arc::new(TrustingProofSystem),
        )
        .unwrap();
        let keypair = ElGamalKeypair::generate();
        let encrypted = engine.encrypt(10, &keypair.public_point()).unwrap();
        assert!(engine.verify_sound(&encrypted).is_ok());
    }

    #[test]
    fn test_proof_system_id_must_fit_wire_format() {
        struct LongIdProofSystem(&'static str);

        impl ProofSystem for LongIdProofSystem {
            fn id(&self) -> &'static str {
                self.0
            }

            fn is_placeholder(&self) -> bool {
                false
            }

            fn generate(&self, _statement: &RangeStatement<'_>) -> Result<RangeProof> {
                Ok(RangeProof {
                    system_id: self.0.to_string(),
                    bytes: vec![1],
                })
            }

            fn verify(&self, _proof: &RangeProof, _commitment: &PedersenCommitment) -> Result<bool> {
                Ok(true)
            }
        }

        let longest: &'static str = Box::leak("p".repeat(MAX_SYSTEM_ID_LEN).into_boxed_str());
        let too_long: &'static str = Box::leak("p".repeat(MAX_SYSTEM_ID_LEN + 1).into_boxed_str());

        let engine = BalanceEngine::with_parts(
            EngineConfig::default(),
            DerivationCache::shared(),
            Arc::new(LongIdProofSystem(longest)),
        )
        .unwrap();
        let keypair = ElGamalKeypair::generate();
        let encrypted = engine.encrypt(3, &keypair.public_point()).unwrap();
        assert!(engine.verify_bytes(&encrypted.to_bytes().unwrap()));

        let result = BalanceEngine::with_parts(
            EngineConfig::default(),
            DerivationCache::shared(),
            Arc::new(LongIdProofSystem(too_long)),
        );
        assert!(matches!(result, Err(ConfidentialError::Config { .. })));
    }

    #[test]
    fn test_balance_lifecycle() {
        let engine = small_engine();
        let owner = ElGamalKeypair::generate();
        let public = owner.public_point();

        let opened = engine.open_account(&public).unwrap();
        assert!(opened.exists);
        assert_eq!(engine.decrypt_balance(&opened, owner.private_scalar()).unwrap(), 0);

        let deposited = engine.deposit(&opened, 1_000, &public).unwrap();
        assert_eq!(engine.decrypt_balance(&deposited.balance, owner.private_scalar()).unwrap(), 1_000);
        assert_ne!(deposited.balance.ciphertext, opened.ciphertext);

        let withdrawn = engine.withdraw(&deposited.balance, 400, &owner).unwrap();
        assert_eq!(engine.decrypt_balance(&withdrawn.balance, owner.private_scalar()).unwrap(), 600);
        assert_eq!(withdrawn.delta.opening.as_ref().unwrap().amount, 400);
    }

    #[test]
    fn test_withdraw_more_than_balance() {
        let engine = small_engine();
        let owner = ElGamalKeypair::generate();
        let opened = engine.open_account(&owner.public_point()).unwrap();
        let funded = engine.deposit(&opened, 50, &owner.public_point()).unwrap().balance;

        assert_eq!(
            engine.withdraw(&funded, 51, &owner).unwrap_err(),
            ConfidentialError::InsufficientBalance {
                requested: 51,
                available: 50
            }
        );
    }

    #[test]
    fn test_transfer_between_accounts() {
        let engine = small_engine();
        let alice = ElGamalKeypair::generate();
        let bob = ElGamalKeypair::generate();

        let alice_balance = engine.open_account(&alice.public_point()).unwrap();
        let alice_balance = engine.deposit(&alice_balance, 900, &alice.public_point()).unwrap().balance;
        let bob_balance = engine.open_account(&bob.public_point()).unwrap();

        let outcome = engine.transfer(&alice_balance, 300, &alice, &bob.public_point()).unwrap();
        let bob_balance = engine.apply_incoming(&bob_balance, &outcome.recipient_amount.without_opening()).unwrap();

        assert_eq!(engine.decrypt_balance(&outcome.sender_balance, alice.private_scalar()).unwrap(), 600);
        assert_eq!(engine.decrypt_balance(&bob_balance, bob.private_scalar()).unwrap(), 300);
    }

    #[test]
    fn test_commitments_track_balance() {
        let engine = small_engine();
        let owner = ElGamalKeypair::generate();
        let opened = engine.open_account(&owner.public_point()).unwrap();
        let first = engine.deposit(&opened, 70, &owner.public_point()).unwrap();
        let second = engine.deposit(&first.balance, 30, &owner.public_point()).unwrap();

        let expected = opened.commitment + first.delta.commitment + second.delta.commitment;
        assert_eq!(second.balance.commitment, expected);
    }

    #[test]
    fn test_uninitialized_balance_rejected() {
        let engine = small_engine();
        let owner = ElGamalKeypair::generate();
        let empty = EncryptedBalance::uninitialized();

        assert_eq!(
            engine.deposit(&empty, 1, &owner.public_point()).unwrap_err(),
            ConfidentialError::BalanceNotInitialized
        );
        assert_eq!(
            engine.decrypt_balance(&empty, owner.private_scalar()).unwrap_err(),
            ConfidentialError::BalanceNotInitialized
        );
    }

    #[test]
    fn test_incoming_with_bad_proof_rejected() {
        let engine = small_engine();
        let owner = ElGamalKeypair::generate();
        let balance = engine.open_account(&owner.public_point()).unwrap();

        let mut incoming = engine.encrypt(5, &owner.public_point()).unwrap();
        incoming.range_proof.bytes.truncate(4);
        assert!(engine.apply_incoming(&balance, &incoming).is_err());
    }

    #[test]
    fn test_balance_bytes() {
        let engine = small_engine();
        let owner = ElGamalKeypair::generate();
        let at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let balance = engine.open_account_at(&owner.public_point(), at).unwrap();

        let bytes = balance.to_bytes();
        assert_eq!(bytes.len(), BALANCE_LEN);
        assert_eq!(EncryptedBalance::from_bytes(&bytes).unwrap(), balance);

        let mut bad_flag = bytes;
        bad_flag[0] = 2;
        assert!(EncryptedBalance::from_bytes(&bad_flag).is_err());
        assert!(EncryptedBalance::from_bytes(&bytes[..100]).is_err());

        let empty = EncryptedBalance::uninitialized();
        assert_eq!(EncryptedBalance::from_bytes(&empty.to_bytes()).unwrap(), empty);
    }
}
