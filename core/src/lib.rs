//! Confidential Core - confidential balances and stealth payments over Ristretto255
//!
//! - `balance`: ElGamal-encrypted balances with Pedersen commitments
//! - `dlog`: bounded discrete-log recovery for decryption
//! - `stealth`: dual-key stealth addresses with view tags
//! - `viewing_key`: read-only, time-boxed balance access for auditors
//!
//! No network or ledger I/O happens here. Callers embed the produced bytes in
//! their own transactions and feed observed ephemeral keys back in.
//!
//! Range proofs are pluggable. The bundled `PlaceholderProofSystem` proves
//! nothing; relying on it for a security claim fails with `ProofUnavailable`.

// op_ref warnings are common with curve25519-dalek ergonomics
#![allow(clippy::op_ref)]

pub mod balance;
pub mod cache;
pub mod config;
pub mod curve;
pub mod dlog;
pub mod elgamal;
pub mod error;
pub mod keys;
pub mod proof;
pub mod sealing;
pub mod stealth;
pub mod viewing_key;


#[cfg(test)]
mod test_vectors;



pub use balance::{BalanceEngine, BalanceUpdate, EncryptedBalance, TransferOutcome};
pub use cache::DerivationCache;
pub use config::EngineConfig;
pub use curve::{Keypair, SecretScalar};
pub use elgamal::{ElGamalCiphertext, ElGamalKeypair, EncryptedAmount, PedersenCommitment};
pub use error::{ConfidentialError, Result};
pub use keys::{MasterSeed, OwnerSecret};
pub use proof::{PlaceholderProofSystem, ProofSystem, RangeProof, RangeStatement};
pub use stealth::{
    derive_spending_key, derive_stealth_address, detect_payments, generate_meta_address, EphemeralKey,
    EphemeralKeyTracker, EphemeralKeypair, PaymentCandidate, StealthAddress, StealthEngine, StealthKeys,
    StealthMetaAddress, StealthPayment,
};
pub use viewing_key::{seal_for_auditor, SealedViewingKey, ViewPermissions, ViewingKey, ViewingKeyManager};
