//! Error types for the confidential core
//!
//! Every failure is terminal for the attempted operation. The inputs and the
//! group arithmetic are deterministic, so the only meaningful retry is to
//! regenerate inputs (fresh randomness, a fresh ephemeral key) and start over.

use chrono::{DateTime, Utc};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConfidentialError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfidentialError {
    #[error("Invalid key material in `{field}`: {reason}")]
    InvalidKeyMaterial {
        field: &'static str,
        reason: &'static str,
    },

    #[error("Malformed ciphertext in `{field}`: {reason}")]
    CiphertextMalformed {
        field: &'static str,
        reason: &'static str,
    },

    #[error("Amount out of range in `{field}`: {reason}")]
    AmountOutOfRange { field: &'static str, reason: String },

    #[error("Viewing key lacks the `{capability}` capability")]
    PermissionDenied { capability: &'static str },

    #[error("Viewing key expired at {expired_at}")]
    KeyExpired { expired_at: DateTime<Utc> },

    #[error("Proof system `{system}` is a placeholder and cannot back a security claim")]
    ProofUnavailable { system: &'static str },

    #[error("Ephemeral key was already used for a previous payment")]
    EphemeralKeyReused,

    #[error("Stealth payment was already spent")]
    PaymentAlreadySpent,

    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: u64, available: u64 },

    #[error("Encrypted balance has not been opened")]
    BalanceNotInitialized,

    #[error("Sealing failed: {reason}")]
    SealingFailed { reason: &'static str },

    #[error("Invalid configuration: {reason}")]
    Config { reason: String },
}

impl ConfidentialError {
    pub(crate) fn invalid_key(field: &'static str, reason: &'static str) -> Self {
        Self::InvalidKeyMaterial { field, reason }
    }

    pub(crate) fn malformed(field: &'static str, reason: &'static str) -> Self {
        Self::CiphertextMalformed { field, reason }
    }

    pub(crate) fn out_of_range(field: &'static str, reason: impl Into<String>) -> Self {
        Self::AmountOutOfRange {
            field,
            reason: reason.into(),
        }
    }

    /// The input field the error points at, when there is one
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::InvalidKeyMaterial { field, .. }
            | Self::CiphertextMalformed { field, .. }
            | Self::AmountOutOfRange { field, .. } => Some(field),
            Self::PermissionDenied { capability } => Some(capability),
            _ => None,
        }
    }

    /// True when the failure comes from how this library is set up rather
    /// than from the caller's inputs
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Self::ProofUnavailable { .. } | Self::Config { .. })
    }
}
