//! Engine configuration
//!
//! Bounds for the discrete-log search and the proof policy. Loaded from JSON
//! or built in code; unspecified fields take their defaults.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfidentialError, Result};

/// Largest amount the default configuration can decrypt (2^32 - 1)
pub const DEFAULT_MAX_SUPPORTED_AMOUNT: u64 = u32::MAX as u64;

/// Hard ceiling for `max_supported_amount`; beyond this the search table
/// no longer fits a sensible memory budget
pub const MAX_SUPPORTED_AMOUNT_CEILING: u64 = 1 << 48;

/// Amounts below this are found by the linear fast path
pub const DEFAULT_LINEAR_SEARCH_LIMIT: u64 = 4096;

/// Upper bound on baby-step table entries
pub const MAX_BABY_STEPS: u64 = 1 << 24;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Largest amount `encrypt` accepts and `decrypt` can recover
    pub max_supported_amount: u64,
    /// Phase 1 compares `i·G` for `i` in `1..linear_search_limit`
    pub linear_search_limit: u64,
    /// Baby-step table size; `None` picks the square root of the search range
    pub baby_steps: Option<u64>,
    /// Iteration budget for one decryption
    pub max_search_iterations: Option<u64>,
    /// Wall-clock budget for one decryption, in milliseconds
    pub search_timeout_ms: Option<u64>,
    /// Refuse to produce or accept placeholder range proofs
    pub require_sound_proofs: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_supported_amount: DEFAULT_MAX_SUPPORTED_AMOUNT,
            linear_search_limit: DEFAULT_LINEAR_SEARCH_LIMIT,
            baby_steps: None,
            max_search_iterations: None,
            search_timeout_ms: None,
            require_sound_proofs: false,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json).map_err(|e| ConfidentialError::Config {
            reason: format!("Failed to parse config: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| ConfidentialError::Config {
            reason: format!("Failed to read config file {:?}: {}", path, e),
        })?;
        tracing::debug!(path = %path.display(), "loading engine config");
        Self::from_json_str(&json)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| ConfidentialError::Config {
            reason: format!("Failed to serialize config: {}", e),
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_supported_amount > MAX_SUPPORTED_AMOUNT_CEILING {
            return Err(ConfidentialError::Config {
                reason: format!(
                    "max_supported_amount {} exceeds ceiling {}",
                    self.max_supported_amount, MAX_SUPPORTED_AMOUNT_CEILING
                ),
            });
        }
        if self.linear_search_limit == 0 {
            return Err(ConfidentialError::Config {
                reason: "linear_search_limit must be at least 1".to_string(),
            });
        }
        if let Some(steps) = self.baby_steps {
            if steps == 0 || steps > MAX_BABY_STEPS {
                return Err(ConfidentialError::Config {
                    reason: format!("baby_steps must be in 1..={}", MAX_BABY_STEPS),
                });
            }
        }
        Ok(())
    }

    /// Number of baby steps used by phase 2
    ///
    /// Zero when phase 1 already covers the whole supported range.
    pub fn effective_baby_steps(&self) -> u64 {
        if self.linear_search_limit > self.max_supported_amount {
            return 0;
        }
        let range = self.max_supported_amount - self.linear_search_limit + 1;
        match self.baby_steps {
            Some(steps) => steps.min(range),
            None => ceil_sqrt(range).min(MAX_BABY_STEPS),
        }
    }

    pub fn search_timeout(&self) -> Option<Duration> {
        self.search_timeout_ms.map(Duration::from_millis)
    }
}

fn ceil_sqrt(n: u64) -> u64 {
    if n == 0 {
        return 0;
    }
    let mut root = (n as f64).sqrt() as u64;
    // Float rounding can land one off in either direction
    while root.saturating_mul(root) > n {
        root -= 1;
    }
    while root.saturating_mul(root) < n {
        root += 1;
    }
    root
}
