//! Bounded discrete-log recovery
//!
//! Recovers `a` from `M = a·G` for `a` in `[0, max_supported_amount]`:
//!
//! 1. Linear scan of `1·G, 2·G, ...` below `linear_search_limit` (fast path
//!    for the small amounts most balances hold)
//! 2. Baby-step giant-step over the rest of the range, with a memoized table
//!    of `m` baby steps and at most `(max - T1) / m + 1` giant steps
//!
//! Decryption of unbounded 64-bit amounts is not feasible. Anything above the
//! configured maximum, or anything that exhausts the search budget, fails with
//! `AmountOutOfRange`.

use std::collections::HashMap;
use std::time::Instant;

use curve25519_dalek::{ristretto::RistrettoPoint, scalar::Scalar, traits::IsIdentity};
use tracing::{debug, warn};

use crate::cache::DerivationCache;
use crate::config::EngineConfig;
use crate::curve::{basepoint, encode_point};
use crate::error::{ConfidentialError, Result};

/// How often the wall clock is consulted, in iterations
const DEADLINE_CHECK_INTERVAL: u64 = 256;

// ============================================================================
// Baby-step table
// ============================================================================

/// Compressed encodings of `(start + j)·G` for `j` in `[0, steps)`
pub struct BabyStepTable {
    start: u64,
    steps: u64,
    entries: HashMap<[u8; 32], u64>,
}

impl BabyStepTable {
    /// Build `steps` entries, giving up once the budget's deadline passes
    ///
    /// Only the wall clock applies here; the iteration budget counts search
    /// steps, not table entries.
    pub fn build(start: u64, steps: u64, budget: &SearchBudget) -> Result<Self> {
        let g = basepoint();
        let mut point = Scalar::from(start) * g;
        let mut entries = HashMap::with_capacity(steps as usize);

        for j in 0..steps {
            budget.check_deadline(j + 1)?;
            entries.entry(encode_point(&point)).or_insert(j);
            point += g;
        }

        debug!(start, steps, "built baby-step table");
        Ok(Self {
            start,
            steps,
            entries,
        })
    }

    /// Index `j` such that `point == (start + j)·G`
    pub fn lookup(&self, point: &RistrettoPoint) -> Option<u64> {
        self.entries.get(&encode_point(point)).copied()
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// Search budget
// ============================================================================

/// Iteration and wall-clock limits for one search
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchBudget {
    max_iterations: Option<u64>,
    deadline: Option<Instant>,
}

impl SearchBudget {
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// Budget starting now, from the configured limits
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            max_iterations: config.max_search_iterations,
            deadline: config.search_timeout().map(|timeout| Instant::now() + timeout),
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: u64) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    fn check(&self, iterations: u64) -> Result<()> {
        if let Some(max) = self.max_iterations {
            if iterations > max {
                warn!(max, "discrete-log search exhausted its iteration budget");
                return Err(ConfidentialError::out_of_range(
                    "amount",
                    format!("search exceeded {} iterations", max),
                ));
            }
        }
        self.check_deadline(iterations)
    }

    fn check_deadline(&self, iterations: u64) -> Result<()> {
        if let Some(deadline) = self.deadline {
            if iterations % DEADLINE_CHECK_INTERVAL == 0 && Instant::now() >= deadline {
                warn!(iterations, "discrete-log search hit its deadline");
                return Err(ConfidentialError::out_of_range(
                    "amount",
                    "search exceeded its time budget",
                ));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Solver
// ============================================================================

pub struct DiscreteLogSolver<'a> {
    config: &'a EngineConfig,
    cache: &'a DerivationCache,
}

impl<'a> DiscreteLogSolver<'a> {
    pub fn new(config: &'a EngineConfig, cache: &'a DerivationCache) -> Self {
        Self { config, cache }
    }

    /// Recover `a` from `a·G` under the configured budget
    pub fn solve(&self, message: &RistrettoPoint) -> Result<u64> {
        self.solve_with_budget(message, SearchBudget::from_config(self.config))
    }

    pub fn solve_with_budget(&self, message: &RistrettoPoint, budget: SearchBudget) -> Result<u64> {
        if message.is_identity() {
            return Ok(0);
        }

        let max = self.config.max_supported_amount;
        let linear_limit = self.config.linear_search_limit;
        let g = basepoint();
        let mut iterations: u64 = 0;

        // Phase 1: linear
        let linear_end = linear_limit.min(max.saturating_add(1));
        let mut candidate = g;
        for i in 1..linear_end {
            iterations += 1;
            budget.check(iterations)?;
            if candidate == *message {
                debug!(iterations, "discrete log found in linear phase");
                return Ok(i);
            }
            candidate += g;
        }

        // Phase 2: baby-step giant-step over [linear_limit, max]
        let steps = self.config.effective_baby_steps();
        if steps == 0 {
            return Err(self.exhausted());
        }

        // A cold cache builds the table under the same deadline
        let table = self.cache.baby_step_table(linear_limit, steps, &budget)?;
        let giant_stride = Scalar::from(steps) * g;
        let giant_count = (max - linear_limit) / steps + 1;

        let mut remaining = *message;
        for k in 0..giant_count {
            iterations += 1;
            budget.check(iterations)?;
            if let Some(j) = table.lookup(&remaining) {
                let amount = linear_limit + k * steps + j;
                if amount > max {
                    break;
                }
                debug!(iterations, giant_step = k, "discrete log found in giant-step phase");
                return Ok(amount);
            }
            remaining -= giant_stride;
        }

        Err(self.exhausted())
    }

    fn exhausted(&self) -> ConfidentialError {
        ConfidentialError::out_of_range(
            "amount",
            format!(
                "no discrete log within the supported maximum {}",
                self.config.max_supported_amount
            ),
        )
    }
}
