//! Read-through memo for deterministic derivations
//!
//! Holds derived generators, baby-step tables and account masks. Entries are
//! pure functions of their key, so the cache is append-only: an entry is never
//! replaced once present. Misses are computed outside the map and inserted with
//! insert-or-get-existing, so two threads racing on the same key both end up
//! with the first stored value.
//!
//! The cache is an explicit object shared through `Arc`, never a global, so
//! tests can run with isolated instances.

use std::hash::Hash;
use std::sync::Arc;

use curve25519_dalek::ristretto::RistrettoPoint;
use dashmap::DashMap;

use crate::curve::derive_generator;
use crate::dlog::{BabyStepTable, SearchBudget};
use crate::error::Result;

#[derive(Default)]
pub struct DerivationCache {
    generators: DashMap<Vec<u8>, RistrettoPoint>,
    baby_steps: DashMap<(u64, u64), Arc<BabyStepTable>>,
    account_masks: DashMap<String, [u8; 32]>,
}

impl DerivationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Generator for `label`, hashed to the group on first use
    pub fn generator(&self, label: &[u8]) -> RistrettoPoint {
        read_through(&self.generators, label.to_vec(), || derive_generator(label))
    }

    /// Baby-step table starting at `start·G` with `steps` entries
    ///
    /// A miss builds the table under `budget`; a build that runs out of time
    /// is dropped and nothing is cached.
    pub fn baby_step_table(&self, start: u64, steps: u64, budget: &SearchBudget) -> Result<Arc<BabyStepTable>> {
        if let Some(hit) = self.baby_steps.get(&(start, steps)) {
            return Ok(Arc::clone(hit.value()));
        }
        let built = Arc::new(BabyStepTable::build(start, steps, budget)?);
        Ok(Arc::clone(self.baby_steps.entry((start, steps)).or_insert(built).value()))
    }

    /// Mask for `account_id`, computed by `compute` on first use
    pub fn account_mask<F>(&self, account_id: &str, compute: F) -> [u8; 32]
    where
        F: FnOnce() -> [u8; 32],
    {
        read_through(&self.account_masks, account_id.to_string(), compute)
    }

    pub fn cached_generators(&self) -> usize {
        self.generators.len()
    }

    pub fn cached_tables(&self) -> usize {
        self.baby_steps.len()
    }

    pub fn cached_masks(&self) -> usize {
        self.account_masks.len()
    }
}

impl std::fmt::Debug for DerivationCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivationCache")
            .field("generators", &self.generators.len())
            .field("baby_steps", &self.baby_steps.len())
            .field("account_masks", &self.account_masks.len())
            .finish()
    }
}

fn read_through<K, V, F>(map: &DashMap<K, V>, key: K, compute: F) -> V
where
    K: Eq + Hash,
    V: Clone,
    F: FnOnce() -> V,
{
    if let Some(hit) = map.get(&key) {
        return hit.value().clone();
    }
    let computed = compute();
    map.entry(key).or_insert(computed).value().clone()
}
