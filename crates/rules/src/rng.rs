use rand::SeedableRng;
use rand::rngs::SmallRng;
use serde::Deserialize;
use serde::Serialize;

/// Seeded randomness for one session.
///
/// Every randomized rule decision derives a fresh generator from
/// (seed, purpose tag, decision index), so the same session seed and the
/// same action sequence always reproduce the same outcomes. The index is
/// the turn-history length at decision time; the root seed is fixed at
/// session creation and never reseeded from the wall clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRng {
    seed: u64,
}

impl SessionRng {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }
    pub fn seed(&self) -> u64 {
        self.seed
    }
    /// Fork a generator for one decision.
    pub fn at(&self, tag: &str, n: u64) -> SmallRng {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::Hash;
        use std::hash::Hasher;
        let ref mut hasher = DefaultHasher::new();
        self.seed.hash(hasher);
        tag.hash(hasher);
        n.hash(hasher);
        SmallRng::seed_from_u64(hasher.finish())
    }
}
