//! Deterministic RNG utilities for reproducible tests.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Create a deterministic `ChaCha8Rng` from a seed.
///
/// All test randomization should go through this to ensure reproducibility.
pub fn seeded_rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// A batch of `rows` deterministic actions in `[-1, 1)`.
pub fn deterministic_actions(rows: usize, seed: u64) -> Vec<[f32; 6]> {
    let mut rng = seeded_rng(seed);
    (0..rows)
        .map(|_| std::array::from_fn(|_| rng.r#gen::<f32>().mul_add(2.0, -1.0)))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
