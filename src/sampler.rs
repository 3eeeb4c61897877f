//! Persistence sampling gate
//!
//! Whether a request's summary is persisted is decided by one uniform draw
//! in [1, 100] inclusive, compared against the configured rate. No draw is
//! ever <= 0, so rate 0 never persists and rate 100 always does.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Decides whether a given request's sample is persisted
#[derive(Debug)]
pub struct SampleGate {
    rng: StdRng,
}

impl SampleGate {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic gate for tests and replay
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// One draw in [1, 100]; persist iff draw <= rate
    pub fn should_persist(&mut self, rate_percent: u8) -> bool {
        let draw: u8 = self.rng.gen_range(1..=100);
        draw <= rate_percent
    }
}

impl Default for SampleGate {
    fn default() -> Self {
        Self::new()
    }
}
