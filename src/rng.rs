//! Deterministic random streams.
//!
//! Nothing in this crate shares a generator between concurrent callers. Each
//! synthesis call and each harness worker owns a [`Pcg64Mcg`] derived from a
//! master seed and a stream index, so a seeded run is reproducible and no
//! generator is ever behind a lock.

use std::sync::atomic::{AtomicU64, Ordering};

use rand::{RngCore, SeedableRng, rngs::OsRng};
use rand_pcg::Pcg64Mcg;

const STREAM_MIX: u64 = 0x9e37_79b9_7f4a_7c15;

/// Generator for `stream` under `master_seed`.
pub fn stream_rng(master_seed: u64, stream: u64) -> Pcg64Mcg {
    Pcg64Mcg::seed_from_u64(master_seed ^ stream.wrapping_add(1).wrapping_mul(STREAM_MIX))
}

/// Hands out one independent generator per call.
#[derive(Debug)]
pub struct RngSeeder {
    master_seed: u64,
    next_stream: AtomicU64,
}

impl RngSeeder {
    /// Reproducible seeder.
    pub fn seeded(master_seed: u64) -> Self {
        Self {
            master_seed,
            next_stream: AtomicU64::new(0),
        }
    }

    /// Seeder keyed from OS entropy.
    pub fn from_entropy() -> Self {
        Self::seeded(OsRng.next_u64())
    }

    /// Master seed this seeder derives from.
    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    /// Next generator. Streams are never reused.
    pub fn next_rng(&self) -> Pcg64Mcg {
        let stream = self.next_stream.fetch_add(1, Ordering::Relaxed);
        stream_rng(self.master_seed, stream)
    }
}
