//! Seedable pseudorandom source for the noise-driven voices.

use std::f64::consts::TAU;

use crate::error::{Result, SynthError};

/// Seed used by voices that must stay deterministic when no seed is given.
pub const DEFAULT_SEED: u64 = 0x5eed_50a9;

/// A non-cryptographic PRNG. Two instances built from the same seed
/// produce the same stream, which is what makes noisy renders reproducible.
#[derive(Debug, Clone)]
pub struct Rng(oorandom::Rand64);

impl Rng {
    pub fn new_with_seed(seed: u64) -> Self {
        Self(oorandom::Rand64::new(seed as u128))
    }

    /// A fresh seed from the operating system.
    pub fn generate_seed() -> Result<u64> {
        let mut bytes = [0u8; 8];
        getrandom::getrandom(&mut bytes).map_err(|e| {
            SynthError::Io(std::io::Error::other(format!("no entropy source: {e}")))
        })?;
        Ok(u64::from_le_bytes(bytes))
    }

    /// Uniform in `[0, 1)`.
    pub fn rand_float(&mut self) -> f64 {
        self.0.rand_float()
    }

    /// Standard normal deviate (Box–Muller).
    pub fn normal(&mut self) -> f64 {
        // 1 - u keeps the logarithm away from zero.
        let u1 = 1.0 - self.rand_float();
        let u2 = self.rand_float();
        (-2.0 * u1.ln()).sqrt() * (TAU * u2).cos()
    }
}
