//! DSP engine: pure Rust note-to-waveform synthesis.
//!
//! Every voice renders offline into a [`buffer::RenderBuffer`] and is
//! finalized to 16-bit PCM exactly once. The same code powers the native
//! API and the WASM bindings.

pub mod buffer;
pub mod cache;
pub mod engine;
pub mod envelope;
pub mod fm;
pub mod mixer;
pub mod oscillator;
pub mod piano;
pub mod renderer;
pub mod sampler;
pub mod string;

use std::f64::consts::PI;

/// Period length and whole-period count of a tone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Periods {
    /// Samples per cycle (fractional).
    pub period: f64,
    /// Cycles that fit into the requested length, rounded half-to-even.
    pub count: f64,
}

impl Periods {
    pub fn of(frequency: f64, length: f64, sample_rate: f64) -> Self {
        Periods {
            period: sample_rate / frequency,
            count: (length / sample_rate * frequency).round_ties_even(),
        }
    }

    /// Length in samples of the whole cycles, floored.
    pub fn whole_length(&self) -> usize {
        (self.period * self.count) as usize
    }
}

/// Loudness correction over log-frequency so bass and treble notes come out
/// at a similar perceived level.
pub(crate) fn volume_balance(log_freq: f64) -> f64 {
    let t = (log_freq - 3.0) / (8.5 - 3.0);
    1.0 + 0.8 * t * (PI / 5.3 * (log_freq - 3.0)).cos()
}
