//! Render configuration: tempo, transposition, articulation and friends.

use serde::{Deserialize, Serialize};

use crate::dsp::engine::Backend;
use crate::error::{Result, SynthError};
use crate::score::check_timing;

/// Rate used by the oscillator, piano and string voices unless overridden.
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Options recognized by every backend's `render`.
///
/// Use [`RenderConfig::for_backend`] to start from the defaults a given
/// voice was tuned with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Quarter notes per minute.
    pub tempo: f64,
    /// Octave shift; every frequency is multiplied by `2^transpose`.
    pub transpose: f64,
    /// Inter-note pause fraction for gated voices, or the fraction of the
    /// note held before the release decay for decaying voices. `None`
    /// takes the backend's own default.
    #[serde(alias = "pause", alias = "legato_stac")]
    pub articulation: Option<f64>,
    /// Volume multiplier for notes marked with `*`.
    pub boost: f64,
    /// Number of extra full replays appended after the first pass.
    pub repeat: u32,
    /// Output sample rate in Hz.
    pub sample_rate: u32,
    /// Seed for noise-driven voices. The drum voice falls back to a fixed
    /// seed; the plucked string draws a fresh one when unset.
    pub seed: Option<u64>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfig {
            tempo: 120.0,
            transpose: 0.0,
            articulation: None,
            boost: 1.0,
            repeat: 0,
            sample_rate: DEFAULT_SAMPLE_RATE,
            seed: None,
        }
    }
}

impl RenderConfig {
    /// Defaults matching the rate and boost a backend was calibrated for.
    pub fn for_backend(backend: Backend) -> Self {
        match backend {
            Backend::Sampler => RenderConfig {
                boost: 1.1,
                sample_rate: crate::dsp::sampler::LIBRARY_SAMPLE_RATE,
                ..Default::default()
            },
            _ => RenderConfig::default(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reject configurations no backend can render.
    pub fn validate(&self) -> Result<()> {
        check_timing(self.tempo, self.sample_rate)?;
        if !self.transpose.is_finite() {
            return Err(SynthError::InvalidConfig(format!(
                "transpose must be finite, got {}",
                self.transpose
            )));
        }
        if !(self.boost >= 0.0 && self.boost.is_finite()) {
            return Err(SynthError::InvalidConfig(format!(
                "boost must be a non-negative number, got {}",
                self.boost
            )));
        }
        if let Some(a) = self.articulation {
            if !(0.0..=1.0).contains(&a) {
                return Err(SynthError::InvalidConfig(format!(
                    "articulation must lie in [0, 1], got {a}"
                )));
            }
        }
        Ok(())
    }

    /// Articulation fraction to use for `backend`.
    pub fn articulation_for(&self, backend: Backend) -> f64 {
        self.articulation
            .unwrap_or_else(|| backend.default_articulation())
    }

    /// Frequency multiplier implied by `transpose`.
    pub fn transpose_factor(&self) -> f64 {
        self.transpose.exp2()
    }

    pub fn with_tempo(mut self, tempo: f64) -> Self {
        self.tempo = tempo;
        self
    }

    pub fn with_transpose(mut self, octaves: f64) -> Self {
        self.transpose = octaves;
        self
    }

    pub fn with_articulation(mut self, articulation: f64) -> Self {
        self.articulation = Some(articulation);
        self
    }

    pub fn with_boost(mut self, boost: f64) -> Self {
        self.boost = boost;
        self
    }

    pub fn with_repeat(mut self, repeat: u32) -> Self {
        self.repeat = repeat;
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}
