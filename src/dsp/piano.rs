//! Additive piano model.
//!
//! Five partials per note, weighted from measured harmonic intensities,
//! decaying at a key-dependent rate. A per-note attack shape, a slow beat
//! modulation and an exponential release after the legato point complete
//! the sound. Raw waveforms of recurring keys are cached for the render.

use std::f64::consts::TAU;

use log::{debug, warn};

use super::buffer::RenderBuffer;
use super::cache::NoteCache;
use super::engine::{RenderContext, ScheduledNote};
use super::envelope::legato_cut;
use super::{volume_balance, Periods};
use crate::error::Result;
use crate::pitch::KEY_COUNT;

/// Length of the uncut waveform rendered for each key.
pub const RAW_SECONDS: f64 = 12.0;

/// A note sounds for this many whole-period lengths, or one second,
/// whichever is longer.
const SUSTAIN_FACTOR: f64 = 3.1;

/// Key numbers (1-based) at which harmonic intensities were measured.
const HARMONIC_KEYS: [f64; 8] = [1.0, 16.0, 28.0, 40.0, 52.0, 64.0, 76.0, 88.0];

/// Measured intensity in dB of partials 1 to 5 at each of [`HARMONIC_KEYS`].
const HARMONIC_DB: [[f64; 5]; 8] = [
    [-15.8, -3.0, -15.3, -22.8, -40.7],
    [-15.8, -3.0, -15.3, -22.8, -40.7],
    [-5.7, -4.4, -17.7, -16.0, -38.7],
    [-6.8, -17.2, -22.4, -16.8, -75.6],
    [-8.4, -19.7, -23.5, -21.6, -76.8],
    [-9.3, -20.8, -37.2, -36.3, -76.4],
    [-18.0, -64.5, -74.4, -77.3, -80.8],
    [-24.8, -53.8, -77.2, -80.8, -90.0],
];

/// Overtone multiples of the four upper partials.
const OVERTONES: [f64; 4] = [2.0, 3.0, 4.0, 8.0];

const DECAY_POINTS: usize = 1000;
const DECAY_LOG_FREQ: [f64; 5] = [0.0, 3.0, 5.0, 6.0, 9.0];
const DECAY_SECONDS: [f64; 5] = [3.0, 5.0, 1.0, 0.8, 0.1];

pub const ATTACK_SAMPLES: usize = 3000;
const ATTACK_BREAKS: [f64; 9] = [0.0, 100.0, 300.0, 400.0, 600.0, 800.0, 1000.0, 2000.0, 3000.0];
const BASS_ATTACK: [f64; 9] = [0.0, 0.1, 0.2, 0.15, 0.1, 0.9, 1.25, 1.15, 1.0];
const TREBLE_ATTACK: [f64; 9] = [0.0, 0.2, 0.7, 0.6, 0.25, 0.9, 1.25, 1.15, 1.0];

/// Piecewise-linear interpolation of `(xs, ys)` at `x`, holding the end
/// values outside the range. `xs` must be increasing.
pub(crate) fn interp(x: f64, xs: &[f64], ys: &[f64]) -> f64 {
    let last = xs.len() - 1;
    if x <= xs[0] {
        return ys[0];
    }
    if x >= xs[last] {
        return ys[last];
    }
    let i = xs.partition_point(|&p| p <= x) - 1;
    let t = (x - xs[i]) / (xs[i + 1] - xs[i]);
    ys[i] + (ys[i + 1] - ys[i]) * t
}

/// Amplitude decay time in seconds. The breakpoints are spread over one
/// unit of log-frequency and looked up at `floor(100 * log_freq)`, so the
/// table reaches only its first segment and every key decays over three
/// to three and a half seconds.
#[derive(Debug, Clone)]
pub struct DecayCurve(Vec<f64>);

impl DecayCurve {
    pub fn new() -> Self {
        let log_seconds: Vec<f64> = DECAY_SECONDS.iter().map(|s| s.ln()).collect();
        DecayCurve(
            (0..DECAY_POINTS)
                .map(|i| {
                    let x = i as f64 / (DECAY_POINTS - 1) as f64;
                    interp(x, &DECAY_LOG_FREQ, &log_seconds).exp()
                })
                .collect(),
        )
    }

    /// Decay time for a note whose log-frequency is `log_freq`.
    pub fn seconds(&self, log_freq: f64) -> f64 {
        let i = (100.0 * log_freq).max(0.0) as usize;
        self.0[i.min(DECAY_POINTS - 1)]
    }
}

impl Default for DecayCurve {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable lookup tables shared by every piano render.
#[derive(Debug, Clone)]
pub struct PianoTables {
    /// Linear weight of partials 2 to 5 relative to the fundamental, per key.
    harmonics: Vec<[f64; 4]>,
    decay: DecayCurve,
    bass_attack: Vec<f64>,
    treble_attack: Vec<f64>,
}

impl PianoTables {
    pub fn new() -> Self {
        let harmonics = (0..KEY_COUNT)
            .map(|key| {
                let at = (key + 1) as f64;
                let db: Vec<f64> = (0..5)
                    .map(|order| {
                        let column: Vec<f64> = HARMONIC_DB.iter().map(|row| row[order]).collect();
                        interp(at, &HARMONIC_KEYS, &column)
                    })
                    .collect();
                let mut ratios = [0.0; 4];
                for (r, d) in ratios.iter_mut().zip(&db[1..]) {
                    *r = 10f64.powf((d - db[0]) / 20.0);
                }
                ratios
            })
            .collect();

        let attack = |shape: &[f64]| -> Vec<f64> {
            (0..ATTACK_SAMPLES)
                .map(|i| interp(i as f64, &ATTACK_BREAKS, shape))
                .collect()
        };

        PianoTables {
            harmonics,
            decay: DecayCurve::new(),
            bass_attack: attack(&BASS_ATTACK),
            treble_attack: attack(&TREBLE_ATTACK),
        }
    }

    /// Weights of partials 2 to 5 for `key`.
    pub fn harmonics(&self, key: u8) -> [f64; 4] {
        self.harmonics[(key as usize).min(KEY_COUNT - 1)]
    }

    pub fn decay(&self) -> &DecayCurve {
        &self.decay
    }

    /// Attack gain at sample `i` for a note on `key` played at `volume`.
    /// Higher and louder notes lean towards the brighter treble shape.
    pub fn attack_gain(&self, i: usize, key: u8, volume: f64) -> f64 {
        if i >= ATTACK_SAMPLES {
            return 1.0;
        }
        let att = (key as f64 / 87.0 * volume).min(1.0);
        att * self.treble_attack[i] + (1.0 - att) * self.bass_attack[i]
    }

    /// The uncut waveform of `key` sounding at `frequency`.
    pub fn raw_waveform(&self, key: u8, frequency: f64, sample_rate: f64) -> Vec<f64> {
        let lf = frequency.ln();
        let tau = self.decay.seconds(lf);
        let volfac = volume_balance(lf);
        let weights = self.harmonics(key);
        let len = (RAW_SECONDS * sample_rate) as usize;

        (0..len)
            .map(|x| {
                let phi = TAU * frequency * x as f64 / sample_rate;
                let t = x as f64 / sample_rate;
                let overtone_decay = (-t / (3.0 * tau)).exp();
                let overtones: f64 = weights
                    .iter()
                    .zip(OVERTONES)
                    .map(|(w, m)| w * (m * phi).sin())
                    .sum();
                (phi.sin() + overtone_decay * overtones) * volfac * (-t / tau).exp()
            })
            .collect()
    }
}

impl Default for PianoTables {
    fn default() -> Self {
        Self::new()
    }
}

/// Samples a decaying note would like to sound, given its whole-period
/// length `q`.
pub(crate) fn wanted_length(q: usize, sample_rate: f64) -> usize {
    ((SUSTAIN_FACTOR * q as f64) as usize).max(sample_rate as usize)
}

/// [`wanted_length`] capped at the raw waveform length.
pub(crate) fn sounding_length(note: &ScheduledNote, q: usize, sample_rate: f64) -> usize {
    let wanted = wanted_length(q, sample_rate);
    let raw = (RAW_SECONDS * sample_rate) as usize;
    if wanted > raw {
        warn!(
            "key {} wants {wanted} samples, truncating to the {raw}-sample raw waveform",
            note.key
        );
    }
    wanted.min(raw)
}

/// Slow amplitude beating between the strings of one key.
fn beat(i: usize, log_freq: f64, sample_rate: f64) -> f64 {
    let schweb = sample_rate / (100.0 * log_freq);
    let depth = 0.05 - (log_freq - 5.0) / 100.0;
    1.0 + depth * (TAU * i as f64 / schweb / 32.0).sin()
}

pub(crate) fn render(
    notes: &[ScheduledNote],
    ctx: &RenderContext<'_>,
    buffer: &mut RenderBuffer,
) -> Result<()> {
    let tables = ctx.piano;
    let mut cache = NoteCache::from_occurrences(notes.iter().map(|n| n.key));

    for note in notes {
        let lf = note.frequency.ln();
        let q = Periods::of(note.frequency, note.length, ctx.sample_rate).whole_length();
        let len = sounding_length(note, q, ctx.sample_rate);

        let mut wave = cache.fetch(&note.key, || {
            Ok(tables.raw_waveform(note.key, note.frequency, ctx.sample_rate))
        })?;
        wave.truncate(len);
        legato_cut(&mut wave, (ctx.articulation * q as f64) as usize);

        for (i, s) in wave.iter_mut().enumerate() {
            *s *= tables.attack_gain(i, note.key, note.volume)
                * beat(i, lf, ctx.sample_rate)
                * note.volume;
        }
        buffer.add_slice(note.offset, &wave);
    }

    debug!(
        "piano: {} notes, {} cached keys, {} cache hits",
        notes.len(),
        cache.retained(),
        cache.hits()
    );
    Ok(())
}
