//! Direct-write oscillator voices: sine, square, noise drum and beeper.
//!
//! These voices compute every sample in `[-1, 1]` and overwrite their slot
//! in the buffer. Notes never overlap, so no accumulation or peak
//! normalization is needed.

use std::f64::consts::TAU;

use super::buffer::RenderBuffer;
use super::engine::{RenderContext, ScheduledNote};
use super::envelope::NoteEnvelope;
use super::{volume_balance, Periods};
use crate::rng::{Rng, DEFAULT_SEED};

/// Highest partial weight the sine voice gives its low notes.
const HARM_MAX: f64 = 4.0;

/// Square and noise output level before the note volume.
const SQUARE_LEVEL: f64 = 0.5;

/// Low-pass coefficients (1/α) of the square and noise voices.
const SQUARE_SMOOTHING: f64 = 100.0;
const NOISE_SMOOTHING: f64 = 10.0;

/// Decay constant of the noise drum hit, in samples.
const NOISE_DECAY: f64 = 1000.0;

/// The beeper's period is this many times shorter than the note's.
pub const BEEP_PITCH_DIVISOR: f64 = 4.0;

/// `(start, end, start_level, end_level)` of the beeper's piecewise wave,
/// as fractions of one cycle.
const BEEP_SEGMENTS: [(f64, f64, f64, f64); 4] = [
    (0.0, 0.3, 1.0, -1.0),
    (0.3, 0.5, -1.0, 0.0),
    (0.5, 0.6, 0.0, -0.5),
    (0.6, 1.0, -0.5, 1.0),
];

/// Which direct-write waveform to synthesize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Sine,
    Square,
    Noise,
    Beep,
}

/// Render every note of `notes` into `buffer`.
pub(crate) fn render(
    tone: Tone,
    notes: &[ScheduledNote],
    ctx: &RenderContext<'_>,
    buffer: &mut RenderBuffer,
) {
    let mut rng = Rng::new_with_seed(ctx.seed.unwrap_or(DEFAULT_SEED));
    for note in notes {
        let samples = match tone {
            Tone::Sine => sine_note(note, ctx),
            Tone::Square => square_note(note, ctx),
            Tone::Noise => noise_note(note, ctx, &mut rng),
            Tone::Beep => beep_note(note, ctx),
        };
        buffer.write_slice(note.offset, &samples);
    }
}

/// Whole-period sounding length after the inter-note pause, never past the
/// note's nominal end.
fn gated_length(note: &ScheduledNote, ctx: &RenderContext<'_>) -> usize {
    let sounding = (1.0 - ctx.articulation) * note.length;
    Periods::of(note.frequency, sounding, ctx.sample_rate)
        .whole_length()
        .min(note.length as usize)
}

fn sine_note(note: &ScheduledNote, ctx: &RenderContext<'_>) -> Vec<f64> {
    let lf = note.frequency.ln();
    let period = ctx.sample_rate / note.frequency;
    let q = gated_length(note, ctx);

    let t = (lf - 3.0) / HARM_MAX;
    let harm = if t > 1.0 { 0.0 } else { 2.0 * (1.0 - t) };
    let decay = 2.0 / lf;
    let volfac = volume_balance(lf);
    let env = NoteEnvelope::STRUCK;

    (0..q)
        .map(|x| {
            let phi = TAU * x as f64 / period;
            let s = x as f64 / q as f64;
            let dfac = 1.0 - s + s * decay;
            let wave =
                (phi.sin() + harm * (2.0 * phi).sin() + 0.5 * harm * (4.0 * phi).sin()) / 4.0;
            wave * env.gain(x, q) * note.volume * dfac * volfac
        })
        .collect()
}

fn square_note(note: &ScheduledNote, ctx: &RenderContext<'_>) -> Vec<f64> {
    let half_period = ctx.sample_rate / note.frequency / 2.0;
    let q = gated_length(note, ctx);
    let env = NoteEnvelope::GATED;

    let mut level = 0.0;
    (0..q)
        .map(|x| {
            let target = if (x as f64 / half_period) as u64 % 2 == 1 {
                1.0
            } else {
                -1.0
            };
            level += (target - level) / SQUARE_SMOOTHING;
            SQUARE_LEVEL * env.gain(x, q) * note.volume * level
        })
        .collect()
}

fn noise_note(note: &ScheduledNote, ctx: &RenderContext<'_>, rng: &mut Rng) -> Vec<f64> {
    let q = gated_length(note, ctx);
    let env = NoteEnvelope::GATED;

    let mut level = 0.0;
    (0..q)
        .map(|x| {
            level += (rng.rand_float() - level) / NOISE_SMOOTHING;
            (-(x as f64) / NOISE_DECAY).exp() * env.gain(x, q) * note.volume * level
        })
        .collect()
}

/// Level of the piecewise beeper wave at phase `p` in `[0, 1]`.
pub fn beep_level(p: f64) -> f64 {
    BEEP_SEGMENTS
        .iter()
        .find(|(start, end, _, _)| (*start..=*end).contains(&p))
        .map(|&(start, end, from, to)| from + (to - from) * (p - start) / (end - start))
        .unwrap_or(0.0)
}

fn beep_cycle(frequency: f64, sample_rate: f64, volume: f64) -> Vec<f64> {
    let period = ((sample_rate / BEEP_PITCH_DIVISOR / frequency) as usize).max(1);
    (0..period)
        .map(|i| {
            let p = i as f64 / period as f64;
            let tone = ((TAU * p).sin() + (2.0 * TAU * p).sin()) / 2.0;
            (tone + beep_level(p)) / 2.0 * volume
        })
        .collect()
}

fn beep_note(note: &ScheduledNote, ctx: &RenderContext<'_>) -> Vec<f64> {
    let cycle = beep_cycle(note.frequency, ctx.sample_rate, note.volume);
    let period = cycle.len();
    let duration = note.length as usize;
    let env = NoteEnvelope::BEEP;
    let fade = env.release;

    let mut out = Vec::with_capacity(duration);
    let mut x = 0;
    while x < duration {
        // Between the fades whole cycles can be copied verbatim.
        if x >= env.attack && duration - x >= fade && x % period == 0 {
            while x + period + fade < duration {
                out.extend_from_slice(&cycle);
                x += period;
            }
        }
        out.push(cycle[x % period] * env.gain(x, duration));
        x += 1;
    }
    out
}
