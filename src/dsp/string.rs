//! Plucked string (Karplus–Strong with fractional delay).
//!
//! One period of smoothed Gaussian noise excites a delay line whose
//! fractional length is realized by blending the two neighbouring integer
//! taps, twice, at two slightly different delays.

use log::debug;

use super::buffer::RenderBuffer;
use super::engine::{RenderContext, ScheduledNote};
use super::{volume_balance, Periods};
use crate::error::Result;
use crate::rng::Rng;

/// Width of the forward moving average applied to the excitation.
const SMOOTHING_WINDOW: usize = 10;

/// Below this log-frequency the ring-out length is doubled.
const LOW_STRING_LOG_FREQ: f64 = 4.0;

pub(crate) fn render(
    notes: &[ScheduledNote],
    ctx: &RenderContext<'_>,
    buffer: &mut RenderBuffer,
) -> Result<()> {
    let seed = match ctx.seed {
        Some(seed) => seed,
        None => Rng::generate_seed()?,
    };
    debug!("string: {} notes, seed {seed:#x}", notes.len());

    let mut rng = Rng::new_with_seed(seed);
    for note in notes {
        let wave = pluck(note, ctx, &mut rng);
        buffer.add_slice(note.offset, &wave);
    }
    Ok(())
}

fn pluck(note: &ScheduledNote, ctx: &RenderContext<'_>, rng: &mut Rng) -> Vec<f64> {
    let lf = note.frequency.ln();
    let sounding = (1.0 - ctx.articulation) * note.length;
    let periods = Periods::of(note.frequency, sounding, ctx.sample_rate);
    let period = periods.period;

    let mut len = ((10.0 - lf) * periods.whole_length() as f64).max(0.0) as usize;
    if lf < LOW_STRING_LOG_FREQ {
        len *= 2;
    }
    let lo = period.floor() as usize;
    let hi = period.ceil() as usize;
    if len == 0 || lo == 0 {
        return Vec::new();
    }

    let mut y = excitation(rng, lo.min(len), len);

    let f1 = period.fract();
    let f2 = (period * (lo - 1) as f64 / lo as f64).fract();
    let falloff = (4.0 / lf * 0.25).powf(1.0 / periods.count.max(1.0));
    for t in hi..len {
        let feedback = f1 * y[t - hi]
            + (1.0 - f1) * y[t - lo]
            + f2 * y[t + 1 - hi]
            + (1.0 - f2) * y[t + 1 - lo];
        y[t] += 0.5 * feedback * falloff;
    }

    let gain = note.volume * volume_balance(lf);
    for s in y.iter_mut() {
        *s *= gain;
    }
    y
}

/// `burst` Gaussian samples at the head of a `len`-sample line, smoothed by
/// a forward moving average.
fn excitation(rng: &mut Rng, burst: usize, len: usize) -> Vec<f64> {
    let mut noise = vec![0.0; len];
    for s in noise.iter_mut().take(burst) {
        *s = rng.normal();
    }
    let mut y = vec![0.0; len];
    for (i, s) in y.iter_mut().enumerate().take(burst) {
        let window = &noise[i..(i + SMOOTHING_WINDOW).min(len)];
        *s = window.iter().sum::<f64>() / window.len() as f64;
    }
    y
}
