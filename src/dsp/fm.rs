//! Frequency-modulation piano. Three modulated carriers with linear
//! envelopes tied to the wanted sounding length, on top of the harmonic
//! piano's decay curve. Notes longer than the raw waveform are cut before
//! their envelopes close.

use std::f64::consts::TAU;

use log::debug;

use super::buffer::RenderBuffer;
use super::cache::NoteCache;
use super::engine::{RenderContext, ScheduledNote};
use super::envelope::legato_cut;
use super::piano::{sounding_length, wanted_length, DecayCurve};
use super::Periods;
use crate::error::Result;

/// Modulation index and ratio of the bright, fast-fading carrier.
const BRIGHT_INDEX: f64 = 0.58;
const BRIGHT_RATIO: f64 = 14.0;

/// Self-modulation indices of the two body carriers.
const BODY_INDICES: [f64; 2] = [0.89, 0.79];

/// FM waveform of `len` samples at `frequency`, with envelopes that close
/// at `envelope_len`.
pub fn raw_waveform(
    decay: &DecayCurve,
    frequency: f64,
    envelope_len: usize,
    len: usize,
    sample_rate: f64,
) -> Vec<f64> {
    let tau = decay.seconds(frequency.ln());
    let l = envelope_len as f64;
    (0..len)
        .map(|x| {
            let xf = x as f64;
            let phi = TAU * frequency * xf / sample_rate;
            let a1 = (1.0 - xf / l).max(0.0);
            let a2 = (1.0 - 4.0 * xf / l).max(0.0);
            let a3 = (1.0 - xf / (4.0 * l)).max(0.0);
            let bright = a1 * (phi + BRIGHT_INDEX * a2 * (BRIGHT_RATIO * phi).sin()).sin();
            let body: f64 = BODY_INDICES
                .iter()
                .map(|m| a3 * (phi + m * a3 * phi.sin()).sin())
                .sum();
            (bright + body) * (-xf / sample_rate / tau).exp()
        })
        .collect()
}

pub(crate) fn render(
    notes: &[ScheduledNote],
    ctx: &RenderContext<'_>,
    buffer: &mut RenderBuffer,
) -> Result<()> {
    let decay = ctx.piano.decay();
    let shapes: Vec<(usize, usize, usize)> = notes
        .iter()
        .map(|note| {
            let q = Periods::of(note.frequency, note.length, ctx.sample_rate).whole_length();
            (
                q,
                wanted_length(q, ctx.sample_rate),
                sounding_length(note, q, ctx.sample_rate),
            )
        })
        .collect();

    // The envelopes stretch with the wanted length, so it is part of the
    // identity.
    let mut cache = NoteCache::from_occurrences(
        notes
            .iter()
            .zip(&shapes)
            .map(|(n, &(_, wanted, _))| (n.key, wanted)),
    );

    for (note, &(q, wanted, len)) in notes.iter().zip(&shapes) {
        let mut wave = cache.fetch(&(note.key, wanted), || {
            Ok(raw_waveform(decay, note.frequency, wanted, len, ctx.sample_rate))
        })?;
        legato_cut(&mut wave, (ctx.articulation * q as f64) as usize);
        for s in wave.iter_mut() {
            *s *= note.volume;
        }
        buffer.add_slice(note.offset, &wave);
    }

    debug!(
        "fm piano: {} notes, {} cached waveforms, {} cache hits",
        notes.len(),
        cache.retained(),
        cache.hits()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::piano::PianoTables;

    #[test]
    fn envelopes_close_at_the_sounding_length() {
        let decay = DecayCurve::new();
        let wave = raw_waveform(&decay, 220.0, 44100, 44100, 44100.0);
        assert_eq!(wave.len(), 44100);
        assert_eq!(wave[0], 0.0);
        // Only the body carriers remain near the end, at a quarter level.
        let tail = wave[40_000..].iter().fold(0.0_f64, |m, s| m.max(s.abs()));
        let head = wave[..4_000].iter().fold(0.0_f64, |m, s| m.max(s.abs()));
        assert!(tail < head);
        assert!(wave.iter().all(|s| s.abs() <= 3.0));
    }

    #[test]
    fn long_notes_are_cut_with_open_envelopes() {
        let decay = DecayCurve::new();
        let cut = raw_waveform(&decay, 55.0, 400_000, 96_000, 8000.0);
        let closed = raw_waveform(&decay, 55.0, 96_000, 96_000, 8000.0);
        assert_eq!(cut.len(), 96_000);
        let tail = |w: &[f64]| w[95_200..].iter().fold(0.0_f64, |m, s| m.max(s.abs()));
        assert!(tail(&cut) > 1.2 * tail(&closed));
    }

    #[test]
    fn repeated_notes_match_a_fresh_render() {
        let tables = PianoTables::new();
        let ctx = RenderContext {
            sample_rate: 8000.0,
            articulation: 0.9,
            seed: None,
            piano: &tables,
        };
        let note = |offset, volume| ScheduledNote {
            key: 39,
            frequency: 261.625_565,
            offset,
            length: 4000.0,
            volume,
        };

        let mut both = RenderBuffer::new(40_000);
        render(&[note(0, 1.0), note(20_000, 1.5)], &ctx, &mut both).unwrap();
        let mut alone = RenderBuffer::new(40_000);
        render(&[note(20_000, 1.5)], &ctx, &mut alone).unwrap();
        assert_eq!(both.as_slice()[20_000..], alone.as_slice()[20_000..]);
        assert!(both.as_slice()[..20_000].iter().any(|&s| s != 0.0));
    }

    #[test]
    fn deterministic() {
        let decay = DecayCurve::new();
        assert_eq!(
            raw_waveform(&decay, 330.0, 1000, 1000, 44100.0),
            raw_waveform(&decay, 330.0, 1000, 1000, 44100.0)
        );
    }
}
