//! Mixer: combines finished 16-bit renders into stereo or mono pieces and
//! appends renders end to end.

use serde::Serialize;

use crate::error::{Result, SynthError};

/// Default polarity of the cross-fed channel in [`stereo_mix`].
pub const DEFAULT_PHASE: f64 = -1.0;

/// The only rate [`concat`] accepts.
pub const STANDARD_SAMPLE_RATE: u32 = 44100;

/// Share of each input that leaks into the opposite channel.
const CROSS_FEED: f64 = 0.3;
const DIRECT_FEED: f64 = 0.7;

/// Finished 16-bit PCM audio. Stereo samples are interleaved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AudioBuffer {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioBuffer {
    pub fn mono(samples: Vec<i16>, sample_rate: u32) -> Self {
        AudioBuffer {
            samples,
            sample_rate,
            channels: 1,
        }
    }

    pub fn stereo(samples: Vec<i16>, sample_rate: u32) -> Self {
        AudioBuffer {
            samples,
            sample_rate,
            channels: 2,
        }
    }

    /// Number of sample frames (one sample per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    pub fn is_mono(&self) -> bool {
        self.channels == 1
    }

    fn expect_mono(&self) -> Result<()> {
        if self.is_mono() {
            Ok(())
        } else {
            Err(SynthError::ChannelMismatch {
                expected: 1,
                found: self.channels,
            })
        }
    }
}

fn check_pair(a: &AudioBuffer, b: &AudioBuffer) -> Result<()> {
    a.expect_mono()?;
    b.expect_mono()?;
    if a.sample_rate != b.sample_rate {
        return Err(SynthError::RateMismatchError {
            left: a.sample_rate,
            right: b.sample_rate,
        });
    }
    Ok(())
}

fn to_i16(x: f64) -> i16 {
    x.trunc().clamp(i16::MIN as f64, i16::MAX as f64) as i16
}

/// Place two mono renders in a stereo field. Each channel carries most of
/// one input plus a `phase`-signed share of the other. The longer input is
/// cut to the length of the shorter.
pub fn stereo_mix(a: &AudioBuffer, b: &AudioBuffer, phase: f64) -> Result<AudioBuffer> {
    check_pair(a, b)?;
    let samples = a
        .samples
        .iter()
        .zip(&b.samples)
        .flat_map(|(&x, &y)| {
            let (x, y) = (x as f64, y as f64);
            [
                to_i16(phase * CROSS_FEED * x + DIRECT_FEED * y),
                to_i16(DIRECT_FEED * x + phase * CROSS_FEED * y),
            ]
        })
        .collect();
    Ok(AudioBuffer::stereo(samples, a.sample_rate))
}

/// Average two mono renders sample by sample.
pub fn mono_mix(a: &AudioBuffer, b: &AudioBuffer) -> Result<AudioBuffer> {
    check_pair(a, b)?;
    let samples = a
        .samples
        .iter()
        .zip(&b.samples)
        .map(|(&x, &y)| to_i16(0.5 * (x as f64 + y as f64)))
        .collect();
    Ok(AudioBuffer::mono(samples, a.sample_rate))
}

/// Join mono renders at the standard rate, in order.
pub fn concat(buffers: &[AudioBuffer]) -> Result<AudioBuffer> {
    let mut samples = Vec::with_capacity(buffers.iter().map(|b| b.samples.len()).sum());
    for buffer in buffers {
        buffer.expect_mono()?;
        if buffer.sample_rate != STANDARD_SAMPLE_RATE {
            return Err(SynthError::RateMismatchError {
                left: STANDARD_SAMPLE_RATE,
                right: buffer.sample_rate,
            });
        }
        samples.extend_from_slice(&buffer.samples);
    }
    Ok(AudioBuffer::mono(samples, STANDARD_SAMPLE_RATE))
}
