//! Sample playback from a Salamander-style piano library.
//!
//! The library holds one recording every three semitones (A, C, D#, F#)
//! per velocity layer. The two keys in between are produced by resampling
//! the nearest recording below with linear interpolation.

use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavReader};
use log::debug;

use super::buffer::RenderBuffer;
use super::cache::NoteCache;
use super::engine::{RenderContext, ScheduledNote};
use super::envelope::legato_cut;
use crate::error::{Result, SynthError};
use crate::pitch::equal_tempered;

/// Rate the library was recorded at, and the sampler's default output rate.
pub const LIBRARY_SAMPLE_RATE: u32 = 48000;

/// Velocity layer used unless another is chosen.
pub const DEFAULT_LAYER: u8 = 10;

/// Where a library is looked for when none was attached.
pub const DEFAULT_LIBRARY_DIR: &str = "samples";

/// Samples at the end of each note faded linearly to silence.
const FADE_OUT: usize = 1001;

const SAMPLE_NAMES: [&str; 4] = ["A", "C", "D#", "F#"];

/// A single sample buffer loaded into memory.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    /// Mono f64 samples.
    pub data: Vec<f64>,
    /// Native sample rate of the audio.
    pub sample_rate: u32,
}

impl SampleBuffer {
    pub fn new(data: Vec<f64>, sample_rate: u32) -> Self {
        SampleBuffer { data, sample_rate }
    }

    /// Create from 16-bit signed PCM data.
    pub fn from_i16(pcm: &[i16], sample_rate: u32) -> Self {
        let data: Vec<f64> = pcm.iter().map(|&s| s as f64 / 32768.0).collect();
        SampleBuffer { data, sample_rate }
    }

    /// Decode the first channel of a WAV file.
    pub fn from_wav(path: &Path) -> Result<Self> {
        let mut reader = WavReader::open(path)?;
        let spec = reader.spec();
        let channels = spec.channels.max(1) as usize;
        let data: Vec<f64> = match spec.sample_format {
            SampleFormat::Int => {
                let scale = 2f64.powi(spec.bits_per_sample as i32 - 1);
                reader
                    .samples::<i32>()
                    .step_by(channels)
                    .map(|s| s.map(|v| v as f64 / scale))
                    .collect::<std::result::Result<_, _>>()?
            }
            SampleFormat::Float => reader
                .samples::<f32>()
                .step_by(channels)
                .map(|s| s.map(f64::from))
                .collect::<std::result::Result<_, _>>()?,
        };
        Ok(SampleBuffer::new(data, spec.sample_rate))
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Read a sample with linear interpolation at a fractional position.
    pub fn read_interpolated(&self, position: f64) -> f64 {
        if self.data.is_empty() || position < 0.0 {
            return 0.0;
        }

        let idx = position as usize;
        if idx >= self.data.len() - 1 {
            return self.data.get(idx).copied().unwrap_or(0.0);
        }

        let frac = position - idx as f64;
        self.data[idx] * (1.0 - frac) + self.data[idx + 1] * frac
    }

    /// Read through the buffer `step` source samples per output sample.
    pub fn resample(&self, step: f64) -> Vec<f64> {
        let len = (self.data.len() as f64 / step) as usize;
        (0..len)
            .map(|i| self.read_interpolated(i as f64 * step))
            .collect()
    }
}

/// File name of the recording that `key` is played from.
pub fn sample_file_name(key: u8, layer: u8) -> String {
    let k = key as usize;
    format!("{}{}v{layer}.wav", SAMPLE_NAMES[(k / 3) % 4], (k + 9) / 12)
}

/// Playback speed-up from the recording to `key`.
pub fn pitch_ratio(key: u8) -> f64 {
    2f64.powf((key % 3) as f64 / 12.0)
}

/// A directory of piano recordings.
#[derive(Debug, Clone)]
pub struct SampleLibrary {
    root: PathBuf,
    layer: u8,
}

impl SampleLibrary {
    /// Attach to the library at `root`, which must be an existing directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(SynthError::SampleAssetMissing { path: root });
        }
        Ok(SampleLibrary {
            root,
            layer: DEFAULT_LAYER,
        })
    }

    pub fn with_layer(mut self, layer: u8) -> Self {
        self.layer = layer;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn layer(&self) -> u8 {
        self.layer
    }

    pub fn file_for(&self, key: u8) -> PathBuf {
        self.root.join(sample_file_name(key, self.layer))
    }

    /// Load the recording for `key`.
    pub fn load(&self, key: u8) -> Result<SampleBuffer> {
        let path = self.file_for(key);
        if !path.is_file() {
            return Err(SynthError::SampleAssetMissing { path });
        }
        SampleBuffer::from_wav(&path)
    }

    /// The waveform of `key` at `frequency`, resampled to `sample_rate`.
    pub fn waveform(&self, key: u8, frequency: f64, sample_rate: f64) -> Result<Vec<f64>> {
        let recording = self.load(key)?;
        let transpose = frequency / equal_tempered(key);
        let step = pitch_ratio(key) * transpose * recording.sample_rate as f64 / sample_rate;
        Ok(recording.resample(step))
    }
}

fn fade_out(samples: &mut [f64]) {
    let start = samples.len().saturating_sub(FADE_OUT);
    for (i, s) in samples[start..].iter_mut().enumerate() {
        *s *= 1.0 - i as f64 / (FADE_OUT - 1) as f64;
    }
}

pub(crate) fn render(
    library: &SampleLibrary,
    notes: &[ScheduledNote],
    ctx: &RenderContext<'_>,
    buffer: &mut RenderBuffer,
) -> Result<()> {
    let mut cache = NoteCache::from_occurrences(notes.iter().map(|n| n.key));

    for note in notes {
        let mut wave = cache.fetch(&note.key, || {
            library.waveform(note.key, note.frequency, ctx.sample_rate)
        })?;
        legato_cut(&mut wave, (ctx.articulation * note.length) as usize);
        fade_out(&mut wave);
        wave.truncate(note.length as usize);
        for s in wave.iter_mut() {
            *s *= note.volume;
        }
        buffer.add_slice(note.offset, &wave);
    }

    debug!(
        "sampler: {} notes from {}, {} cached keys, {} cache hits",
        notes.len(),
        library.root.display(),
        cache.retained(),
        cache.hits()
    );
    Ok(())
}
