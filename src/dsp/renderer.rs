//! WAV renderer: encodes renders as 16-bit PCM WAV, in memory or on disk,
//! and reads such files back for mixing.

use std::io::Cursor;
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use super::engine::{Backend, Synthesizer};
use super::mixer::AudioBuffer;
use crate::config::RenderConfig;
use crate::error::Result;
use crate::score::Score;

impl AudioBuffer {
    fn wav_spec(&self) -> WavSpec {
        WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        }
    }

    /// Encode as a WAV file held in memory.
    pub fn to_wav_bytes(&self) -> Result<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::with_capacity(44 + self.samples.len() * 2));
        {
            let mut writer = WavWriter::new(&mut cursor, self.wav_spec())?;
            for &sample in &self.samples {
                writer.write_sample(sample)?;
            }
            writer.finalize()?;
        }
        Ok(cursor.into_inner())
    }

    pub fn write_wav(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = WavWriter::create(path, self.wav_spec())?;
        for &sample in &self.samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
        Ok(())
    }
}

/// Read a 16-bit PCM WAV file.
pub fn read_wav(path: impl AsRef<Path>) -> Result<AudioBuffer> {
    let mut reader = WavReader::open(path)?;
    let spec = reader.spec();
    let samples = reader.samples::<i16>().collect::<std::result::Result<_, _>>()?;
    Ok(AudioBuffer {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
    })
}

/// Render a score straight to WAV bytes.
pub fn render_wav(
    synth: &Synthesizer,
    backend: Backend,
    score: &Score,
    config: &RenderConfig,
) -> Result<Vec<u8>> {
    synth.render(backend, score, config)?.to_wav_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::mixer::{concat, stereo_mix, DEFAULT_PHASE};

    #[test]
    fn wav_header_valid() {
        let buf = AudioBuffer::stereo(vec![0, 1, 2, 3], 44100);
        let wav = buf.to_wav_bytes().unwrap();

        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(&wav[12..16], b"fmt ");

        let ch = u16::from_le_bytes([wav[22], wav[23]]);
        assert_eq!(ch, 2);
        let sr = u32::from_le_bytes([wav[24], wav[25], wav[26], wav[27]]);
        assert_eq!(sr, 44100);
        assert_eq!(wav.len(), 44 + 8);
    }

    #[test]
    fn files_round_trip() {
        let dir = std::env::temp_dir().join(format!("keysynth-wav-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("left.wav");

        let left = AudioBuffer::mono(vec![0, 100, -100, i16::MAX, i16::MIN], 44100);
        left.write_wav(&path).unwrap();
        let back = read_wav(&path).unwrap();
        assert_eq!(back, left);

        // Mixing works on files read back from disk.
        let mixed = stereo_mix(&back, &left, DEFAULT_PHASE).unwrap();
        assert_eq!(mixed.frames(), 5);
        assert_eq!(concat(&[back.clone(), back]).unwrap().samples.len(), 10);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(read_wav("/nonexistent/keysynth.wav").is_err());
    }

    #[test]
    fn full_pipeline_score_to_wav() {
        let synth = Synthesizer::new();
        let score =
            Score::from_pairs(&[("c4", 4.0), ("e4", 4.0), ("g4", 4.0), ("c5", 4.0)]).unwrap();
        let config = RenderConfig::default().with_sample_rate(22050);
        let wav = render_wav(&synth, Backend::Sine, &score, &config).unwrap();

        assert_eq!(&wav[0..4], b"RIFF");
        // Four quarter notes at 120 bpm last two seconds.
        assert_eq!(wav.len(), 44 + 2 * 44100);
        let has_sound = wav[44..]
            .chunks(2)
            .any(|b| i16::from_le_bytes([b[0], b[1]]) != 0);
        assert!(has_sound, "rendered WAV should contain non-silent audio");
    }
}
