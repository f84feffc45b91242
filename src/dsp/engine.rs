//! Synthesizer: schedules a score onto the sample grid and hands the notes
//! to one backend.
//!
//! Scheduling is shared: every backend sees the same note offsets, lengths
//! and volumes. The backend decides how a note sounds and how the finished
//! buffer is brought to 16-bit PCM.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use log::debug;
use serde::{Deserialize, Serialize};

use super::buffer::RenderBuffer;
use super::mixer::AudioBuffer;
use super::oscillator::{self, Tone};
use super::piano::PianoTables;
use super::sampler::{SampleLibrary, DEFAULT_LIBRARY_DIR};
use super::{fm, piano, sampler, string};
use crate::config::RenderConfig;
use crate::error::{Result, SynthError};
use crate::pitch::{PitchTable, PitchToken};
use crate::score::Score;

/// Seconds of decay tail kept after the last event by accumulating voices.
pub const TAIL_SECONDS: f64 = 2.0;

/// Every synthesis algorithm the synthesizer offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Sine,
    Square,
    Noise,
    Beeper,
    Piano,
    #[serde(rename = "fm")]
    FmPiano,
    #[serde(rename = "string")]
    PluckedString,
    Sampler,
}

impl Backend {
    pub const ALL: [Backend; 8] = [
        Backend::Sine,
        Backend::Square,
        Backend::Noise,
        Backend::Beeper,
        Backend::Piano,
        Backend::FmPiano,
        Backend::PluckedString,
        Backend::Sampler,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Backend::Sine => "sine",
            Backend::Square => "square",
            Backend::Noise => "noise",
            Backend::Beeper => "beeper",
            Backend::Piano => "piano",
            Backend::FmPiano => "fm",
            Backend::PluckedString => "string",
            Backend::Sampler => "sampler",
        }
    }

    /// Pause fraction for the gated voices, legato fraction for the
    /// decaying ones.
    pub fn default_articulation(self) -> f64 {
        match self {
            Backend::Sine | Backend::Square | Backend::Noise => 0.05,
            Backend::Beeper | Backend::PluckedString => 0.0,
            Backend::Piano | Backend::FmPiano | Backend::Sampler => 0.9,
        }
    }

    /// Whether notes are summed into the buffer and ring past the last
    /// event, rather than written in place.
    pub fn accumulates(self) -> bool {
        !matches!(
            self,
            Backend::Sine | Backend::Square | Backend::Noise | Backend::Beeper
        )
    }

    /// Room allocated past the last event for ringing notes, in seconds.
    fn ring_out_seconds(self) -> f64 {
        match self {
            Backend::Piano | Backend::FmPiano | Backend::Sampler => 10.0,
            Backend::PluckedString => 20.0,
            _ => 0.0,
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Backend {
    type Err = SynthError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        Backend::ALL
            .into_iter()
            .find(|b| b.name() == wanted)
            .ok_or_else(|| SynthError::InvalidConfig(format!("unknown backend {s:?}")))
    }
}

/// One note placed on the sample grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ScheduledNote {
    pub key: u8,
    /// Transposed frequency in Hz.
    pub frequency: f64,
    /// First sample of the note.
    pub offset: usize,
    /// Exact nominal length in samples.
    pub length: f64,
    pub volume: f64,
}

/// Per-render parameters shared by every note.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RenderContext<'a> {
    pub sample_rate: f64,
    pub articulation: f64,
    pub seed: Option<u64>,
    pub piano: &'a PianoTables,
}

/// Owns the lookup tables and renders scores with any backend.
///
/// Holds no mutable state, so one instance can serve renders on several
/// threads at once.
#[derive(Debug, Clone, Default)]
pub struct Synthesizer {
    pitch: PitchTable,
    piano: PianoTables,
    samples: Option<SampleLibrary>,
}

impl Synthesizer {
    pub fn new() -> Self {
        Synthesizer {
            pitch: PitchTable::new(),
            piano: PianoTables::new(),
            samples: None,
        }
    }

    /// Attach the recordings the sampler backend plays from.
    pub fn with_sample_library(mut self, library: SampleLibrary) -> Self {
        self.samples = Some(library);
        self
    }

    pub fn pitch_table(&self) -> &PitchTable {
        &self.pitch
    }

    pub fn piano_tables(&self) -> &PianoTables {
        &self.piano
    }

    pub fn sample_library(&self) -> Option<&SampleLibrary> {
        self.samples.as_ref()
    }

    /// Render `score` with `backend` into mono 16-bit PCM.
    pub fn render(
        &self,
        backend: Backend,
        score: &Score,
        config: &RenderConfig,
    ) -> Result<AudioBuffer> {
        config.validate()?;
        let (notes, end) = self.schedule(score, config)?;
        let rate = config.sample_rate as f64;

        let ring_out = (backend.ring_out_seconds() * rate) as usize;
        let mut buffer = RenderBuffer::new(end as usize + ring_out);
        let ctx = RenderContext {
            sample_rate: rate,
            articulation: config.articulation_for(backend),
            seed: config.seed,
            piano: &self.piano,
        };

        match backend {
            Backend::Sine => oscillator::render(Tone::Sine, &notes, &ctx, &mut buffer),
            Backend::Square => oscillator::render(Tone::Square, &notes, &ctx, &mut buffer),
            Backend::Noise => oscillator::render(Tone::Noise, &notes, &ctx, &mut buffer),
            Backend::Beeper => oscillator::render(Tone::Beep, &notes, &ctx, &mut buffer),
            Backend::Piano => piano::render(&notes, &ctx, &mut buffer)?,
            Backend::FmPiano => fm::render(&notes, &ctx, &mut buffer)?,
            Backend::PluckedString => string::render(&notes, &ctx, &mut buffer)?,
            Backend::Sampler => {
                let library = self.samples.as_ref().ok_or_else(|| SynthError::SampleAssetMissing {
                    path: PathBuf::from(DEFAULT_LIBRARY_DIR),
                })?;
                sampler::render(library, &notes, &ctx, &mut buffer)?
            }
        }

        // Direct voices stop at the last event and play rests as silence.
        let samples = if backend.accumulates() {
            buffer.normalize_to_pcm((TAIL_SECONDS * rate + end + 0.5) as usize)?
        } else if buffer.peak() == 0.0 {
            vec![0; end as usize]
        } else {
            buffer.normalize_to_pcm(end as usize)?
        };

        debug!(
            "rendered {} events ({} notes) with {backend}: {} samples at {} Hz",
            score.len() * (config.repeat as usize + 1),
            notes.len(),
            samples.len(),
            config.sample_rate
        );
        Ok(AudioBuffer::mono(samples, config.sample_rate))
    }

    /// Place every note of the expanded score and return the notes with the
    /// final cursor position. Fails before any audio is produced if a pitch
    /// is unknown.
    fn schedule(
        &self,
        score: &Score,
        config: &RenderConfig,
    ) -> Result<(Vec<ScheduledNote>, f64)> {
        let transpose = config.transpose_factor();
        let mut notes = Vec::with_capacity(score.len());
        let mut cursor = 0.0_f64;

        for event in score.repeated(config.repeat) {
            let length = event.duration.samples(config.tempo, config.sample_rate);
            if let PitchToken::Note { boosted, .. } = &event.pitch {
                let key = self.pitch.key_of(&event.pitch)?;
                notes.push(ScheduledNote {
                    key,
                    frequency: self.pitch.key_frequency(key) * transpose,
                    offset: cursor as usize,
                    length,
                    volume: if *boosted { config.boost } else { 1.0 },
                });
            }
            cursor += length;
        }
        Ok((notes, cursor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::sampler::tests::fixture_library;

    fn melody() -> Score {
        Score::from_pairs(&[
            ("c4", 8.0),
            ("e4", 8.0),
            ("g4", -8.0),
            ("c5*", 16.0),
            ("r", 8.0),
            ("c4", 4.0),
        ])
        .unwrap()
    }

    fn fast() -> RenderConfig {
        RenderConfig::default().with_sample_rate(8000).with_seed(5)
    }

    #[test]
    fn backend_names() {
        for backend in Backend::ALL {
            assert_eq!(backend.name().parse::<Backend>().unwrap(), backend);
            let json = serde_json::to_string(&backend).unwrap();
            assert_eq!(json, format!("\"{}\"", backend.name()));
            assert_eq!(serde_json::from_str::<Backend>(&json).unwrap(), backend);
        }
        assert_eq!("FM".parse::<Backend>().unwrap(), Backend::FmPiano);
        assert!(matches!("organ".parse::<Backend>(), Err(SynthError::InvalidConfig(_))));
    }

    #[test]
    fn default_articulations() {
        assert_eq!(Backend::Sine.default_articulation(), 0.05);
        assert_eq!(Backend::Noise.default_articulation(), 0.05);
        assert_eq!(Backend::PluckedString.default_articulation(), 0.0);
        assert_eq!(Backend::Piano.default_articulation(), 0.9);
        assert_eq!(Backend::Sampler.default_articulation(), 0.9);
    }

    #[test]
    fn synthesizer_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Synthesizer>();
    }

    #[test]
    fn schedule_places_notes_on_the_cursor() {
        let synth = Synthesizer::new();
        let config = RenderConfig::default().with_boost(2.0);
        let (notes, end) = synth.schedule(&melody(), &config).unwrap();
        assert_eq!(notes.len(), 5);
        assert_eq!(notes[0].offset, 0);
        assert_eq!(notes[1].offset, 11025);
        assert_eq!(notes[2].offset, 22050);
        // A dotted eighth lasts 1.5 eighths.
        assert_eq!(notes[3].offset, 22050 + 16537);
        assert_eq!(notes[3].volume, 2.0);
        assert_eq!(notes[2].volume, 1.0);
        assert_eq!(notes[4].offset, 55125);
        assert_eq!(end, 77175.0);
        assert!((notes[0].frequency - 261.625_565).abs() < 1e-5);
    }

    #[test]
    fn transposition_scales_frequencies() {
        let synth = Synthesizer::new();
        let score = Score::from_pairs(&[("a4", 4.0)]).unwrap();
        let config = RenderConfig::default().with_transpose(-1.0);
        let (notes, _) = synth.schedule(&score, &config).unwrap();
        assert!((notes[0].frequency - 220.0).abs() < 1e-9);
        assert_eq!(notes[0].key, 48);
    }

    #[test]
    fn repeats_expand_the_score() {
        let synth = Synthesizer::new();
        let once = synth.render(Backend::Square, &melody(), &fast()).unwrap();
        let twice = synth
            .render(Backend::Square, &melody(), &fast().with_repeat(1))
            .unwrap();
        let end = melody().duration_in_samples(120.0, 8000);
        assert_eq!(once.samples.len(), end as usize);
        assert_eq!(twice.samples.len(), (2.0 * end) as usize);
    }

    #[test]
    fn rendering_is_deterministic() {
        let synth = Synthesizer::new();
        for backend in [
            Backend::Sine,
            Backend::Square,
            Backend::Noise,
            Backend::Beeper,
            Backend::Piano,
            Backend::FmPiano,
            Backend::PluckedString,
        ] {
            let a = synth.render(backend, &melody(), &fast()).unwrap();
            let b = synth.render(backend, &melody(), &fast()).unwrap();
            assert_eq!(a, b, "{backend} is not deterministic");
        }
        // The drum is deterministic even without a seed.
        let config = RenderConfig::default().with_sample_rate(8000);
        let a = synth.render(Backend::Noise, &melody(), &config).unwrap();
        let b = synth.render(Backend::Noise, &melody(), &config).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn string_seed_controls_the_pluck() {
        let synth = Synthesizer::new();
        let a = synth
            .render(Backend::PluckedString, &melody(), &fast().with_seed(1))
            .unwrap();
        let b = synth
            .render(Backend::PluckedString, &melody(), &fast().with_seed(2))
            .unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn normalized_output_has_headroom_and_tail() {
        let synth = Synthesizer::new();
        let end = melody().duration_in_samples(120.0, 8000);
        for backend in [Backend::Piano, Backend::FmPiano, Backend::PluckedString] {
            let out = synth.render(backend, &melody(), &fast()).unwrap();
            assert_eq!(out.samples.len(), (2.0 * 8000.0 + end + 0.5) as usize);
            let peak = out.samples.iter().map(|s| s.unsigned_abs()).max().unwrap();
            assert!(peak <= 16383, "{backend} peak {peak}");
            assert!(peak >= 16382, "{backend} peak {peak}");
        }
    }

    #[test]
    fn rest_only_scores() {
        let synth = Synthesizer::new();
        let rests = Score::from_pairs(&[("r", 4.0), ("r", -8.0)]).unwrap();
        let config = RenderConfig::default();

        for backend in [Backend::Sine, Backend::Square, Backend::Noise, Backend::Beeper] {
            let out = synth.render(backend, &rests, &config).unwrap();
            assert_eq!(out.samples.len(), 22050 + 16537);
            assert!(out.samples.iter().all(|&s| s == 0));
        }
        for backend in [Backend::Piano, Backend::FmPiano, Backend::PluckedString] {
            assert!(matches!(
                synth.render(backend, &rests, &config),
                Err(SynthError::EmptyRenderError)
            ));
        }
    }

    #[test]
    fn boosted_repeat_of_the_same_note() {
        let synth = Synthesizer::new();
        let score = Score::from_pairs(&[("c4", 4.0), ("r", 4.0), ("c4*", 4.0)]).unwrap();
        let config = RenderConfig::default().with_boost(1.5);
        let out = synth.render(Backend::Sine, &score, &config).unwrap();
        assert_eq!(out.samples.len(), 66150);

        let (first, rest) = out.samples.split_at(22050);
        let (gap, last) = rest.split_at(22050);
        assert!(first.iter().any(|&s| s != 0));
        assert!(gap.iter().all(|&s| s == 0));
        for (&a, &c) in first.iter().zip(last) {
            // Both notes are truncated after normalization.
            assert!((c as f64 - 1.5 * a as f64).abs() <= 2.5, "{a} vs {c}");
        }
    }

    #[test]
    fn every_backend_keeps_half_scale_headroom() {
        let library = fixture_library("headroom", &[15, 39, 42, 45, 51], 48000);
        let synth = Synthesizer::new().with_sample_library(library);
        let low = Score::from_pairs(&[("c2", 4.0), ("r", 4.0), ("c2*", 4.0)]).unwrap();
        let melody = melody();
        for backend in Backend::ALL {
            for boost in [1.0, 1.2] {
                let config = RenderConfig::for_backend(backend)
                    .with_sample_rate(8000)
                    .with_boost(boost);
                for score in [&low, &melody] {
                    let out = synth.render(backend, score, &config).unwrap();
                    let peak = out.samples.iter().map(|s| s.unsigned_abs()).max().unwrap();
                    assert!(peak <= 16383, "{backend} boost {boost} peak {peak}");
                    assert!(peak >= 16382, "{backend} boost {boost} peak {peak}");
                }
            }
        }
    }

    #[test]
    fn ringing_voices_leave_the_rest_silent() {
        let synth = Synthesizer::new();
        // A whole rest at 8000 Hz outlasts the one-second ring of a c4.
        let score = Score::from_pairs(&[("c4", 4.0), ("r", 1.0), ("c4*", 4.0)]).unwrap();
        let config = fast().with_boost(1.5);
        for backend in [Backend::Piano, Backend::FmPiano] {
            let out = synth.render(backend, &score, &config).unwrap();
            assert_eq!(out.samples.len(), 16000 + 24000);
            let peak = |s: &[i16]| s.iter().map(|x| x.unsigned_abs()).max().unwrap();
            let (first, rest) = out.samples.split_at(13000);
            let (gap, last) = rest.split_at(7000);
            assert!(gap.iter().all(|&s| s == 0), "{backend} rings into the rest");
            assert!(peak(last) > peak(first), "{backend} boost is inaudible");
            assert_eq!(peak(last), 16383);
        }
    }

    #[test]
    fn invalid_input_is_rejected_up_front() {
        let synth = Synthesizer::new();
        let zero_tempo = RenderConfig::default().with_tempo(0.0);
        assert!(matches!(
            synth.render(Backend::Sine, &melody(), &zero_tempo),
            Err(SynthError::InvalidConfig(_))
        ));
        let bad_articulation = RenderConfig::default().with_articulation(1.5);
        assert!(matches!(
            synth.render(Backend::Piano, &melody(), &bad_articulation),
            Err(SynthError::InvalidConfig(_))
        ));
        let off_keyboard = Score::from_pairs(&[("c4", 4.0), ("d8", 4.0)]).unwrap();
        assert!(matches!(
            synth.render(Backend::Sine, &off_keyboard, &RenderConfig::default()),
            Err(SynthError::UnknownPitch(_))
        ));
    }

    #[test]
    fn sampler_without_library() {
        let synth = Synthesizer::new();
        let config = RenderConfig::for_backend(Backend::Sampler);
        assert!(matches!(
            synth.render(Backend::Sampler, &melody(), &config),
            Err(SynthError::SampleAssetMissing { .. })
        ));
    }

    #[test]
    fn sampler_plays_from_the_library() {
        // c4 is played from the C4 recording, e4 and g4 from D#4 and F#4.
        let library = fixture_library("engine", &[39, 42, 45], 48000);
        let synth = Synthesizer::new().with_sample_library(library);
        let score = Score::from_pairs(&[("c4", 4.0), ("e4", 4.0), ("c4", 4.0)]).unwrap();
        let config = RenderConfig::for_backend(Backend::Sampler);
        let out = synth.render(Backend::Sampler, &score, &config).unwrap();
        assert_eq!(out.sample_rate, 48000);
        assert_eq!(out.samples.len(), 2 * 48000 + 72000);
        assert!(out.samples.iter().map(|s| s.unsigned_abs()).max().unwrap() <= 16383);

        let missing = Score::from_pairs(&[("a0", 4.0)]).unwrap();
        assert!(matches!(
            synth.render(Backend::Sampler, &missing, &config),
            Err(SynthError::SampleAssetMissing { .. })
        ));
    }

    #[test]
    fn both_hands_render_in_parallel() {
        let synth = Synthesizer::new();
        let right = Score::from_pairs(&[("e5", 4.0), ("d5", 4.0), ("c5", 2.0)]).unwrap();
        let left = Score::from_pairs(&[("c3", 2.0), ("g2", 2.0)]).unwrap();
        let config = RenderConfig::default().with_sample_rate(8000);

        let (r, l) = std::thread::scope(|s| {
            let r = s.spawn(|| synth.render(Backend::Piano, &right, &config));
            let l = s.spawn(|| synth.render(Backend::Piano, &left, &config));
            (r.join().unwrap(), l.join().unwrap())
        });
        assert_eq!(r.unwrap(), synth.render(Backend::Piano, &right, &config).unwrap());
        assert_eq!(l.unwrap(), synth.render(Backend::Piano, &left, &config).unwrap());
    }
}
