//! Score model: ordered (pitch, duration) events and the timing arithmetic
//! every backend shares.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SynthError};
use crate::pitch::PitchToken;

/// Samples-per-second multiplier of a whole note at one quarter per minute:
/// four quarters times sixty seconds. A quarter note (code 4) at 120 bpm
/// lasts exactly half a second.
pub const WHOLE_NOTE_FACTOR: f64 = 240.0;

// ── Duration Codes ──────────────────────────────────────────

/// Rhythmic value of an event.
///
/// A positive code `L` is 1/L of a whole note (1 = whole, 2 = half,
/// 4 = quarter, ...). A negative code is dotted: its nominal denominator is
/// `-2·L/3`, which lasts 1.5× as long as `|L|`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct DurationCode(f64);

impl DurationCode {
    pub fn new(code: f64) -> Result<Self> {
        if code == 0.0 || !code.is_finite() {
            return Err(SynthError::InvalidDuration(format!(
                "duration code must be a non-zero finite number, got {code}"
            )));
        }
        Ok(DurationCode(code))
    }

    pub fn value(self) -> f64 {
        self.0
    }

    pub fn is_dotted(self) -> bool {
        self.0 < 0.0
    }

    /// Positive note-value denominator after resolving the dot.
    pub fn nominal(self) -> f64 {
        if self.0 < 0.0 {
            -2.0 * self.0 / 3.0
        } else {
            self.0
        }
    }

    /// Exact (fractional) length in samples.
    pub fn samples(self, tempo: f64, sample_rate: u32) -> f64 {
        WHOLE_NOTE_FACTOR * sample_rate as f64 / (tempo * self.nominal())
    }
}

impl TryFrom<f64> for DurationCode {
    type Error = SynthError;

    fn try_from(code: f64) -> Result<Self> {
        DurationCode::new(code)
    }
}

impl From<DurationCode> for f64 {
    fn from(code: DurationCode) -> f64 {
        code.0
    }
}

pub(crate) fn check_timing(tempo: f64, sample_rate: u32) -> Result<()> {
    if !(tempo > 0.0 && tempo.is_finite()) {
        return Err(SynthError::InvalidConfig(format!(
            "tempo must be positive, got {tempo}"
        )));
    }
    if sample_rate == 0 {
        return Err(SynthError::InvalidConfig(
            "sample rate must be positive".to_string(),
        ));
    }
    Ok(())
}

/// Exact length of a duration code in samples.
pub fn duration_in_samples(code: f64, tempo: f64, sample_rate: u32) -> Result<f64> {
    check_timing(tempo, sample_rate)?;
    Ok(DurationCode::new(code)?.samples(tempo, sample_rate))
}

/// Length of a duration code in whole samples (floored).
pub fn duration_to_samples(code: f64, tempo: f64, sample_rate: u32) -> Result<usize> {
    Ok(duration_in_samples(code, tempo, sample_rate)? as usize)
}

// ── Events & Scores ─────────────────────────────────────────

/// One `(pitch, duration)` entry of a score.
///
/// Serializes as a two-element array, e.g. `["c#5*", -8]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "(String, f64)", into = "(String, f64)")]
pub struct Event {
    pub pitch: PitchToken,
    pub duration: DurationCode,
}

impl Event {
    pub fn new(pitch: &str, duration: f64) -> Result<Self> {
        Ok(Event {
            pitch: pitch.parse()?,
            duration: DurationCode::new(duration)?,
        })
    }

    pub fn rest(duration: f64) -> Result<Self> {
        Ok(Event {
            pitch: PitchToken::Rest,
            duration: DurationCode::new(duration)?,
        })
    }
}

impl TryFrom<(String, f64)> for Event {
    type Error = SynthError;

    fn try_from((pitch, duration): (String, f64)) -> Result<Self> {
        Event::new(&pitch, duration)
    }
}

impl From<Event> for (String, f64) {
    fn from(event: Event) -> Self {
        (event.pitch.to_string(), event.duration.value())
    }
}

/// An immutable, temporally ordered sequence of events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Score {
    events: Vec<Event>,
}

impl Score {
    pub fn new(events: Vec<Event>) -> Self {
        Score { events }
    }

    /// Build a score from `(pitch, duration)` literals.
    pub fn from_pairs(pairs: &[(&str, f64)]) -> Result<Self> {
        pairs
            .iter()
            .map(|&(pitch, duration)| Event::new(pitch, duration))
            .collect()
    }

    /// Parse a JSON array of `[pitch, duration]` pairs.
    ///
    /// Pitch and duration errors surface as themselves, not as JSON errors.
    pub fn from_json(json: &str) -> Result<Self> {
        let pairs: Vec<(String, f64)> = serde_json::from_str(json)?;
        pairs
            .iter()
            .map(|(pitch, duration)| Event::new(pitch, *duration))
            .collect()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events of the whole piece followed by `repeat` extra full replays.
    pub fn repeated(&self, repeat: u32) -> impl Iterator<Item = &Event> + '_ {
        (0..=repeat).flat_map(move |_| self.events.iter())
    }

    /// Exact length of one pass through the score, in samples.
    pub fn duration_in_samples(&self, tempo: f64, sample_rate: u32) -> f64 {
        self.events
            .iter()
            .map(|e| e.duration.samples(tempo, sample_rate))
            .sum()
    }
}

impl FromIterator<Event> for Score {
    fn from_iter<I: IntoIterator<Item = Event>>(iter: I) -> Self {
        Score {
            events: iter.into_iter().collect(),
        }
    }
}
