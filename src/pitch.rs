//! Pitch table: equal-tempered key frequencies under every accepted spelling.
//!
//! The 88 piano keys are numbered 0..88 from A0 (27.5 Hz). Each key is
//! reachable through three spelling tables (sharp, flat and enharmonic), and
//! every spelling of a key resolves to the same stored frequency.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{Result, SynthError};

/// Number of keys on the piano.
pub const KEY_COUNT: usize = 88;

/// Frequency of key 0 (A0) in Hz.
pub const A0_FREQUENCY: f64 = 27.5;

/// Octave assumed when a note name omits one.
pub const DEFAULT_OCTAVE: char = '4';

const SHARP_NAMES: [&str; 12] = ["a", "a#", "b", "c", "c#", "d", "d#", "e", "f", "f#", "g", "g#"];
const FLAT_NAMES: [&str; 12] = ["a", "bb", "b", "c", "db", "d", "eb", "e", "f", "gb", "g", "ab"];
const ENHARMONIC_NAMES: [&str; 12] =
    ["a", "bb", "cb", "b#", "db", "d", "eb", "fb", "e#", "gb", "g", "ab"];

/// Equal-tempered frequency of a key index.
pub fn equal_tempered(key: u8) -> f64 {
    A0_FREQUENCY * 2.0_f64.powf(key as f64 / 12.0)
}

/// Octave number printed in a key's spellings.
fn key_octave(key: usize) -> usize {
    (key + 9) / 12
}

// ── Pitch Tokens ────────────────────────────────────────────

/// One pitch entry of a score event: a rest, or a (possibly boosted) note.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PitchToken {
    Rest,
    Note {
        /// Lower-case spelling with the octave filled in, e.g. `"c#4"`.
        name: String,
        /// Played louder by the configured boost factor (`*` suffix).
        boosted: bool,
    },
}

impl PitchToken {
    pub fn is_rest(&self) -> bool {
        matches!(self, PitchToken::Rest)
    }

    pub fn is_boosted(&self) -> bool {
        matches!(self, PitchToken::Note { boosted: true, .. })
    }

    /// The octave-qualified note name, or `None` for a rest.
    pub fn name(&self) -> Option<&str> {
        match self {
            PitchToken::Rest => None,
            PitchToken::Note { name, .. } => Some(name),
        }
    }
}

impl FromStr for PitchToken {
    type Err = SynthError;

    /// Parse `letter [#|b] [octave] [*]`, or `r` for a rest.
    fn from_str(s: &str) -> Result<Self> {
        let lowered = s.trim().to_ascii_lowercase();
        if lowered == "r" {
            return Ok(PitchToken::Rest);
        }

        let (body, boosted) = match lowered.strip_suffix('*') {
            Some(body) => (body, true),
            None => (lowered.as_str(), false),
        };

        let mut chars = body.chars().peekable();
        let mut name = String::with_capacity(4);

        match chars.next() {
            Some(c @ 'a'..='g') => name.push(c),
            _ => return Err(SynthError::UnknownPitch(s.to_string())),
        }
        if let Some(&c @ ('#' | 'b')) = chars.peek() {
            name.push(c);
            chars.next();
        }
        match chars.next() {
            Some(c @ '0'..='8') => name.push(c),
            None => name.push(DEFAULT_OCTAVE),
            Some(_) => return Err(SynthError::UnknownPitch(s.to_string())),
        }
        if chars.next().is_some() {
            return Err(SynthError::UnknownPitch(s.to_string()));
        }

        Ok(PitchToken::Note { name, boosted })
    }
}

impl fmt::Display for PitchToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PitchToken::Rest => write!(f, "r"),
            PitchToken::Note { name, boosted: true } => write!(f, "{name}*"),
            PitchToken::Note { name, boosted: false } => write!(f, "{name}"),
        }
    }
}

// ── Pitch Table ─────────────────────────────────────────────

/// Summary of one key, as exposed to JavaScript callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyInfo {
    pub key: u8,
    pub frequency: f64,
    pub spellings: Vec<String>,
}

/// Bidirectional key-index / frequency / spelling lookup.
///
/// Built once and only ever read afterwards, so a shared reference is safe
/// to use from any number of render threads.
#[derive(Debug, Clone)]
pub struct PitchTable {
    frequencies: [f64; KEY_COUNT],
    keys: HashMap<String, u8>,
}

impl PitchTable {
    pub fn new() -> Self {
        let mut frequencies = [0.0; KEY_COUNT];
        let mut keys = HashMap::with_capacity(KEY_COUNT * 3);

        for (key, freq) in frequencies.iter_mut().enumerate() {
            *freq = equal_tempered(key as u8);
            let octave = key_octave(key);
            for table in [&SHARP_NAMES, &FLAT_NAMES, &ENHARMONIC_NAMES] {
                keys.insert(format!("{}{octave}", table[key % 12]), key as u8);
            }
        }

        PitchTable { frequencies, keys }
    }

    /// Key index of a pitch token string such as `"db5"`, `"g"` or `"f#3*"`.
    pub fn key_index_of(&self, token: &str) -> Result<u8> {
        let parsed: PitchToken = token.parse()?;
        self.key_of(&parsed)
    }

    /// Frequency in Hz of a pitch token string.
    pub fn frequency_of(&self, token: &str) -> Result<f64> {
        let key = self.key_index_of(token)?;
        Ok(self.key_frequency(key))
    }

    /// Key index of an already parsed token. Rests have no key.
    pub fn key_of(&self, token: &PitchToken) -> Result<u8> {
        match token {
            PitchToken::Rest => Err(SynthError::UnknownPitch(token.to_string())),
            PitchToken::Note { name, .. } => self
                .keys
                .get(name)
                .copied()
                .ok_or_else(|| SynthError::UnknownPitch(token.to_string())),
        }
    }

    /// Equal-tempered frequency of a key index. Out-of-range keys clamp to
    /// the top of the keyboard.
    pub fn key_frequency(&self, key: u8) -> f64 {
        self.frequencies[(key as usize).min(KEY_COUNT - 1)]
    }

    /// The sharp, flat and enharmonic spellings of a key, in that order.
    pub fn spellings(&self, key: u8) -> [String; 3] {
        let key = (key as usize).min(KEY_COUNT - 1);
        let octave = key_octave(key);
        [
            format!("{}{octave}", SHARP_NAMES[key % 12]),
            format!("{}{octave}", FLAT_NAMES[key % 12]),
            format!("{}{octave}", ENHARMONIC_NAMES[key % 12]),
        ]
    }

    pub fn keys(&self) -> impl Iterator<Item = KeyInfo> + '_ {
        (0..KEY_COUNT as u8).map(|key| KeyInfo {
            key,
            frequency: self.key_frequency(key),
            spellings: self.spellings(key).to_vec(),
        })
    }
}

impl Default for PitchTable {
    fn default() -> Self {
        Self::new()
    }
}
