//! Per-render note cache with conditional retention.
//!
//! A pre-pass counts how often each note identity occurs in the expanded
//! score. Rendered waveforms are then kept only for identities that occur
//! more than once, so one-off notes never cost memory. The cache lives for
//! a single render call.

use std::collections::HashMap;
use std::hash::Hash;

use crate::error::Result;

#[derive(Debug, Clone)]
pub struct NoteCache<K, V> {
    occurrences: HashMap<K, usize>,
    entries: HashMap<K, V>,
    hits: usize,
    misses: usize,
}

impl<K: Eq + Hash + Clone, V: Clone> NoteCache<K, V> {
    /// Count every identity the render is going to ask for.
    pub fn from_occurrences(keys: impl IntoIterator<Item = K>) -> Self {
        let mut occurrences = HashMap::new();
        for key in keys {
            *occurrences.entry(key).or_insert(0) += 1;
        }
        NoteCache {
            occurrences,
            entries: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }

    pub fn occurrences(&self, key: &K) -> usize {
        self.occurrences.get(key).copied().unwrap_or(0)
    }

    /// Return a private copy of the waveform for `key`, rendering it with
    /// `render` on first use and keeping it if the identity recurs.
    pub fn fetch(&mut self, key: &K, render: impl FnOnce() -> Result<V>) -> Result<V> {
        if let Some(cached) = self.entries.get(key) {
            self.hits += 1;
            return Ok(cached.clone());
        }
        self.misses += 1;
        let value = render()?;
        if self.occurrences(key) > 1 {
            self.entries.insert(key.clone(), value.clone());
        }
        Ok(value)
    }

    /// Number of waveforms currently retained.
    pub fn retained(&self) -> usize {
        self.entries.len()
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn misses(&self) -> usize {
        self.misses
    }
}
