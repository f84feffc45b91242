//! Per-note envelope shaping shared by the oscillator voices.
//!
//! Ramps from silence into the note, optionally overshoots and settles back
//! to full level, holds, then ramps linearly back to silence over the last
//! samples of the sounding length. The ramps keep note boundaries click-free.

/// Piecewise-linear gain curve over one note.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteEnvelope {
    /// Samples spent rising from 0 to `peak`.
    pub attack: usize,
    /// Level reached at the end of the attack.
    pub peak: f64,
    /// Samples spent easing from `peak` back to 1.
    pub settle: usize,
    /// Samples spent falling to 0 before the end of the note.
    pub release: usize,
}

impl NoteEnvelope {
    /// Plucky attack with a 25% overshoot, long release.
    pub const STRUCK: NoteEnvelope = NoteEnvelope {
        attack: 100,
        peak: 1.25,
        settle: 200,
        release: 400,
    };

    /// No attack ramp (the voice fades itself in), short release.
    pub const GATED: NoteEnvelope = NoteEnvelope {
        attack: 0,
        peak: 1.0,
        settle: 0,
        release: 100,
    };

    /// Symmetric 100-sample fade in and out.
    pub const BEEP: NoteEnvelope = NoteEnvelope {
        attack: 100,
        peak: 1.0,
        settle: 0,
        release: 100,
    };

    /// Gain at sample `x` of a note sounding for `len` samples.
    ///
    /// The attack wins over the release when a note is too short for both.
    pub fn gain(&self, x: usize, len: usize) -> f64 {
        if x < self.attack {
            return self.peak * x as f64 / self.attack as f64;
        }
        if x < self.attack + self.settle {
            let t = (x - self.attack) as f64 / self.settle as f64;
            return self.peak + (1.0 - self.peak) * t;
        }
        if self.release > 0 && x + self.release > len {
            return 1.0 - (x + self.release - len) as f64 / self.release as f64;
        }
        1.0
    }

    /// Multiply a rendered note in place.
    pub fn apply(&self, samples: &mut [f64]) {
        let len = samples.len();
        for (x, s) in samples.iter_mut().enumerate() {
            *s *= self.gain(x, len);
        }
    }
}

/// Time constant, in samples, of the release after a decaying note's
/// legato point.
pub const LEGATO_RELEASE: f64 = 3000.0;

/// Exponential release applied from sample `from` to the end of `samples`.
pub fn legato_cut(samples: &mut [f64], from: usize) {
    if let Some(tail) = samples.get_mut(from..) {
        for (i, s) in tail.iter_mut().enumerate() {
            *s *= (-(i as f64) / LEGATO_RELEASE).exp();
        }
    }
}
