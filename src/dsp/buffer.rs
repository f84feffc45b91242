//! Render buffer: the f64 working area every backend writes notes into,
//! and the one-time finalization to 16-bit PCM.

use log::warn;

use crate::error::{Result, SynthError};

/// Full-scale amplitude of a signed 16-bit sample.
pub const FULL_SCALE: f64 = 32767.0;

/// Peak normalization maps the loudest sample to `1 / HEADROOM_DIVISOR`
/// of full scale, leaving room for the additive overlap of decay tails.
pub const HEADROOM_DIVISOR: f64 = 2.0;

/// Accumulation buffer sized for a whole render.
#[derive(Debug, Clone)]
pub struct RenderBuffer {
    data: Vec<f64>,
}

impl RenderBuffer {
    /// Prepare a buffer of `len` samples filled with zeros.
    pub fn new(len: usize) -> Self {
        RenderBuffer {
            data: vec![0.0; len],
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Add a sample at the given index. Indices past the end are ignored.
    pub fn add(&mut self, index: usize, sample: f64) {
        if let Some(slot) = self.data.get_mut(index) {
            *slot += sample;
        }
    }

    /// Sum `samples` into the buffer starting at `offset`.
    ///
    /// Whatever does not fit is dropped. Returns the number of samples
    /// actually accumulated.
    pub fn add_slice(&mut self, offset: usize, samples: &[f64]) -> usize {
        let dest = self.window(offset, samples.len());
        for (d, s) in dest.iter_mut().zip(samples) {
            *d += s;
        }
        dest.len()
    }

    /// Overwrite the buffer with `samples` starting at `offset`.
    pub fn write_slice(&mut self, offset: usize, samples: &[f64]) -> usize {
        let dest = self.window(offset, samples.len());
        let n = dest.len();
        dest.copy_from_slice(&samples[..n]);
        n
    }

    fn window(&mut self, offset: usize, wanted: usize) -> &mut [f64] {
        let start = offset.min(self.data.len());
        let end = offset.saturating_add(wanted).min(self.data.len());
        if end - start < wanted {
            warn!(
                "dropping {} samples past the end of a {}-sample buffer",
                wanted - (end - start),
                self.data.len()
            );
        }
        &mut self.data[start..end]
    }

    /// Largest absolute sample value.
    pub fn peak(&self) -> f64 {
        self.data.iter().fold(0.0_f64, |m, &s| m.max(s.abs()))
    }

    /// Scale so the peak sits at half of full scale, then truncate to
    /// `out_len` 16-bit samples (zero-padded if the buffer is shorter).
    ///
    /// Fails with [`SynthError::EmptyRenderError`] when the buffer holds
    /// nothing but silence.
    pub fn normalize_to_pcm(&self, out_len: usize) -> Result<Vec<i16>> {
        let peak = self.peak();
        if peak == 0.0 || !peak.is_finite() {
            return Err(SynthError::EmptyRenderError);
        }
        let gain = FULL_SCALE / (HEADROOM_DIVISOR * peak);
        Ok(self.pcm(out_len, |s| (s * gain) as i16))
    }

    fn pcm(&self, out_len: usize, convert: impl Fn(f64) -> i16) -> Vec<i16> {
        let mut out: Vec<i16> = self.data.iter().take(out_len).map(|&s| convert(s)).collect();
        out.resize(out_len, 0);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_buffer() {
        let buf = RenderBuffer::new(128);
        assert_eq!(buf.len(), 128);
        assert!(buf.as_slice().iter().all(|&s| s == 0.0));
        assert_eq!(buf.peak(), 0.0);
    }

    #[test]
    fn accumulates_samples() {
        let mut buf = RenderBuffer::new(4);
        buf.add(0, 0.5);
        buf.add(0, 0.3);
        buf.add(1, 1.0);
        buf.add(99, 1.0);
        assert!((buf.as_slice()[0] - 0.8).abs() < 1e-12);
        assert_eq!(buf.as_slice()[1], 1.0);
        assert_eq!(buf.as_slice()[2], 0.0);
    }

    #[test]
    fn overlapping_slices_sum() {
        let mut buf = RenderBuffer::new(6);
        assert_eq!(buf.add_slice(0, &[1.0, 1.0, 1.0, 1.0]), 4);
        assert_eq!(buf.add_slice(2, &[0.5, 0.5, 0.5, 0.5, 0.5]), 4);
        assert_eq!(buf.as_slice(), &[1.0, 1.0, 1.5, 1.5, 0.5, 0.5]);
        assert_eq!(buf.add_slice(10, &[1.0]), 0);
    }

    #[test]
    fn write_slice_overwrites() {
        let mut buf = RenderBuffer::new(4);
        buf.add_slice(0, &[1.0; 4]);
        assert_eq!(buf.write_slice(1, &[0.25, 0.25]), 2);
        assert_eq!(buf.as_slice(), &[1.0, 0.25, 0.25, 1.0]);
        assert_eq!(buf.write_slice(3, &[0.0, 0.0, 0.0]), 1);
    }

    #[test]
    fn normalization_leaves_half_scale_headroom() {
        let mut buf = RenderBuffer::new(4);
        buf.add_slice(0, &[0.1, -3.0, 1.5, 0.0]);
        let pcm = buf.normalize_to_pcm(6).unwrap();
        assert_eq!(pcm.len(), 6);
        assert_eq!(pcm[1], -16383);
        assert_eq!(pcm[2], 8191);
        assert_eq!(&pcm[4..], &[0, 0]);
        assert!(pcm.iter().all(|s| s.unsigned_abs() <= 16383));
    }

    #[test]
    fn silent_buffer_cannot_be_normalized() {
        let buf = RenderBuffer::new(100);
        assert!(matches!(
            buf.normalize_to_pcm(100),
            Err(SynthError::EmptyRenderError)
        ));
    }
}
