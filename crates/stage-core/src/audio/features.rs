//! Per-frame perceptual features from analyser buffers.
//!
//! [`extract`] is a pure function of its two inputs: a time-domain buffer with
//! samples in `[-1, 1]` and a frequency-domain buffer with bin magnitudes in
//! `[0, 1]`. Out-of-range values are clamped and non-finite values count as
//! silence, so malformed input degrades to zeros instead of failing.

use std::ops::Range;

use crate::constants::{BASS_PERCENT, MID_PERCENT};

/// Six scalar features sampled once per animation frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AudioFeatures {
    pub energy: f32,
    pub rms: f32,
    pub bass: f32,
    pub mid: f32,
    pub treble: f32,
    pub centroid: f32,
}

/// A partial update for [`AudioFeatures`]. `None` fields are left untouched.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FeaturePatch {
    pub energy: Option<f32>,
    pub rms: Option<f32>,
    pub bass: Option<f32>,
    pub mid: Option<f32>,
    pub treble: Option<f32>,
    pub centroid: Option<f32>,
}

impl FeaturePatch {
    pub fn energy(mut self, v: f32) -> Self {
        self.energy = Some(v);
        self
    }
    pub fn rms(mut self, v: f32) -> Self {
        self.rms = Some(v);
        self
    }
    pub fn bass(mut self, v: f32) -> Self {
        self.bass = Some(v);
        self
    }
    pub fn mid(mut self, v: f32) -> Self {
        self.mid = Some(v);
        self
    }
    pub fn treble(mut self, v: f32) -> Self {
        self.treble = Some(v);
        self
    }
    pub fn centroid(mut self, v: f32) -> Self {
        self.centroid = Some(v);
        self
    }
}

impl From<AudioFeatures> for FeaturePatch {
    fn from(f: AudioFeatures) -> Self {
        Self {
            energy: Some(f.energy),
            rms: Some(f.rms),
            bass: Some(f.bass),
            mid: Some(f.mid),
            treble: Some(f.treble),
            centroid: Some(f.centroid),
        }
    }
}

impl AudioFeatures {
    /// Applies the finite fields of `patch`; absent or non-finite fields keep
    /// their previous value.
    pub fn merge(&mut self, patch: &FeaturePatch) {
        fn take(dst: &mut f32, src: Option<f32>) {
            if let Some(v) = src.filter(|v| v.is_finite()) {
                *dst = v;
            }
        }
        take(&mut self.energy, patch.energy);
        take(&mut self.rms, patch.rms);
        take(&mut self.bass, patch.bass);
        take(&mut self.mid, patch.mid);
        take(&mut self.treble, patch.treble);
        take(&mut self.centroid, patch.centroid);
    }
}

/// Bin ranges for bass (first 8%), mid (next 27%) and treble (the rest).
///
/// The three ranges are contiguous and together cover `0..bins`. Bass keeps at
/// least one bin whenever the buffer is non-empty.
pub fn band_ranges(bins: usize) -> [Range<usize>; 3] {
    let bass_end = (bins * BASS_PERCENT / 100).max(bins.min(1));
    let mid_end = (bins * (BASS_PERCENT + MID_PERCENT) / 100).clamp(bass_end, bins);
    [0..bass_end, bass_end..mid_end, mid_end..bins]
}

#[inline]
fn clean(v: f32, lo: f32, hi: f32) -> f32 {
    if v.is_finite() {
        v.clamp(lo, hi)
    } else {
        0.0
    }
}

fn band_mean(freq: &[f32], range: Range<usize>) -> f32 {
    let len = range.len();
    if len == 0 {
        return 0.0;
    }
    let sum: f32 = freq[range].iter().map(|&m| clean(m, 0.0, 1.0)).sum();
    sum / len as f32
}

/// Computes [`AudioFeatures`] from one pair of analyser buffers.
pub fn extract(time_domain: &[f32], frequency: &[f32]) -> AudioFeatures {
    let rms = if time_domain.is_empty() {
        0.0
    } else {
        let sq: f32 = time_domain
            .iter()
            .map(|&s| {
                let s = clean(s, -1.0, 1.0);
                s * s
            })
            .sum();
        (sq / time_domain.len() as f32).sqrt()
    };

    let [bass, mid, treble] = band_ranges(frequency.len());

    let mut weighted = 0.0f32;
    let mut total = 0.0f32;
    for (i, &m) in frequency.iter().enumerate() {
        let m = clean(m, 0.0, 1.0);
        weighted += i as f32 * m;
        total += m;
    }
    let centroid = if total > 0.0 {
        weighted / total / frequency.len() as f32
    } else {
        0.0
    };

    AudioFeatures {
        energy: (rms * 2.0).min(1.0),
        rms,
        bass: band_mean(frequency, bass),
        mid: band_mean(frequency, mid),
        treble: band_mean(frequency, treble),
        centroid,
    }
}
