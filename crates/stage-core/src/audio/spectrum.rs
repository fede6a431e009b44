//! Host-side analyser for raw PCM, shaped like a WebAudio `AnalyserNode`.
//!
//! Keeps the most recent `fft_size` samples, applies a Hann window, smooths
//! bin magnitudes over time and maps them from decibels to `[0, 1]`.

use std::sync::Arc;

use realfft::num_complex::Complex32;
use realfft::{RealFftPlanner, RealToComplex};

use super::sampler::{AudioBuffers, AudioSampler};
use crate::constants::{ANALYSER_MAX_DB, ANALYSER_MIN_DB};

const SMOOTHING: f32 = 0.8; // AnalyserNode.smoothingTimeConstant default

pub struct SpectrumAnalyser {
    fft: Arc<dyn RealToComplex<f32>>,
    window: Vec<f32>,
    ring: Vec<f32>,
    write: usize,
    input: Vec<f32>,
    spectrum: Vec<Complex32>,
    smoothed: Vec<f32>,
    time_domain: Vec<f32>,
    frequency: Vec<f32>,
    has_input: bool,
}

impl SpectrumAnalyser {
    /// `fft_size` is rounded up to an even number of at least 32.
    pub fn new(fft_size: usize) -> Self {
        let n = fft_size.max(32).next_multiple_of(2);
        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(n);
        let input = fft.make_input_vec();
        let spectrum = fft.make_output_vec();
        let window = (0..n)
            .map(|i| {
                let x = i as f32 / n as f32;
                0.5 - 0.5 * (std::f32::consts::TAU * x).cos()
            })
            .collect();
        Self {
            fft,
            window,
            ring: vec![0.0; n],
            write: 0,
            input,
            spectrum,
            smoothed: vec![0.0; n / 2],
            time_domain: vec![0.0; n],
            frequency: vec![0.0; n / 2],
            has_input: false,
        }
    }

    pub fn fft_size(&self) -> usize {
        self.ring.len()
    }

    pub fn bin_count(&self) -> usize {
        self.frequency.len()
    }

    /// Appends mono samples; only the newest `fft_size` are kept.
    pub fn push_samples(&mut self, samples: &[f32]) {
        let n = self.ring.len();
        let tail = if samples.len() > n {
            &samples[samples.len() - n..]
        } else {
            samples
        };
        for &s in tail {
            self.ring[self.write] = if s.is_finite() { s.clamp(-1.0, 1.0) } else { 0.0 };
            self.write = (self.write + 1) % n;
        }
        self.has_input |= !tail.is_empty();
    }

    /// Recomputes both output buffers from the current ring contents.
    pub fn analyse(&mut self) {
        let n = self.ring.len();
        for i in 0..n {
            self.time_domain[i] = self.ring[(self.write + i) % n];
        }
        for ((dst, &s), &w) in self.input.iter_mut().zip(&self.time_domain).zip(&self.window) {
            *dst = s * w;
        }
        if let Err(e) = self.fft.process(&mut self.input, &mut self.spectrum) {
            log::warn!("[audio] fft failed: {e}");
            return;
        }

        let scale = 1.0 / n as f32;
        let range = ANALYSER_MAX_DB - ANALYSER_MIN_DB;
        for (i, out) in self.frequency.iter_mut().enumerate() {
            let mag = self.spectrum[i].norm() * scale;
            let s = SMOOTHING * self.smoothed[i] + (1.0 - SMOOTHING) * mag;
            self.smoothed[i] = s;
            let db = if s > 0.0 { 20.0 * s.log10() } else { ANALYSER_MIN_DB };
            *out = ((db - ANALYSER_MIN_DB) / range).clamp(0.0, 1.0);
        }
    }
}

impl AudioSampler for SpectrumAnalyser {
    fn sample(&mut self) -> Option<AudioBuffers<'_>> {
        if !self.has_input {
            return None;
        }
        self.analyse();
        Some(AudioBuffers {
            time_domain: &self.time_domain,
            frequency: &self.frequency,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::extract;

    #[test]
    fn silent_until_fed() {
        let mut a = SpectrumAnalyser::new(256);
        assert!(a.sample().is_none());
        a.push_samples(&[0.0; 256]);
        let b = a.sample().expect("fed");
        assert!(b.frequency.iter().all(|&m| m == 0.0));
        assert_eq!(b.frequency.len(), 128);
    }

    #[test]
    fn low_tone_lands_in_bass_band() {
        let n = 1024;
        let mut a = SpectrumAnalyser::new(n);
        // bin 20 of 512: well inside the first 8%
        let tone: Vec<f32> = (0..n)
            .map(|i| (std::f32::consts::TAU * 20.0 * i as f32 / n as f32).sin() * 0.8)
            .collect();
        for _ in 0..20 {
            a.push_samples(&tone);
            a.analyse();
        }
        let b = a.sample().expect("fed");
        let f = extract(b.time_domain, b.frequency);
        assert!(f.bass > f.treble, "{f:?}");
        assert!(f.centroid < 0.5, "{f:?}");
        assert!(f.rms > 0.5);
    }

    #[test]
    fn ring_keeps_newest_samples() {
        let mut a = SpectrumAnalyser::new(32);
        let ramp: Vec<f32> = (0..40).map(|i| i as f32 / 100.0).collect();
        a.push_samples(&ramp);
        a.analyse();
        assert_eq!(a.time_domain[0], 0.08);
        assert_eq!(a.time_domain[31], 0.39);
    }
}
