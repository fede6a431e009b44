use std::rc::Rc;

use super::features::{extract, AudioFeatures, FeaturePatch};
use crate::surfaces::AudioSurface;

/// One frame's worth of analyser output, borrowed from the sampler.
#[derive(Clone, Copy, Debug)]
pub struct AudioBuffers<'a> {
    /// Samples in `[-1, 1]`.
    pub time_domain: &'a [f32],
    /// Bin magnitudes in `[0, 1]`.
    pub frequency: &'a [f32],
}

/// A source of analyser buffers, refreshed on every call.
///
/// Implemented by the WebAudio analyser in `stage-web`, by the capture ring in
/// `stage-native`, and by synthetic buffers in tests.
pub trait AudioSampler {
    /// Returns `None` while no audio source is connected.
    fn sample(&mut self) -> Option<AudioBuffers<'_>>;
}

/// Samples once per tick and publishes the extracted features.
pub struct AudioPump<S> {
    sampler: S,
    surface: Rc<AudioSurface>,
}

impl<S: AudioSampler> AudioPump<S> {
    pub fn new(sampler: S, surface: Rc<AudioSurface>) -> Self {
        Self { sampler, surface }
    }

    pub fn sampler_mut(&mut self) -> &mut S {
        &mut self.sampler
    }

    /// Pulls one pair of buffers, extracts features and writes them to the
    /// surface. Without a connected source the surface keeps its last value.
    pub fn tick(&mut self) -> Option<AudioFeatures> {
        let buffers = self.sampler.sample()?;
        let features = extract(buffers.time_domain, buffers.frequency);
        self.surface.set(FeaturePatch::from(features));
        Some(features)
    }
}
