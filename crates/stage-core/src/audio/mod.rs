//! Audio feature extraction and sampling.

pub mod features;
pub mod sampler;
pub mod spectrum;

pub use features::{band_ranges, extract, AudioFeatures, FeaturePatch};
pub use sampler::{AudioBuffers, AudioPump, AudioSampler};
pub use spectrum::SpectrumAnalyser;
