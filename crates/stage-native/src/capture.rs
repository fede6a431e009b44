// Live input capture feeding the host-side spectrum analyser.

use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::FromSample;
use stage_core::{AudioBuffers, AudioSampler, SpectrumAnalyser};

const FFT_SIZE: usize = 2048;
const RING_LIMIT: usize = FFT_SIZE * 4; // drop the oldest input if frames stall

/// Mono samples written by the capture thread, drained once per frame.
type Ring = Arc<Mutex<Vec<f32>>>;

pub struct CaptureSampler {
    ring: Ring,
    scratch: Vec<f32>,
    analyser: SpectrumAnalyser,
    _stream: Option<cpal::Stream>,
}

impl CaptureSampler {
    /// Opens the default input device. Without one the sampler stays silent
    /// and the stage runs on whatever the audio surface last held.
    pub fn open() -> Self {
        let ring: Ring = Arc::new(Mutex::new(Vec::with_capacity(RING_LIMIT)));
        let stream = match start_input(ring.clone()) {
            Ok(s) => Some(s),
            Err(e) => {
                log::warn!("[audio] no live input: {e}");
                None
            }
        };
        Self {
            ring,
            scratch: Vec::with_capacity(RING_LIMIT),
            analyser: SpectrumAnalyser::new(FFT_SIZE),
            _stream: stream,
        }
    }
}

impl AudioSampler for CaptureSampler {
    fn sample(&mut self) -> Option<AudioBuffers<'_>> {
        if let Ok(mut ring) = self.ring.lock() {
            std::mem::swap(&mut *ring, &mut self.scratch);
        }
        self.analyser.push_samples(&self.scratch);
        self.scratch.clear();
        self.analyser.sample()
    }
}

fn start_input(ring: Ring) -> anyhow::Result<cpal::Stream> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| anyhow::anyhow!("no default input device"))?;
    let config = device.default_input_config()?;
    let channels = config.channels() as usize;
    log::info!(
        "[audio] capturing from `{}` at {} Hz",
        device.name().unwrap_or_default(),
        config.sample_rate().0
    );
    let stream = match config.sample_format() {
        cpal::SampleFormat::F32 => build_input::<f32>(&device, &config.into(), channels, ring)?,
        cpal::SampleFormat::I16 => build_input::<i16>(&device, &config.into(), channels, ring)?,
        cpal::SampleFormat::U16 => build_input::<u16>(&device, &config.into(), channels, ring)?,
        other => anyhow::bail!("unsupported sample format {other:?}"),
    };
    stream.play()?;
    Ok(stream)
}

fn build_input<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    channels: usize,
    ring: Ring,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: cpal::SizedSample,
    f32: FromSample<T>,
{
    let channels = channels.max(1);
    device.build_input_stream(
        config,
        move |data: &[T], _| {
            let Ok(mut ring) = ring.lock() else {
                return;
            };
            for frame in data.chunks(channels) {
                let sum: f32 = frame.iter().map(|&s| f32::from_sample_(s)).sum();
                ring.push(sum / frame.len() as f32);
            }
            if ring.len() > RING_LIMIT {
                let excess = ring.len() - RING_LIMIT;
                ring.drain(..excess);
            }
        },
        |e| log::error!("[audio] input stream error: {e}"),
        None,
    )
}
