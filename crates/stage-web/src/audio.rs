// WebAudio analyser tap publishing features to the shared audio surface.

use std::cell::RefCell;
use std::rc::Rc;

use stage_core::{AudioBuffers, AudioPump, AudioSampler, AudioSurface, MediaSurface, PlaybackStatus};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys as web;

use crate::dom::js_err;
use crate::frame::RafLoop;

const FFT_SIZE: u32 = 2048;

/// Reads an `AnalyserNode`'s byte buffers and rescales them to the ranges
/// feature extraction expects.
pub struct AnalyserSampler {
    analyser: web::AnalyserNode,
    time_bytes: Vec<u8>,
    freq_bytes: Vec<u8>,
    time: Vec<f32>,
    freq: Vec<f32>,
}

impl AnalyserSampler {
    pub fn new(analyser: web::AnalyserNode) -> Self {
        let n = analyser.fft_size() as usize;
        let bins = analyser.frequency_bin_count() as usize;
        Self {
            analyser,
            time_bytes: vec![128; n],
            freq_bytes: vec![0; bins],
            time: vec![0.0; n],
            freq: vec![0.0; bins],
        }
    }
}

impl AudioSampler for AnalyserSampler {
    fn sample(&mut self) -> Option<AudioBuffers<'_>> {
        self.analyser.get_byte_time_domain_data(&mut self.time_bytes);
        self.analyser.get_byte_frequency_data(&mut self.freq_bytes);
        for (dst, &b) in self.time.iter_mut().zip(&self.time_bytes) {
            *dst = (b as f32 - 128.0) / 128.0;
        }
        for (dst, &b) in self.freq.iter_mut().zip(&self.freq_bytes) {
            *dst = b as f32 / 255.0;
        }
        Some(AudioBuffers {
            time_domain: &self.time,
            frequency: &self.freq,
        })
    }
}

type Listener = (&'static str, Closure<dyn FnMut()>);

/// A media element routed through an analyser. Dropping or closing the tap
/// stops sampling and detaches its media listeners.
#[wasm_bindgen]
pub struct AudioTap {
    ctx: web::AudioContext,
    element: web::HtmlMediaElement,
    _source: web::MediaElementAudioSourceNode,
    pump_loop: RafLoop,
    listeners: Vec<Listener>,
}

#[wasm_bindgen]
impl AudioTap {
    /// Resumes a context suspended by the autoplay policy. Call from a user
    /// gesture.
    pub fn resume(&self) -> Result<js_sys::Promise, JsValue> {
        self.ctx.resume()
    }

    pub fn close(&mut self) {
        self.pump_loop.stop();
        self.detach_listeners();
        if let Err(e) = self.ctx.close() {
            log::warn!("[audio] close: {:?}", e);
        }
    }
}

impl AudioTap {
    pub(crate) fn attach(
        element: web::HtmlMediaElement,
        audio: Rc<AudioSurface>,
        media: Rc<MediaSurface>,
    ) -> anyhow::Result<Self> {
        let ctx = web::AudioContext::new().map_err(js_err)?;
        let source = ctx.create_media_element_source(&element).map_err(js_err)?;
        let analyser = ctx.create_analyser().map_err(js_err)?;
        analyser.set_fft_size(FFT_SIZE);
        source
            .connect_with_audio_node(&analyser)
            .map_err(js_err)?;
        analyser
            .connect_with_audio_node(&ctx.destination())
            .map_err(js_err)?;

        let pump = Rc::new(RefCell::new(AudioPump::new(AnalyserSampler::new(analyser), audio)));
        let pump_loop = RafLoop::new(move |_ts| {
            pump.borrow_mut().tick();
        });
        pump_loop.start();
        log::info!("[audio] analyser attached (fft {FFT_SIZE})");

        let mut tap = Self {
            ctx,
            element,
            _source: source,
            pump_loop,
            listeners: Vec::new(),
        };
        tap.listen(&media)?;
        Ok(tap)
    }

    /// Mirrors the element's playback into the media surface.
    fn listen(&mut self, media: &Rc<MediaSurface>) -> anyhow::Result<()> {
        let status_events = [
            ("playing", PlaybackStatus::Playing),
            ("pause", PlaybackStatus::Paused),
            ("ended", PlaybackStatus::Paused),
            ("waiting", PlaybackStatus::Loading),
            ("loadstart", PlaybackStatus::Loading),
        ];
        for (event, status) in status_events {
            let media = media.clone();
            self.add_listener(
                event,
                Closure::wrap(Box::new(move || media.set_status(status)) as Box<dyn FnMut()>),
            )?;
        }

        let media = media.clone();
        let element = self.element.clone();
        self.add_listener(
            "timeupdate",
            Closure::wrap(Box::new(move || media.set_time(element.current_time() * 1000.0))
                as Box<dyn FnMut()>),
        )
    }

    fn add_listener(&mut self, event: &'static str, f: Closure<dyn FnMut()>) -> anyhow::Result<()> {
        self.element
            .add_event_listener_with_callback(event, f.as_ref().unchecked_ref())
            .map_err(js_err)?;
        self.listeners.push((event, f));
        Ok(())
    }

    fn detach_listeners(&mut self) {
        for (event, f) in self.listeners.drain(..) {
            let _ = self
                .element
                .remove_event_listener_with_callback(event, f.as_ref().unchecked_ref());
        }
    }
}

impl Drop for AudioTap {
    fn drop(&mut self) {
        self.pump_loop.stop();
        self.detach_listeners();
    }
}
