#![cfg(target_arch = "wasm32")]
//! Browser front end: one `StageHandle` per canvas, all sharing the audio,
//! media and visual surfaces of the page.

mod audio;
mod dom;
mod frame;

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use stage_core::{
    AudioSurface, CanvasRegistration, CanvasSlot, MediaSurface, PlaybackStatus, StageConfig,
    Subscription, ThemeKind, ThemeLibrary, VisualSurface, VisualizerEngine, WantPlayingOptions,
    WgpuGpu,
};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys as web;

pub use audio::AudioTap;
use dom::{js_err, to_js};
use frame::RafLoop;

struct Shared {
    audio: Rc<AudioSurface>,
    media: Rc<MediaSurface>,
    visual: VisualSurface<web::HtmlCanvasElement>,
}

thread_local! {
    static SHARED: Shared = Shared {
        audio: Rc::new(AudioSurface::new()),
        media: Rc::new(MediaSurface::new()),
        visual: VisualSurface::new(),
    };
}

fn shared<R>(f: impl FnOnce(&Shared) -> R) -> R {
    SHARED.with(f)
}

#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();
    console_log::init_with_level(log::Level::Info).ok();
    log::info!("stage-web loaded");
    Ok(())
}

// ---------------- Stage ----------------

struct Stage {
    engine: VisualizerEngine<WgpuGpu>,
    library: ThemeLibrary<WgpuGpu>,
    canvas: web::HtmlCanvasElement,
}

impl Stage {
    fn apply_layout(&mut self) {
        if let Some((w, h, dpr)) = dom::css_layout(&self.canvas) {
            self.engine.set_layout(w, h, dpr);
        }
    }
}

/// Watches the canvas box while the stage runs.
struct ResizeWatch {
    observer: web::ResizeObserver,
    _callback: Closure<dyn FnMut(js_sys::Array)>,
}

impl ResizeWatch {
    fn new(stage: Weak<RefCell<Stage>>) -> anyhow::Result<Self> {
        let callback = Closure::wrap(Box::new(move |_entries: js_sys::Array| {
            let Some(stage) = stage.upgrade() else {
                return;
            };
            match stage.try_borrow_mut() {
                Ok(mut s) => s.apply_layout(),
                Err(_) => log::debug!("[stage] resize during frame, picked up next time"),
            };
        }) as Box<dyn FnMut(js_sys::Array)>);
        let observer =
            web::ResizeObserver::new(callback.as_ref().unchecked_ref()).map_err(js_err)?;
        Ok(Self {
            observer,
            _callback: callback,
        })
    }
}

/// A running engine bound to one canvas.
#[wasm_bindgen]
pub struct StageHandle {
    stage: Rc<RefCell<Stage>>,
    raf: RafLoop,
    resize: ResizeWatch,
}

/// Creates the GPU context for `canvas` and an engine with the default idle
/// and playing themes. Rejects when WebGPU is unavailable or a built-in shader
/// fails to compile.
#[wasm_bindgen(js_name = createStage)]
pub async fn create_stage(canvas: web::HtmlCanvasElement) -> Result<StageHandle, JsValue> {
    build_stage(canvas).await.map_err(to_js)
}

async fn build_stage(canvas: web::HtmlCanvasElement) -> anyhow::Result<StageHandle> {
    let (w, h) = (canvas.width().max(1), canvas.height().max(1));
    let instance = wgpu::Instance::default();
    let surface = instance.create_surface(wgpu::SurfaceTarget::Canvas(canvas.clone()))?;
    let gpu = WgpuGpu::new(&instance, surface, w, h).await?;

    let audio = shared(|s| s.audio.clone());
    let mut engine = VisualizerEngine::new(gpu, audio, StageConfig::default())?;
    let mut library = ThemeLibrary::new();
    engine.set_idle_theme(library.create_named("default-idle"))?;
    engine.set_target_theme(library.create(ThemeKind::DEFAULT))?;

    let stage = Rc::new(RefCell::new(Stage {
        engine,
        library,
        canvas,
    }));
    let resize = ResizeWatch::new(Rc::downgrade(&stage))?;

    let weak = Rc::downgrade(&stage);
    let raf = RafLoop::new(move |ts| {
        let Some(stage) = weak.upgrade() else {
            return;
        };
        let Ok(mut s) = stage.try_borrow_mut() else {
            return;
        };
        s.engine.frame(ts);
        let backing = s.engine.backing_size();
        dom::sync_canvas_backing_size(&s.canvas, backing);
    });
    log::info!("[stage] created ({w}x{h})");
    Ok(StageHandle { stage, raf, resize })
}

#[wasm_bindgen]
impl StageHandle {
    /// Starts (or resumes) the frame loop and the resize observer.
    pub fn start(&self) {
        let mut s = self.stage.borrow_mut();
        if s.engine.is_disposed() {
            log::warn!("[stage] start after dispose ignored");
            return;
        }
        s.engine.start();
        s.apply_layout();
        self.resize.observer.observe(&dom::layout_box(&s.canvas));
        self.raf.start();
    }

    /// Pauses scheduling; GPU resources are kept.
    pub fn stop(&self) {
        self.raf.stop();
        self.resize.observer.disconnect();
        self.stage.borrow_mut().engine.stop();
    }

    pub fn dispose(&self) {
        self.stop();
        self.stage.borrow_mut().engine.dispose();
    }

    #[wasm_bindgen(js_name = setWantPlaying)]
    pub fn set_want_playing(&self, want: bool, to_idle_transition: Option<bool>) {
        self.stage
            .borrow_mut()
            .engine
            .set_want_playing(want, WantPlayingOptions { to_idle_transition });
    }

    /// Loads the named theme and makes it the playback target. Naming the
    /// current target again does nothing.
    #[wasm_bindgen(js_name = setTargetTheme)]
    pub fn set_target_theme(&self, name: &str) -> Result<(), JsValue> {
        let mut s = self.stage.borrow_mut();
        let kind = ThemeKind::resolve(name);
        if s.engine.target_is(kind.name()) {
            return Ok(());
        }
        let theme = s.library.create(kind);
        s.engine.set_target_theme(theme).map(|_| ()).map_err(to_js)
    }

    #[wasm_bindgen(js_name = setIdleTheme)]
    pub fn set_idle_theme(&self, name: &str) -> Result<(), JsValue> {
        let mut s = self.stage.borrow_mut();
        let kind = ThemeKind::resolve(name);
        if s.engine.idle_is(kind.name()) {
            return Ok(());
        }
        let theme = s.library.create(kind);
        s.engine.set_idle_theme(theme).map(|_| ()).map_err(to_js)
    }

    /// Publishes this stage's canvas as the `inline` or `fullscreen` canvas.
    #[wasm_bindgen(js_name = registerCanvas)]
    pub fn register_canvas(&self, slot: &str) -> Result<CanvasToken, JsValue> {
        let slot = CanvasSlot::parse(slot)
            .ok_or_else(|| JsValue::from_str(&format!("unknown canvas slot `{slot}`")))?;
        let canvas = self.stage.borrow().canvas.clone();
        let registration = shared(|s| s.visual.register_canvas(slot, Some(canvas)));
        Ok(CanvasToken {
            registration: Some(registration),
        })
    }

    #[wasm_bindgen(getter)]
    pub fn mode(&self) -> String {
        format!("{:?}", self.stage.borrow().engine.mode())
    }

    #[wasm_bindgen(getter, js_name = dprScale)]
    pub fn dpr_scale(&self) -> f64 {
        self.stage.borrow().engine.dpr_scale()
    }
}

impl Drop for StageHandle {
    fn drop(&mut self) {
        self.raf.stop();
        self.resize.observer.disconnect();
    }
}

// ---------------- Shared surfaces ----------------

/// Keeps a canvas registered until `release()` or until JS frees it.
#[wasm_bindgen]
pub struct CanvasToken {
    registration: Option<CanvasRegistration>,
}

#[wasm_bindgen]
impl CanvasToken {
    pub fn release(&mut self) {
        if let Some(r) = self.registration.take() {
            r.release();
        }
    }
}

/// Keeps a JS subscription alive until `cancel()` or until JS frees it.
#[wasm_bindgen]
pub struct SubscriptionToken {
    inner: Option<Subscription>,
}

#[wasm_bindgen]
impl SubscriptionToken {
    pub fn cancel(&mut self) {
        if let Some(s) = self.inner.take() {
            s.cancel();
        }
    }
}

fn call_js(f: &js_sys::Function, arg: &JsValue) {
    if let Err(e) = f.call1(&JsValue::NULL, arg) {
        log::warn!("[surface] listener threw: {:?}", e);
    }
}

#[wasm_bindgen(js_name = setMediaTime)]
pub fn set_media_time(ms: f64) {
    shared(|s| s.media.set_time(ms));
}

#[wasm_bindgen(js_name = setMediaStatus)]
pub fn set_media_status(status: &str) -> Result<(), JsValue> {
    let status = PlaybackStatus::parse(status)
        .ok_or_else(|| JsValue::from_str(&format!("unknown status `{status}`")))?;
    shared(|s| s.media.set_status(status));
    Ok(())
}

#[wasm_bindgen(js_name = setMediaTrack)]
pub fn set_media_track(id: Option<String>) {
    shared(|s| s.media.set_track(id));
}

/// `f(status)` now and on every status change.
#[wasm_bindgen(js_name = onMediaStatus)]
pub fn on_media_status(f: js_sys::Function) -> SubscriptionToken {
    let sub = shared(|s| {
        s.media.subscribe_status(move |status| {
            let name = format!("{status:?}").to_ascii_lowercase();
            call_js(&f, &JsValue::from_str(&name));
        })
    });
    SubscriptionToken { inner: Some(sub) }
}

/// `f(canvas | null)` now and whenever the active canvas changes.
#[wasm_bindgen(js_name = onActiveCanvas)]
pub fn on_active_canvas(f: js_sys::Function) -> SubscriptionToken {
    let sub = shared(|s| {
        s.visual.subscribe(move |canvas| {
            let arg = canvas.map_or(JsValue::NULL, |c| c.clone().into());
            call_js(&f, &arg);
        })
    });
    SubscriptionToken { inner: Some(sub) }
}

#[wasm_bindgen(js_name = activeCanvas)]
pub fn active_canvas() -> Option<web::HtmlCanvasElement> {
    shared(|s| s.visual.active())
}

/// Routes `element` through an analyser feeding the shared audio surface, and
/// mirrors its playback events into the media surface.
#[wasm_bindgen(js_name = attachAudio)]
pub fn attach_audio(element: web::HtmlMediaElement) -> Result<AudioTap, JsValue> {
    let (audio, media) = shared(|s| (s.audio.clone(), s.media.clone()));
    AudioTap::attach(element, audio, media).map_err(to_js)
}
