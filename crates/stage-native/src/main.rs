mod capture;

use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use stage_core::{
    AudioPump, AudioSurface, FrameOutcome, StageConfig, ThemeKind, ThemeLibrary,
    VisualizerEngine, WantPlayingOptions, WgpuGpu,
};
use winit::event::{ElementState, Event, KeyEvent, WindowEvent};
use winit::event_loop::EventLoop;
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowBuilder};

use capture::CaptureSampler;

struct Shell {
    window: Arc<Window>,
    engine: VisualizerEngine<WgpuGpu>,
    pump: AudioPump<CaptureSampler>,
    library: ThemeLibrary<WgpuGpu>,
    started: Instant,
    playing: bool,
}

impl Shell {
    async fn new(window: Arc<Window>) -> anyhow::Result<Self> {
        let size = window.inner_size();
        let instance = wgpu::Instance::default();
        let surface = instance.create_surface(window.clone())?;
        let gpu = WgpuGpu::new(&instance, surface, size.width, size.height).await?;

        let audio = Rc::new(AudioSurface::new());
        let mut engine = VisualizerEngine::new(gpu, audio.clone(), StageConfig::default())?;
        let mut library = ThemeLibrary::new();
        engine.set_idle_theme(library.create(ThemeKind::Nebula))?;
        engine.set_target_theme(library.create(ThemeKind::DEFAULT))?;

        let mut shell = Self {
            window,
            engine,
            pump: AudioPump::new(CaptureSampler::open(), audio),
            library,
            started: Instant::now(),
            playing: false,
        };
        shell.apply_layout();
        shell.engine.start();
        Ok(shell)
    }

    fn apply_layout(&mut self) {
        let size = self.window.inner_size();
        let scale = self.window.scale_factor();
        self.engine.set_layout(
            size.width as f64 / scale,
            size.height as f64 / scale,
            scale,
        );
    }

    fn toggle_playback(&mut self) {
        self.playing = !self.playing;
        log::info!("[shell] playing={}", self.playing);
        self.engine
            .set_want_playing(self.playing, WantPlayingOptions::default());
    }

    fn choose(&mut self, kind: ThemeKind) {
        if self.engine.target_is(kind.name()) {
            return;
        }
        match self.engine.set_target_theme(self.library.create(kind)) {
            Ok(_) => self
                .window
                .set_title(&format!("stage: {}", kind.name())),
            Err(e) => log::error!("[shell] theme `{}` failed: {e}", kind.name()),
        }
    }

    /// Returns false once the engine can no longer draw.
    fn frame(&mut self) -> bool {
        self.pump.tick();
        let now_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        !matches!(self.engine.frame(now_ms), FrameOutcome::Disposed)
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .init();

    let event_loop = EventLoop::new()?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(format!("stage: {}", ThemeKind::DEFAULT.name()))
            .build(&event_loop)?,
    );
    let mut shell = pollster::block_on(Shell::new(window))?;
    log::info!("[shell] space: play/pause, 1-3: theme, esc: quit");

    event_loop.run(move |event, elwt| match event {
        Event::WindowEvent { event, .. } => match event {
            WindowEvent::Resized(_) | WindowEvent::ScaleFactorChanged { .. } => {
                shell.apply_layout()
            }
            WindowEvent::CloseRequested => {
                shell.engine.dispose();
                elwt.exit();
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } => match code {
                KeyCode::Space => shell.toggle_playback(),
                KeyCode::Digit1 => shell.choose(ThemeKind::Nebula),
                KeyCode::Digit2 => shell.choose(ThemeKind::Pulse),
                KeyCode::Digit3 => shell.choose(ThemeKind::Echo),
                KeyCode::Escape => {
                    shell.engine.dispose();
                    elwt.exit();
                }
                _ => {}
            },
            _ => {}
        },
        Event::AboutToWait => {
            if shell.frame() {
                shell.window.request_redraw();
            } else {
                elwt.exit();
            }
        }
        _ => {}
    })?;
    Ok(())
}
