//! The visualizer engine: stage state machine, frame loop, adaptive
//! resolution and transition orchestration.
//!
//! The host drives [`VisualizerEngine::frame`] from its animation callback.
//! Each drawn frame runs in a fixed order: sync the backing store, evaluate
//! the stage state machine, draw, then fold the measured cost into the
//! [`FrameBudget`]. The adjusted DPR scale therefore applies from the next
//! frame on.

mod budget;
mod sizing;
mod stage;

pub use budget::{FrameBudget, Tier, TierConfig};
pub use sizing::{backing_size, base_dpr, LayoutBox};
pub use stage::{decay_onset, ease_in_out, progress, StageMode, TransitionKind};

use std::rc::Rc;

use fnv::FnvHashMap;
use instant::Instant;
use rand::{rngs::StdRng, Rng, SeedableRng};
use smallvec::SmallVec;

use crate::compositor::{PortalWipe, WipeParams};
use crate::config::StageConfig;
use crate::constants::STAGE_CLEAR;
use crate::error::{Result, StageError};
use crate::gpu::{FboTex, Gpu, RenderTarget};
use crate::surfaces::AudioSurface;
use crate::theme::{FrameArgs, Theme, ThemeId};

/// Options for [`VisualizerEngine::set_want_playing`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WantPlayingOptions {
    /// Cross-fade to the idle theme when playback stops. `None` means `true`.
    /// Read per call; a later call that leaves it unset cross-fades again.
    pub to_idle_transition: Option<bool>,
}

/// What a call to [`VisualizerEngine::frame`] did.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FrameOutcome {
    Disposed,
    Stopped,
    /// Arrived under the tier's frame cap; nothing was drawn.
    Skipped,
    Drawn { cost_ms: f64 },
}

struct ActiveTransition<G: Gpu> {
    kind: TransitionKind,
    start_ms: f64,
    duration_ms: f64,
    onset: f64,
    last_ms: f64,
    to: ThemeId,
    /// Theme that was on screen when the transition began. Kept alive until
    /// the transition ends.
    from: ThemeId,
    from_snapshot: FboTex<G>,
    to_frame: FboTex<G>,
    seed: f32,
}

enum Stage<G: Gpu> {
    Idle,
    Playing,
    Transition(Box<ActiveTransition<G>>),
}

pub struct VisualizerEngine<G: Gpu + 'static> {
    gpu: G,
    audio: Rc<AudioSurface>,
    config: StageConfig,
    themes: FnvHashMap<ThemeId, Box<dyn Theme<G>>>,
    next_theme_id: u64,
    current: Option<ThemeId>,
    idle: Option<ThemeId>,
    target: Option<ThemeId>,
    stage: Stage<G>,
    want_playing: bool,
    to_idle_transition: bool,
    compositor: Option<PortalWipe<G>>,
    budget: FrameBudget,
    layout: Option<LayoutBox>,
    backing: (u32, u32),
    running: bool,
    disposed: bool,
    epoch_ms: Option<f64>,
    last_draw_ms: Option<f64>,
    rng: StdRng,
}

impl<G: Gpu + 'static> VisualizerEngine<G> {
    /// Takes ownership of the context and compiles the transition program.
    /// A compile failure is returned with its diagnostic log and the context
    /// is released.
    pub fn new(mut gpu: G, audio: Rc<AudioSurface>, config: StageConfig) -> Result<Self> {
        let compositor = match PortalWipe::new(&mut gpu) {
            Ok(c) => c,
            Err(e) => {
                log::error!("[engine] compositor unavailable: {e}");
                gpu.lose_context();
                return Err(e);
            }
        };
        let backing = gpu.surface_size();
        let budget = FrameBudget::new(config.initial_frame_cost_ms, config.initial_dpr_scale);
        let rng = StdRng::seed_from_u64(config.seed);
        log::info!("[engine] ready {}x{}", backing.0, backing.1);
        Ok(Self {
            gpu,
            audio,
            config,
            themes: FnvHashMap::default(),
            next_theme_id: 0,
            current: None,
            idle: None,
            target: None,
            stage: Stage::Idle,
            want_playing: false,
            to_idle_transition: true,
            compositor: Some(compositor),
            budget,
            layout: None,
            backing,
            running: false,
            disposed: false,
            epoch_ms: None,
            last_draw_ms: None,
            rng,
        })
    }

    pub fn start(&mut self) {
        if self.disposed {
            log::warn!("[engine] start after dispose ignored");
            return;
        }
        if !self.running {
            self.running = true;
            log::info!("[engine] started");
        }
    }

    /// Halts drawing. GPU resources and themes are kept for a later `start`.
    pub fn stop(&mut self) {
        if self.running {
            self.running = false;
            log::info!("[engine] stopped");
        }
    }

    /// Records the parent layout box; applied on the next drawn frame.
    pub fn set_layout(&mut self, css_width: f64, css_height: f64, device_pixel_ratio: f64) {
        self.layout = Some(LayoutBox {
            css_width,
            css_height,
            device_pixel_ratio,
        });
    }

    pub fn set_want_playing(&mut self, want: bool, opts: WantPlayingOptions) {
        self.to_idle_transition = opts.to_idle_transition.unwrap_or(true);
        if self.want_playing != want {
            log::debug!("[engine] want_playing={want}");
        }
        self.want_playing = want;
    }

    /// Initialises `theme` and makes it the idle theme. While the stage is
    /// idle and showing the previous idle theme, the new one replaces it on
    /// screen immediately.
    pub fn set_idle_theme(&mut self, theme: Box<dyn Theme<G>>) -> Result<ThemeId> {
        let id = self.adopt(theme)?;
        let prev = self.idle.replace(id);
        if matches!(self.stage, Stage::Idle) && self.current.is_some() && self.current == prev {
            self.current = Some(id);
        }
        self.collect_garbage();
        Ok(id)
    }

    /// Initialises `theme` and makes it the playback target. A transition
    /// already in flight keeps its destination; the new target is picked up
    /// once it completes.
    pub fn set_target_theme(&mut self, theme: Box<dyn Theme<G>>) -> Result<ThemeId> {
        let id = self.adopt(theme)?;
        self.target = Some(id);
        self.collect_garbage();
        Ok(id)
    }

    /// Runs one animation callback at `now_ms` (host clock, milliseconds).
    pub fn frame(&mut self, now_ms: f64) -> FrameOutcome {
        if self.disposed {
            return FrameOutcome::Disposed;
        }
        if !self.running {
            return FrameOutcome::Stopped;
        }

        if let Some(last) = self.last_draw_ms {
            let tier = self.config.tiers.get(self.tier());
            if tier.too_soon(now_ms - last + self.config.frame_cap_slack_ms) {
                return FrameOutcome::Skipped;
            }
        }
        let epoch = *self.epoch_ms.get_or_insert(now_ms);
        self.sync_backing();

        let started = Instant::now();
        let args = FrameArgs {
            time: ((now_ms - epoch) / 1000.0) as f32,
            width: self.backing.0,
            height: self.backing.1,
            dpr: self.effective_dpr() as f32,
            audio: self.audio.get(),
        };
        if let Err(e) = self.gpu.begin_frame() {
            log::warn!("[engine] begin_frame: {e}");
        }
        self.evaluate(now_ms, &args);
        if let Err(e) = self.draw_stage(now_ms, &args) {
            log::warn!("[engine] draw: {e}");
        }
        if let Err(e) = self.gpu.end_frame() {
            log::warn!("[engine] end_frame: {e}");
        }
        let cost_ms = started.elapsed().as_secs_f64() * 1000.0;

        self.last_draw_ms = Some(now_ms);
        // clamp into the band of the tier this frame ended in
        let tier = self.config.tiers.get(self.tier());
        self.budget.record(cost_ms, &tier);
        FrameOutcome::Drawn { cost_ms }
    }

    /// Stops the loop and releases every theme, transition target and program,
    /// then the context itself. Later calls do nothing.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.stop();
        self.disposed = true;

        if let Stage::Transition(t) = std::mem::replace(&mut self.stage, Stage::Idle) {
            self.release_targets(*t);
        }
        self.current = None;
        self.idle = None;
        self.target = None;
        self.collect_garbage();

        if let Some(c) = self.compositor.take() {
            if let Err(e) = c.dispose(&mut self.gpu) {
                log::warn!("[engine] compositor dispose: {e}");
            }
        }
        self.gpu.lose_context();
        log::info!("[engine] disposed");
    }

    pub fn mode(&self) -> StageMode {
        match &self.stage {
            Stage::Idle => StageMode::Idle,
            Stage::Playing => StageMode::Playing,
            Stage::Transition(t) => StageMode::Transition {
                kind: t.kind,
                start_ms: t.start_ms,
                duration_ms: t.duration_ms,
                onset: t.onset,
            },
        }
    }

    pub fn tier(&self) -> Tier {
        match self.stage {
            Stage::Idle => Tier::Idle,
            Stage::Playing => Tier::Active,
            Stage::Transition(_) => Tier::Transition,
        }
    }

    pub fn current_theme(&self) -> Option<ThemeId> {
        self.current
    }

    pub fn idle_theme(&self) -> Option<ThemeId> {
        self.idle
    }

    pub fn target_theme(&self) -> Option<ThemeId> {
        self.target
    }

    /// Theme drawn to the screen when no transition is running.
    pub fn on_screen_theme(&self) -> Option<ThemeId> {
        match self.stage {
            Stage::Idle => self.idle.or(self.current),
            Stage::Playing => self.current,
            Stage::Transition(_) => None,
        }
    }

    pub fn theme_name(&self, id: ThemeId) -> Option<&str> {
        self.themes.get(&id).map(|t| t.name())
    }

    /// Whether the playback target is a theme called `name`.
    pub fn target_is(&self, name: &str) -> bool {
        self.target.and_then(|id| self.theme_name(id)) == Some(name)
    }

    pub fn idle_is(&self, name: &str) -> bool {
        self.idle.and_then(|id| self.theme_name(id)) == Some(name)
    }

    /// Number of live theme instances.
    pub fn theme_count(&self) -> usize {
        self.themes.len()
    }

    pub fn want_playing(&self) -> bool {
        self.want_playing
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn dpr_scale(&self) -> f64 {
        self.budget.dpr_scale()
    }

    pub fn avg_frame_cost_ms(&self) -> f64 {
        self.budget.avg_cost_ms()
    }

    pub fn backing_size(&self) -> (u32, u32) {
        self.backing
    }

    pub fn gpu(&self) -> &G {
        &self.gpu
    }

    fn effective_dpr(&self) -> f64 {
        let base = self.layout.map_or(1.0, |l| base_dpr(l.device_pixel_ratio));
        base * self.budget.dpr_scale()
    }

    fn sync_backing(&mut self) {
        let Some(layout) = self.layout else {
            return;
        };
        let size = backing_size(&layout, self.budget.dpr_scale());
        if size != self.backing {
            log::debug!(
                "[engine] backing {}x{} -> {}x{}",
                self.backing.0,
                self.backing.1,
                size.0,
                size.1
            );
            self.gpu.resize_surface(size.0, size.1);
            self.backing = size;
        }
    }

    fn adopt(&mut self, mut theme: Box<dyn Theme<G>>) -> Result<ThemeId> {
        if self.disposed {
            return Err(StageError::Disposed);
        }
        let name = theme.name().to_string();
        if let Err(e) = theme.init(&mut self.gpu) {
            log::error!("[theme] `{name}` init failed: {e}");
            if let Err(d) = theme.dispose(&mut self.gpu) {
                log::warn!("[theme] `{name}` cleanup after failed init: {d}");
            }
            return Err(StageError::theme_init(name, &e));
        }
        let id = ThemeId(self.next_theme_id);
        self.next_theme_id += 1;
        self.themes.insert(id, theme);
        log::info!("[theme] `{name}` ready as {id}");
        Ok(id)
    }

    /// Disposes every theme no role refers to.
    fn collect_garbage(&mut self) {
        let mut live: SmallVec<[ThemeId; 5]> = SmallVec::new();
        live.extend([self.current, self.idle, self.target].into_iter().flatten());
        if let Stage::Transition(t) = &self.stage {
            live.push(t.from);
            live.push(t.to);
        }
        let mut dead: SmallVec<[ThemeId; 4]> = self
            .themes
            .keys()
            .copied()
            .filter(|id| !live.contains(id))
            .collect();
        dead.sort_unstable();
        for id in dead {
            if let Some(mut theme) = self.themes.remove(&id) {
                if let Err(e) = theme.dispose(&mut self.gpu) {
                    log::warn!("[theme] `{}` dispose: {e}", theme.name());
                }
                log::debug!("[theme] `{}` ({id}) released", theme.name());
            }
        }
    }

    fn release_targets(&mut self, t: ActiveTransition<G>) {
        for fbo in [t.from_snapshot, t.to_frame] {
            if let Err(e) = fbo.dispose(&mut self.gpu) {
                log::warn!("[engine] transition target dispose: {e}");
            }
        }
    }

    /// State machine step. Runs before anything is drawn.
    fn evaluate(&mut self, now_ms: f64, args: &FrameArgs) {
        if let Stage::Transition(t) = &self.stage {
            if progress(t.start_ms, t.duration_ms, now_ms) >= 1.0 {
                self.finish_transition();
            }
        }

        match self.stage {
            Stage::Transition(_) => {}
            Stage::Idle => {
                if !self.want_playing {
                    return;
                }
                let on_screen = self.idle.or(self.current);
                match (self.target, on_screen) {
                    (Some(to), Some(from)) if to != from => {
                        self.begin_transition(TransitionKind::ToTheme, from, to, now_ms, args);
                    }
                    (Some(to), _) => {
                        self.current = Some(to);
                        self.enter(Stage::Playing);
                    }
                    (None, _) => self.enter(Stage::Playing),
                }
            }
            Stage::Playing => {
                if !self.want_playing {
                    match (self.idle, self.current) {
                        (Some(to), Some(from)) if to != from => {
                            if self.to_idle_transition {
                                let kind = TransitionKind::ToIdle;
                                self.begin_transition(kind, from, to, now_ms, args);
                            } else {
                                self.current = Some(to);
                                self.enter(Stage::Idle);
                            }
                        }
                        _ => self.enter(Stage::Idle),
                    }
                    return;
                }
                match (self.target, self.current) {
                    (Some(to), Some(from)) if to != from => {
                        self.begin_transition(TransitionKind::ThemeToTheme, from, to, now_ms, args);
                    }
                    (Some(to), None) => self.current = Some(to),
                    _ => {}
                }
            }
        }
        self.collect_garbage();
    }

    fn enter(&mut self, stage: Stage<G>) {
        let next = match &stage {
            Stage::Idle => "idle",
            Stage::Playing => "playing",
            Stage::Transition(_) => "transition",
        };
        log::info!("[engine] -> {next}");
        self.stage = stage;
        let tier = self.config.tiers.get(self.tier());
        self.budget.rebound(&tier);
    }

    fn begin_transition(
        &mut self,
        kind: TransitionKind,
        from: ThemeId,
        to: ThemeId,
        now_ms: f64,
        args: &FrameArgs,
    ) {
        let settle = |engine: &mut Self| {
            engine.current = Some(to);
            engine.enter(if kind.ends_idle() {
                Stage::Idle
            } else {
                Stage::Playing
            });
        };

        let (w, h) = self.backing;
        let from_snapshot = match FboTex::new(&mut self.gpu, "transition.from", w, h) {
            Ok(f) => f,
            Err(e) => {
                log::warn!("[engine] {kind:?} without cross-fade: {e}");
                return settle(self);
            }
        };
        let to_frame = match FboTex::new(&mut self.gpu, "transition.to", w, h) {
            Ok(f) => f,
            Err(e) => {
                log::warn!("[engine] {kind:?} without cross-fade: {e}");
                if let Err(d) = from_snapshot.dispose(&mut self.gpu) {
                    log::warn!("[engine] transition target dispose: {d}");
                }
                return settle(self);
            }
        };

        // freeze what the viewer saw last
        if let Some(theme) = self.themes.get_mut(&from) {
            if let Err(e) = theme.render(&mut self.gpu, from_snapshot.target(), args) {
                log::warn!("[engine] snapshot of `{}`: {e}", theme.name());
            }
        }

        let duration_ms = match kind {
            TransitionKind::ToIdle => self.config.to_idle_duration_ms,
            TransitionKind::ToTheme | TransitionKind::ThemeToTheme => {
                self.config.to_theme_duration_ms
            }
        };
        let seed = self.rng.gen_range(0.0f32..64.0);
        log::debug!("[engine] {kind:?} {from} -> {to} over {duration_ms}ms");
        self.enter(Stage::Transition(Box::new(ActiveTransition {
            kind,
            start_ms: now_ms,
            duration_ms,
            onset: 1.0,
            last_ms: now_ms,
            to,
            from,
            from_snapshot,
            to_frame,
            seed,
        })));
    }

    fn finish_transition(&mut self) {
        let Stage::Transition(t) = std::mem::replace(&mut self.stage, Stage::Playing) else {
            return;
        };
        let t = *t;
        self.current = Some(t.to);
        let kind = t.kind;
        self.release_targets(t);
        self.enter(if kind.ends_idle() {
            Stage::Idle
        } else {
            Stage::Playing
        });
        self.collect_garbage();
    }

    fn draw_stage(&mut self, now_ms: f64, args: &FrameArgs) -> Result<()> {
        let on_screen = self.on_screen_theme();
        let Self {
            gpu,
            themes,
            stage,
            compositor,
            ..
        } = self;

        let Stage::Transition(t) = stage else {
            return match on_screen.and_then(|id| themes.get_mut(&id)) {
                Some(theme) => theme.render(gpu, RenderTarget::Screen, args),
                None => gpu.clear(RenderTarget::Screen, STAGE_CLEAR),
            };
        };

        t.onset = decay_onset(t.onset, now_ms - t.last_ms);
        t.last_ms = now_ms;
        t.to_frame.resize(gpu, args.width, args.height)?;
        if let Some(theme) = themes.get_mut(&t.to) {
            theme.render(gpu, t.to_frame.target(), args)?;
        }

        let Some(compositor) = compositor.as_ref() else {
            return Ok(());
        };
        let eased = ease_in_out(progress(t.start_ms, t.duration_ms, now_ms));
        compositor.draw(
            gpu,
            RenderTarget::Screen,
            t.from_snapshot.texture(),
            t.to_frame.texture(),
            &WipeParams {
                width: args.width,
                height: args.height,
                progress: eased as f32,
                onset: t.onset as f32,
                seed: t.seed,
                outward: !t.kind.ends_idle(),
            },
        )
    }
}

impl<G: Gpu + 'static> Drop for VisualizerEngine<G> {
    fn drop(&mut self) {
        self.dispose();
    }
}
