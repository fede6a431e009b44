//! Audio-reactive stage engine.
//!
//! The crate owns everything that does not depend on a particular host: the
//! audio feature extractor, the broadcast surfaces shared between producers
//! and the render loop, GPU resource lifetimes, the theme contract, the
//! visualizer engine state machine and the portal-wipe transition pass.
//! Front ends (`stage-web`, `stage-native`) supply a canvas, an animation
//! callback and an audio sampler.

pub mod audio;
pub mod compositor;
pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod gpu;
pub mod surfaces;
pub mod theme;
pub mod wgpu_backend;

pub use audio::{
    extract, AudioBuffers, AudioFeatures, AudioPump, AudioSampler, FeaturePatch, SpectrumAnalyser,
};
pub use compositor::{PortalWipe, WipeParams};
pub use config::{StageConfig, TierTable};
pub use engine::{
    backing_size, FrameBudget, FrameOutcome, LayoutBox, StageMode, Tier, TierConfig,
    TransitionKind, VisualizerEngine, WantPlayingOptions,
};
pub use error::{Result, StageError};
pub use gpu::{ColorFormat, DrawCall, FboTex, Gpu, PingPong, ProgramDesc, RenderTarget, TextureDesc};
pub use surfaces::{
    AudioSurface, Broadcast, CanvasRegistration, CanvasSlot, MediaEvent, MediaSurface,
    PlaybackStatus, Subscription, VisualSurface,
};
pub use theme::{FrameArgs, Theme, ThemeFactory, ThemeId, ThemeKind, ThemeLibrary};
pub use wgpu_backend::{validate_wgsl, WgpuGpu};

// Shaders bundled as string constants
pub static PORTAL_WIPE_WGSL: &str = include_str!("../shaders/portal_wipe.wgsl");
pub static NEBULA_WGSL: &str = include_str!("../shaders/nebula.wgsl");
pub static PULSE_WGSL: &str = include_str!("../shaders/pulse.wgsl");
pub static ECHO_WGSL: &str = include_str!("../shaders/echo.wgsl");
