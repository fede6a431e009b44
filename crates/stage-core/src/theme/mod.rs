//! The renderer contract every visual theme implements.

pub mod builtin;
mod library;

pub use library::{ThemeFactory, ThemeKind, ThemeLibrary};

use std::fmt;

use crate::audio::AudioFeatures;
use crate::error::Result;
use crate::gpu::{Gpu, RenderTarget};

/// Per-frame inputs handed to [`Theme::render`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameArgs {
    /// Seconds since the engine was created.
    pub time: f32,
    /// Target size in pixels.
    pub width: u32,
    pub height: u32,
    /// Effective pixel ratio (display ratio times the adaptive scale).
    pub dpr: f32,
    pub audio: AudioFeatures,
}

/// A self-contained GPU renderer.
///
/// The engine calls `init` exactly once before the first `render` and
/// `dispose` exactly once after the last. Every GPU object a theme creates
/// belongs to that theme alone. `render` may be asked to draw at a new size at
/// any time and must resize its own targets when it does.
pub trait Theme<G: Gpu> {
    fn name(&self) -> &str;
    fn init(&mut self, gpu: &mut G) -> Result<()>;
    fn render(&mut self, gpu: &mut G, target: RenderTarget<'_, G>, args: &FrameArgs) -> Result<()>;
    fn dispose(&mut self, gpu: &mut G) -> Result<()>;
}

/// Engine-assigned identity of a theme instance. Never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThemeId(pub(crate) u64);

impl fmt::Display for ThemeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "theme#{}", self.0)
    }
}
