//! Backend-neutral GPU surface used by the engine, the compositor and themes.
//!
//! Every handle is an associated type owned by the caller. Deleting a handle
//! consumes it, so a texture, framebuffer or program can be released at most
//! once. Programs are fullscreen passes: one uniform block at binding 0, one
//! linear clamp-to-edge sampler at binding 1 and `texture_count` sampled
//! textures from binding 2 up, drawn as a single triangle.

mod targets;

pub use targets::{FboTex, PingPong};

use crate::error::Result;

/// Color format of an offscreen texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColorFormat {
    Rgba8,
    Rgba16Float,
}

#[derive(Clone, Copy, Debug)]
pub struct TextureDesc<'a> {
    pub label: &'a str,
    pub width: u32,
    pub height: u32,
    pub format: ColorFormat,
}

#[derive(Clone, Copy, Debug)]
pub struct ProgramDesc<'a> {
    pub label: &'a str,
    /// WGSL with `vs_fullscreen` and `fs_main` entry points.
    pub source: &'a str,
    pub texture_count: u32,
    /// Size of the uniform block in bytes.
    pub uniform_size: u64,
}

/// Where a draw lands.
pub enum RenderTarget<'a, G: Gpu + ?Sized> {
    Screen,
    Offscreen(&'a G::Framebuffer),
}

impl<G: Gpu + ?Sized> Clone for RenderTarget<'_, G> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<G: Gpu + ?Sized> Copy for RenderTarget<'_, G> {}

impl<'a, G: Gpu + ?Sized> RenderTarget<'a, G> {
    pub fn framebuffer(self) -> Option<&'a G::Framebuffer> {
        match self {
            RenderTarget::Screen => None,
            RenderTarget::Offscreen(fb) => Some(fb),
        }
    }

    pub fn is_screen(&self) -> bool {
        matches!(self, RenderTarget::Screen)
    }
}

/// One fullscreen pass.
pub struct DrawCall<'a, G: Gpu + ?Sized> {
    pub label: &'a str,
    pub target: RenderTarget<'a, G>,
    pub program: &'a G::Program,
    pub uniforms: &'a [u8],
    pub textures: &'a [&'a G::Texture],
}

pub trait Gpu {
    type Texture;
    type Framebuffer;
    type Program;

    /// Whether half-float color textures can be rendered to and filtered.
    fn supports_float_color(&self) -> bool;

    fn create_texture(&mut self, desc: &TextureDesc<'_>) -> Result<Self::Texture>;
    fn create_framebuffer(
        &mut self,
        label: &str,
        texture: &Self::Texture,
    ) -> Result<Self::Framebuffer>;
    fn delete_texture(&mut self, texture: Self::Texture) -> Result<()>;
    fn delete_framebuffer(&mut self, framebuffer: Self::Framebuffer) -> Result<()>;

    /// Fails with [`crate::StageError::ShaderCompile`] carrying the
    /// diagnostic log when the source does not compile.
    fn create_program(&mut self, desc: &ProgramDesc<'_>) -> Result<Self::Program>;
    fn delete_program(&mut self, program: Self::Program) -> Result<()>;

    fn surface_size(&self) -> (u32, u32);
    fn resize_surface(&mut self, width: u32, height: u32);

    fn begin_frame(&mut self) -> Result<()>;
    fn clear(&mut self, target: RenderTarget<'_, Self>, color: [f32; 4]) -> Result<()>;
    fn draw(&mut self, call: &DrawCall<'_, Self>) -> Result<()>;
    /// Submits the frame's work and presents the screen if it was drawn to.
    fn end_frame(&mut self) -> Result<()>;

    /// Releases the context as soon as possible. Nothing may be drawn after.
    fn lose_context(&mut self);
}

/// Offscreen color format for this backend.
pub fn preferred_format<G: Gpu + ?Sized>(gpu: &G) -> ColorFormat {
    if gpu.supports_float_color() {
        ColorFormat::Rgba16Float
    } else {
        ColorFormat::Rgba8
    }
}
