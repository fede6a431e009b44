//! Built-in themes.

mod echo;
mod nebula;
mod pulse;

pub use echo::EchoTheme;

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use super::{FrameArgs, Theme};
use crate::error::Result;
use crate::gpu::{DrawCall, Gpu, ProgramDesc, RenderTarget};

pub fn nebula<G: Gpu + 'static>() -> Box<dyn Theme<G>> {
    Box::new(ShaderTheme::<G>::new("nebula", crate::NEBULA_WGSL, nebula::uniforms))
}

pub fn pulse<G: Gpu + 'static>() -> Box<dyn Theme<G>> {
    Box::new(ShaderTheme::<G>::new("pulse", crate::PULSE_WGSL, pulse::uniforms))
}

pub fn echo<G: Gpu + 'static>() -> Box<dyn Theme<G>> {
    Box::new(EchoTheme::<G>::new())
}

/// Uniform block shared by the built-in shaders (80 bytes).
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub(crate) struct ThemeUniforms {
    pub resolution: [f32; 2],
    pub time: f32,
    pub dpr: f32,
    pub energy: f32,
    pub bass: f32,
    pub mid: f32,
    pub treble: f32,
    pub centroid: f32,
    pub rms: f32,
    pub aux0: f32,
    pub aux1: f32,
    pub tint_a: [f32; 4],
    pub tint_b: [f32; 4],
}

impl ThemeUniforms {
    pub(crate) fn from_args(args: &FrameArgs) -> Self {
        let a = &args.audio;
        Self {
            resolution: [args.width as f32, args.height as f32],
            time: args.time,
            dpr: args.dpr,
            energy: a.energy,
            bass: a.bass,
            mid: a.mid,
            treble: a.treble,
            centroid: a.centroid,
            rms: a.rms,
            ..Default::default()
        }
    }
}

pub(crate) fn rgba(c: Vec3) -> [f32; 4] {
    [c.x, c.y, c.z, 1.0]
}

/// A theme drawn by one fullscreen program with no inputs but its uniforms.
struct ShaderTheme<G: Gpu> {
    name: &'static str,
    source: &'static str,
    fill: fn(&FrameArgs) -> ThemeUniforms,
    program: Option<G::Program>,
}

impl<G: Gpu> ShaderTheme<G> {
    fn new(
        name: &'static str,
        source: &'static str,
        fill: fn(&FrameArgs) -> ThemeUniforms,
    ) -> Self {
        Self {
            name,
            source,
            fill,
            program: None,
        }
    }
}

impl<G: Gpu> Theme<G> for ShaderTheme<G> {
    fn name(&self) -> &str {
        self.name
    }

    fn init(&mut self, gpu: &mut G) -> Result<()> {
        let program = gpu.create_program(&ProgramDesc {
            label: self.name,
            source: self.source,
            texture_count: 0,
            uniform_size: std::mem::size_of::<ThemeUniforms>() as u64,
        })?;
        if let Some(old) = self.program.replace(program) {
            gpu.delete_program(old)?;
        }
        Ok(())
    }

    fn render(&mut self, gpu: &mut G, target: RenderTarget<'_, G>, args: &FrameArgs) -> Result<()> {
        let Some(program) = self.program.as_ref() else {
            return Ok(());
        };
        let u = (self.fill)(args);
        gpu.draw(&DrawCall {
            label: self.name,
            target,
            program,
            uniforms: bytemuck::bytes_of(&u),
            textures: &[],
        })
    }

    fn dispose(&mut self, gpu: &mut G) -> Result<()> {
        match self.program.take() {
            Some(p) => gpu.delete_program(p),
            None => Ok(()),
        }
    }
}
