use glam::Vec3;

use super::{rgba, ThemeUniforms};
use crate::error::Result;
use crate::gpu::{DrawCall, Gpu, PingPong, ProgramDesc, RenderTarget};
use crate::theme::{FrameArgs, Theme};

const DECAY: f32 = 0.92; // trail persistence per frame
const MODE_FEEDBACK: f32 = 0.0;
const MODE_PRESENT: f32 = 1.0;

const INK: Vec3 = Vec3::new(0.85, 0.95, 1.0);
const EMBER: Vec3 = Vec3::new(1.0, 0.55, 0.15);

/// Feedback trails: each frame reads the previous one from a [`PingPong`],
/// fades and warps it, stamps the new audio-driven figure on top, then
/// presents the result.
pub struct EchoTheme<G: Gpu> {
    program: Option<G::Program>,
    trails: Option<PingPong<G>>,
}

impl<G: Gpu> EchoTheme<G> {
    pub fn new() -> Self {
        Self {
            program: None,
            trails: None,
        }
    }
}

impl<G: Gpu> Default for EchoTheme<G> {
    fn default() -> Self {
        Self::new()
    }
}

impl<G: Gpu> Theme<G> for EchoTheme<G> {
    fn name(&self) -> &str {
        "echo"
    }

    fn init(&mut self, gpu: &mut G) -> Result<()> {
        let program = gpu.create_program(&ProgramDesc {
            label: "echo",
            source: crate::ECHO_WGSL,
            texture_count: 1,
            uniform_size: std::mem::size_of::<ThemeUniforms>() as u64,
        })?;
        self.program = Some(program);
        Ok(())
    }

    fn render(&mut self, gpu: &mut G, target: RenderTarget<'_, G>, args: &FrameArgs) -> Result<()> {
        let Self { program, trails } = self;
        let Some(program) = program.as_ref() else {
            return Ok(());
        };
        let (w, h) = (args.width.max(1), args.height.max(1));
        match trails {
            Some(pp) => {
                pp.resize(gpu, w, h)?;
            }
            None => *trails = Some(PingPong::new(gpu, "echo.trails", w, h)?),
        }
        let Some(trails) = trails.as_mut() else {
            return Ok(());
        };

        let a = &args.audio;
        let mut u = ThemeUniforms::from_args(args);
        u.tint_a = rgba(INK.lerp(EMBER, a.bass.clamp(0.0, 1.0)));
        u.tint_b = rgba(INK * 0.15);
        u.aux0 = DECAY;
        u.aux1 = MODE_FEEDBACK;
        gpu.draw(&DrawCall {
            label: "echo.feedback",
            target: RenderTarget::Offscreen(trails.dst_fbo()),
            program,
            uniforms: bytemuck::bytes_of(&u),
            textures: &[trails.src_tex()],
        })?;
        trails.swap();

        u.aux1 = MODE_PRESENT;
        gpu.draw(&DrawCall {
            label: "echo.present",
            target,
            program,
            uniforms: bytemuck::bytes_of(&u),
            textures: &[trails.src_tex()],
        })
    }

    fn dispose(&mut self, gpu: &mut G) -> Result<()> {
        let trails = match self.trails.take() {
            Some(pp) => pp.dispose(gpu),
            None => Ok(()),
        };
        let program = match self.program.take() {
            Some(p) => gpu.delete_program(p),
            None => Ok(()),
        };
        trails.and(program)
    }
}
