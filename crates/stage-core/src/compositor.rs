//! The portal-wipe transition pass.
//!
//! Blends a frozen "from" snapshot and a live "to" frame with a noise-jittered
//! radial front. A ring rides the front and flares with the transition onset.

use bytemuck::{Pod, Zeroable};

use crate::constants::{WIPE_RING_WIDTH, WIPE_SOFTNESS};
use crate::error::Result;
use crate::gpu::{DrawCall, Gpu, ProgramDesc, RenderTarget};

/// Inputs for one composite.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WipeParams {
    pub width: u32,
    pub height: u32,
    /// Eased progress in `[0, 1]`. 0 shows only "from", 1 only "to".
    pub progress: f32,
    pub onset: f32,
    /// Offset into the noise field, fixed for the duration of a transition.
    pub seed: f32,
    /// Wipe toward the edges (`true`) or toward the center.
    pub outward: bool,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
struct WipeUniforms {
    resolution: [f32; 2],
    progress: f32,
    onset: f32,
    seed: f32,
    softness: f32,
    ring_width: f32,
    direction: f32,
}

impl From<&WipeParams> for WipeUniforms {
    fn from(p: &WipeParams) -> Self {
        Self {
            resolution: [p.width as f32, p.height as f32],
            progress: p.progress.clamp(0.0, 1.0),
            onset: p.onset.clamp(0.0, 1.0),
            seed: p.seed,
            softness: WIPE_SOFTNESS,
            ring_width: WIPE_RING_WIDTH,
            direction: if p.outward { 1.0 } else { -1.0 },
        }
    }
}

pub struct PortalWipe<G: Gpu> {
    program: G::Program,
}

impl<G: Gpu> PortalWipe<G> {
    /// Compiles the wipe program. Failure is fatal to the engine.
    pub fn new(gpu: &mut G) -> Result<Self> {
        let program = gpu.create_program(&ProgramDesc {
            label: "portal_wipe",
            source: crate::PORTAL_WIPE_WGSL,
            texture_count: 2,
            uniform_size: std::mem::size_of::<WipeUniforms>() as u64,
        })?;
        Ok(Self { program })
    }

    pub fn draw(
        &self,
        gpu: &mut G,
        target: RenderTarget<'_, G>,
        from: &G::Texture,
        to: &G::Texture,
        params: &WipeParams,
    ) -> Result<()> {
        let u = WipeUniforms::from(params);
        gpu.draw(&DrawCall {
            label: "portal_wipe",
            target,
            program: &self.program,
            uniforms: bytemuck::bytes_of(&u),
            textures: &[from, to],
        })
    }

    pub fn dispose(self, gpu: &mut G) -> Result<()> {
        gpu.delete_program(self.program)
    }
}
