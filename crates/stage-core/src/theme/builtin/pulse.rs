use glam::Vec3;

use super::{rgba, ThemeUniforms};
use crate::theme::FrameArgs;

const COLD: Vec3 = Vec3::new(0.10, 0.55, 0.95);
const HOT: Vec3 = Vec3::new(1.00, 0.35, 0.20);
const GLOW: Vec3 = Vec3::new(0.95, 0.90, 0.70);

const RINGS: f32 = 7.0;

pub(super) fn uniforms(args: &FrameArgs) -> ThemeUniforms {
    let a = &args.audio;
    let mut u = ThemeUniforms::from_args(args);
    u.tint_a = rgba(COLD.lerp(HOT, a.bass.clamp(0.0, 1.0)));
    u.tint_b = rgba(GLOW * (0.4 + 0.6 * a.treble.clamp(0.0, 1.0)));
    u.aux0 = RINGS;
    // ring expansion speed follows loudness
    u.aux1 = 0.25 + a.energy.clamp(0.0, 1.0);
    u
}
