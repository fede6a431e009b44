use glam::Vec3;

use super::{rgba, ThemeUniforms};
use crate::theme::FrameArgs;

const DEEP: Vec3 = Vec3::new(0.04, 0.05, 0.16);
const VIOLET: Vec3 = Vec3::new(0.32, 0.12, 0.45);
const TEAL: Vec3 = Vec3::new(0.05, 0.38, 0.42);
const ROSE: Vec3 = Vec3::new(0.62, 0.22, 0.38);

const DRIFT: f32 = 0.035; // field scroll speed

pub(super) fn uniforms(args: &FrameArgs) -> ThemeUniforms {
    let a = &args.audio;
    let mut u = ThemeUniforms::from_args(args);
    u.tint_a = rgba(DEEP.lerp(VIOLET, a.centroid.clamp(0.0, 1.0)));
    u.tint_b = rgba(TEAL.lerp(ROSE, a.energy.clamp(0.0, 1.0)));
    u.aux0 = DRIFT;
    u
}
