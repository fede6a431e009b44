use crate::constants::{BASE_DPR_MAX, BASE_DPR_MIN};

/// Parent layout box as last reported by the host's resize observer.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LayoutBox {
    pub css_width: f64,
    pub css_height: f64,
    pub device_pixel_ratio: f64,
}

/// The display's pixel ratio clamped to `[1, 2]`.
pub fn base_dpr(device_pixel_ratio: f64) -> f64 {
    if device_pixel_ratio.is_finite() {
        device_pixel_ratio.clamp(BASE_DPR_MIN, BASE_DPR_MAX)
    } else {
        BASE_DPR_MIN
    }
}

/// Backing-store size: `floor(css * clamp(devicePixelRatio, 1, 2) * dpr_scale)`,
/// at least one pixel on each axis.
pub fn backing_size(layout: &LayoutBox, dpr_scale: f64) -> (u32, u32) {
    let base = base_dpr(layout.device_pixel_ratio);
    let axis = |css: f64| {
        let px = (css.max(0.0) * base * dpr_scale).floor();
        if px.is_finite() {
            (px as u32).max(1)
        } else {
            1
        }
    };
    (axis(layout.css_width), axis(layout.css_height))
}
