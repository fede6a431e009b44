//! Adaptive device-pixel-ratio controller.

use crate::constants::{
    DPR_STEP_DOWN, DPR_STEP_UP, FRAME_COST_EMA_KEEP, FRAME_COST_HIGH_MS, FRAME_COST_LOW_MS,
};

/// Quality tier derived from the stage mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tier {
    Idle,
    Active,
    Transition,
}

/// Frame cap and DPR band for one tier.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TierConfig {
    pub fps_cap: f64,
    pub dpr_min: f64,
    pub dpr_max: f64,
}

impl TierConfig {
    /// Minimum spacing between drawn frames.
    pub fn min_frame_interval_ms(&self) -> f64 {
        1000.0 / self.fps_cap
    }

    /// Whether a frame arriving `elapsed_ms` after the last drawn one falls
    /// under the cap.
    pub fn too_soon(&self, elapsed_ms: f64) -> bool {
        elapsed_ms < self.min_frame_interval_ms()
    }

    pub fn clamp(&self, dpr_scale: f64) -> f64 {
        dpr_scale.clamp(self.dpr_min, self.dpr_max)
    }
}

/// Folds measured frame costs into an EMA and steers the DPR scale.
#[derive(Clone, Debug)]
pub struct FrameBudget {
    avg_cost_ms: f64,
    dpr_scale: f64,
}

impl FrameBudget {
    pub fn new(initial_cost_ms: f64, initial_dpr_scale: f64) -> Self {
        Self {
            avg_cost_ms: initial_cost_ms,
            dpr_scale: initial_dpr_scale,
        }
    }

    pub fn avg_cost_ms(&self) -> f64 {
        self.avg_cost_ms
    }

    pub fn dpr_scale(&self) -> f64 {
        self.dpr_scale
    }

    /// Records one frame's cost under `tier` and returns the new scale, which
    /// always lies inside the tier's band.
    pub fn record(&mut self, cost_ms: f64, tier: &TierConfig) -> f64 {
        if cost_ms.is_finite() && cost_ms >= 0.0 {
            self.avg_cost_ms =
                self.avg_cost_ms * FRAME_COST_EMA_KEEP + cost_ms * (1.0 - FRAME_COST_EMA_KEEP);
        }
        if self.avg_cost_ms > FRAME_COST_HIGH_MS {
            self.dpr_scale *= DPR_STEP_DOWN;
        } else if self.avg_cost_ms < FRAME_COST_LOW_MS {
            self.dpr_scale *= DPR_STEP_UP;
        }
        self.dpr_scale = tier.clamp(self.dpr_scale);
        self.dpr_scale
    }

    /// Re-bounds the scale into `tier` without recording a frame.
    pub fn rebound(&mut self, tier: &TierConfig) -> f64 {
        self.dpr_scale = tier.clamp(self.dpr_scale);
        self.dpr_scale
    }
}
