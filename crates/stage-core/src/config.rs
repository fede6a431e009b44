//! Engine configuration with defaults taken from [`crate::constants`].

use crate::constants::*;
use crate::engine::{Tier, TierConfig};

/// Per-tier frame caps and DPR bands.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TierTable {
    pub idle: TierConfig,
    pub active: TierConfig,
    pub transition: TierConfig,
}

impl TierTable {
    pub fn get(&self, tier: Tier) -> TierConfig {
        match tier {
            Tier::Idle => self.idle,
            Tier::Active => self.active,
            Tier::Transition => self.transition,
        }
    }
}

impl Default for TierTable {
    fn default() -> Self {
        Self {
            idle: TierConfig {
                fps_cap: IDLE_FPS_CAP,
                dpr_min: IDLE_DPR_MIN,
                dpr_max: IDLE_DPR_MAX,
            },
            active: TierConfig {
                fps_cap: ACTIVE_FPS_CAP,
                dpr_min: ACTIVE_DPR_MIN,
                dpr_max: ACTIVE_DPR_MAX,
            },
            transition: TierConfig {
                fps_cap: TRANSITION_FPS_CAP,
                dpr_min: TRANSITION_DPR_MIN,
                dpr_max: TRANSITION_DPR_MAX,
            },
        }
    }
}

/// Options passed to [`crate::VisualizerEngine::new`].
#[derive(Clone, Debug)]
pub struct StageConfig {
    pub tiers: TierTable,
    pub to_idle_duration_ms: f64,
    pub to_theme_duration_ms: f64,
    pub initial_dpr_scale: f64,
    pub initial_frame_cost_ms: f64,
    /// Callback jitter tolerated below a tier's frame interval.
    pub frame_cap_slack_ms: f64,
    /// Seed for the per-transition dissolve pattern.
    pub seed: u64,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            tiers: TierTable::default(),
            to_idle_duration_ms: TO_IDLE_DURATION_MS,
            to_theme_duration_ms: TO_THEME_DURATION_MS,
            initial_dpr_scale: INITIAL_DPR_SCALE,
            initial_frame_cost_ms: INITIAL_FRAME_COST_MS,
            frame_cap_slack_ms: 0.0,
            seed: 42,
        }
    }
}
