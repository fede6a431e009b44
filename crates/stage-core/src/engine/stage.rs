//! Stage modes and transition timing.

use super::budget::Tier;
use crate::constants::{ONSET_DECAY_PER_FRAME, ONSET_REFERENCE_FRAME_MS};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransitionKind {
    /// From the idle theme (or nothing) into the target theme.
    ToTheme,
    /// From the playing theme back to the idle theme.
    ToIdle,
    /// Between two playing themes.
    ThemeToTheme,
}

impl TransitionKind {
    pub fn ends_idle(self) -> bool {
        matches!(self, TransitionKind::ToIdle)
    }
}

/// Observable engine mode.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StageMode {
    Idle,
    Playing,
    Transition {
        kind: TransitionKind,
        start_ms: f64,
        duration_ms: f64,
        onset: f64,
    },
}

impl StageMode {
    pub fn tier(&self) -> Tier {
        match self {
            StageMode::Idle => Tier::Idle,
            StageMode::Playing => Tier::Active,
            StageMode::Transition { .. } => Tier::Transition,
        }
    }

    pub fn is_transition(&self) -> bool {
        matches!(self, StageMode::Transition { .. })
    }
}

/// Linear progress in `[0, 1]` from wall-clock time.
pub fn progress(start_ms: f64, duration_ms: f64, now_ms: f64) -> f64 {
    if duration_ms <= 0.0 {
        return 1.0;
    }
    ((now_ms - start_ms) / duration_ms).clamp(0.0, 1.0)
}

/// Cubic ease-in-out.
pub fn ease_in_out(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}

/// Decays `onset` by the wall-clock time elapsed since the last frame.
pub fn decay_onset(onset: f64, dt_ms: f64) -> f64 {
    if dt_ms <= 0.0 {
        return onset;
    }
    onset * ONSET_DECAY_PER_FRAME.powf(dt_ms / ONSET_REFERENCE_FRAME_MS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_follow_mode() {
        assert_eq!(StageMode::Idle.tier(), Tier::Idle);
        assert_eq!(StageMode::Playing.tier(), Tier::Active);
        let t = StageMode::Transition {
            kind: TransitionKind::ToIdle,
            start_ms: 0.0,
            duration_ms: 700.0,
            onset: 1.0,
        };
        assert_eq!(t.tier(), Tier::Transition);
    }

    #[test]
    fn progress_is_clamped_and_time_based() {
        assert_eq!(progress(100.0, 900.0, 50.0), 0.0);
        assert_eq!(progress(100.0, 900.0, 550.0), 0.5);
        assert_eq!(progress(100.0, 900.0, 5000.0), 1.0);
        assert_eq!(progress(0.0, 0.0, 0.0), 1.0);
    }

    #[test]
    fn easing_endpoints_and_midpoint() {
        assert_eq!(ease_in_out(0.0), 0.0);
        assert_eq!(ease_in_out(0.5), 0.5);
        assert_eq!(ease_in_out(1.0), 1.0);
        assert!(ease_in_out(0.25) < 0.25);
        assert!(ease_in_out(0.75) > 0.75);
    }

    #[test]
    fn onset_decay_is_frame_rate_independent() {
        let frame = ONSET_REFERENCE_FRAME_MS;
        let one = decay_onset(1.0, frame);
        assert!((one - 0.9).abs() < 1e-12);

        // two 30 Hz frames == four 60 Hz frames
        let slow = decay_onset(decay_onset(1.0, frame * 2.0), frame * 2.0);
        let mut fast = 1.0;
        for _ in 0..4 {
            fast = decay_onset(fast, frame);
        }
        assert!((slow - fast).abs() < 1e-12);
        assert_eq!(decay_onset(0.5, 0.0), 0.5);
    }
}
