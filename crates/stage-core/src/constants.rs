// Engine tuning constants.
//
// Values are in milliseconds unless the name says otherwise.

// Frame budget controller
pub const FRAME_COST_EMA_KEEP: f64 = 0.9; // avg = avg*KEEP + cost*(1-KEEP)
pub const FRAME_COST_HIGH_MS: f64 = 20.0;
pub const FRAME_COST_LOW_MS: f64 = 12.0;
pub const DPR_STEP_DOWN: f64 = 0.95;
pub const DPR_STEP_UP: f64 = 1.02;
pub const INITIAL_FRAME_COST_MS: f64 = 16.0;
pub const INITIAL_DPR_SCALE: f64 = 1.0;

// Tier caps
pub const IDLE_FPS_CAP: f64 = 24.0;
pub const IDLE_DPR_MIN: f64 = 0.45;
pub const IDLE_DPR_MAX: f64 = 0.62;
pub const ACTIVE_FPS_CAP: f64 = 60.0;
pub const ACTIVE_DPR_MIN: f64 = 0.6;
pub const ACTIVE_DPR_MAX: f64 = 1.0;
pub const TRANSITION_FPS_CAP: f64 = 60.0;
pub const TRANSITION_DPR_MIN: f64 = 0.6;
pub const TRANSITION_DPR_MAX: f64 = 1.0;

// Canvas sizing: clamp applied to the display's own pixel ratio
pub const BASE_DPR_MIN: f64 = 1.0;
pub const BASE_DPR_MAX: f64 = 2.0;

// Transitions
pub const TO_IDLE_DURATION_MS: f64 = 700.0;
pub const TO_THEME_DURATION_MS: f64 = 900.0;
pub const ONSET_DECAY_PER_FRAME: f64 = 0.9; // geometric decay per reference frame
pub const ONSET_REFERENCE_FRAME_MS: f64 = 1000.0 / 60.0;

// Audio bands, as percentages of the frequency bin count (treble takes the rest)
pub const BASS_PERCENT: usize = 8;
pub const MID_PERCENT: usize = 27;

// Analyser emulation for host-side spectra (matches WebAudio defaults)
pub const ANALYSER_MIN_DB: f32 = -100.0;
pub const ANALYSER_MAX_DB: f32 = -30.0;

// Clear color used when no theme is on screen
pub const STAGE_CLEAR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

// Portal wipe
pub const WIPE_SOFTNESS: f32 = 0.18; // width of the dissolve front
pub const WIPE_RING_WIDTH: f32 = 0.045;
