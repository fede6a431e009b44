// State machine, frame loop and teardown behaviour of the visualizer engine,
// driven through a counting fake GPU.

mod common;

use std::cell::RefCell;
use std::rc::Rc;

use common::{calls, theme_log, FakeGpu, GpuLog, FakeTheme};
use stage_core::{
    AudioSurface, FrameOutcome, StageConfig, StageError, StageMode, Tier, TransitionKind,
    VisualizerEngine, WantPlayingOptions,
};

type Log = Rc<RefCell<GpuLog>>;

fn engine() -> (VisualizerEngine<FakeGpu>, Log) {
    engine_with(StageConfig::default())
}

fn engine_with(config: StageConfig) -> (VisualizerEngine<FakeGpu>, Log) {
    let (gpu, log) = FakeGpu::new(640, 360);
    let engine = VisualizerEngine::new(gpu, Rc::new(AudioSurface::new()), config).expect("engine");
    (engine, log)
}

fn play(e: &mut VisualizerEngine<FakeGpu>) {
    e.set_want_playing(true, WantPlayingOptions::default());
}

fn pause(e: &mut VisualizerEngine<FakeGpu>) {
    e.set_want_playing(false, WantPlayingOptions::default());
}

fn is_transition(mode: StageMode, want: TransitionKind) -> bool {
    matches!(mode, StageMode::Transition { kind, .. } if kind == want)
}

#[test]
fn starts_idle_and_stopped() {
    let (mut e, log) = engine();
    assert_eq!(e.mode(), StageMode::Idle);
    assert_eq!(e.frame(0.0), FrameOutcome::Stopped);
    e.start();
    assert!(matches!(e.frame(0.0), FrameOutcome::Drawn { .. }));
    // nothing to show yet
    assert_eq!(log.borrow().clears, 1);
}

#[test]
fn playing_without_idle_theme_snaps_to_target() {
    let themes = theme_log();
    let (mut e, _log) = engine();
    e.start();
    let a = e.set_target_theme(FakeTheme::boxed("a", &themes)).unwrap();
    play(&mut e);
    e.frame(0.0);
    assert_eq!(e.mode(), StageMode::Playing);
    assert_eq!(e.current_theme(), Some(a));
    assert_eq!(calls(&themes, "a").render, 1);
}

#[test]
fn pausing_cross_fades_to_idle_then_settles() {
    let themes = theme_log();
    let (mut e, _log) = engine();
    e.start();
    e.set_target_theme(FakeTheme::boxed("a", &themes)).unwrap();
    play(&mut e);
    e.frame(0.0);
    let idle = e.set_idle_theme(FakeTheme::boxed("idle", &themes)).unwrap();
    assert_eq!(e.mode(), StageMode::Playing);

    pause(&mut e);
    e.frame(100.0);
    assert!(is_transition(e.mode(), TransitionKind::ToIdle));
    assert_eq!(e.tier(), Tier::Transition);
    // "from" snapshot of the playing theme, "to" frame of the idle theme
    assert_eq!(calls(&themes, "a").offscreen_renders, 1);
    assert_eq!(calls(&themes, "idle").offscreen_renders, 1);

    e.frame(100.0 + 700.0);
    assert_eq!(e.mode(), StageMode::Idle);
    assert_eq!(e.current_theme(), Some(idle));
}

#[test]
fn idle_to_theme_transition_runs_to_completion() {
    let themes = theme_log();
    let (mut e, log) = engine();
    e.start();
    e.set_idle_theme(FakeTheme::boxed("idle", &themes)).unwrap();
    e.frame(0.0);
    assert_eq!(calls(&themes, "idle").render, 1);

    let a = e.set_target_theme(FakeTheme::boxed("a", &themes)).unwrap();
    play(&mut e);
    e.frame(50.0);
    assert!(is_transition(e.mode(), TransitionKind::ToTheme));
    assert_eq!(calls(&themes, "idle").offscreen_renders, 1);

    // the target keeps animating while the wipe runs
    for i in 1..=5 {
        e.frame(50.0 + i as f64 * 100.0);
    }
    assert!(e.mode().is_transition());
    assert_eq!(calls(&themes, "a").offscreen_renders, 6);
    assert_eq!(calls(&themes, "idle").offscreen_renders, 1);
    assert_eq!(log.borrow().draws.iter().filter(|d| *d == "portal_wipe").count(), 6);

    e.frame(50.0 + 900.0);
    assert_eq!(e.mode(), StageMode::Playing);
    assert_eq!(e.current_theme(), Some(a));
    // transition targets are released on completion
    assert_eq!(log.borrow().textures_live, 0);
    assert_eq!(log.borrow().framebuffers_live, 0);
}

#[test]
fn transition_finishes_even_when_frames_are_missed() {
    let themes = theme_log();
    let (mut e, _log) = engine();
    e.start();
    e.set_idle_theme(FakeTheme::boxed("idle", &themes)).unwrap();
    let a = e.set_target_theme(FakeTheme::boxed("a", &themes)).unwrap();
    play(&mut e);
    e.frame(1000.0);
    assert!(e.mode().is_transition());
    e.frame(60_000.0);
    assert_eq!(e.mode(), StageMode::Playing);
    assert_eq!(e.current_theme(), Some(a));
}

#[test]
fn new_target_while_playing_cross_fades() {
    let themes = theme_log();
    let (mut e, _log) = engine();
    e.start();
    e.set_target_theme(FakeTheme::boxed("a", &themes)).unwrap();
    play(&mut e);
    e.frame(0.0);
    let b = e.set_target_theme(FakeTheme::boxed("b", &themes)).unwrap();
    e.frame(20.0);
    assert!(is_transition(e.mode(), TransitionKind::ThemeToTheme));
    e.frame(20.0 + 900.0);
    assert_eq!(e.current_theme(), Some(b));
    // `a` is no longer referenced by any role
    assert_eq!(calls(&themes, "a").dispose, 1);
    assert_eq!(calls(&themes, "b").dispose, 0);
}

#[test]
fn want_playing_flip_does_not_interrupt_a_transition() {
    let themes = theme_log();
    let (mut e, _log) = engine();
    e.start();
    e.set_idle_theme(FakeTheme::boxed("idle", &themes)).unwrap();
    let a = e.set_target_theme(FakeTheme::boxed("a", &themes)).unwrap();
    play(&mut e);
    e.frame(0.0);
    let started = e.mode();
    pause(&mut e);
    e.frame(300.0);
    assert!(is_transition(e.mode(), TransitionKind::ToTheme));
    if let (
        StageMode::Transition { start_ms: s0, .. },
        StageMode::Transition { start_ms: s1, .. },
    ) = (started, e.mode())
    {
        assert_eq!(s0, s1);
    }
    // completes into the theme, then heads back to idle on the same frame
    e.frame(900.0);
    assert_eq!(e.current_theme(), Some(a));
    assert!(is_transition(e.mode(), TransitionKind::ToIdle));
}

#[test]
fn target_set_mid_transition_is_used_on_next_evaluation() {
    let themes = theme_log();
    let (mut e, _log) = engine();
    e.start();
    e.set_idle_theme(FakeTheme::boxed("idle", &themes)).unwrap();
    let a = e.set_target_theme(FakeTheme::boxed("a", &themes)).unwrap();
    play(&mut e);
    e.frame(0.0);
    let b = e.set_target_theme(FakeTheme::boxed("b", &themes)).unwrap();
    e.frame(400.0);
    assert_eq!(calls(&themes, "b").render, 0);
    assert_eq!(e.target_theme(), Some(b));

    e.frame(900.0);
    assert_eq!(e.current_theme(), Some(a));
    assert!(is_transition(e.mode(), TransitionKind::ThemeToTheme));
    e.frame(1800.0);
    assert_eq!(e.current_theme(), Some(b));
    assert_eq!(e.mode(), StageMode::Playing);
}

#[test]
fn pausing_without_cross_fade_snaps_to_idle() {
    let themes = theme_log();
    let (mut e, _log) = engine();
    e.start();
    let idle = e.set_idle_theme(FakeTheme::boxed("idle", &themes)).unwrap();
    e.set_target_theme(FakeTheme::boxed("a", &themes)).unwrap();
    play(&mut e);
    e.frame(0.0);
    e.frame(900.0);
    assert_eq!(e.mode(), StageMode::Playing);

    e.set_want_playing(
        false,
        WantPlayingOptions {
            to_idle_transition: Some(false),
        },
    );
    e.frame(1000.0);
    assert_eq!(e.mode(), StageMode::Idle);
    assert_eq!(e.current_theme(), Some(idle));
}

#[test]
fn snap_to_idle_applies_only_to_the_call_that_asked() {
    let themes = theme_log();
    let (mut e, _log) = engine();
    e.start();
    e.set_idle_theme(FakeTheme::boxed("idle", &themes)).unwrap();
    e.set_target_theme(FakeTheme::boxed("a", &themes)).unwrap();
    play(&mut e);
    e.frame(0.0);
    e.frame(900.0);
    e.set_want_playing(
        false,
        WantPlayingOptions {
            to_idle_transition: Some(false),
        },
    );
    e.frame(1000.0);
    assert_eq!(e.mode(), StageMode::Idle);

    play(&mut e);
    e.frame(1100.0);
    e.frame(2000.0);
    assert_eq!(e.mode(), StageMode::Playing);
    pause(&mut e);
    e.frame(2100.0);
    assert!(is_transition(e.mode(), TransitionKind::ToIdle));
}

#[test]
fn pausing_without_idle_theme_keeps_current() {
    let themes = theme_log();
    let (mut e, _log) = engine();
    e.start();
    let a = e.set_target_theme(FakeTheme::boxed("a", &themes)).unwrap();
    play(&mut e);
    e.frame(0.0);
    pause(&mut e);
    e.frame(100.0);
    assert_eq!(e.mode(), StageMode::Idle);
    assert_eq!(e.current_theme(), Some(a));
    assert_eq!(e.tier(), Tier::Idle);
}

#[test]
fn replacing_idle_theme_while_idle_swaps_on_screen() {
    let themes = theme_log();
    let (mut e, _log) = engine();
    e.start();
    e.set_idle_theme(FakeTheme::boxed("old", &themes)).unwrap();
    e.frame(0.0);
    let new = e.set_idle_theme(FakeTheme::boxed("new", &themes)).unwrap();
    assert_eq!(calls(&themes, "old").dispose, 1);
    e.frame(100.0);
    assert_eq!(e.on_screen_theme(), Some(new));
    assert_eq!(calls(&themes, "new").render, 1);
    assert_eq!(e.theme_count(), 1);
}

#[test]
fn onset_decays_with_wall_clock_time() {
    let themes = theme_log();
    let (mut e, _log) = engine();
    e.start();
    e.set_idle_theme(FakeTheme::boxed("idle", &themes)).unwrap();
    e.set_target_theme(FakeTheme::boxed("a", &themes)).unwrap();
    play(&mut e);
    e.frame(0.0);
    let StageMode::Transition { onset: first, .. } = e.mode() else {
        panic!("expected a transition");
    };
    assert_eq!(first, 1.0);
    e.frame(1000.0 / 60.0 * 10.0);
    let StageMode::Transition { onset, .. } = e.mode() else {
        panic!("expected a transition");
    };
    assert!((onset - 0.9f64.powi(10)).abs() < 1e-9, "{onset}");
}

#[test]
fn frames_under_the_idle_cap_are_skipped() {
    let (mut e, log) = engine();
    e.start();
    assert!(matches!(e.frame(0.0), FrameOutcome::Drawn { .. }));
    assert_eq!(e.frame(20.0), FrameOutcome::Skipped);
    assert!(matches!(e.frame(50.0), FrameOutcome::Drawn { .. }));
    assert_eq!(log.borrow().frames, 2);
}

#[test]
fn idle_cap_interval_is_exact_by_default() {
    let (mut e, _log) = engine();
    e.start();
    e.frame(0.0);
    assert_eq!(e.frame(41.0), FrameOutcome::Skipped);
    assert!(matches!(e.frame(41.7), FrameOutcome::Drawn { .. }));
}

#[test]
fn configured_cap_slack_admits_early_callbacks() {
    let (mut e, _log) = engine_with(StageConfig {
        frame_cap_slack_ms: 1.0,
        ..Default::default()
    });
    e.start();
    e.frame(0.0);
    assert!(matches!(e.frame(41.0), FrameOutcome::Drawn { .. }));
    assert_eq!(e.frame(60.0), FrameOutcome::Skipped);
}

#[test]
fn backing_store_follows_layout_and_scale() {
    let (mut e, log) = engine_with(StageConfig {
        initial_dpr_scale: 0.7,
        ..Default::default()
    });
    e.start();
    e.set_layout(800.0, 450.0, 2.0);
    e.frame(0.0);
    assert_eq!(e.backing_size(), (1120, 630));
    assert_eq!(log.borrow().surface, (1120, 630));
    // the idle band caps the scale at 0.62 from the next frame on
    e.frame(50.0);
    assert_eq!(e.backing_size(), (992, 558));
    assert_eq!(log.borrow().resizes, vec![(1120, 630), (992, 558)]);
    // unchanged layout and scale: no further resize
    e.frame(100.0);
    assert_eq!(log.borrow().resizes.len(), 2);
}

#[test]
fn entering_a_transition_lifts_the_scale_into_its_band() {
    let themes = theme_log();
    let (mut e, _log) = engine_with(StageConfig {
        initial_dpr_scale: 0.45,
        ..Default::default()
    });
    e.start();
    e.set_layout(1000.0, 500.0, 1.0);
    e.set_idle_theme(FakeTheme::boxed("idle", &themes)).unwrap();
    e.frame(0.0);
    assert_eq!(e.backing_size(), (450, 225));

    e.set_target_theme(FakeTheme::boxed("a", &themes)).unwrap();
    play(&mut e);
    e.frame(100.0);
    assert_eq!(e.tier(), Tier::Transition);
    assert_eq!(e.dpr_scale(), 0.6);
    // the next frame is sized from the transition band
    e.frame(120.0);
    assert_eq!(e.backing_size(), (600, 300));
}

#[test]
fn dpr_scale_stays_inside_tier_band() {
    let themes = theme_log();
    let (mut e, _log) = engine();
    e.start();
    e.set_layout(300.0, 200.0, 1.0);
    e.set_target_theme(FakeTheme::boxed("a", &themes)).unwrap();
    let mut now = 0.0;
    for _ in 0..30 {
        e.frame(now);
        let band = StageConfig::default().tiers.get(e.tier());
        let s = e.dpr_scale();
        assert!(band.dpr_min <= s && s <= band.dpr_max + 1e-12, "{s}");
        now += 50.0;
    }
    play(&mut e);
    for _ in 0..30 {
        e.frame(now);
        let tier = e.tier();
        let band = StageConfig::default().tiers.get(tier);
        let s = e.dpr_scale();
        assert!(band.dpr_min <= s && s <= band.dpr_max, "{tier:?} {s}");
        now += 50.0;
    }
}

#[test]
fn stop_keeps_resources_and_start_resumes() {
    let themes = theme_log();
    let (mut e, log) = engine();
    e.start();
    e.set_target_theme(FakeTheme::boxed("a", &themes)).unwrap();
    play(&mut e);
    e.frame(0.0);
    e.stop();
    assert_eq!(e.frame(100.0), FrameOutcome::Stopped);
    assert_eq!(calls(&themes, "a").dispose, 0);
    assert!(log.borrow().programs_live > 0);
    e.start();
    assert!(matches!(e.frame(200.0), FrameOutcome::Drawn { .. }));
    assert_eq!(calls(&themes, "a").render, 2);
}

#[test]
fn failed_theme_init_is_reported_and_ignored() {
    let themes = theme_log();
    let (mut e, _log) = engine();
    let a = e.set_target_theme(FakeTheme::boxed("a", &themes)).unwrap();
    let err = e.set_target_theme(FakeTheme::failing("broken", &themes)).unwrap_err();
    assert!(matches!(err, StageError::ThemeInit { ref theme, .. } if theme == "broken"));
    assert_eq!(e.target_theme(), Some(a));
    assert_eq!(calls(&themes, "broken").render, 0);
    assert_eq!(calls(&themes, "broken").dispose, 1);
}

#[test]
fn theme_calls_after_dispose_fail() {
    let themes = theme_log();
    let (mut e, _log) = engine();
    e.dispose();
    assert!(matches!(
        e.set_idle_theme(FakeTheme::boxed("late", &themes)),
        Err(StageError::Disposed)
    ));
    assert_eq!(calls(&themes, "late").init, 0);
    assert_eq!(e.frame(0.0), FrameOutcome::Disposed);
    e.start();
    assert!(!e.is_running());
}

#[test]
fn role_names_identify_the_selected_themes() {
    let themes = theme_log();
    let (mut e, _log) = engine();
    assert!(!e.target_is("a"));
    e.set_idle_theme(FakeTheme::boxed("idle", &themes)).unwrap();
    e.set_target_theme(FakeTheme::boxed("a", &themes)).unwrap();
    assert!(e.target_is("a"));
    assert!(!e.target_is("idle"));
    assert!(e.idle_is("idle"));
    assert!(!e.idle_is("a"));
}
