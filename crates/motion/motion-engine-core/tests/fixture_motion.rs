use std::rc::Rc;

use approx::assert_abs_diff_eq;
use motion_engine::{
    AnimationOptions, AnimationOutcome, Channel, Completion, Easing, EngineConfig,
    HeadlessElement, ManualClock, MotionEngine, PerformanceMode, PhysicsConfig, SpringConfig,
    Transform, Viewport,
};
use motion_test_fixtures::{engine_configs, keyframes, physics, springs};
use serde::Deserialize;

const FRAME_MS: f64 = 16.0;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyframeFixture {
    duration_ms: f64,
    easing: String,
    frames: Vec<Transform>,
}

fn engine() -> (MotionEngine, ManualClock) {
    let clock = ManualClock::new();
    let engine =
        MotionEngine::new(EngineConfig::default(), Rc::new(clock.clone())).expect("engine");
    (engine, clock)
}

/// Step until `completion` resolves, calling `inspect` after every frame.
/// Returns the number of frames it took.
fn run_until_done(
    engine: &mut MotionEngine,
    clock: &ManualClock,
    completion: &Completion,
    max_frames: usize,
    mut inspect: impl FnMut(),
) -> usize {
    for frame in 1..=max_frames {
        clock.advance(FRAME_MS);
        engine.on_frame();
        inspect();
        if completion.is_finished() {
            return frame;
        }
    }
    panic!("animation {} still running after {max_frames} frames", completion.id());
}

#[test]
fn every_engine_config_fixture_loads() {
    for name in engine_configs::keys().expect("fixture keys") {
        let json = engine_configs::json(&name).expect("fixture json");
        EngineConfig::from_json_str(&json)
            .unwrap_or_else(|err| panic!("engine config '{name}' rejected: {err}"));
    }

    let battery =
        EngineConfig::from_json_str(&engine_configs::json("battery").expect("battery json"))
            .expect("battery config");
    assert_eq!(battery.animation.performance_mode, PerformanceMode::Battery);
    assert_eq!(battery.viewport, Viewport::new(390.0, 844.0));
    assert_eq!(battery.animation.easing, Easing::bezier(0.25, 0.1, 0.25, 1.0));

    let fast = EngineConfig::from_json_str(
        &engine_configs::json("high-refresh").expect("high-refresh json"),
    )
    .expect("high-refresh config");
    assert_eq!(fast.scheduler.frame_budget_ms, 8.0);
    assert_eq!(fast.animation.duration_ms, 250.0);
    // Untouched sections keep their defaults
    assert_eq!(fast.recovery, EngineConfig::default().recovery);
}

/// it should run the high-refresh preset's default tween in its configured duration
#[test]
fn high_refresh_engine_uses_fixture_defaults() {
    let config = EngineConfig::from_json_str(
        &engine_configs::json("high-refresh").expect("high-refresh json"),
    )
    .expect("config");
    let clock = ManualClock::new();
    let mut engine = MotionEngine::new(config, Rc::new(clock.clone())).expect("engine");
    let el = HeadlessElement::boxed();
    let completion = engine
        .animate_element(
            el.clone(),
            Transform::from_translation(64.0, 32.0),
            AnimationOptions::new(),
        )
        .expect("tween");
    let frames = run_until_done(&mut engine, &clock, &completion, 100, || {});
    // 250 ms at 16 ms per frame
    assert_eq!(frames, 16);
    assert_eq!(el.current_transform().value(Channel::TranslateY), 32.0);
}

#[test]
fn spring_fixtures_settle_on_target() {
    for name in springs::keys().expect("spring keys") {
        let spring: SpringConfig = springs::load(&name).expect("spring fixture");
        spring.validate().expect("valid spring fixture");

        let (mut engine, clock) = engine();
        let el = HeadlessElement::boxed();
        let id = engine
            .create_spring_animation(
                el.clone(),
                Transform::from_translation(240.0, 0.0),
                Some(spring.clone()),
                AnimationOptions::new(),
            )
            .expect("spring");
        let completion = engine.completion(id).expect("tracked");

        let mut peak = 0.0f64;
        let probe = el.clone();
        run_until_done(
            &mut engine,
            &clock,
            &completion,
            spring.max_iterations as usize + 2,
            || peak = peak.max(probe.current_transform().value(Channel::TranslateX)),
        );

        assert_eq!(completion.outcome(), Some(AnimationOutcome::Completed));
        assert_abs_diff_eq!(
            el.current_transform().value(Channel::TranslateX),
            240.0,
            epsilon = 0.05
        );
        if spring.clamp {
            assert!(peak <= 240.0, "{name} overshot to {peak}");
        }
        if name == "wobbly" {
            assert!(peak > 240.0, "wobbly spring should overshoot");
        }
    }
}

/// it should drop a body onto the viewport floor and let it come to rest
#[test]
fn ball_drop_comes_to_rest_on_the_floor() {
    let config: PhysicsConfig = physics::load("ball-drop").expect("ball-drop fixture");
    let (mut engine, clock) = engine();
    let el = HeadlessElement::boxed();
    let id = engine
        .create_physics_animation(el.clone(), Some(config), AnimationOptions::new())
        .expect("physics");
    let completion = engine.completion(id).expect("tracked");

    // Must settle well inside the 10 s safety cap
    let frames = run_until_done(&mut engine, &clock, &completion, 640, || {});
    assert!(frames < 600, "took {frames} frames to settle");

    // Default viewport is 1280x720 and the box is 100px tall
    let t = el.current_transform();
    assert_abs_diff_eq!(t.value(Channel::TranslateY), 620.0, epsilon = 1.0);
    assert_eq!(t.value(Channel::TranslateX), 0.0);
}

/// it should keep a thrown body inside its explicit bounds until the time cap
#[test]
fn boxed_throw_stays_in_bounds() {
    let config: PhysicsConfig = physics::load("boxed-throw").expect("boxed-throw fixture");
    let bounds = config.bounds.expect("fixture carries bounds");
    let cap_frames = (config.max_duration_ms / FRAME_MS) as usize + 2;

    let (mut engine, clock) = engine();
    let el = HeadlessElement::boxed();
    let id = engine
        .create_physics_animation(el.clone(), Some(config), AnimationOptions::new())
        .expect("physics");
    let completion = engine.completion(id).expect("tracked");

    let probe = el.clone();
    run_until_done(&mut engine, &clock, &completion, cap_frames, || {
        let t = probe.current_transform();
        let (x, y) = (t.value(Channel::TranslateX), t.value(Channel::TranslateY));
        assert!(
            (bounds.left - 1e-6..=bounds.right + 1e-6).contains(&x),
            "x = {x} escaped"
        );
        assert!(
            (bounds.top - 1e-6..=bounds.bottom + 1e-6).contains(&y),
            "y = {y} escaped"
        );
    });
    assert_eq!(completion.outcome(), Some(AnimationOutcome::Completed));
}

/// it should pass exactly through the middle keyframe at the halfway point
#[test]
fn nudge_keyframes_hit_every_boundary() {
    let fixture: KeyframeFixture = keyframes::load("nudge").expect("nudge fixture");
    assert_eq!(fixture.frames.len(), 3);

    let (mut engine, clock) = engine();
    let el = HeadlessElement::boxed();
    let id = engine
        .create_keyframe_animation(
            el.clone(),
            fixture.frames.clone(),
            AnimationOptions::new()
                .with_duration(fixture.duration_ms)
                .with_easing(Easing::named(fixture.easing.as_str())),
        )
        .expect("keyframes");

    clock.set(fixture.duration_ms / 2.0);
    engine.on_frame();
    let mid = el.current_transform();
    assert_abs_diff_eq!(mid.value(Channel::TranslateX), 100.0, epsilon = 1e-9);
    assert_abs_diff_eq!(mid.value(Channel::TranslateY), 50.0, epsilon = 1e-9);
    assert_abs_diff_eq!(mid.value(Channel::RotateZ), 45.0, epsilon = 1e-9);

    clock.set(fixture.duration_ms);
    engine.on_frame();
    let end = el.current_transform();
    assert_eq!(end.value(Channel::TranslateX), 40.0);
    assert_eq!(end.value(Channel::RotateZ), 0.0);
    // Finished animations are no longer tracked
    assert!(engine.completion(id).is_none());
    assert_eq!(engine.get_active_animation_count(), 0);
}

/// it should run a four-frame pulse in battery mode and finish back at rest scale
#[test]
fn pulse_keyframes_in_battery_mode() {
    let fixture: KeyframeFixture = keyframes::load("pulse").expect("pulse fixture");
    let (mut engine, clock) = engine();
    let el = HeadlessElement::boxed();
    engine
        .create_keyframe_animation(
            el.clone(),
            fixture.frames,
            AnimationOptions::new()
                .with_duration(fixture.duration_ms)
                .with_performance_mode(PerformanceMode::Battery),
        )
        .expect("keyframes");

    // Linear segments: one third of the way is the 1.2 peak
    clock.set(fixture.duration_ms / 3.0);
    engine.on_frame();
    assert_abs_diff_eq!(
        el.current_transform().value(Channel::ScaleX),
        1.2,
        epsilon = 1e-9
    );
    assert!(el.render_hint().is_none());

    clock.set(fixture.duration_ms + FRAME_MS);
    engine.on_frame();
    assert_abs_diff_eq!(
        el.current_transform().value(Channel::ScaleX),
        1.0,
        epsilon = 1e-9
    );
    assert_eq!(engine.get_active_animation_count(), 0);
}
