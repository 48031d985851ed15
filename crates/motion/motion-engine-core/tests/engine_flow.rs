use std::cell::Cell;
use std::rc::Rc;

use approx::assert_abs_diff_eq;
use motion_engine::recovery::Resolution;
use motion_engine::{
    AnimationError, AnimationId, AnimationOptions, AnimationOutcome, Boundary, Channel, Easing,
    EngineConfig, ErrorContext, ErrorType, EventKind, FallbackAction, FnEasing, HeadlessElement,
    ManualClock, MotionEngine, PhysicsConfig, RecoveryConfig, RecoveryStrategy, SchedulerConfig,
    Severity, Transform, PHYSICS_HARD_CAP_MS,
};

const FRAME_MS: f64 = 16.0;

fn engine_with(config: EngineConfig) -> (MotionEngine, ManualClock) {
    let clock = ManualClock::new();
    let engine = MotionEngine::new(config, Rc::new(clock.clone())).expect("valid engine config");
    (engine, clock)
}

fn step(engine: &mut MotionEngine, clock: &ManualClock) {
    clock.advance(FRAME_MS);
    engine.on_frame();
}

/// it should move a tween forward on every frame and land exactly on the target
#[test]
fn tween_progress_is_monotonic_and_exact() {
    let (mut engine, clock) = engine_with(EngineConfig::default());
    let el = HeadlessElement::boxed();
    let completion = engine
        .animate_element(
            el.clone(),
            Transform::from_translation(200.0, 0.0),
            AnimationOptions::new()
                .with_duration(200.0)
                .with_easing(Easing::named("easeInOutCubic")),
        )
        .expect("create tween");

    let mut last = 0.0;
    for _ in 0..25 {
        if completion.is_finished() {
            break;
        }
        step(&mut engine, &clock);
        let x = el.current_transform().value(Channel::TranslateX);
        assert!(x >= last, "translateX went backwards: {last} -> {x}");
        last = x;
    }
    assert_eq!(last, 200.0);
    assert_eq!(completion.outcome(), Some(AnimationOutcome::Completed));
}

/// it should stop writing to the element once an animation is cancelled
#[test]
fn cancelled_animation_never_writes_again() {
    let (mut engine, clock) = engine_with(EngineConfig::default());
    let el = HeadlessElement::boxed();
    let other = HeadlessElement::boxed();
    let completion = engine
        .animate_element(
            el.clone(),
            Transform::from_rotation(90.0),
            AnimationOptions::new().with_duration(500.0),
        )
        .expect("create tween");
    engine
        .animate_element(
            other.clone(),
            Transform::from_scale(1.5),
            AnimationOptions::new().with_duration(500.0),
        )
        .expect("create second tween");

    for _ in 0..3 {
        step(&mut engine, &clock);
    }
    assert_eq!(engine.get_active_animation_count(), 2);

    engine.stop_animation(completion.id()).expect("stop");
    assert_eq!(engine.get_active_animation_count(), 1);
    let writes = el.transform_writes();

    for _ in 0..10 {
        step(&mut engine, &clock);
    }
    assert_eq!(el.transform_writes(), writes);
    assert_eq!(completion.outcome(), Some(AnimationOutcome::Stopped));

    let events: Vec<_> = engine
        .drain_events()
        .into_iter()
        .filter(|e| e.id == completion.id())
        .map(|e| e.kind)
        .collect();
    assert_eq!(events, vec![EventKind::Started, EventKind::Stopped]);

    // Stopping twice is an error, not a panic
    assert!(matches!(
        engine.stop_animation(completion.id()),
        Err(AnimationError::AnimationNotFound { .. })
    ));
}

/// it should advance high-priority work first when the concurrency ceiling is tight
#[test]
fn high_priority_runs_first_under_a_tight_ceiling() {
    let scheduler = SchedulerConfig {
        max_concurrent: 2,
        min_concurrent: 1,
        max_concurrent_ceiling: 10,
        ..SchedulerConfig::default()
    };
    let (mut engine, clock) = engine_with(EngineConfig::default().with_scheduler(scheduler));

    let normals: Vec<_> = (0..3).map(|_| HeadlessElement::boxed()).collect();
    for el in &normals {
        engine
            .animate_element(
                el.clone(),
                Transform::from_translation(10.0, 0.0),
                AnimationOptions::new().with_priority(3),
            )
            .expect("create normal tween");
    }
    let urgent = HeadlessElement::boxed();
    engine
        .animate_element(
            urgent.clone(),
            Transform::from_translation(10.0, 0.0),
            AnimationOptions::new().with_priority(10),
        )
        .expect("create high tween");

    step(&mut engine, &clock);

    assert_eq!(urgent.transform_writes(), 1);
    let written: Vec<usize> = normals.iter().map(|el| el.transform_writes()).collect();
    assert_eq!(written, vec![1, 0, 0]);
    assert_eq!(engine.get_active_animation_count(), 4);
}

/// it should isolate a failing custom easing and still finish the animation
#[test]
fn failing_easing_falls_back_to_linear() {
    let (mut engine, clock) = engine_with(EngineConfig::default());
    engine.easings_mut().register(FnEasing::new("explode", |t: f64| {
        if t > 0.5 {
            Err(AnimationError::EasingFailed {
                name: "explode".into(),
                reason: "past the midpoint".into(),
            })
        } else {
            Ok(t * t)
        }
    }));
    assert_eq!(engine.easings_mut().apply("explode", 0.75), 0.75);
    assert_eq!(engine.easings_mut().fallback_count(), 1);

    let el = HeadlessElement::boxed();
    let completion = engine
        .animate_element(
            el.clone(),
            Transform::from_translation(0.0, 80.0),
            AnimationOptions::new()
                .with_duration(160.0)
                .with_easing(Easing::named("explode")),
        )
        .expect("create tween");
    for _ in 0..12 {
        step(&mut engine, &clock);
    }
    assert_eq!(completion.outcome(), Some(AnimationOutcome::Completed));
    assert_eq!(el.current_transform().value(Channel::TranslateY), 80.0);
}

/// it should report a detached element, retry with backoff and then fall back
#[test]
fn detached_element_is_recorded_and_recovered() {
    let (mut engine, clock) = engine_with(EngineConfig::default());
    let el = HeadlessElement::boxed();
    let completion = engine
        .animate_element(
            el.clone(),
            Transform::from_translation(300.0, 0.0),
            AnimationOptions::new().with_duration(1000.0),
        )
        .expect("create tween");
    for _ in 0..5 {
        step(&mut engine, &clock);
    }
    el.detach();
    step(&mut engine, &clock);

    assert!(matches!(
        completion.outcome(),
        Some(AnimationOutcome::Errored(AnimationError::ElementDetached { .. }))
    ));
    assert_eq!(engine.get_active_animation_count(), 0);
    assert_eq!(engine.error_count(ErrorType::Animation), 1);
    assert!(engine
        .drain_events()
        .iter()
        .any(|e| e.id == completion.id() && matches!(e.kind, EventKind::Errored(_))));

    // Recovery keeps the loop alive until its backoff schedule runs out
    assert!(engine.is_frame_loop_armed());
    for _ in 0..80 {
        step(&mut engine, &clock);
    }
    let record = engine.error_history().next().expect("error recorded");
    assert_eq!(record.animation, Some(completion.id()));
    assert_eq!(record.severity, Severity::Medium);
    assert_eq!(record.recovery_attempts, 3);
    assert_eq!(
        record.resolution,
        Resolution::FellBack(FallbackAction::Simplified)
    );
    assert!(!engine.is_frame_loop_armed());
    assert!(engine.drain_notices().is_empty());
}

/// it should notify the host when a notifying strategy falls back
#[test]
fn notifying_fallback_raises_a_notice() {
    let mut recovery = RecoveryConfig::default();
    recovery.strategies.engine = RecoveryStrategy {
        max_attempts: 0,
        backoff_ms: 0.0,
        fallback: FallbackAction::Remove,
        notify_user: true,
    };
    let (mut engine, clock) = engine_with(EngineConfig::default().with_recovery(recovery));
    let calls = Rc::new(Cell::new(0));
    let seen = calls.clone();
    engine.set_notifier(Box::new(move |_record| {
        seen.set(seen.get() + 1);
        Ok(())
    }));

    let id = engine.report_error(
        AnimationError::engine("renderer crashed"),
        ErrorContext::default(),
    );
    assert!(engine.is_frame_loop_armed());
    step(&mut engine, &clock);

    assert_eq!(calls.get(), 1);
    let notices = engine.drain_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].error_id, id);
    assert_eq!(notices[0].action, FallbackAction::Remove);
    assert!(notices[0].delivered);
    assert_eq!(
        engine.error_history().next().map(|r| r.severity),
        Some(Severity::Critical)
    );
}

/// it should brake new animations to near-zero duration after a performance error
#[test]
fn performance_error_engages_the_brake() {
    let (mut engine, clock) = engine_with(EngineConfig::default());
    engine.report_error(
        AnimationError::PerformanceDegraded {
            metric: "frameTimeMs".into(),
            value: 48.0,
            threshold: 16.0,
        },
        ErrorContext::default(),
    );
    step(&mut engine, &clock);
    assert!(engine.diagnostics().braking);

    let el = HeadlessElement::boxed();
    let completion = engine
        .animate_element(
            el.clone(),
            Transform::from_translation(500.0, 0.0),
            AnimationOptions::new().with_duration(2000.0).with_delay(300.0),
        )
        .expect("create tween");
    step(&mut engine, &clock);
    assert_eq!(completion.outcome(), Some(AnimationOutcome::Completed));
    assert_abs_diff_eq!(el.current_transform().value(Channel::TranslateX), 500.0);
}

/// it should keep paused work parked until it is resumed
#[test]
fn paused_animation_holds_its_position() {
    let (mut engine, clock) = engine_with(EngineConfig::default());
    let el = HeadlessElement::boxed();
    let completion = engine
        .animate_element(
            el.clone(),
            Transform::from_translation(100.0, 0.0),
            AnimationOptions::new().with_duration(320.0),
        )
        .expect("create tween");
    for _ in 0..5 {
        step(&mut engine, &clock);
    }
    engine.pause_animation(completion.id()).expect("pause");
    let held = el.current_transform().value(Channel::TranslateX);
    assert!(engine.on_frame().is_none());
    clock.advance(5000.0);
    assert_eq!(el.current_transform().value(Channel::TranslateX), held);

    engine.resume_animation(completion.id()).expect("resume");
    step(&mut engine, &clock);
    let resumed = el.current_transform().value(Channel::TranslateX);
    assert!(resumed > held && resumed < 100.0);

    let kinds: Vec<_> = engine.drain_events().into_iter().map(|e| e.kind).collect();
    assert!(kinds.contains(&EventKind::Paused));
    assert!(kinds.contains(&EventKind::Resumed));
}

/// it should keep delivering metrics to healthy listeners when another one fails
#[test]
fn metrics_reach_listeners_despite_a_failing_one() {
    let (mut engine, clock) = engine_with(EngineConfig::default());
    engine.add_metrics_listener(Box::new(|_| anyhow::bail!("dashboard offline")));
    let delivered = Rc::new(Cell::new(0));
    let counter = delivered.clone();
    engine.add_metrics_listener(Box::new(move |_| {
        counter.set(counter.get() + 1);
        Ok(())
    }));

    engine
        .animate_element(
            HeadlessElement::boxed(),
            Transform::from_translation(40.0, 40.0),
            AnimationOptions::new().with_duration(1000.0),
        )
        .expect("create tween");
    for _ in 0..4 {
        step(&mut engine, &clock);
    }

    assert_eq!(delivered.get(), 4);
    let latest = engine.get_performance_metrics().expect("metrics recorded");
    assert_abs_diff_eq!(latest.fps, 62.5);
    assert_eq!(latest.active_animations, 1);
    assert!(engine.is_performance_good());

    let diagnostics = engine.diagnostics();
    assert_eq!(diagnostics.queue_depth, 1);
    assert_eq!(diagnostics.frames, 4);
    assert!(diagnostics.frame_loop_armed);
    assert_eq!(diagnostics.total_errors, 0);
}

/// it should end a never-resting body at the 10 s cap even when configured longer
#[test]
fn physics_never_outlives_the_hard_cap() {
    let (mut engine, clock) = engine_with(EngineConfig::default());
    let config = PhysicsConfig {
        gravity: 0.0,
        friction: 0.0,
        restitution: 1.0,
        air_resistance: 0.0,
        max_duration_ms: 60_000.0,
        bounds: Some(Boundary::new(0.0, 300.0, 200.0, 0.0)),
        ..PhysicsConfig::default()
    }
    .with_velocity(300.0, 180.0);
    let id = engine
        .create_physics_animation(HeadlessElement::boxed(), Some(config), AnimationOptions::new())
        .expect("a long cap is still a legal config");
    let completion = engine.completion(id).expect("tracked");

    let cap_frames = (PHYSICS_HARD_CAP_MS / FRAME_MS) as usize;
    for _ in 1..cap_frames {
        step(&mut engine, &clock);
    }
    assert!(!completion.is_finished(), "stopped before the cap");
    step(&mut engine, &clock);
    assert_eq!(completion.outcome(), Some(AnimationOutcome::Completed));
    assert_eq!(engine.get_active_animation_count(), 0);
}

/// it should fall back on an unrecoverable error at once instead of idling through backoff
#[test]
fn unrecoverable_error_does_not_keep_the_loop_idling() {
    let (mut engine, clock) = engine_with(EngineConfig::default());
    let id = engine.report_error(
        AnimationError::AnimationNotFound { id: AnimationId(99) },
        ErrorContext::default(),
    );
    assert!(engine.is_frame_loop_armed());

    step(&mut engine, &clock);
    let record = engine
        .error_history()
        .find(|r| r.id == id)
        .expect("error recorded");
    assert_eq!(record.recovery_attempts, 0);
    assert_eq!(
        record.resolution,
        Resolution::FellBack(FallbackAction::Remove)
    );
    assert!(!engine.is_frame_loop_armed());
}

/// it should refuse NaN targets and keyframes before anything is written
#[test]
fn non_finite_targets_are_rejected_at_creation() {
    let (mut engine, _clock) = engine_with(EngineConfig::default());
    let el = HeadlessElement::boxed();

    let tween = engine.animate_element(
        el.clone(),
        Transform::from_translation(f64::NAN, 0.0),
        AnimationOptions::new(),
    );
    assert!(matches!(tween, Err(AnimationError::InvalidConfig { .. })));

    let keyframes = engine.create_keyframe_animation(
        el.clone(),
        vec![Transform::new(), Transform::from_scale(f64::INFINITY)],
        AnimationOptions::new(),
    );
    assert!(matches!(keyframes, Err(AnimationError::InvalidConfig { .. })));

    let snapped = engine.animate_element(
        el.clone(),
        Transform::from_rotation(f64::NAN),
        AnimationOptions::new().with_reduced_motion(true),
    );
    assert!(matches!(snapped, Err(AnimationError::InvalidConfig { .. })));

    assert_eq!(el.transform_writes(), 0);
    assert_eq!(engine.get_active_animation_count(), 0);
    assert!(!engine.is_frame_loop_armed());
}
