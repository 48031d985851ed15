use std::hint::black_box;
use std::rc::Rc;

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use motion_engine::{
    AnimationOptions, EngineConfig, HeadlessElement, ManualClock, MotionEngine, Repeat,
    SpringConfig, Transform,
};

/// Engine with `n` infinite tweens and `n / 4` springs, all on screen
fn populated_engine(n: usize) -> (MotionEngine, ManualClock) {
    let clock = ManualClock::new();
    let mut engine =
        MotionEngine::new(EngineConfig::high_performance(), Rc::new(clock.clone())).unwrap();
    for i in 0..n {
        let target = Transform::from_translation(200.0, (i % 50) as f64)
            .with(motion_engine::Channel::RotateZ, 90.0);
        engine
            .animate_element(
                HeadlessElement::boxed(),
                target,
                AnimationOptions::new()
                    .with_duration(500.0 + i as f64)
                    .with_repeat(Repeat::Infinite)
                    .with_priority((i % 10) as i32),
            )
            .unwrap();
    }
    for _ in 0..n / 4 {
        engine
            .create_spring_animation(
                HeadlessElement::boxed(),
                Transform::from_scale(1.4),
                Some(SpringConfig::wobbly().with_max_iterations(u32::MAX)),
                AnimationOptions::new(),
            )
            .unwrap();
    }
    (engine, clock)
}

fn bench_on_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("on_frame");
    for n in [10usize, 100, 400] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter_batched_ref(
                || populated_engine(n),
                |(engine, clock)| {
                    for _ in 0..8 {
                        clock.advance(16.0);
                        black_box(engine.on_frame());
                    }
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_transform_css(c: &mut Criterion) {
    let t = Transform::from_translation(12.5, -4.0)
        .with(motion_engine::Channel::RotateZ, 45.0)
        .with(motion_engine::Channel::ScaleX, 1.2);
    let css = t.to_css();
    c.bench_function("transform_to_css", |b| b.iter(|| black_box(&t).to_css()));
    c.bench_function("transform_parse", |b| {
        b.iter(|| black_box(css.as_str()).parse::<Transform>())
    });
}

criterion_group!(benches, bench_on_frame, bench_transform_css);
criterion_main!(benches);
