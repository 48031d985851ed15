use log::debug;

use super::{
    require_attached, Animator, AnimatorKind, AnimatorState, FrameContext, Lifecycle, TickOutcome,
};
use crate::config::{Boundary, PerformanceMode, PhysicsConfig};
use crate::element::{ElementRef, RenderHint, Viewport};
use crate::ids::AnimationId;
use crate::transform::{Channel, Transform, TransformProcessor};
use crate::AnimationError;

/// Largest step integrated at once; longer gaps are treated as a stall
pub const MAX_PHYSICS_STEP_S: f64 = 1.0 / 15.0;

/// Reference frame rate air resistance is expressed against
const AIR_REFERENCE_FPS: f64 = 60.0;

/// Position and velocity of the body, in translation space
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Body {
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
}

impl Body {
    #[inline]
    pub fn speed(&self) -> f64 {
        self.vx.hypot(self.vy)
    }
}

/// Free-body motion of an element's translation under gravity, drag and walls
pub struct PhysicsAnimator {
    id: AnimationId,
    element: ElementRef,
    config: PhysicsConfig,
    viewport: Viewport,
    delay_ms: f64,
    render_hint: Option<RenderHint>,
    lifecycle: Lifecycle,
    base: Transform,
    body: Body,
    bounds: Boundary,
    last_tick: Option<f64>,
    progress: f64,
}

impl PhysicsAnimator {
    pub fn new(
        id: AnimationId,
        element: ElementRef,
        config: PhysicsConfig,
        viewport: Viewport,
        delay_ms: f64,
        performance_mode: PerformanceMode,
    ) -> Result<Self, AnimationError> {
        require_attached(&element)?;
        config.validate()?;
        if let Some(bounds) = &config.bounds {
            bounds.validate()?;
        }
        Ok(Self {
            id,
            element,
            body: Body {
                vx: config.initial_velocity_x,
                vy: config.initial_velocity_y,
                ..Body::default()
            },
            config,
            viewport,
            delay_ms: delay_ms.max(0.0),
            render_hint: performance_mode
                .uses_render_hints()
                .then_some(RenderHint::Transform),
            lifecycle: Lifecycle::new(),
            base: Transform::new(),
            bounds: Boundary::new(0.0, 0.0, 0.0, 0.0),
            last_tick: None,
            progress: 0.0,
        })
    }

    #[inline]
    pub fn body(&self) -> Body {
        self.body
    }

    #[inline]
    pub fn bounds(&self) -> Boundary {
        self.bounds
    }

    /// Advance by `dt` seconds. Returns whether the body touches the floor.
    fn step(&mut self, dt: f64) -> bool {
        let PhysicsConfig {
            gravity,
            friction,
            restitution,
            air_resistance,
            max_velocity,
            ..
        } = self.config;
        let body = &mut self.body;

        body.vy += gravity * dt;
        let drag = (1.0 - air_resistance).powf(dt * AIR_REFERENCE_FPS);
        body.vx *= drag;
        body.vy *= drag;

        let speed = body.speed();
        if speed > max_velocity {
            let scale = max_velocity / speed;
            body.vx *= scale;
            body.vy *= scale;
        }

        body.x += body.vx * dt;
        body.y += body.vy * dt;

        let b = self.bounds;
        if body.x < b.left {
            body.x = b.left;
            body.vx = body.vx.abs() * restitution;
        } else if body.x > b.right {
            body.x = b.right;
            body.vx = -body.vx.abs() * restitution;
        }
        if body.y < b.top {
            body.y = b.top;
            body.vy = body.vy.abs() * restitution;
        }
        if body.y >= b.bottom {
            body.y = b.bottom;
            body.vy = -body.vy.abs() * restitution;
            body.vx *= 1.0 - friction;
            return true;
        }
        false
    }

    fn write(&self, transforms: &mut TransformProcessor) {
        let frame = self
            .base
            .clone()
            .with(Channel::TranslateX, self.body.x)
            .with(Channel::TranslateY, self.body.y);
        transforms.apply_with_hint(&self.element, &frame, self.render_hint);
    }

    fn complete(&mut self, transforms: &mut TransformProcessor) -> TickOutcome {
        self.write(transforms);
        transforms.reset_render_hint(&self.element);
        self.progress = 1.0;
        if self.lifecycle.finish(AnimatorState::Completed) {
            debug!(
                "physics {} settled at ({:.1}, {:.1})",
                self.id, self.body.x, self.body.y
            );
            TickOutcome::Completed
        } else {
            TickOutcome::Skipped
        }
    }
}

impl Animator for PhysicsAnimator {
    fn id(&self) -> AnimationId {
        self.id
    }

    fn kind(&self) -> AnimatorKind {
        AnimatorKind::Physics
    }

    fn element(&self) -> &ElementRef {
        &self.element
    }

    fn state(&self) -> AnimatorState {
        self.lifecycle.state()
    }

    fn start(&mut self, ctx: &mut FrameContext<'_>) {
        if !self.lifecycle.start(ctx.now) {
            return;
        }
        self.base = ctx.transforms.get_current_transform(&self.element);
        self.body.x = self.base.value(Channel::TranslateX);
        self.body.y = self.base.value(Channel::TranslateY);

        self.bounds = match self.config.bounds {
            Some(bounds) => bounds,
            None => {
                // Layout box without the translation we are about to drive
                let layout = self
                    .element
                    .bounding_rect()
                    .translated(-self.body.x, -self.body.y);
                let b = Boundary::containing(&layout, &self.viewport.rect());
                // An element larger than the surface gets a degenerate range
                Boundary::new(b.top, b.right.max(b.left), b.bottom.max(b.top), b.left)
            }
        };
        self.body.x = self.body.x.clamp(self.bounds.left, self.bounds.right);
        self.body.y = self.body.y.clamp(self.bounds.top, self.bounds.bottom);
        self.last_tick = Some(ctx.now);
        debug!("physics {} started within {:?}", self.id, self.bounds);
    }

    fn tick(&mut self, ctx: &mut FrameContext<'_>) -> TickOutcome {
        if self.lifecycle.state() != AnimatorState::Running {
            return TickOutcome::Skipped;
        }
        if !self.element.is_attached() {
            return if self.lifecycle.finish(AnimatorState::Errored) {
                TickOutcome::Errored(AnimationError::ElementDetached { id: self.id })
            } else {
                TickOutcome::Skipped
            };
        }

        let active = self.lifecycle.elapsed(ctx.now) - self.delay_ms;
        let last = self.last_tick.replace(ctx.now).unwrap_or(ctx.now);
        if active < 0.0 {
            return TickOutcome::Running;
        }

        let cap = self.config.time_cap_ms();
        let dt = ((ctx.now - last) / 1000.0).clamp(0.0, MAX_PHYSICS_STEP_S);
        let on_floor = self.step(dt);
        self.progress = self.progress.max((active / cap).clamp(0.0, 1.0));

        let resting = self.body.speed() < self.config.min_velocity
            && (on_floor || self.config.gravity == 0.0);
        if resting {
            self.body.vx = 0.0;
            self.body.vy = 0.0;
            return self.complete(ctx.transforms);
        }
        if active >= cap {
            return self.complete(ctx.transforms);
        }
        self.write(ctx.transforms);
        TickOutcome::Running
    }

    fn pause(&mut self, now: f64) {
        self.lifecycle.pause(now);
    }

    fn resume(&mut self, now: f64) {
        if self.lifecycle.resume(now) {
            // Paused time must not be integrated
            self.last_tick = Some(now);
        }
    }

    fn stop(&mut self, transforms: &mut TransformProcessor) {
        if self.lifecycle.finish(AnimatorState::Stopped) {
            transforms.reset_render_hint(&self.element);
        }
    }

    fn progress(&self) -> f64 {
        self.progress
    }

    fn target(&self) -> Option<Transform> {
        None
    }

    fn dispose(&mut self) {
        self.lifecycle.finish(AnimatorState::Stopped);
        self.body = Body::default();
        self.last_tick = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PHYSICS_HARD_CAP_MS;
    use crate::element::HeadlessElement;
    use crate::time::ManualClock;
    use approx::assert_abs_diff_eq;
    use std::rc::Rc;

    fn run(config: PhysicsConfig, frames: usize) -> (PhysicsAnimator, Rc<HeadlessElement>, Option<f64>) {
        let clock = ManualClock::new();
        let mut processor = TransformProcessor::new(Rc::new(clock.clone()), 100.0, 16);
        let headless = HeadlessElement::boxed();
        let mut physics = PhysicsAnimator::new(
            AnimationId(11),
            headless.clone(),
            config,
            Viewport::default(),
            0.0,
            PerformanceMode::Quality,
        )
        .unwrap();
        physics.start(&mut FrameContext::new(0.0, &mut processor));
        for frame in 1..=frames {
            let now = frame as f64 * 16.0;
            if physics.tick(&mut FrameContext::new(now, &mut processor)) == TickOutcome::Completed {
                return (physics, headless, Some(now));
            }
        }
        (physics, headless, None)
    }

    #[test]
    fn dropped_body_comes_to_rest_on_the_floor() {
        let (physics, headless, done_at) = run(PhysicsConfig::default(), 1000);
        let done_at = done_at.expect("body never settled");
        assert!(done_at < 10_000.0);
        // 720 high viewport minus the 100 px box
        assert_eq!(physics.bounds().bottom, 620.0);
        assert_abs_diff_eq!(physics.body().y, 620.0);
        assert_eq!(physics.body().speed(), 0.0);
        assert_abs_diff_eq!(
            headless.current_transform().value(Channel::TranslateY),
            620.0,
            epsilon = 1e-9
        );
        assert_eq!(physics.progress(), 1.0);
    }

    #[test]
    fn walls_keep_the_body_inside() {
        let config = PhysicsConfig {
            gravity: 0.0,
            air_resistance: 0.0,
            restitution: 1.0,
            max_duration_ms: 2_000.0,
            ..PhysicsConfig::default()
        }
        .with_velocity(4000.0, -3000.0)
        .with_bounds(Boundary::new(0.0, 300.0, 200.0, 0.0));
        let clock = ManualClock::new();
        let mut processor = TransformProcessor::new(Rc::new(clock.clone()), 100.0, 16);
        let mut physics = PhysicsAnimator::new(
            AnimationId(12),
            HeadlessElement::boxed(),
            config,
            Viewport::default(),
            0.0,
            PerformanceMode::Quality,
        )
        .unwrap();
        physics.start(&mut FrameContext::new(0.0, &mut processor));
        for frame in 1..=60 {
            physics.tick(&mut FrameContext::new(frame as f64 * 16.0, &mut processor));
            let body = physics.body();
            assert!((0.0..=300.0).contains(&body.x));
            assert!((0.0..=200.0).contains(&body.y));
        }
    }

    #[test]
    fn max_duration_caps_a_body_that_never_rests() {
        let config = PhysicsConfig {
            gravity: 0.0,
            air_resistance: 0.0,
            max_duration_ms: 500.0,
            ..PhysicsConfig::default()
        }
        .with_velocity(100.0, 0.0);
        let (physics, _, done_at) = run(config, 100);
        assert_eq!(done_at, Some(512.0));
        assert!(physics.body().speed() > 0.0);
    }

    #[test]
    fn oversized_max_duration_stops_at_the_hard_cap() {
        let config = PhysicsConfig {
            gravity: 0.0,
            air_resistance: 0.0,
            restitution: 1.0,
            friction: 0.0,
            max_duration_ms: 60_000.0,
            bounds: Some(Boundary::new(0.0, 300.0, 200.0, 0.0)),
            ..PhysicsConfig::default()
        }
        .with_velocity(400.0, 250.0);
        config.validate().expect("long caps are still legal");
        assert_eq!(config.time_cap_ms(), PHYSICS_HARD_CAP_MS);

        let (physics, _, done_at) = run(config, 2_000);
        // First 16 ms frame at or past 10 s
        assert_eq!(done_at, Some(10_000.0));
        assert!(physics.body().speed() > 0.0);
        assert_eq!(physics.progress(), 1.0);
    }

    #[test]
    fn long_frame_gaps_are_clamped() {
        let clock = ManualClock::new();
        let mut processor = TransformProcessor::new(Rc::new(clock.clone()), 100.0, 16);
        let mut physics = PhysicsAnimator::new(
            AnimationId(13),
            HeadlessElement::boxed(),
            PhysicsConfig {
                air_resistance: 0.0,
                ..PhysicsConfig::default()
            },
            Viewport::default(),
            0.0,
            PerformanceMode::Quality,
        )
        .unwrap();
        physics.start(&mut FrameContext::new(0.0, &mut processor));
        physics.tick(&mut FrameContext::new(5_000.0, &mut processor));
        assert_abs_diff_eq!(physics.body().vy, 980.0 * MAX_PHYSICS_STEP_S, epsilon = 1e-9);
    }

    #[test]
    fn rejects_out_of_range_restitution() {
        let result = PhysicsAnimator::new(
            AnimationId(14),
            HeadlessElement::boxed(),
            PhysicsConfig::default().with_restitution(1.5),
            Viewport::default(),
            0.0,
            PerformanceMode::Quality,
        );
        assert!(matches!(result, Err(AnimationError::InvalidConfig { .. })));
    }
}
