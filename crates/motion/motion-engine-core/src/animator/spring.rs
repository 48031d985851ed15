use log::debug;

use super::{
    require_attached, Animator, AnimatorKind, AnimatorState, FrameContext, Lifecycle, TickOutcome,
};
use crate::config::{PerformanceMode, SpringConfig};
use crate::element::{ElementRef, RenderHint};
use crate::ids::AnimationId;
use crate::transform::{Channel, Transform, TransformProcessor};
use crate::AnimationError;

/// Integration step, one display refresh at 60 Hz
pub const SPRING_TIMESTEP_S: f64 = 1.0 / 60.0;

#[derive(Debug, Clone, Copy, PartialEq)]
struct ChannelState {
    channel: Channel,
    position: f64,
    velocity: f64,
    target: f64,
    initial_distance: f64,
    at_rest: bool,
}

impl ChannelState {
    fn snap(&mut self) {
        self.position = self.target;
        self.velocity = 0.0;
        self.at_rest = true;
    }
}

/// Hooke's-law spring per channel toward a target transform
pub struct SpringAnimator {
    id: AnimationId,
    element: ElementRef,
    config: SpringConfig,
    delay_ms: f64,
    render_hint: Option<RenderHint>,
    lifecycle: Lifecycle,
    target: Transform,
    base: Transform,
    channels: Vec<ChannelState>,
    last_written: Vec<f64>,
    iterations: u32,
}

impl SpringAnimator {
    pub fn new(
        id: AnimationId,
        element: ElementRef,
        target: Transform,
        config: SpringConfig,
        delay_ms: f64,
        performance_mode: PerformanceMode,
    ) -> Result<Self, AnimationError> {
        require_attached(&element)?;
        config.validate()?;
        target.validate_finite()?;
        Ok(Self {
            id,
            element,
            config,
            delay_ms: delay_ms.max(0.0),
            render_hint: performance_mode
                .uses_render_hints()
                .then_some(RenderHint::Transform),
            lifecycle: Lifecycle::new(),
            target,
            base: Transform::new(),
            channels: Vec::new(),
            last_written: Vec::new(),
            iterations: 0,
        })
    }

    #[inline]
    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Current position and velocity of one channel
    pub fn channel_state(&self, channel: Channel) -> Option<(f64, f64)> {
        self.channels
            .iter()
            .find(|c| c.channel == channel)
            .map(|c| (c.position, c.velocity))
    }

    fn is_at_rest(&self, position: f64, velocity: f64, target: f64) -> bool {
        (position - target).abs() <= self.config.rest_displacement_threshold
            && velocity.abs() <= self.config.rest_velocity_threshold
    }

    /// One semi-implicit Euler step: velocity first, then position
    fn integrate(&mut self) {
        let SpringConfig {
            tension,
            friction,
            mass,
            clamp,
            ..
        } = self.config;
        for i in 0..self.channels.len() {
            let mut state = self.channels[i];
            if state.at_rest {
                continue;
            }
            let displacement = state.position - state.target;
            let force = -tension * displacement - friction * state.velocity;
            state.velocity += force / mass * SPRING_TIMESTEP_S;
            state.position += state.velocity * SPRING_TIMESTEP_S;

            let crossed = (state.position - state.target).signum() != displacement.signum();
            if clamp && crossed {
                state.snap();
            } else if self.is_at_rest(state.position, state.velocity, state.target) {
                state.snap();
            }
            self.channels[i] = state;
        }
    }

    fn current_transform(&self) -> Transform {
        let mut out = self.base.clone();
        for state in &self.channels {
            out.set(state.channel, state.position);
        }
        out
    }

    /// Write unless every channel moved less than `precision` since the last write
    fn write(&mut self, transforms: &mut TransformProcessor, force: bool) {
        let moved = self.last_written.len() != self.channels.len()
            || self
                .channels
                .iter()
                .zip(&self.last_written)
                .any(|(state, last)| (state.position - last).abs() >= self.config.precision);
        if !(moved || force) {
            return;
        }
        let transform = self.current_transform();
        transforms.apply_with_hint(&self.element, &transform, self.render_hint);
        self.last_written = self.channels.iter().map(|c| c.position).collect();
    }

    fn complete(&mut self, transforms: &mut TransformProcessor) -> TickOutcome {
        self.write(transforms, true);
        transforms.reset_render_hint(&self.element);
        if self.lifecycle.finish(AnimatorState::Completed) {
            debug!("spring {} settled after {} steps", self.id, self.iterations);
            TickOutcome::Completed
        } else {
            TickOutcome::Skipped
        }
    }
}

impl Animator for SpringAnimator {
    fn id(&self) -> AnimationId {
        self.id
    }

    fn kind(&self) -> AnimatorKind {
        AnimatorKind::Spring
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
        let velocity = self.config.velocity;
        self.channels = self
            .target
            .channels()
            .map(|(channel, target)| {
                let position = self.base.value(channel);
                ChannelState {
                    channel,
                    position,
                    velocity,
                    target,
                    initial_distance: (target - position).abs(),
                    at_rest: false,
                }
            })
            .collect();
        for i in 0..self.channels.len() {
            let c = self.channels[i];
            if self.is_at_rest(c.position, c.velocity, c.target) {
                self.channels[i].snap();
            }
        }
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
        if self.lifecycle.elapsed(ctx.now) < self.delay_ms {
            return TickOutcome::Running;
        }

        self.iterations += 1;
        if self.iterations > self.config.max_iterations {
            debug!(
                "spring {} hit the {}-step cap; snapping to target",
                self.id, self.config.max_iterations
            );
            self.channels.iter_mut().for_each(ChannelState::snap);
            return self.complete(ctx.transforms);
        }

        self.integrate();
        if self.channels.iter().all(|c| c.at_rest) {
            return self.complete(ctx.transforms);
        }
        self.write(ctx.transforms, false);
        TickOutcome::Running
    }

    fn pause(&mut self, now: f64) {
        self.lifecycle.pause(now);
    }

    fn resume(&mut self, now: f64) {
        self.lifecycle.resume(now);
    }

    fn stop(&mut self, transforms: &mut TransformProcessor) {
        if self.lifecycle.finish(AnimatorState::Stopped) {
            transforms.reset_render_hint(&self.element);
        }
    }

    /// Fraction of the starting distance covered by the slowest channel
    fn progress(&self) -> f64 {
        if self.lifecycle.state() == AnimatorState::Completed {
            return 1.0;
        }
        self.channels
            .iter()
            .map(|c| {
                if c.at_rest || c.initial_distance == 0.0 {
                    1.0
                } else {
                    1.0 - (c.position - c.target).abs() / c.initial_distance
                }
            })
            .fold(1.0f64, f64::min)
            .clamp(0.0, 1.0)
    }

    fn target(&self) -> Option<Transform> {
        Some(self.base.merged_with(&self.target))
    }

    fn dispose(&mut self) {
        self.lifecycle.finish(AnimatorState::Stopped);
        self.channels.clear();
        self.last_written.clear();
    }
}
