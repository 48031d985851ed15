use log::debug;

use super::{
    require_attached, Animator, AnimatorKind, AnimatorState, FrameContext, Lifecycle, TickOutcome,
    Timeline, TimelineSample,
};
use crate::config::AnimationConfig;
use crate::easing::ResolvedEasing;
use crate::element::ElementRef;
use crate::ids::AnimationId;
use crate::transform::{Transform, TransformProcessor};
use crate::AnimationError;

/// Eased interpolation from the element's current transform to a target
pub struct TweenAnimator {
    id: AnimationId,
    element: ElementRef,
    timeline: Timeline,
    easing: ResolvedEasing,
    lifecycle: Lifecycle,
    target: Transform,
    from: Transform,
    to: Transform,
    progress: f64,
}

impl TweenAnimator {
    pub fn new(
        id: AnimationId,
        element: ElementRef,
        target: Transform,
        config: AnimationConfig,
        easing: ResolvedEasing,
    ) -> Result<Self, AnimationError> {
        require_attached(&element)?;
        config.validate()?;
        target.validate_finite()?;
        Ok(Self {
            id,
            element,
            timeline: Timeline::new(config),
            easing,
            lifecycle: Lifecycle::new(),
            target,
            from: Transform::new(),
            to: Transform::new(),
            progress: 0.0,
        })
    }

    pub fn config(&self) -> &AnimationConfig {
        self.timeline.config()
    }

    /// Transform at direction-adjusted iteration progress `p`
    fn frame_at(&self, p: f64) -> Transform {
        TransformProcessor::interpolate_transform(&self.from, &self.to, self.easing.ease(p))
    }

    fn write(&self, transforms: &mut TransformProcessor, transform: &Transform) {
        transforms.apply_with_hint(&self.element, transform, self.timeline.render_hint());
    }

    fn fail(&mut self, error: AnimationError) -> TickOutcome {
        if self.lifecycle.finish(AnimatorState::Errored) {
            TickOutcome::Errored(error)
        } else {
            TickOutcome::Skipped
        }
    }
}

impl Animator for TweenAnimator {
    fn id(&self) -> AnimationId {
        self.id
    }

    fn kind(&self) -> AnimatorKind {
        AnimatorKind::Tween
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
        self.from = ctx.transforms.get_current_transform(&self.element);
        self.to = self.from.merged_with(&self.target);
        if self.timeline.config().delay_ms > 0.0 && self.timeline.config().fill_mode.fills_backwards()
        {
            let first = self.frame_at(self.timeline.initial_progress());
            self.write(ctx.transforms, &first);
        }
        debug!("tween {} started", self.id);
    }

    fn tick(&mut self, ctx: &mut FrameContext<'_>) -> TickOutcome {
        if self.lifecycle.state() != AnimatorState::Running {
            return TickOutcome::Skipped;
        }
        if !self.element.is_attached() {
            return self.fail(AnimationError::ElementDetached { id: self.id });
        }

        match self.timeline.sample(self.lifecycle.elapsed(ctx.now)) {
            TimelineSample::Delayed => TickOutcome::Running,
            TimelineSample::Active { progress, overall } => {
                // Never move backwards, even if the clock does
                self.progress = self.progress.max(overall);
                let frame = self.frame_at(progress);
                self.write(ctx.transforms, &frame);
                TickOutcome::Running
            }
            TimelineSample::Finished { progress } => {
                let last = if self.timeline.config().fill_mode.fills_forwards() {
                    self.frame_at(progress)
                } else {
                    self.from.clone()
                };
                self.write(ctx.transforms, &last);
                ctx.transforms.reset_render_hint(&self.element);
                self.progress = 1.0;
                if self.lifecycle.finish(AnimatorState::Completed) {
                    TickOutcome::Completed
                } else {
                    TickOutcome::Skipped
                }
            }
        }
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

    fn progress(&self) -> f64 {
        self.progress
    }

    fn target(&self) -> Option<Transform> {
        Some(if self.to.is_empty() {
            self.target.clone()
        } else {
            self.to.clone()
        })
    }

    fn dispose(&mut self) {
        self.lifecycle.finish(AnimatorState::Stopped);
        self.from = Transform::new();
        self.to = Transform::new();
    }
}
