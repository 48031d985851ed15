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

/// Piecewise interpolation through two or more absolute keyframes.
///
/// The iteration is split into `N - 1` equal segments and the easing is applied
/// to the local progress of each segment.
pub struct KeyframeAnimator {
    id: AnimationId,
    element: ElementRef,
    frames: Vec<Transform>,
    timeline: Timeline,
    easing: ResolvedEasing,
    lifecycle: Lifecycle,
    start_transform: Transform,
    progress: f64,
}

impl KeyframeAnimator {
    pub fn new(
        id: AnimationId,
        element: ElementRef,
        frames: Vec<Transform>,
        config: AnimationConfig,
        easing: ResolvedEasing,
    ) -> Result<Self, AnimationError> {
        require_attached(&element)?;
        if frames.len() < 2 {
            return Err(AnimationError::NotEnoughKeyframes {
                count: frames.len(),
            });
        }
        config.validate()?;
        for frame in &frames {
            frame.validate_finite()?;
        }
        // Cheaper modes trade curve shape for linear segments
        let easing = if config.performance_mode.linear_keyframes() {
            ResolvedEasing::linear()
        } else {
            easing
        };
        Ok(Self {
            id,
            element,
            frames,
            timeline: Timeline::new(config),
            easing,
            lifecycle: Lifecycle::new(),
            start_transform: Transform::new(),
            progress: 0.0,
        })
    }

    #[inline]
    pub fn frames(&self) -> &[Transform] {
        &self.frames
    }

    /// Segment index and local (uneased) progress at iteration progress `p`
    pub fn segment_at(&self, p: f64) -> (usize, f64) {
        let segments = self.frames.len().saturating_sub(1).max(1);
        let scaled = p.clamp(0.0, 1.0) * segments as f64;
        let index = (scaled.floor() as usize).min(segments - 1);
        (index, scaled - index as f64)
    }

    /// Transform at iteration progress `p`
    pub fn sample(&self, p: f64) -> Transform {
        if self.frames.len() < 2 {
            return self.frames.first().cloned().unwrap_or_default();
        }
        let (index, local) = self.segment_at(p);
        let eased = self.easing.ease(local);
        TransformProcessor::interpolate_transform(&self.frames[index], &self.frames[index + 1], eased)
    }

    fn write(&self, transforms: &mut TransformProcessor, transform: &Transform) {
        transforms.apply_with_hint(&self.element, transform, self.timeline.render_hint());
    }
}

impl Animator for KeyframeAnimator {
    fn id(&self) -> AnimationId {
        self.id
    }

    fn kind(&self) -> AnimatorKind {
        AnimatorKind::Keyframe
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
        self.start_transform = ctx.transforms.get_current_transform(&self.element);
        let config = self.timeline.config();
        if config.delay_ms > 0.0 && config.fill_mode.fills_backwards() {
            let first = self.sample(self.timeline.initial_progress());
            self.write(ctx.transforms, &first);
        }
        debug!("keyframes {} started with {} frames", self.id, self.frames.len());
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

        match self.timeline.sample(self.lifecycle.elapsed(ctx.now)) {
            TimelineSample::Delayed => TickOutcome::Running,
            TimelineSample::Active { progress, overall } => {
                self.progress = self.progress.max(overall);
                let frame = self.sample(progress);
                self.write(ctx.transforms, &frame);
                TickOutcome::Running
            }
            TimelineSample::Finished { progress } => {
                let last = if self.timeline.config().fill_mode.fills_forwards() {
                    self.sample(progress)
                } else {
                    self.start_transform.clone()
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
        self.frames.last().cloned()
    }

    fn dispose(&mut self) {
        self.lifecycle.finish(AnimatorState::Stopped);
        self.frames.clear();
        self.frames.shrink_to_fit();
    }
}
