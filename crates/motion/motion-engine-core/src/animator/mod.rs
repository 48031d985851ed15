//! Animators: one contract, four motion models.
//!
//! Every animator walks the same state machine:
//! `Idle → Running ⇄ Paused → {Completed | Errored | Stopped}`. Transitions are
//! idempotent. A terminal outcome is reported from `tick` exactly once; a stop
//! never produces one.

pub mod keyframe;
pub mod physics;
pub mod spring;
pub mod tween;

pub use keyframe::KeyframeAnimator;
pub use physics::PhysicsAnimator;
pub use spring::SpringAnimator;
pub use tween::TweenAnimator;

use serde::{Deserialize, Serialize};

use crate::config::AnimationConfig;
use crate::element::{ElementRef, RenderHint};
use crate::ids::AnimationId;
use crate::transform::{Transform, TransformProcessor};
use crate::AnimationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AnimatorState {
    Idle,
    Running,
    Paused,
    Completed,
    Errored,
    Stopped,
}

impl AnimatorState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Errored => "errored",
            Self::Stopped => "stopped",
        }
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Errored | Self::Stopped)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AnimatorKind {
    Tween,
    Spring,
    Keyframe,
    Physics,
}

/// Result of advancing an animator by one tick
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Still going (including waiting out a delay)
    Running,
    /// Not running: idle, paused or already terminal
    Skipped,
    Completed,
    Errored(AnimationError),
}

/// Everything an animator may touch during a tick
pub struct FrameContext<'a> {
    pub now: f64,
    pub transforms: &'a mut TransformProcessor,
}

impl<'a> FrameContext<'a> {
    pub fn new(now: f64, transforms: &'a mut TransformProcessor) -> Self {
        Self { now, transforms }
    }
}

/// Common animation contract
pub trait Animator {
    fn id(&self) -> AnimationId;

    fn kind(&self) -> AnimatorKind;

    fn element(&self) -> &ElementRef;

    fn state(&self) -> AnimatorState;

    /// Capture the starting transform and begin. No-op unless idle.
    fn start(&mut self, ctx: &mut FrameContext<'_>);

    /// Advance to `ctx.now` and write the element
    fn tick(&mut self, ctx: &mut FrameContext<'_>) -> TickOutcome;

    fn pause(&mut self, now: f64);

    fn resume(&mut self, now: f64);

    /// Cancel without reporting an outcome. Restores render hints.
    fn stop(&mut self, transforms: &mut TransformProcessor);

    /// Completion fraction in `[0, 1]`; approximate for physics
    fn progress(&self) -> f64;

    /// Transform the animation is heading to, if it has one
    fn target(&self) -> Option<Transform>;

    /// Release integration state. The animator must not be ticked afterwards.
    fn dispose(&mut self);

    #[inline]
    fn is_active(&self) -> bool {
        matches!(self.state(), AnimatorState::Running | AnimatorState::Paused)
    }
}

/// State machine plus pause-aware clock shared by every animator
#[derive(Debug, Clone, PartialEq)]
pub struct Lifecycle {
    state: AnimatorState,
    started_at: f64,
    paused_at: Option<f64>,
    paused_total: f64,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: AnimatorState::Idle,
            started_at: 0.0,
            paused_at: None,
            paused_total: 0.0,
        }
    }

    #[inline]
    pub fn state(&self) -> AnimatorState {
        self.state
    }

    /// Returns false when already started
    pub fn start(&mut self, now: f64) -> bool {
        if self.state != AnimatorState::Idle {
            return false;
        }
        self.state = AnimatorState::Running;
        self.started_at = now;
        true
    }

    pub fn pause(&mut self, now: f64) -> bool {
        if self.state != AnimatorState::Running {
            return false;
        }
        self.state = AnimatorState::Paused;
        self.paused_at = Some(now);
        true
    }

    pub fn resume(&mut self, now: f64) -> bool {
        if self.state != AnimatorState::Paused {
            return false;
        }
        if let Some(at) = self.paused_at.take() {
            self.paused_total += (now - at).max(0.0);
        }
        self.state = AnimatorState::Running;
        true
    }

    /// Move to a terminal state. Returns false if already terminal.
    pub fn finish(&mut self, state: AnimatorState) -> bool {
        debug_assert!(state.is_terminal());
        if self.state.is_terminal() {
            return false;
        }
        self.state = state;
        true
    }

    /// Active time since start, excluding pauses
    pub fn elapsed(&self, now: f64) -> f64 {
        let until = self.paused_at.unwrap_or(now);
        (until - self.started_at - self.paused_total).max(0.0)
    }
}

/// Fails with `InvalidElement` when the element is not attached
pub(crate) fn require_attached(element: &ElementRef) -> Result<(), AnimationError> {
    if element.is_attached() {
        Ok(())
    } else {
        Err(AnimationError::InvalidElement {
            reason: "element is not attached to a live surface".to_string(),
        })
    }
}

/// Where an iteration-based animation is at a given time
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimelineSample {
    /// Still in the start delay
    Delayed,
    Active {
        /// Direction-adjusted progress inside the current iteration
        progress: f64,
        overall: f64,
    },
    /// Past the end of the last iteration
    Finished { progress: f64 },
}

/// Delay, repeat and direction handling for Tween and Keyframe
#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    config: AnimationConfig,
}

impl Timeline {
    pub fn new(config: AnimationConfig) -> Self {
        Self { config }
    }

    #[inline]
    pub fn config(&self) -> &AnimationConfig {
        &self.config
    }

    /// Progress of the first frame, honouring direction
    pub fn initial_progress(&self) -> f64 {
        if self.config.direction.is_reversed(0) {
            1.0
        } else {
            0.0
        }
    }

    /// Sample at `elapsed` ms since start (delay included)
    pub fn sample(&self, elapsed: f64) -> TimelineSample {
        let active = elapsed - self.config.delay_ms;
        if active < 0.0 {
            return TimelineSample::Delayed;
        }
        let duration = self.config.duration_ms;
        match self.config.repeat.iterations() {
            Some(iterations) => {
                let total = duration * iterations as f64;
                if active >= total {
                    let last = iterations - 1;
                    let progress = if self.config.direction.is_reversed(last) {
                        0.0
                    } else {
                        1.0
                    };
                    return TimelineSample::Finished { progress };
                }
                let (progress, _) = self.directed(active);
                TimelineSample::Active {
                    progress,
                    overall: (active / total).clamp(0.0, 1.0),
                }
            }
            None => {
                let (progress, local) = self.directed(active);
                TimelineSample::Active {
                    progress,
                    overall: local,
                }
            }
        }
    }

    /// (direction-adjusted, raw) progress inside the iteration containing `active`
    fn directed(&self, active: f64) -> (f64, f64) {
        let duration = self.config.duration_ms;
        let iteration = (active / duration).floor();
        let local = ((active - iteration * duration) / duration).clamp(0.0, 1.0);
        let reversed = self.config.direction.is_reversed(iteration as u64);
        (if reversed { 1.0 - local } else { local }, local)
    }

    /// Render hint to set while writing, per performance mode
    #[inline]
    pub fn render_hint(&self) -> Option<RenderHint> {
        self.config
            .performance_mode
            .uses_render_hints()
            .then_some(RenderHint::Transform)
    }
}
