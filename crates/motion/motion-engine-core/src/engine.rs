//! Motion engine orchestrator: creation entry points and the frame loop.
//!
//! The engine owns the animation queue and the lifetime of a single frame loop.
//! Hosts install a [`FrameRequester`] (or poll [`MotionEngine::is_frame_loop_armed`])
//! and call [`MotionEngine::on_frame`] once per display refresh while a frame is
//! requested. The loop tears itself down when there is no work left and is re-armed
//! lazily by the next creation call.

use std::rc::Rc;

use hashbrown::HashMap;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::animator::{
    require_attached, Animator, AnimatorState, FrameContext, KeyframeAnimator, PhysicsAnimator,
    SpringAnimator, TickOutcome, TweenAnimator,
};
use crate::config::{AnimationConfig, AnimationOptions, EngineConfig, PhysicsConfig, SpringConfig};
use crate::easing::EasingLibrary;
use crate::element::{ElementRef, Viewport};
use crate::event::{
    AnimationEvent, AnimationOutcome, Completion, CompletionSender, EngineNotice, EventFeed,
    EventKind,
};
use crate::ids::{AnimationId, ErrorId, IdAllocator};
use crate::profiler::{
    FrameReport, ListenerId, MemorySampler, MetricsListener, PerformanceMetrics,
    PerformanceProfiler,
};
use crate::recovery::{
    ErrorContext, ErrorRecord, ErrorType, Notifier, RecoveryManager, RecoveryOutcome,
    RecoveryReport, Severity,
};
use crate::scheduler::{AnimationQueueItem, AnimationScheduler, BandCounts, FinishedItem};
use crate::time::{ClockRef, SystemClock};
use crate::transform::{Transform, TransformProcessor};
use crate::AnimationError;

/// Host hook that schedules one call to [`MotionEngine::on_frame`] at the next
/// display refresh.
pub trait FrameRequester {
    fn request_frame(&mut self);
}

impl<F: FnMut()> FrameRequester for F {
    fn request_frame(&mut self) {
        self()
    }
}

/// Host visibility signal (e.g. a browser tab being hidden)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Visibility {
    Visible,
    Hidden,
}

/// Snapshot of engine health for dashboards and debugging
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineDiagnostics {
    pub queue_depth: usize,
    pub bands: BandCounts,
    pub max_concurrent: usize,
    pub frame_budget_ms: f64,
    pub dropped_frames: u64,
    pub frames: u64,
    pub frame_loop_armed: bool,
    pub visibility: Visibility,
    pub latest: Option<PerformanceMetrics>,
    pub average: Option<PerformanceMetrics>,
    pub performance_score: f64,
    pub performance_good: bool,
    pub errors_by_type: Vec<(ErrorType, u64)>,
    pub errors_by_severity: Vec<(Severity, u64)>,
    pub total_errors: u64,
    pub pending_recoveries: usize,
    pub braking: bool,
    pub transform_cache_entries: usize,
    pub transform_cache_hit_rate: f64,
    pub easing_fallbacks: u64,
    pub dropped_events: u64,
}

struct Tracked {
    completion: Completion,
    sender: CompletionSender,
}

pub struct MotionEngine {
    config: EngineConfig,
    clock: ClockRef,
    ids: IdAllocator,
    easings: EasingLibrary,
    transforms: TransformProcessor,
    scheduler: AnimationScheduler,
    profiler: PerformanceProfiler,
    recovery: RecoveryManager,
    events: EventFeed,
    tracked: HashMap<AnimationId, Tracked>,
    requester: Option<Box<dyn FrameRequester>>,
    loop_armed: bool,
    loop_running: bool,
    visibility: Visibility,
    frames: u64,
    degraded_frames: u32,
}

impl MotionEngine {
    /// Create an engine after validating `config`
    pub fn new(config: EngineConfig, clock: ClockRef) -> Result<Self, AnimationError> {
        config.validate()?;
        Ok(Self::build(config, clock))
    }

    /// Default configuration on the system clock
    pub fn with_defaults() -> Self {
        Self::build(EngineConfig::default(), Rc::new(SystemClock::new()))
    }

    fn build(config: EngineConfig, clock: ClockRef) -> Self {
        let cache = &config.transform_cache;
        Self {
            ids: IdAllocator::new(),
            easings: EasingLibrary::new(config.easing_cache_size),
            transforms: TransformProcessor::new(clock.clone(), cache.ttl_ms, cache.capacity),
            scheduler: AnimationScheduler::new(
                config.scheduler.clone(),
                clock.clone(),
                config.viewport,
            ),
            profiler: PerformanceProfiler::new(config.profiler.clone(), clock.clone()),
            recovery: RecoveryManager::new(config.recovery.clone()),
            events: EventFeed::new(config.max_events),
            tracked: HashMap::new(),
            requester: None,
            loop_armed: false,
            loop_running: false,
            visibility: Visibility::Visible,
            frames: 0,
            degraded_frames: 0,
            clock,
            config,
        }
    }

    pub fn set_frame_requester(&mut self, requester: impl FrameRequester + 'static) {
        self.requester = Some(Box::new(requester));
    }

    // ---- creation -------------------------------------------------------

    /// Tween `element` from its current transform to `target`.
    ///
    /// Channels absent from `target` keep their current value.
    pub fn animate_element(
        &mut self,
        element: ElementRef,
        target: Transform,
        options: AnimationOptions,
    ) -> Result<Completion, AnimationError> {
        let now = self.clock.now_ms();
        let config = self.resolve_options(&options, now)?;
        if self.snaps_instantly(&config) {
            require_attached(&element)?;
            target.validate_finite()?;
            let id = self.ids.alloc_animation();
            self.snap(&element, &target);
            return Ok(self.finish_instantly(id, now));
        }
        let easing = self.easings.resolve(&config.easing)?;
        let id = self.ids.alloc_animation();
        let animator = TweenAnimator::new(id, element.clone(), target, config.clone(), easing)?;
        Ok(self.register(Box::new(animator), element, config, now))
    }

    /// Spring `element` toward `target`. `spring` defaults to the engine's spring config.
    pub fn create_spring_animation(
        &mut self,
        element: ElementRef,
        target: Transform,
        spring: Option<SpringConfig>,
        options: AnimationOptions,
    ) -> Result<AnimationId, AnimationError> {
        let now = self.clock.now_ms();
        let config = self.resolve_options(&options, now)?;
        let spring = spring.unwrap_or_else(|| self.config.spring.clone());
        let id = self.ids.alloc_animation();
        let animator = SpringAnimator::new(
            id,
            element.clone(),
            target.clone(),
            spring,
            config.delay_ms,
            config.performance_mode,
        )?;
        if self.snaps_instantly(&config) || self.recovery.is_braking(now) {
            self.snap(&element, &target);
            self.finish_instantly(id, now);
            return Ok(id);
        }
        self.register(Box::new(animator), element, config, now);
        Ok(id)
    }

    /// Interpolate `element` through absolute `frames` split into equal segments
    pub fn create_keyframe_animation(
        &mut self,
        element: ElementRef,
        frames: Vec<Transform>,
        options: AnimationOptions,
    ) -> Result<AnimationId, AnimationError> {
        let now = self.clock.now_ms();
        let config = self.resolve_options(&options, now)?;
        let easing = self.easings.resolve(&config.easing)?;
        let id = self.ids.alloc_animation();
        let animator = KeyframeAnimator::new(id, element.clone(), frames, config.clone(), easing)?;
        if self.snaps_instantly(&config) {
            if let Some(last) = animator.frames().last() {
                self.snap(&element, last);
            }
            self.finish_instantly(id, now);
            return Ok(id);
        }
        self.register(Box::new(animator), element, config, now);
        Ok(id)
    }

    /// Throw `element` as a free body. `physics` defaults to the engine's physics config.
    pub fn create_physics_animation(
        &mut self,
        element: ElementRef,
        physics: Option<PhysicsConfig>,
        options: AnimationOptions,
    ) -> Result<AnimationId, AnimationError> {
        let now = self.clock.now_ms();
        let config = self.resolve_options(&options, now)?;
        let mut physics = physics.unwrap_or_else(|| self.config.physics.clone());
        if let Some(ms) = self.recovery.duration_override(now) {
            physics.max_duration_ms = ms;
        }
        let id = self.ids.alloc_animation();
        let animator = PhysicsAnimator::new(
            id,
            element.clone(),
            physics,
            self.config.viewport,
            config.delay_ms,
            config.performance_mode,
        )?;
        if self.snaps_instantly(&config) {
            // No destination to snap to: the body simply stays put
            self.finish_instantly(id, now);
            return Ok(id);
        }
        self.register(Box::new(animator), element, config, now);
        Ok(id)
    }

    /// Merge `options` over the engine defaults, honouring the emergency brake
    fn resolve_options(
        &self,
        options: &AnimationOptions,
        now: f64,
    ) -> Result<AnimationConfig, AnimationError> {
        let mut config = options.resolve(&self.config.animation)?;
        if let Some(ms) = self.recovery.duration_override(now) {
            config.duration_ms = ms;
            config.delay_ms = 0.0;
        }
        Ok(config)
    }

    #[inline]
    fn snaps_instantly(&self, config: &AnimationConfig) -> bool {
        self.config.reduced_motion || config.reduced_motion
    }

    fn snap(&mut self, element: &ElementRef, target: &Transform) {
        let current = self.transforms.get_current_transform(element);
        self.transforms
            .apply_transform_instantly(element, &current.merged_with(target));
    }

    fn finish_instantly(&mut self, id: AnimationId, now: f64) -> Completion {
        debug!("{id} completed instantly");
        self.events
            .push(AnimationEvent::new(id, EventKind::Started, now));
        self.events
            .push(AnimationEvent::new(id, EventKind::Completed, now));
        Completion::resolved(id, AnimationOutcome::Completed)
    }

    fn register(
        &mut self,
        mut animator: Box<dyn Animator>,
        element: ElementRef,
        config: AnimationConfig,
        now: f64,
    ) -> Completion {
        let id = animator.id();
        animator.start(&mut FrameContext::new(now, &mut self.transforms));
        self.events
            .push(AnimationEvent::new(id, EventKind::Started, now));

        let (completion, sender) = Completion::pending(id);
        self.tracked.insert(
            id,
            Tracked {
                completion: completion.clone(),
                sender,
            },
        );
        self.scheduler.add(AnimationQueueItem {
            id,
            animator,
            priority: config.priority,
            enqueued_at: now,
            element,
            config,
        });
        if self.visibility == Visibility::Hidden {
            if let Some(item) = self.scheduler.get_mut(id) {
                item.animator.pause(now);
            }
        } else {
            self.arm();
        }
        completion
    }

    /// Completion handle of a queued animation
    pub fn completion(&self, id: AnimationId) -> Option<Completion> {
        self.tracked.get(&id).map(|t| t.completion.clone())
    }

    fn resolve(&mut self, id: AnimationId, outcome: AnimationOutcome) {
        if let Some(tracked) = self.tracked.remove(&id) {
            tracked.sender.resolve(outcome);
        }
    }

    // ---- control --------------------------------------------------------

    /// Cancel one animation. It performs no further writes and never reports
    /// Completed or Errored.
    pub fn stop_animation(&mut self, id: AnimationId) -> Result<(), AnimationError> {
        let item = self
            .scheduler
            .remove(id)
            .ok_or(AnimationError::AnimationNotFound { id })?;
        let now = self.clock.now_ms();
        self.stop_item(item, now);
        if !self.has_work() {
            self.teardown();
        }
        Ok(())
    }

    /// Cancel everything. Returns how many animations were stopped.
    pub fn stop_all_animations(&mut self) -> usize {
        let now = self.clock.now_ms();
        let items = self.scheduler.drain();
        let count = items.len();
        for item in items {
            self.stop_item(item, now);
        }
        if !self.has_work() {
            self.teardown();
        }
        count
    }

    fn stop_item(&mut self, mut item: AnimationQueueItem, now: f64) {
        item.animator.stop(&mut self.transforms);
        item.animator.dispose();
        debug!("{} stopped", item.id);
        self.events
            .push(AnimationEvent::new(item.id, EventKind::Stopped, now));
        self.resolve(item.id, AnimationOutcome::Stopped);
    }

    pub fn pause_animation(&mut self, id: AnimationId) -> Result<(), AnimationError> {
        let now = self.clock.now_ms();
        let item = self
            .scheduler
            .get_mut(id)
            .ok_or(AnimationError::AnimationNotFound { id })?;
        if item.animator.state() == AnimatorState::Running {
            item.animator.pause(now);
            self.events
                .push(AnimationEvent::new(id, EventKind::Paused, now));
        }
        Ok(())
    }

    pub fn resume_animation(&mut self, id: AnimationId) -> Result<(), AnimationError> {
        let now = self.clock.now_ms();
        let item = self
            .scheduler
            .get_mut(id)
            .ok_or(AnimationError::AnimationNotFound { id })?;
        if item.animator.state() == AnimatorState::Paused {
            item.animator.resume(now);
            self.events
                .push(AnimationEvent::new(id, EventKind::Resumed, now));
            self.arm();
        }
        Ok(())
    }

    /// Pause every running animation
    pub fn pause_all(&mut self) -> usize {
        let now = self.clock.now_ms();
        let paused = self.scheduler.pause_all(now);
        for id in &paused {
            self.events
                .push(AnimationEvent::new(*id, EventKind::Paused, now));
        }
        paused.len()
    }

    /// Resume every paused animation
    pub fn resume_all(&mut self) -> usize {
        let now = self.clock.now_ms();
        let resumed = self.scheduler.resume_all(now);
        for id in &resumed {
            self.events
                .push(AnimationEvent::new(*id, EventKind::Resumed, now));
        }
        if !resumed.is_empty() {
            self.arm();
        }
        resumed.len()
    }

    /// Hidden pauses everything, visible resumes it
    pub fn set_visibility(&mut self, visibility: Visibility) {
        if self.visibility == visibility {
            return;
        }
        self.visibility = visibility;
        match visibility {
            Visibility::Hidden => {
                let paused = self.pause_all();
                debug!("surface hidden, paused {paused} animations");
            }
            Visibility::Visible => {
                let resumed = self.resume_all();
                debug!("surface visible, resumed {resumed} animations");
            }
        }
    }

    #[inline]
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.config.viewport = viewport;
        self.scheduler.set_viewport(viewport);
    }

    pub fn set_reduced_motion(&mut self, reduced: bool) {
        self.config.reduced_motion = reduced;
    }

    // ---- frame loop -----------------------------------------------------

    /// Whether a frame has been requested and not yet delivered
    #[inline]
    pub fn is_frame_loop_armed(&self) -> bool {
        self.loop_armed
    }

    fn arm(&mut self) {
        if self.loop_armed {
            return;
        }
        self.loop_armed = true;
        if !self.loop_running {
            debug!("frame loop armed");
            self.loop_running = true;
        }
        if let Some(requester) = self.requester.as_mut() {
            requester.request_frame();
        }
    }

    fn teardown(&mut self) {
        if self.loop_running {
            debug!("frame loop idle after {} frames", self.frames);
            self.loop_running = false;
            self.profiler.reset_timing();
        }
    }

    /// Running animators or recovery steps still to come
    fn has_work(&self) -> bool {
        self.scheduler
            .iter()
            .any(|item| item.animator.state() == AnimatorState::Running)
            || self.recovery.pending_count() > 0
    }

    /// Run one frame. Returns the frame's metrics, or `None` when the loop was idle.
    pub fn on_frame(&mut self) -> Option<PerformanceMetrics> {
        self.loop_armed = false;
        if !self.has_work() {
            self.teardown();
            return None;
        }
        let now = self.clock.now_ms();
        self.frames += 1;
        self.profiler.begin_frame();

        let tick = self.scheduler.tick(now, &mut self.transforms);
        for finished in tick.finished {
            self.finish(finished, now);
        }

        for (element, error) in self.transforms.take_parse_failures() {
            self.recovery
                .report(error, ErrorContext::for_element(element), now);
        }
        for report in self.recovery.poll(now, &mut self.transforms) {
            self.handle_recovery(report, now);
        }

        if self.frames % self.config.transform_cache.purge_interval_frames == 0 {
            let purged = self.transforms.purge_detached();
            if purged > 0 {
                debug!("purged {purged} stale transform cache entries");
            }
        }

        self.watch_degradation(tick.over_budget, tick.elapsed_ms, now);

        let metrics = self.profiler.end_frame(FrameReport {
            active_animations: self.scheduler.len(),
            dropped_frames: self.scheduler.dropped_frames(),
            render: self.transforms.take_frame_stats(),
        });

        if self.has_work() {
            self.arm();
        } else {
            self.teardown();
        }
        metrics
    }

    fn finish(&mut self, finished: FinishedItem, now: f64) {
        let FinishedItem { mut item, outcome } = finished;
        match outcome {
            TickOutcome::Completed => {
                debug!("{} completed", item.id);
                self.events
                    .push(AnimationEvent::new(item.id, EventKind::Completed, now));
                self.resolve(item.id, AnimationOutcome::Completed);
            }
            TickOutcome::Errored(error) => {
                let context = ErrorContext::for_animation(
                    item.id,
                    item.element.clone(),
                    item.animator.target(),
                );
                self.recovery.report(error.clone(), context, now);
                self.events.push(AnimationEvent::new(
                    item.id,
                    EventKind::Errored(error.clone()),
                    now,
                ));
                self.resolve(item.id, AnimationOutcome::Errored(error));
            }
            TickOutcome::Running | TickOutcome::Skipped => {}
        }
        item.animator.dispose();
    }

    /// Raise a performance error once adaptation has bottomed out and frames
    /// are still over budget
    fn watch_degradation(&mut self, over_budget: bool, elapsed_ms: f64, now: f64) {
        if !over_budget {
            self.degraded_frames = 0;
            return;
        }
        if !self.scheduler.is_at_floor() {
            return;
        }
        self.degraded_frames += 1;
        if self.degraded_frames >= self.config.recovery.degraded_frames_before_error {
            self.degraded_frames = 0;
            let error = AnimationError::PerformanceDegraded {
                metric: "frameTimeMs".to_string(),
                value: elapsed_ms,
                threshold: self.scheduler.frame_budget_ms(),
            };
            self.recovery.report(error, ErrorContext::default(), now);
        }
    }

    fn handle_recovery(&mut self, report: RecoveryReport, now: f64) {
        match report.outcome {
            RecoveryOutcome::Repaired => {
                debug!("{} error {} repaired", report.error_type.name(), report.error_id);
            }
            RecoveryOutcome::Retrying { attempt, next_at } => {
                debug!(
                    "{} error {} retry {attempt} due at {next_at:.0} ms",
                    report.error_type.name(),
                    report.error_id
                );
            }
            RecoveryOutcome::FellBack { action, notified } => {
                let strategy = self.config.recovery.strategies.get(report.error_type);
                if !strategy.notify_user {
                    return;
                }
                let message = self
                    .recovery
                    .get(report.error_id)
                    .map(|r| r.message.clone())
                    .unwrap_or_default();
                self.events.push_notice(EngineNotice {
                    error_id: report.error_id,
                    animation: report.animation,
                    error_type: report.error_type,
                    action,
                    message,
                    delivered: notified,
                    timestamp: now,
                });
            }
        }
    }

    // ---- errors ---------------------------------------------------------

    /// Route a host-detected runtime error through recovery
    pub fn report_error(&mut self, error: AnimationError, context: ErrorContext) -> ErrorId {
        let now = self.clock.now_ms();
        let id = self.recovery.report(error, context, now);
        self.arm();
        id
    }

    /// Re-run recovery for a settled error record
    pub fn retry_recovery(&mut self, id: ErrorId) -> bool {
        let now = self.clock.now_ms();
        let queued = self.recovery.retry(id, now);
        if queued {
            self.arm();
        }
        queued
    }

    pub fn set_notifier(&mut self, notifier: Notifier) {
        self.recovery.set_notifier(notifier);
    }

    pub fn error_history(&self) -> impl Iterator<Item = &ErrorRecord> {
        self.recovery.history()
    }

    pub fn error_count(&self, error_type: ErrorType) -> u64 {
        self.recovery.count_by_type(error_type)
    }

    pub fn clear_error_history(&mut self) {
        self.recovery.clear_history();
    }

    // ---- metrics --------------------------------------------------------

    /// Latest frame metrics
    pub fn get_performance_metrics(&self) -> Option<PerformanceMetrics> {
        self.profiler.latest().copied()
    }

    pub fn average_metrics(&self) -> Option<PerformanceMetrics> {
        self.profiler.average()
    }

    pub fn performance_score(&self) -> f64 {
        self.profiler.performance_score()
    }

    pub fn is_performance_good(&self) -> bool {
        self.profiler.is_performance_good()
    }

    /// Animations currently queued
    #[inline]
    pub fn get_active_animation_count(&self) -> usize {
        self.scheduler.len()
    }

    pub fn add_metrics_listener(&mut self, listener: MetricsListener) -> ListenerId {
        self.profiler.add_listener(listener)
    }

    pub fn remove_metrics_listener(&mut self, id: ListenerId) -> bool {
        self.profiler.remove_listener(id)
    }

    pub fn set_memory_sampler(&mut self, sampler: MemorySampler) {
        self.profiler.set_memory_sampler(sampler);
    }

    /// Take every event recorded since the last drain
    pub fn drain_events(&mut self) -> Vec<AnimationEvent> {
        self.events.drain()
    }

    pub fn drain_notices(&mut self) -> Vec<EngineNotice> {
        self.events.drain_notices()
    }

    pub fn diagnostics(&self) -> EngineDiagnostics {
        let now = self.clock.now_ms();
        EngineDiagnostics {
            queue_depth: self.scheduler.len(),
            bands: self.scheduler.band_counts(),
            max_concurrent: self.scheduler.max_concurrent(),
            frame_budget_ms: self.scheduler.frame_budget_ms(),
            dropped_frames: self.scheduler.dropped_frames(),
            frames: self.frames,
            frame_loop_armed: self.loop_armed,
            visibility: self.visibility,
            latest: self.profiler.latest().copied(),
            average: self.profiler.average(),
            performance_score: self.profiler.performance_score(),
            performance_good: self.profiler.is_performance_good(),
            errors_by_type: ErrorType::ALL
                .iter()
                .map(|t| (*t, self.recovery.count_by_type(*t)))
                .collect(),
            errors_by_severity: Severity::ALL
                .iter()
                .map(|s| (*s, self.recovery.count_by_severity(*s)))
                .collect(),
            total_errors: self.recovery.total_errors(),
            pending_recoveries: self.recovery.pending_count(),
            braking: self.recovery.is_braking(now),
            transform_cache_entries: self.transforms.cache_len(),
            transform_cache_hit_rate: self.transforms.cache_hit_rate(),
            easing_fallbacks: self.easings.fallback_count(),
            dropped_events: self.events.dropped(),
        }
    }

    // ---- accessors ------------------------------------------------------

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Register custom easings or compile curves up front
    pub fn easings_mut(&mut self) -> &mut EasingLibrary {
        &mut self.easings
    }

    pub fn transforms_mut(&mut self) -> &mut TransformProcessor {
        &mut self.transforms
    }

    pub fn scheduler(&self) -> &AnimationScheduler {
        &self.scheduler
    }

    pub fn clock(&self) -> &ClockRef {
        &self.clock
    }
}
