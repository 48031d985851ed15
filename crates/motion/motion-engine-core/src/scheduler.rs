//! Priority-banded, budget-aware dispatcher for queued animators.

use std::fmt;

use hashbrown::HashMap;
use indexmap::IndexMap;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::animator::{Animator, AnimatorState, FrameContext, TickOutcome};
use crate::config::{AnimationConfig, SchedulerConfig};
use crate::element::{ElementRef, Rect, Viewport};
use crate::ids::AnimationId;
use crate::time::ClockRef;
use crate::transform::TransformProcessor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PriorityBand {
    High,
    Normal,
    Low,
}

impl PriorityBand {
    /// Service order within a tick
    pub const ORDER: [PriorityBand; 3] = [Self::High, Self::Normal, Self::Low];

    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Normal => "normal",
            Self::Low => "low",
        }
    }
}

/// One registered animator and what it was created with
pub struct AnimationQueueItem {
    pub id: AnimationId,
    pub animator: Box<dyn Animator>,
    pub priority: i32,
    pub enqueued_at: f64,
    pub element: ElementRef,
    pub config: AnimationConfig,
}

impl fmt::Debug for AnimationQueueItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnimationQueueItem")
            .field("id", &self.id)
            .field("kind", &self.animator.kind())
            .field("state", &self.animator.state())
            .field("priority", &self.priority)
            .field("enqueued_at", &self.enqueued_at)
            .field("element", &self.element.key())
            .finish()
    }
}

/// Item that reached Completed or Errored during a tick and left the queue
#[derive(Debug)]
pub struct FinishedItem {
    pub item: AnimationQueueItem,
    pub outcome: TickOutcome,
}

/// Bookkeeping for one tick
#[derive(Debug, Default)]
pub struct TickReport {
    pub finished: Vec<FinishedItem>,
    /// Animators advanced
    pub processed: usize,
    /// Skipped because their element is off-screen
    pub culled: usize,
    /// Left for a later tick by the band budget or the concurrency ceiling
    pub deferred: usize,
    pub elapsed_ms: f64,
    pub over_budget: bool,
}

/// Queue depth per band
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandCounts {
    pub high: usize,
    pub normal: usize,
    pub low: usize,
}

pub struct AnimationScheduler {
    config: SchedulerConfig,
    clock: ClockRef,
    /// Registration order, so ticks are deterministic within a band
    items: IndexMap<AnimationId, AnimationQueueItem>,
    viewport: Rect,
    frame_budget_ms: f64,
    max_concurrent: usize,
    dropped_frames: u64,
    cheap_streak: u32,
}

impl AnimationScheduler {
    pub fn new(config: SchedulerConfig, clock: ClockRef, viewport: Viewport) -> Self {
        Self {
            frame_budget_ms: config.frame_budget_ms,
            max_concurrent: config.max_concurrent,
            config,
            clock,
            items: IndexMap::new(),
            viewport: viewport.rect(),
            dropped_frames: 0,
            cheap_streak: 0,
        }
    }

    #[inline]
    pub fn band_of(&self, priority: i32) -> PriorityBand {
        priority_band(&self.config, priority)
    }

    /// Register an item. An item with the same id is replaced and returned.
    pub fn add(&mut self, item: AnimationQueueItem) -> Option<AnimationQueueItem> {
        let id = item.id;
        debug!(
            "queued {} ({:?}, {} band)",
            id,
            item.animator.kind(),
            self.band_of(item.priority).name()
        );
        self.items.insert(id, item)
    }

    /// Deregister an item without touching its animator
    pub fn remove(&mut self, id: AnimationId) -> Option<AnimationQueueItem> {
        self.items.shift_remove(&id)
    }

    /// Deregister everything, in registration order
    pub fn drain(&mut self) -> Vec<AnimationQueueItem> {
        self.items.drain(..).map(|(_, item)| item).collect()
    }

    #[inline]
    pub fn contains(&self, id: AnimationId) -> bool {
        self.items.contains_key(&id)
    }

    pub fn get(&self, id: AnimationId) -> Option<&AnimationQueueItem> {
        self.items.get(&id)
    }

    pub fn get_mut(&mut self, id: AnimationId) -> Option<&mut AnimationQueueItem> {
        self.items.get_mut(&id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items in registration order
    pub fn iter(&self) -> impl Iterator<Item = &AnimationQueueItem> {
        self.items.values()
    }

    /// Running or paused animators
    pub fn active_count(&self) -> usize {
        self.items.values().filter(|i| i.animator.is_active()).count()
    }

    pub fn band_counts(&self) -> BandCounts {
        let mut counts = BandCounts::default();
        for item in self.items.values() {
            match self.band_of(item.priority) {
                PriorityBand::High => counts.high += 1,
                PriorityBand::Normal => counts.normal += 1,
                PriorityBand::Low => counts.low += 1,
            }
        }
        counts
    }

    pub fn pause_all(&mut self, now: f64) -> Vec<AnimationId> {
        let mut paused = Vec::new();
        for (id, item) in self.items.iter_mut() {
            if item.animator.state() == AnimatorState::Running {
                item.animator.pause(now);
                paused.push(*id);
            }
        }
        paused
    }

    pub fn resume_all(&mut self, now: f64) -> Vec<AnimationId> {
        let mut resumed = Vec::new();
        for (id, item) in self.items.iter_mut() {
            if item.animator.state() == AnimatorState::Paused {
                item.animator.resume(now);
                resumed.push(*id);
            }
        }
        resumed
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport.rect();
    }

    /// Advance queued animators for one frame.
    ///
    /// The high band is serviced first and in full. The normal and low bands only
    /// run while the time spent in this tick is under their share of the budget,
    /// and no band pushes the number of advanced animators past the ceiling.
    pub fn tick(&mut self, now: f64, transforms: &mut TransformProcessor) -> TickReport {
        let started = self.clock.now_ms();
        let mut report = TickReport::default();
        let mut done = Vec::new();

        for band in PriorityBand::ORDER {
            let limit = match band {
                PriorityBand::High => f64::INFINITY,
                PriorityBand::Normal => self.config.normal_band_fraction * self.frame_budget_ms,
                PriorityBand::Low => self.config.low_band_fraction * self.frame_budget_ms,
            };
            for (id, item) in self.items.iter_mut() {
                if priority_band(&self.config, item.priority) != band {
                    continue;
                }
                if report.processed >= self.max_concurrent
                    || self.clock.now_ms() - started >= limit
                {
                    report.deferred += 1;
                    continue;
                }
                // Detached elements still tick so the animator can report it
                if band != PriorityBand::High
                    && self.config.cull_offscreen
                    && item.element.is_attached()
                    && !item.element.bounding_rect().intersects(&self.viewport)
                {
                    report.culled += 1;
                    continue;
                }

                let mut ctx = FrameContext::new(now, transforms);
                match item.animator.tick(&mut ctx) {
                    TickOutcome::Skipped => {}
                    TickOutcome::Running => report.processed += 1,
                    outcome @ (TickOutcome::Completed | TickOutcome::Errored(_)) => {
                        report.processed += 1;
                        done.push((*id, outcome));
                    }
                }
            }
        }

        if !done.is_empty() {
            // One pass over the queue, keeping registration order for the rest
            let mut outcomes: HashMap<AnimationId, TickOutcome> = done.into_iter().collect();
            for (id, item) in std::mem::take(&mut self.items) {
                match outcomes.remove(&id) {
                    Some(outcome) => report.finished.push(FinishedItem { item, outcome }),
                    None => {
                        self.items.insert(id, item);
                    }
                }
            }
        }

        report.elapsed_ms = (self.clock.now_ms() - started).max(0.0);
        report.over_budget = report.elapsed_ms > self.frame_budget_ms;
        self.adapt(report.elapsed_ms);
        report
    }

    /// Shrink after an expensive tick, grow after a streak of cheap ones
    fn adapt(&mut self, elapsed_ms: f64) {
        let c = &self.config;
        if elapsed_ms > self.frame_budget_ms {
            self.dropped_frames += 1;
            self.cheap_streak = 0;
            let budget = (self.frame_budget_ms * c.shrink_factor).max(c.min_frame_budget_ms);
            let ceiling =
                ((self.max_concurrent as f64 * c.shrink_factor).floor() as usize).max(c.min_concurrent);
            warn!(
                "tick took {elapsed_ms:.2} ms of a {:.2} ms budget; budget -> {budget:.2} ms, ceiling {} -> {ceiling}",
                self.frame_budget_ms, self.max_concurrent
            );
            self.frame_budget_ms = budget;
            self.max_concurrent = ceiling;
        } else if elapsed_ms < c.cheap_tick_fraction * self.frame_budget_ms {
            self.cheap_streak += 1;
            if self.cheap_streak >= c.cheap_tick_streak {
                self.cheap_streak = 0;
                let budget = (self.frame_budget_ms * c.grow_factor).min(c.max_frame_budget_ms);
                // Always gain at least one slot so small ceilings can recover
                let grown = (self.max_concurrent as f64 * c.grow_factor).floor() as usize;
                let ceiling = grown
                    .max(self.max_concurrent + 1)
                    .min(c.max_concurrent_ceiling);
                if budget != self.frame_budget_ms || ceiling != self.max_concurrent {
                    debug!("scheduler relaxed: budget {budget:.2} ms, ceiling {ceiling}");
                }
                self.frame_budget_ms = budget;
                self.max_concurrent = ceiling;
            }
        } else {
            self.cheap_streak = 0;
        }
    }

    #[inline]
    pub fn frame_budget_ms(&self) -> f64 {
        self.frame_budget_ms
    }

    #[inline]
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    #[inline]
    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames
    }

    /// Whether adaptation has pushed both knobs to their floors
    pub fn is_at_floor(&self) -> bool {
        self.frame_budget_ms <= self.config.min_frame_budget_ms
            && self.max_concurrent <= self.config.min_concurrent
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }
}

fn priority_band(config: &SchedulerConfig, priority: i32) -> PriorityBand {
    if priority > config.high_priority_above {
        PriorityBand::High
    } else if priority <= config.low_priority_at_or_below {
        PriorityBand::Low
    } else {
        PriorityBand::Normal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animator::{AnimatorKind, Lifecycle};
    use crate::element::{Element, HeadlessElement};
    use crate::time::{Clock, ManualClock};
    use crate::transform::Transform;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Animator that logs its ticks and burns a fixed amount of clock time
    struct Ticker {
        id: AnimationId,
        element: ElementRef,
        lifecycle: Lifecycle,
        clock: ManualClock,
        cost_ms: f64,
        ticks_left: u32,
        log: Rc<RefCell<Vec<AnimationId>>>,
    }

    impl Animator for Ticker {
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
            self.lifecycle.start(ctx.now);
        }
        fn tick(&mut self, _ctx: &mut FrameContext<'_>) -> TickOutcome {
            if self.lifecycle.state() != AnimatorState::Running {
                return TickOutcome::Skipped;
            }
            self.log.borrow_mut().push(self.id);
            self.clock.advance(self.cost_ms);
            self.ticks_left = self.ticks_left.saturating_sub(1);
            if self.ticks_left == 0 {
                self.lifecycle.finish(AnimatorState::Completed);
                TickOutcome::Completed
            } else {
                TickOutcome::Running
            }
        }
        fn pause(&mut self, now: f64) {
            self.lifecycle.pause(now);
        }
        fn resume(&mut self, now: f64) {
            self.lifecycle.resume(now);
        }
        fn stop(&mut self, _transforms: &mut TransformProcessor) {
            self.lifecycle.finish(AnimatorState::Stopped);
        }
        fn progress(&self) -> f64 {
            0.0
        }
        fn target(&self) -> Option<Transform> {
            None
        }
        fn dispose(&mut self) {}
    }

    struct Rig {
        clock: ManualClock,
        scheduler: AnimationScheduler,
        processor: TransformProcessor,
        log: Rc<RefCell<Vec<AnimationId>>>,
        next: u64,
    }

    impl Rig {
        fn new(config: SchedulerConfig) -> Self {
            let clock = ManualClock::new();
            let clock_ref: ClockRef = Rc::new(clock.clone());
            Self {
                scheduler: AnimationScheduler::new(config, clock_ref.clone(), Viewport::default()),
                processor: TransformProcessor::new(clock_ref, 100.0, 16),
                clock,
                log: Rc::new(RefCell::new(Vec::new())),
                next: 0,
            }
        }

        fn queue_on(&mut self, element: ElementRef, priority: i32, cost_ms: f64, ticks: u32) -> AnimationId {
            let id = AnimationId(self.next);
            self.next += 1;
            let mut ticker = Ticker {
                id,
                element: element.clone(),
                lifecycle: Lifecycle::new(),
                clock: self.clock.clone(),
                cost_ms,
                ticks_left: ticks,
                log: self.log.clone(),
            };
            ticker.start(&mut FrameContext::new(0.0, &mut self.processor));
            self.scheduler.add(AnimationQueueItem {
                id,
                animator: Box::new(ticker),
                priority,
                enqueued_at: 0.0,
                element,
                config: AnimationConfig::default(),
            });
            id
        }

        fn queue(&mut self, priority: i32, cost_ms: f64) -> AnimationId {
            self.queue_on(HeadlessElement::boxed(), priority, cost_ms, u32::MAX)
        }

        fn tick(&mut self) -> TickReport {
            let now = self.clock.now_ms();
            self.scheduler.tick(now, &mut self.processor)
        }
    }

    #[test]
    fn bands_follow_named_cutoffs() {
        let rig = Rig::new(SchedulerConfig::default());
        assert_eq!(rig.scheduler.band_of(6), PriorityBand::High);
        assert_eq!(rig.scheduler.band_of(5), PriorityBand::Normal);
        assert_eq!(rig.scheduler.band_of(1), PriorityBand::Normal);
        assert_eq!(rig.scheduler.band_of(0), PriorityBand::Low);
        assert_eq!(rig.scheduler.band_of(-3), PriorityBand::Low);
    }

    #[test]
    fn high_band_runs_before_normal() {
        let mut rig = Rig::new(SchedulerConfig::default());
        let normal: Vec<_> = (0..4).map(|_| rig.queue(3, 0.0)).collect();
        let high: Vec<_> = (0..3).map(|_| rig.queue(9, 0.0)).collect();
        let report = rig.tick();
        assert_eq!(report.processed, 7);
        let log = rig.log.borrow();
        assert_eq!(&log[..3], &high[..]);
        assert_eq!(&log[3..], &normal[..]);
    }

    #[test]
    fn normal_band_waits_when_budget_is_spent() {
        let mut rig = Rig::new(SchedulerConfig::default());
        // 15 ms of the 16 ms budget is past both band shares
        rig.queue(10, 15.0);
        let normal = rig.queue(1, 0.0);
        let low = rig.queue(-1, 0.0);
        let report = rig.tick();
        assert_eq!(report.deferred, 2);
        assert!(!rig.log.borrow().contains(&normal));
        assert!(!rig.log.borrow().contains(&low));
    }

    #[test]
    fn low_band_has_a_larger_share_than_normal() {
        let mut rig = Rig::new(SchedulerConfig::default());
        // 12 ms spent: over 70% of 16 but under 90%
        rig.queue(3, 12.0);
        let low = rig.queue(0, 0.0);
        rig.tick();
        assert!(rig.log.borrow().contains(&low));
    }

    #[test]
    fn concurrency_ceiling_caps_work_per_tick() {
        let mut rig = Rig::new(SchedulerConfig {
            max_concurrent: 4,
            min_concurrent: 2,
            ..SchedulerConfig::default()
        });
        for _ in 0..6 {
            rig.queue(9, 0.0);
        }
        let report = rig.tick();
        assert_eq!(report.processed, 4);
        assert_eq!(report.deferred, 2);
    }

    #[test]
    fn offscreen_normal_items_are_culled_but_high_items_run() {
        let mut rig = Rig::new(SchedulerConfig::default());
        let far = || HeadlessElement::new(Rect::new(5000.0, 5000.0, 10.0, 10.0)) as ElementRef;
        let hidden = rig.queue_on(far(), 2, 0.0, u32::MAX);
        let urgent = rig.queue_on(far(), 8, 0.0, u32::MAX);
        let report = rig.tick();
        assert_eq!(report.culled, 1);
        let log = rig.log.borrow();
        assert!(log.contains(&urgent));
        assert!(!log.contains(&hidden));
    }

    #[test]
    fn finished_items_leave_the_queue() {
        let mut rig = Rig::new(SchedulerConfig::default());
        let id = rig.queue_on(HeadlessElement::boxed(), 1, 0.0, 2);
        assert!(rig.tick().finished.is_empty());
        let report = rig.tick();
        assert_eq!(report.finished.len(), 1);
        assert_eq!(report.finished[0].item.id, id);
        assert_eq!(report.finished[0].outcome, TickOutcome::Completed);
        assert!(rig.scheduler.is_empty());
    }

    #[test]
    fn finishing_several_items_keeps_the_rest_in_order() {
        let mut rig = Rig::new(SchedulerConfig::default());
        let ids: Vec<_> = (0..6)
            .map(|n| rig.queue_on(HeadlessElement::boxed(), 1, 0.0, if n % 2 == 0 { 1 } else { 3 }))
            .collect();

        let report = rig.tick();
        let finished: Vec<_> = report.finished.iter().map(|f| f.item.id).collect();
        assert_eq!(finished, vec![ids[0], ids[2], ids[4]]);
        let left: Vec<_> = rig.scheduler.iter().map(|item| item.id).collect();
        assert_eq!(left, vec![ids[1], ids[3], ids[5]]);

        rig.log.borrow_mut().clear();
        rig.tick();
        assert_eq!(*rig.log.borrow(), vec![ids[1], ids[3], ids[5]]);
        assert!(!rig.scheduler.contains(ids[0]));
    }

    #[test]
    fn over_budget_tick_shrinks_with_floors() {
        let mut rig = Rig::new(SchedulerConfig::default());
        rig.queue(9, 40.0);
        let report = rig.tick();
        assert!(report.over_budget);
        assert_eq!(rig.scheduler.dropped_frames(), 1);
        assert_eq!(rig.scheduler.frame_budget_ms(), 16.0 * 0.8);
        assert_eq!(rig.scheduler.max_concurrent(), 40);
        for _ in 0..50 {
            rig.tick();
        }
        assert_eq!(rig.scheduler.frame_budget_ms(), 4.0);
        assert_eq!(rig.scheduler.max_concurrent(), 4);
        assert!(rig.scheduler.is_at_floor());
    }

    #[test]
    fn cheap_ticks_relax_with_ceilings() {
        let mut rig = Rig::new(SchedulerConfig {
            frame_budget_ms: 8.0,
            max_concurrent: 10,
            cheap_tick_streak: 3,
            ..SchedulerConfig::default()
        });
        rig.queue(1, 0.0);
        for _ in 0..3 {
            rig.tick();
        }
        assert_eq!(rig.scheduler.max_concurrent(), 11);
        assert!((rig.scheduler.frame_budget_ms() - 8.8).abs() < 1e-9);
        for _ in 0..300 {
            rig.tick();
        }
        assert_eq!(rig.scheduler.frame_budget_ms(), 16.0);
        assert_eq!(rig.scheduler.max_concurrent(), 100);
    }

    #[test]
    fn pause_and_resume_are_uniform() {
        let mut rig = Rig::new(SchedulerConfig::default());
        rig.queue(1, 0.0);
        rig.queue(9, 0.0);
        assert_eq!(rig.scheduler.pause_all(10.0).len(), 2);
        assert!(rig.scheduler.pause_all(11.0).is_empty());
        assert_eq!(rig.tick().processed, 0);
        assert_eq!(rig.scheduler.resume_all(20.0).len(), 2);
        assert_eq!(rig.tick().processed, 2);
    }

    #[test]
    fn remove_and_drain() {
        let mut rig = Rig::new(SchedulerConfig::default());
        let a = rig.queue(1, 0.0);
        let b = rig.queue(2, 0.0);
        assert!(rig.scheduler.remove(a).is_some());
        assert!(rig.scheduler.remove(a).is_none());
        let drained = rig.scheduler.drain();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].id, b);
        assert!(rig.scheduler.is_empty());
        assert_eq!(rig.scheduler.band_counts(), BandCounts::default());
        // The element handle is still usable after deregistration
        assert!(drained[0].element.is_attached());
    }
}
