//! Typed error history with per-type retry, backoff and fallback.
//!
//! Every runtime error is recorded, then repaired on a backoff schedule that is
//! polled once per frame. When the strategy's attempts run out its fallback is
//! applied and, if configured, the user is notified.

use std::collections::VecDeque;
use std::fmt;

use hashbrown::{HashMap, HashSet};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::config::RecoveryConfig;
use crate::element::ElementRef;
use crate::ids::{AnimationId, ErrorId};
use crate::transform::{Transform, TransformProcessor};
use crate::AnimationError;

/// Transition used when a failed animation is simplified to a fade
pub const SIMPLIFIED_FADE: &str = "opacity 150ms ease-out";

/// Recovery taxonomy bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorType {
    Animation,
    Engine,
    Transform,
    Performance,
}

impl ErrorType {
    pub const ALL: [ErrorType; 4] = [
        ErrorType::Animation,
        ErrorType::Engine,
        ErrorType::Transform,
        ErrorType::Performance,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Animation => "animation",
            Self::Engine => "engine",
            Self::Transform => "transform",
            Self::Performance => "performance",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];

    /// Guess severity from the wording of an error message
    pub fn infer(message: &str) -> Self {
        let message = message.to_lowercase();
        let mentions = |words: &[&str]| words.iter().any(|w| message.contains(w));
        if mentions(&["critical", "fatal", "crash"]) {
            Self::Critical
        } else if mentions(&["memory", "performance"]) {
            Self::High
        } else if mentions(&["detached", "failed", "not found", "invalid"]) {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// What to do once repairs are exhausted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FallbackAction {
    /// Leave the element as it is
    Skip,
    /// Drop the motion, keep the element visible (opacity fade target)
    Simplified,
    /// Snap to the intended final transform
    Instant,
    /// Remove all transform styling
    Remove,
}

/// Per-type recovery policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryStrategy {
    pub max_attempts: u32,
    /// Delay before the first attempt; doubles on each retry
    pub backoff_ms: f64,
    pub fallback: FallbackAction,
    pub notify_user: bool,
}

impl RecoveryStrategy {
    pub fn default_for(error_type: ErrorType) -> Self {
        let (max_attempts, backoff_ms, fallback, notify_user) = match error_type {
            ErrorType::Animation => (3, 100.0, FallbackAction::Simplified, false),
            ErrorType::Engine => (2, 1000.0, FallbackAction::Remove, true),
            ErrorType::Transform => (3, 50.0, FallbackAction::Instant, false),
            ErrorType::Performance => (1, 0.0, FallbackAction::Skip, true),
        };
        Self {
            max_attempts,
            backoff_ms,
            fallback,
            notify_user,
        }
    }

    /// Delay before attempt number `attempt` (1-based)
    #[inline]
    pub fn delay_for(&self, attempt: u32) -> f64 {
        self.backoff_ms * 2f64.powi(attempt.saturating_sub(1) as i32)
    }

    pub fn validate(&self) -> Result<(), AnimationError> {
        if !(self.backoff_ms >= 0.0) || !self.backoff_ms.is_finite() {
            return Err(AnimationError::invalid_config(
                "backoffMs",
                self.backoff_ms,
                "must be non-negative and finite",
            ));
        }
        Ok(())
    }
}

impl Default for RecoveryStrategy {
    fn default() -> Self {
        Self::default_for(ErrorType::Animation)
    }
}

/// Where a record ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Resolution {
    Pending,
    Repaired,
    FellBack(FallbackAction),
}

/// One recorded runtime error
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    pub id: ErrorId,
    pub error_type: ErrorType,
    pub severity: Severity,
    pub message: String,
    pub error: AnimationError,
    pub animation: Option<AnimationId>,
    #[serde(skip)]
    pub element: Option<ElementRef>,
    pub recovery_attempts: u32,
    pub timestamp: f64,
    pub resolution: Resolution,
}

impl fmt::Debug for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorRecord")
            .field("id", &self.id)
            .field("error_type", &self.error_type)
            .field("severity", &self.severity)
            .field("message", &self.message)
            .field("animation", &self.animation)
            .field("element", &self.element.as_ref().map(|e| e.key()))
            .field("recovery_attempts", &self.recovery_attempts)
            .field("timestamp", &self.timestamp)
            .field("resolution", &self.resolution)
            .finish()
    }
}

/// What the reporter knows about where an error happened
#[derive(Clone, Default)]
pub struct ErrorContext {
    pub animation: Option<AnimationId>,
    pub element: Option<ElementRef>,
    /// Transform the failed animation was heading to
    pub target: Option<Transform>,
}

impl ErrorContext {
    pub fn for_animation(id: AnimationId, element: ElementRef, target: Option<Transform>) -> Self {
        Self {
            animation: Some(id),
            element: Some(element),
            target,
        }
    }

    pub fn for_element(element: ElementRef) -> Self {
        Self {
            element: Some(element),
            ..Self::default()
        }
    }
}

struct PendingRecovery {
    id: ErrorId,
    error_type: ErrorType,
    due_at: f64,
    attempts: u32,
    context: ErrorContext,
}

/// Result of one polled recovery step
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryOutcome {
    Repaired,
    Retrying { attempt: u32, next_at: f64 },
    FellBack { action: FallbackAction, notified: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryReport {
    pub error_id: ErrorId,
    pub animation: Option<AnimationId>,
    pub error_type: ErrorType,
    pub outcome: RecoveryOutcome,
}

/// Host callback invoked when a notifying strategy gives up
pub type Notifier = Box<dyn FnMut(&ErrorRecord) -> anyhow::Result<()>>;

pub struct RecoveryManager {
    config: RecoveryConfig,
    history: VecDeque<ErrorRecord>,
    pending: Vec<PendingRecovery>,
    in_flight: HashSet<ErrorId>,
    by_type: HashMap<ErrorType, u64>,
    by_severity: HashMap<Severity, u64>,
    brake_until: Option<f64>,
    notifier: Option<Notifier>,
}

impl RecoveryManager {
    pub fn new(config: RecoveryConfig) -> Self {
        Self {
            history: VecDeque::with_capacity(config.history_capacity),
            config,
            pending: Vec::new(),
            in_flight: HashSet::new(),
            by_type: HashMap::new(),
            by_severity: HashMap::new(),
            brake_until: None,
            notifier: None,
        }
    }

    pub fn set_notifier(&mut self, notifier: Notifier) {
        self.notifier = Some(notifier);
    }

    /// Record `error` and schedule its recovery. Returns the record id.
    pub fn report(&mut self, error: AnimationError, context: ErrorContext, now: f64) -> ErrorId {
        let error_type = error.category();
        let message = error.to_string();
        let severity = Severity::infer(&message);
        let id = ErrorId::new();
        debug!("recording {} error {id}: {message}", error_type.name());

        *self.by_type.entry(error_type).or_insert(0) += 1;
        *self.by_severity.entry(severity).or_insert(0) += 1;

        let recoverable = error.is_recoverable();
        let record = ErrorRecord {
            id,
            error_type,
            severity,
            message,
            error,
            animation: context.animation,
            element: context.element.clone(),
            recovery_attempts: 0,
            timestamp: now,
            resolution: Resolution::Pending,
        };
        if self.history.len() >= self.config.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(record);

        let strategy = self.config.strategies.get(error_type);
        // Unrecoverable errors and zero-attempt strategies fall back on the next poll
        let (attempts, due_at) = if recoverable && strategy.max_attempts > 0 {
            (0, now + strategy.delay_for(1))
        } else {
            (strategy.max_attempts, now)
        };
        self.in_flight.insert(id);
        self.pending.push(PendingRecovery {
            id,
            error_type,
            due_at,
            attempts,
            context,
        });
        id
    }

    /// Re-run recovery for a settled record. A record already in flight is left alone.
    pub fn retry(&mut self, id: ErrorId, now: f64) -> bool {
        if self.in_flight.contains(&id) {
            return false;
        }
        let Some(record) = self.history.iter_mut().find(|r| r.id == id) else {
            return false;
        };
        record.resolution = Resolution::Pending;
        let context = ErrorContext {
            animation: record.animation,
            element: record.element.clone(),
            target: None,
        };
        let error_type = record.error_type;
        self.in_flight.insert(id);
        self.pending.push(PendingRecovery {
            id,
            error_type,
            due_at: now,
            attempts: 0,
            context,
        });
        true
    }

    /// Run every recovery step that is due
    pub fn poll(&mut self, now: f64, processor: &mut TransformProcessor) -> Vec<RecoveryReport> {
        if self.pending.iter().all(|p| p.due_at > now) {
            return Vec::new();
        }
        let (due, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|p| p.due_at <= now);
        self.pending = waiting;

        let mut reports = Vec::with_capacity(due.len());
        for mut item in due {
            let strategy = self.config.strategies.get(item.error_type).clone();
            let outcome = if item.attempts < strategy.max_attempts {
                item.attempts += 1;
                self.bump_attempts(item.id);
                debug!(
                    "recovery attempt {}/{} for {} error {}",
                    item.attempts,
                    strategy.max_attempts,
                    item.error_type.name(),
                    item.id
                );
                if self.repair(&item, now, processor) {
                    self.settle(item.id, Resolution::Repaired);
                    RecoveryOutcome::Repaired
                } else if item.attempts < strategy.max_attempts {
                    let next_at = now + strategy.delay_for(item.attempts + 1);
                    let attempt = item.attempts;
                    let report = RecoveryReport {
                        error_id: item.id,
                        animation: item.context.animation,
                        error_type: item.error_type,
                        outcome: RecoveryOutcome::Retrying { attempt, next_at },
                    };
                    item.due_at = next_at;
                    self.pending.push(item);
                    reports.push(report);
                    continue;
                } else {
                    self.fall_back(&item, &strategy, processor)
                }
            } else {
                self.fall_back(&item, &strategy, processor)
            };
            reports.push(RecoveryReport {
                error_id: item.id,
                animation: item.context.animation,
                error_type: item.error_type,
                outcome,
            });
        }
        reports
    }

    /// Type-specific repair. Returns whether the element is in a usable state afterwards.
    fn repair(&mut self, item: &PendingRecovery, now: f64, processor: &mut TransformProcessor) -> bool {
        let attached = item
            .context
            .element
            .as_ref()
            .map_or(true, |el| el.is_attached());
        match item.error_type {
            ErrorType::Animation => {
                if let Some(element) = item.context.element.as_ref().filter(|_| attached) {
                    processor.reset_render_hint(element);
                }
                attached
            }
            ErrorType::Transform => match item.context.element.as_ref() {
                Some(element) if attached => {
                    processor.apply_transform_instantly(element, &Transform::identity());
                    processor.invalidate(element.key());
                    processor.read_transform(element).is_ok()
                }
                Some(_) => false,
                None => true,
            },
            ErrorType::Performance => {
                self.engage_brake(now);
                true
            }
            ErrorType::Engine => attached,
        }
    }

    fn fall_back(
        &mut self,
        item: &PendingRecovery,
        strategy: &RecoveryStrategy,
        processor: &mut TransformProcessor,
    ) -> RecoveryOutcome {
        warn!(
            "recovery for {} error {} exhausted; falling back to {:?}",
            item.error_type.name(),
            item.id,
            strategy.fallback
        );
        if let Some(element) = item.context.element.as_ref().filter(|el| el.is_attached()) {
            match strategy.fallback {
                FallbackAction::Skip => {}
                FallbackAction::Simplified => {
                    processor.reset_render_hint(element);
                    element.set_transition(Some(SIMPLIFIED_FADE));
                    element.set_opacity(1.0);
                }
                FallbackAction::Instant => {
                    let target = item.context.target.clone().unwrap_or_else(Transform::identity);
                    processor.apply_transform_instantly(element, &target);
                    processor.reset_render_hint(element);
                }
                FallbackAction::Remove => processor.clear_transform(element),
            }
        }
        self.settle(item.id, Resolution::FellBack(strategy.fallback));

        let mut notified = false;
        if strategy.notify_user {
            if let (Some(notifier), Some(record)) = (
                self.notifier.as_mut(),
                self.history.iter().find(|r| r.id == item.id),
            ) {
                match notifier(record) {
                    Ok(()) => notified = true,
                    Err(err) => warn!("user notifier failed for error {}: {err:#}", item.id),
                }
            }
        }
        RecoveryOutcome::FellBack {
            action: strategy.fallback,
            notified,
        }
    }

    fn bump_attempts(&mut self, id: ErrorId) {
        if let Some(record) = self.history.iter_mut().find(|r| r.id == id) {
            record.recovery_attempts += 1;
        }
    }

    fn settle(&mut self, id: ErrorId, resolution: Resolution) {
        self.in_flight.remove(&id);
        if let Some(record) = self.history.iter_mut().find(|r| r.id == id) {
            record.resolution = resolution;
        }
    }

    /// Force near-zero durations on new animations for the configured window
    pub fn engage_brake(&mut self, now: f64) {
        let until = now + self.config.emergency_brake_ms;
        if self.brake_until.map_or(true, |current| current < until) {
            info!(
                "emergency brake engaged for {} ms",
                self.config.emergency_brake_ms
            );
            self.brake_until = Some(until);
        }
    }

    #[inline]
    pub fn is_braking(&self, now: f64) -> bool {
        self.brake_until.is_some_and(|until| now < until)
    }

    /// Duration to force onto new animations while the brake is engaged
    #[inline]
    pub fn duration_override(&self, now: f64) -> Option<f64> {
        self.is_braking(now).then_some(self.config.brake_duration_ms)
    }

    pub fn history(&self) -> impl Iterator<Item = &ErrorRecord> {
        self.history.iter()
    }

    pub fn get(&self, id: ErrorId) -> Option<&ErrorRecord> {
        self.history.iter().find(|r| r.id == id)
    }

    #[inline]
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    #[inline]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    #[inline]
    pub fn is_in_flight(&self, id: ErrorId) -> bool {
        self.in_flight.contains(&id)
    }

    /// Errors recorded per type since creation (not limited by the history cap)
    pub fn count_by_type(&self, error_type: ErrorType) -> u64 {
        self.by_type.get(&error_type).copied().unwrap_or(0)
    }

    pub fn count_by_severity(&self, severity: Severity) -> u64 {
        self.by_severity.get(&severity).copied().unwrap_or(0)
    }

    pub fn total_errors(&self) -> u64 {
        self.by_type.values().sum()
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn config(&self) -> &RecoveryConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{Element, HeadlessElement};
    use crate::time::ManualClock;
    use crate::transform::Channel;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn processor(clock: &ManualClock) -> TransformProcessor {
        TransformProcessor::new(Rc::new(clock.clone()), 100.0, 16)
    }

    #[test]
    fn severity_heuristics() {
        assert_eq!(Severity::infer("Out of memory"), Severity::High);
        assert_eq!(Severity::infer("Performance degraded"), Severity::High);
        assert_eq!(Severity::infer("fatal: loop crashed"), Severity::Critical);
        assert_eq!(Severity::infer("Element detached during animation"), Severity::Medium);
        assert_eq!(Severity::infer("something odd"), Severity::Low);
    }

    #[test]
    fn history_is_bounded_fifo() {
        let mut manager = RecoveryManager::new(RecoveryConfig {
            history_capacity: 3,
            ..RecoveryConfig::default()
        });
        let ids: Vec<_> = (0..5)
            .map(|i| manager.report(AnimationError::engine(format!("e{i}")), ErrorContext::default(), 0.0))
            .collect();
        assert_eq!(manager.history_len(), 3);
        assert!(manager.get(ids[0]).is_none());
        assert!(manager.get(ids[4]).is_some());
        assert_eq!(manager.count_by_type(ErrorType::Engine), 5);
    }

    #[test]
    fn detached_element_retries_with_backoff_then_falls_back() {
        let clock = ManualClock::new();
        let mut p = processor(&clock);
        let mut manager = RecoveryManager::new(RecoveryConfig::default());
        let headless = HeadlessElement::boxed();
        headless.detach();
        let el: ElementRef = headless.clone();

        let id = manager.report(
            AnimationError::ElementDetached { id: AnimationId(1) },
            ErrorContext::for_animation(AnimationId(1), el, None),
            0.0,
        );
        // animation strategy: 3 attempts, 100 ms doubling
        assert!(manager.poll(50.0, &mut p).is_empty());
        let first = manager.poll(100.0, &mut p);
        assert_eq!(
            first[0].outcome,
            RecoveryOutcome::Retrying { attempt: 1, next_at: 300.0 }
        );
        let second = manager.poll(300.0, &mut p);
        assert_eq!(
            second[0].outcome,
            RecoveryOutcome::Retrying { attempt: 2, next_at: 700.0 }
        );
        assert!(manager.is_in_flight(id));
        let last = manager.poll(700.0, &mut p);
        assert_eq!(
            last[0].outcome,
            RecoveryOutcome::FellBack { action: FallbackAction::Simplified, notified: false }
        );
        assert!(!manager.is_in_flight(id));
        assert_eq!(manager.get(id).unwrap().recovery_attempts, 3);
        assert_eq!(manager.pending_count(), 0);
    }

    #[test]
    fn simplified_fallback_fades_the_element_in() {
        let clock = ManualClock::new();
        let mut p = processor(&clock);
        let mut config = RecoveryConfig::default();
        config.strategies.animation.max_attempts = 0;
        let mut manager = RecoveryManager::new(config);
        let headless = HeadlessElement::boxed();
        headless.set_opacity(0.25);
        let el: ElementRef = headless.clone();

        manager.report(
            AnimationError::EasingFailed { name: "wobble".into(), reason: "NaN".into() },
            ErrorContext::for_element(el),
            0.0,
        );
        let reports = manager.poll(0.0, &mut p);
        assert_eq!(
            reports[0].outcome,
            RecoveryOutcome::FellBack { action: FallbackAction::Simplified, notified: false }
        );
        assert_eq!(headless.transition().as_deref(), Some(SIMPLIFIED_FADE));
        assert_eq!(headless.opacity(), 1.0);
    }

    #[test]
    fn transform_repair_snaps_to_identity() {
        let clock = ManualClock::new();
        let mut p = processor(&clock);
        let mut manager = RecoveryManager::new(RecoveryConfig::default());
        let headless = HeadlessElement::boxed();
        headless.set_transform("translate3d(40px, 0px, 0px)");
        let el: ElementRef = headless.clone();

        manager.report(
            AnimationError::TransformParse { reason: "bad".to_string() },
            ErrorContext::for_element(el),
            0.0,
        );
        let reports = manager.poll(50.0, &mut p);
        assert_eq!(reports[0].outcome, RecoveryOutcome::Repaired);
        assert!(headless.current_transform().is_identity());
        assert_eq!(headless.current_transform().get(Channel::ScaleX), Some(1.0));
    }

    #[test]
    fn performance_error_engages_brake_and_expires() {
        let clock = ManualClock::new();
        let mut p = processor(&clock);
        let mut manager = RecoveryManager::new(RecoveryConfig::default());
        manager.report(
            AnimationError::PerformanceDegraded {
                metric: "frameTimeMs".to_string(),
                value: 90.0,
                threshold: 33.33,
            },
            ErrorContext::default(),
            1000.0,
        );
        assert_eq!(manager.poll(1000.0, &mut p)[0].outcome, RecoveryOutcome::Repaired);
        assert_eq!(manager.duration_override(2000.0), Some(1.0));
        assert_eq!(manager.duration_override(4000.0), None);
    }

    #[test]
    fn unrecoverable_error_falls_back_and_notifies() {
        let clock = ManualClock::new();
        let mut p = processor(&clock);
        let mut manager = RecoveryManager::new(RecoveryConfig::default());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        manager.set_notifier(Box::new(move |record| {
            sink.borrow_mut().push(record.message.clone());
            Ok(())
        }));
        let headless = HeadlessElement::boxed();
        headless.set_transform("rotateZ(10deg)");
        let el: ElementRef = headless.clone();

        manager.report(
            AnimationError::AnimationNotFound { id: AnimationId(9) },
            ErrorContext::for_element(el),
            0.0,
        );
        // Unrecoverable: no repair attempts and no backoff before the fallback
        let reports = manager.poll(0.0, &mut p);
        assert_eq!(reports.len(), 1);
        assert_eq!(manager.pending_count(), 0);
        assert_eq!(
            reports[0].outcome,
            RecoveryOutcome::FellBack { action: FallbackAction::Remove, notified: true }
        );
        assert_eq!(headless.transform_css(), None);
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn failing_notifier_is_isolated() {
        let clock = ManualClock::new();
        let mut p = processor(&clock);
        let mut manager = RecoveryManager::new(RecoveryConfig::default());
        manager.set_notifier(Box::new(|_| anyhow::bail!("toast service unavailable")));
        manager.report(
            AnimationError::AnimationNotFound { id: AnimationId(2) },
            ErrorContext::default(),
            0.0,
        );
        let reports = manager.poll(16.0, &mut p);
        assert_eq!(
            reports[0].outcome,
            RecoveryOutcome::FellBack { action: FallbackAction::Remove, notified: false }
        );
        assert_eq!(manager.pending_count(), 0);
    }

    #[test]
    fn retry_is_single_flight() {
        let clock = ManualClock::new();
        let mut p = processor(&clock);
        let mut manager = RecoveryManager::new(RecoveryConfig::default());
        let id = manager.report(AnimationError::engine("boom"), ErrorContext::default(), 0.0);
        assert!(!manager.retry(id, 0.0));
        manager.poll(1000.0, &mut p);
        assert!(!manager.is_in_flight(id));
        assert!(manager.retry(id, 1000.0));
        assert!(!manager.retry(id, 1000.0));
        assert_eq!(manager.pending_count(), 1);
    }
}
