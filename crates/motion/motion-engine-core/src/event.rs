//! Animation lifecycle events and completion handles

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::channel::oneshot;
use futures::future::{FutureExt, Shared};
use serde::{Deserialize, Serialize};

use crate::ids::{AnimationId, ErrorId};
use crate::recovery::{ErrorType, FallbackAction};
use crate::AnimationError;

/// How an animation ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AnimationOutcome {
    Completed,
    Errored(AnimationError),
    Stopped,
}

impl AnimationOutcome {
    #[inline]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// Types of animation events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub enum EventKind {
    Started,
    Paused,
    Resumed,
    Completed,
    Errored(AnimationError),
    Stopped,
}

impl EventKind {
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Paused => "paused",
            Self::Resumed => "resumed",
            Self::Completed => "completed",
            Self::Errored(_) => "errored",
            Self::Stopped => "stopped",
        }
    }

    /// Completed, Errored or Stopped
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Errored(_) | Self::Stopped)
    }
}

impl From<AnimationOutcome> for EventKind {
    fn from(outcome: AnimationOutcome) -> Self {
        match outcome {
            AnimationOutcome::Completed => Self::Completed,
            AnimationOutcome::Errored(err) => Self::Errored(err),
            AnimationOutcome::Stopped => Self::Stopped,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimationEvent {
    pub id: AnimationId,
    pub kind: EventKind,
    pub timestamp: f64,
}

impl AnimationEvent {
    pub fn new(id: AnimationId, kind: EventKind, timestamp: f64) -> Self {
        Self {
            id,
            kind,
            timestamp,
        }
    }
}

/// User-facing notice raised when a notifying recovery strategy gives up
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineNotice {
    pub error_id: ErrorId,
    pub animation: Option<AnimationId>,
    pub error_type: ErrorType,
    pub action: FallbackAction,
    pub message: String,
    /// Whether the host notifier accepted it
    pub delivered: bool,
    pub timestamp: f64,
}

/// Bounded queue of undrained events and notices. Oldest entries drop first.
#[derive(Debug)]
pub struct EventFeed {
    capacity: usize,
    events: VecDeque<AnimationEvent>,
    notices: VecDeque<EngineNotice>,
    dropped: u64,
}

impl EventFeed {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            events: VecDeque::new(),
            notices: VecDeque::new(),
            dropped: 0,
        }
    }

    pub fn push(&mut self, event: AnimationEvent) {
        if self.events.len() >= self.capacity {
            self.events.pop_front();
            self.dropped += 1;
        }
        self.events.push_back(event);
    }

    pub fn push_notice(&mut self, notice: EngineNotice) {
        if self.notices.len() >= self.capacity {
            self.notices.pop_front();
            self.dropped += 1;
        }
        self.notices.push_back(notice);
    }

    pub fn drain(&mut self) -> Vec<AnimationEvent> {
        self.events.drain(..).collect()
    }

    pub fn drain_notices(&mut self) -> Vec<EngineNotice> {
        self.notices.drain(..).collect()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Entries discarded because nobody drained them in time
    #[inline]
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

/// Handle resolving once an animation reaches a terminal state.
///
/// Poll it with [`outcome`](Self::outcome) from a frame callback, or `.await` it
/// on a single-threaded executor. Clones observe the same resolution.
#[derive(Clone)]
pub struct Completion {
    id: AnimationId,
    receiver: Shared<oneshot::Receiver<AnimationOutcome>>,
}

impl Completion {
    /// Unresolved handle plus the sender the engine keeps
    pub(crate) fn pending(id: AnimationId) -> (Self, CompletionSender) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                id,
                receiver: rx.shared(),
            },
            CompletionSender(tx),
        )
    }

    /// Handle that is already resolved, e.g. for reduced-motion snaps
    pub(crate) fn resolved(id: AnimationId, outcome: AnimationOutcome) -> Self {
        let (completion, sender) = Self::pending(id);
        sender.resolve(outcome);
        completion
    }

    #[inline]
    pub fn id(&self) -> AnimationId {
        self.id
    }

    pub fn outcome(&self) -> Option<AnimationOutcome> {
        if let Some(settled) = self.receiver.peek() {
            return Some(settle(settled.clone()));
        }
        self.receiver.clone().now_or_never().map(settle)
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.outcome().is_some()
    }
}

/// A sender dropped without resolving means the engine went away
fn settle(received: Result<AnimationOutcome, oneshot::Canceled>) -> AnimationOutcome {
    received.unwrap_or(AnimationOutcome::Stopped)
}

impl Future for Completion {
    type Output = AnimationOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.receiver.poll_unpin(cx).map(settle)
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("id", &self.id)
            .field("outcome", &self.outcome())
            .finish()
    }
}

/// Engine side of a [`Completion`]. Resolving consumes it, so only the first
/// terminal state is ever delivered.
#[derive(Debug)]
pub(crate) struct CompletionSender(oneshot::Sender<AnimationOutcome>);

impl CompletionSender {
    pub(crate) fn resolve(self, outcome: AnimationOutcome) {
        // Every handle may already be gone; nothing is waiting then
        let _ = self.0.send(outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn completion_resolves_once_for_every_handle() {
        let (completion, sender) = Completion::pending(AnimationId(4));
        let waiter = completion.clone();
        assert_eq!(completion.outcome(), None);
        assert!(completion.clone().now_or_never().is_none());

        sender.resolve(AnimationOutcome::Stopped);
        assert!(completion.is_finished());
        assert_eq!(completion.outcome(), Some(AnimationOutcome::Stopped));
        assert_eq!(block_on(waiter), AnimationOutcome::Stopped);
        // Still readable after an await consumed one clone
        assert_eq!(completion.outcome(), Some(AnimationOutcome::Stopped));
    }

    #[test]
    fn dropped_sender_reads_as_stopped() {
        let (completion, sender) = Completion::pending(AnimationId(5));
        drop(sender);
        assert_eq!(completion.outcome(), Some(AnimationOutcome::Stopped));
        assert_eq!(block_on(completion), AnimationOutcome::Stopped);
    }

    #[test]
    fn feed_drops_oldest_when_full() {
        let mut feed = EventFeed::new(2);
        for n in 0..3 {
            feed.push(AnimationEvent::new(AnimationId(n), EventKind::Started, 0.0));
        }
        let drained = feed.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].id, AnimationId(1));
        assert_eq!(feed.dropped(), 1);
        assert!(feed.is_empty());
    }

    #[test]
    fn terminal_kinds() {
        assert!(EventKind::Stopped.is_terminal());
        assert!(!EventKind::Paused.is_terminal());
        assert_eq!(
            EventKind::from(AnimationOutcome::Errored(AnimationError::engine("x"))).name(),
            "errored"
        );
    }
}
