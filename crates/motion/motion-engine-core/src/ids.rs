//! Identifiers and simple allocators for engine entities.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Handle returned by every animation-creation entry point.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AnimationId(pub u64);

impl fmt::Display for AnimationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "anim-{}", self.0)
    }
}

/// Identifier of a recorded error. Random so records stay unique across engine resets.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ErrorId(pub Uuid);

impl ErrorId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ErrorId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ErrorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Stable key for an element, used by caches that must not keep the element alive.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ElementKey(pub u64);

/// Monotonic allocator for animation ids.
#[derive(Default, Debug)]
pub struct IdAllocator {
    next_animation: u64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn alloc_animation(&mut self) -> AnimationId {
        let id = AnimationId(self.next_animation);
        self.next_animation = self.next_animation.wrapping_add(1);
        id
    }
}
