//! Reads, writes and decomposes element transforms.
//!
//! Reads are cached per element for a short TTL. The cache is advisory: every
//! write invalidates the entry so the next read goes back to the element.

use std::num::NonZeroUsize;
use std::rc::Weak;

use log::{debug, warn};
use lru::LruCache;

use super::{ComputedMatrix, Transform};
use crate::element::{Element, ElementRef, RenderHint};
use crate::error::AnimationError;
use crate::ids::ElementKey;
use crate::time::ClockRef;

struct CacheEntry {
    transform: Transform,
    read_at_ms: f64,
    element: Weak<dyn Element>,
}

/// Per-frame rendering counters, drained by the profiler
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RenderStats {
    /// Time spent committing transforms
    pub rendering_time_ms: f64,
    /// Synchronous layout flushes forced by instant applies
    pub layout_flushes: u32,
    pub transform_writes: u32,
}

pub struct TransformProcessor {
    cache: LruCache<ElementKey, CacheEntry>,
    ttl_ms: f64,
    clock: ClockRef,
    stats: RenderStats,
    parse_failures: Vec<(ElementRef, AnimationError)>,
    cache_hits: u64,
    cache_misses: u64,
}

impl TransformProcessor {
    pub fn new(clock: ClockRef, ttl_ms: f64, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: LruCache::new(capacity),
            ttl_ms,
            clock,
            stats: RenderStats::default(),
            parse_failures: Vec::new(),
            cache_hits: 0,
            cache_misses: 0,
        }
    }

    /// Current transform of `element`, decomposed from its computed matrix.
    ///
    /// A missing or unparsable matrix reads as identity; parse failures are
    /// also queued for [`take_parse_failures`](Self::take_parse_failures).
    pub fn get_current_transform(&mut self, element: &ElementRef) -> Transform {
        let now = self.clock.now_ms();
        let key = element.key();
        if let Some(entry) = self.cache.get(&key) {
            if now - entry.read_at_ms <= self.ttl_ms {
                self.cache_hits += 1;
                return entry.transform.clone();
            }
        }
        self.cache_misses += 1;

        let transform = match self.read_transform(element) {
            Ok(t) => t,
            Err(err) => {
                warn!("reading transform of element {:?} failed: {err}", key);
                self.parse_failures.push((element.clone(), err));
                Transform::identity()
            }
        };
        self.cache.put(
            key,
            CacheEntry {
                transform: transform.clone(),
                read_at_ms: now,
                element: std::rc::Rc::downgrade(element),
            },
        );
        transform
    }

    /// Uncached, fallible read
    pub fn read_transform(&self, element: &ElementRef) -> Result<Transform, AnimationError> {
        let raw = element.computed_transform().unwrap_or_default();
        Ok(ComputedMatrix::parse(&raw)?
            .map(|m| m.decompose())
            .unwrap_or_else(Transform::identity))
    }

    /// Commit `transform` and mark the element as actively transforming
    pub fn apply_transform(&mut self, element: &ElementRef, transform: &Transform) {
        self.apply_with_hint(element, transform, Some(RenderHint::Transform));
    }

    /// Commit without touching the render hint
    pub fn apply_with_hint(
        &mut self,
        element: &ElementRef,
        transform: &Transform,
        hint: Option<RenderHint>,
    ) {
        let started = self.clock.now_ms();
        element.set_transform(&transform.to_css());
        if hint.is_some() {
            element.set_render_hint(hint);
        }
        self.cache.pop(&element.key());
        self.stats.transform_writes += 1;
        self.stats.rendering_time_ms += (self.clock.now_ms() - started).max(0.0);
    }

    /// Commit with transitions disabled and force a layout flush so the change
    /// is visible before the next tick.
    pub fn apply_transform_instantly(&mut self, element: &ElementRef, transform: &Transform) {
        let started = self.clock.now_ms();
        element.set_transition(Some("none"));
        element.set_transform(&transform.to_css());
        element.flush_layout();
        element.set_transition(None);
        self.cache.pop(&element.key());
        self.stats.transform_writes += 1;
        self.stats.layout_flushes += 1;
        self.stats.rendering_time_ms += (self.clock.now_ms() - started).max(0.0);
    }

    /// Blend two transforms (linear, smoothstep for scale)
    #[inline]
    pub fn interpolate_transform(start: &Transform, end: &Transform, progress: f64) -> Transform {
        start.interpolate(end, progress)
    }

    /// Remove the "actively transforming" hint
    pub fn reset_render_hint(&mut self, element: &ElementRef) {
        element.set_render_hint(None);
    }

    /// Drop all transform styling from the element
    pub fn clear_transform(&mut self, element: &ElementRef) {
        element.clear_transform();
        element.set_render_hint(None);
        self.cache.pop(&element.key());
    }

    pub fn invalidate(&mut self, key: ElementKey) {
        self.cache.pop(&key);
    }

    /// Drop entries whose element is gone or detached. Returns how many were removed.
    pub fn purge_detached(&mut self) -> usize {
        let dead: Vec<ElementKey> = self
            .cache
            .iter()
            .filter(|(_, entry)| {
                entry
                    .element
                    .upgrade()
                    .map_or(true, |el| !el.is_attached())
            })
            .map(|(key, _)| *key)
            .collect();
        for key in &dead {
            self.cache.pop(key);
        }
        if !dead.is_empty() {
            debug!("purged {} transform cache entries", dead.len());
        }
        dead.len()
    }

    /// Counters accumulated since the last call
    pub fn take_frame_stats(&mut self) -> RenderStats {
        std::mem::take(&mut self.stats)
    }

    pub fn take_parse_failures(&mut self) -> Vec<(ElementRef, AnimationError)> {
        std::mem::take(&mut self.parse_failures)
    }

    #[inline]
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Fraction of reads served from cache
    pub fn cache_hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }
}
