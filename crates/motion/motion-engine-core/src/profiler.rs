//! Per-frame performance metrics with a rolling window.

use std::collections::VecDeque;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::config::ProfilerConfig;
use crate::time::ClockRef;
use crate::transform::RenderStats;

/// One completed frame
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    pub fps: f64,
    /// Wall-clock time since the previous frame started
    pub frame_time_ms: f64,
    pub memory_mb: f64,
    pub active_animations: usize,
    /// Over-budget ticks so far
    pub dropped_frames: u64,
    pub rendering_time_ms: f64,
    /// Forced layout flushes so far
    pub layout_thrash: u64,
    pub timestamp: f64,
}

/// What the engine knows about a frame when it ends
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameReport {
    pub active_animations: usize,
    pub dropped_frames: u64,
    pub render: RenderStats,
}

/// Handle for removing a listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub type MetricsListener = Box<dyn FnMut(&PerformanceMetrics) -> anyhow::Result<()>>;

/// Host-supplied memory reading in MB
pub type MemorySampler = Box<dyn Fn() -> Option<f64>>;

pub struct PerformanceProfiler {
    config: ProfilerConfig,
    clock: ClockRef,
    samples: VecDeque<PerformanceMetrics>,
    frame_started_at: Option<f64>,
    previous_frame_at: Option<f64>,
    layout_thrash: u64,
    listeners: Vec<(ListenerId, MetricsListener)>,
    next_listener: u64,
    listener_failures: u64,
    memory_sampler: Option<MemorySampler>,
}

impl PerformanceProfiler {
    pub fn new(config: ProfilerConfig, clock: ClockRef) -> Self {
        Self {
            samples: VecDeque::with_capacity(config.window_size),
            config,
            clock,
            frame_started_at: None,
            previous_frame_at: None,
            layout_thrash: 0,
            listeners: Vec::new(),
            next_listener: 0,
            listener_failures: 0,
            memory_sampler: None,
        }
    }

    /// Start measuring a frame
    pub fn begin_frame(&mut self) {
        self.frame_started_at = Some(self.clock.now_ms());
    }

    /// Finish the frame started by [`begin_frame`](Self::begin_frame), record it and
    /// notify listeners. Returns `None` when no frame was started.
    pub fn end_frame(&mut self, report: FrameReport) -> Option<PerformanceMetrics> {
        let started = self.frame_started_at.take()?;
        let now = self.clock.now_ms();

        let (frame_time_ms, fps) = match self.previous_frame_at {
            Some(previous) if started > previous => {
                let delta = started - previous;
                (delta, 1000.0 / delta)
            }
            _ => ((now - started).max(0.0), self.config.target_fps),
        };
        self.previous_frame_at = Some(started);
        self.layout_thrash += u64::from(report.render.layout_flushes);

        let memory_mb = self
            .memory_sampler
            .as_ref()
            .and_then(|sample| sample())
            .unwrap_or_else(|| {
                report.active_animations as f64 * self.config.memory_per_animation_kb / 1024.0
            });

        let metrics = PerformanceMetrics {
            fps,
            frame_time_ms,
            memory_mb,
            active_animations: report.active_animations,
            dropped_frames: report.dropped_frames,
            rendering_time_ms: report.render.rendering_time_ms,
            layout_thrash: self.layout_thrash,
            timestamp: now,
        };
        if self.samples.len() >= self.config.window_size {
            self.samples.pop_front();
        }
        self.samples.push_back(metrics);
        self.notify(&metrics);
        Some(metrics)
    }

    /// Forget the previous frame time, e.g. after the frame loop went idle
    pub fn reset_timing(&mut self) {
        self.previous_frame_at = None;
        self.frame_started_at = None;
    }

    fn notify(&mut self, metrics: &PerformanceMetrics) {
        for (id, listener) in self.listeners.iter_mut() {
            if let Err(err) = listener(metrics) {
                self.listener_failures += 1;
                warn!("metrics listener {:?} failed: {err:#}", id);
            }
        }
    }

    pub fn add_listener(&mut self, listener: MetricsListener) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, listener));
        id
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    pub fn set_memory_sampler(&mut self, sampler: MemorySampler) {
        self.memory_sampler = Some(sampler);
    }

    #[inline]
    pub fn latest(&self) -> Option<&PerformanceMetrics> {
        self.samples.back()
    }

    /// Mean of every sample in the window
    pub fn average(&self) -> Option<PerformanceMetrics> {
        if self.samples.is_empty() {
            return None;
        }
        let n = self.samples.len() as f64;
        let mut sum = PerformanceMetrics::default();
        let mut animations = 0usize;
        for s in &self.samples {
            sum.fps += s.fps;
            sum.frame_time_ms += s.frame_time_ms;
            sum.memory_mb += s.memory_mb;
            sum.rendering_time_ms += s.rendering_time_ms;
            animations += s.active_animations;
        }
        let latest = self.samples.back()?;
        Some(PerformanceMetrics {
            fps: sum.fps / n,
            frame_time_ms: sum.frame_time_ms / n,
            memory_mb: sum.memory_mb / n,
            active_animations: (animations as f64 / n).round() as usize,
            dropped_frames: latest.dropped_frames,
            rendering_time_ms: sum.rendering_time_ms / n,
            layout_thrash: latest.layout_thrash,
            timestamp: latest.timestamp,
        })
    }

    /// Composite health in `[0, 100]`: mean of five percentage terms, each clamped
    pub fn score_of(&self, m: &PerformanceMetrics) -> f64 {
        let frame_cap = self.config.max_frame_time_ms;
        let terms = [
            m.fps / self.config.target_fps,
            1.0 - m.frame_time_ms / frame_cap,
            1.0 - m.memory_mb / self.config.memory_cap_mb,
            1.0 - m.active_animations as f64 / self.config.animation_cap as f64,
            1.0 - m.rendering_time_ms / frame_cap,
        ];
        terms
            .iter()
            .map(|t| (t * 100.0).clamp(0.0, 100.0))
            .sum::<f64>()
            / terms.len() as f64
    }

    /// Score of the windowed average; 100 before any frame
    pub fn performance_score(&self) -> f64 {
        self.average().map_or(100.0, |avg| self.score_of(&avg))
    }

    /// Every threshold holds for the latest sample
    pub fn is_performance_good(&self) -> bool {
        let Some(m) = self.latest() else {
            return true;
        };
        m.fps >= self.config.min_fps
            && m.frame_time_ms <= self.config.max_frame_time_ms
            && m.memory_mb <= self.config.memory_cap_mb
            && m.active_animations <= self.config.animation_cap
            && m.rendering_time_ms <= self.config.max_rendering_time_ms
    }

    #[inline]
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn listener_failures(&self) -> u64 {
        self.listener_failures
    }

    pub fn config(&self) -> &ProfilerConfig {
        &self.config
    }
}
