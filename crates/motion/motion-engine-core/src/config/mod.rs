//! Configuration for the motion engine

pub mod animation;
pub mod physics;

pub use animation::{
    AnimationConfig, AnimationOptions, Direction, FillMode, PerformanceMode, Repeat,
};
pub use physics::{Boundary, PhysicsConfig, SpringConfig, PHYSICS_HARD_CAP_MS};

use serde::{Deserialize, Serialize};

use crate::element::Viewport;
use crate::recovery::{ErrorType, RecoveryStrategy};
use crate::AnimationError;

/// Top-level engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    pub scheduler: SchedulerConfig,
    pub profiler: ProfilerConfig,
    pub recovery: RecoveryConfig,
    pub transform_cache: TransformCacheConfig,
    /// Compiled bezier curves kept around
    pub easing_cache_size: usize,
    /// Defaults merged under every `AnimationOptions`
    pub animation: AnimationConfig,
    pub spring: SpringConfig,
    pub physics: PhysicsConfig,
    /// User prefers reduced motion: every creation call snaps instantly
    pub reduced_motion: bool,
    /// Surface size used for culling and physics bounds
    pub viewport: Viewport,
    /// Undrained events beyond this are dropped, oldest first
    pub max_events: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            profiler: ProfilerConfig::default(),
            recovery: RecoveryConfig::default(),
            transform_cache: TransformCacheConfig::default(),
            easing_cache_size: 64,
            animation: AnimationConfig::default(),
            spring: SpringConfig::default(),
            physics: PhysicsConfig::default(),
            reduced_motion: false,
            viewport: Viewport::default(),
            max_events: 1024,
        }
    }
}

impl EngineConfig {
    /// High refresh rate displays with plenty of headroom
    pub fn high_performance() -> Self {
        Self {
            scheduler: SchedulerConfig {
                frame_budget_ms: 8.0,
                max_frame_budget_ms: 8.0,
                min_frame_budget_ms: 2.0,
                max_concurrent: 100,
                max_concurrent_ceiling: 200,
                ..SchedulerConfig::default()
            },
            profiler: ProfilerConfig {
                target_fps: 120.0,
                window_size: 600,
                max_frame_time_ms: 16.67,
                max_rendering_time_ms: 8.0,
                ..ProfilerConfig::default()
            },
            transform_cache: TransformCacheConfig {
                capacity: 1024,
                ..TransformCacheConfig::default()
            },
            easing_cache_size: 128,
            ..Self::default()
        }
    }

    /// Battery-constrained devices: fewer concurrent animations, 30 fps target
    pub fn low_power() -> Self {
        Self {
            scheduler: SchedulerConfig {
                frame_budget_ms: 24.0,
                max_frame_budget_ms: 33.0,
                min_frame_budget_ms: 8.0,
                max_concurrent: 20,
                max_concurrent_ceiling: 30,
                ..SchedulerConfig::default()
            },
            profiler: ProfilerConfig {
                target_fps: 30.0,
                window_size: 150,
                max_frame_time_ms: 50.0,
                ..ProfilerConfig::default()
            },
            transform_cache: TransformCacheConfig {
                capacity: 128,
                ..TransformCacheConfig::default()
            },
            animation: AnimationConfig {
                performance_mode: PerformanceMode::Battery,
                ..AnimationConfig::default()
            },
            easing_cache_size: 16,
            ..Self::default()
        }
    }

    /// Parse and validate a JSON document. Missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self, AnimationError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AnimationError> {
        self.scheduler.validate()?;
        self.profiler.validate()?;
        self.recovery.validate()?;
        self.transform_cache.validate()?;
        self.animation.validate()?;
        self.spring.validate()?;
        self.physics.validate()?;
        if !(self.viewport.width > 0.0) || !(self.viewport.height > 0.0) {
            return Err(AnimationError::invalid_config(
                "viewport",
                self.viewport.width.min(self.viewport.height),
                "dimensions must be positive",
            ));
        }
        if self.max_events == 0 {
            return Err(AnimationError::invalid_config(
                "maxEvents",
                0.0,
                "must be at least 1",
            ));
        }
        Ok(())
    }

    #[inline]
    pub fn with_reduced_motion(mut self, reduced: bool) -> Self {
        self.reduced_motion = reduced;
        self
    }

    #[inline]
    pub fn with_viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = viewport;
        self
    }

    #[inline]
    pub fn with_scheduler(mut self, scheduler: SchedulerConfig) -> Self {
        self.scheduler = scheduler;
        self
    }

    #[inline]
    pub fn with_profiler(mut self, profiler: ProfilerConfig) -> Self {
        self.profiler = profiler;
        self
    }

    #[inline]
    pub fn with_recovery(mut self, recovery: RecoveryConfig) -> Self {
        self.recovery = recovery;
        self
    }

    #[inline]
    pub fn with_animation_defaults(mut self, animation: AnimationConfig) -> Self {
        self.animation = animation;
        self
    }

    #[inline]
    pub fn with_spring_defaults(mut self, spring: SpringConfig) -> Self {
        self.spring = spring;
        self
    }

    #[inline]
    pub fn with_physics_defaults(mut self, physics: PhysicsConfig) -> Self {
        self.physics = physics;
        self
    }
}

/// Priority bands, frame budget and adaptive complexity tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchedulerConfig {
    /// Starting per-tick budget
    pub frame_budget_ms: f64,
    pub min_frame_budget_ms: f64,
    pub max_frame_budget_ms: f64,
    /// Starting concurrency ceiling (animators advanced per tick)
    pub max_concurrent: usize,
    pub min_concurrent: usize,
    pub max_concurrent_ceiling: usize,
    /// Normal band runs only while elapsed < fraction · budget
    pub normal_band_fraction: f64,
    /// Low band runs only while elapsed < fraction · budget
    pub low_band_fraction: f64,
    /// Priorities strictly above this are high
    pub high_priority_above: i32,
    /// Priorities at or below this are low
    pub low_priority_at_or_below: i32,
    /// Applied to budget and ceiling after an over-budget tick
    pub shrink_factor: f64,
    /// Applied after `cheap_tick_streak` cheap ticks in a row
    pub grow_factor: f64,
    /// A tick is cheap when it used less than this fraction of the budget
    pub cheap_tick_fraction: f64,
    pub cheap_tick_streak: u32,
    /// Skip off-screen animators below the high band
    pub cull_offscreen: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            frame_budget_ms: 16.0,
            min_frame_budget_ms: 4.0,
            max_frame_budget_ms: 16.0,
            max_concurrent: 50,
            min_concurrent: 4,
            max_concurrent_ceiling: 100,
            normal_band_fraction: 0.7,
            low_band_fraction: 0.9,
            high_priority_above: 5,
            low_priority_at_or_below: 0,
            shrink_factor: 0.8,
            grow_factor: 1.1,
            cheap_tick_fraction: 0.5,
            cheap_tick_streak: 30,
            cull_offscreen: true,
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<(), AnimationError> {
        if !(self.min_frame_budget_ms > 0.0)
            || self.min_frame_budget_ms > self.max_frame_budget_ms
            || !(self.min_frame_budget_ms..=self.max_frame_budget_ms).contains(&self.frame_budget_ms)
        {
            return Err(AnimationError::invalid_config(
                "frameBudgetMs",
                self.frame_budget_ms,
                "must lie within [minFrameBudgetMs, maxFrameBudgetMs] with a positive floor",
            ));
        }
        if self.min_concurrent == 0
            || self.min_concurrent > self.max_concurrent_ceiling
            || !(self.min_concurrent..=self.max_concurrent_ceiling).contains(&self.max_concurrent)
        {
            return Err(AnimationError::invalid_config(
                "maxConcurrent",
                self.max_concurrent as f64,
                "must lie within [minConcurrent, maxConcurrentCeiling] with a floor of at least 1",
            ));
        }
        for (field, value) in [
            ("normalBandFraction", self.normal_band_fraction),
            ("lowBandFraction", self.low_band_fraction),
            ("cheapTickFraction", self.cheap_tick_fraction),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(AnimationError::invalid_config(
                    field,
                    value,
                    "must be within (0, 1]",
                ));
            }
        }
        if self.high_priority_above <= self.low_priority_at_or_below {
            return Err(AnimationError::invalid_config(
                "highPriorityAbove",
                f64::from(self.high_priority_above),
                "must exceed lowPriorityAtOrBelow",
            ));
        }
        if !(self.shrink_factor > 0.0 && self.shrink_factor < 1.0) {
            return Err(AnimationError::invalid_config(
                "shrinkFactor",
                self.shrink_factor,
                "must be within (0, 1)",
            ));
        }
        if !(self.grow_factor > 1.0) || !self.grow_factor.is_finite() {
            return Err(AnimationError::invalid_config(
                "growFactor",
                self.grow_factor,
                "must be greater than 1",
            ));
        }
        if self.cheap_tick_streak == 0 {
            return Err(AnimationError::invalid_config(
                "cheapTickStreak",
                0.0,
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Frame metrics window and health thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfilerConfig {
    /// Samples kept for averages
    pub window_size: usize,
    pub target_fps: f64,
    pub min_fps: f64,
    pub max_frame_time_ms: f64,
    pub max_rendering_time_ms: f64,
    /// Memory ceiling used by the score and the health check
    pub memory_cap_mb: f64,
    /// Active animation ceiling used by the score and the health check
    pub animation_cap: usize,
    /// Memory attributed to each live animation when the host supplies no sampler
    pub memory_per_animation_kb: f64,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            window_size: 300,
            target_fps: 60.0,
            min_fps: 30.0,
            max_frame_time_ms: 33.33,
            max_rendering_time_ms: 16.0,
            memory_cap_mb: 100.0,
            animation_cap: 100,
            memory_per_animation_kb: 4.0,
        }
    }
}

impl ProfilerConfig {
    pub fn validate(&self) -> Result<(), AnimationError> {
        if self.window_size == 0 {
            return Err(AnimationError::invalid_config(
                "windowSize",
                0.0,
                "must be at least 1",
            ));
        }
        for (field, value) in [
            ("targetFps", self.target_fps),
            ("maxFrameTimeMs", self.max_frame_time_ms),
            ("maxRenderingTimeMs", self.max_rendering_time_ms),
            ("memoryCapMb", self.memory_cap_mb),
        ] {
            if !(value > 0.0) || !value.is_finite() {
                return Err(AnimationError::invalid_config(
                    field,
                    value,
                    "must be positive and finite",
                ));
            }
        }
        if !(self.min_fps >= 0.0) || self.min_fps > self.target_fps {
            return Err(AnimationError::invalid_config(
                "minFps",
                self.min_fps,
                "must be within [0, targetFps]",
            ));
        }
        if self.animation_cap == 0 {
            return Err(AnimationError::invalid_config(
                "animationCap",
                0.0,
                "must be at least 1",
            ));
        }
        if !(self.memory_per_animation_kb >= 0.0) {
            return Err(AnimationError::invalid_config(
                "memoryPerAnimationKb",
                self.memory_per_animation_kb,
                "must not be negative",
            ));
        }
        Ok(())
    }
}

/// Per-type strategies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StrategyTable {
    pub animation: RecoveryStrategy,
    pub engine: RecoveryStrategy,
    pub transform: RecoveryStrategy,
    pub performance: RecoveryStrategy,
}

impl Default for StrategyTable {
    fn default() -> Self {
        Self {
            animation: RecoveryStrategy::default_for(ErrorType::Animation),
            engine: RecoveryStrategy::default_for(ErrorType::Engine),
            transform: RecoveryStrategy::default_for(ErrorType::Transform),
            performance: RecoveryStrategy::default_for(ErrorType::Performance),
        }
    }
}

impl StrategyTable {
    #[inline]
    pub fn get(&self, error_type: ErrorType) -> &RecoveryStrategy {
        match error_type {
            ErrorType::Animation => &self.animation,
            ErrorType::Engine => &self.engine,
            ErrorType::Transform => &self.transform,
            ErrorType::Performance => &self.performance,
        }
    }
}

/// Error history and recovery tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecoveryConfig {
    pub history_capacity: usize,
    /// How long the emergency brake stays engaged
    pub emergency_brake_ms: f64,
    /// Duration forced onto new animations while braking
    pub brake_duration_ms: f64,
    /// Consecutive over-budget frames at the scheduler floor before a performance error is raised
    pub degraded_frames_before_error: u32,
    pub strategies: StrategyTable,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            history_capacity: 100,
            emergency_brake_ms: 3000.0,
            brake_duration_ms: 1.0,
            degraded_frames_before_error: 30,
            strategies: StrategyTable::default(),
        }
    }
}

impl RecoveryConfig {
    pub fn validate(&self) -> Result<(), AnimationError> {
        if self.history_capacity == 0 {
            return Err(AnimationError::invalid_config(
                "historyCapacity",
                0.0,
                "must be at least 1",
            ));
        }
        if !(self.emergency_brake_ms >= 0.0) || !(self.brake_duration_ms > 0.0) {
            return Err(AnimationError::invalid_config(
                "emergencyBrakeMs",
                self.emergency_brake_ms,
                "brake window must be non-negative and the forced duration positive",
            ));
        }
        if self.degraded_frames_before_error == 0 {
            return Err(AnimationError::invalid_config(
                "degradedFramesBeforeError",
                0.0,
                "must be at least 1",
            ));
        }
        for error_type in ErrorType::ALL {
            self.strategies.get(error_type).validate()?;
        }
        Ok(())
    }
}

/// Transform read cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransformCacheConfig {
    pub ttl_ms: f64,
    pub capacity: usize,
    /// Frames between purges of detached elements
    pub purge_interval_frames: u64,
}

impl Default for TransformCacheConfig {
    fn default() -> Self {
        Self {
            ttl_ms: 100.0,
            capacity: 512,
            purge_interval_frames: 120,
        }
    }
}

impl TransformCacheConfig {
    pub fn validate(&self) -> Result<(), AnimationError> {
        if !(self.ttl_ms >= 0.0) || !self.ttl_ms.is_finite() {
            return Err(AnimationError::invalid_config(
                "ttlMs",
                self.ttl_ms,
                "must be non-negative and finite",
            ));
        }
        if self.capacity == 0 || self.purge_interval_frames == 0 {
            return Err(AnimationError::invalid_config(
                "capacity",
                self.capacity as f64,
                "capacity and purge interval must be at least 1",
            ));
        }
        Ok(())
    }
}
