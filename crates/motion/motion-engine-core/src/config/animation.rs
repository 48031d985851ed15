//! Per-animation playback configuration.

use serde::{Deserialize, Serialize};

use crate::easing::Easing;
use crate::AnimationError;

/// How many times an animation plays after its first iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Repeat {
    /// Extra iterations after the first one
    Count(u32),
    Infinite,
}

impl Repeat {
    /// Total iterations, `None` when infinite
    #[inline]
    pub fn iterations(&self) -> Option<u64> {
        match self {
            Self::Count(n) => Some(u64::from(*n) + 1),
            Self::Infinite => None,
        }
    }
}

impl Default for Repeat {
    fn default() -> Self {
        Self::Count(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    #[default]
    Normal,
    Reverse,
    Alternate,
    AlternateReverse,
}

impl Direction {
    /// Whether iteration `index` (0-based) runs end to start
    #[inline]
    pub fn is_reversed(&self, index: u64) -> bool {
        let odd = index % 2 == 1;
        match self {
            Self::Normal => false,
            Self::Reverse => true,
            Self::Alternate => odd,
            Self::AlternateReverse => !odd,
        }
    }
}

/// What the element shows outside the active interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FillMode {
    /// Restore the starting transform when done
    None,
    /// Keep the final frame
    #[default]
    Forwards,
    /// Show the first frame during the delay
    Backwards,
    Both,
}

impl FillMode {
    #[inline]
    pub fn fills_forwards(&self) -> bool {
        matches!(self, Self::Forwards | Self::Both)
    }

    #[inline]
    pub fn fills_backwards(&self) -> bool {
        matches!(self, Self::Backwards | Self::Both)
    }
}

/// Work/quality trade-off for a single animation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PerformanceMode {
    /// Render hints and the configured curve everywhere
    #[default]
    Quality,
    /// Render hints kept, keyframe segments interpolated linearly
    Balanced,
    /// No render hints, linear keyframe segments
    Battery,
}

impl PerformanceMode {
    #[inline]
    pub fn uses_render_hints(&self) -> bool {
        !matches!(self, Self::Battery)
    }

    #[inline]
    pub fn linear_keyframes(&self) -> bool {
        !matches!(self, Self::Quality)
    }
}

/// Resolved, validated configuration of one animation. Immutable once started.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnimationConfig {
    /// Length of one iteration
    pub duration_ms: f64,
    pub easing: Easing,
    pub delay_ms: f64,
    pub repeat: Repeat,
    pub direction: Direction,
    pub fill_mode: FillMode,
    /// Scheduling priority; see `SchedulerConfig` for the band cutoffs
    pub priority: i32,
    pub performance_mode: PerformanceMode,
    pub reduced_motion: bool,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            duration_ms: 300.0,
            easing: Easing::default(),
            delay_ms: 0.0,
            repeat: Repeat::default(),
            direction: Direction::default(),
            fill_mode: FillMode::default(),
            priority: 1,
            performance_mode: PerformanceMode::default(),
            reduced_motion: false,
        }
    }
}

impl AnimationConfig {
    pub fn validate(&self) -> Result<(), AnimationError> {
        if !(self.duration_ms > 0.0) || !self.duration_ms.is_finite() {
            return Err(AnimationError::invalid_config(
                "duration",
                self.duration_ms,
                "must be positive and finite",
            ));
        }
        if !(self.delay_ms >= 0.0) || !self.delay_ms.is_finite() {
            return Err(AnimationError::invalid_config(
                "delay",
                self.delay_ms,
                "must be non-negative and finite",
            ));
        }
        if let Easing::Bezier { bezier } = &self.easing {
            crate::easing::CubicBezier::from_points(*bezier)?;
        }
        Ok(())
    }

    /// Total active time, `None` for infinite repeats
    pub fn active_duration_ms(&self) -> Option<f64> {
        self.repeat
            .iterations()
            .map(|n| self.duration_ms * n as f64)
    }
}

/// Caller overrides for one animation. Unset fields take the engine defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnimationOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub easing: Option<Easing>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeat: Option<Repeat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill_mode: Option<FillMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub performance_mode: Option<PerformanceMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reduced_motion: Option<bool>,
}

impl AnimationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn with_duration(mut self, ms: f64) -> Self {
        self.duration_ms = Some(ms);
        self
    }

    #[inline]
    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = Some(easing);
        self
    }

    #[inline]
    pub fn with_delay(mut self, ms: f64) -> Self {
        self.delay_ms = Some(ms);
        self
    }

    #[inline]
    pub fn with_repeat(mut self, repeat: Repeat) -> Self {
        self.repeat = Some(repeat);
        self
    }

    #[inline]
    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    #[inline]
    pub fn with_fill_mode(mut self, fill_mode: FillMode) -> Self {
        self.fill_mode = Some(fill_mode);
        self
    }

    #[inline]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    #[inline]
    pub fn with_performance_mode(mut self, mode: PerformanceMode) -> Self {
        self.performance_mode = Some(mode);
        self
    }

    #[inline]
    pub fn with_reduced_motion(mut self, reduced: bool) -> Self {
        self.reduced_motion = Some(reduced);
        self
    }

    /// Merge over `defaults` and validate the result
    pub fn resolve(&self, defaults: &AnimationConfig) -> Result<AnimationConfig, AnimationError> {
        let config = AnimationConfig {
            duration_ms: self.duration_ms.unwrap_or(defaults.duration_ms),
            easing: self.easing.clone().unwrap_or_else(|| defaults.easing.clone()),
            delay_ms: self.delay_ms.unwrap_or(defaults.delay_ms),
            repeat: self.repeat.unwrap_or(defaults.repeat),
            direction: self.direction.unwrap_or(defaults.direction),
            fill_mode: self.fill_mode.unwrap_or(defaults.fill_mode),
            priority: self.priority.unwrap_or(defaults.priority),
            performance_mode: self.performance_mode.unwrap_or(defaults.performance_mode),
            reduced_motion: self.reduced_motion.unwrap_or(defaults.reduced_motion),
        };
        config.validate()?;
        Ok(config)
    }
}
