//! Spring and free-body parameters.

use serde::{Deserialize, Serialize};

use crate::element::Rect;
use crate::AnimationError;

/// Absolute ceiling on a physics animation's active time. A larger
/// `maxDurationMs` is accepted but never extends a body past this.
pub const PHYSICS_HARD_CAP_MS: f64 = 10_000.0;

/// Spring constants and termination thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpringConfig {
    /// Stiffness (k)
    pub tension: f64,
    /// Damping coefficient (c)
    pub friction: f64,
    pub mass: f64,
    /// Initial velocity applied to every animated channel, units per second
    pub velocity: f64,
    /// Smallest per-channel change worth writing to the element
    pub precision: f64,
    /// Snap to target instead of overshooting
    pub clamp: bool,
    pub rest_velocity_threshold: f64,
    pub rest_displacement_threshold: f64,
    /// Hard cap on integration steps
    pub max_iterations: u32,
}

impl Default for SpringConfig {
    fn default() -> Self {
        Self {
            tension: 170.0,
            friction: 26.0,
            mass: 1.0,
            velocity: 0.0,
            precision: 0.01,
            clamp: false,
            rest_velocity_threshold: 0.01,
            rest_displacement_threshold: 0.01,
            max_iterations: 1000,
        }
    }
}

impl SpringConfig {
    /// Soft, slow spring
    pub fn gentle() -> Self {
        Self {
            tension: 120.0,
            friction: 14.0,
            ..Self::default()
        }
    }

    /// Lively spring with visible overshoot
    pub fn wobbly() -> Self {
        Self {
            tension: 180.0,
            friction: 12.0,
            ..Self::default()
        }
    }

    pub fn stiff() -> Self {
        Self {
            tension: 210.0,
            friction: 20.0,
            ..Self::default()
        }
    }

    #[inline]
    pub fn with_tension(mut self, tension: f64) -> Self {
        self.tension = tension;
        self
    }

    #[inline]
    pub fn with_friction(mut self, friction: f64) -> Self {
        self.friction = friction;
        self
    }

    #[inline]
    pub fn with_mass(mut self, mass: f64) -> Self {
        self.mass = mass;
        self
    }

    #[inline]
    pub fn with_velocity(mut self, velocity: f64) -> Self {
        self.velocity = velocity;
        self
    }

    #[inline]
    pub fn with_clamp(mut self, clamp: bool) -> Self {
        self.clamp = clamp;
        self
    }

    #[inline]
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn validate(&self) -> Result<(), AnimationError> {
        if !(self.tension > 0.0) || !self.tension.is_finite() {
            return Err(AnimationError::invalid_config(
                "tension",
                self.tension,
                "must be positive and finite",
            ));
        }
        if !(self.mass > 0.0) || !self.mass.is_finite() {
            return Err(AnimationError::invalid_config(
                "mass",
                self.mass,
                "must be positive and finite",
            ));
        }
        if !(self.friction >= 0.0) || !self.friction.is_finite() {
            return Err(AnimationError::invalid_config(
                "friction",
                self.friction,
                "must be non-negative and finite",
            ));
        }
        if !self.velocity.is_finite() {
            return Err(AnimationError::invalid_config(
                "velocity",
                self.velocity,
                "must be finite",
            ));
        }
        for (field, value) in [
            ("precision", self.precision),
            ("restVelocityThreshold", self.rest_velocity_threshold),
            ("restDisplacementThreshold", self.rest_displacement_threshold),
        ] {
            if !(value > 0.0) || !value.is_finite() {
                return Err(AnimationError::invalid_config(
                    field,
                    value,
                    "must be positive and finite",
                ));
            }
        }
        if self.max_iterations == 0 {
            return Err(AnimationError::invalid_config(
                "maxIterations",
                0.0,
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Rectangle the body's translation stays inside, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Boundary {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Boundary {
    pub fn new(top: f64, right: f64, bottom: f64, left: f64) -> Self {
        Self {
            top,
            right,
            bottom,
            left,
        }
    }

    /// Translation range that keeps `layout` inside `surface`
    pub fn containing(layout: &Rect, surface: &Rect) -> Self {
        Self {
            top: surface.y - layout.y,
            right: surface.right() - layout.right(),
            bottom: surface.bottom() - layout.bottom(),
            left: surface.x - layout.x,
        }
    }

    pub fn validate(&self) -> Result<(), AnimationError> {
        for (field, value) in [
            ("bounds.top", self.top),
            ("bounds.right", self.right),
            ("bounds.bottom", self.bottom),
            ("bounds.left", self.left),
        ] {
            if !value.is_finite() {
                return Err(AnimationError::invalid_config(field, value, "must be finite"));
            }
        }
        if self.left > self.right {
            return Err(AnimationError::invalid_config(
                "bounds.left",
                self.left,
                "must not exceed bounds.right",
            ));
        }
        if self.top > self.bottom {
            return Err(AnimationError::invalid_config(
                "bounds.top",
                self.top,
                "must not exceed bounds.bottom",
            ));
        }
        Ok(())
    }
}

/// Free-body simulation parameters. Units are pixels and seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PhysicsConfig {
    /// Downward acceleration, px/s²
    pub gravity: f64,
    /// Fraction of horizontal velocity removed on each bottom contact
    pub friction: f64,
    /// Fraction of normal velocity kept after a bounce
    pub restitution: f64,
    /// Fraction of velocity lost per 1/60 s of flight
    pub air_resistance: f64,
    /// Speed under which a body resting on the floor is done
    pub min_velocity: f64,
    pub max_velocity: f64,
    pub initial_velocity_x: f64,
    pub initial_velocity_y: f64,
    /// Defaults to the viewport minus the element's own box
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounds: Option<Boundary>,
    /// Wall-clock safety cap, never beyond [`PHYSICS_HARD_CAP_MS`]
    pub max_duration_ms: f64,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: 980.0,
            friction: 0.2,
            restitution: 0.6,
            air_resistance: 0.01,
            min_velocity: 20.0,
            max_velocity: 5000.0,
            initial_velocity_x: 0.0,
            initial_velocity_y: 0.0,
            bounds: None,
            max_duration_ms: 10_000.0,
        }
    }
}

impl PhysicsConfig {
    #[inline]
    pub fn with_velocity(mut self, vx: f64, vy: f64) -> Self {
        self.initial_velocity_x = vx;
        self.initial_velocity_y = vy;
        self
    }

    #[inline]
    pub fn with_gravity(mut self, gravity: f64) -> Self {
        self.gravity = gravity;
        self
    }

    #[inline]
    pub fn with_restitution(mut self, restitution: f64) -> Self {
        self.restitution = restitution;
        self
    }

    #[inline]
    pub fn with_bounds(mut self, bounds: Boundary) -> Self {
        self.bounds = Some(bounds);
        self
    }

    /// Active time after which the body is finished regardless of motion
    #[inline]
    pub fn time_cap_ms(&self) -> f64 {
        self.max_duration_ms.min(PHYSICS_HARD_CAP_MS)
    }

    pub fn validate(&self) -> Result<(), AnimationError> {
        for (field, value) in [
            ("gravity", self.gravity),
            ("initialVelocityX", self.initial_velocity_x),
            ("initialVelocityY", self.initial_velocity_y),
        ] {
            if !value.is_finite() {
                return Err(AnimationError::invalid_config(field, value, "must be finite"));
            }
        }
        for (field, value) in [
            ("friction", self.friction),
            ("restitution", self.restitution),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(AnimationError::invalid_config(
                    field,
                    value,
                    "must be within [0, 1]",
                ));
            }
        }
        if !(0.0..1.0).contains(&self.air_resistance) {
            return Err(AnimationError::invalid_config(
                "airResistance",
                self.air_resistance,
                "must be within [0, 1)",
            ));
        }
        if !(self.min_velocity >= 0.0) || !self.min_velocity.is_finite() {
            return Err(AnimationError::invalid_config(
                "minVelocity",
                self.min_velocity,
                "must be non-negative and finite",
            ));
        }
        if !(self.max_velocity > self.min_velocity) {
            return Err(AnimationError::invalid_config(
                "maxVelocity",
                self.max_velocity,
                "must exceed minVelocity",
            ));
        }
        if !(self.max_duration_ms > 0.0) || !self.max_duration_ms.is_finite() {
            return Err(AnimationError::invalid_config(
                "maxDurationMs",
                self.max_duration_ms,
                "must be positive and finite",
            ));
        }
        if let Some(bounds) = &self.bounds {
            bounds.validate()?;
        }
        Ok(())
    }
}
