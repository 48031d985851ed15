//! Closed-form damped harmonic oscillator easing.

use serde::{Deserialize, Serialize};

use super::EasingFunction;
use crate::AnimationError;

/// Damping regime of a spring, picked from the damping ratio ζ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Damping {
    Underdamped,
    Critical,
    Overdamped,
}

/// Unit step response of a mass-spring-damper, sampled over `duration_s` seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpringEasing {
    pub stiffness: f64,
    pub friction: f64,
    pub mass: f64,
    /// Simulated seconds mapped onto progress `[0, 1]`
    pub duration_s: f64,
}

impl Default for SpringEasing {
    fn default() -> Self {
        Self {
            stiffness: 170.0,
            friction: 26.0,
            mass: 1.0,
            duration_s: 1.0,
        }
    }
}

impl SpringEasing {
    pub fn new(stiffness: f64, friction: f64, mass: f64) -> Result<Self, AnimationError> {
        let easing = Self {
            stiffness,
            friction,
            mass,
            ..Self::default()
        };
        easing.validate()?;
        Ok(easing)
    }

    pub fn with_duration(mut self, duration_s: f64) -> Self {
        self.duration_s = duration_s;
        self
    }

    pub fn validate(&self) -> Result<(), AnimationError> {
        if !(self.stiffness > 0.0) {
            return Err(AnimationError::invalid_config(
                "stiffness",
                self.stiffness,
                "must be positive",
            ));
        }
        if !(self.mass > 0.0) {
            return Err(AnimationError::invalid_config("mass", self.mass, "must be positive"));
        }
        if !(self.friction >= 0.0) {
            return Err(AnimationError::invalid_config(
                "friction",
                self.friction,
                "must not be negative",
            ));
        }
        if !(self.duration_s > 0.0) {
            return Err(AnimationError::invalid_config(
                "duration_s",
                self.duration_s,
                "must be positive",
            ));
        }
        Ok(())
    }

    /// ζ = friction / (2·√(stiffness·mass))
    #[inline]
    pub fn damping_ratio(&self) -> f64 {
        self.friction / (2.0 * (self.stiffness * self.mass).sqrt())
    }

    pub fn damping(&self) -> Damping {
        let zeta = self.damping_ratio();
        if (zeta - 1.0).abs() < 1e-9 {
            Damping::Critical
        } else if zeta < 1.0 {
            Damping::Underdamped
        } else {
            Damping::Overdamped
        }
    }

    /// Displacement toward the target (0 → 1) after `t` seconds, starting at rest
    pub fn response(&self, t: f64) -> f64 {
        let w0 = (self.stiffness / self.mass).sqrt();
        let zeta = self.damping_ratio();
        match self.damping() {
            Damping::Underdamped => {
                let wd = w0 * (1.0 - zeta * zeta).sqrt();
                let envelope = (-zeta * w0 * t).exp();
                1.0 - envelope * ((wd * t).cos() + (zeta * w0 / wd) * (wd * t).sin())
            }
            Damping::Critical => 1.0 - (-w0 * t).exp() * (1.0 + w0 * t),
            Damping::Overdamped => {
                let root = (zeta * zeta - 1.0).sqrt();
                let r1 = w0 * (-zeta + root);
                let r2 = w0 * (-zeta - root);
                1.0 - (r2 * (r1 * t).exp() - r1 * (r2 * t).exp()) / (r2 - r1)
            }
        }
    }
}

impl EasingFunction for SpringEasing {
    fn name(&self) -> &str {
        "spring"
    }

    fn ease(&self, t: f64) -> Result<f64, AnimationError> {
        if t <= 0.0 {
            return Ok(0.0);
        }
        if t >= 1.0 {
            return Ok(1.0);
        }
        let value = self.response(t * self.duration_s);
        if value.is_finite() {
            Ok(value)
        } else {
            Err(AnimationError::EasingFailed {
                name: "spring".to_string(),
                reason: format!("non-finite response at t = {t}"),
            })
        }
    }
}
