//! Progress-shaping functions.
//!
//! Every easing maps progress in `[0, 1]` to a shaped value. Most stay inside
//! `[0, 1]`; back, elastic, bounce and overshooting beziers may leave it briefly.

pub mod bezier;
pub mod functions;
pub mod registry;
pub mod spring;

pub use bezier::CubicBezier;
pub use functions::PennerEasing;
pub use registry::EasingLibrary;
pub use spring::{Damping, SpringEasing};

use std::fmt;
use std::rc::Rc;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::AnimationError;

/// Trait for easing functions
pub trait EasingFunction {
    /// Registry name
    fn name(&self) -> &str;

    /// Shape `t`. Custom functions may fail; built-ins never do.
    fn ease(&self, t: f64) -> Result<f64, AnimationError>;
}

/// Easing backed by a closure, for host-registered curves
pub struct FnEasing<F> {
    name: String,
    f: F,
}

impl<F> FnEasing<F>
where
    F: Fn(f64) -> Result<f64, AnimationError>,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> EasingFunction for FnEasing<F>
where
    F: Fn(f64) -> Result<f64, AnimationError>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn ease(&self, t: f64) -> Result<f64, AnimationError> {
        (self.f)(t)
    }
}

/// Easing as it appears in configuration: a registry name or bezier control points.
///
/// Serialized as `"easeOutQuad"` or `{"bezier": [x1, y1, x2, y2]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Easing {
    Named(String),
    Bezier { bezier: [f64; 4] },
}

impl Easing {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    pub fn bezier(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self::Bezier {
            bezier: [x1, y1, x2, y2],
        }
    }

    pub fn linear() -> Self {
        Self::named("linear")
    }
}

impl Default for Easing {
    fn default() -> Self {
        Self::named("easeOutCubic")
    }
}

impl fmt::Display for Easing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.write_str(name),
            Self::Bezier { bezier: [x1, y1, x2, y2] } => {
                write!(f, "cubic-bezier({x1}, {y1}, {x2}, {y2})")
            }
        }
    }
}

/// Easing bound to an animator.
///
/// Named easings go through the same guard as [`EasingLibrary::apply`]: failures
/// and non-finite output fall back to linear, and the result is clamped to
/// `[0, 1]`. Bezier curves are raw so they can overshoot.
#[derive(Clone)]
pub struct ResolvedEasing {
    function: Rc<dyn EasingFunction>,
    clamp: bool,
}

impl ResolvedEasing {
    pub fn clamped(function: Rc<dyn EasingFunction>) -> Self {
        Self {
            function,
            clamp: true,
        }
    }

    pub fn raw(function: Rc<dyn EasingFunction>) -> Self {
        Self {
            function,
            clamp: false,
        }
    }

    pub fn linear() -> Self {
        Self::clamped(Rc::new(functions::PENNER_CURVES[0]))
    }

    pub fn name(&self) -> &str {
        self.function.name()
    }

    /// Shape `t`, never failing
    pub fn ease(&self, t: f64) -> f64 {
        let shaped = guarded(self.function.as_ref(), t);
        if self.clamp {
            shaped.clamp(0.0, 1.0)
        } else {
            shaped
        }
    }
}

impl fmt::Debug for ResolvedEasing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedEasing")
            .field("name", &self.function.name())
            .field("clamp", &self.clamp)
            .finish()
    }
}

/// Evaluate `function`, returning `t` unchanged on failure or non-finite output
pub(crate) fn guarded(function: &dyn EasingFunction, t: f64) -> f64 {
    match function.ease(t) {
        Ok(v) if v.is_finite() => v,
        Ok(v) => {
            warn!(
                "easing '{}' produced non-finite value {v} at t = {t}; using linear",
                function.name()
            );
            t
        }
        Err(err) => {
            warn!("easing '{}' failed: {err}; using linear", function.name());
            t
        }
    }
}
