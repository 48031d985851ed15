//! Cubic bezier easing compiled from control points.

use serde::{Deserialize, Serialize};

use super::EasingFunction;
use crate::AnimationError;

const TOLERANCE: f64 = 1e-6;
const MAX_STEPS: usize = 64;

/// CSS-style `cubic-bezier(x1, y1, x2, y2)` with fixed endpoints `(0,0)` and `(1,1)`.
///
/// Output is not clamped: `y1`/`y2` outside `[0, 1]` produce overshoot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CubicBezier {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl CubicBezier {
    /// Compile a curve. The x control points must lie in `[0, 1]` so X(t) is monotonic.
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Result<Self, AnimationError> {
        for (field, value) in [("x1", x1), ("x2", x2)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(AnimationError::invalid_config(
                    format!("bezier.{field}"),
                    value,
                    "must be within [0, 1]",
                ));
            }
        }
        for (field, value) in [("y1", y1), ("y2", y2)] {
            if !value.is_finite() {
                return Err(AnimationError::invalid_config(
                    format!("bezier.{field}"),
                    value,
                    "must be finite",
                ));
            }
        }
        Ok(Self { x1, y1, x2, y2 })
    }

    pub fn from_points(points: [f64; 4]) -> Result<Self, AnimationError> {
        Self::new(points[0], points[1], points[2], points[3])
    }

    /// Cache key shared by every curve with the same control points
    pub fn key(&self) -> String {
        format!("{},{},{},{}", self.x1, self.y1, self.x2, self.y2)
    }

    #[inline]
    fn component(p1: f64, p2: f64, t: f64) -> f64 {
        let u = 1.0 - t;
        3.0 * u * u * t * p1 + 3.0 * u * t * t * p2 + t * t * t
    }

    /// Parametric `t` whose X coordinate equals `x`, by bisection
    pub fn solve_t(&self, x: f64) -> f64 {
        let x = x.clamp(0.0, 1.0);
        let (mut lo, mut hi) = (0.0, 1.0);
        let mut t = x;
        for _ in 0..MAX_STEPS {
            let current = Self::component(self.x1, self.x2, t);
            if (current - x).abs() < TOLERANCE {
                break;
            }
            if current < x {
                lo = t;
            } else {
                hi = t;
            }
            t = (lo + hi) / 2.0;
        }
        t
    }

    /// Y for a given progress (the X coordinate)
    pub fn evaluate(&self, progress: f64) -> f64 {
        if progress <= 0.0 {
            return 0.0;
        }
        if progress >= 1.0 {
            return 1.0;
        }
        Self::component(self.y1, self.y2, self.solve_t(progress))
    }
}

impl EasingFunction for CubicBezier {
    fn name(&self) -> &str {
        "cubicBezier"
    }

    fn ease(&self, t: f64) -> Result<f64, AnimationError> {
        Ok(self.evaluate(t))
    }
}

/// Named CSS timing functions
pub const CSS_CURVES: [(&str, CubicBezier); 4] = [
    (
        "ease",
        CubicBezier {
            x1: 0.25,
            y1: 0.1,
            x2: 0.25,
            y2: 1.0,
        },
    ),
    (
        "easeIn",
        CubicBezier {
            x1: 0.42,
            y1: 0.0,
            x2: 1.0,
            y2: 1.0,
        },
    ),
    (
        "easeOut",
        CubicBezier {
            x1: 0.0,
            y1: 0.0,
            x2: 0.58,
            y2: 1.0,
        },
    ),
    (
        "easeInOut",
        CubicBezier {
            x1: 0.42,
            y1: 0.0,
            x2: 0.58,
            y2: 1.0,
        },
    ),
];
