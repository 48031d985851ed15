//! Closed-form Penner easing curves.

use std::f64::consts::PI;

use super::EasingFunction;
use crate::AnimationError;

/// Built-in curve backed by a plain function pointer
#[derive(Debug, Clone, Copy)]
pub struct PennerEasing {
    name: &'static str,
    curve: fn(f64) -> f64,
}

impl PennerEasing {
    pub const fn new(name: &'static str, curve: fn(f64) -> f64) -> Self {
        Self { name, curve }
    }
}

impl EasingFunction for PennerEasing {
    fn name(&self) -> &str {
        self.name
    }

    #[inline]
    fn ease(&self, t: f64) -> Result<f64, AnimationError> {
        Ok((self.curve)(t))
    }
}

pub fn linear(t: f64) -> f64 {
    t
}

pub fn ease_in_quad(t: f64) -> f64 {
    t * t
}

pub fn ease_out_quad(t: f64) -> f64 {
    t * (2.0 - t)
}

pub fn ease_in_out_quad(t: f64) -> f64 {
    if t < 0.5 {
        2.0 * t * t
    } else {
        -1.0 + (4.0 - 2.0 * t) * t
    }
}

pub fn ease_in_cubic(t: f64) -> f64 {
    t * t * t
}

pub fn ease_out_cubic(t: f64) -> f64 {
    let u = t - 1.0;
    u * u * u + 1.0
}

pub fn ease_in_out_cubic(t: f64) -> f64 {
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        (t - 1.0) * (2.0 * t - 2.0) * (2.0 * t - 2.0) + 1.0
    }
}

pub fn ease_in_quart(t: f64) -> f64 {
    t.powi(4)
}

pub fn ease_out_quart(t: f64) -> f64 {
    1.0 - (t - 1.0).powi(4)
}

pub fn ease_in_out_quart(t: f64) -> f64 {
    if t < 0.5 {
        8.0 * t.powi(4)
    } else {
        1.0 - 8.0 * (t - 1.0).powi(4)
    }
}

pub fn ease_in_quint(t: f64) -> f64 {
    t.powi(5)
}

pub fn ease_out_quint(t: f64) -> f64 {
    1.0 + (t - 1.0).powi(5)
}

pub fn ease_in_out_quint(t: f64) -> f64 {
    if t < 0.5 {
        16.0 * t.powi(5)
    } else {
        1.0 + 16.0 * (t - 1.0).powi(5)
    }
}

pub fn ease_in_sine(t: f64) -> f64 {
    1.0 - (t * PI / 2.0).cos()
}

pub fn ease_out_sine(t: f64) -> f64 {
    (t * PI / 2.0).sin()
}

pub fn ease_in_out_sine(t: f64) -> f64 {
    -((PI * t).cos() - 1.0) / 2.0
}

pub fn ease_in_expo(t: f64) -> f64 {
    if t == 0.0 {
        0.0
    } else {
        2f64.powf(10.0 * t - 10.0)
    }
}

pub fn ease_out_expo(t: f64) -> f64 {
    if t == 1.0 {
        1.0
    } else {
        1.0 - 2f64.powf(-10.0 * t)
    }
}

pub fn ease_in_out_expo(t: f64) -> f64 {
    if t == 0.0 {
        0.0
    } else if t == 1.0 {
        1.0
    } else if t < 0.5 {
        2f64.powf(20.0 * t - 10.0) / 2.0
    } else {
        (2.0 - 2f64.powf(-20.0 * t + 10.0)) / 2.0
    }
}

pub fn ease_in_circ(t: f64) -> f64 {
    1.0 - (1.0 - t * t).max(0.0).sqrt()
}

pub fn ease_out_circ(t: f64) -> f64 {
    (1.0 - (t - 1.0).powi(2)).max(0.0).sqrt()
}

pub fn ease_in_out_circ(t: f64) -> f64 {
    if t < 0.5 {
        (1.0 - (1.0 - (2.0 * t).powi(2)).max(0.0).sqrt()) / 2.0
    } else {
        ((1.0 - (-2.0 * t + 2.0).powi(2)).max(0.0).sqrt() + 1.0) / 2.0
    }
}

const BACK_C1: f64 = 1.70158;
const BACK_C2: f64 = BACK_C1 * 1.525;
const BACK_C3: f64 = BACK_C1 + 1.0;

pub fn ease_in_back(t: f64) -> f64 {
    BACK_C3 * t * t * t - BACK_C1 * t * t
}

pub fn ease_out_back(t: f64) -> f64 {
    let u = t - 1.0;
    1.0 + BACK_C3 * u.powi(3) + BACK_C1 * u.powi(2)
}

pub fn ease_in_out_back(t: f64) -> f64 {
    if t < 0.5 {
        ((2.0 * t).powi(2) * ((BACK_C2 + 1.0) * 2.0 * t - BACK_C2)) / 2.0
    } else {
        ((2.0 * t - 2.0).powi(2) * ((BACK_C2 + 1.0) * (t * 2.0 - 2.0) + BACK_C2) + 2.0) / 2.0
    }
}

const ELASTIC_C4: f64 = (2.0 * PI) / 3.0;
const ELASTIC_C5: f64 = (2.0 * PI) / 4.5;

pub fn ease_in_elastic(t: f64) -> f64 {
    if t == 0.0 || t == 1.0 {
        t
    } else {
        -(2f64.powf(10.0 * t - 10.0)) * ((t * 10.0 - 10.75) * ELASTIC_C4).sin()
    }
}

pub fn ease_out_elastic(t: f64) -> f64 {
    if t == 0.0 || t == 1.0 {
        t
    } else {
        2f64.powf(-10.0 * t) * ((t * 10.0 - 0.75) * ELASTIC_C4).sin() + 1.0
    }
}

pub fn ease_in_out_elastic(t: f64) -> f64 {
    if t == 0.0 || t == 1.0 {
        t
    } else if t < 0.5 {
        -(2f64.powf(20.0 * t - 10.0) * ((20.0 * t - 11.125) * ELASTIC_C5).sin()) / 2.0
    } else {
        (2f64.powf(-20.0 * t + 10.0) * ((20.0 * t - 11.125) * ELASTIC_C5).sin()) / 2.0 + 1.0
    }
}

pub fn ease_out_bounce(t: f64) -> f64 {
    const N1: f64 = 7.5625;
    const D1: f64 = 2.75;
    if t < 1.0 / D1 {
        N1 * t * t
    } else if t < 2.0 / D1 {
        let u = t - 1.5 / D1;
        N1 * u * u + 0.75
    } else if t < 2.5 / D1 {
        let u = t - 2.25 / D1;
        N1 * u * u + 0.9375
    } else {
        let u = t - 2.625 / D1;
        N1 * u * u + 0.984375
    }
}

pub fn ease_in_bounce(t: f64) -> f64 {
    1.0 - ease_out_bounce(1.0 - t)
}

pub fn ease_in_out_bounce(t: f64) -> f64 {
    if t < 0.5 {
        (1.0 - ease_out_bounce(1.0 - 2.0 * t)) / 2.0
    } else {
        (1.0 + ease_out_bounce(2.0 * t - 1.0)) / 2.0
    }
}

/// Every closed-form curve the registry starts with
pub const PENNER_CURVES: [PennerEasing; 31] = [
    PennerEasing::new("linear", linear),
    PennerEasing::new("easeInQuad", ease_in_quad),
    PennerEasing::new("easeOutQuad", ease_out_quad),
    PennerEasing::new("easeInOutQuad", ease_in_out_quad),
    PennerEasing::new("easeInCubic", ease_in_cubic),
    PennerEasing::new("easeOutCubic", ease_out_cubic),
    PennerEasing::new("easeInOutCubic", ease_in_out_cubic),
    PennerEasing::new("easeInQuart", ease_in_quart),
    PennerEasing::new("easeOutQuart", ease_out_quart),
    PennerEasing::new("easeInOutQuart", ease_in_out_quart),
    PennerEasing::new("easeInQuint", ease_in_quint),
    PennerEasing::new("easeOutQuint", ease_out_quint),
    PennerEasing::new("easeInOutQuint", ease_in_out_quint),
    PennerEasing::new("easeInSine", ease_in_sine),
    PennerEasing::new("easeOutSine", ease_out_sine),
    PennerEasing::new("easeInOutSine", ease_in_out_sine),
    PennerEasing::new("easeInExpo", ease_in_expo),
    PennerEasing::new("easeOutExpo", ease_out_expo),
    PennerEasing::new("easeInOutExpo", ease_in_out_expo),
    PennerEasing::new("easeInCirc", ease_in_circ),
    PennerEasing::new("easeOutCirc", ease_out_circ),
    PennerEasing::new("easeInOutCirc", ease_in_out_circ),
    PennerEasing::new("easeInBack", ease_in_back),
    PennerEasing::new("easeOutBack", ease_out_back),
    PennerEasing::new("easeInOutBack", ease_in_out_back),
    PennerEasing::new("easeInElastic", ease_in_elastic),
    PennerEasing::new("easeOutElastic", ease_out_elastic),
    PennerEasing::new("easeInOutElastic", ease_in_out_elastic),
    PennerEasing::new("easeInBounce", ease_in_bounce),
    PennerEasing::new("easeOutBounce", ease_out_bounce),
    PennerEasing::new("easeInOutBounce", ease_in_out_bounce),
];

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn endpoints_are_fixed() {
        for curve in PENNER_CURVES {
            let f = curve.curve;
            assert_abs_diff_eq!(f(0.0), 0.0, epsilon = 1e-9);
            assert_abs_diff_eq!(f(1.0), 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn known_midpoints() {
        assert_eq!(ease_out_quad(0.5), 0.75);
        assert_eq!(ease_in_quad(0.5), 0.25);
        assert_eq!(ease_in_out_cubic(0.5), 0.5);
        assert_abs_diff_eq!(ease_in_out_sine(0.5), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn overshooting_curves_leave_unit_range() {
        assert!(ease_in_back(0.2) < 0.0);
        assert!(ease_out_back(0.8) > 1.0);
        assert!(ease_out_elastic(0.1) > 1.0);
    }
}
