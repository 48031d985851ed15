//! Time sources for the engine.
//!
//! Every timestamp inside the engine is a millisecond `f64` read from a [`Clock`].
//! Hosts normally use [`SystemClock`]; deterministic hosts and tests drive a
//! [`ManualClock`] instead.

use std::cell::Cell;
use std::rc::Rc;

/// Monotonic millisecond time source.
pub trait Clock {
    /// Milliseconds since an arbitrary, fixed origin.
    fn now_ms(&self) -> f64;
}

/// Wall clock backed by `instant::Instant` (monotonic, also available on wasm).
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: instant::Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: instant::Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    #[inline]
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<f64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start at a given time
    pub fn starting_at(ms: f64) -> Self {
        let clock = Self::new();
        clock.set(ms);
        clock
    }

    #[inline]
    pub fn set(&self, ms: f64) {
        self.now.set(ms);
    }

    #[inline]
    pub fn advance(&self, ms: f64) {
        self.now.set(self.now.get() + ms);
    }
}

impl Clock for ManualClock {
    #[inline]
    fn now_ms(&self) -> f64 {
        self.now.get()
    }
}

/// Shared clock handle used across engine components.
pub type ClockRef = Rc<dyn Clock>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_is_shared_between_clones() {
        let clock = ManualClock::new();
        let other = clock.clone();
        clock.advance(16.0);
        assert_eq!(other.now_ms(), 16.0);
        other.set(100.0);
        assert_eq!(clock.now_ms(), 100.0);
    }

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now_ms();
        let b = clock.now_ms();
        assert!(b >= a);
    }
}
