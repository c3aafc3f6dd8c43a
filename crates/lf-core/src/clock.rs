//! Monotonic time source for the control loop.
//!
//! Every deadline in the adaptation state machine is an absolute time in
//! seconds on one of these clocks. The control loop samples the clock once
//! per tick and passes that value down, so all comparisons inside a tick
//! agree with each other.

use std::cell::Cell;
use std::time::Instant;

/// A source of monotonic time in seconds.
pub trait Clock {
    /// Current time in seconds since the clock's origin.
    fn now_s(&self) -> f64;
}

/// Wall-clock backed monotonic clock.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Create a clock whose origin is "now".
    pub fn start() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::start()
    }
}

impl Clock for MonotonicClock {
    fn now_s(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Manually advanced clock, used by simulations and tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<f64>,
}

impl ManualClock {
    pub fn new(initial_s: f64) -> Self {
        Self {
            now: Cell::new(initial_s),
        }
    }

    /// Move the clock forward by `dt` seconds. Negative steps are ignored.
    pub fn advance(&self, dt: f64) {
        if dt > 0.0 {
            self.now.set(self.now.get() + dt);
        }
    }

    /// Jump to an absolute time, never moving backwards.
    pub fn set(&self, t: f64) {
        if t > self.now.get() {
            self.now.set(t);
        }
    }
}

impl Clock for ManualClock {
    fn now_s(&self) -> f64 {
        self.now.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_is_monotonic() {
        let clock = ManualClock::new(1.0);
        clock.advance(0.5);
        assert_eq!(clock.now_s(), 1.5);
        clock.advance(-1.0);
        assert_eq!(clock.now_s(), 1.5);
        clock.set(1.0);
        assert_eq!(clock.now_s(), 1.5);
        clock.set(4.0);
        assert_eq!(clock.now_s(), 4.0);
    }

    #[test]
    fn monotonic_clock_does_not_go_backwards() {
        let clock = MonotonicClock::start();
        let a = clock.now_s();
        let b = clock.now_s();
        assert!(b >= a);
    }
}
