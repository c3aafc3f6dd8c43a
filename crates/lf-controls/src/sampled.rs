//! Sample clocks for the two fixed-period ticks.
//!
//! The control tick (default 0.5 s) drives inference, adaptation and
//! compositing. The sampling tick (default 1.0 s) refreshes the process
//! measurement; between refreshes the control tick sees the held value.

use serde::{Deserialize, Serialize};

use crate::error::{ControlError, ControlResult};

/// Sample period of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleConfig {
    /// Sample period in seconds.
    pub dt: f64,
}

impl SampleConfig {
    /// Create a sample configuration with period `dt` seconds (must be positive).
    pub fn new(dt: f64) -> ControlResult<Self> {
        if !dt.is_finite() || dt <= 0.0 {
            return Err(ControlError::InvalidArg {
                what: "sample period must be positive",
            });
        }
        Ok(Self { dt })
    }
}

/// Tracks when a tick is due.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleClock {
    pub config: SampleConfig,
    /// Time of next scheduled tick.
    pub next_sample_time: f64,
}

impl SampleClock {
    /// First tick fires one period after `initial_time`.
    pub fn new(config: SampleConfig, initial_time: f64) -> Self {
        Self {
            config,
            next_sample_time: initial_time + config.dt,
        }
    }

    /// Clock whose first tick is due immediately at `initial_time`.
    pub fn immediate(config: SampleConfig, initial_time: f64) -> Self {
        Self {
            config,
            next_sample_time: initial_time,
        }
    }

    pub fn should_sample(&self, current_time: f64) -> bool {
        current_time >= self.next_sample_time
    }

    /// Advance past `current_time`, dropping ticks that were missed.
    ///
    /// Returns the number of missed ticks (0 when the clock was on time).
    /// Runs in constant time however long the clock was held.
    pub fn advance_past(&mut self, current_time: f64) -> u64 {
        let dt = self.config.dt;
        let lag = (current_time - self.next_sample_time).max(0.0);
        let mut missed = (lag / dt).floor() as u64;
        self.next_sample_time += (missed + 1) as f64 * dt;
        if self.next_sample_time <= current_time {
            self.next_sample_time += dt;
            missed += 1;
        }
        missed
    }
}

/// Last sampled value, held between sampling ticks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZeroOrderHold {
    /// Held value; `None` until the first successful sample.
    pub value: Option<f64>,
    pub clock: SampleClock,
}

impl ZeroOrderHold {
    /// Hold that samples on its first update.
    pub fn new(config: SampleConfig, initial_time: f64) -> Self {
        Self {
            value: None,
            clock: SampleClock::immediate(config, initial_time),
        }
    }

    pub fn get(&self) -> Option<f64> {
        self.value
    }

    pub fn is_due(&self, current_time: f64) -> bool {
        self.clock.should_sample(current_time)
    }

    /// Store a freshly sampled value if the sampling tick is due.
    ///
    /// Returns `true` if the value was updated.
    pub fn update(&mut self, current_time: f64, new_value: f64) -> bool {
        if self.clock.should_sample(current_time) {
            self.value = Some(new_value);
            self.clock.advance_past(current_time);
            true
        } else {
            false
        }
    }

    /// Consume a due sampling tick without storing a value (failed read).
    pub fn skip(&mut self, current_time: f64) {
        if self.clock.should_sample(current_time) {
            self.clock.advance_past(current_time);
        }
    }
}
