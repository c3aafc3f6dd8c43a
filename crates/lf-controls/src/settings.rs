//! Adaptation settings and the fixed constants of the state machine.

use serde::{Deserialize, Serialize};

use crate::error::{ControlError, ControlResult};

/// Below this |error| SETTLE completes.
pub const SETTLE_EXIT_ERROR: f64 = 0.005;
/// A setpoint change only enters SETTLE above this |error|.
pub const SETPOINT_SETTLE_MIN_ERROR: f64 = 0.01;

pub const OBSERVE_MIN_S: f64 = 10.0;
pub const OBSERVE_MAX_S: f64 = 40.0;
pub const OBSERVE_STDEV_THRESHOLD: f64 = 0.003;
pub const OBSERVE_HISTORY_LEN: usize = 20;

/// Aggressive target = reversion + |error| * this.
pub const AGGRESSIVE_GAIN: f64 = 3.0;
pub const AGGRESSIVE_EXIT_ERROR: f64 = 0.05;
pub const PRECISION_OBSERVE_S: f64 = 10.0;

/// FINE_TUNE locks in below this |error|.
pub const LOCK_IN_ERROR: f64 = 0.01;
/// Reduction applied to the dominant valve on lock-in.
pub const LOCK_IN_REDUCTION: f64 = 0.04;
/// Overshoot only counts above this |error|.
pub const OVERSHOOT_MIN_ERROR: f64 = 0.01;

/// Normalized nudge added in STABLE_LOCKED.
pub const LOCKED_NUDGE: f64 = 0.1;
/// Normalized creep output in STABLE before the first adaptation.
pub const IDLE_CREEP: f64 = 0.01;
/// Nudge/creep only apply above this |error|.
pub const NUDGE_MIN_ERROR: f64 = 0.001;

pub const GAIN_FLOOR: f64 = 1.0;

pub const PRECISION_STEP_LIMIT: f64 = 0.05;
pub const PRECISION_OBSERVE_STEP_S: f64 = 1.0;
pub const NORMAL_STEP_MIN: f64 = 0.001;
pub const NORMAL_STEP_MAX: f64 = 0.1;
pub const NORMAL_TREND_DAMPING: f64 = 0.5;
/// Errors below this get the short observation window.
pub const SHORT_OBSERVE_ERROR: f64 = 0.3;
pub const SHORT_OBSERVE_S: f64 = 10.0;

/// Tunable adaptation behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptationSettings {
    /// When false the state machine holds its current state.
    pub learning_enabled: bool,
    pub disturbance_threshold: f64,
    pub disturbance_delay_s: f64,
    pub fine_tune_interval_s: f64,
    pub fine_tune_aggressiveness: f64,
    pub precision_threshold: f64,
    pub precision_aggressiveness: f64,
    pub settle_timeout_s: f64,
}

impl Default for AdaptationSettings {
    fn default() -> Self {
        Self {
            learning_enabled: true,
            disturbance_threshold: 0.1,
            disturbance_delay_s: 5.0,
            fine_tune_interval_s: 10.0,
            fine_tune_aggressiveness: 0.1,
            precision_threshold: 0.05,
            precision_aggressiveness: 0.01,
            settle_timeout_s: 60.0,
        }
    }
}

impl AdaptationSettings {
    pub fn validate(&self) -> ControlResult<()> {
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !positive(self.disturbance_threshold) {
            return Err(ControlError::InvalidArg {
                what: "disturbance_threshold must be positive",
            });
        }
        if !self.disturbance_delay_s.is_finite() || self.disturbance_delay_s < 0.0 {
            return Err(ControlError::InvalidArg {
                what: "disturbance_delay_s must be non-negative",
            });
        }
        if !positive(self.fine_tune_interval_s) {
            return Err(ControlError::InvalidArg {
                what: "fine_tune_interval_s must be positive",
            });
        }
        if !positive(self.fine_tune_aggressiveness) {
            return Err(ControlError::InvalidArg {
                what: "fine_tune_aggressiveness must be positive",
            });
        }
        if !positive(self.precision_threshold) {
            return Err(ControlError::InvalidArg {
                what: "precision_threshold must be positive",
            });
        }
        if !positive(self.precision_aggressiveness) {
            return Err(ControlError::InvalidArg {
                what: "precision_aggressiveness must be positive",
            });
        }
        if !positive(self.settle_timeout_s) {
            return Err(ControlError::InvalidArg {
                what: "settle_timeout_s must be positive",
            });
        }
        Ok(())
    }

    /// Observation window after a normal-branch step or a revert.
    pub fn observe_duration(&self, error_abs: f64) -> f64 {
        if error_abs < SHORT_OBSERVE_ERROR {
            SHORT_OBSERVE_S
        } else {
            self.fine_tune_interval_s
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let s = AdaptationSettings::default();
        assert!(s.validate().is_ok());
        assert!(s.learning_enabled);
        assert_eq!(s.disturbance_threshold, 0.1);
        assert_eq!(s.settle_timeout_s, 60.0);
    }

    #[test]
    fn rejects_non_positive_values() {
        let s = AdaptationSettings {
            fine_tune_aggressiveness: 0.0,
            ..AdaptationSettings::default()
        };
        assert!(s.validate().is_err());
        let s = AdaptationSettings {
            disturbance_delay_s: -1.0,
            ..AdaptationSettings::default()
        };
        assert!(s.validate().is_err());
    }

    #[test]
    fn observe_duration_depends_on_error() {
        let s = AdaptationSettings {
            fine_tune_interval_s: 25.0,
            ..AdaptationSettings::default()
        };
        assert_eq!(s.observe_duration(0.1), 10.0);
        assert_eq!(s.observe_duration(0.5), 25.0);
    }
}
