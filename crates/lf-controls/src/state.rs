//! Adaptation state.
//!
//! One variant per phase; each variant owns exactly the data that phase
//! needs. Deadlines are absolute times in seconds on the controller's clock.

use std::fmt;

use lf_fuzzy::ValveMap;
use serde::{Deserialize, Serialize};

use crate::observation::ObservationBuffer;
use crate::settings::{OBSERVE_MAX_S, OBSERVE_MIN_S, OBSERVE_STDEV_THRESHOLD};

/// Current phase of the adaptation state machine.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum AdaptationState {
    /// Controller not running.
    #[default]
    Idle,
    /// Waiting for a new setpoint to be reached.
    Settle { deadline: f64 },
    /// Normal operation, watching for disturbances.
    Stable,
    /// Debounce after a disturbance was detected.
    DisturbanceWait { deadline: f64 },
    /// Waiting for the error to settle after a disturbance.
    PostDisturbanceObserve(ObserveWindow),
    /// Override driving one valve hard towards the setpoint.
    AggressiveCorrection(AggressiveCorrection),
    /// Holding the pre-correction outputs before fine tuning.
    PrecisionObserve(PrecisionObserve),
    /// Step-wise gain correction.
    FineTune(FineTune),
    /// Converged; outputs locked with a drift nudge.
    StableLocked(LockedOutputs),
}

impl AdaptationState {
    pub fn tag(&self) -> StateTag {
        match self {
            Self::Idle => StateTag::Idle,
            Self::Settle { .. } => StateTag::Settle,
            Self::Stable => StateTag::Stable,
            Self::DisturbanceWait { .. } => StateTag::DisturbanceWait,
            Self::PostDisturbanceObserve(_) => StateTag::PostDisturbanceObserve,
            Self::AggressiveCorrection(_) => StateTag::AggressiveCorrection,
            Self::PrecisionObserve(_) => StateTag::PrecisionObserve,
            Self::FineTune(_) => StateTag::FineTune,
            Self::StableLocked(_) => StateTag::StableLocked,
        }
    }

    pub fn is_running(&self) -> bool {
        !matches!(self, Self::Idle)
    }
}

/// Data-free state label, for display and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StateTag {
    Idle,
    Settle,
    Stable,
    DisturbanceWait,
    PostDisturbanceObserve,
    AggressiveCorrection,
    PrecisionObserve,
    FineTune,
    StableLocked,
}

impl StateTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Settle => "SETTLE",
            Self::Stable => "STABLE",
            Self::DisturbanceWait => "DISTURBANCE_WAIT",
            Self::PostDisturbanceObserve => "POST_DISTURBANCE_OBSERVE",
            Self::AggressiveCorrection => "AGGRESSIVE_CORRECTION",
            Self::PrecisionObserve => "PRECISION_OBSERVE",
            Self::FineTune => "FINE_TUNE",
            Self::StableLocked => "STABLE_LOCKED",
        }
    }
}

impl fmt::Display for StateTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Post-disturbance observation window.
#[derive(Debug, Clone, PartialEq)]
pub struct ObserveWindow {
    pub started_at: f64,
    pub history: ObservationBuffer,
    pub min_observe_s: f64,
    pub max_observe_s: f64,
    pub stdev_threshold: f64,
}

impl ObserveWindow {
    pub fn new(started_at: f64) -> Self {
        Self {
            started_at,
            history: ObservationBuffer::default(),
            min_observe_s: OBSERVE_MIN_S,
            max_observe_s: OBSERVE_MAX_S,
            stdev_threshold: OBSERVE_STDEV_THRESHOLD,
        }
    }

    /// True once the minimum window has passed with a full, quiet history.
    pub fn is_settled(&self, now: f64) -> bool {
        if now - self.started_at < self.min_observe_s || !self.history.is_full() {
            return false;
        }
        self.history
            .std_dev()
            .is_some_and(|sd| sd < self.stdev_threshold)
    }

    pub fn timed_out(&self, now: f64) -> bool {
        now - self.started_at > self.max_observe_s
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggressiveCorrection {
    pub target_valve: String,
    /// Physical command for the target valve.
    pub output_value: f64,
    /// Normalized raw output at the end of observation.
    pub baseline: ValveMap,
    /// `baseline` mapped to physical units.
    pub reversion: ValveMap,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrecisionObserve {
    pub deadline: f64,
    pub baseline: ValveMap,
    pub reversion: ValveMap,
}

/// Armed observation after a gain step or revert.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub deadline: f64,
    pub initial_error: f64,
}

/// Last gain change applied during fine tuning.
#[derive(Debug, Clone, PartialEq)]
pub enum GainStep {
    /// Normal step; may be half-reverted on overshoot.
    Adjusted { valve: String, amount: f64 },
    /// Permanent revert in progress; re-applied while overshoot persists.
    Reverting { valve: String, amount: f64 },
}

impl GainStep {
    pub fn valve(&self) -> &str {
        match self {
            Self::Adjusted { valve, .. } | Self::Reverting { valve, .. } => valve,
        }
    }

    pub fn amount(&self) -> f64 {
        match self {
            Self::Adjusted { amount, .. } | Self::Reverting { amount, .. } => *amount,
        }
    }

    pub fn is_reverting(&self) -> bool {
        matches!(self, Self::Reverting { .. })
    }

    pub fn into_reverting(self) -> Self {
        match self {
            Self::Adjusted { valve, amount } | Self::Reverting { valve, amount } => {
                Self::Reverting { valve, amount }
            }
        }
    }

    pub fn into_adjusted(self) -> Self {
        match self {
            Self::Adjusted { valve, amount } | Self::Reverting { valve, amount } => {
                Self::Adjusted { valve, amount }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FineTune {
    /// Snapshot of normalized outputs the gains are applied to.
    pub frozen: Option<ValveMap>,
    pub last_step: Option<GainStep>,
    pub observation: Option<Observation>,
}

impl FineTune {
    pub fn with_frozen(frozen: ValveMap) -> Self {
        Self {
            frozen: Some(frozen),
            ..Self::default()
        }
    }

    pub fn is_observing(&self) -> bool {
        self.observation.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LockedOutputs {
    /// Normalized outputs including gains.
    pub outputs: ValveMap,
    /// Valve of the last adaptation step before lock-in.
    pub dominant_valve: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_render_upper_snake_case() {
        assert_eq!(AdaptationState::Idle.tag().to_string(), "IDLE");
        assert_eq!(
            AdaptationState::DisturbanceWait { deadline: 1.0 }.tag(),
            StateTag::DisturbanceWait
        );
        assert_eq!(
            AdaptationState::FineTune(FineTune::default()).tag().as_str(),
            "FINE_TUNE"
        );
        assert!(!AdaptationState::Idle.is_running());
        assert!(AdaptationState::Stable.is_running());
    }

    #[test]
    fn observe_window_needs_full_quiet_history() {
        let mut w = ObserveWindow::new(0.0);
        for _ in 0..20 {
            w.history.push(0.05);
        }
        assert!(!w.is_settled(5.0));
        assert!(w.is_settled(10.0));

        let mut noisy = ObserveWindow::new(0.0);
        for i in 0..20 {
            noisy.history.push(if i % 2 == 0 { 0.0 } else { 0.1 });
        }
        assert!(!noisy.is_settled(15.0));
        assert!(!noisy.timed_out(40.0));
        assert!(noisy.timed_out(40.5));
    }

    #[test]
    fn gain_step_accessors() {
        let step = GainStep::Reverting {
            valve: "fill".into(),
            amount: -0.02,
        };
        assert_eq!(step.valve(), "fill");
        assert_eq!(step.amount(), -0.02);
        assert!(step.is_reverting());
    }
}
