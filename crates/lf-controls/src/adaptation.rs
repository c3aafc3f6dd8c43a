//! Fine-tuning steps on the gain multipliers.
//!
//! These functions only touch the [`FineTune`] data and the gain map handed
//! to them; the controller decides when they run. Every path keeps each gain
//! at or above [`GAIN_FLOOR`].

use lf_core::{clip, sign};
use lf_fuzzy::{Valve, ValveMap};
use tracing::debug;

use crate::settings::{
    AdaptationSettings, GAIN_FLOOR, NORMAL_STEP_MAX, NORMAL_STEP_MIN, NORMAL_TREND_DAMPING,
    OVERSHOOT_MIN_ERROR, PRECISION_OBSERVE_STEP_S, PRECISION_STEP_LIMIT,
};
use crate::state::{FineTune, GainStep, Observation};

/// Inputs of one control tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickInput {
    pub error: f64,
    pub delta_error: f64,
    /// Seconds since the previous tick.
    pub dt: f64,
    /// Absolute time in seconds.
    pub now: f64,
}

impl TickInput {
    /// Error change per second, 0 when `dt` is not positive.
    pub fn trend(&self) -> f64 {
        if self.dt > 0.0 && self.delta_error.is_finite() {
            self.delta_error / self.dt
        } else {
            0.0
        }
    }
}

/// Directional roles: first valve fills, second drains.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValveRoles {
    pub fill: Option<String>,
    pub drain: Option<String>,
}

impl ValveRoles {
    pub fn from_valves(valves: &[Valve]) -> Self {
        Self {
            fill: valves.first().map(|v| v.name.clone()),
            drain: valves.get(1).map(|v| v.name.clone()),
        }
    }

    /// Valve that corrects `error`: fill for positive error, drain otherwise.
    pub fn target_for(&self, error: f64) -> Option<&str> {
        if error > 0.0 {
            self.fill.as_deref()
        } else {
            self.drain.as_deref()
        }
    }

    /// Valve that would work against `error`, if error is nonzero.
    pub fn opposing(&self, error: f64) -> Option<&str> {
        if error > 0.0 {
            self.drain.as_deref()
        } else if error < 0.0 {
            self.fill.as_deref()
        } else {
            None
        }
    }
}

/// Gain for `valve`, 1.0 when absent.
pub fn gain_of(gains: &ValveMap, valve: &str) -> f64 {
    gains.get(valve).copied().unwrap_or(1.0)
}

fn add_gain(gains: &mut ValveMap, valve: &str, delta: f64) -> f64 {
    let gain = gains.entry(valve.to_string()).or_insert(1.0);
    *gain = (*gain + delta).max(GAIN_FLOOR);
    *gain
}

/// One gain correction, then arm an observation window.
///
/// While a permanent revert is in progress this performs another permanent
/// revert instead.
pub fn adaptation_step(
    ft: &mut FineTune,
    gains: &mut ValveMap,
    roles: &ValveRoles,
    settings: &AdaptationSettings,
    input: &TickInput,
) {
    if ft.last_step.as_ref().is_some_and(GainStep::is_reverting) {
        debug!("permanent revert active, skipping new step");
        revert_step(ft, gains, settings, true, input);
        return;
    }

    let error = input.error;
    let error_abs = error.abs();
    let trend = input.trend();
    let precision = error_abs < settings.precision_threshold;

    let (adjustment, observe_for) = if precision {
        let damping = settings.precision_aggressiveness * 10.0;
        let adjustment = clip(
            error * 0.1 - trend * damping,
            -PRECISION_STEP_LIMIT,
            PRECISION_STEP_LIMIT,
        );
        (adjustment, PRECISION_OBSERVE_STEP_S)
    } else {
        let step = if error > 0.0 {
            (error_abs + trend * NORMAL_TREND_DAMPING) * settings.fine_tune_aggressiveness
        } else {
            (error_abs - trend * NORMAL_TREND_DAMPING) * settings.fine_tune_aggressiveness
        };
        let adjustment = clip(step.abs(), NORMAL_STEP_MIN, NORMAL_STEP_MAX);
        (adjustment, settings.observe_duration(error_abs))
    };

    if let Some(valve) = roles.target_for(error) {
        let signed = if precision || error > 0.0 {
            adjustment
        } else {
            -adjustment
        };
        let gain = add_gain(gains, valve, signed);
        debug!(
            valve,
            step = signed,
            gain,
            precision,
            "fine-tune step"
        );
        ft.last_step = Some(GainStep::Adjusted {
            valve: valve.to_string(),
            amount: signed,
        });
    }

    ft.observation = Some(Observation {
        deadline: input.now + observe_for,
        initial_error: error,
    });
}

/// Judge the elapsed observation window and revert on overshoot.
pub fn evaluate_observation(
    ft: &mut FineTune,
    gains: &mut ValveMap,
    settings: &AdaptationSettings,
    input: &TickInput,
) {
    let Some(observation) = ft.observation.take() else {
        return;
    };
    let initial = observation.initial_error;
    let current = input.error;
    let overshoot = sign(current) != sign(initial) && current.abs() > OVERSHOOT_MIN_ERROR;
    debug!(
        initial_error = initial,
        error = current,
        progress = initial.abs() - current.abs(),
        overshoot,
        "observation complete"
    );

    if ft.last_step.as_ref().is_some_and(GainStep::is_reverting) {
        if overshoot {
            revert_step(ft, gains, settings, true, input);
        } else {
            debug!("overshoot cleared, permanent revert ended");
            ft.last_step = ft.last_step.take().map(GainStep::into_adjusted);
        }
    } else if overshoot {
        let permanent = initial.abs() < settings.precision_threshold;
        if permanent {
            ft.last_step = ft.last_step.take().map(GainStep::into_reverting);
        }
        revert_step(ft, gains, settings, permanent, input);
    }
}

/// Undo the last step: fully when `permanent`, otherwise by half.
pub fn revert_step(
    ft: &mut FineTune,
    gains: &mut ValveMap,
    settings: &AdaptationSettings,
    permanent: bool,
    input: &TickInput,
) {
    let Some(step) = ft.last_step.take() else {
        debug!("no gain step to revert");
        return;
    };

    let factor = if permanent { 1.0 } else { 0.5 };
    let reverted = step.amount() * factor;
    let valve = step.valve().to_string();
    let gain = add_gain(gains, &valve, -reverted);
    debug!(valve = %valve, gain, permanent, "gain step reverted");

    if permanent {
        ft.last_step = Some(GainStep::Reverting {
            valve,
            amount: -reverted,
        });
    }

    ft.observation = Some(Observation {
        deadline: input.now + settings.observe_duration(input.error.abs()),
        initial_error: input.error,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roles() -> ValveRoles {
        ValveRoles {
            fill: Some("fill".into()),
            drain: Some("drain".into()),
        }
    }

    fn input(error: f64, now: f64) -> TickInput {
        TickInput {
            error,
            delta_error: 0.0,
            dt: 0.5,
            now,
        }
    }

    fn unit_gains() -> ValveMap {
        ValveMap::from([("fill".to_string(), 1.0), ("drain".to_string(), 1.0)])
    }

    #[test]
    fn normal_step_raises_fill_gain() {
        let mut ft = FineTune::default();
        let mut gains = unit_gains();
        let settings = AdaptationSettings::default();
        adaptation_step(&mut ft, &mut gains, &roles(), &settings, &input(0.2, 100.0));

        assert!((gains["fill"] - 1.02).abs() < 1e-12);
        assert_eq!(gains["drain"], 1.0);
        let step = ft.last_step.as_ref().unwrap();
        assert!(!step.is_reverting());
        assert_eq!(step.valve(), "fill");
        assert!((step.amount() - 0.02).abs() < 1e-12);
        let obs = ft.observation.unwrap();
        assert_eq!(obs.deadline, 110.0);
        assert_eq!(obs.initial_error, 0.2);
    }

    #[test]
    fn normal_step_is_bounded() {
        let mut ft = FineTune::default();
        let mut gains = unit_gains();
        let settings = AdaptationSettings::default();
        adaptation_step(&mut ft, &mut gains, &roles(), &settings, &input(5.0, 0.0));
        assert!((gains["fill"] - 1.1).abs() < 1e-12);
        assert_eq!(ft.observation.unwrap().deadline, settings.fine_tune_interval_s);
    }

    #[test]
    fn precision_step_uses_short_window() {
        let mut ft = FineTune::default();
        let mut gains = unit_gains();
        let settings = AdaptationSettings::default();
        adaptation_step(&mut ft, &mut gains, &roles(), &settings, &input(0.03, 7.0));
        assert!((gains["fill"] - 1.003).abs() < 1e-12);
        assert_eq!(ft.observation.unwrap().deadline, 8.0);
    }

    #[test]
    fn negative_error_targets_drain_with_floor() {
        let mut ft = FineTune::default();
        let mut gains = unit_gains();
        let settings = AdaptationSettings::default();
        adaptation_step(&mut ft, &mut gains, &roles(), &settings, &input(-0.2, 0.0));
        assert_eq!(gains["drain"], 1.0);
        let step = ft.last_step.as_ref().unwrap();
        assert!((step.amount() + 0.02).abs() < 1e-12);
        assert_eq!(step.valve(), "drain");
    }

    #[test]
    fn overshoot_halves_normal_step() {
        let mut ft = FineTune::default();
        let mut gains = unit_gains();
        let settings = AdaptationSettings::default();
        adaptation_step(&mut ft, &mut gains, &roles(), &settings, &input(0.2, 0.0));
        evaluate_observation(&mut ft, &mut gains, &settings, &input(-0.1, 10.0));

        assert!((gains["fill"] - 1.01).abs() < 1e-12);
        assert!(ft.last_step.is_none());
        assert_eq!(ft.observation.unwrap().initial_error, -0.1);
    }

    #[test]
    fn progress_without_overshoot_clears_observation() {
        let mut ft = FineTune::default();
        let mut gains = unit_gains();
        let settings = AdaptationSettings::default();
        adaptation_step(&mut ft, &mut gains, &roles(), &settings, &input(0.2, 0.0));
        evaluate_observation(&mut ft, &mut gains, &settings, &input(0.1, 10.0));
        assert!(!ft.is_observing());
        assert!((gains["fill"] - 1.02).abs() < 1e-12);
    }

    #[test]
    fn precision_overshoot_enters_permanent_revert() {
        let mut ft = FineTune::default();
        let mut gains = unit_gains();
        let settings = AdaptationSettings::default();
        gains.insert("fill".into(), 1.2);
        adaptation_step(&mut ft, &mut gains, &roles(), &settings, &input(0.03, 0.0));
        let after_step = gains["fill"];
        evaluate_observation(&mut ft, &mut gains, &settings, &input(-0.02, 1.0));

        assert!((gains["fill"] - (after_step - 0.003)).abs() < 1e-12);
        assert!(matches!(
            ft.last_step,
            Some(GainStep::Reverting { ref valve, amount }) if valve == "fill" && (amount + 0.003).abs() < 1e-12
        ));

        // Overshoot gone: back to a normal step record.
        evaluate_observation(&mut ft, &mut gains, &settings, &input(0.005, 11.0));
        assert!(matches!(ft.last_step, Some(GainStep::Adjusted { .. })));
    }

    #[test]
    fn revert_without_step_does_nothing() {
        let mut ft = FineTune::default();
        let mut gains = unit_gains();
        revert_step(
            &mut ft,
            &mut gains,
            &AdaptationSettings::default(),
            false,
            &input(0.1, 0.0),
        );
        assert_eq!(gains, unit_gains());
        assert!(!ft.is_observing());
    }

    #[test]
    fn roles_pick_direction() {
        let r = roles();
        assert_eq!(r.target_for(0.1), Some("fill"));
        assert_eq!(r.target_for(-0.1), Some("drain"));
        assert_eq!(r.opposing(0.1), Some("drain"));
        assert_eq!(r.opposing(0.0), None);
    }
}
