//! Valve actuator with first-order dynamics and rate limiting.

use crate::error::{SimError, SimResult};

/// Normalized valve opening in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ActuatorState {
    pub position: f64,
}

/// First-order actuator with rate limiting.
///
/// Dynamics: dpos/dt = (cmd - pos) / tau, clamped to [-rate_limit, rate_limit].
#[derive(Clone, Debug, PartialEq)]
pub struct FirstOrderActuator {
    /// Time constant (seconds)
    pub tau: f64,
    /// Rate limit (1/second)
    pub rate_limit: f64,
}

impl FirstOrderActuator {
    pub fn new(tau: f64, rate_limit: f64) -> SimResult<Self> {
        if !(tau.is_finite() && tau > 0.0) {
            return Err(SimError::InvalidArg {
                what: "tau must be positive",
            });
        }
        if !(rate_limit.is_finite() && rate_limit > 0.0) {
            return Err(SimError::InvalidArg {
                what: "rate_limit must be positive",
            });
        }
        Ok(Self { tau, rate_limit })
    }

    /// Position derivative given current position and command.
    pub fn dpdt(&self, position: f64, command: f64) -> f64 {
        let raw = (command.clamp(0.0, 1.0) - position) / self.tau;
        raw.clamp(-self.rate_limit, self.rate_limit)
    }

    /// Advance by `dt` with explicit Euler.
    pub fn step(&self, state: &ActuatorState, dt: f64, command: f64) -> ActuatorState {
        let new_pos = state.position + self.dpdt(state.position, command) * dt;
        ActuatorState {
            position: new_pos.clamp(0.0, 1.0),
        }
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn position_stays_in_unit_interval(
            tau in 0.01_f64..10.0,
            rate in 0.01_f64..10.0,
            commands in prop::collection::vec(-2.0_f64..3.0, 1..50),
            dt in 0.001_f64..1.0,
        ) {
            let act = FirstOrderActuator::new(tau, rate).unwrap();
            let mut state = ActuatorState { position: 0.0 };
            for cmd in commands {
                let next = act.step(&state, dt, cmd);
                prop_assert!((0.0..=1.0).contains(&next.position));
                prop_assert!((next.position - state.position).abs() <= rate * dt + 1e-12);
                state = next;
            }
        }
    }
}
