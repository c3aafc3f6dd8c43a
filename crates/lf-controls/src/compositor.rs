//! Valve output compositor.
//!
//! Chooses the normalized base value for each valve from the adaptation
//! state, applies gains, clipping and directional exclusivity, and maps the
//! result to physical units (`n * (max_out - min_out) + min_out`).
//!
//! | State                  | Base value                                    |
//! |------------------------|-----------------------------------------------|
//! | IDLE                   | `min_out`                                     |
//! | AGGRESSIVE_CORRECTION  | stored physical override on the target valve  |
//! | PRECISION_OBSERVE      | stored physical reversion outputs             |
//! | STABLE_LOCKED          | locked outputs plus drift nudge               |
//! | FINE_TUNE              | frozen (or raw) output × gain                 |
//! | STABLE, not adapted    | fixed creep on the correcting valve           |
//! | other running states   | raw output × gain                             |

use lf_core::clip;
use lf_fuzzy::{Valve, ValveMap};

use crate::adaptation::{ValveRoles, gain_of};
use crate::settings::{IDLE_CREEP, LOCKED_NUDGE, NUDGE_MIN_ERROR};
use crate::state::AdaptationState;

/// Everything the compositor reads. Nothing here is mutated.
#[derive(Debug, Clone, Copy)]
pub struct CompositorInput<'a> {
    pub state: &'a AdaptationState,
    pub valves: &'a [Valve],
    pub roles: &'a ValveRoles,
    /// Normalized engine output of this tick.
    pub raw: &'a ValveMap,
    pub gains: &'a ValveMap,
    pub is_adapted: bool,
    pub error: f64,
}

/// Physical command for every configured valve.
pub fn compose(input: &CompositorInput<'_>) -> ValveMap {
    let valves = input.valves.iter();
    match input.state {
        AdaptationState::Idle => valves.map(|v| (v.name.clone(), v.min_out)).collect(),

        AdaptationState::AggressiveCorrection(correction) => valves
            .map(|v| {
                let out = if v.name == correction.target_valve {
                    v.clip_physical(correction.output_value)
                } else {
                    v.min_out
                };
                (v.name.clone(), out)
            })
            .collect(),

        AdaptationState::PrecisionObserve(observe) => valves
            .map(|v| {
                let out = if is_opposing(input, v) {
                    v.min_out
                } else {
                    let held = observe.reversion.get(&v.name).copied().unwrap_or(v.min_out);
                    v.clip_physical(held)
                };
                (v.name.clone(), out)
            })
            .collect(),

        AdaptationState::StableLocked(locked) => {
            let nudged = (input.error.abs() > NUDGE_MIN_ERROR)
                .then(|| input.roles.target_for(input.error))
                .flatten();
            valves
                .map(|v| {
                    let mut n = locked.outputs.get(&v.name).copied().unwrap_or(0.0);
                    if nudged == Some(v.name.as_str()) {
                        n += LOCKED_NUDGE;
                    }
                    (v.name.clone(), v.to_physical(clip(n, 0.0, 1.0)))
                })
                .collect()
        }

        AdaptationState::Stable if !input.is_adapted => {
            let creeping = (input.error.abs() > NUDGE_MIN_ERROR)
                .then(|| input.roles.target_for(input.error))
                .flatten();
            valves
                .map(|v| {
                    let n = if creeping == Some(v.name.as_str()) {
                        IDLE_CREEP
                    } else {
                        0.0
                    };
                    (v.name.clone(), v.to_physical(n))
                })
                .collect()
        }

        AdaptationState::FineTune(ft) => valves
            .map(|v| {
                let base = ft
                    .frozen
                    .as_ref()
                    .and_then(|frozen| frozen.get(&v.name))
                    .or_else(|| input.raw.get(&v.name))
                    .copied()
                    .unwrap_or(0.0);
                (v.name.clone(), scaled(input, v, base))
            })
            .collect(),

        AdaptationState::Settle { .. }
        | AdaptationState::Stable
        | AdaptationState::DisturbanceWait { .. }
        | AdaptationState::PostDisturbanceObserve(_) => valves
            .map(|v| {
                let base = input.raw.get(&v.name).copied().unwrap_or(0.0);
                (v.name.clone(), scaled(input, v, base))
            })
            .collect(),
    }
}

fn is_opposing(input: &CompositorInput<'_>, valve: &Valve) -> bool {
    input.roles.opposing(input.error) == Some(valve.name.as_str())
}

/// `base × gain`, clipped to `[0, 1]`, opposing valve forced to 0, then physical.
fn scaled(input: &CompositorInput<'_>, valve: &Valve, base: f64) -> f64 {
    let n = if is_opposing(input, valve) {
        0.0
    } else {
        clip(base * gain_of(input.gains, &valve.name), 0.0, 1.0)
    };
    valve.to_physical(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{AggressiveCorrection, FineTune, LockedOutputs, PrecisionObserve};

    fn valves() -> Vec<Valve> {
        vec![
            Valve::new("fill", 0.0, 10.0).unwrap(),
            Valve::new("drain", 0.0, 10.0).unwrap(),
        ]
    }

    fn roles() -> ValveRoles {
        ValveRoles::from_valves(&valves())
    }

    fn map(fill: f64, drain: f64) -> ValveMap {
        ValveMap::from([("fill".to_string(), fill), ("drain".to_string(), drain)])
    }

    fn run(state: &AdaptationState, raw: &ValveMap, gains: &ValveMap, adapted: bool, error: f64) -> ValveMap {
        let valves = valves();
        let roles = roles();
        compose(&CompositorInput {
            state,
            valves: &valves,
            roles: &roles,
            raw,
            gains,
            is_adapted: adapted,
            error,
        })
    }

    #[test]
    fn idle_outputs_minimum() {
        let out = run(&AdaptationState::Idle, &map(0.5, 0.5), &map(1.0, 1.0), false, 0.3);
        assert_eq!(out, map(0.0, 0.0));
    }

    #[test]
    fn stable_before_adaptation_creeps() {
        let out = run(&AdaptationState::Stable, &map(0.7, 0.2), &map(1.0, 1.0), false, 0.2);
        assert!((out["fill"] - 0.1).abs() < 1e-12);
        assert_eq!(out["drain"], 0.0);

        let out = run(&AdaptationState::Stable, &map(0.7, 0.2), &map(1.0, 1.0), false, -0.2);
        assert_eq!(out["fill"], 0.0);
        assert!((out["drain"] - 0.1).abs() < 1e-12);

        let out = run(&AdaptationState::Stable, &map(0.7, 0.2), &map(1.0, 1.0), false, 0.0005);
        assert_eq!(out, map(0.0, 0.0));
    }

    #[test]
    fn stable_after_adaptation_uses_gained_raw() {
        let out = run(&AdaptationState::Stable, &map(0.3, 0.2), &map(1.5, 1.0), true, 0.2);
        assert!((out["fill"] - 4.5).abs() < 1e-12);
        assert_eq!(out["drain"], 0.0);
    }

    #[test]
    fn gained_output_is_clipped() {
        let state = AdaptationState::Settle { deadline: 60.0 };
        let out = run(&state, &map(0.8, 0.0), &map(2.0, 1.0), false, 1.0);
        assert_eq!(out["fill"], 10.0);
    }

    #[test]
    fn locked_nudge_on_matching_valve() {
        let state = AdaptationState::StableLocked(LockedOutputs {
            outputs: map(0.3, 0.05),
            dominant_valve: None,
        });
        let out = run(&state, &map(0.0, 0.0), &map(1.0, 1.0), true, 0.002);
        assert!((out["fill"] - 4.0).abs() < 1e-12);
        assert!((out["drain"] - 0.5).abs() < 1e-12);

        let out = run(&state, &map(0.0, 0.0), &map(1.0, 1.0), true, 0.0);
        assert!((out["fill"] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn aggressive_drives_only_target() {
        let state = AdaptationState::AggressiveCorrection(AggressiveCorrection {
            target_valve: "drain".into(),
            output_value: 7.5,
            baseline: map(0.1, 0.1),
            reversion: map(1.0, 1.0),
        });
        let out = run(&state, &map(0.9, 0.9), &map(1.0, 1.0), false, -0.5);
        assert_eq!(out, map(0.0, 7.5));
    }

    #[test]
    fn precision_observe_holds_reversion_outputs() {
        let state = AdaptationState::PrecisionObserve(PrecisionObserve {
            deadline: 10.0,
            baseline: map(0.2, 0.1),
            reversion: map(2.0, 1.0),
        });
        let out = run(&state, &map(0.9, 0.9), &map(1.0, 1.0), false, 0.04);
        assert_eq!(out, map(2.0, 0.0));
    }

    #[test]
    fn fine_tune_prefers_frozen_snapshot() {
        let state = AdaptationState::FineTune(FineTune::with_frozen(map(0.2, 0.0)));
        let out = run(&state, &map(0.9, 0.0), &map(1.5, 1.0), false, 0.1);
        assert!((out["fill"] - 3.0).abs() < 1e-12);

        let state = AdaptationState::FineTune(FineTune::default());
        let out = run(&state, &map(0.4, 0.0), &map(1.0, 1.0), false, 0.1);
        assert!((out["fill"] - 4.0).abs() < 1e-12);
    }
}
