//! Fuzzy inference engine.
//!
//! For each of the 15 rules the firing strength is
//! `min(error_degree, delta_degree)`. Each valve's normalized output is the
//! strength-weighted average of the rule values:
//!
//! ```text
//! out[v] = Σ strength_k · value_k[v] / Σ strength_k
//! ```
//!
//! Inputs are clamped to their universes first, so values beyond the outer
//! breakpoints saturate in the boundary label.

use lf_core::clip;

use crate::config::{FuzzyConfig, Valve};
use crate::error::FuzzyResult;
use crate::membership::{DeltaSets, ErrorLabel, ErrorSets, Triangle};
use crate::rules::{RuleKey, RuleTable, ValveMap};

/// Outcome of one inference.
#[derive(Debug, Clone, PartialEq)]
pub enum Inference {
    /// Normalized per-valve outputs in `[0, 1]`.
    Crisp(ValveMap),
    /// No rule fired or the inputs were not finite.
    /// The caller should treat this as "no actuation this tick".
    Degenerate { reason: &'static str },
}

impl Inference {
    pub fn is_degenerate(&self) -> bool {
        matches!(self, Self::Degenerate { .. })
    }

    /// Crisp outputs, or an all-zero map for `valves` when degenerate.
    pub fn into_outputs(self, valves: &[Valve]) -> ValveMap {
        match self {
            Self::Crisp(outputs) => outputs,
            Self::Degenerate { .. } => valves.iter().map(|v| (v.name.clone(), 0.0)).collect(),
        }
    }
}

/// Inference engine built from a [`FuzzyConfig`].
#[derive(Debug, Clone)]
pub struct FuzzyEngine {
    universe_max: f64,
    delta_max: f64,
    error_sets: ErrorSets,
    delta_sets: DeltaSets,
    valves: Vec<Valve>,
    rules: RuleTable,
}

impl FuzzyEngine {
    /// Validate `config` and build an engine.
    ///
    /// The NH left and PH right breakpoints are pinned to `±universe_max`;
    /// the delta-error universe is `±universe_max / 4`.
    pub fn new(config: &FuzzyConfig) -> FuzzyResult<Self> {
        config.validate()?;

        let umax = config.universe_max;
        let mut error_sets = config.error_sets;
        error_sets.nh = Triangle {
            left: (-umax).min(error_sets.nh.peak),
            ..error_sets.nh
        };
        error_sets.ph = Triangle {
            right: umax.max(error_sets.ph.peak),
            ..error_sets.ph
        };

        let delta_max = umax / 4.0;
        Ok(Self {
            universe_max: umax,
            delta_max,
            error_sets,
            delta_sets: DeltaSets::for_universe(delta_max),
            valves: config.valves.clone(),
            rules: config.rules.clone(),
        })
    }

    /// Map `(error, delta_rate)` to normalized valve outputs.
    ///
    /// `delta_rate` is the error change divided by the elapsed tick time.
    pub fn infer(&self, error: f64, delta_rate: f64) -> Inference {
        if !error.is_finite() || !delta_rate.is_finite() {
            return Inference::Degenerate {
                reason: "non-finite input",
            };
        }

        let e = clip(error, -self.universe_max, self.universe_max);
        let de = clip(delta_rate, -self.delta_max, self.delta_max);

        let mut weighted: Vec<f64> = vec![0.0; self.valves.len()];
        let mut total_strength = 0.0;

        for key in RuleKey::all() {
            let strength = self
                .error_sets
                .degree(key.error, e)
                .min(self.delta_sets.degree(key.delta, de));
            if strength <= 0.0 {
                continue;
            }
            total_strength += strength;
            for (acc, valve) in weighted.iter_mut().zip(&self.valves) {
                *acc += strength * self.rules.value(key, &valve.name);
            }
        }

        if total_strength <= 0.0 || !total_strength.is_finite() {
            return Inference::Degenerate {
                reason: "no rule fired",
            };
        }

        let outputs = self
            .valves
            .iter()
            .zip(weighted)
            .map(|(valve, acc)| (valve.name.clone(), clip(acc / total_strength, 0.0, 1.0)))
            .collect();
        Inference::Crisp(outputs)
    }

    /// Inference with the degenerate case mapped to all-zero outputs.
    pub fn infer_or_zero(&self, error: f64, delta_rate: f64) -> ValveMap {
        self.infer(error, delta_rate).into_outputs(&self.valves)
    }

    /// Degree of `error` in `label` after clamping to the universe.
    pub fn error_degree(&self, label: ErrorLabel, error: f64) -> f64 {
        let e = clip(error, -self.universe_max, self.universe_max);
        self.error_sets.degree(label, e)
    }

    /// Error label with the highest degree, if any label is active.
    pub fn dominant_error_label(&self, error: f64) -> Option<ErrorLabel> {
        ErrorLabel::ALL
            .into_iter()
            .map(|label| (label, self.error_degree(label, error)))
            .filter(|(_, degree)| *degree > 0.0)
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(label, _)| label)
    }

    pub fn valves(&self) -> &[Valve] {
        &self.valves
    }

    pub fn universe_max(&self) -> f64 {
        self.universe_max
    }

    /// Error sets as used by the engine (outer labels pinned).
    pub fn error_sets(&self) -> &ErrorSets {
        &self.error_sets
    }
}
