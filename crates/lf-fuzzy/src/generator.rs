//! Membership and rule generation from physical tuning parameters.
//!
//! Given the level range, the setpoint and two shape factors, derive the five
//! error triangles and the canonical fill/drain rule table:
//!
//! - `aggressiveness` compresses the low/high triangles towards zero
//!   (larger = tighter, faster response)
//! - `precision` narrows the zero band (larger = narrower)

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::{FuzzyConfig, Valve};
use crate::error::{FuzzyError, FuzzyResult};
use crate::membership::{DeltaLabel, ErrorLabel, ErrorSets, Triangle};
use crate::rules::{RuleKey, RuleTable, ValveMap};

/// Gap kept between the zero band and the PL/NL peaks.
pub const PEAK_EPSILON: f64 = 0.01;

/// Base tuning parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TuningParams {
    pub min_level: f64,
    pub max_level: f64,
    pub set_level: f64,
    pub aggressiveness: f64,
    pub precision: f64,
}

impl Default for TuningParams {
    fn default() -> Self {
        Self {
            min_level: 0.0,
            max_level: 5.0,
            set_level: 3.3,
            aggressiveness: 4.0,
            precision: 2.0,
        }
    }
}

impl TuningParams {
    pub fn validate(&self) -> FuzzyResult<()> {
        let finite = [
            self.min_level,
            self.max_level,
            self.set_level,
            self.aggressiveness,
            self.precision,
        ]
        .iter()
        .all(|v| v.is_finite());
        if !finite {
            return Err(FuzzyError::Configuration {
                what: "tuning parameters must be finite".to_string(),
            });
        }
        if !(self.min_level <= self.set_level && self.set_level <= self.max_level) {
            return Err(FuzzyError::Configuration {
                what: format!(
                    "set level {} must lie between min level {} and max level {}",
                    self.set_level, self.min_level, self.max_level
                ),
            });
        }
        if self.aggressiveness <= 0.0 {
            return Err(FuzzyError::Configuration {
                what: format!("aggressiveness must be positive, got {}", self.aggressiveness),
            });
        }
        if self.precision <= 0.0 {
            return Err(FuzzyError::Configuration {
                what: format!("precision must be positive, got {}", self.precision),
            });
        }
        Ok(())
    }
}

/// Generated error membership plus the intermediate quantities.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeneratedMembership {
    pub universe_max: f64,
    pub total_range: f64,
    pub zero_half_width: f64,
    pub error_sets: ErrorSets,
}

/// Derive the error triangles from tuning parameters.
pub fn generate_membership(params: &TuningParams) -> FuzzyResult<GeneratedMembership> {
    params.validate()?;

    let span = params.max_level - params.min_level;
    let total_range = if span > 0.0 { span } else { 1.0 };
    let max_pos_error = params.set_level - params.min_level;
    let max_neg_error = params.set_level - params.max_level;
    let universe_max = max_pos_error.abs().max(max_neg_error.abs()).max(1.0);
    let zero_half_width = 0.05 * total_range / params.precision;

    let agg = params.aggressiveness;

    let pl_peak = (0.4 * max_pos_error / agg).max(zero_half_width + PEAK_EPSILON);
    let pl_end = (0.8 * max_pos_error / agg).max(pl_peak);
    let ph_start = (0.7 * max_pos_error / agg).min(max_pos_error);

    let nl_peak = (0.4 * max_neg_error / agg).min(-(zero_half_width + PEAK_EPSILON));
    let nl_end = (0.8 * max_neg_error / agg).min(nl_peak);
    let nh_start = (0.7 * max_neg_error / agg).max(max_neg_error);

    let error_sets = ErrorSets {
        nh: Triangle::new(max_neg_error, max_neg_error, nh_start)?,
        nl: Triangle::new(nl_end, nl_peak, -zero_half_width)?,
        z: Triangle::new(-zero_half_width, 0.0, zero_half_width)?,
        pl: Triangle::new(zero_half_width, pl_peak, pl_end)?,
        ph: Triangle::new(ph_start, max_pos_error, max_pos_error)?,
    };

    Ok(GeneratedMembership {
        universe_max,
        total_range,
        zero_half_width,
        error_sets,
    })
}

/// Canonical (fill, drain) coefficients.
const CANONICAL: [(ErrorLabel, DeltaLabel, f64, f64); 15] = [
    (ErrorLabel::PosHigh, DeltaLabel::Positive, 1.0, 0.0),
    (ErrorLabel::PosHigh, DeltaLabel::Zero, 0.9, 0.0),
    (ErrorLabel::PosHigh, DeltaLabel::Negative, 0.7, 0.0),
    (ErrorLabel::PosLow, DeltaLabel::Positive, 0.6, 0.0),
    (ErrorLabel::PosLow, DeltaLabel::Zero, 0.3, 0.0),
    (ErrorLabel::PosLow, DeltaLabel::Negative, 0.1, 0.0),
    (ErrorLabel::Zero, DeltaLabel::Positive, 0.15, 0.0),
    (ErrorLabel::Zero, DeltaLabel::Zero, 0.0, 0.0),
    (ErrorLabel::Zero, DeltaLabel::Negative, 0.0, 0.15),
    (ErrorLabel::NegLow, DeltaLabel::Positive, 0.0, 0.1),
    (ErrorLabel::NegLow, DeltaLabel::Zero, 0.0, 0.3),
    (ErrorLabel::NegLow, DeltaLabel::Negative, 0.0, 0.6),
    (ErrorLabel::NegHigh, DeltaLabel::Positive, 0.0, 0.7),
    (ErrorLabel::NegHigh, DeltaLabel::Zero, 0.0, 0.9),
    (ErrorLabel::NegHigh, DeltaLabel::Negative, 1.0, 1.0),
];

/// Canonical rule table for the first two valves (fill, drain).
/// Any further valves get no entry and therefore contribute zero.
pub fn canonical_rules(valves: &[Valve]) -> RuleTable {
    let fill = valves.first().map(|v| v.name.as_str());
    let drain = valves.get(1).map(|v| v.name.as_str());

    let entries: BTreeMap<RuleKey, ValveMap> = CANONICAL
        .iter()
        .map(|&(error, delta, fill_value, drain_value)| {
            let mut outputs = ValveMap::new();
            if let Some(name) = fill {
                outputs.insert(name.to_string(), fill_value);
            }
            if let Some(name) = drain {
                outputs.insert(name.to_string(), drain_value);
            }
            (RuleKey::new(error, delta), outputs)
        })
        .collect();

    RuleTable::from_complete(entries)
}

/// Generate a complete configuration for `valves`.
pub fn generate(params: &TuningParams, valves: Vec<Valve>) -> FuzzyResult<FuzzyConfig> {
    let membership = generate_membership(params)?;
    let rules = canonical_rules(&valves);
    let config = FuzzyConfig {
        universe_max: membership.universe_max,
        error_sets: membership.error_sets,
        valves,
        rules,
    };
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn rejects_set_level_outside_range() {
        let params = TuningParams {
            set_level: 6.0,
            ..TuningParams::default()
        };
        assert!(matches!(
            generate_membership(&params),
            Err(FuzzyError::Configuration { .. })
        ));
    }

    #[test]
    fn rejects_non_positive_shape_factors() {
        let params = TuningParams {
            aggressiveness: 0.0,
            ..TuningParams::default()
        };
        assert!(generate_membership(&params).is_err());
        let params = TuningParams {
            precision: -1.0,
            ..TuningParams::default()
        };
        assert!(generate_membership(&params).is_err());
    }

    #[test]
    fn zero_band_is_symmetric() {
        let m = generate_membership(&TuningParams::default()).unwrap();
        assert!(close(m.error_sets.z.left, -m.zero_half_width));
        assert_eq!(m.error_sets.z.peak, 0.0);
        assert!(close(m.error_sets.z.right, m.zero_half_width));
    }

    #[test]
    fn collapsed_range_falls_back_to_unit_range() {
        let params = TuningParams {
            min_level: 2.0,
            max_level: 2.0,
            set_level: 2.0,
            ..TuningParams::default()
        };
        let m = generate_membership(&params).unwrap();
        assert_eq!(m.total_range, 1.0);
        assert_eq!(m.universe_max, 1.0);
        assert!(m.error_sets.validate().is_ok());
    }

    #[test]
    fn canonical_rules_with_single_valve() {
        let valves = vec![Valve::new("fill", 0.0, 10.0).unwrap()];
        let rules = canonical_rules(&valves);
        let key = RuleKey::new(ErrorLabel::NegHigh, DeltaLabel::Zero);
        assert_eq!(rules.value(key, "fill"), 0.0);
        assert!(rules.entry(key).unwrap().get("drain").is_none());
    }
}
