//! Valves and the complete engine configuration.

use std::collections::HashSet;

use lf_core::clip;
use serde::{Deserialize, Serialize};

use crate::error::{FuzzyError, FuzzyResult};
use crate::membership::ErrorSets;
use crate::rules::RuleTable;

/// Physical actuator with output bounds `min_out <= max_out`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Valve {
    pub name: String,
    pub min_out: f64,
    pub max_out: f64,
}

impl Valve {
    pub fn new(name: impl Into<String>, min_out: f64, max_out: f64) -> FuzzyResult<Self> {
        let valve = Self {
            name: name.into(),
            min_out,
            max_out,
        };
        valve.validate()?;
        Ok(valve)
    }

    pub fn validate(&self) -> FuzzyResult<()> {
        if self.name.trim().is_empty() {
            return Err(FuzzyError::InvalidValve {
                name: self.name.clone(),
                what: "name must not be empty",
            });
        }
        if !self.min_out.is_finite() || !self.max_out.is_finite() {
            return Err(FuzzyError::InvalidValve {
                name: self.name.clone(),
                what: "output bounds must be finite",
            });
        }
        if self.min_out > self.max_out {
            return Err(FuzzyError::InvalidValve {
                name: self.name.clone(),
                what: "min_out must not exceed max_out",
            });
        }
        Ok(())
    }

    /// Physical span `max_out - min_out`.
    pub fn range(&self) -> f64 {
        self.max_out - self.min_out
    }

    /// Map a normalized value to physical units: `n * (max - min) + min`.
    pub fn to_physical(&self, normalized: f64) -> f64 {
        normalized * self.range() + self.min_out
    }

    /// Clamp a physical value into the valve's output bounds.
    pub fn clip_physical(&self, physical: f64) -> f64 {
        clip(physical, self.min_out, self.max_out)
    }
}

/// Everything the inference engine needs.
///
/// By convention the first valve fills the tank and the second drains it.
#[derive(Debug, Clone, PartialEq)]
pub struct FuzzyConfig {
    /// Half-width of the error universe. NH and PH are pinned to `±universe_max`.
    pub universe_max: f64,
    pub error_sets: ErrorSets,
    pub valves: Vec<Valve>,
    pub rules: RuleTable,
}

impl FuzzyConfig {
    pub fn validate(&self) -> FuzzyResult<()> {
        if !self.universe_max.is_finite() || self.universe_max <= 0.0 {
            return Err(FuzzyError::InvalidArg {
                what: "universe_max must be positive",
            });
        }
        self.error_sets.validate()?;
        if self.valves.is_empty() {
            return Err(FuzzyError::InvalidArg {
                what: "at least one valve is required",
            });
        }
        let mut names = HashSet::new();
        for valve in &self.valves {
            valve.validate()?;
            if !names.insert(valve.name.as_str()) {
                return Err(FuzzyError::InvalidValve {
                    name: valve.name.clone(),
                    what: "duplicate valve name",
                });
            }
        }
        if let Some(unknown) = self.rules.referenced_valves().find(|v| !names.contains(v)) {
            return Err(FuzzyError::InvalidRules {
                what: format!("rule references unknown valve '{unknown}'"),
            });
        }
        Ok(())
    }

    pub fn valve(&self, name: &str) -> Option<&Valve> {
        self.valves.iter().find(|v| v.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valve_physical_mapping() {
        let v = Valve::new("fill", 2.0, 10.0).unwrap();
        assert_eq!(v.to_physical(0.0), 2.0);
        assert_eq!(v.to_physical(1.0), 10.0);
        assert_eq!(v.to_physical(0.5), 6.0);
        assert_eq!(v.clip_physical(12.0), 10.0);
        assert_eq!(v.clip_physical(-1.0), 2.0);
    }

    #[test]
    fn invalid_valves() {
        assert!(Valve::new("", 0.0, 1.0).is_err());
        assert!(Valve::new("a", 2.0, 1.0).is_err());
        assert!(Valve::new("a", f64::INFINITY, 1.0).is_err());
        assert!(Valve::new("a", 1.0, 1.0).is_ok());
    }
}
