//! Rule keys and the 15-entry rule table.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{FuzzyError, FuzzyResult};
use crate::membership::{DeltaLabel, ErrorLabel};

/// Per-valve values keyed by valve name.
pub type ValveMap = BTreeMap<String, f64>;

/// Antecedent pair `(error label, delta-error label)`, written `PH_P` etc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RuleKey {
    pub error: ErrorLabel,
    pub delta: DeltaLabel,
}

impl RuleKey {
    pub fn new(error: ErrorLabel, delta: DeltaLabel) -> Self {
        Self { error, delta }
    }

    /// All 15 combinations, error-major.
    pub fn all() -> impl Iterator<Item = RuleKey> {
        ErrorLabel::ALL.into_iter().flat_map(|error| {
            DeltaLabel::ALL
                .into_iter()
                .map(move |delta| RuleKey { error, delta })
        })
    }
}

impl fmt::Display for RuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.error, self.delta)
    }
}

impl FromStr for RuleKey {
    type Err = FuzzyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (error, delta) = s.split_once('_').ok_or_else(|| FuzzyError::InvalidRules {
            what: format!("rule key '{s}' is not of the form ERROR_DELTA"),
        })?;
        Ok(Self {
            error: error.parse()?,
            delta: delta.parse()?,
        })
    }
}

/// Complete rule table: every one of the 15 keys maps to crisp per-valve
/// contributions in `[0, 1]`. Valves absent from an entry contribute 0.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleTable {
    entries: BTreeMap<RuleKey, ValveMap>,
}

impl RuleTable {
    /// Build a table, requiring all 15 keys and finite values in `[0, 1]`.
    pub fn new(entries: BTreeMap<RuleKey, ValveMap>) -> FuzzyResult<Self> {
        for key in RuleKey::all() {
            let Some(outputs) = entries.get(&key) else {
                return Err(FuzzyError::InvalidRules {
                    what: format!("missing rule {key}"),
                });
            };
            for (valve, value) in outputs {
                if !value.is_finite() || !(0.0..=1.0).contains(value) {
                    return Err(FuzzyError::InvalidRules {
                        what: format!("rule {key} value for '{valve}' = {value} is outside [0, 1]"),
                    });
                }
            }
        }
        Ok(Self { entries })
    }

    /// Wrap entries already known to be complete and in range.
    pub(crate) fn from_complete(entries: BTreeMap<RuleKey, ValveMap>) -> Self {
        debug_assert_eq!(entries.len(), 15);
        Self { entries }
    }

    /// Crisp contribution of `valve` under `key` (0 when absent).
    pub fn value(&self, key: RuleKey, valve: &str) -> f64 {
        self.entries
            .get(&key)
            .and_then(|outputs| outputs.get(valve))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn entry(&self, key: RuleKey) -> Option<&ValveMap> {
        self.entries.get(&key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RuleKey, &ValveMap)> {
        self.entries.iter()
    }

    /// Every valve name mentioned anywhere in the table.
    pub fn referenced_valves(&self) -> impl Iterator<Item = &str> {
        self.entries
            .values()
            .flat_map(|outputs| outputs.keys().map(String::as_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_table(value: f64) -> BTreeMap<RuleKey, ValveMap> {
        RuleKey::all()
            .map(|key| (key, ValveMap::from([("fill".to_string(), value)])))
            .collect()
    }

    #[test]
    fn there_are_fifteen_keys() {
        assert_eq!(RuleKey::all().count(), 15);
    }

    #[test]
    fn rule_key_text_form() {
        let key = RuleKey::new(ErrorLabel::PosHigh, DeltaLabel::Positive);
        assert_eq!(key.to_string(), "PH_P");
        assert_eq!("NL_Z".parse::<RuleKey>().unwrap(), RuleKey::new(ErrorLabel::NegLow, DeltaLabel::Zero));
        assert!("PHP".parse::<RuleKey>().is_err());
        assert!("PH_Q".parse::<RuleKey>().is_err());
    }

    #[test]
    fn missing_key_is_rejected() {
        let mut entries = full_table(0.5);
        entries.remove(&RuleKey::new(ErrorLabel::Zero, DeltaLabel::Zero));
        let err = RuleTable::new(entries).unwrap_err();
        assert!(err.to_string().contains("Z_Z"));
    }

    #[test]
    fn out_of_range_value_is_rejected() {
        assert!(RuleTable::new(full_table(1.5)).is_err());
        assert!(RuleTable::new(full_table(-0.1)).is_err());
        assert!(RuleTable::new(full_table(f64::NAN)).is_err());
    }

    #[test]
    fn absent_valve_defaults_to_zero() {
        let table = RuleTable::new(full_table(0.4)).unwrap();
        let key = RuleKey::new(ErrorLabel::PosLow, DeltaLabel::Zero);
        assert_eq!(table.value(key, "fill"), 0.4);
        assert_eq!(table.value(key, "drain"), 0.0);
    }
}
