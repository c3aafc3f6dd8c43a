//! Import of the single-file JSON settings written by the earlier
//! desktop controller.
//!
//! That format keeps the tuning parameters under `opt_*` keys, the error
//! breakpoints under `points`, the rule table under `outputs` and the gains
//! under `gain_multipliers`. Valve register offsets and the stored
//! optimisation scores have no counterpart here and are ignored.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::schema::{
    AdaptationDef, ErrorSetsDef, FuzzyDef, Project, TimingDef, TuningDef, ValveDef,
};
use crate::validate::rule_keys;
use crate::{ProjectResult, migrate_to_latest, validate_project};

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LegacySettings {
    #[serde(default)]
    pub universe_max: Option<f64>,
    #[serde(default)]
    pub opt_min: Option<f64>,
    #[serde(default)]
    pub opt_max: Option<f64>,
    #[serde(default)]
    pub opt_set: Option<f64>,
    #[serde(default)]
    pub opt_aggr: Option<f64>,
    #[serde(default)]
    pub opt_prec: Option<f64>,
    #[serde(default)]
    pub points: Option<BTreeMap<String, [f64; 3]>>,
    #[serde(default)]
    pub valves: Vec<LegacyValve>,
    #[serde(default)]
    pub outputs: BTreeMap<String, BTreeMap<String, f64>>,
    #[serde(default)]
    pub gain_multipliers: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LegacyValve {
    pub name: String,
    pub min_out: f64,
    pub max_out: f64,
}

impl LegacySettings {
    /// Convert to a version-0 project.
    ///
    /// The explicit fuzzy section is kept only when all five labels and all
    /// fifteen rules are present; otherwise membership is regenerated from
    /// the tuning parameters.
    pub fn into_project(self, name: impl Into<String>) -> Project {
        let defaults = TuningDef::default();
        let tuning = TuningDef {
            min_level: self.opt_min.unwrap_or(defaults.min_level),
            max_level: self.opt_max.unwrap_or(defaults.max_level),
            set_level: self.opt_set.unwrap_or(defaults.set_level),
            aggressiveness: self.opt_aggr.unwrap_or(defaults.aggressiveness),
            precision: self.opt_prec.unwrap_or(defaults.precision),
        };

        let complete_rules = rule_keys().all(|key| self.outputs.contains_key(&key));
        let fuzzy = match (self.universe_max, self.points.as_ref()) {
            (Some(universe_max), Some(points)) if complete_rules => {
                let get = |label: &str| points.get(label).copied();
                match (get("NH"), get("NL"), get("Z"), get("PL"), get("PH")) {
                    (Some(nh), Some(nl), Some(z), Some(pl), Some(ph)) => Some(FuzzyDef {
                        universe_max,
                        error_sets: ErrorSetsDef { nh, nl, z, pl, ph },
                        rules: self.outputs.clone(),
                    }),
                    _ => None,
                }
            }
            _ => None,
        };

        Project {
            version: 0,
            name: name.into(),
            valves: self
                .valves
                .into_iter()
                .map(|v| ValveDef {
                    name: v.name,
                    min_out: v.min_out,
                    max_out: v.max_out,
                })
                .collect(),
            tuning,
            fuzzy,
            adaptation: AdaptationDef::default(),
            timing: TimingDef::default(),
            gain_multipliers: self.gain_multipliers,
            plant: None,
        }
    }
}

/// Read a legacy settings file and convert it to a validated project.
pub fn import_legacy_json(path: &Path) -> ProjectResult<Project> {
    let content = std::fs::read_to_string(path)?;
    let settings: LegacySettings = serde_json::from_str(&content)?;
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("imported")
        .to_string();
    let project = migrate_to_latest(settings.into_project(name))?;
    validate_project(&project)?;
    Ok(project)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARTIAL: &str = r#"{
        "universe_max": 5, "control_range": 5.0,
        "opt_min": 0, "opt_max": 5, "opt_set": 3.3, "opt_aggr": 4.0, "opt_prec": 2.0,
        "points": {"NH": [-5,-5,-2.5], "NL": [-3.5,-1.5,-0.1], "Z": [-0.5,0,0.5],
                   "PL": [0.1,1.5,3.5], "PH": [2.5,5,5]},
        "valves": [
            {"name": "fill", "min_out": 0.0, "max_out": 10.0, "offset": 4},
            {"name": "drain", "min_out": 0.0, "max_out": 10.0, "offset": 12}
        ],
        "outputs": {"NH_N": {"fill": 0.0, "drain": 1.0}},
        "gain_multipliers": {"fill": 1.0, "drain": 1.0},
        "best_performance_score": 0.0
    }"#;

    #[test]
    fn partial_rules_fall_back_to_generation() {
        let settings: LegacySettings = serde_json::from_str(PARTIAL).unwrap();
        let project = migrate_to_latest(settings.into_project("tank")).unwrap();
        assert!(project.fuzzy.is_none());
        assert_eq!(project.valves.len(), 2);
        assert_eq!(project.tuning.set_level, 3.3);
        assert!(project.gain_multipliers.is_empty());
        assert!(validate_project(&project).is_ok());
    }

    #[test]
    fn complete_rules_are_kept() {
        let mut settings: LegacySettings = serde_json::from_str(PARTIAL).unwrap();
        for key in rule_keys() {
            settings
                .outputs
                .insert(key, BTreeMap::from([("fill".to_string(), 0.5)]));
        }
        settings.gain_multipliers.insert("fill".into(), 1.25);
        let project = migrate_to_latest(settings.into_project("tank")).unwrap();
        let fuzzy = project.fuzzy.as_ref().unwrap();
        assert_eq!(fuzzy.universe_max, 5.0);
        assert_eq!(fuzzy.error_sets.pl, [0.1, 1.5, 3.5]);
        assert_eq!(project.gain_multipliers["fill"], 1.25);
        assert!(validate_project(&project).is_ok());
    }
}
