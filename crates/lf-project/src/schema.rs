//! Project schema definitions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub version: u32,
    pub name: String,
    /// Ordered valve list; the first fills, the second drains.
    pub valves: Vec<ValveDef>,
    #[serde(default)]
    pub tuning: TuningDef,
    /// Explicit membership and rules. Generated from `tuning` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fuzzy: Option<FuzzyDef>,
    #[serde(default)]
    pub adaptation: AdaptationDef,
    #[serde(default)]
    pub timing: TimingDef,
    /// Persisted per-valve gain multipliers.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub gain_multipliers: BTreeMap<String, f64>,
    /// Simulated plant, used by `simulate` only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plant: Option<PlantDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValveDef {
    pub name: String,
    pub min_out: f64,
    pub max_out: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TuningDef {
    pub min_level: f64,
    pub max_level: f64,
    pub set_level: f64,
    #[serde(default = "default_aggressiveness")]
    pub aggressiveness: f64,
    #[serde(default = "default_precision")]
    pub precision: f64,
}

impl Default for TuningDef {
    fn default() -> Self {
        Self {
            min_level: 0.0,
            max_level: 5.0,
            set_level: 3.3,
            aggressiveness: default_aggressiveness(),
            precision: default_precision(),
        }
    }
}

fn default_aggressiveness() -> f64 {
    4.0
}

fn default_precision() -> f64 {
    2.0
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FuzzyDef {
    pub universe_max: f64,
    pub error_sets: ErrorSetsDef,
    /// Rule key (`PH_P` etc.) to per-valve value in `[0, 1]`.
    pub rules: BTreeMap<String, BTreeMap<String, f64>>,
}

/// Breakpoints `[left, peak, right]` per error label.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ErrorSetsDef {
    #[serde(rename = "NH")]
    pub nh: [f64; 3],
    #[serde(rename = "NL")]
    pub nl: [f64; 3],
    #[serde(rename = "Z")]
    pub z: [f64; 3],
    #[serde(rename = "PL")]
    pub pl: [f64; 3],
    #[serde(rename = "PH")]
    pub ph: [f64; 3],
}

impl ErrorSetsDef {
    pub fn labelled(&self) -> [(&'static str, [f64; 3]); 5] {
        [
            ("NH", self.nh),
            ("NL", self.nl),
            ("Z", self.z),
            ("PL", self.pl),
            ("PH", self.ph),
        ]
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AdaptationDef {
    pub learning_enabled: bool,
    pub disturbance_threshold: f64,
    pub disturbance_delay_s: f64,
    pub fine_tune_interval_s: f64,
    pub fine_tune_aggressiveness: f64,
    pub precision_threshold: f64,
    pub precision_aggressiveness: f64,
    pub settle_timeout_s: f64,
}

impl Default for AdaptationDef {
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

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimingDef {
    pub control_period_s: f64,
    pub sample_period_s: f64,
}

impl Default for TimingDef {
    fn default() -> Self {
        Self {
            control_period_s: 0.5,
            sample_period_s: 1.0,
        }
    }
}

/// Cylindrical tank with one fill and one drain line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlantDef {
    pub area_m2: f64,
    /// Inflow at full fill-valve command.
    pub max_inflow_m3_s: f64,
    /// Outflow at full drain-valve command.
    pub max_outflow_m3_s: f64,
    pub height_m: f64,
    pub initial_level_m: f64,
    #[serde(default = "default_valve_tau")]
    pub valve_tau_s: f64,
    #[serde(default = "default_valve_rate_limit")]
    pub valve_rate_limit_per_s: f64,
    #[serde(default)]
    pub leaks: Vec<LeakDef>,
    #[serde(default)]
    pub setpoints: Vec<SetpointDef>,
}

fn default_valve_tau() -> f64 {
    1.0
}

fn default_valve_rate_limit() -> f64 {
    0.5
}

impl Default for PlantDef {
    fn default() -> Self {
        Self {
            area_m2: 0.5,
            max_inflow_m3_s: 0.02,
            max_outflow_m3_s: 0.02,
            height_m: 5.0,
            initial_level_m: 3.3,
            valve_tau_s: default_valve_tau(),
            valve_rate_limit_per_s: default_valve_rate_limit(),
            leaks: Vec::new(),
            setpoints: Vec::new(),
        }
    }
}

/// Constant extra outflow starting at `t_s`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct LeakDef {
    pub t_s: f64,
    pub outflow_m3_s: f64,
}

/// Setpoint change at `t_s`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SetpointDef {
    pub t_s: f64,
    pub level_m: f64,
}
