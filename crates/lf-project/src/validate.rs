//! Project validation logic.

use std::collections::HashSet;

use crate::schema::{AdaptationDef, FuzzyDef, PlantDef, Project, TimingDef, TuningDef};

#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("Duplicate ID: {id} in {context}")]
    DuplicateId { id: String, context: String },

    #[error("Missing reference: {id} in {context}")]
    MissingReference { id: String, context: String },

    #[error("Invalid value: {field} = {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Unsupported version: {version}")]
    UnsupportedVersion { version: u32 },
}

const ERROR_LABELS: [&str; 5] = ["NH", "NL", "Z", "PL", "PH"];
const DELTA_LABELS: [&str; 3] = ["N", "Z", "P"];

/// The 15 rule keys, `NH_N` through `PH_P`.
pub fn rule_keys() -> impl Iterator<Item = String> {
    ERROR_LABELS
        .into_iter()
        .flat_map(|e| DELTA_LABELS.into_iter().map(move |d| format!("{e}_{d}")))
}

fn invalid(field: impl Into<String>, value: impl ToString, reason: &str) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.into(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn require_positive(field: &str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(invalid(field, value, "must be positive"));
    }
    Ok(())
}

fn require_non_negative(field: &str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() || value < 0.0 {
        return Err(invalid(field, value, "must be non-negative"));
    }
    Ok(())
}

pub fn validate_project(project: &Project) -> Result<(), ValidationError> {
    if project.version > crate::migrate::LATEST_VERSION {
        return Err(ValidationError::UnsupportedVersion {
            version: project.version,
        });
    }

    if project.valves.is_empty() {
        return Err(invalid("valves", "[]", "at least one valve is required"));
    }
    let mut valve_names = HashSet::new();
    for valve in &project.valves {
        if valve.name.trim().is_empty() {
            return Err(invalid("valves.name", "''", "must not be empty"));
        }
        if !valve_names.insert(valve.name.as_str()) {
            return Err(ValidationError::DuplicateId {
                id: valve.name.clone(),
                context: "valves".to_string(),
            });
        }
        if !valve.min_out.is_finite() || !valve.max_out.is_finite() {
            return Err(invalid(
                format!("valves.{}", valve.name),
                format!("[{}, {}]", valve.min_out, valve.max_out),
                "output bounds must be finite",
            ));
        }
        if valve.min_out > valve.max_out {
            return Err(invalid(
                format!("valves.{}.min_out", valve.name),
                valve.min_out,
                "must not exceed max_out",
            ));
        }
    }

    validate_tuning(&project.tuning)?;
    if let Some(fuzzy) = &project.fuzzy {
        validate_fuzzy(fuzzy, &valve_names)?;
    }
    validate_adaptation(&project.adaptation)?;
    validate_timing(&project.timing)?;

    for (valve, gain) in &project.gain_multipliers {
        if !valve_names.contains(valve.as_str()) {
            return Err(ValidationError::MissingReference {
                id: valve.clone(),
                context: "gain_multipliers".to_string(),
            });
        }
        if !gain.is_finite() || *gain < 1.0 {
            return Err(invalid(
                format!("gain_multipliers.{valve}"),
                gain,
                "must be at least 1.0",
            ));
        }
    }

    if let Some(plant) = &project.plant {
        validate_plant(plant)?;
    }

    Ok(())
}

fn validate_tuning(tuning: &TuningDef) -> Result<(), ValidationError> {
    for (field, value) in [
        ("tuning.min_level", tuning.min_level),
        ("tuning.max_level", tuning.max_level),
        ("tuning.set_level", tuning.set_level),
    ] {
        if !value.is_finite() {
            return Err(invalid(field, value, "must be finite"));
        }
    }
    if tuning.min_level > tuning.max_level {
        return Err(invalid(
            "tuning.min_level",
            tuning.min_level,
            "must not exceed max_level",
        ));
    }
    if tuning.set_level < tuning.min_level || tuning.set_level > tuning.max_level {
        return Err(invalid(
            "tuning.set_level",
            tuning.set_level,
            "must lie between min_level and max_level",
        ));
    }
    require_positive("tuning.aggressiveness", tuning.aggressiveness)?;
    require_positive("tuning.precision", tuning.precision)?;
    Ok(())
}

fn validate_fuzzy(fuzzy: &FuzzyDef, valve_names: &HashSet<&str>) -> Result<(), ValidationError> {
    require_positive("fuzzy.universe_max", fuzzy.universe_max)?;

    for (label, [left, peak, right]) in fuzzy.error_sets.labelled() {
        let field = format!("fuzzy.error_sets.{label}");
        if !(left.is_finite() && peak.is_finite() && right.is_finite()) {
            return Err(invalid(field, format!("[{left}, {peak}, {right}]"), "must be finite"));
        }
        if !(left <= peak && peak <= right) {
            return Err(invalid(
                field,
                format!("[{left}, {peak}, {right}]"),
                "breakpoints must satisfy left <= peak <= right",
            ));
        }
    }

    let known: HashSet<String> = rule_keys().collect();
    for key in fuzzy.rules.keys() {
        if !known.contains(key) {
            return Err(invalid("fuzzy.rules", key, "unknown rule key"));
        }
    }
    for key in rule_keys() {
        let Some(outputs) = fuzzy.rules.get(&key) else {
            return Err(ValidationError::MissingReference {
                id: key,
                context: "fuzzy.rules".to_string(),
            });
        };
        for (valve, value) in outputs {
            if !valve_names.contains(valve.as_str()) {
                return Err(ValidationError::MissingReference {
                    id: valve.clone(),
                    context: format!("fuzzy.rules.{key}"),
                });
            }
            if !value.is_finite() || !(0.0..=1.0).contains(value) {
                return Err(invalid(
                    format!("fuzzy.rules.{key}.{valve}"),
                    value,
                    "must lie in [0, 1]",
                ));
            }
        }
    }
    Ok(())
}

fn validate_adaptation(a: &AdaptationDef) -> Result<(), ValidationError> {
    require_positive("adaptation.disturbance_threshold", a.disturbance_threshold)?;
    require_non_negative("adaptation.disturbance_delay_s", a.disturbance_delay_s)?;
    require_positive("adaptation.fine_tune_interval_s", a.fine_tune_interval_s)?;
    require_positive(
        "adaptation.fine_tune_aggressiveness",
        a.fine_tune_aggressiveness,
    )?;
    require_positive("adaptation.precision_threshold", a.precision_threshold)?;
    require_positive(
        "adaptation.precision_aggressiveness",
        a.precision_aggressiveness,
    )?;
    require_positive("adaptation.settle_timeout_s", a.settle_timeout_s)?;
    Ok(())
}

fn validate_timing(t: &TimingDef) -> Result<(), ValidationError> {
    require_positive("timing.control_period_s", t.control_period_s)?;
    require_positive("timing.sample_period_s", t.sample_period_s)?;
    Ok(())
}

fn validate_plant(plant: &PlantDef) -> Result<(), ValidationError> {
    require_positive("plant.area_m2", plant.area_m2)?;
    require_non_negative("plant.max_inflow_m3_s", plant.max_inflow_m3_s)?;
    require_non_negative("plant.max_outflow_m3_s", plant.max_outflow_m3_s)?;
    require_positive("plant.height_m", plant.height_m)?;
    require_non_negative("plant.initial_level_m", plant.initial_level_m)?;
    if plant.initial_level_m > plant.height_m {
        return Err(invalid(
            "plant.initial_level_m",
            plant.initial_level_m,
            "must not exceed height_m",
        ));
    }
    require_positive("plant.valve_tau_s", plant.valve_tau_s)?;
    require_positive("plant.valve_rate_limit_per_s", plant.valve_rate_limit_per_s)?;

    for leak in &plant.leaks {
        require_non_negative("plant.leaks.t_s", leak.t_s)?;
        require_non_negative("plant.leaks.outflow_m3_s", leak.outflow_m3_s)?;
    }
    for setpoint in &plant.setpoints {
        require_non_negative("plant.setpoints.t_s", setpoint.t_s)?;
        if !setpoint.level_m.is_finite()
            || setpoint.level_m < 0.0
            || setpoint.level_m > plant.height_m
        {
            return Err(invalid(
                "plant.setpoints.level_m",
                setpoint.level_m,
                "must lie between 0 and height_m",
            ));
        }
    }
    Ok(())
}
