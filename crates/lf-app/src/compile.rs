//! Compile a project into runtime objects.
//!
//! The project file is plain data; this module turns it into the fuzzy
//! configuration, the adaptive controller, the loop timing and the
//! simulated process. Explicit membership and rules win over the tuning
//! parameters; without them the configuration is generated.

use std::collections::BTreeMap;

use lf_controls::{AdaptationSettings, AdaptiveController, SampleConfig};
use lf_fuzzy::{
    ErrorSets, FuzzyConfig, RuleKey, RuleTable, Triangle, TuningParams, Valve, ValveMap, generate,
};
use lf_project::schema::{
    AdaptationDef, ErrorSetsDef, FuzzyDef, Project, TimingDef, TuningDef,
};
use lf_sim::{FirstOrderActuator, SimulatedProcess, StepSchedule, TankPlant};
use tracing::debug;

use crate::error::AppResult;

/// Periods of the two loop ticks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopTiming {
    pub control: SampleConfig,
    pub sample: SampleConfig,
}

pub fn valves(project: &Project) -> AppResult<Vec<Valve>> {
    let valves = project
        .valves
        .iter()
        .map(|v| Valve::new(v.name.clone(), v.min_out, v.max_out))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(valves)
}

pub fn tuning_params(def: &TuningDef) -> TuningParams {
    TuningParams {
        min_level: def.min_level,
        max_level: def.max_level,
        set_level: def.set_level,
        aggressiveness: def.aggressiveness,
        precision: def.precision,
    }
}

pub fn adaptation_settings(def: &AdaptationDef) -> AdaptationSettings {
    AdaptationSettings {
        learning_enabled: def.learning_enabled,
        disturbance_threshold: def.disturbance_threshold,
        disturbance_delay_s: def.disturbance_delay_s,
        fine_tune_interval_s: def.fine_tune_interval_s,
        fine_tune_aggressiveness: def.fine_tune_aggressiveness,
        precision_threshold: def.precision_threshold,
        precision_aggressiveness: def.precision_aggressiveness,
        settle_timeout_s: def.settle_timeout_s,
    }
}

pub fn loop_timing(def: &TimingDef) -> AppResult<LoopTiming> {
    Ok(LoopTiming {
        control: SampleConfig::new(def.control_period_s)?,
        sample: SampleConfig::new(def.sample_period_s)?,
    })
}

fn triangle(points: [f64; 3]) -> AppResult<Triangle> {
    let [left, peak, right] = points;
    Ok(Triangle::new(left, peak, right)?)
}

fn error_sets(def: &ErrorSetsDef) -> AppResult<ErrorSets> {
    Ok(ErrorSets {
        nh: triangle(def.nh)?,
        nl: triangle(def.nl)?,
        z: triangle(def.z)?,
        pl: triangle(def.pl)?,
        ph: triangle(def.ph)?,
    })
}

fn rule_table(rules: &BTreeMap<String, BTreeMap<String, f64>>) -> AppResult<RuleTable> {
    let mut entries: BTreeMap<RuleKey, ValveMap> = BTreeMap::new();
    for (key, outputs) in rules {
        entries.insert(key.parse()?, outputs.clone());
    }
    Ok(RuleTable::new(entries)?)
}

/// Active fuzzy configuration for `project`.
pub fn fuzzy_config(project: &Project) -> AppResult<FuzzyConfig> {
    let valves = valves(project)?;
    match &project.fuzzy {
        Some(def) => {
            let config = FuzzyConfig {
                universe_max: def.universe_max,
                error_sets: error_sets(&def.error_sets)?,
                valves,
                rules: rule_table(&def.rules)?,
            };
            config.validate()?;
            debug!(universe_max = config.universe_max, "explicit fuzzy configuration");
            Ok(config)
        }
        None => {
            let config = generate(&tuning_params(&project.tuning), valves)?;
            debug!(universe_max = config.universe_max, "generated fuzzy configuration");
            Ok(config)
        }
    }
}

/// Project-file form of a configuration, e.g. to pin a generated one.
pub fn fuzzy_def(config: &FuzzyConfig) -> FuzzyDef {
    let sets = &config.error_sets;
    let points = |t: &Triangle| [t.left, t.peak, t.right];
    FuzzyDef {
        universe_max: config.universe_max,
        error_sets: ErrorSetsDef {
            nh: points(&sets.nh),
            nl: points(&sets.nl),
            z: points(&sets.z),
            pl: points(&sets.pl),
            ph: points(&sets.ph),
        },
        rules: config
            .rules
            .iter()
            .map(|(key, outputs)| (key.to_string(), outputs.clone()))
            .collect(),
    }
}

/// Stopped controller with the project's configuration, base tuning and
/// persisted gains.
pub fn build_controller(project: &Project) -> AppResult<AdaptiveController> {
    let config = fuzzy_config(project)?;
    let settings = adaptation_settings(&project.adaptation);
    let mut controller = AdaptiveController::new(config, settings)?;
    controller.set_base_tuning(tuning_params(&project.tuning))?;
    if !project.gain_multipliers.is_empty() {
        controller.restore_gains(&project.gain_multipliers)?;
    }
    Ok(controller)
}

/// Simulated tank for `project`; the default plant when none is given.
///
/// The initial setpoint is the tuning set level.
pub fn build_process(project: &Project) -> AppResult<SimulatedProcess> {
    let def = project.plant.clone().unwrap_or_default();
    let actuator = FirstOrderActuator::new(def.valve_tau_s, def.valve_rate_limit_per_s)?;
    let plant = TankPlant::new(
        def.area_m2,
        def.max_inflow_m3_s,
        def.max_outflow_m3_s,
        def.height_m,
        def.initial_level_m,
        actuator,
    )?;
    let setpoints = StepSchedule::new(def.setpoints.iter().map(|s| (s.t_s, s.level_m)).collect())?;
    let leaks = StepSchedule::new(def.leaks.iter().map(|l| (l.t_s, l.outflow_m3_s)).collect())?;
    let valves = valves(project)?;
    let process = SimulatedProcess::new(plant, &valves, project.tuning.set_level)?
        .with_setpoints(setpoints)
        .with_leaks(leaks);
    Ok(process)
}
