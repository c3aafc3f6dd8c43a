//! Closed-loop simulation runs.
//!
//! A run compiles the project into a controller and a simulated tank, then
//! steps a manual clock through the requested duration. At every step the
//! plant is integrated up to the clock time and the control loop is polled;
//! each control tick becomes one [`RunRecord`].

use lf_controls::StateTag;
use lf_core::{Clock, ManualClock};
use lf_fuzzy::ValveMap;
use lf_project::schema::Project;
use lf_sim::IntegratorType;
use serde::Serialize;
use tracing::info;

use crate::compile;
use crate::control_loop::ControlLoop;
use crate::error::{AppError, AppResult};

/// Options for a simulation run.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub duration_s: f64,
    /// Clock step; control and sampling ticks fire on the first step at or
    /// after their due time.
    pub step_s: f64,
    /// Keep every n-th control tick.
    pub record_every: usize,
    pub integrator: IntegratorType,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            duration_s: 300.0,
            step_s: 0.05,
            record_every: 1,
            integrator: IntegratorType::default(),
        }
    }
}

impl RunOptions {
    fn validate(&self) -> AppResult<()> {
        if !self.duration_s.is_finite() || self.duration_s < 0.0 {
            return Err(AppError::InvalidInput(format!(
                "duration must be non-negative, got {}",
                self.duration_s
            )));
        }
        if !self.step_s.is_finite() || self.step_s <= 0.0 {
            return Err(AppError::InvalidInput(format!(
                "step must be positive, got {}",
                self.step_s
            )));
        }
        if self.record_every == 0 {
            return Err(AppError::InvalidInput(
                "record_every must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// One recorded control tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunRecord {
    pub t: f64,
    pub level: f64,
    pub setpoint: f64,
    pub error: f64,
    pub state: StateTag,
    /// Physical command per valve.
    pub commands: ValveMap,
    pub gains: ValveMap,
}

/// Progress report, emitted once per simulated second.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunProgress {
    pub sim_time_s: f64,
    pub t_end_s: f64,
    pub fraction_complete: f64,
    pub state: StateTag,
    pub level: f64,
}

#[derive(Debug, Clone)]
pub struct RunResponse {
    pub records: Vec<RunRecord>,
    pub valves: Vec<String>,
    pub final_state: StateTag,
    pub final_level: f64,
    /// Gains at the end of the run, ready to be stored in the project.
    pub gains: ValveMap,
    pub is_adapted: bool,
    pub control_ticks: usize,
    pub skipped_ticks: u64,
}

pub fn simulate(project: &Project, options: &RunOptions) -> AppResult<RunResponse> {
    simulate_with_progress(project, options, None)
}

pub fn simulate_with_progress(
    project: &Project,
    options: &RunOptions,
    mut progress_cb: Option<&mut dyn FnMut(RunProgress)>,
) -> AppResult<RunResponse> {
    options.validate()?;
    let controller = compile::build_controller(project)?;
    let timing = compile::loop_timing(&project.timing)?;
    let mut process = compile::build_process(project)?.with_integrator(options.integrator);
    let valves: Vec<String> = project.valves.iter().map(|v| v.name.clone()).collect();

    let clock = ManualClock::new(0.0);
    let mut control = ControlLoop::new(controller, timing, clock.now_s());
    control.start(clock.now_s());
    info!(
        project = %project.name,
        duration_s = options.duration_s,
        adapted = control.controller().is_adapted(),
        "simulation started"
    );

    let steps = (options.duration_s / options.step_s).round() as u64;
    let steps_per_report = ((1.0 / options.step_s).round() as u64).max(1);
    let mut records = Vec::new();
    let mut control_ticks = 0;

    for i in 0..=steps {
        // Index times keep the clock free of accumulated rounding.
        clock.set(i as f64 * options.step_s);
        let now = clock.now_s();
        process.advance_to(now)?;

        if let Some(report) = control.poll_clock(&mut process, &clock) {
            if control_ticks % options.record_every == 0 {
                records.push(RunRecord {
                    t: report.t,
                    level: report.level,
                    setpoint: report.setpoint,
                    error: report.error,
                    state: report.state(),
                    commands: report.output.commands,
                    gains: control.controller().gains().clone(),
                });
            }
            control_ticks += 1;
        }

        if i % steps_per_report == 0 {
            if let Some(cb) = progress_cb.as_deref_mut() {
                cb(RunProgress {
                    sim_time_s: now,
                    t_end_s: options.duration_s,
                    fraction_complete: if steps == 0 { 1.0 } else { i as f64 / steps as f64 },
                    state: control.controller().current_state(),
                    level: process.level(),
                });
            }
        }
    }

    let skipped_ticks = control.skipped_ticks();
    let controller = control.into_controller();
    let response = RunResponse {
        records,
        valves,
        final_state: controller.current_state(),
        final_level: process.level(),
        gains: controller.gains().clone(),
        is_adapted: controller.is_adapted(),
        control_ticks,
        skipped_ticks,
    };
    info!(
        ticks = response.control_ticks,
        skipped = response.skipped_ticks,
        state = %response.final_state,
        level = response.final_level,
        "simulation finished"
    );
    Ok(response)
}

/// Render records as CSV: time, level, setpoint, error, state, then one
/// command column and one gain column per valve.
pub fn records_to_csv(response: &RunResponse) -> String {
    let mut csv = String::from("t_s,level_m,setpoint_m,error_m,state");
    for valve in &response.valves {
        csv.push_str(&format!(",{valve}"));
    }
    for valve in &response.valves {
        csv.push_str(&format!(",gain_{valve}"));
    }
    csv.push('\n');

    for record in &response.records {
        csv.push_str(&format!(
            "{},{},{},{},{}",
            record.t, record.level, record.setpoint, record.error, record.state
        ));
        for valve in &response.valves {
            let value = record.commands.get(valve).copied().unwrap_or(0.0);
            csv.push_str(&format!(",{value}"));
        }
        for valve in &response.valves {
            let gain = record.gains.get(valve).copied().unwrap_or(1.0);
            csv.push_str(&format!(",{gain}"));
        }
        csv.push('\n');
    }
    csv
}

/// Render records as pretty-printed JSON.
pub fn records_to_json(response: &RunResponse) -> AppResult<String> {
    serde_json::to_string_pretty(&response.records)
        .map_err(|e| AppError::Simulation(format!("failed to serialize records: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project_service::default_project;

    #[test]
    fn rejects_bad_options() {
        let project = default_project("tank");
        let options = RunOptions {
            step_s: 0.0,
            ..RunOptions::default()
        };
        assert!(matches!(
            simulate(&project, &options),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn records_every_control_tick() {
        let project = default_project("tank");
        let options = RunOptions {
            duration_s: 10.0,
            ..RunOptions::default()
        };
        let response = simulate(&project, &options).unwrap();
        // 0.0, 0.5, ..., 10.0
        assert_eq!(response.control_ticks, 21);
        assert_eq!(response.records.len(), 21);
        assert_eq!(response.skipped_ticks, 0);
    }

    #[test]
    fn progress_is_reported_each_second() {
        let project = default_project("tank");
        let options = RunOptions {
            duration_s: 5.0,
            ..RunOptions::default()
        };
        let mut seen = Vec::new();
        let mut cb = |p: RunProgress| seen.push(p.sim_time_s);
        simulate_with_progress(&project, &options, Some(&mut cb)).unwrap();
        assert_eq!(seen.len(), 6);
        assert_eq!(seen[0], 0.0);
    }

    #[test]
    fn csv_has_one_row_per_record() {
        let project = default_project("tank");
        let options = RunOptions {
            duration_s: 2.0,
            record_every: 2,
            ..RunOptions::default()
        };
        let response = simulate(&project, &options).unwrap();
        let csv = records_to_csv(&response);
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("t_s,level_m,setpoint_m,error_m,state,fill,drain,gain_fill,gain_drain")
        );
        assert_eq!(lines.count(), response.records.len());
        assert_eq!(response.records.len(), 3);
        assert!(records_to_json(&response).unwrap().contains("\"STABLE\""));
    }
}
