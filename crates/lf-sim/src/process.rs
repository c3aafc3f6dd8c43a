//! Simulated process behind the [`ProcessIo`] boundary.
//!
//! Physical valve commands are normalized by each valve's output range and
//! held by the plant until the next write. Time only moves when the owner
//! calls [`SimulatedProcess::advance_to`].

use std::collections::BTreeMap;

use lf_controls::{ControlError, ControlResult, ProcessIo};
use lf_core::m3ps;
use lf_fuzzy::Valve;
use tracing::debug;

use crate::error::{SimError, SimResult};
use crate::model::TransientModel;
use crate::schedule::StepSchedule;
use crate::sim::IntegratorType;
use crate::tank::{TankPlant, TankState};

/// Integration sub-step (seconds).
const MAX_SUBSTEP: f64 = 0.05;
const TIME_EPSILON: f64 = 1e-9;

#[derive(Clone, Debug)]
pub struct SimulatedProcess {
    plant: TankPlant,
    state: TankState,
    t: f64,
    integrator: IntegratorType,
    initial_setpoint: f64,
    setpoints: StepSchedule,
    leaks: StepSchedule,
    /// name → (min_out, max_out)
    ranges: BTreeMap<String, (f64, f64)>,
    fill: Option<String>,
    drain: Option<String>,
}

impl SimulatedProcess {
    /// The first valve drives the fill line and the second the drain line.
    pub fn new(plant: TankPlant, valves: &[Valve], initial_setpoint: f64) -> SimResult<Self> {
        if valves.is_empty() {
            return Err(SimError::InvalidArg {
                what: "at least one valve is required",
            });
        }
        if !initial_setpoint.is_finite() {
            return Err(SimError::NonPhysical {
                what: "initial setpoint",
            });
        }
        Ok(Self {
            state: plant.initial_state(),
            plant,
            t: 0.0,
            integrator: IntegratorType::default(),
            initial_setpoint,
            setpoints: StepSchedule::default(),
            leaks: StepSchedule::default(),
            ranges: valves
                .iter()
                .map(|v| (v.name.clone(), (v.min_out, v.max_out)))
                .collect(),
            fill: valves.first().map(|v| v.name.clone()),
            drain: valves.get(1).map(|v| v.name.clone()),
        })
    }

    pub fn with_integrator(mut self, integrator: IntegratorType) -> Self {
        self.integrator = integrator;
        self
    }

    pub fn with_setpoints(mut self, setpoints: StepSchedule) -> Self {
        self.setpoints = setpoints;
        self
    }

    pub fn with_leaks(mut self, leaks: StepSchedule) -> Self {
        self.leaks = leaks;
        self
    }

    /// Integrate the plant up to absolute time `t`.
    pub fn advance_to(&mut self, t: f64) -> SimResult<()> {
        while t - self.t > TIME_EPSILON {
            let mut dt = (t - self.t).min(MAX_SUBSTEP);
            // Land exactly on a leak change so it applies from its start time.
            if let Some(change) = self.leaks.next_change_after(self.t) {
                if change < self.t + dt && change - self.t > TIME_EPSILON {
                    dt = change - self.t;
                }
            }
            self.plant.leak = m3ps(self.leaks.value_at(self.t + TIME_EPSILON).unwrap_or(0.0));
            self.state = self
                .integrator
                .step(&mut self.plant, self.t, &self.state, dt)?;
            self.t += dt;
        }
        self.t = self.t.max(t);
        Ok(())
    }

    pub fn time(&self) -> f64 {
        self.t
    }

    pub fn level(&self) -> f64 {
        self.state.level_m
    }

    pub fn state(&self) -> &TankState {
        &self.state
    }

    pub fn plant(&self) -> &TankPlant {
        &self.plant
    }

    /// Setpoint active at the current simulation time.
    pub fn setpoint(&self) -> f64 {
        self.setpoints
            .value_at(self.t)
            .unwrap_or(self.initial_setpoint)
    }
}

impl ProcessIo for SimulatedProcess {
    fn read_measurement(&mut self) -> ControlResult<f64> {
        Ok(self.level())
    }

    fn read_setpoint(&mut self) -> ControlResult<f64> {
        Ok(self.setpoint())
    }

    fn write_actuator(&mut self, valve: &str, physical: f64) -> ControlResult<()> {
        let &(min_out, max_out) =
            self.ranges
                .get(valve)
                .ok_or_else(|| ControlError::UnknownValve {
                    name: valve.to_string(),
                })?;
        let span = max_out - min_out;
        let normalized = if span > 0.0 {
            ((physical - min_out) / span).clamp(0.0, 1.0)
        } else {
            0.0
        };

        if self.fill.as_deref() == Some(valve) {
            self.plant.commands.fill = normalized;
        } else if self.drain.as_deref() == Some(valve) {
            self.plant.commands.drain = normalized;
        } else {
            debug!(valve, physical, "valve not connected to the simulated plant");
        }
        Ok(())
    }
}
