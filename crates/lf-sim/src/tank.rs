//! Tank level dynamics.
//!
//! ```text
//! A · dh/dt = q_in_max · pos_fill − q_out_max · pos_drain − q_leak
//! ```
//!
//! Outflow stops at an empty tank and inflow stops at the rim; the level is
//! kept within `[0, height]`.

use lf_core::{Area, Length, Velocity, VolumeRate, ensure_finite, m, m2, m3ps};
use uom::si::length::meter;
use uom::si::velocity::meter_per_second;

use crate::actuator::FirstOrderActuator;
use crate::error::{SimError, SimResult};
use crate::model::TransientModel;

/// Plant state: level and the two valve openings.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TankState {
    pub level_m: f64,
    pub fill_position: f64,
    pub drain_position: f64,
}

/// Normalized valve commands held between control ticks.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ValveCommands {
    pub fill: f64,
    pub drain: f64,
}

#[derive(Clone, Debug)]
pub struct TankPlant {
    pub area: Area,
    pub max_inflow: VolumeRate,
    pub max_outflow: VolumeRate,
    pub height: Length,
    pub initial_level: Length,
    pub fill_valve: FirstOrderActuator,
    pub drain_valve: FirstOrderActuator,
    pub commands: ValveCommands,
    /// Extra uncontrolled outflow.
    pub leak: VolumeRate,
}

impl TankPlant {
    pub fn new(
        area_m2: f64,
        max_inflow_m3_s: f64,
        max_outflow_m3_s: f64,
        height_m: f64,
        initial_level_m: f64,
        actuator: FirstOrderActuator,
    ) -> SimResult<Self> {
        let area_m2 = ensure_finite(area_m2, "area_m2")?;
        let height_m = ensure_finite(height_m, "height_m")?;
        let initial_level_m = ensure_finite(initial_level_m, "initial_level_m")?;
        let max_inflow_m3_s = ensure_finite(max_inflow_m3_s, "max_inflow_m3_s")?;
        let max_outflow_m3_s = ensure_finite(max_outflow_m3_s, "max_outflow_m3_s")?;
        if area_m2 <= 0.0 {
            return Err(SimError::InvalidArg {
                what: "area must be positive",
            });
        }
        if height_m <= 0.0 {
            return Err(SimError::InvalidArg {
                what: "height must be positive",
            });
        }
        if max_inflow_m3_s < 0.0 || max_outflow_m3_s < 0.0 {
            return Err(SimError::NonPhysical {
                what: "line capacities must be non-negative",
            });
        }
        if !(0.0..=height_m).contains(&initial_level_m) {
            return Err(SimError::NonPhysical {
                what: "initial level must lie within the tank",
            });
        }
        Ok(Self {
            area: m2(area_m2),
            max_inflow: m3ps(max_inflow_m3_s),
            max_outflow: m3ps(max_outflow_m3_s),
            height: m(height_m),
            initial_level: m(initial_level_m),
            fill_valve: actuator.clone(),
            drain_valve: actuator,
            commands: ValveCommands::default(),
            leak: m3ps(0.0),
        })
    }

    pub fn height_m(&self) -> f64 {
        self.height.get::<meter>()
    }

    /// Level rate for the given valve openings and level.
    pub fn level_rate(&self, level_m: f64, fill_position: f64, drain_position: f64) -> Velocity {
        let inflow = if level_m >= self.height_m() {
            m3ps(0.0)
        } else {
            self.max_inflow * fill_position.clamp(0.0, 1.0)
        };
        let outflow = if level_m <= 0.0 {
            m3ps(0.0)
        } else {
            self.max_outflow * drain_position.clamp(0.0, 1.0) + self.leak
        };
        (inflow - outflow) / self.area
    }
}

impl TransientModel for TankPlant {
    type State = TankState;

    fn initial_state(&self) -> TankState {
        TankState {
            level_m: self.initial_level.get::<meter>(),
            fill_position: 0.0,
            drain_position: 0.0,
        }
    }

    fn rhs(&mut self, _t: f64, x: &TankState) -> SimResult<TankState> {
        let dh = self
            .level_rate(x.level_m, x.fill_position, x.drain_position)
            .get::<meter_per_second>();
        if !dh.is_finite() {
            return Err(SimError::NonPhysical {
                what: "level rate is not finite",
            });
        }
        Ok(TankState {
            level_m: dh,
            fill_position: self.fill_valve.dpdt(x.fill_position, self.commands.fill),
            drain_position: self.drain_valve.dpdt(x.drain_position, self.commands.drain),
        })
    }

    fn add(&self, a: &TankState, b: &TankState) -> TankState {
        TankState {
            level_m: a.level_m + b.level_m,
            fill_position: a.fill_position + b.fill_position,
            drain_position: a.drain_position + b.drain_position,
        }
    }

    fn scale(&self, a: &TankState, scale: f64) -> TankState {
        TankState {
            level_m: a.level_m * scale,
            fill_position: a.fill_position * scale,
            drain_position: a.drain_position * scale,
        }
    }

    fn constrain(&self, x: TankState) -> TankState {
        TankState {
            level_m: x.level_m.clamp(0.0, self.height_m()),
            fill_position: x.fill_position.clamp(0.0, 1.0),
            drain_position: x.drain_position.clamp(0.0, 1.0),
        }
    }
}
