//! Simulated tank plant for closed-loop testing.
//!
//! Provides:
//! - Tank level dynamics with fill/drain lines and a leak
//! - Valve actuators with first-order lag and rate limiting
//! - Fixed-step RK4 and forward Euler integrators
//! - Step schedules for leaks and setpoint changes
//! - [`SimulatedProcess`], a [`lf_controls::ProcessIo`] backed by the plant

pub mod actuator;
pub mod error;
pub mod integrator;
pub mod model;
pub mod process;
pub mod schedule;
pub mod sim;
pub mod tank;

pub use actuator::{ActuatorState, FirstOrderActuator};
pub use error::{SimError, SimResult};
pub use integrator::{ForwardEuler, Integrator, RK4};
pub use model::TransientModel;
pub use process::SimulatedProcess;
pub use schedule::StepSchedule;
pub use sim::{IntegratorType, OpenLoopOptions, Trajectory, run_open_loop};
pub use tank::{TankPlant, TankState, ValveCommands};
