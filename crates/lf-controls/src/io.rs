//! Process boundary.
//!
//! The controller never talks to hardware itself. A [`ProcessIo`]
//! implementation supplies the measurement and the setpoint and accepts
//! physical valve commands. The register protocol behind it is not part of
//! this crate.

use crate::error::ControlResult;

/// Access to the controlled process.
pub trait ProcessIo {
    /// Read the current process measurement (tank level).
    fn read_measurement(&mut self) -> ControlResult<f64>;

    /// Read the setpoint currently active on the process side.
    fn read_setpoint(&mut self) -> ControlResult<f64>;

    /// Write a physical command to a valve. Best effort: a failure must not
    /// affect the controller's state.
    fn write_actuator(&mut self, valve: &str, physical: f64) -> ControlResult<()>;
}
