//! Dual-tick control loop.
//!
//! The sampling tick refreshes the held measurement; the control tick reads
//! the setpoint, computes the error and its change since the previous
//! control tick, runs the controller and writes every valve command. Both
//! ticks are driven by the same time value, sampled once per [`ControlLoop::poll`].
//!
//! Device failures never reach the controller: a failed measurement read
//! keeps the previous held value, a failed setpoint read skips the control
//! tick, and a failed actuator write is logged and otherwise ignored.

use lf_controls::{
    AdaptiveController, ProcessIo, SampleClock, StateTag, TickOutput, ZeroOrderHold,
};
use lf_core::Clock;
use tracing::{debug, info, warn};

use crate::compile::LoopTiming;

/// Setpoint changes at or below this are treated as noise.
pub const SETPOINT_CHANGE_MIN: f64 = 0.001;

/// What happened on one control tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub t: f64,
    pub level: f64,
    pub setpoint: f64,
    pub error: f64,
    pub output: TickOutput,
    /// Number of actuator writes that failed.
    pub failed_writes: usize,
}

impl TickReport {
    pub fn state(&self) -> StateTag {
        self.output.state
    }
}

#[derive(Debug, Clone)]
pub struct ControlLoop {
    controller: AdaptiveController,
    control_clock: SampleClock,
    measurement: ZeroOrderHold,
    last_error: Option<f64>,
    last_setpoint: Option<f64>,
    last_tick: Option<f64>,
    skipped_ticks: u64,
}

impl ControlLoop {
    pub fn new(controller: AdaptiveController, timing: LoopTiming, now: f64) -> Self {
        Self {
            controller,
            control_clock: SampleClock::immediate(timing.control, now),
            measurement: ZeroOrderHold::new(timing.sample, now),
            last_error: None,
            last_setpoint: None,
            last_tick: None,
            skipped_ticks: 0,
        }
    }

    /// Start the controller and restart both ticks at `now`.
    pub fn start(&mut self, now: f64) {
        self.control_clock = SampleClock::immediate(self.control_clock.config, now);
        self.measurement = ZeroOrderHold::new(self.measurement.clock.config, now);
        self.last_error = None;
        self.last_setpoint = None;
        self.last_tick = None;
        self.controller.start(now);
    }

    pub fn stop(&mut self) {
        self.controller.stop();
    }

    /// Run whatever ticks are due at `now`. Returns a report when a control
    /// tick ran.
    pub fn poll(&mut self, io: &mut impl ProcessIo, now: f64) -> Option<TickReport> {
        self.sample(io, now);

        if !self.control_clock.should_sample(now) {
            return None;
        }
        let missed = self.control_clock.advance_past(now);
        if missed > 0 {
            debug!(missed, t = now, "control ticks missed");
        }

        let Some(level) = self.measurement.get() else {
            self.skipped_ticks += 1;
            debug!(t = now, "no measurement yet, control tick skipped");
            return None;
        };
        let setpoint = match io.read_setpoint() {
            Ok(v) if v.is_finite() => v,
            Ok(v) => {
                self.skipped_ticks += 1;
                warn!(value = v, "non-finite setpoint, control tick skipped");
                return None;
            }
            Err(e) => {
                self.skipped_ticks += 1;
                warn!(error = %e, "setpoint read failed, control tick skipped");
                return None;
            }
        };

        let error = setpoint - level;
        if let Some(previous) = self.last_setpoint {
            if (setpoint - previous).abs() > SETPOINT_CHANGE_MIN {
                info!(from = previous, to = setpoint, "setpoint changed");
                self.controller.issue_setpoint(error, now);
            }
        }

        let dt = match self.last_tick {
            Some(last) if now > last => now - last,
            _ => self.control_clock.config.dt,
        };
        let delta_error = self.last_error.map_or(0.0, |last| error - last);
        let output = self.controller.compute_tick(error, delta_error, dt, now);

        let mut failed_writes = 0;
        for (valve, &command) in &output.commands {
            if let Err(e) = io.write_actuator(valve, command) {
                failed_writes += 1;
                warn!(valve = %valve, command, error = %e, "actuator write failed");
            }
        }

        self.last_error = Some(error);
        self.last_setpoint = Some(setpoint);
        self.last_tick = Some(now);

        Some(TickReport {
            t: now,
            level,
            setpoint,
            error,
            output,
            failed_writes,
        })
    }

    /// [`poll`](Self::poll) at the clock's current time.
    pub fn poll_clock(&mut self, io: &mut impl ProcessIo, clock: &impl Clock) -> Option<TickReport> {
        self.poll(io, clock.now_s())
    }

    pub fn controller(&self) -> &AdaptiveController {
        &self.controller
    }

    pub fn into_controller(self) -> AdaptiveController {
        self.controller
    }

    /// Control ticks skipped for lack of a measurement or setpoint.
    pub fn skipped_ticks(&self) -> u64 {
        self.skipped_ticks
    }

    fn sample(&mut self, io: &mut impl ProcessIo, now: f64) {
        if !self.measurement.is_due(now) {
            return;
        }
        match io.read_measurement() {
            Ok(level) if level.is_finite() => {
                self.measurement.update(now, level);
            }
            Ok(level) => {
                warn!(value = level, "non-finite measurement discarded");
                self.measurement.skip(now);
            }
            Err(e) => {
                warn!(error = %e, "measurement read failed");
                self.measurement.skip(now);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lf_controls::{AdaptationSettings, ControlError, ControlResult, SampleConfig};
    use lf_fuzzy::{TuningParams, Valve, ValveMap};

    #[derive(Default)]
    struct FakeIo {
        level: f64,
        setpoint: f64,
        fail_reads: bool,
        fail_writes: bool,
        reads: usize,
        written: ValveMap,
    }

    impl ProcessIo for FakeIo {
        fn read_measurement(&mut self) -> ControlResult<f64> {
            self.reads += 1;
            if self.fail_reads {
                return Err(ControlError::Io {
                    what: "timeout".to_string(),
                });
            }
            Ok(self.level)
        }

        fn read_setpoint(&mut self) -> ControlResult<f64> {
            Ok(self.setpoint)
        }

        fn write_actuator(&mut self, valve: &str, value: f64) -> ControlResult<()> {
            if self.fail_writes {
                return Err(ControlError::Io {
                    what: "link down".to_string(),
                });
            }
            self.written.insert(valve.to_string(), value);
            Ok(())
        }
    }

    fn control_loop() -> ControlLoop {
        let valves = vec![
            Valve::new("fill", 0.0, 10.0).unwrap(),
            Valve::new("drain", 0.0, 10.0).unwrap(),
        ];
        let controller =
            AdaptiveController::from_tuning(TuningParams::default(), valves, AdaptationSettings::default())
                .unwrap();
        let timing = LoopTiming {
            control: SampleConfig::new(0.5).unwrap(),
            sample: SampleConfig::new(1.0).unwrap(),
        };
        let mut lp = ControlLoop::new(controller, timing, 0.0);
        lp.start(0.0);
        lp
    }

    #[test]
    fn measurement_is_held_between_samples() {
        let mut lp = control_loop();
        let mut io = FakeIo {
            level: 3.0,
            setpoint: 3.3,
            ..Default::default()
        };
        let first = lp.poll(&mut io, 0.0).unwrap();
        assert_eq!(first.level, 3.0);
        io.level = 2.0;
        let second = lp.poll(&mut io, 0.5).unwrap();
        assert_eq!(second.level, 3.0);
        assert_eq!(io.reads, 1);
        let third = lp.poll(&mut io, 1.0).unwrap();
        assert_eq!(third.level, 2.0);
        assert_eq!(io.reads, 2);
    }

    #[test]
    fn nothing_runs_between_ticks() {
        let mut lp = control_loop();
        let mut io = FakeIo {
            level: 3.0,
            setpoint: 3.3,
            ..Default::default()
        };
        assert!(lp.poll(&mut io, 0.0).is_some());
        assert!(lp.poll(&mut io, 0.2).is_none());
        assert!(lp.poll(&mut io, 0.5).is_some());
    }

    #[test]
    fn failed_first_read_skips_control() {
        let mut lp = control_loop();
        let mut io = FakeIo {
            level: 3.0,
            setpoint: 3.3,
            fail_reads: true,
            ..Default::default()
        };
        assert!(lp.poll(&mut io, 0.0).is_none());
        assert_eq!(lp.skipped_ticks(), 1);
        assert!(io.written.is_empty());
        assert_eq!(lp.controller().current_state(), StateTag::Stable);
    }

    #[test]
    fn failed_writes_are_counted_not_fatal() {
        let mut lp = control_loop();
        let mut io = FakeIo {
            level: 3.25,
            setpoint: 3.3,
            fail_writes: true,
            ..Default::default()
        };
        let report = lp.poll(&mut io, 0.0).unwrap();
        assert_eq!(report.failed_writes, 2);
        assert_eq!(report.state(), StateTag::Stable);
    }

    #[test]
    fn delta_error_uses_previous_tick() {
        let mut lp = control_loop();
        let mut io = FakeIo {
            level: 3.3,
            setpoint: 3.3,
            ..Default::default()
        };
        lp.poll(&mut io, 0.0);
        io.level = 3.25;
        lp.poll(&mut io, 0.5);
        let report = lp.poll(&mut io, 1.0).unwrap();
        assert!((report.error - 0.05).abs() < 1e-12);
        assert_eq!(report.state(), StateTag::Stable);
        // Rising error inside the zero band: creep on fill only.
        assert!(report.output.commands["fill"] > 0.0);
        assert_eq!(report.output.commands["drain"], 0.0);
    }

    #[test]
    fn setpoint_change_enters_settle() {
        let mut lp = control_loop();
        let mut io = FakeIo {
            level: 3.3,
            setpoint: 3.3,
            ..Default::default()
        };
        lp.poll(&mut io, 0.0);
        io.setpoint = 4.0;
        let report = lp.poll(&mut io, 0.5).unwrap();
        assert_eq!(report.state(), StateTag::Settle);
    }

    #[test]
    fn tiny_setpoint_jitter_is_ignored() {
        let mut lp = control_loop();
        let mut io = FakeIo {
            level: 3.3,
            setpoint: 3.3,
            ..Default::default()
        };
        lp.poll(&mut io, 0.0);
        io.setpoint = 3.3005;
        let report = lp.poll(&mut io, 0.5).unwrap();
        assert_eq!(report.state(), StateTag::Stable);
    }
}
