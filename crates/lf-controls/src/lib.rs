//! Adaptive fuzzy level control.
//!
//! This crate wraps the fuzzy inference engine in an online adaptation state
//! machine. Each control tick the controller:
//!
//! 1. samples the engine for a raw normalized output,
//! 2. advances the adaptation state (disturbance detection, observation,
//!    aggressive correction, fine tuning, lock-in),
//! 3. composes physical valve commands from the state and its snapshots.
//!
//! # Architecture
//!
//! - [`state`]: closed tagged state, one variant per adaptation phase
//! - [`adaptation`]: gain steps, observation evaluation and reverts
//! - [`compositor`]: state-dependent mapping to physical valve commands
//! - [`controller`]: the controller context that owns all mutable state
//! - [`sampled`]: sample clocks and zero-order hold for the control and
//!   measurement ticks
//! - [`io`]: the boundary to the process (measurement, setpoint, actuators)
//!
//! # Design Principles
//!
//! - **Single writer**: only [`AdaptiveController`] mutates gains, snapshots
//!   and deadlines; the engine and compositor only read
//! - **Explicit time**: every operation takes `now` in seconds, sampled once
//!   per tick by the caller
//! - **No fatal paths**: every numeric edge case has a defined fallback

pub mod adaptation;
pub mod compositor;
pub mod controller;
pub mod error;
pub mod io;
pub mod observation;
pub mod sampled;
pub mod settings;
pub mod state;

pub use adaptation::{TickInput, ValveRoles};
pub use compositor::{CompositorInput, compose};
pub use controller::{AdaptiveController, TickOutput};
pub use error::{ControlError, ControlResult};
pub use io::ProcessIo;
pub use observation::ObservationBuffer;
pub use sampled::{SampleClock, SampleConfig, ZeroOrderHold};
pub use settings::AdaptationSettings;
pub use state::{
    AdaptationState, AggressiveCorrection, FineTune, GainStep, LockedOutputs, Observation,
    ObserveWindow, PrecisionObserve, StateTag,
};
