//! Integrator selection and the open-loop runner.

use crate::error::{SimError, SimResult};
use crate::integrator::{ForwardEuler, Integrator, RK4};
use crate::model::TransientModel;
use crate::schedule::validate_non_negative;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IntegratorType {
    /// 4th-order Runge-Kutta (4 rhs calls per step).
    #[default]
    RK4,
    /// Forward Euler (1 rhs call per step).
    ForwardEuler,
}

impl IntegratorType {
    pub fn step<M: TransientModel>(
        &self,
        model: &mut M,
        t: f64,
        x: &M::State,
        dt: f64,
    ) -> SimResult<M::State> {
        match self {
            Self::RK4 => RK4.step(model, t, x, dt),
            Self::ForwardEuler => ForwardEuler.step(model, t, x, dt),
        }
    }
}

/// Open-loop run: the model's inputs are held fixed for the whole run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OpenLoopOptions {
    /// Fixed step in seconds.
    pub dt: f64,
    pub duration_s: f64,
    /// Keep every n-th step; the final state is always kept.
    pub record_every: usize,
    pub integrator: IntegratorType,
}

impl Default for OpenLoopOptions {
    fn default() -> Self {
        Self {
            dt: 0.05,
            duration_s: 60.0,
            record_every: 1,
            integrator: IntegratorType::default(),
        }
    }
}

/// Recorded `(t, state)` samples, starting with the initial state.
#[derive(Clone, Debug, PartialEq)]
pub struct Trajectory<S> {
    pub samples: Vec<(f64, S)>,
}

impl<S> Trajectory<S> {
    pub fn last(&self) -> Option<&(f64, S)> {
        self.samples.last()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Integrate `model` from its initial state with its inputs held fixed.
///
/// The step count is `round(duration / dt)`; times are computed from the
/// step index so they do not drift.
pub fn run_open_loop<M: TransientModel>(
    model: &mut M,
    opts: &OpenLoopOptions,
) -> SimResult<Trajectory<M::State>> {
    if !opts.dt.is_finite() || opts.dt <= 0.0 {
        return Err(SimError::InvalidArg {
            what: "dt must be positive",
        });
    }
    validate_non_negative(opts.duration_s, "duration")?;
    if opts.record_every == 0 {
        return Err(SimError::InvalidArg {
            what: "record_every must be positive",
        });
    }

    let steps = (opts.duration_s / opts.dt).round() as usize;
    let mut x = model.initial_state();
    let mut samples = vec![(0.0, x.clone())];

    for step in 1..=steps {
        let t_prev = (step - 1) as f64 * opts.dt;
        x = opts.integrator.step(model, t_prev, &x, opts.dt)?;
        if step % opts.record_every == 0 || step == steps {
            samples.push((step as f64 * opts.dt, x.clone()));
        }
    }

    Ok(Trajectory { samples })
}
