//! The adaptive controller context.
//!
//! [`AdaptiveController`] is the single owner of everything that changes
//! during operation: the active configuration and engine, the gain
//! multipliers, the adaptation state and its snapshots. Callers pass the
//! current time into every operation; one `compute_tick` call runs
//! inference, then the state machine, then the compositor.

use lf_core::clip;
use lf_fuzzy::{FuzzyConfig, FuzzyEngine, TuningParams, Valve, ValveMap, generate};
use tracing::{debug, info, warn};

use crate::adaptation::{
    TickInput, ValveRoles, adaptation_step, evaluate_observation, gain_of,
};
use crate::compositor::{CompositorInput, compose};
use crate::error::{ControlError, ControlResult};
use crate::settings::{
    AGGRESSIVE_EXIT_ERROR, AGGRESSIVE_GAIN, AdaptationSettings, GAIN_FLOOR, LOCK_IN_ERROR,
    LOCK_IN_REDUCTION, PRECISION_OBSERVE_S, SETPOINT_SETTLE_MIN_ERROR, SETTLE_EXIT_ERROR,
};
use crate::state::{
    AdaptationState, AggressiveCorrection, FineTune, LockedOutputs, ObserveWindow,
    PrecisionObserve, StateTag,
};

/// Result of one control tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutput {
    /// State after the tick's transition.
    pub state: StateTag,
    /// Normalized engine output.
    pub raw: ValveMap,
    /// True when no rule fired or the inputs were not finite.
    pub degenerate: bool,
    /// Physical command per valve.
    pub commands: ValveMap,
}

#[derive(Debug, Clone)]
pub struct AdaptiveController {
    config: FuzzyConfig,
    engine: FuzzyEngine,
    roles: ValveRoles,
    base_tuning: Option<TuningParams>,
    settings: AdaptationSettings,
    state: AdaptationState,
    gains: ValveMap,
    is_adapted: bool,
}

impl AdaptiveController {
    /// Build a stopped controller with unit gains.
    pub fn new(config: FuzzyConfig, settings: AdaptationSettings) -> ControlResult<Self> {
        settings.validate()?;
        let engine = FuzzyEngine::new(&config)?;
        let gains = unit_gains(&config.valves);
        Ok(Self {
            roles: ValveRoles::from_valves(&config.valves),
            config,
            engine,
            base_tuning: None,
            settings,
            state: AdaptationState::Idle,
            gains,
            is_adapted: false,
        })
    }

    /// Generate a configuration from `params` and remember them as the base
    /// tuning used for regeneration after a disturbance.
    pub fn from_tuning(
        params: TuningParams,
        valves: Vec<Valve>,
        settings: AdaptationSettings,
    ) -> ControlResult<Self> {
        let config = generate(&params, valves)?;
        let mut controller = Self::new(config, settings)?;
        controller.base_tuning = Some(params);
        Ok(controller)
    }

    /// Set the base tuning without regenerating the active configuration.
    pub fn set_base_tuning(&mut self, params: TuningParams) -> ControlResult<()> {
        params.validate()?;
        self.base_tuning = Some(params);
        Ok(())
    }

    /// Restore persisted gains. A non-empty map marks the controller adapted.
    pub fn restore_gains(&mut self, gains: &ValveMap) -> ControlResult<()> {
        for (valve, &value) in gains {
            if self.config.valve(valve).is_none() {
                return Err(ControlError::UnknownValve {
                    name: valve.clone(),
                });
            }
            if !value.is_finite() || value < GAIN_FLOOR {
                return Err(ControlError::InvalidGain {
                    valve: valve.clone(),
                    value,
                });
            }
        }
        let mut restored = unit_gains(&self.config.valves);
        restored.extend(gains.iter().map(|(k, v)| (k.clone(), *v)));
        self.gains = restored;
        self.is_adapted = !gains.is_empty();
        info!(count = gains.len(), "gain multipliers restored");
        Ok(())
    }

    /// IDLE → STABLE.
    pub fn start(&mut self, now: f64) {
        if self.state.is_running() {
            return;
        }
        self.state = AdaptationState::Stable;
        info!(t = now, adapted = self.is_adapted, "controller started");
    }

    /// Any state → IDLE. Gains are kept.
    pub fn stop(&mut self) {
        if self.state.is_running() {
            info!(from = %self.state.tag(), "controller stopped");
        }
        self.state = AdaptationState::Idle;
    }

    /// Run one control tick and return the physical valve commands.
    ///
    /// `delta_error` is the change in error since the previous tick and `dt`
    /// the elapsed time in seconds.
    pub fn compute_tick(&mut self, error: f64, delta_error: f64, dt: f64, now: f64) -> TickOutput {
        let input = TickInput {
            error,
            delta_error,
            dt,
            now,
        };
        let inference = self.engine.infer(error, input.trend());
        let degenerate = inference.is_degenerate();
        let raw = inference.into_outputs(self.engine.valves());

        if self.settings.learning_enabled && error.is_finite() {
            self.advance(&raw, &input);
        }

        let commands = compose(&CompositorInput {
            state: &self.state,
            valves: &self.config.valves,
            roles: &self.roles,
            raw: &raw,
            gains: &self.gains,
            is_adapted: self.is_adapted,
            error,
        });

        let state = self.state.tag();
        debug!(
            error,
            rate = input.trend(),
            state = %state,
            label = ?self.engine.dominant_error_label(error),
            commands = ?commands,
            gains = ?self.gains,
            degenerate,
            "control tick"
        );

        TickOutput {
            state,
            raw,
            degenerate,
            commands,
        }
    }

    /// Replace the configuration and rebuild the engine. Gains of valves that
    /// remain are kept. On error the previous configuration stays active.
    pub fn apply_configuration(&mut self, config: FuzzyConfig) -> ControlResult<()> {
        let engine = FuzzyEngine::new(&config)?;
        self.gains.retain(|name, _| config.valve(name).is_some());
        for valve in &config.valves {
            self.gains.entry(valve.name.clone()).or_insert(1.0);
        }
        self.roles = ValveRoles::from_valves(&config.valves);
        self.engine = engine;
        self.config = config;
        info!(universe_max = self.config.universe_max, "configuration applied");
        Ok(())
    }

    /// → STABLE with unit gains and no adaptation history.
    pub fn full_reset(&mut self) {
        self.reset_adaptation();
        self.state = AdaptationState::Stable;
        info!("full reset");
    }

    /// → STABLE, dropping snapshots and deadlines but keeping gains.
    pub fn cancel_adaptation(&mut self) {
        if !self.state.is_running() {
            return;
        }
        if !matches!(self.state, AdaptationState::Stable) {
            info!(from = %self.state.tag(), "adaptation cancelled");
        }
        self.state = AdaptationState::Stable;
    }

    /// A new setpoint was issued; `initial_error` is the error it produces.
    pub fn issue_setpoint(&mut self, initial_error: f64, now: f64) {
        if !self.state.is_running() {
            return;
        }
        self.cancel_adaptation();
        if initial_error.abs() > SETPOINT_SETTLE_MIN_ERROR {
            let deadline = now + self.settings.settle_timeout_s;
            info!(initial_error, deadline, "settling to new setpoint");
            self.state = AdaptationState::Settle { deadline };
        }
    }

    pub fn current_state(&self) -> StateTag {
        self.state.tag()
    }

    pub fn state(&self) -> &AdaptationState {
        &self.state
    }

    /// Seconds left in the disturbance debounce, for display.
    pub fn countdown_remaining(&self, now: f64) -> Option<f64> {
        match self.state {
            AdaptationState::DisturbanceWait { deadline } => Some((deadline - now).max(0.0)),
            _ => None,
        }
    }

    pub fn gains(&self) -> &ValveMap {
        &self.gains
    }

    pub fn gain(&self, valve: &str) -> f64 {
        gain_of(&self.gains, valve)
    }

    pub fn is_adapted(&self) -> bool {
        self.is_adapted
    }

    pub fn config(&self) -> &FuzzyConfig {
        &self.config
    }

    pub fn engine(&self) -> &FuzzyEngine {
        &self.engine
    }

    pub fn settings(&self) -> &AdaptationSettings {
        &self.settings
    }

    pub fn base_tuning(&self) -> Option<&TuningParams> {
        self.base_tuning.as_ref()
    }

    fn reset_adaptation(&mut self) {
        self.is_adapted = false;
        self.gains = unit_gains(&self.config.valves);
    }

    fn advance(&mut self, raw: &ValveMap, input: &TickInput) {
        let error = input.error;
        let now = input.now;
        let state = std::mem::take(&mut self.state);

        self.state = match state {
            AdaptationState::Idle => AdaptationState::Idle,

            AdaptationState::Settle { deadline } => {
                if error.abs() < SETTLE_EXIT_ERROR {
                    info!(error, "setpoint reached");
                    self.reset_adaptation();
                    AdaptationState::Stable
                } else if now >= deadline {
                    warn!(error, "settle timed out, continuing");
                    self.reset_adaptation();
                    AdaptationState::Stable
                } else {
                    AdaptationState::Settle { deadline }
                }
            }

            state @ (AdaptationState::Stable | AdaptationState::StableLocked(_)) => {
                if error.abs() > self.settings.disturbance_threshold {
                    if self.is_adapted {
                        self.regenerate_from_base();
                        self.reset_adaptation();
                    }
                    let deadline = now + self.settings.disturbance_delay_s;
                    info!(error, from = %state.tag(), deadline, "disturbance detected");
                    AdaptationState::DisturbanceWait { deadline }
                } else {
                    state
                }
            }

            AdaptationState::DisturbanceWait { deadline } => {
                if now >= deadline {
                    info!("observing post-disturbance response");
                    AdaptationState::PostDisturbanceObserve(ObserveWindow::new(now))
                } else {
                    AdaptationState::DisturbanceWait { deadline }
                }
            }

            AdaptationState::PostDisturbanceObserve(mut window) => {
                window.history.push(error);
                let settled = window.is_settled(now);
                if settled || window.timed_out(now) {
                    if !settled {
                        warn!(
                            elapsed = now - window.started_at,
                            "post-disturbance observation timed out, continuing"
                        );
                    }
                    self.begin_correction(raw, error)
                } else {
                    AdaptationState::PostDisturbanceObserve(window)
                }
            }

            AdaptationState::AggressiveCorrection(correction) => {
                if error.abs() <= AGGRESSIVE_EXIT_ERROR {
                    info!(error, "aggressive correction done");
                    AdaptationState::PrecisionObserve(PrecisionObserve {
                        deadline: now + PRECISION_OBSERVE_S,
                        baseline: correction.baseline,
                        reversion: correction.reversion,
                    })
                } else {
                    AdaptationState::AggressiveCorrection(correction)
                }
            }

            AdaptationState::PrecisionObserve(observe) => {
                if now >= observe.deadline {
                    let frozen = if observe.baseline.is_empty() {
                        raw.clone()
                    } else {
                        observe.baseline
                    };
                    info!("fine tuning started");
                    AdaptationState::FineTune(FineTune::with_frozen(frozen))
                } else {
                    AdaptationState::PrecisionObserve(observe)
                }
            }

            AdaptationState::FineTune(ft) => self.fine_tune(ft, raw, input),
        };
    }

    /// Leave post-disturbance observation: snapshot the baseline and drive
    /// the correcting valve hard.
    fn begin_correction(&self, raw: &ValveMap, error: f64) -> AdaptationState {
        let baseline = raw.clone();
        let reversion: ValveMap = self
            .config
            .valves
            .iter()
            .map(|v| {
                let n = baseline.get(&v.name).copied().unwrap_or(0.0);
                (v.name.clone(), v.to_physical(n))
            })
            .collect();

        let target = self
            .roles
            .target_for(error)
            .and_then(|name| self.config.valve(name));
        let Some(valve) = target else {
            info!("no valve to correct with, fine tuning directly");
            return AdaptationState::FineTune(FineTune::default());
        };

        let held = reversion.get(&valve.name).copied().unwrap_or(valve.min_out);
        let output_value = clip(
            held + error.abs() * AGGRESSIVE_GAIN,
            valve.min_out,
            valve.max_out,
        );
        info!(valve = %valve.name, output_value, "aggressive correction");
        AdaptationState::AggressiveCorrection(AggressiveCorrection {
            target_valve: valve.name.clone(),
            output_value,
            baseline,
            reversion,
        })
    }

    fn fine_tune(&mut self, mut ft: FineTune, raw: &ValveMap, input: &TickInput) -> AdaptationState {
        if input.error.abs() < LOCK_IN_ERROR {
            let frozen = ft.frozen.take().unwrap_or_else(|| raw.clone());
            let dominant = ft.last_step.as_ref().map(|step| step.valve().to_string());
            let outputs: ValveMap = self
                .config
                .valves
                .iter()
                .map(|v| {
                    let mut n =
                        frozen.get(&v.name).copied().unwrap_or(0.0) * gain_of(&self.gains, &v.name);
                    if dominant.as_deref() == Some(v.name.as_str()) {
                        n = (n - LOCK_IN_REDUCTION).max(0.0);
                    }
                    (v.name.clone(), n)
                })
                .collect();
            self.is_adapted = true;
            info!(outputs = ?outputs, gains = ?self.gains, "gains locked in");
            return AdaptationState::StableLocked(LockedOutputs {
                outputs,
                dominant_valve: dominant,
            });
        }

        match ft.observation {
            Some(observation) => {
                if input.now >= observation.deadline {
                    evaluate_observation(&mut ft, &mut self.gains, &self.settings, input);
                }
            }
            None => {
                if ft.frozen.is_none() {
                    ft.frozen = Some(raw.clone());
                }
                adaptation_step(&mut ft, &mut self.gains, &self.roles, &self.settings, input);
            }
        }
        AdaptationState::FineTune(ft)
    }

    fn regenerate_from_base(&mut self) {
        let Some(params) = self.base_tuning else {
            return;
        };
        let regenerated = generate(&params, self.config.valves.clone())
            .map_err(ControlError::from)
            .and_then(|config| self.apply_configuration(config));
        if let Err(e) = regenerated {
            warn!(error = %e, "regeneration from base tuning failed, keeping configuration");
        }
    }
}

fn unit_gains(valves: &[Valve]) -> ValveMap {
    valves.iter().map(|v| (v.name.clone(), 1.0)).collect()
}
