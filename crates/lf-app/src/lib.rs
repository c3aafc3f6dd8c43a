//! Shared application service layer for levelflow.
//!
//! This crate sits between the CLI and the library crates, centralizing
//! project management, compilation of a project into a running controller,
//! the dual-tick control loop and closed-loop simulation runs.

pub mod compile;
pub mod control_loop;
pub mod error;
pub mod project_service;
pub mod run_service;

// Re-export key types for convenience
pub use compile::{
    LoopTiming, adaptation_settings, build_controller, build_process, fuzzy_config, fuzzy_def,
    loop_timing, tuning_params,
};
pub use control_loop::{ControlLoop, SETPOINT_CHANGE_MIN, TickReport};
pub use error::{AppError, AppResult};
pub use project_service::{
    ProjectSummary, default_project, import_legacy, load_project, save_project, store_gains,
    summarize, validate_project,
};
pub use run_service::{
    RunOptions, RunProgress, RunRecord, RunResponse, records_to_csv, records_to_json, simulate,
    simulate_with_progress,
};
