//! Fuzzy inference for tank level control.
//!
//! This crate turns an instantaneous level error and its rate of change into
//! normalized valve commands. It is deliberately narrow: one error antecedent
//! with five labels, one delta-error antecedent with three labels, and a
//! 15-entry rule table mapping each label pair to crisp per-valve values.
//!
//! # Architecture
//!
//! - [`membership`]: triangular membership functions and the label sets
//! - [`rules`]: rule keys and the 15-entry rule table
//! - [`config`]: valves and the complete engine configuration
//! - [`generator`]: derives membership breakpoints and rules from four
//!   physical tuning parameters
//! - [`engine`]: min-AND firing and weighted-average defuzzification
//!
//! The engine is rebuilt from a [`FuzzyConfig`] on every reconfiguration;
//! it is never mutated in place.

pub mod config;
pub mod engine;
pub mod error;
pub mod generator;
pub mod membership;
pub mod rules;

pub use config::{FuzzyConfig, Valve};
pub use engine::{FuzzyEngine, Inference};
pub use error::{FuzzyError, FuzzyResult};
pub use generator::{GeneratedMembership, TuningParams, canonical_rules, generate, generate_membership};
pub use membership::{DeltaLabel, DeltaSets, ErrorLabel, ErrorSets, Triangle};
pub use rules::{RuleKey, RuleTable, ValveMap};
