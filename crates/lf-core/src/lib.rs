//! lf-core: stable foundation for levelflow.
//!
//! Contains:
//! - units (uom SI types + constructors)
//! - numeric (Real + finite checks + clip/sign)
//! - clock (monotonic time source sampled once per control tick)
//! - error (shared error types)

pub mod clock;
pub mod error;
pub mod numeric;
pub mod units;

// Re-exports: nice ergonomics for downstream crates
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use error::{LfError, LfResult};
pub use numeric::*;
pub use units::*;
