//! TransientModel trait for pluggable dynamic systems.

use crate::error::SimResult;

/// A dynamic system `x_dot = f(t, x)` with vector-space state arithmetic.
pub trait TransientModel {
    type State: Clone;

    fn initial_state(&self) -> Self::State;

    /// State derivative at `(t, x)`.
    fn rhs(&mut self, t: f64, x: &Self::State) -> SimResult<Self::State>;

    /// Element-wise `a + b`.
    fn add(&self, a: &Self::State, b: &Self::State) -> Self::State;

    /// `scale * a`.
    fn scale(&self, a: &Self::State, scale: f64) -> Self::State;

    /// Project a state back onto its physical domain after a step.
    fn constrain(&self, x: Self::State) -> Self::State {
        x
    }
}
