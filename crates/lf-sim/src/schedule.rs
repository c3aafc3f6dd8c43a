//! Piecewise-constant schedules for leaks and setpoint changes.

use crate::error::{SimError, SimResult};

/// `(time, value)` steps; the value holds from its time until the next step.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StepSchedule {
    steps: Vec<(f64, f64)>,
}

impl StepSchedule {
    pub fn new(mut steps: Vec<(f64, f64)>) -> SimResult<Self> {
        for &(t, value) in &steps {
            validate_non_negative(t, "schedule time")?;
            if !value.is_finite() {
                return Err(SimError::NonPhysical {
                    what: "schedule value",
                });
            }
        }
        steps.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(Self { steps })
    }

    /// Value of the latest step at or before `t`.
    pub fn value_at(&self, t: f64) -> Option<f64> {
        self.steps
            .iter()
            .take_while(|(start, _)| *start <= t)
            .last()
            .map(|(_, value)| *value)
    }

    /// First step strictly after `t`.
    pub fn next_change_after(&self, t: f64) -> Option<f64> {
        self.steps
            .iter()
            .map(|(start, _)| *start)
            .find(|start| *start > t)
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

pub(crate) fn validate_non_negative(val: f64, name: &'static str) -> SimResult<f64> {
    if !val.is_finite() || val < 0.0 {
        return Err(SimError::NonPhysical { what: name });
    }
    Ok(val)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn holds_latest_step() {
        let s = StepSchedule::new(vec![(60.0, 0.004), (10.0, 0.001)]).unwrap();
        assert_eq!(s.value_at(5.0), None);
        assert_eq!(s.value_at(10.0), Some(0.001));
        assert_eq!(s.value_at(59.9), Some(0.001));
        assert_eq!(s.value_at(200.0), Some(0.004));
        assert_eq!(s.next_change_after(10.0), Some(60.0));
        assert_eq!(s.next_change_after(60.0), None);
    }

    #[test]
    fn rejects_negative_time_and_nan() {
        assert!(StepSchedule::new(vec![(-1.0, 0.0)]).is_err());
        assert!(StepSchedule::new(vec![(1.0, f64::NAN)]).is_err());
        assert!(validate_non_negative(0.0, "x").is_ok());
    }
}
