//! Triangular membership functions and linguistic label sets.
//!
//! Error labels: `NH` (negative high), `NL`, `Z`, `PL`, `PH`.
//! Delta-error labels: `N`, `Z`, `P`.
//!
//! The outermost label on each side behaves as a shoulder: beyond its peak
//! (towards the edge of the universe) the degree saturates at 1.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{FuzzyError, FuzzyResult};

/// Linguistic label for the error antecedent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ErrorLabel {
    #[serde(rename = "NH")]
    NegHigh,
    #[serde(rename = "NL")]
    NegLow,
    #[serde(rename = "Z")]
    Zero,
    #[serde(rename = "PL")]
    PosLow,
    #[serde(rename = "PH")]
    PosHigh,
}

impl ErrorLabel {
    pub const ALL: [ErrorLabel; 5] = [
        ErrorLabel::NegHigh,
        ErrorLabel::NegLow,
        ErrorLabel::Zero,
        ErrorLabel::PosLow,
        ErrorLabel::PosHigh,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NegHigh => "NH",
            Self::NegLow => "NL",
            Self::Zero => "Z",
            Self::PosLow => "PL",
            Self::PosHigh => "PH",
        }
    }
}

impl fmt::Display for ErrorLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorLabel {
    type Err = FuzzyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|label| label.as_str() == s)
            .ok_or_else(|| FuzzyError::InvalidRules {
                what: format!("unknown error label '{s}'"),
            })
    }
}

/// Linguistic label for the delta-error antecedent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DeltaLabel {
    #[serde(rename = "N")]
    Negative,
    #[serde(rename = "Z")]
    Zero,
    #[serde(rename = "P")]
    Positive,
}

impl DeltaLabel {
    pub const ALL: [DeltaLabel; 3] = [DeltaLabel::Negative, DeltaLabel::Zero, DeltaLabel::Positive];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Negative => "N",
            Self::Zero => "Z",
            Self::Positive => "P",
        }
    }
}

impl fmt::Display for DeltaLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeltaLabel {
    type Err = FuzzyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|label| label.as_str() == s)
            .ok_or_else(|| FuzzyError::InvalidRules {
                what: format!("unknown delta-error label '{s}'"),
            })
    }
}

/// Triangular membership function with breakpoints `left <= peak <= right`.
///
/// Degenerate triangles (`left == peak` or `peak == right`) are allowed and
/// form a vertical edge at the peak.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Triangle {
    pub left: f64,
    pub peak: f64,
    pub right: f64,
}

impl Triangle {
    /// Create a triangle, rejecting unordered or non-finite breakpoints.
    pub fn new(left: f64, peak: f64, right: f64) -> FuzzyResult<Self> {
        let t = Self { left, peak, right };
        if !t.is_valid() {
            return Err(FuzzyError::InvalidTriangle {
                label: "triangle".to_string(),
                left,
                peak,
                right,
            });
        }
        Ok(t)
    }

    /// Breakpoints are finite and ordered.
    pub fn is_valid(&self) -> bool {
        self.left.is_finite()
            && self.peak.is_finite()
            && self.right.is_finite()
            && self.left <= self.peak
            && self.peak <= self.right
    }

    /// Membership degree: 0 outside `[left, right]`, 1 at the peak, linear between.
    pub fn degree(&self, x: f64) -> f64 {
        if x.is_nan() || x < self.left || x > self.right {
            return 0.0;
        }
        if x == self.peak {
            return 1.0;
        }
        if x < self.peak {
            (x - self.left) / (self.peak - self.left)
        } else {
            (self.right - x) / (self.right - self.peak)
        }
    }

    /// Degree with everything left of the peak saturated at 1.
    pub fn left_shoulder_degree(&self, x: f64) -> f64 {
        if x <= self.peak { 1.0 } else { self.degree(x) }
    }

    /// Degree with everything right of the peak saturated at 1.
    pub fn right_shoulder_degree(&self, x: f64) -> f64 {
        if x >= self.peak { 1.0 } else { self.degree(x) }
    }
}

/// The five error membership functions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ErrorSets {
    #[serde(rename = "NH")]
    pub nh: Triangle,
    #[serde(rename = "NL")]
    pub nl: Triangle,
    #[serde(rename = "Z")]
    pub z: Triangle,
    #[serde(rename = "PL")]
    pub pl: Triangle,
    #[serde(rename = "PH")]
    pub ph: Triangle,
}

impl ErrorSets {
    pub fn get(&self, label: ErrorLabel) -> &Triangle {
        match label {
            ErrorLabel::NegHigh => &self.nh,
            ErrorLabel::NegLow => &self.nl,
            ErrorLabel::Zero => &self.z,
            ErrorLabel::PosLow => &self.pl,
            ErrorLabel::PosHigh => &self.ph,
        }
    }

    /// Check every triangle, naming the first offending label.
    pub fn validate(&self) -> FuzzyResult<()> {
        for label in ErrorLabel::ALL {
            let t = self.get(label);
            if !t.is_valid() {
                return Err(FuzzyError::InvalidTriangle {
                    label: label.to_string(),
                    left: t.left,
                    peak: t.peak,
                    right: t.right,
                });
            }
        }
        Ok(())
    }

    /// Degree of `x` in `label`, with NH/PH acting as shoulders.
    pub fn degree(&self, label: ErrorLabel, x: f64) -> f64 {
        let t = self.get(label);
        match label {
            ErrorLabel::NegHigh => t.left_shoulder_degree(x),
            ErrorLabel::PosHigh => t.right_shoulder_degree(x),
            _ => t.degree(x),
        }
    }
}

/// The three delta-error membership functions over `[-d, d]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeltaSets {
    pub n: Triangle,
    pub z: Triangle,
    pub p: Triangle,
}

impl DeltaSets {
    /// Fixed layout for a delta universe of half-width `d`.
    pub fn for_universe(d: f64) -> Self {
        Self {
            n: Triangle {
                left: -d,
                peak: -d,
                right: 0.0,
            },
            z: Triangle {
                left: -0.2 * d,
                peak: 0.0,
                right: 0.2 * d,
            },
            p: Triangle {
                left: 0.0,
                peak: d,
                right: d,
            },
        }
    }

    pub fn get(&self, label: DeltaLabel) -> &Triangle {
        match label {
            DeltaLabel::Negative => &self.n,
            DeltaLabel::Zero => &self.z,
            DeltaLabel::Positive => &self.p,
        }
    }

    /// Degree of `x` in `label`, with N/P acting as shoulders.
    pub fn degree(&self, label: DeltaLabel, x: f64) -> f64 {
        let t = self.get(label);
        match label {
            DeltaLabel::Negative => t.left_shoulder_degree(x),
            DeltaLabel::Positive => t.right_shoulder_degree(x),
            DeltaLabel::Zero => t.degree(x),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triangle_rejects_unordered_points() {
        assert!(Triangle::new(0.0, 1.0, 2.0).is_ok());
        assert!(Triangle::new(1.0, 0.0, 2.0).is_err());
        assert!(Triangle::new(0.0, 3.0, 2.0).is_err());
        assert!(Triangle::new(f64::NAN, 0.0, 1.0).is_err());
    }

    #[test]
    fn triangle_degree_shape() {
        let t = Triangle::new(-1.0, 0.0, 2.0).unwrap();
        assert_eq!(t.degree(-1.5), 0.0);
        assert_eq!(t.degree(-1.0), 0.0);
        assert!((t.degree(-0.5) - 0.5).abs() < 1e-12);
        assert_eq!(t.degree(0.0), 1.0);
        assert!((t.degree(1.0) - 0.5).abs() < 1e-12);
        assert_eq!(t.degree(2.0), 0.0);
        assert_eq!(t.degree(2.5), 0.0);
    }

    #[test]
    fn degenerate_triangle_has_vertical_edge() {
        let t = Triangle::new(-2.0, -2.0, -1.0).unwrap();
        assert_eq!(t.degree(-2.0), 1.0);
        assert!((t.degree(-1.5) - 0.5).abs() < 1e-12);
        assert_eq!(t.degree(-2.1), 0.0);
    }

    #[test]
    fn shoulders_saturate_outward() {
        let t = Triangle::new(-5.0, -4.0, -2.0).unwrap();
        assert_eq!(t.left_shoulder_degree(-10.0), 1.0);
        assert!((t.left_shoulder_degree(-3.0) - 0.5).abs() < 1e-12);
        let t = Triangle::new(2.0, 4.0, 5.0).unwrap();
        assert_eq!(t.right_shoulder_degree(10.0), 1.0);
        assert_eq!(t.right_shoulder_degree(1.0), 0.0);
    }

    #[test]
    fn labels_parse_round_trip() {
        for label in ErrorLabel::ALL {
            assert_eq!(label.as_str().parse::<ErrorLabel>().unwrap(), label);
        }
        for label in DeltaLabel::ALL {
            assert_eq!(label.as_str().parse::<DeltaLabel>().unwrap(), label);
        }
        assert!("XX".parse::<ErrorLabel>().is_err());
    }

    #[test]
    fn delta_sets_layout() {
        let sets = DeltaSets::for_universe(1.0);
        assert_eq!(sets.degree(DeltaLabel::Zero, 0.0), 1.0);
        assert_eq!(sets.degree(DeltaLabel::Negative, 0.0), 0.0);
        assert_eq!(sets.degree(DeltaLabel::Positive, 0.0), 0.0);
        assert_eq!(sets.degree(DeltaLabel::Positive, 1.0), 1.0);
        assert_eq!(sets.degree(DeltaLabel::Zero, 0.2), 0.0);
        assert!((sets.degree(DeltaLabel::Negative, -0.5) - 0.5).abs() < 1e-12);
    }
}
