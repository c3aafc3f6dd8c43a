use crate::LfError;

/// Floating point type used throughout system
pub type Real = f64;

/// `v`, or an error naming `what` when it is NaN or infinite.
pub fn ensure_finite(v: Real, what: &'static str) -> Result<Real, LfError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(LfError::NonFinite { what, value: v })
    }
}

/// Clamp `v` into `[lo, hi]`.
///
/// Unlike `f64::clamp` this never panics: an inverted range collapses to `lo`,
/// and NaN collapses to `lo` as well.
pub fn clip(v: Real, lo: Real, hi: Real) -> Real {
    if v.is_nan() || hi < lo {
        return lo;
    }
    v.max(lo).min(hi)
}

/// Three-way sign: -1, 0 or +1 (zero maps to zero).
pub fn sign(v: Real) -> i8 {
    if v > 0.0 {
        1
    } else if v < 0.0 {
        -1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_finite_detects_nan() {
        let err = ensure_finite(Real::NAN, "test").unwrap_err();
        let msg = format!("{err}");
        assert!(msg.contains("test must be finite"));
    }

    #[test]
    fn clip_behaves_like_clamp_on_valid_ranges() {
        assert_eq!(clip(-0.5, 0.0, 1.0), 0.0);
        assert_eq!(clip(0.25, 0.0, 1.0), 0.25);
        assert_eq!(clip(1.5, 0.0, 1.0), 1.0);
    }

    #[test]
    fn clip_degenerate_inputs() {
        assert_eq!(clip(Real::NAN, 0.0, 1.0), 0.0);
        assert_eq!(clip(0.5, 2.0, 1.0), 2.0);
    }

    #[test]
    fn sign_has_zero_case() {
        assert_eq!(sign(3.0), 1);
        assert_eq!(sign(-0.1), -1);
        assert_eq!(sign(0.0), 0);
    }
}
