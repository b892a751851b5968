//! Tolerance-aware closeness rules shared by every comparator.

use std::collections::BTreeMap;

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::error::{RegressError, Result};

/// Absolute/relative tolerance pair.
///
/// Two values are close when `|a - b| <= atol + rtol * max(|a|, |b|)`. The
/// relative part scales with the larger magnitude, not with the baseline, so
/// it can accept up to twice the drift of a baseline-scaled check (e.g.
/// `rtol = 0.5` accepts a baseline of `1.0` against an obtained `2.0`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    #[serde(default)]
    pub atol: f64,
    #[serde(default)]
    pub rtol: f64,
}

impl Tolerance {
    pub const fn new(atol: f64, rtol: f64) -> Self {
        Self { atol, rtol }
    }

    /// Tolerance that only accepts identical values.
    pub const fn exact() -> Self {
        Self::new(0.0, 0.0)
    }

    /// Both bounds must be finite and non-negative.
    pub fn validate(&self, key: &str) -> Result<()> {
        for (name, v) in [("atol", self.atol), ("rtol", self.rtol)] {
            if !v.is_finite() || v < 0.0 {
                return Err(RegressError::validation(
                    key,
                    format!("{name} must be a finite non-negative number, got {v}"),
                ));
            }
        }
        Ok(())
    }
}

/// Per-key tolerances plus the default used for unlisted keys.
#[derive(Debug, Clone, PartialEq)]
pub struct Tolerances {
    per_key: BTreeMap<String, Tolerance>,
    default: Tolerance,
}

impl Tolerances {
    pub fn new(default: Tolerance) -> Self {
        Self {
            per_key: BTreeMap::new(),
            default,
        }
    }

    /// Override the tolerance for one key (column, array name).
    pub fn with(mut self, key: impl Into<String>, tolerance: Tolerance) -> Self {
        self.per_key.insert(key.into(), tolerance);
        self
    }

    pub fn set_default(&mut self, default: Tolerance) {
        self.default = default;
    }

    pub fn default_tolerance(&self) -> Tolerance {
        self.default
    }

    pub fn for_key(&self, key: &str) -> Tolerance {
        self.per_key.get(key).copied().unwrap_or(self.default)
    }

    pub fn validate(&self) -> Result<()> {
        self.default.validate("<default tolerance>")?;
        for (key, tolerance) in &self.per_key {
            tolerance.validate(key)?;
        }
        Ok(())
    }
}

/// `|observed - expected| <= atol + rtol * max(|observed|, |expected|)`.
///
/// NaN is close to NaN and to nothing else. Equal values (including equal
/// infinities) are always close. Scaling the relative bound by the larger
/// magnitude keeps the rule symmetric in its arguments.
pub fn is_close(observed: f64, expected: f64, tolerance: Tolerance) -> bool {
    if observed.is_nan() || expected.is_nan() {
        return observed.is_nan() && expected.is_nan();
    }
    if observed == expected {
        return true;
    }
    if !observed.is_finite() || !expected.is_finite() {
        return false;
    }
    let scale = observed.abs().max(expected.abs());
    (observed - expected).abs() <= tolerance.atol + tolerance.rtol * scale
}

/// Complex variant of [`is_close`], measuring distance with the modulus.
pub fn is_close_complex(observed: Complex64, expected: Complex64, tolerance: Tolerance) -> bool {
    if observed.is_nan() || expected.is_nan() {
        return observed.is_nan() && expected.is_nan();
    }
    if observed == expected {
        return true;
    }
    if !observed.is_finite() || !expected.is_finite() {
        return false;
    }
    let scale = observed.norm().max(expected.norm());
    (observed - expected).norm() <= tolerance.atol + tolerance.rtol * scale
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nan_is_close_only_to_nan() {
        let loose = Tolerance::new(1e9, 1e9);
        assert!(is_close(f64::NAN, f64::NAN, Tolerance::exact()));
        assert!(is_close(f64::NAN, f64::NAN, loose));
        assert!(!is_close(f64::NAN, 1.0, loose));
        assert!(!is_close(1.0, f64::NAN, loose));
    }

    #[test]
    fn absolute_and_relative_bounds() {
        assert!(is_close(1.0, 1.05, Tolerance::new(0.1, 0.0)));
        assert!(!is_close(1.0, 1.2, Tolerance::new(0.1, 0.0)));
        assert!(is_close(100.0, 101.0, Tolerance::new(0.0, 0.01)));
        assert!(!is_close(100.0, 102.0, Tolerance::new(0.0, 0.01)));
        assert!(!is_close(3.1, 3.0, Tolerance::exact()));
    }

    #[test]
    fn closeness_is_symmetric() {
        let tolerances = [
            Tolerance::exact(),
            Tolerance::new(1e-8, 1e-8),
            Tolerance::new(0.0, 0.5),
            Tolerance::new(0.3, 0.1),
        ];
        let values = [0.0, 1.0, -1.0, 1.5, 2.0, 1e-9, 1e12, f64::INFINITY, f64::NAN];
        for t in tolerances {
            for &a in &values {
                for &b in &values {
                    assert_eq!(is_close(a, b, t), is_close(b, a, t), "{a} vs {b} {t:?}");
                }
            }
        }
    }

    #[test]
    fn relative_bound_scales_with_the_larger_magnitude() {
        let half = Tolerance::new(0.0, 0.5);
        assert!(is_close(2.0, 1.0, half));
        assert!(is_close(1.0, 2.0, half));
        assert!(!is_close(2.1, 1.0, half));
        assert!(!is_close(1.0, 2.1, half));
    }

    #[test]
    fn infinities() {
        assert!(is_close(f64::INFINITY, f64::INFINITY, Tolerance::exact()));
        assert!(!is_close(f64::INFINITY, f64::NEG_INFINITY, Tolerance::new(1.0, 1.0)));
        assert!(!is_close(f64::INFINITY, 1e300, Tolerance::new(1.0, 1.0)));
    }

    #[test]
    fn complex_uses_modulus() {
        let t = Tolerance::new(0.5, 0.0);
        assert!(is_close_complex(Complex64::new(1.0, 1.0), Complex64::new(1.3, 1.3), t));
        assert!(!is_close_complex(Complex64::new(1.0, 1.0), Complex64::new(1.4, 1.4), t));
        let nan = Complex64::new(f64::NAN, 0.0);
        assert!(is_close_complex(nan, nan, t));
    }

    #[test]
    fn per_key_lookup_falls_back_to_default() {
        let tolerances =
            Tolerances::new(Tolerance::new(1e-10, 1e-10)).with("x", Tolerance::new(1e-3, 0.0));
        assert_eq!(tolerances.for_key("x"), Tolerance::new(1e-3, 0.0));
        assert_eq!(tolerances.for_key("y"), Tolerance::new(1e-10, 1e-10));
    }

    #[test]
    fn negative_tolerance_is_rejected() {
        let err = Tolerances::new(Tolerance::exact())
            .with("col", Tolerance::new(-1.0, 0.0))
            .validate()
            .unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("col"));
    }
}
