//! Check entry points, one per data kind.
//!
//! Every facade validates its input, then hands a serializer and a comparator
//! to [`RegressionContext::perform`](crate::RegressionContext::perform).

pub mod file;
pub mod mapping;
pub mod ndarray;
pub mod sequence;
pub mod tabular;

use std::collections::BTreeMap;

use crate::error::Result;
use crate::tolerance::{Tolerance, Tolerances};

/// Per-key tolerance overrides for keyed data (columns, arrays).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToleranceOptions {
    pub per_key: BTreeMap<String, Tolerance>,
    /// Default for unlisted keys; the configured per-kind default when unset.
    pub default: Option<Tolerance>,
}

impl ToleranceOptions {
    pub fn with(mut self, key: impl Into<String>, tolerance: Tolerance) -> Self {
        self.per_key.insert(key.into(), tolerance);
        self
    }

    pub fn with_default(mut self, tolerance: Tolerance) -> Self {
        self.default = Some(tolerance);
        self
    }

    /// Resolve against the configured default and validate every bound.
    pub fn resolve(&self, fallback: Tolerance) -> Result<Tolerances> {
        let tolerances = self
            .per_key
            .iter()
            .fold(Tolerances::new(self.default.unwrap_or(fallback)), |t, (k, v)| {
                t.with(k.clone(), *v)
            });
        tolerances.validate()?;
        Ok(tolerances)
    }
}

#[cfg(test)]
pub(crate) fn test_context(root: &std::path::Path, name: &str) -> crate::RegressionContext {
    crate::RegressionContext::new(
        root.join("baseline"),
        root.join("obtained"),
        crate::TestIdentity::new(name),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_prefers_explicit_default() {
        let options = ToleranceOptions::default().with("x", Tolerance::new(1.0, 0.0));
        let resolved = options.resolve(Tolerance::new(1e-8, 1e-8)).unwrap();
        assert_eq!(resolved.for_key("x"), Tolerance::new(1.0, 0.0));
        assert_eq!(resolved.for_key("y"), Tolerance::new(1e-8, 1e-8));

        let resolved = options
            .with_default(Tolerance::exact())
            .resolve(Tolerance::new(1e-8, 1e-8))
            .unwrap();
        assert_eq!(resolved.for_key("y"), Tolerance::exact());
    }

    #[test]
    fn resolve_rejects_negative_bounds() {
        let options = ToleranceOptions::default().with("x", Tolerance::new(0.0, -1.0));
        assert!(options.resolve(Tolerance::exact()).unwrap_err().is_validation());
    }
}
