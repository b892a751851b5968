//! Structural diffing of keyed collections.
//!
//! Three checks run over an obtained and a baseline mapping: key set, kind and
//! shape. None of them short-circuits; every failure class lands in one
//! combined report, and only keys passing all three go on to value comparison.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use crate::kind::{format_shape, Kind};

pub(crate) const REBASE_HINT: &str = "To update values, rerun with rebase enabled.\n\n";

/// Anything with a kind and a structural shape (array, column).
pub trait Structured {
    fn kind(&self) -> Kind;
    fn shape(&self) -> Vec<usize>;
}

impl<T: Structured + ?Sized> Structured for &T {
    fn kind(&self) -> Kind {
        (**self).kind()
    }

    fn shape(&self) -> Vec<usize> {
        (**self).shape()
    }
}

/// A structural mismatch between obtained and baseline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mismatch {
    /// Key present only in the obtained result.
    NewKey { key: String },
    /// Key present only in the baseline.
    MissingKey { key: String },
    /// Kinds differ and are not compatible.
    KindMismatch {
        key: String,
        obtained: Kind,
        baseline: Kind,
    },
    /// Shapes differ.
    ShapeMismatch {
        key: String,
        obtained: Vec<usize>,
        baseline: Vec<usize>,
    },
}

impl Mismatch {
    pub fn key(&self) -> &str {
        match self {
            Mismatch::NewKey { key }
            | Mismatch::MissingKey { key }
            | Mismatch::KindMismatch { key, .. }
            | Mismatch::ShapeMismatch { key, .. } => key,
        }
    }
}

/// Outcome of a single check: keys that passed plus the failures.
#[derive(Debug, Clone, Default)]
pub struct Check {
    pub passed: BTreeSet<String>,
    pub mismatches: Vec<Mismatch>,
}

pub(crate) fn row3(a: &str, b: &str, c: &str) -> String {
    format!("{a:>15} {b:>20} {c:>20}\n")
}

pub(crate) fn row4(a: &str, b: &str, c: &str, d: &str) -> String {
    format!("{a:>15} {b:>20} {c:>20} {d:>20}\n")
}

fn format_key_list<'a>(keys: impl Iterator<Item = &'a str>) -> String {
    let quoted: Vec<String> = keys.map(|k| format!("'{k}'")).collect();
    format!("[{}]", quoted.join(", "))
}

impl Check {
    /// Error fragment for this check, empty when it passed.
    pub fn fragment(&self) -> String {
        if self.mismatches.is_empty() {
            return String::new();
        }
        let mut new_keys = Vec::new();
        let mut missing_keys = Vec::new();
        let mut kinds = String::new();
        let mut shapes = String::new();
        for m in &self.mismatches {
            match m {
                Mismatch::NewKey { key } => new_keys.push(key.as_str()),
                Mismatch::MissingKey { key } => missing_keys.push(key.as_str()),
                Mismatch::KindMismatch {
                    key,
                    obtained,
                    baseline,
                } => kinds.push_str(&row3(key, obtained.label(), baseline.label())),
                Mismatch::ShapeMismatch {
                    key,
                    obtained,
                    baseline,
                } => shapes.push_str(&row3(key, &format_shape(obtained), &format_shape(baseline))),
            }
        }

        let mut out = String::new();
        if !new_keys.is_empty() || !missing_keys.is_empty() {
            out.push_str("The keys in obtained result differ from baseline result.\n");
            let _ = writeln!(
                out,
                "  Matched keys:          {}",
                format_key_list(self.passed.iter().map(String::as_str))
            );
            let _ = writeln!(
                out,
                "  New in obtained:       {}",
                format_key_list(new_keys.into_iter())
            );
            let _ = writeln!(
                out,
                "  Missing from obtained: {}",
                format_key_list(missing_keys.into_iter())
            );
        }
        if !kinds.is_empty() {
            out.push_str("Data types are not the same:\n");
            out.push_str(&row3("Key", "ObtainedType", "BaselineType"));
            out.push_str(&kinds);
        }
        if !shapes.is_empty() {
            out.push_str("Data shapes are not the same:\n");
            out.push_str(&row3("Key", "ObtainedShape", "BaselineShape"));
            out.push_str(&shapes);
        }
        out.push_str(REBASE_HINT);
        out
    }
}

/// Symmetric difference of the key sets; common keys pass.
pub fn check_key_set<V, W>(
    obtained: &BTreeMap<String, V>,
    baseline: &BTreeMap<String, W>,
) -> Check {
    let obtained_keys: BTreeSet<&String> = obtained.keys().collect();
    let baseline_keys: BTreeSet<&String> = baseline.keys().collect();

    let mut check = Check::default();
    for key in obtained_keys.intersection(&baseline_keys) {
        check.passed.insert((*key).clone());
    }
    for key in obtained_keys.difference(&baseline_keys) {
        check.mismatches.push(Mismatch::NewKey {
            key: (*key).clone(),
        });
    }
    for key in baseline_keys.difference(&obtained_keys) {
        check.mismatches.push(Mismatch::MissingKey {
            key: (*key).clone(),
        });
    }
    check
}

/// Kind check over the shared keys, using the compatibility table.
pub fn check_kinds<V: Structured>(
    obtained: &BTreeMap<String, V>,
    baseline: &BTreeMap<String, V>,
) -> Check {
    let mut check = Check::default();
    for (key, o) in obtained {
        let Some(b) = baseline.get(key) else {
            continue;
        };
        let (ok, bk) = (o.kind(), b.kind());
        if ok.is_compatible(bk) {
            check.passed.insert(key.clone());
        } else {
            check.mismatches.push(Mismatch::KindMismatch {
                key: key.clone(),
                obtained: ok,
                baseline: bk,
            });
        }
    }
    check
}

/// Shape check over the given keys (those that passed the kind check).
pub fn check_shapes<V: Structured>(
    obtained: &BTreeMap<String, V>,
    baseline: &BTreeMap<String, V>,
    keys: &BTreeSet<String>,
) -> Check {
    let mut check = Check::default();
    for key in keys {
        let (Some(o), Some(b)) = (obtained.get(key), baseline.get(key)) else {
            continue;
        };
        let (os, bs) = (o.shape(), b.shape());
        if os == bs {
            check.passed.insert(key.clone());
        } else {
            check.mismatches.push(Mismatch::ShapeMismatch {
                key: key.clone(),
                obtained: os,
                baseline: bs,
            });
        }
    }
    check
}

/// Combined result of the key-set, kind and shape checks.
#[derive(Debug, Clone, Default)]
pub struct StructuralDiff {
    pub keys: Check,
    pub kinds: Check,
    pub shapes: Check,
}

impl StructuralDiff {
    /// Run all three checks.
    pub fn compare<V: Structured>(
        obtained: &BTreeMap<String, V>,
        baseline: &BTreeMap<String, V>,
    ) -> Self {
        let keys = check_key_set(obtained, baseline);
        let kinds = check_kinds(obtained, baseline);
        let shapes = check_shapes(obtained, baseline, &kinds.passed);
        Self {
            keys,
            kinds,
            shapes,
        }
    }

    /// Run only the key-set check (values without kind or shape).
    pub fn compare_keys<V, W>(
        obtained: &BTreeMap<String, V>,
        baseline: &BTreeMap<String, W>,
    ) -> Self {
        let keys = check_key_set(obtained, baseline);
        Self {
            kinds: Check {
                passed: keys.passed.clone(),
                mismatches: Vec::new(),
            },
            shapes: Check {
                passed: keys.passed.clone(),
                mismatches: Vec::new(),
            },
            keys,
        }
    }

    /// Keys that passed all three checks.
    pub fn comparable_keys(&self) -> BTreeSet<String> {
        self.keys
            .passed
            .iter()
            .filter(|k| self.kinds.passed.contains(*k) && self.shapes.passed.contains(*k))
            .cloned()
            .collect()
    }

    pub fn mismatches(&self) -> impl Iterator<Item = &Mismatch> {
        self.keys
            .mismatches
            .iter()
            .chain(&self.kinds.mismatches)
            .chain(&self.shapes.mismatches)
    }

    pub fn is_empty(&self) -> bool {
        self.mismatches().next().is_none()
    }

    /// Human-readable report of every structural failure.
    pub fn report(&self) -> String {
        let mut out = self.keys.fragment();
        out.push_str(&self.kinds.fragment());
        out.push_str(&self.shapes.fragment());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fake(Kind, Vec<usize>);

    impl Structured for Fake {
        fn kind(&self) -> Kind {
            self.0
        }
        fn shape(&self) -> Vec<usize> {
            self.1.clone()
        }
    }

    fn map(entries: Vec<(&str, Fake)>) -> BTreeMap<String, Fake> {
        entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn key_set_reports_both_sides() {
        let obtained = map(vec![("a", Fake(Kind::Int, vec![1])), ("b", Fake(Kind::Int, vec![1]))]);
        let baseline = map(vec![("b", Fake(Kind::Int, vec![1])), ("c", Fake(Kind::Int, vec![1]))]);

        let diff = StructuralDiff::compare(&obtained, &baseline);
        assert_eq!(diff.comparable_keys(), BTreeSet::from(["b".to_string()]));
        assert!(diff
            .mismatches()
            .any(|m| matches!(m, Mismatch::NewKey { key } if key == "a")));
        assert!(diff
            .mismatches()
            .any(|m| matches!(m, Mismatch::MissingKey { key } if key == "c")));

        let report = diff.report();
        assert!(report.contains("New in obtained:       ['a']"));
        assert!(report.contains("Missing from obtained: ['c']"));
    }

    #[test]
    fn numeric_family_is_compatible_but_bool_is_not() {
        let obtained = map(vec![
            ("x", Fake(Kind::Int, vec![3])),
            ("y", Fake(Kind::Bool, vec![3])),
        ]);
        let baseline = map(vec![
            ("x", Fake(Kind::Float, vec![3])),
            ("y", Fake(Kind::Int, vec![3])),
        ]);

        let diff = StructuralDiff::compare(&obtained, &baseline);
        assert_eq!(diff.comparable_keys(), BTreeSet::from(["x".to_string()]));
        let report = diff.report();
        assert!(report.contains("Data types are not the same"));
        assert!(report.contains("bool"));
        assert!(report.contains("int64"));
    }

    #[test]
    fn failures_accumulate_across_checks() {
        let obtained = map(vec![
            ("new", Fake(Kind::Int, vec![1])),
            ("kind", Fake(Kind::Text, vec![2])),
            ("shape", Fake(Kind::Float, vec![2, 2])),
            ("ok", Fake(Kind::Float, vec![4])),
        ]);
        let baseline = map(vec![
            ("kind", Fake(Kind::Float, vec![2])),
            ("shape", Fake(Kind::Float, vec![4])),
            ("ok", Fake(Kind::Float, vec![4])),
        ]);

        let diff = StructuralDiff::compare(&obtained, &baseline);
        assert_eq!(diff.mismatches().count(), 3);
        assert_eq!(diff.comparable_keys(), BTreeSet::from(["ok".to_string()]));
        let report = diff.report();
        assert!(report.contains("The keys in obtained result differ"));
        assert!(report.contains("Data types are not the same"));
        assert!(report.contains("Data shapes are not the same"));
        assert!(report.contains("(2, 2)"));
    }

    #[test]
    fn identical_collections_have_empty_report() {
        let obtained = map(vec![("a", Fake(Kind::Float, vec![2]))]);
        let baseline = map(vec![("a", Fake(Kind::Float, vec![2]))]);
        let diff = StructuralDiff::compare(&obtained, &baseline);
        assert!(diff.is_empty());
        assert_eq!(diff.report(), "");
    }
}
