//! Snapshots of named n-dimensional arrays stored as a compressed archive.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use crate::array::{Element, NdArray};
use crate::codec::npz;
use crate::error::{RegressError, Result};
use crate::fixtures::ToleranceOptions;
use crate::kind::{format_shape, Kind};
use crate::lifecycle::{Artifact, CheckOptions, Comparison, RegressionContext};
use crate::structural::{row4, StructuralDiff};
use crate::tolerance::{is_close, is_close_complex, Tolerance, Tolerances};
use crate::verdict::Verdict;

pub const EXTENSION: &str = ".npz";

/// Differing elements listed per array before the listing is cut off.
pub const MAX_LISTED_DIFFERENCES: usize = 100;

/// Options for [`ArrayRegression::check`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArrayOptions {
    pub check: CheckOptions,
    /// Per-array tolerances; unlisted arrays use the array default.
    pub tolerance: ToleranceOptions,
}

impl ArrayOptions {
    pub fn with_check(mut self, check: CheckOptions) -> Self {
        self.check = check;
        self
    }

    pub fn array_tolerance(mut self, key: impl Into<String>, tolerance: Tolerance) -> Self {
        self.tolerance = self.tolerance.with(key, tolerance);
        self
    }

    pub fn default_tolerance(mut self, tolerance: Tolerance) -> Self {
        self.tolerance = self.tolerance.with_default(tolerance);
        self
    }
}

fn is_supported(kind: Kind) -> bool {
    matches!(
        kind,
        Kind::Bool
            | Kind::Int
            | Kind::UInt
            | Kind::Float
            | Kind::Complex
            | Kind::Text
            | Kind::DateTime
    )
}

#[derive(Debug, Clone, Copy)]
pub struct ArrayRegression<'a> {
    context: &'a RegressionContext,
}

impl<'a> ArrayRegression<'a> {
    pub fn new(context: &'a RegressionContext) -> Self {
        Self { context }
    }

    /// Check a mapping of named arrays holding numeric, text or datetime data.
    pub fn check(
        &self,
        arrays: &BTreeMap<String, NdArray>,
        options: &ArrayOptions,
    ) -> Result<Verdict> {
        for (key, array) in arrays {
            if !is_supported(array.kind()) {
                return Err(RegressError::validation(
                    key,
                    format!(
                        "only numeric/str/datetime arrays are supported, \
                         array with type {} was given",
                        array.kind()
                    ),
                ));
            }
        }
        let tolerances = options
            .tolerance
            .resolve(self.context.config().array_tolerance())?;
        self.context
            .perform(&ArrayArtifact { arrays, tolerances }, EXTENSION, &options.check)
    }
}

struct ArrayArtifact<'t> {
    arrays: &'t BTreeMap<String, NdArray>,
    tolerances: Tolerances,
}

impl Artifact for ArrayArtifact<'_> {
    fn dump(&self, path: &Path) -> Result<()> {
        npz::write(path, self.arrays)
    }

    fn compare(&self, obtained: &Path, baseline: &Path) -> Result<Comparison> {
        compare_files(obtained, baseline, &self.tolerances)
    }
}

/// One differing element.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementDiff {
    /// Coordinates in row-major order; empty for zero-dimensional arrays.
    pub index: Vec<usize>,
    pub obtained: String,
    pub baseline: String,
    /// `obtained - baseline`, for numeric elements.
    pub difference: Option<String>,
    /// `|obtained - baseline|`, for numeric elements.
    pub abs_diff: Option<f64>,
}

impl ElementDiff {
    fn index_label(&self) -> String {
        match self.index.as_slice() {
            [single] => single.to_string(),
            index => {
                let joined: Vec<String> = index.iter().map(ToString::to_string).collect();
                format!("({})", joined.join(", "))
            }
        }
    }
}

/// Max, mean and median of a set of errors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub max: f64,
    pub mean: f64,
    pub median: f64,
}

impl Summary {
    pub fn of(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let n = sorted.len();
        let median = if n % 2 == 1 {
            sorted[n / 2]
        } else {
            (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
        };
        Some(Self {
            max: sorted[n - 1],
            mean: sorted.iter().sum::<f64>() / n as f64,
            median,
        })
    }

    fn write_to(&self, out: &mut String) {
        let _ = writeln!(out, "    Max:    {}", self.max);
        let _ = writeln!(out, "    Mean:   {}", self.mean);
        let _ = writeln!(out, "    Median: {}", self.median);
    }
}

/// Error statistics over the differing elements of a numeric array.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorStats {
    pub absolute: Summary,
    /// Relative errors over differing elements with a nonzero baseline.
    pub relative: Option<Summary>,
    /// Differing elements whose baseline is nonzero.
    pub nonzero_baseline: usize,
}

/// All differences of one array.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayDifference {
    pub shape: Vec<usize>,
    pub size: usize,
    pub elements: Vec<ElementDiff>,
    pub stats: Option<ErrorStats>,
}

impl ArrayDifference {
    pub fn percent(&self) -> f64 {
        if self.size == 0 {
            0.0
        } else {
            100.0 * self.elements.len() as f64 / self.size as f64
        }
    }

    fn write_to(&self, key: &str, out: &mut String) {
        let count = self.elements.len();
        let _ = writeln!(out, "{key}:\n  Shape: {}", format_shape(&self.shape));
        let _ = writeln!(
            out,
            "  Number of differences: {count} / {} ({:.1}%)",
            self.size,
            self.percent()
        );
        if let Some(stats) = &self.stats {
            out.push_str("  Statistics are computed for differing elements only.\n");
            out.push_str("  Stats for abs(obtained - baseline):\n");
            stats.absolute.write_to(out);
            match &stats.relative {
                None => out.push_str(
                    "  Relative errors are not reported since all baseline values are zero.\n",
                ),
                Some(relative) => {
                    out.push_str("  Stats for abs(obtained - baseline) / abs(baseline):\n");
                    if stats.nonzero_baseline != count {
                        let _ = writeln!(
                            out,
                            "    Number of differing non-zero baseline results: \
                             {} / {count} ({:.1}%)",
                            stats.nonzero_baseline,
                            100.0 * stats.nonzero_baseline as f64 / count as f64
                        );
                        out.push_str(
                            "    Relative errors are computed for the non-zero baseline results.\n",
                        );
                    }
                    relative.write_to(out);
                }
            }
        }
        out.push_str("  Individual errors:\n");
        if count > MAX_LISTED_DIFFERENCES {
            let _ = writeln!(out, "    Only show first {MAX_LISTED_DIFFERENCES} mismatches.");
        }
        out.push_str(&row4("Index", "Obtained", "Baseline", "Difference"));
        for e in self.elements.iter().take(MAX_LISTED_DIFFERENCES) {
            out.push_str(&row4(
                &e.index_label(),
                &e.obtained,
                &e.baseline,
                e.difference.as_deref().unwrap_or(""),
            ));
        }
        out.push('\n');
    }
}

/// Structural and value comparison of two array mappings.
#[derive(Debug, Clone, Default)]
pub struct ArrayComparison {
    pub structure: StructuralDiff,
    pub differences: BTreeMap<String, ArrayDifference>,
}

impl ArrayComparison {
    pub fn is_match(&self) -> bool {
        self.structure.is_empty() && self.differences.is_empty()
    }

    pub fn report(&self) -> String {
        let mut out = self.structure.report();
        if !self.differences.is_empty() {
            out.push_str("Values are not sufficiently close.\n");
            for (key, difference) in &self.differences {
                difference.write_to(key, &mut out);
            }
        }
        out
    }
}

fn elements_close(o: Element<'_>, b: Element<'_>, inexact: bool, tolerance: Tolerance) -> bool {
    if inexact {
        return match (o, b) {
            (Element::Complex(_), _) | (_, Element::Complex(_)) => {
                match (o.as_complex(), b.as_complex()) {
                    (Some(x), Some(y)) => is_close_complex(x, y, tolerance),
                    _ => false,
                }
            }
            _ => match (o.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => is_close(x, y, tolerance),
                _ => false,
            },
        };
    }
    match (o.as_i128(), b.as_i128()) {
        (Some(x), Some(y)) => x == y,
        _ => o == b,
    }
}

/// Signed and absolute difference of two numeric elements.
fn numeric_difference(o: Element<'_>, b: Element<'_>) -> Option<(String, f64)> {
    if let (Some(x), Some(y)) = (o.as_i128(), b.as_i128()) {
        let d = x - y;
        return Some((d.to_string(), d.unsigned_abs() as f64));
    }
    match (o, b) {
        (Element::Complex(_), _) | (_, Element::Complex(_)) => {
            let d = o.as_complex()? - b.as_complex()?;
            Some((Element::Complex(d).to_string(), d.norm()))
        }
        _ => {
            let d = o.as_f64()? - b.as_f64()?;
            Some((format!("{d:?}"), d.abs()))
        }
    }
}

fn magnitude(e: Element<'_>) -> Option<f64> {
    e.as_complex().map(|c| c.norm())
}

/// Element-wise comparison of two arrays of equal shape and compatible kind.
pub fn compare_array(
    obtained: &NdArray,
    baseline: &NdArray,
    tolerance: Tolerance,
) -> Option<ArrayDifference> {
    let inexact = obtained.kind().is_inexact() || baseline.kind().is_inexact();
    let numeric = obtained.kind().is_numeric() && baseline.kind().is_numeric();
    let mut elements = Vec::new();
    let mut abs_errors = Vec::new();
    let mut rel_errors = Vec::new();

    for i in 0..obtained.len().min(baseline.len()) {
        let (Some(o), Some(b)) = (obtained.data().get(i), baseline.data().get(i)) else {
            continue;
        };
        if elements_close(o, b, inexact && numeric, tolerance) {
            continue;
        }
        let numeric_diff = if numeric { numeric_difference(o, b) } else { None };
        if let Some((_, abs)) = &numeric_diff {
            abs_errors.push(*abs);
            if let Some(m) = magnitude(b).filter(|m| *m != 0.0) {
                rel_errors.push(abs / m);
            }
        }
        elements.push(ElementDiff {
            index: obtained.unravel(i),
            obtained: o.to_string(),
            baseline: b.to_string(),
            abs_diff: numeric_diff.as_ref().map(|(_, abs)| *abs),
            difference: numeric_diff.map(|(d, _)| d),
        });
    }
    if elements.is_empty() {
        return None;
    }
    let stats = Summary::of(&abs_errors).map(|absolute| ErrorStats {
        absolute,
        relative: Summary::of(&rel_errors),
        nonzero_baseline: rel_errors.len(),
    });
    Some(ArrayDifference {
        shape: baseline.shape().to_vec(),
        size: baseline.len(),
        elements,
        stats,
    })
}

/// Structural check, then element-wise comparison of arrays passing it.
pub fn compare_arrays(
    obtained: &BTreeMap<String, NdArray>,
    baseline: &BTreeMap<String, NdArray>,
    tolerances: &Tolerances,
) -> ArrayComparison {
    let structure = StructuralDiff::compare(obtained, baseline);
    let mut differences = BTreeMap::new();
    for key in structure.comparable_keys() {
        let (Some(o), Some(b)) = (obtained.get(&key), baseline.get(&key)) else {
            continue;
        };
        if let Some(difference) = compare_array(o, b, tolerances.for_key(&key)) {
            differences.insert(key, difference);
        }
    }
    ArrayComparison {
        structure,
        differences,
    }
}

pub fn compare_files(
    obtained: &Path,
    baseline: &Path,
    tolerances: &Tolerances,
) -> Result<Comparison> {
    let (o, b) = (npz::read(obtained)?, npz::read(baseline)?);
    log::debug!("Comparing {} obtained arrays against {} baseline arrays", o.len(), b.len());
    Ok(Comparison::from_report(compare_arrays(&o, &b, tolerances).report()))
}
