//! Scalars and flat sequences of scalars.

use std::fmt;
use std::path::Path;

use fs_err as fs;
use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::array::{Element, NdArray};
use crate::error::{RegressError, Result};
use crate::lifecycle::{Artifact, CheckOptions, Comparison, RegressionContext};
use crate::structural::row4;
use crate::tolerance::{is_close, Tolerance};
use crate::verdict::Verdict;

mod collect;

pub const EXTENSION: &str = ".json";

/// Key of the one-entry object a non-finite float is stored as:
/// `{"float": "inf"}`, `{"float": "-inf"}` or `{"float": "nan"}`.
const NON_FINITE_TAG: &str = "float";

const NOT_SCALAR: &str = "data must be a scalar or a sequence of scalars";

/// One element of a scalar sequence.
///
/// `Null` is a missing value. Non-finite floats keep their identity on disk
/// through a tagged object, so `inf`, `-inf` and `NaN` never collapse into one
/// marker.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

fn non_finite_label(x: f64) -> &'static str {
    if x.is_nan() {
        "nan"
    } else if x > 0.0 {
        "inf"
    } else {
        "-inf"
    }
}

fn parse_non_finite(label: &str) -> Option<f64> {
    match label {
        "nan" => Some(f64::NAN),
        "inf" => Some(f64::INFINITY),
        "-inf" => Some(f64::NEG_INFINITY),
        _ => None,
    }
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Scalar::Null => serializer.serialize_unit(),
            Scalar::Bool(b) => serializer.serialize_bool(*b),
            Scalar::Int(i) => serializer.serialize_i64(*i),
            Scalar::Float(x) if x.is_finite() => serializer.serialize_f64(*x),
            Scalar::Float(x) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(NON_FINITE_TAG, non_finite_label(*x))?;
                map.end()
            }
            Scalar::Text(s) => serializer.serialize_str(s),
        }
    }
}

impl<'de> Deserialize<'de> for Scalar {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let kind = json_type_name(&value);
        Scalar::from_json(value)
            .ok_or_else(|| de::Error::custom(format!("unexpected {kind} element")))
    }
}

impl Scalar {
    fn from_json(value: Value) -> Option<Self> {
        Some(match value {
            Value::Null => Scalar::Null,
            Value::Bool(b) => Scalar::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Scalar::Int(i),
                None => Scalar::Float(n.as_f64()?),
            },
            Value::String(s) => Scalar::Text(s),
            Value::Object(map) if map.len() == 1 => {
                let label = map.get(NON_FINITE_TAG)?.as_str()?;
                Scalar::Float(parse_non_finite(label)?)
            }
            Value::Array(_) | Value::Object(_) => return None,
        })
    }

    fn from_element(element: Element<'_>) -> Option<Self> {
        Some(match element {
            Element::Bool(b) => Scalar::Bool(b),
            Element::Int(i) => Scalar::Int(i),
            Element::UInt(u) => match i64::try_from(u) {
                Ok(i) => Scalar::Int(i),
                Err(_) => Scalar::Float(u as f64),
            },
            Element::Float(f) => Scalar::Float(f),
            Element::Text(s) => Scalar::Text(s.to_string()),
            Element::Complex(_) | Element::DateTime(_) | Element::Opaque => return None,
        })
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Scalar::Int(i) => Some(i as f64),
            Scalar::Float(f) => Some(f),
            _ => None,
        }
    }

    /// Quoted form used when printing whole sequences.
    fn repr(&self) -> String {
        match self {
            Scalar::Text(s) => format!("'{s}'"),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => write!(f, "None"),
            Scalar::Bool(b) => write!(f, "{}", crate::table::bool_label(*b)),
            Scalar::Int(i) => write!(f, "{i}"),
            Scalar::Float(x) => write!(f, "{x:?}"),
            Scalar::Text(s) => write!(f, "{s}"),
        }
    }
}

fn format_list(values: &[Scalar]) -> String {
    let items: Vec<String> = values.iter().map(Scalar::repr).collect();
    format!("[{}]", items.join(", "))
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Array(_) => "list",
        Value::Object(_) => "mapping",
        _ => "scalar",
    }
}

/// Options for [`ValueRegression::check`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueOptions {
    pub check: CheckOptions,
    /// Tolerance for float elements; the configured value default when unset.
    pub tolerance: Option<Tolerance>,
}

impl ValueOptions {
    pub fn with_check(mut self, check: CheckOptions) -> Self {
        self.check = check;
        self
    }

    pub fn tolerance(mut self, tolerance: Tolerance) -> Self {
        self.tolerance = Some(tolerance);
        self
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ValueRegression<'a> {
    context: &'a RegressionContext,
}

impl<'a> ValueRegression<'a> {
    pub fn new(context: &'a RegressionContext) -> Self {
        Self { context }
    }

    /// A bare scalar is checked as a one-element sequence.
    pub fn check<T: Serialize + ?Sized>(
        &self,
        data: &T,
        options: &ValueOptions,
    ) -> Result<Verdict> {
        let values = collect::collect(data)
            .map_err(|e| match e.index {
                Some(i) => RegressError::validation(
                    format!("data[{i}]"),
                    format!("{NOT_SCALAR}, got {} element", e.found),
                ),
                None => RegressError::validation("data", format!("{NOT_SCALAR}, got {}", e.found)),
            })?
            .into_values();
        self.check_scalars(values, options)
    }

    /// Zero-dimensional arrays are unwrapped, one-dimensional arrays checked
    /// element by element.
    pub fn check_array(&self, array: &NdArray, options: &ValueOptions) -> Result<Verdict> {
        if array.shape().len() > 1 {
            return Err(RegressError::validation(
                "data",
                format!("{NOT_SCALAR}, got array with {} dimensions", array.shape().len()),
            ));
        }
        let values = (0..array.len())
            .map(|i| {
                array
                    .data()
                    .get(i)
                    .and_then(Scalar::from_element)
                    .ok_or_else(|| {
                        RegressError::validation(
                            "data",
                            format!("{NOT_SCALAR}, got {} element", array.kind()),
                        )
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        self.check_scalars(values, options)
    }

    pub fn check_scalars(&self, values: Vec<Scalar>, options: &ValueOptions) -> Result<Verdict> {
        let tolerance = options
            .tolerance
            .unwrap_or_else(|| self.context.config().value_tolerance());
        tolerance.validate("tolerance")?;
        self.context
            .perform(&SequenceArtifact { values, tolerance }, EXTENSION, &options.check)
    }
}

struct SequenceArtifact {
    values: Vec<Scalar>,
    tolerance: Tolerance,
}

impl Artifact for SequenceArtifact {
    fn dump(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string(&self.values)
            .map_err(|e| RegressError::serialize(e.to_string()))?;
        fs::write(path, text)?;
        Ok(())
    }

    fn compare(&self, obtained: &Path, baseline: &Path) -> Result<Comparison> {
        compare_files(obtained, baseline, self.tolerance)
    }
}

fn values_differ(o: &Scalar, b: &Scalar, tolerance: Tolerance) -> bool {
    match (o, b.as_f64()) {
        (Scalar::Float(x), Some(y)) => !is_close(*x, y, tolerance),
        (Scalar::Float(_), None) => true,
        _ => match (o.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x != y,
            _ => o != b,
        },
    }
}

/// Equal lengths first, then element-wise comparison. Empty when equal.
pub fn compare_sequences(obtained: &[Scalar], baseline: &[Scalar], tolerance: Tolerance) -> String {
    if obtained.len() != baseline.len() {
        return format!(
            "Data shapes are not the same:\n  Obtained data length {}, Baseline data length {}.\n  \
             Obtained data: {}\n  Baseline data: {}\n\n",
            obtained.len(),
            baseline.len(),
            format_list(obtained),
            format_list(baseline)
        );
    }

    let mut report = String::new();
    for (o, b) in obtained.iter().zip(baseline) {
        if !values_differ(o, b, tolerance) {
            continue;
        }
        if report.is_empty() {
            report.push_str(&row4("Obtained", "Baseline", "AbsDiff", "RelDiff"));
        }
        let (abs_diff, rel_diff) = match (o.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => {
                let rel = if is_close(x, y, tolerance) {
                    format!("{:?}", ((x - y) / y).abs())
                } else {
                    String::new()
                };
                (format!("{:?}", (x - y).abs()), rel)
            }
            _ => (String::new(), String::new()),
        };
        report.push_str(&row4(&o.to_string(), &b.to_string(), &abs_diff, &rel_diff));
    }
    report
}

fn read_sequence(path: &Path) -> Result<Vec<Scalar>> {
    let content = fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&content).map_err(|e| RegressError::corrupt(path, e))?;
    let Value::Array(items) = value else {
        return Err(RegressError::corrupt(path, "expected a JSON list"));
    };
    items
        .into_iter()
        .map(|item| {
            let kind = json_type_name(&item);
            Scalar::from_json(item)
                .ok_or_else(|| RegressError::corrupt(path, format!("unexpected {kind} element")))
        })
        .collect()
}

pub fn compare_files(obtained: &Path, baseline: &Path, tolerance: Tolerance) -> Result<Comparison> {
    let (o, b) = (read_sequence(obtained)?, read_sequence(baseline)?);
    log::debug!("Comparing sequences of length {} and {}", o.len(), b.len());
    Ok(Comparison::from_report(compare_sequences(&o, &b, tolerance)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test_context;
    use serde_json::json;

    const TOL: Tolerance = Tolerance::new(1e-10, 1e-10);

    #[test]
    fn scalar_is_a_one_element_sequence() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = test_context(tmp.path(), "test_scalar");
        let facade = ValueRegression::new(&ctx);
        facade.check(&1.5, &ValueOptions::default()).unwrap();
        let text =
            fs::read_to_string(tmp.path().join("baseline/test_scalar.baseline.json")).unwrap();
        assert_eq!(text, "[1.5]");
        facade.check(&[1.5], &ValueOptions::default()).unwrap().assert_pass();
    }

    #[test]
    fn zero_dimensional_array_is_unwrapped() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = test_context(tmp.path(), "test_zero_dim");
        let facade = ValueRegression::new(&ctx);
        let array = NdArray::scalar(vec![7i64]).unwrap();
        facade.check_array(&array, &ValueOptions::default()).unwrap();
        facade.check(&7, &ValueOptions::default()).unwrap().assert_pass();

        let matrix = NdArray::new(vec![1, 1], vec![1i64]).unwrap();
        assert!(facade
            .check_array(&matrix, &ValueOptions::default())
            .unwrap_err()
            .is_validation());
    }

    #[test]
    fn non_scalar_elements_are_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = test_context(tmp.path(), "test_nested");
        let facade = ValueRegression::new(&ctx);
        let err = facade
            .check(&json!([1, [2, 3]]), &ValueOptions::default())
            .unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("data[1]"));
        assert!(facade
            .check(&json!({"a": 1}), &ValueOptions::default())
            .unwrap_err()
            .is_validation());
        assert!(!tmp.path().join("baseline").exists());
    }

    #[test]
    fn length_mismatch_prints_both_sequences() {
        let o = [Scalar::Int(1), Scalar::Int(2)];
        let b = [Scalar::Int(1), Scalar::Int(2), Scalar::Text("x".into())];
        let report = compare_sequences(&o, &b, TOL);
        assert!(report.contains("Obtained data length 2, Baseline data length 3."));
        assert!(report.contains("Obtained data: [1, 2]"));
        assert!(report.contains("Baseline data: [1, 2, 'x']"));
        assert!(!report.contains("AbsDiff"));
    }

    #[test]
    fn element_diffs_and_relative_quirk() {
        let o = [Scalar::Float(1.0), Scalar::Text("a".into()), Scalar::Int(3)];
        let b = [Scalar::Float(2.0), Scalar::Text("b".into()), Scalar::Int(4)];
        let report = compare_sequences(&o, &b, TOL);
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].contains("RelDiff"));
        // Not close: relative difference left blank.
        assert!(lines[1].trim_end().ends_with("1.0"));
        assert!(lines[2].trim_start().starts_with('a'));

        // Exact mismatch within a loose tolerance reports the relative error.
        let loose = Tolerance::new(10.0, 0.0);
        let report = compare_sequences(&[Scalar::Int(3)], &[Scalar::Int(4)], loose);
        assert!(report.trim_end().ends_with("0.25"));
    }

    #[test]
    fn floats_use_tolerance_and_missing_markers_match() {
        let o = [Scalar::Float(1.0 + 1e-12), Scalar::Null, Scalar::Int(2)];
        let b = [Scalar::Float(1.0), Scalar::Null, Scalar::Float(2.0)];
        assert_eq!(compare_sequences(&o, &b, TOL), "");
        assert!(!compare_sequences(&[Scalar::Float(1.0)], &[Scalar::Null], TOL).is_empty());
    }

    #[test]
    fn non_finite_floats_keep_their_identity_on_disk() {
        let values = vec![
            Scalar::Float(f64::INFINITY),
            Scalar::Float(f64::NEG_INFINITY),
            Scalar::Null,
            Scalar::Text("inf".into()),
        ];
        let text = serde_json::to_string(&values).unwrap();
        assert_eq!(text, r#"[{"float":"inf"},{"float":"-inf"},null,"inf"]"#);
        let back: Vec<Scalar> = serde_json::from_str(&text).unwrap();
        assert_eq!(back, values);

        let nan: Vec<Scalar> = serde_json::from_str(r#"[{"float":"nan"}]"#).unwrap();
        assert!(matches!(nan.as_slice(), [Scalar::Float(x)] if x.is_nan()));
        assert!(serde_json::from_str::<Vec<Scalar>>(r#"[{"float":"huge"}]"#).is_err());
    }

    #[test]
    fn infinity_drift_is_a_regression() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = test_context(tmp.path(), "test_infinity");
        let facade = ValueRegression::new(&ctx);
        let options = ValueOptions::default();
        assert!(facade.check(&[1.0, f64::INFINITY], &options).unwrap().is_abort());

        facade.check(&[1.0, f64::INFINITY], &options).unwrap().assert_pass();
        assert!(facade
            .check(&[1.0, f64::NEG_INFINITY], &options)
            .unwrap()
            .is_hard_fail());
        assert!(facade.check(&[1.0, f64::NAN], &options).unwrap().is_hard_fail());
        assert!(facade.check(&[Some(1.0), None], &options).unwrap().is_hard_fail());
    }

    #[test]
    fn nan_matches_nan_across_runs() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = test_context(tmp.path(), "test_nan");
        let facade = ValueRegression::new(&ctx);
        facade.check(&[f64::NAN, 2.0], &ValueOptions::default()).unwrap();
        facade
            .check(&[f64::NAN, 2.0], &ValueOptions::default())
            .unwrap()
            .assert_pass();
    }
}
