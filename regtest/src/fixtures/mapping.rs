//! Generic key-value snapshots, compared exactly per key.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use serde_json::Value;

use crate::codec::json;
use crate::error::{RegressError, Result};
use crate::lifecycle::{Artifact, CheckOptions, Comparison, RegressionContext};
use crate::structural::StructuralDiff;
use crate::verdict::Verdict;

pub const EXTENSION: &str = ".json";

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Facade for string-keyed mappings (configs, metadata, small results).
#[derive(Debug, Clone, Copy)]
pub struct DataRegression<'a> {
    context: &'a RegressionContext,
}

impl<'a> DataRegression<'a> {
    pub fn new(context: &'a RegressionContext) -> Self {
        Self { context }
    }

    /// `data` must serialize to a JSON object.
    pub fn check<T: Serialize + ?Sized>(
        &self,
        data: &T,
        options: &CheckOptions,
    ) -> Result<Verdict> {
        let value = serde_json::to_value(data)
            .map_err(|e| RegressError::validation("data", e.to_string()))?;
        if !value.is_object() {
            return Err(RegressError::validation(
                "data",
                format!(
                    "only string-keyed mappings are supported, got {}",
                    json_type_name(&value)
                ),
            ));
        }
        self.context.perform(&MappingArtifact { value }, EXTENSION, options)
    }
}

struct MappingArtifact {
    value: Value,
}

impl Artifact for MappingArtifact {
    fn dump(&self, path: &Path) -> Result<()> {
        json::write(path, &self.value)
    }

    fn compare(&self, obtained: &Path, baseline: &Path) -> Result<Comparison> {
        compare_files(obtained, baseline)
    }
}

fn read_object(path: &Path) -> Result<BTreeMap<String, Value>> {
    match json::read(path)? {
        Value::Object(map) => Ok(map.into_iter().collect()),
        other => Err(RegressError::corrupt(
            path,
            format!("expected a JSON object, found {}", json_type_name(&other)),
        )),
    }
}

/// Key-set check, then exact equality for every shared key.
pub fn compare_maps(
    obtained: &BTreeMap<String, Value>,
    baseline: &BTreeMap<String, Value>,
) -> String {
    let structure = StructuralDiff::compare_keys(obtained, baseline);
    let mut report = structure.report();
    for key in structure.comparable_keys() {
        let (o, b) = (&obtained[&key], &baseline[&key]);
        if o != b {
            report.push_str(&format!("Value diff on {key}: expect {b}, obtained {o}\n"));
        }
    }
    report
}

pub fn compare_files(obtained: &Path, baseline: &Path) -> Result<Comparison> {
    let (o, b) = (read_object(obtained)?, read_object(baseline)?);
    log::debug!("Comparing {} mapping keys", o.len().max(b.len()));
    Ok(Comparison::from_report(compare_maps(&o, &b)))
}
