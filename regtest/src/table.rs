//! Labeled two-dimensional tables.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{NaiveDateTime, TimeDelta};

use crate::error::{RegressError, Result};
use crate::kind::Kind;
use crate::structural::Structured;

/// One named column of a [`Table`].
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Bool(Vec<bool>),
    Int(Vec<i64>),
    /// Floats; NaN marks a missing value.
    Float(Vec<f64>),
    Text(Vec<Option<String>>),
    DateTime(Vec<Option<NaiveDateTime>>),
    /// Not supported by table checks.
    TimeDelta(Vec<TimeDelta>),
    /// Opaque values; not supported by table checks.
    Object(Vec<serde_json::Value>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Bool(v) => v.len(),
            Column::Int(v) => v.len(),
            Column::Float(v) => v.len(),
            Column::Text(v) => v.len(),
            Column::DateTime(v) => v.len(),
            Column::TimeDelta(v) => v.len(),
            Column::Object(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> Kind {
        match self {
            Column::Bool(_) => Kind::Bool,
            Column::Int(_) => Kind::Int,
            Column::Float(_) => Kind::Float,
            Column::Text(_) => Kind::Text,
            Column::DateTime(_) => Kind::DateTime,
            Column::TimeDelta(_) => Kind::TimeDelta,
            Column::Object(_) => Kind::Object,
        }
    }

    /// Numeric value at `row` widened to f64, if the column is numeric.
    pub(crate) fn as_f64(&self, row: usize) -> Option<f64> {
        match self {
            Column::Int(v) => v.get(row).map(|x| *x as f64),
            Column::Float(v) => v.get(row).copied(),
            _ => None,
        }
    }

    /// Cell rendered for diff reports.
    pub(crate) fn display_cell(&self, row: usize) -> String {
        match self {
            Column::Bool(v) => v.get(row).map(|b| bool_label(*b).to_string()),
            Column::Int(v) => v.get(row).map(ToString::to_string),
            Column::Float(v) => v.get(row).map(|f| format!("{f:?}")),
            Column::Text(v) => v
                .get(row)
                .map(|s| s.clone().unwrap_or_else(|| "<missing>".to_string())),
            Column::DateTime(v) => v.get(row).map(|d| match d {
                Some(d) => d.to_string(),
                None => "NaT".to_string(),
            }),
            Column::TimeDelta(v) => v.get(row).map(ToString::to_string),
            Column::Object(v) => v.get(row).map(ToString::to_string),
        }
        .unwrap_or_default()
    }
}

pub(crate) fn bool_label(b: bool) -> &'static str {
    if b {
        "True"
    } else {
        "False"
    }
}

impl Structured for Column {
    fn kind(&self) -> Kind {
        Column::kind(self)
    }

    fn shape(&self) -> Vec<usize> {
        vec![self.len()]
    }
}

impl From<Vec<bool>> for Column {
    fn from(v: Vec<bool>) -> Self {
        Column::Bool(v)
    }
}

impl From<Vec<i64>> for Column {
    fn from(v: Vec<i64>) -> Self {
        Column::Int(v)
    }
}

impl From<Vec<i32>> for Column {
    fn from(v: Vec<i32>) -> Self {
        Column::Int(v.into_iter().map(i64::from).collect())
    }
}

impl From<Vec<f64>> for Column {
    fn from(v: Vec<f64>) -> Self {
        Column::Float(v)
    }
}

impl From<Vec<String>> for Column {
    fn from(v: Vec<String>) -> Self {
        Column::Text(v.into_iter().map(Some).collect())
    }
}

impl From<Vec<&str>> for Column {
    fn from(v: Vec<&str>) -> Self {
        Column::Text(v.into_iter().map(|s| Some(s.to_string())).collect())
    }
}

impl From<Vec<NaiveDateTime>> for Column {
    fn from(v: Vec<NaiveDateTime>) -> Self {
        Column::DateTime(v.into_iter().map(Some).collect())
    }
}

/// Named columns with ordered rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<(String, Column)>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style column append.
    pub fn with_column(mut self, name: impl Into<String>, column: impl Into<Column>) -> Self {
        self.push_column(name, column);
        self
    }

    pub fn push_column(&mut self, name: impl Into<String>, column: impl Into<Column>) {
        self.columns.push((name.into(), column.into()));
    }

    pub fn columns(&self) -> &[(String, Column)] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|(n, _)| n == name).map(|(_, c)| c)
    }

    pub fn n_rows(&self) -> usize {
        self.columns.first().map(|(_, c)| c.len()).unwrap_or(0)
    }

    /// Columns keyed by name, for structural comparison.
    pub(crate) fn by_name(&self) -> BTreeMap<String, &Column> {
        self.columns.iter().map(|(n, c)| (n.clone(), c)).collect()
    }

    /// Reject unsupported column kinds, duplicate names and ragged columns.
    pub fn validate(&self) -> Result<()> {
        let mut seen = BTreeSet::new();
        let rows = self.n_rows();
        for (name, column) in &self.columns {
            if !seen.insert(name.as_str()) {
                return Err(RegressError::validation(name, "duplicate column name"));
            }
            if matches!(column.kind(), Kind::TimeDelta | Kind::Object) {
                return Err(RegressError::validation(
                    name,
                    format!(
                        "only numeric/string/datetime data is supported in table checks, \
                         column with type {} was given",
                        column.kind()
                    ),
                ));
            }
            if column.len() != rows {
                return Err(RegressError::validation(
                    name,
                    format!("column has {} rows, expected {rows}", column.len()),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_accepts_supported_columns() {
        let table = Table::new()
            .with_column("key", vec!["a", "b"])
            .with_column("x", vec![1.0, 2.0])
            .with_column("n", vec![1i64, 2])
            .with_column("flag", vec![true, false]);
        table.validate().unwrap();
        assert_eq!(table.n_rows(), 2);
        assert_eq!(table.column("x").unwrap().kind(), Kind::Float);
    }

    #[test]
    fn validate_rejects_timedelta_and_objects() {
        let table = Table::new().with_column("dt", Column::TimeDelta(vec![TimeDelta::seconds(1)]));
        let err = table.validate().unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("dt"));
        assert!(err.to_string().contains("timedelta64"));

        let table = Table::new().with_column("o", Column::Object(vec![serde_json::json!({})]));
        assert!(table.validate().unwrap_err().to_string().contains("object"));
    }

    #[test]
    fn validate_rejects_ragged_and_duplicate_columns() {
        let ragged = Table::new()
            .with_column("a", vec![1i64, 2])
            .with_column("b", vec![1i64]);
        assert!(ragged.validate().is_err());

        let dup = Table::new()
            .with_column("a", vec![1i64])
            .with_column("a", vec![2i64]);
        assert!(dup.validate().unwrap_err().to_string().contains("duplicate"));
    }
}
