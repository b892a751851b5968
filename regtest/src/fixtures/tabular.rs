//! Table snapshots stored as delimited text.

use std::path::Path;

use crate::codec::csv;
use crate::error::Result;
use crate::fixtures::ToleranceOptions;
use crate::lifecycle::{Artifact, CheckOptions, Comparison, RegressionContext};
use crate::structural::{row4, StructuralDiff};
use crate::table::{Column, Table};
use crate::tolerance::{is_close, Tolerance, Tolerances};
use crate::verdict::Verdict;

pub const EXTENSION: &str = ".csv";

/// Options for [`TableRegression::check`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableOptions {
    pub check: CheckOptions,
    /// Per-column tolerances; unlisted columns use the table default.
    pub tolerance: ToleranceOptions,
}

impl TableOptions {
    pub fn with_check(mut self, check: CheckOptions) -> Self {
        self.check = check;
        self
    }

    pub fn column_tolerance(mut self, column: impl Into<String>, tolerance: Tolerance) -> Self {
        self.tolerance = self.tolerance.with(column, tolerance);
        self
    }

    pub fn default_tolerance(mut self, tolerance: Tolerance) -> Self {
        self.tolerance = self.tolerance.with_default(tolerance);
        self
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TableRegression<'a> {
    context: &'a RegressionContext,
}

impl<'a> TableRegression<'a> {
    pub fn new(context: &'a RegressionContext) -> Self {
        Self { context }
    }

    pub fn check(&self, table: &Table, options: &TableOptions) -> Result<Verdict> {
        table.validate()?;
        let tolerances = options
            .tolerance
            .resolve(self.context.config().table_tolerance())?;
        self.context
            .perform(&TableArtifact { table, tolerances }, EXTENSION, &options.check)
    }
}

struct TableArtifact<'t> {
    table: &'t Table,
    tolerances: Tolerances,
}

impl Artifact for TableArtifact<'_> {
    fn dump(&self, path: &Path) -> Result<()> {
        csv::write(path, self.table)
    }

    fn compare(&self, obtained: &Path, baseline: &Path) -> Result<Comparison> {
        compare_files(obtained, baseline, &self.tolerances)
    }
}

/// One mismatching row of a column.
#[derive(Debug, Clone, PartialEq)]
pub struct RowDiff {
    pub row: usize,
    pub obtained: String,
    pub baseline: String,
    pub diff: String,
}

fn both_missing(o: &Column, b: &Column, row: usize) -> bool {
    match (o, b) {
        (Column::Text(o), Column::Text(b)) => o[row].is_none() && b[row].is_none(),
        (Column::DateTime(o), Column::DateTime(b)) => o[row].is_none() && b[row].is_none(),
        _ => false,
    }
}

fn cells_equal(o: &Column, b: &Column, row: usize, tolerance: Tolerance) -> bool {
    if both_missing(o, b, row) {
        return true;
    }
    match (o, b) {
        (Column::Int(o), Column::Int(b)) => o[row] == b[row],
        (Column::Bool(o), Column::Bool(b)) => o[row] == b[row],
        (Column::Text(o), Column::Text(b)) => o[row] == b[row],
        (Column::DateTime(o), Column::DateTime(b)) => o[row] == b[row],
        _ => match (o.as_f64(row), b.as_f64(row)) {
            (Some(x), Some(y)) => is_close(x, y, tolerance),
            _ => false,
        },
    }
}

fn cell_diff(o: &Column, b: &Column, row: usize) -> String {
    match (o, b) {
        (Column::Bool(o), Column::Bool(b)) => {
            crate::table::bool_label(o[row] ^ b[row]).to_string()
        }
        (Column::Int(o), Column::Int(b)) => {
            (i128::from(o[row]) - i128::from(b[row])).abs().to_string()
        }
        (Column::DateTime(o), Column::DateTime(b)) => match (o[row], b[row]) {
            (Some(x), Some(y)) => (x - y).abs().to_string(),
            _ => "NaT".to_string(),
        },
        _ => match (o.as_f64(row), b.as_f64(row)) {
            (Some(x), Some(y)) => format!("{:?}", (x - y).abs()),
            _ => "?".to_string(),
        },
    }
}

/// Rows of one column pair that are not close. Both columns have equal length.
pub fn compare_columns(obtained: &Column, baseline: &Column, tolerance: Tolerance) -> Vec<RowDiff> {
    (0..obtained.len().min(baseline.len()))
        .filter(|&row| !cells_equal(obtained, baseline, row, tolerance))
        .map(|row| RowDiff {
            row,
            obtained: obtained.display_cell(row),
            baseline: baseline.display_cell(row),
            diff: cell_diff(obtained, baseline, row),
        })
        .collect()
}

/// Structural check over columns, then value comparison of the columns that
/// passed it. Empty when the tables match.
pub fn compare_tables(obtained: &Table, baseline: &Table, tolerances: &Tolerances) -> String {
    let (o_cols, b_cols) = (obtained.by_name(), baseline.by_name());
    let structure = StructuralDiff::compare(&o_cols, &b_cols);
    let comparable = structure.comparable_keys();
    let mut report = structure.report();

    let mut values = String::new();
    for (name, o) in obtained.columns() {
        if !comparable.contains(name) {
            continue;
        }
        let Some(b) = b_cols.get(name) else {
            continue;
        };
        let rows = compare_columns(o, b, tolerances.for_key(name));
        if rows.is_empty() {
            continue;
        }
        values.push_str(&format!("{name}:\n"));
        values.push_str(&row4(
            "index",
            &format!("obtained_{name}"),
            &format!("baseline_{name}"),
            "diff",
        ));
        for r in rows {
            values.push_str(&row4(&r.row.to_string(), &r.obtained, &r.baseline, &r.diff));
        }
        values.push('\n');
    }
    if !values.is_empty() {
        report.push_str("Values are not close within tolerance.\n");
        report.push_str(&values);
    }
    report
}

pub fn compare_files(
    obtained: &Path,
    baseline: &Path,
    tolerances: &Tolerances,
) -> Result<Comparison> {
    let (o, b) = (csv::read(obtained)?, csv::read(baseline)?);
    log::debug!("Comparing tables with {} and {} columns", o.columns().len(), b.columns().len());
    Ok(Comparison::from_report(compare_tables(&o, &b, tolerances)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test_context;
    use chrono::NaiveDate;

    fn sample() -> Table {
        let day = |d| {
            NaiveDate::from_ymd_opt(2022, 1, d)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        };
        Table::new()
            .with_column("key", vec!["a", "b", "c"])
            .with_column("float_value", vec![1.1, 2.2, 3.3])
            .with_column("int_value", vec![1i64, 2, 3])
            .with_column("date_value", vec![day(1), day(2), day(3)])
    }

    #[test]
    fn self_comparison_passes() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = test_context(tmp.path(), "test_table");
        let facade = TableRegression::new(&ctx);
        assert!(facade.check(&sample(), &TableOptions::default()).unwrap().is_abort());
        facade.check(&sample(), &TableOptions::default()).unwrap().assert_pass();
    }

    #[test]
    fn value_diffs_list_rows_per_column() {
        let tolerances = Tolerances::new(Tolerance::new(1e-8, 1e-8));
        let baseline = sample();
        let obtained = Table::new()
            .with_column("key", vec!["a", "x", "c"])
            .with_column("float_value", vec![1.1, 2.2, 3.5])
            .with_column("int_value", vec![1i64, 2, 3])
            .with_column("date_value", baseline.column("date_value").unwrap().clone());

        let report = compare_tables(&obtained, &baseline, &tolerances);
        assert!(report.starts_with("Values are not close within tolerance.\n"));
        assert!(report.contains("float_value:"));
        assert!(report.contains("obtained_float_value"));
        assert!(report.contains("key:"));
        assert!(!report.contains("int_value:"));
        let float_row = report
            .lines()
            .find(|l| l.trim_start().starts_with("2 ") && l.contains("3.5"))
            .unwrap();
        assert!(float_row.contains("3.3"));
    }

    #[test]
    fn per_column_tolerance_applies() {
        let tolerances =
            Tolerances::new(Tolerance::exact()).with("x", Tolerance::new(0.5, 0.0));
        let o = Table::new().with_column("x", vec![1.0, 2.0]);
        let b = Table::new().with_column("x", vec![1.4, 2.0]);
        assert_eq!(compare_tables(&o, &b, &tolerances), "");
        let tolerances = Tolerances::new(Tolerance::exact());
        assert!(!compare_tables(&o, &b, &tolerances).is_empty());
    }

    #[test]
    fn nan_and_missing_cells_match() {
        let t = Table::new()
            .with_column("f", vec![f64::NAN, 1.0])
            .with_column("s", Column::Text(vec![None, Some("a".into())]));
        assert_eq!(compare_tables(&t, &t, &Tolerances::new(Tolerance::exact())), "");
    }

    #[test]
    fn int_and_float_columns_are_compatible() {
        let o = Table::new().with_column("n", vec![1i64, 2]);
        let b = Table::new().with_column("n", vec![1.0, 2.0]);
        assert_eq!(compare_tables(&o, &b, &Tolerances::new(Tolerance::exact())), "");
    }

    #[test]
    fn structural_mismatches_are_aggregated() {
        let o = Table::new()
            .with_column("a", vec![1i64])
            .with_column("s", vec![true]);
        let b = Table::new()
            .with_column("s", vec!["x"])
            .with_column("c", vec![1i64]);
        let report = compare_tables(&o, &b, &Tolerances::new(Tolerance::exact()));
        assert!(report.contains("New in obtained:       ['a']"));
        assert!(report.contains("Missing from obtained: ['c']"));
        assert!(report.contains("Data types are not the same"));
    }

    #[test]
    fn unsupported_columns_are_rejected_before_io() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = test_context(tmp.path(), "test_table");
        let table = Table::new().with_column("o", Column::Object(vec![serde_json::json!(1)]));
        let err = TableRegression::new(&ctx)
            .check(&table, &TableOptions::default())
            .unwrap_err();
        assert!(err.is_validation());
        assert!(!tmp.path().join("baseline").exists());
    }
}
