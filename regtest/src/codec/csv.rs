//! Delimited-text codec for [`Table`]s.
//!
//! Floats are written with 17 significant digits and always keep a decimal
//! point or exponent, so a float column is read back as a float column.

use std::path::Path;

use chrono::{NaiveDateTime, Timelike};
use fs_err as fs;

use crate::error::{RegressError, Result};
use crate::table::{bool_label, Column, Table};

/// Significant digits used for float cells.
pub const FLOAT_PRECISION: usize = 17;

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATETIME_FRACTION_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

fn trim_fraction(mut s: String) -> String {
    if s.contains('.') {
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
    }
    s
}

/// `printf("%.{precision}g")` for a finite float.
pub fn format_significant(value: f64, precision: usize) -> String {
    if value == 0.0 {
        return if value.is_sign_negative() { "-0" } else { "0" }.to_string();
    }
    let precision = precision.max(1);
    let sci = format!("{:.*e}", precision - 1, value);
    let Some((mantissa, exponent)) = sci.split_once('e') else {
        return sci;
    };
    let Ok(exponent) = exponent.parse::<i32>() else {
        return sci;
    };
    if exponent < -4 || exponent >= precision as i32 {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!(
            "{}e{sign}{:02}",
            trim_fraction(mantissa.to_string()),
            exponent.abs()
        )
    } else {
        let decimals = (precision as i32 - 1 - exponent).max(0) as usize;
        trim_fraction(format!("{value:.decimals$}"))
    }
}

/// Float cell text; empty for NaN.
pub fn format_float_cell(value: f64) -> String {
    if value.is_nan() {
        return String::new();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let mut s = format_significant(value, FLOAT_PRECISION);
    if !s.contains(['.', 'e']) {
        s.push_str(".0");
    }
    s
}

fn format_datetime(value: &NaiveDateTime) -> String {
    if value.nanosecond() == 0 {
        value.format(DATETIME_FORMAT).to_string()
    } else {
        value.format(DATETIME_FRACTION_FORMAT).to_string()
    }
}

fn parse_datetime(cell: &str) -> Option<NaiveDateTime> {
    let format = if cell.contains('.') {
        DATETIME_FRACTION_FORMAT
    } else {
        DATETIME_FORMAT
    };
    NaiveDateTime::parse_from_str(cell, format).ok()
}

fn quote(cell: &str) -> String {
    if cell.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

fn cell(column: &Column, row: usize) -> String {
    match column {
        Column::Bool(v) => bool_label(v[row]).to_string(),
        Column::Int(v) => v[row].to_string(),
        Column::Float(v) => format_float_cell(v[row]),
        Column::Text(v) => v[row].as_deref().map(quote).unwrap_or_default(),
        Column::DateTime(v) => v[row].as_ref().map(format_datetime).unwrap_or_default(),
        Column::TimeDelta(v) => v[row].to_string(),
        Column::Object(v) => quote(&v[row].to_string()),
    }
}

/// Render a validated table as delimited text.
pub fn encode(table: &Table) -> String {
    let mut out = String::new();
    let header: Vec<String> = table.columns().iter().map(|(name, _)| quote(name)).collect();
    out.push_str(&header.join(","));
    out.push('\n');
    for row in 0..table.n_rows() {
        let cells: Vec<String> = table.columns().iter().map(|(_, c)| cell(c, row)).collect();
        out.push_str(&cells.join(","));
        out.push('\n');
    }
    out
}

/// Split delimited text into records, honouring quoted fields.
fn split_records(text: &str) -> std::result::Result<Vec<Vec<String>>, String> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut was_quoted = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if quoted {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => quoted = false,
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' if field.is_empty() => {
                quoted = true;
                was_quoted = true;
            }
            ',' => {
                record.push(std::mem::take(&mut field));
                was_quoted = false;
            }
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' | '\r' => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
                was_quoted = false;
            }
            _ => field.push(c),
        }
    }
    if quoted {
        return Err("unterminated quoted field".to_string());
    }
    if !field.is_empty() || !record.is_empty() || was_quoted {
        record.push(field);
        records.push(record);
    }
    Ok(records)
}

fn infer_column(cells: &[&str]) -> Column {
    let non_empty = cells.iter().filter(|c| !c.is_empty()).count();
    let all_present = non_empty == cells.len();

    if cells.is_empty() {
        return Column::Text(Vec::new());
    }
    if all_present && cells.iter().all(|c| *c == "True" || *c == "False") {
        return Column::Bool(cells.iter().map(|c| *c == "True").collect());
    }
    if all_present {
        let ints: Option<Vec<i64>> = cells.iter().map(|c| c.parse().ok()).collect();
        if let Some(ints) = ints {
            return Column::Int(ints);
        }
    }
    let floats: Option<Vec<f64>> = cells
        .iter()
        .map(|c| if c.is_empty() { Some(f64::NAN) } else { c.parse().ok() })
        .collect();
    if let Some(floats) = floats {
        return Column::Float(floats);
    }
    let dates: Option<Vec<Option<NaiveDateTime>>> = cells
        .iter()
        .map(|c| if c.is_empty() { Some(None) } else { parse_datetime(c).map(Some) })
        .collect();
    if let Some(dates) = dates {
        return Column::DateTime(dates);
    }
    Column::Text(
        cells
            .iter()
            .map(|c| (!c.is_empty()).then(|| c.to_string()))
            .collect(),
    )
}

/// Parse delimited text back into a table, inferring column kinds.
pub fn decode(text: &str) -> std::result::Result<Table, String> {
    let mut records = split_records(text)?.into_iter();
    let Some(header) = records.next() else {
        return Ok(Table::new());
    };
    if header.len() == 1 && header[0].is_empty() {
        return Ok(Table::new());
    }
    let rows: Vec<Vec<String>> = records.collect();
    for (i, row) in rows.iter().enumerate() {
        if row.len() != header.len() {
            return Err(format!(
                "row {} has {} fields, expected {}",
                i + 1,
                row.len(),
                header.len()
            ));
        }
    }

    let mut table = Table::new();
    for (col, name) in header.into_iter().enumerate() {
        let cells: Vec<&str> = rows.iter().map(|r| r[col].as_str()).collect();
        table.push_column(name, infer_column(&cells));
    }
    Ok(table)
}

pub fn write(path: &Path, table: &Table) -> Result<()> {
    fs::write(path, encode(table))?;
    Ok(())
}

pub fn read(path: &Path) -> Result<Table> {
    let bytes = fs::read(path)?;
    let text = String::from_utf8(bytes).map_err(|e| RegressError::corrupt(path, e))?;
    decode(&text).map_err(|e| RegressError::corrupt(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn significant_digit_formatting_matches_printf() {
        assert_eq!(format_significant(1.0, 17), "1");
        assert_eq!(format_significant(0.1, 17), "0.10000000000000001");
        assert_eq!(format_significant(1234.5, 6), "1234.5");
        assert_eq!(format_significant(1e20, 17), "1e+20");
        assert_eq!(format_significant(1.5e-7, 17), "1.4999999999999999e-07");
        assert_eq!(format_significant(-2.5, 3), "-2.5");
    }

    #[test]
    fn float_cells_keep_float_marker() {
        assert_eq!(format_float_cell(3.0), "3.0");
        assert_eq!(format_float_cell(f64::NAN), "");
        assert_eq!(format_float_cell(f64::NEG_INFINITY), "-inf");
        assert_eq!(format_float_cell(1e20), "1e+20");
    }

    #[test]
    fn encode_and_decode_preserve_kinds() {
        let date = NaiveDate::from_ymd_opt(2022, 1, 20)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let table = Table::new()
            .with_column("key", vec!["a", "b,c"])
            .with_column("float_value", vec![1.0, f64::NAN])
            .with_column("int_value", vec![1i64, 2])
            .with_column("flag", vec![true, false])
            .with_column("date_value", vec![date, date]);

        let text = encode(&table);
        assert!(text.starts_with("key,float_value,int_value,flag,date_value\n"));
        assert!(text.contains("\"b,c\""));
        assert!(text.contains("2022-01-20 00:00:00"));

        let decoded = decode(&text).unwrap();
        assert!(matches!(decoded.column("key"), Some(Column::Text(_))));
        assert!(matches!(decoded.column("float_value"), Some(Column::Float(_))));
        assert!(matches!(decoded.column("int_value"), Some(Column::Int(_))));
        assert!(matches!(decoded.column("flag"), Some(Column::Bool(_))));
        assert!(matches!(decoded.column("date_value"), Some(Column::DateTime(_))));
        assert_eq!(encode(&decoded), text);
    }

    #[test]
    fn quoted_fields_with_newlines_and_quotes() {
        let records = split_records("a,b\n\"x\ny\",\"say \"\"hi\"\"\"\n").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1], vec!["x\ny".to_string(), "say \"hi\"".to_string()]);
    }

    #[test]
    fn ragged_rows_are_rejected() {
        assert!(decode("a,b\n1\n").unwrap_err().contains("row 1"));
        assert!(decode("a\n\"open\n").is_err());
    }

    #[test]
    fn empty_cells_in_single_column() {
        let table = decode("x\n1.5\n\n").unwrap();
        match table.column("x") {
            Some(Column::Float(v)) => {
                assert_eq!(v.len(), 2);
                assert!(v[1].is_nan());
            }
            other => panic!("unexpected column {other:?}"),
        }
    }
}
