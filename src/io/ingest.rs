//! Normalization of raw tables into typed datasets.
//!
//! This module is responsible for turning an inconsistent upstream table into
//! a clean `Dataset` of typed records that are safe to aggregate.
//!
//! Design goals:
//! - **Strict schema** for required columns (clear errors + exit code 2)
//! - **Row-level validation** (skip bad rows, but report what happened)
//! - **Deterministic behavior** (no hidden locale or inference magic)
//! - **Separation of concerns**: no aggregation logic here

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::domain::{AgeBucket, CaseRecord, Dataset, Sex};
use crate::error::AppError;
use crate::io::table::RawTable;

/// Resolved input conventions for one ingest run.
#[derive(Debug, Clone)]
pub struct IngestSpec {
    /// Year assumed for `month/day` dates that arrive without one.
    pub reporting_year: i32,
}

/// A row-level error encountered during ingest.
///
/// These are recovered locally: the row is dropped, the batch survives.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Ingest output: normalized dataset + row-error report.
#[derive(Debug, Clone)]
pub struct IngestedData {
    pub dataset: Dataset,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
    pub rows_used: usize,
}

/// Canonical names accepted for the age column.
const AGE_COLUMNS: [&str; 3] = ["age", "age_range", "age_group"];

/// Canonical names accepted for the sex column.
const SEX_COLUMNS: [&str; 2] = ["sex", "gender"];

/// Normalize a raw table into a typed dataset.
///
/// The header row is validated up front: `reported_date` and `city` (after
/// canonicalization) are required, and their absence fails the whole batch.
/// Everything row-level is recovered by dropping the row.
pub fn ingest_table(table: &RawTable, spec: &IngestSpec) -> Result<IngestedData, AppError> {
    let header_map = build_header_map(&table.headers);

    let date_idx = require_column(&header_map, "reported_date")?;
    let city_idx = require_column(&header_map, "city")?;
    let age_idx = first_column(&header_map, &AGE_COLUMNS);
    let sex_idx = first_column(&header_map, &SEX_COLUMNS);

    let mut records = Vec::with_capacity(table.rows.len());
    let mut row_errors = table.decode_errors.clone();
    let mut rows_read = table.decode_errors.len();

    for row in &table.rows {
        rows_read += 1;

        // Blank/separator rows: fewer than two populated fields.
        let populated = row.fields.iter().filter(|f| !f.trim().is_empty()).count();
        if populated < 2 {
            continue;
        }

        let raw_date = field(&row.fields, date_idx);
        let date = match repair_date(raw_date, spec.reporting_year) {
            Ok(date) => date,
            Err(message) => {
                row_errors.push(RowError {
                    line: row.line,
                    message,
                });
                continue;
            }
        };

        let city = title_case(field(&row.fields, city_idx));
        let age_bucket = match age_idx {
            Some(idx) => AgeBucket::from_age_field(field(&row.fields, idx)),
            None => AgeBucket::Na,
        };
        let sex = match sex_idx {
            Some(idx) => Sex::from_raw(field(&row.fields, idx)),
            None => Sex::Other(String::new()),
        };

        records.push(CaseRecord {
            reported_date: date,
            city,
            age_bucket,
            sex,
        });
    }

    let rows_used = records.len();
    Ok(IngestedData {
        dataset: Dataset::new(records),
        row_errors,
        rows_read,
        rows_used,
    })
}

fn build_header_map(headers: &[String]) -> HashMap<String, usize> {
    let mut map = HashMap::new();
    for (idx, name) in headers.iter().enumerate() {
        // First occurrence wins on duplicate headers.
        map.entry(normalize_header_name(name)).or_insert(idx);
    }
    map
}

/// Canonicalize a header label to lower-case, underscore-separated tokens.
///
/// Splits on whitespace, hyphens, and camel-case boundaries, so
/// `"Reported Date"`, `"ReportedDate"`, and `"reported_date"` all map to the
/// same canonical name. Excel-style BOM prefixes on the first header are
/// stripped before matching; without that, schema validation would
/// incorrectly report missing columns.
pub fn normalize_header_name(name: &str) -> String {
    let name = name.trim().trim_start_matches('\u{feff}');

    let mut out = String::with_capacity(name.len());
    let mut prev: Option<char> = None;
    for c in name.chars() {
        if c.is_whitespace() || c == '-' || c == '_' {
            if !out.ends_with('_') && !out.is_empty() {
                out.push('_');
            }
            prev = Some('_');
            continue;
        }
        if c.is_uppercase()
            && prev.is_some_and(|p| p.is_lowercase() || p.is_ascii_digit())
            && !out.ends_with('_')
        {
            out.push('_');
        }
        out.extend(c.to_lowercase());
        prev = Some(c);
    }
    out.trim_matches('_').to_string()
}

fn require_column(header_map: &HashMap<String, usize>, name: &str) -> Result<usize, AppError> {
    header_map
        .get(name)
        .copied()
        .ok_or_else(|| AppError::schema(format!("Missing required column: `{name}`")))
}

fn first_column(header_map: &HashMap<String, usize>, names: &[&str]) -> Option<usize> {
    names.iter().find_map(|name| header_map.get(*name).copied())
}

fn field<'a>(fields: &'a [String], idx: usize) -> &'a str {
    fields.get(idx).map(String::as_str).unwrap_or("")
}

/// Repair and parse an upstream date.
///
/// The feed emits `month/day[/year]`, occasionally with stray duplicate
/// separators (`3//14/2020`). Runs of `/` collapse to one before splitting;
/// a missing year falls back to the configured reporting year; two-digit
/// years are taken as 2000-series. ISO `YYYY-MM-DD` input is accepted as-is.
pub fn repair_date(raw: &str, reporting_year: i32) -> Result<NaiveDate, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("Missing `reported_date` value.".to_string());
    }

    if trimmed.contains('-') {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
            return Ok(date);
        }
    }

    let collapsed = collapse_separators(trimmed);
    let parts: Vec<&str> = collapsed.split('/').collect();

    let (month, day, year) = match parts.as_slice() {
        [m, d] => (*m, *d, reporting_year),
        [m, d, y] => {
            let year = y
                .trim()
                .parse::<i32>()
                .map_err(|_| format!("Invalid year in date '{raw}'."))?;
            let year = if year < 100 { 2000 + year } else { year };
            (*m, *d, year)
        }
        _ => return Err(format!("Invalid date '{raw}'. Expected month/day[/year].")),
    };

    let month: u32 = month
        .trim()
        .parse()
        .map_err(|_| format!("Invalid month in date '{raw}'."))?;
    let day: u32 = day
        .trim()
        .parse()
        .map_err(|_| format!("Invalid day in date '{raw}'."))?;

    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| format!("Invalid calendar date '{raw}'."))
}

fn collapse_separators(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c == '/' && out.ends_with('/') {
            continue;
        }
        out.push(c);
    }
    out
}

/// Title-case a city name, word by word. Empty stays empty (unknown city).
pub fn title_case(raw: &str) -> String {
    raw.trim()
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::table::RawRow;

    fn table(headers: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: rows
                .iter()
                .enumerate()
                .map(|(i, fields)| RawRow {
                    line: i + 2,
                    fields: fields.iter().map(|f| f.to_string()).collect(),
                })
                .collect(),
            decode_errors: Vec::new(),
        }
    }

    fn spec() -> IngestSpec {
        IngestSpec {
            reporting_year: 2020,
        }
    }

    #[test]
    fn header_names_canonicalize() {
        assert_eq!(normalize_header_name("Reported Date"), "reported_date");
        assert_eq!(normalize_header_name("ReportedDate"), "reported_date");
        assert_eq!(normalize_header_name("reported_date"), "reported_date");
        assert_eq!(normalize_header_name("  Age Range "), "age_range");
        assert_eq!(normalize_header_name("\u{feff}City"), "city");
        assert_eq!(normalize_header_name("CITY"), "city");
    }

    #[test]
    fn date_repair_cases() {
        assert_eq!(
            repair_date("3/14", 2020),
            Ok(NaiveDate::from_ymd_opt(2020, 3, 14).unwrap())
        );
        assert_eq!(
            repair_date("3//14/2020", 2020),
            Ok(NaiveDate::from_ymd_opt(2020, 3, 14).unwrap())
        );
        assert_eq!(
            repair_date("12/31/20", 2021),
            Ok(NaiveDate::from_ymd_opt(2020, 12, 31).unwrap())
        );
        assert_eq!(
            repair_date("2020-03-14", 2021),
            Ok(NaiveDate::from_ymd_opt(2020, 3, 14).unwrap())
        );
        assert!(repair_date("not-a-date", 2020).is_err());
        assert!(repair_date("2/30/2020", 2020).is_err());
        assert!(repair_date("", 2020).is_err());
    }

    #[test]
    fn missing_required_column_is_fatal() {
        let t = table(&["Age", "Sex"], &[&["34", "M"]]);
        let err = ingest_table(&t, &spec()).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn bad_date_drops_row_but_keeps_batch() {
        let t = table(
            &["City", "Reported Date"],
            &[
                &["Fort Collins", "3/1/2020"],
                &["Loveland", "not-a-date"],
                &["Berthoud", "3/2/2020"],
            ],
        );
        let out = ingest_table(&t, &spec()).unwrap();
        assert_eq!(out.rows_read, 3);
        assert_eq!(out.rows_used, 2);
        assert_eq!(out.row_errors.len(), 1);
        assert_eq!(out.row_errors[0].line, 3);
    }

    #[test]
    fn sparse_rows_are_dropped_before_parsing() {
        let t = table(
            &["City", "Reported Date"],
            &[&["", ""], &["only-one-field", ""], &["Loveland", "3/2/2020"]],
        );
        let out = ingest_table(&t, &spec()).unwrap();
        assert_eq!(out.rows_used, 1);
        // Sparse rows are not parse failures.
        assert!(out.row_errors.is_empty());
    }

    #[test]
    fn normalization_end_to_end() {
        let t = table(
            &["City", "Reported Date", "Age", "Sex"],
            &[
                &["Fort Collins", "3/1/2020", "34", "M"],
                &["fort collins", "3/1/2020", "70", "f"],
            ],
        );
        let out = ingest_table(&t, &spec()).unwrap();
        assert_eq!(out.rows_used, 2);

        let records = out.dataset.records();
        assert_eq!(records[0].city, "Fort Collins");
        assert_eq!(records[1].city, "Fort Collins");
        assert_eq!(records[0].age_bucket, AgeBucket::Decade(30));
        assert_eq!(records[1].age_bucket, AgeBucket::Decade(70));
        assert_eq!(records[0].sex, Sex::Male);
        assert_eq!(records[1].sex, Sex::Female);
        assert_eq!(out.dataset.cities(), vec!["Fort Collins"]);
    }

    #[test]
    fn missing_optional_columns_fall_back() {
        let t = table(
            &["City", "Reported Date"],
            &[&["Fort Collins", "3/1/2020"]],
        );
        let out = ingest_table(&t, &spec()).unwrap();
        let record = &out.dataset.records()[0];
        assert_eq!(record.age_bucket, AgeBucket::Na);
        assert_eq!(record.sex, Sex::Other(String::new()));
    }

    #[test]
    fn age_range_column_is_accepted() {
        let t = table(
            &["City", "Reported Date", "Age Range"],
            &[&["Loveland", "3/2/2020", "30s"]],
        );
        let out = ingest_table(&t, &spec()).unwrap();
        assert_eq!(out.dataset.records()[0].age_bucket, AgeBucket::Decade(30));
    }

    #[test]
    fn title_case_merges_city_spellings() {
        assert_eq!(title_case("fort collins"), "Fort Collins");
        assert_eq!(title_case("FORT COLLINS"), "Fort Collins");
        assert_eq!(title_case("  Loveland "), "Loveland");
        assert_eq!(title_case(""), "");
    }
}
