//! Export aggregate views to CSV files and an optional JSON bundle.
//!
//! The exports are meant to be easy to consume in spreadsheets or downstream
//! scripts: one CSV per view, plain headers, ISO dates.

use std::fs::{File, create_dir_all};
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::app::pipeline::{RunOutput, Views};
use crate::domain::FeedKind;
use crate::error::AppError;

/// JSON bundle of every view from one reporting cycle.
///
/// This is the "portable" representation of a run: feed kind, applied filter,
/// and all aggregate tables in one document.
#[derive(Debug, Clone, Serialize)]
pub struct ViewBundle<'a> {
    pub tool: &'static str,
    pub feed: FeedKind,
    pub filter: &'a [String],
    pub rows_read: usize,
    pub rows_used: usize,
    pub views: &'a Views,
}

/// Write every view as a CSV file under `dir`.
pub fn write_views_csv(dir: &Path, run: &RunOutput) -> Result<(), AppError> {
    create_dir_all(dir).map_err(|e| {
        AppError::fetch(format!("Failed to create export dir '{}': {e}", dir.display()))
    })?;

    let views = &run.views;

    write_csv(dir, "top_cities.csv", "city,count", views.top_cities.iter(), |row| {
        format!("{},{}", csv_field(&row.city), row.count)
    })?;

    write_csv(dir, "daily.csv", "date,count", views.daily.iter(), |row| {
        format!("{},{}", row.date, row.count)
    })?;

    write_csv(
        dir,
        "cumulative.csv",
        "date,count,cumulative",
        views.cumulative.iter(),
        |row| format!("{},{},{}", row.date, row.count, row.cumulative),
    )?;

    write_csv(
        dir,
        "daily_average.csv",
        "date,count,average",
        views.daily_average.iter(),
        |row| {
            let avg = row.average.map(|v| format!("{v:.4}")).unwrap_or_default();
            format!("{},{},{}", row.date, row.count, avg)
        },
    )?;

    write_csv(
        dir,
        "daily_by_city.csv",
        "city,date,count",
        views.daily_by_city.iter(),
        |row| format!("{},{},{}", csv_field(&row.city), row.date, row.count),
    )?;

    write_csv(
        dir,
        "cumulative_by_city.csv",
        "city,date,count,cumulative",
        views.cumulative_by_city.iter(),
        |row| {
            format!(
                "{},{},{},{}",
                csv_field(&row.city),
                row.date,
                row.count,
                row.cumulative
            )
        },
    )?;

    write_csv(
        dir,
        "age_histogram.csv",
        "age_range,count",
        views.age_histogram.iter(),
        |row| format!("{},{}", csv_field(&row.category), row.count),
    )?;

    write_csv(
        dir,
        "sex_histogram.csv",
        "sex,count",
        views.sex_histogram.iter(),
        |row| format!("{},{}", csv_field(&row.category), row.count),
    )?;

    write_csv(
        dir,
        "age_histogram_by_city.csv",
        "city,age_range,count",
        views.age_by_city.iter(),
        |row| {
            format!(
                "{},{},{}",
                csv_field(&row.city),
                csv_field(&row.category),
                row.count
            )
        },
    )?;

    write_csv(
        dir,
        "sex_histogram_by_city.csv",
        "city,sex,count",
        views.sex_by_city.iter(),
        |row| {
            format!(
                "{},{},{}",
                csv_field(&row.city),
                csv_field(&row.category),
                row.count
            )
        },
    )?;

    Ok(())
}

/// Write the full view bundle as pretty JSON.
pub fn write_views_json(path: &Path, run: &RunOutput) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| {
        AppError::fetch(format!("Failed to create JSON export '{}': {e}", path.display()))
    })?;

    let bundle = ViewBundle {
        tool: "cvd",
        feed: run.kind,
        filter: &run.filter,
        rows_read: run.ingest.rows_read,
        rows_used: run.ingest.rows_used,
        views: &run.views,
    };

    serde_json::to_writer_pretty(file, &bundle)
        .map_err(|e| AppError::fetch(format!("Failed to write JSON export: {e}")))?;
    Ok(())
}

fn write_csv<T>(
    dir: &Path,
    name: &str,
    header: &str,
    rows: impl Iterator<Item = T>,
    mut line: impl FnMut(T) -> String,
) -> Result<(), AppError> {
    let path = dir.join(name);
    let mut file = File::create(&path).map_err(|e| {
        AppError::fetch(format!("Failed to create export CSV '{}': {e}", path.display()))
    })?;

    writeln!(file, "{header}")
        .map_err(|e| AppError::fetch(format!("Failed to write export CSV header: {e}")))?;
    for row in rows {
        writeln!(file, "{}", line(row))
            .map_err(|e| AppError::fetch(format!("Failed to write export CSV row: {e}")))?;
    }
    Ok(())
}

/// Quote a field when it contains CSV metacharacters.
fn csv_field(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_field_quotes_only_when_needed() {
        assert_eq!(csv_field("Loveland"), "Loveland");
        assert_eq!(csv_field("Fort Collins"), "Fort Collins");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
