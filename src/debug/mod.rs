//! Debug bundle writer for inspecting feed inputs and derived views.

use std::fs::{File, create_dir_all};
use std::io::Write;
use std::path::PathBuf;

use chrono::Local;

use crate::aggregate;
use crate::app::pipeline::Views;
use crate::domain::{DashConfig, FeedKind};
use crate::error::AppError;
use crate::io::ingest::IngestedData;

/// Dump the current pipeline state as a markdown file under `debug/`.
///
/// Handy when the upstream table changes shape: the bundle shows exactly what
/// was read, what was dropped and why, and what the aggregates look like.
pub fn write_debug_bundle(
    config: &DashConfig,
    kind: FeedKind,
    ingest: &IngestedData,
    views: &Views,
    filter: &[String],
) -> Result<PathBuf, AppError> {
    let dir = PathBuf::from("debug");
    create_dir_all(&dir)
        .map_err(|e| AppError::fetch(format!("Failed to create debug dir: {e}")))?;

    let ts = Local::now().format("%Y%m%d_%H%M%S");
    let path = dir.join(format!("cvd_debug_{}_{ts}.md", kind.display_name()));

    let mut out = String::new();
    out.push_str("# cvd debug bundle\n");
    out.push_str(&format!("- generated: {}\n", Local::now().to_rfc3339()));
    out.push_str(&format!("- feed: {}\n", kind.display_name()));
    let url = match kind {
        FeedKind::Cases => &config.cases_url,
        FeedKind::Deaths => &config.deaths_url,
    };
    out.push_str(&format!("- url: {url}\n"));
    out.push_str(&format!(
        "- cache: dir={} ttl={}s\n",
        config.cache_dir.display(),
        config.cache_ttl_secs
    ));
    out.push_str(&format!("- reporting_year: {}\n", config.reporting_year));
    out.push_str(&format!(
        "- rows: read={} used={} dropped={}\n",
        ingest.rows_read,
        ingest.rows_used,
        ingest.row_errors.len()
    ));
    match ingest.dataset.date_range() {
        Some((start, end)) => out.push_str(&format!("- dates: {start} to {end}\n")),
        None => out.push_str("- dates: (no rows)\n"),
    }
    out.push_str(&format!(
        "- filter: {}\n",
        if filter.is_empty() {
            "(county-wide)".to_string()
        } else {
            filter.join(", ")
        }
    ));

    if !ingest.row_errors.is_empty() {
        out.push_str("\n## Dropped rows\n");
        for err in ingest.row_errors.iter().take(20) {
            out.push_str(&format!("- line {}: {}\n", err.line, err.message));
        }
        let rest = ingest.row_errors.len().saturating_sub(20);
        if rest > 0 {
            out.push_str(&format!("- ... and {rest} more\n"));
        }
    }

    out.push_str("\n## Top cities\n");
    out.push_str("| city | count |\n| - | - |\n");
    for row in aggregate::top_cities(&ingest.dataset).iter().take(20) {
        out.push_str(&format!("| {} | {} |\n", row.city, row.count));
    }

    out.push_str("\n## Histograms (current scope)\n");
    out.push_str("| age_range | count |\n| - | - |\n");
    for bin in &views.age_histogram {
        out.push_str(&format!("| {} | {} |\n", bin.category, bin.count));
    }
    out.push_str("\n| sex | count |\n| - | - |\n");
    for bin in &views.sex_histogram {
        out.push_str(&format!("| {} | {} |\n", bin.category, bin.count));
    }

    out.push_str("\n## Daily tail (current scope)\n");
    out.push_str("| date | count | cumulative |\n| - | - | - |\n");
    let skip = views.cumulative.len().saturating_sub(14);
    for row in views.cumulative.iter().skip(skip) {
        out.push_str(&format!("| {} | {} | {} |\n", row.date, row.count, row.cumulative));
    }

    let mut file = File::create(&path)
        .map_err(|e| AppError::fetch(format!("Failed to create debug file: {e}")))?;
    file.write_all(out.as_bytes())
        .map_err(|e| AppError::fetch(format!("Failed to write debug file: {e}")))?;

    Ok(path)
}
