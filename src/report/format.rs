//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the normalization/aggregation code stays clean and testable
//! - output changes are localized (important for future snapshot tests)

use crate::app::pipeline::RunOutput;
use crate::data::cache::CacheStatus;
use crate::domain::{CategoryCount, CityTotal, CumulativeCount, MovingAveragePoint};

/// Format the run summary (feed, ingest stats, date range, filter).
pub fn format_run_summary(run: &RunOutput) -> String {
    let mut out = String::new();

    out.push_str("=== cvd - County COVID-19 Dashboard ===\n");
    out.push_str(&format!("Feed: {}\n", run.kind.display_name()));
    out.push_str(&format!("Data: {}\n", cache_status_label(run.cache_status)));
    out.push_str(&format!(
        "Rows: read={} used={} dropped={}\n",
        run.ingest.rows_read,
        run.ingest.rows_used,
        run.ingest.row_errors.len(),
    ));

    match run.ingest.dataset.date_range() {
        Some((start, end)) => out.push_str(&format!("Dates: {start} to {end}\n")),
        None => out.push_str("Dates: (no rows)\n"),
    }

    if run.filter.is_empty() {
        out.push_str(&format!(
            "Filter: none (county-wide, {} cities)\n",
            run.ingest.dataset.cities().len()
        ));
    } else {
        out.push_str(&format!("Filter: {}\n", run.filter.join(", ")));
    }

    if !run.ingest.row_errors.is_empty() {
        out.push_str("\nDropped rows:\n");
        for err in run.ingest.row_errors.iter().take(10) {
            out.push_str(&format!("  line {}: {}\n", err.line, err.message));
        }
        let rest = run.ingest.row_errors.len().saturating_sub(10);
        if rest > 0 {
            out.push_str(&format!("  ... and {rest} more\n"));
        }
    }

    out.push('\n');
    out
}

/// Format the top-by-city table.
pub fn format_top_cities(totals: &[CityTotal], top_n: usize) -> String {
    let mut out = String::new();
    out.push_str(&format!("Top cities (of {}):\n", totals.len()));
    out.push_str(&format!("{:<24} {:>8}\n", "city", "count"));
    out.push_str(&format!("{:-<24} {:-<8}\n", "", ""));
    for row in totals.iter().take(top_n) {
        out.push_str(&format!("{:<24} {:>8}\n", truncate(&row.city, 24), row.count));
    }
    out
}

/// Format the trailing daily table: count, moving average, running total.
pub fn format_recent_daily(
    cumulative: &[CumulativeCount],
    average: &[MovingAveragePoint],
    days: usize,
) -> String {
    let mut out = String::new();
    out.push_str(&format!("Daily counts (last {days} days):\n"));
    out.push_str(&format!(
        "{:<12} {:>8} {:>8} {:>12}\n",
        "date", "count", "7d avg", "cumulative"
    ));
    out.push_str(&format!("{:-<12} {:-<8} {:-<8} {:-<12}\n", "", "", "", ""));

    let skip = cumulative.len().saturating_sub(days);
    for (cum, avg) in cumulative.iter().zip(average.iter()).skip(skip) {
        let avg_label = match avg.average {
            Some(v) => format!("{v:.1}"),
            None => "-".to_string(),
        };
        out.push_str(&format!(
            "{:<12} {:>8} {:>8} {:>12}\n",
            cum.date.to_string(),
            cum.count,
            avg_label,
            cum.cumulative
        ));
    }
    out
}

/// Format one histogram table.
pub fn format_histogram(title: &str, bins: &[CategoryCount]) -> String {
    let mut out = String::new();
    out.push_str(&format!("{title}:\n"));
    out.push_str(&format!("{:<12} {:>8}\n", "category", "count"));
    out.push_str(&format!("{:-<12} {:-<8}\n", "", ""));
    for bin in bins {
        out.push_str(&format!(
            "{:<12} {:>8}\n",
            truncate(&bin.category, 12),
            bin.count
        ));
    }
    out
}

/// Format per-city blocks of recent daily counts for a filtered run.
pub fn format_city_blocks(run: &RunOutput, days: usize) -> String {
    let mut out = String::new();
    for city in &run.filter {
        let rows: Vec<_> = run
            .views
            .cumulative_by_city
            .iter()
            .filter(|r| &r.city == city)
            .collect();

        out.push_str(&format!("{city}:\n"));
        if rows.is_empty() {
            out.push_str("  (no rows in range)\n\n");
            continue;
        }

        out.push_str(&format!(
            "  {:<12} {:>8} {:>12}\n",
            "date", "count", "cumulative"
        ));
        let skip = rows.len().saturating_sub(days);
        for row in rows.iter().skip(skip) {
            out.push_str(&format!(
                "  {:<12} {:>8} {:>12}\n",
                row.date.to_string(),
                row.count,
                row.cumulative
            ));
        }
        out.push('\n');
    }
    out
}

fn cache_status_label(status: CacheStatus) -> &'static str {
    match status {
        CacheStatus::Fresh => "cached",
        CacheStatus::Refreshed => "freshly fetched",
        CacheStatus::StaleServed => "stale (upstream unavailable)",
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn top_cities_table_truncates_to_top_n() {
        let totals = vec![
            CityTotal {
                city: "Fort Collins".to_string(),
                count: 30,
            },
            CityTotal {
                city: "Loveland".to_string(),
                count: 20,
            },
            CityTotal {
                city: "Berthoud".to_string(),
                count: 1,
            },
        ];
        let txt = format_top_cities(&totals, 2);
        assert!(txt.contains("Fort Collins"));
        assert!(txt.contains("Loveland"));
        assert!(!txt.contains("Berthoud"));
    }

    #[test]
    fn recent_daily_shows_dash_before_average_window_fills() {
        let date = NaiveDate::from_ymd_opt(2020, 3, 1).unwrap();
        let cumulative = vec![CumulativeCount {
            date,
            count: 2,
            cumulative: 2,
        }];
        let average = vec![MovingAveragePoint {
            date,
            count: 2,
            average: None,
        }];
        let txt = format_recent_daily(&cumulative, &average, 14);
        assert!(txt.contains("2020-03-01"));
        assert!(txt.contains(" -"));
    }

    #[test]
    fn histogram_table_lists_all_bins() {
        let bins = vec![
            CategoryCount {
                category: "Female".to_string(),
                count: 2,
            },
            CategoryCount {
                category: "Male".to_string(),
                count: 0,
            },
        ];
        let txt = format_histogram("Cases by sex", &bins);
        assert!(txt.contains("Female"));
        assert!(txt.contains("Male"));
    }
}
