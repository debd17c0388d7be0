//! Shared "reporting cycle" logic used by both CLI and TUI front-ends.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! cached fetch -> table decode -> normalize -> aggregate views
//!
//! The CLI and the TUI can then focus on presentation (printing vs widgets).

use std::time::Duration;

use crate::aggregate::{self, CategoryField, MOVING_AVERAGE_WINDOW};
use crate::data::cache::{CacheStatus, FileCache};
use crate::data::fetch::FeedClient;
use crate::domain::{
    AGE_BUCKET_ORDER, CategoryCount, CityCategoryCount, CityCumulativeCount, CityDailyCount,
    CityTotal, CumulativeCount, DailyCount, DashConfig, Dataset, FeedKind, MovingAveragePoint,
    SEX_ORDER,
};
use crate::error::AppError;
use crate::io::ingest::{IngestSpec, IngestedData, ingest_table, title_case};
use crate::io::table::RawTable;

/// Every aggregate view for one dataset under one city filter.
///
/// With an empty filter the county-wide views are populated and the per-city
/// views are empty; with a non-empty filter the per-city views cover exactly
/// the filter set and the county-wide views cover the filtered subset.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct Views {
    pub top_cities: Vec<CityTotal>,
    pub daily: Vec<DailyCount>,
    pub cumulative: Vec<CumulativeCount>,
    pub daily_average: Vec<MovingAveragePoint>,
    pub daily_by_city: Vec<CityDailyCount>,
    pub cumulative_by_city: Vec<CityCumulativeCount>,
    pub age_histogram: Vec<CategoryCount>,
    pub sex_histogram: Vec<CategoryCount>,
    pub age_by_city: Vec<CityCategoryCount>,
    pub sex_by_city: Vec<CityCategoryCount>,
}

/// All computed outputs of one reporting cycle.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub kind: FeedKind,
    pub ingest: IngestedData,
    /// City filter actually applied, post-normalization.
    pub filter: Vec<String>,
    pub views: Views,
    pub cache_status: CacheStatus,
}

/// Fetch (through the cache) and normalize one feed.
pub fn fetch_dataset(
    config: &DashConfig,
    kind: FeedKind,
) -> Result<(IngestedData, CacheStatus), AppError> {
    let client = FeedClient::new()?;
    let cache = FileCache::new(
        config.cache_dir.clone(),
        Duration::from_secs(config.cache_ttl_secs),
    );

    let feed = config.feed(kind);
    let (bytes, cache_status) = cache.fetch(feed.key, || client.fetch_bytes(&feed))?;

    let table = RawTable::decode(&bytes, feed.format)?;
    let ingest = ingest_table(
        &table,
        &IngestSpec {
            reporting_year: config.reporting_year,
        },
    )?;
    Ok((ingest, cache_status))
}

/// Execute a full reporting cycle: fetch, normalize, aggregate.
pub fn run_cycle(
    config: &DashConfig,
    kind: FeedKind,
    filter: &[String],
) -> Result<RunOutput, AppError> {
    let (ingest, cache_status) = fetch_dataset(config, kind)?;
    let filter = normalize_filter(filter);
    let views = compute_views(&ingest.dataset, &filter);
    Ok(RunOutput {
        kind,
        ingest,
        filter,
        views,
        cache_status,
    })
}

/// Recompute views for an already-normalized dataset.
///
/// This is what the TUI calls on a filter change, so toggling cities never
/// re-fetches or re-parses anything.
pub fn compute_views(dataset: &Dataset, filter: &[String]) -> Views {
    let (scope, by_city): (Dataset, &[String]) = if filter.is_empty() {
        (dataset.clone(), &[])
    } else {
        (dataset.filter_cities(filter), filter)
    };

    let daily = aggregate::daily_counts(&scope);
    let daily_average = aggregate::moving_average(&daily, MOVING_AVERAGE_WINDOW);

    Views {
        top_cities: aggregate::top_cities(&scope),
        cumulative: aggregate::cumulative_daily(&scope),
        daily_by_city: aggregate::daily_by_city(dataset, by_city),
        cumulative_by_city: aggregate::cumulative_by_city(dataset, by_city),
        age_histogram: aggregate::histogram(&scope, CategoryField::Age, Some(&AGE_BUCKET_ORDER)),
        sex_histogram: aggregate::histogram(&scope, CategoryField::Sex, Some(&SEX_ORDER)),
        age_by_city: aggregate::histogram_by_city(
            dataset,
            by_city,
            CategoryField::Age,
            Some(&AGE_BUCKET_ORDER),
        ),
        sex_by_city: aggregate::histogram_by_city(
            dataset,
            by_city,
            CategoryField::Sex,
            Some(&SEX_ORDER),
        ),
        daily,
        daily_average,
    }
}

/// Normalize a user-supplied city filter: title-case, sort, dedupe.
///
/// Filters match against post-normalization casing, so `-c "fort collins"`
/// and `-c "Fort Collins"` select the same rows.
pub fn normalize_filter(filter: &[String]) -> Vec<String> {
    let mut cities: Vec<String> = filter
        .iter()
        .map(|c| title_case(c))
        .filter(|c| !c.is_empty())
        .collect();
    cities.sort();
    cities.dedup();
    cities
}
