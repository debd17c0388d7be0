//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during aggregation
//! - exported to JSON/CSV
//! - rendered later in tables or charts

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Which upstream feed a dataset came from.
///
/// Cases and deaths share one record shape and one normalization path, but the
/// two feeds are fetched, cached, and aggregated separately. They are never
/// joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedKind {
    Cases,
    Deaths,
}

impl FeedKind {
    /// Human-readable label for terminal output.
    pub fn display_name(self) -> &'static str {
        match self {
            FeedKind::Cases => "cases",
            FeedKind::Deaths => "deaths",
        }
    }

    /// Cache key for the feed's raw bytes.
    pub fn cache_key(self) -> &'static str {
        match self {
            FeedKind::Cases => "cases",
            FeedKind::Deaths => "deaths",
        }
    }
}

/// Decade-wide age range derived from a raw age value.
///
/// `Decade(30)` renders as `"30s"`. Ages of 100 and above clamp into the top
/// `"90s"` bucket. `Na` is the sentinel for missing or non-numeric input; it
/// sorts after every numeric bucket so histogram ordering never fails on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum AgeBucket {
    Decade(u8),
    Na,
}

/// Full ordered bucket set, used as the reference order for histograms.
pub const AGE_BUCKET_ORDER: [&str; 11] = [
    "0s", "10s", "20s", "30s", "40s", "50s", "60s", "70s", "80s", "90s", "NA",
];

impl AgeBucket {
    /// Parse a raw age field into a bucket.
    ///
    /// Accepts plain integers (`34` -> `30s`) and already-bucketed labels
    /// (`30s` -> `30s`), so re-bucketing an existing label is stable. Anything
    /// else maps to `Na` rather than failing the row.
    pub fn from_age_field(raw: &str) -> Self {
        let trimmed = raw.trim().trim_end_matches(['s', 'S', '+']);
        match trimmed.parse::<u32>() {
            Ok(age) => {
                let decade = ((age / 10) * 10).min(90) as u8;
                AgeBucket::Decade(decade)
            }
            Err(_) => AgeBucket::Na,
        }
    }

    /// Label in the finite `AGE_BUCKET_ORDER` set.
    pub fn label(self) -> &'static str {
        match self {
            AgeBucket::Decade(0) => "0s",
            AgeBucket::Decade(10) => "10s",
            AgeBucket::Decade(20) => "20s",
            AgeBucket::Decade(30) => "30s",
            AgeBucket::Decade(40) => "40s",
            AgeBucket::Decade(50) => "50s",
            AgeBucket::Decade(60) => "60s",
            AgeBucket::Decade(70) => "70s",
            AgeBucket::Decade(80) => "80s",
            AgeBucket::Decade(90) => "90s",
            // Construction clamps decades to 0..=90.
            AgeBucket::Decade(_) => "NA",
            AgeBucket::Na => "NA",
        }
    }

    /// Numeric sort key; `Na` sorts after every decade.
    pub fn sort_key(self) -> u8 {
        match self {
            AgeBucket::Decade(d) => d,
            AgeBucket::Na => u8::MAX,
        }
    }
}

impl PartialOrd for AgeBucket {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AgeBucket {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl std::fmt::Display for AgeBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl From<AgeBucket> for String {
    fn from(value: AgeBucket) -> Self {
        value.label().to_string()
    }
}

impl TryFrom<String> for AgeBucket {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Ok(AgeBucket::from_age_field(&value))
    }
}

/// Normalized sex value.
///
/// The upstream feed spells these inconsistently (`F`, `fem`, `Male `, ...).
/// Known variants map onto the two canonical values; anything unrecognized
/// passes through unchanged as `Other`, preserving the trimmed raw value so it
/// still shows up in histograms instead of being silently dropped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Sex {
    Female,
    Male,
    Other(String),
}

/// Canonical reference order for sex histograms.
pub const SEX_ORDER: [&str; 2] = ["Female", "Male"];

impl Sex {
    /// Normalize a raw sex field: trim, case-fold, map known synonyms.
    pub fn from_raw(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "f" | "fem" | "female" => Sex::Female,
            "m" | "male" => Sex::Male,
            _ => Sex::Other(trimmed.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Sex::Female => "Female",
            Sex::Male => "Male",
            Sex::Other(raw) => raw,
        }
    }
}

impl std::fmt::Display for Sex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl From<Sex> for String {
    fn from(value: Sex) -> Self {
        value.label().to_string()
    }
}

impl From<String> for Sex {
    fn from(value: String) -> Self {
        Sex::from_raw(&value)
    }
}

/// One confirmed case (or death, from the deaths feed).
///
/// `city` is title-cased by normalization; an empty string means unknown and
/// is excluded from per-city breakdowns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseRecord {
    pub reported_date: NaiveDate,
    pub city: String,
    pub age_bucket: AgeBucket,
    pub sex: Sex,
}

/// An ordered collection of normalized records.
///
/// Datasets are built once per fetch cycle and treated as read-only; every
/// aggregation produces a new result value instead of mutating in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    records: Vec<CaseRecord>,
}

impl Dataset {
    pub fn new(records: Vec<CaseRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[CaseRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Inclusive `(min, max)` of reported dates, or `None` when empty.
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let mut min = None;
        let mut max = None;
        for r in &self.records {
            min = Some(min.map_or(r.reported_date, |m: NaiveDate| m.min(r.reported_date)));
            max = Some(max.map_or(r.reported_date, |m: NaiveDate| m.max(r.reported_date)));
        }
        min.zip(max)
    }

    /// Distinct known cities, sorted ascending. Unknown (empty) is excluded.
    pub fn cities(&self) -> Vec<String> {
        let mut cities: Vec<String> = self
            .records
            .iter()
            .filter(|r| !r.city.is_empty())
            .map(|r| r.city.clone())
            .collect();
        cities.sort();
        cities.dedup();
        cities
    }

    /// Subset of rows whose normalized city matches one of `cities`.
    pub fn filter_cities(&self, cities: &[String]) -> Dataset {
        let records = self
            .records
            .iter()
            .filter(|r| cities.iter().any(|c| c == &r.city))
            .cloned()
            .collect();
        Dataset::new(records)
    }
}

// ---------------------------------------------------------------------------
// Aggregate view rows
// ---------------------------------------------------------------------------

/// One calendar day's count. Daily series are contiguous and gap-filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count: u64,
}

/// Daily count plus running total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CumulativeCount {
    pub date: NaiveDate,
    pub count: u64,
    pub cumulative: u64,
}

/// Per-city daily count; each city's series spans the full date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityDailyCount {
    pub city: String,
    pub date: NaiveDate,
    pub count: u64,
}

/// Per-city daily count plus per-city running total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityCumulativeCount {
    pub city: String,
    pub date: NaiveDate,
    pub count: u64,
    pub cumulative: u64,
}

/// One histogram bin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: u64,
}

/// One histogram bin within a city's breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityCategoryCount {
    pub city: String,
    pub category: String,
    pub count: u64,
}

/// Total count for one city (top-by-city view).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityTotal {
    pub city: String,
    pub count: u64,
}

/// Daily count with its trailing moving average.
///
/// `average` is `None` for the first `window - 1` days of a series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovingAveragePoint {
    pub date: NaiveDate,
    pub count: u64,
    pub average: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(date: (i32, u32, u32), city: &str) -> CaseRecord {
        CaseRecord {
            reported_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            city: city.to_string(),
            age_bucket: AgeBucket::Na,
            sex: Sex::Other(String::new()),
        }
    }

    #[test]
    fn age_bucket_from_raw_values() {
        assert_eq!(AgeBucket::from_age_field("0"), AgeBucket::Decade(0));
        assert_eq!(AgeBucket::from_age_field("9"), AgeBucket::Decade(0));
        assert_eq!(AgeBucket::from_age_field("34"), AgeBucket::Decade(30));
        assert_eq!(AgeBucket::from_age_field(" 70 "), AgeBucket::Decade(70));
        assert_eq!(AgeBucket::from_age_field("104"), AgeBucket::Decade(90));
        assert_eq!(AgeBucket::from_age_field(""), AgeBucket::Na);
        assert_eq!(AgeBucket::from_age_field("unknown"), AgeBucket::Na);
    }

    #[test]
    fn age_bucket_rebucketing_is_idempotent() {
        for raw in ["4", "34", "95", "120", "NA", ""] {
            let once = AgeBucket::from_age_field(raw);
            let twice = AgeBucket::from_age_field(once.label());
            assert_eq!(once, twice, "rebucketing {raw:?} changed the bucket");
        }
    }

    #[test]
    fn age_bucket_na_sorts_last() {
        let mut buckets = vec![
            AgeBucket::Na,
            AgeBucket::Decade(90),
            AgeBucket::Decade(0),
            AgeBucket::Decade(40),
        ];
        buckets.sort();
        assert_eq!(
            buckets,
            vec![
                AgeBucket::Decade(0),
                AgeBucket::Decade(40),
                AgeBucket::Decade(90),
                AgeBucket::Na,
            ]
        );
    }

    #[test]
    fn sex_synonyms_map_to_canonical() {
        assert_eq!(Sex::from_raw("F"), Sex::Female);
        assert_eq!(Sex::from_raw(" fem "), Sex::Female);
        assert_eq!(Sex::from_raw("FEMALE"), Sex::Female);
        assert_eq!(Sex::from_raw("m"), Sex::Male);
        assert_eq!(Sex::from_raw("Male"), Sex::Male);
    }

    #[test]
    fn sex_unrecognized_passes_through() {
        assert_eq!(
            Sex::from_raw(" Nonbinary "),
            Sex::Other("Nonbinary".to_string())
        );
    }

    #[test]
    fn dataset_cities_sorted_distinct_without_unknown() {
        let ds = Dataset::new(vec![
            record((2020, 3, 1), "Loveland"),
            record((2020, 3, 2), ""),
            record((2020, 3, 3), "Fort Collins"),
            record((2020, 3, 4), "Loveland"),
        ]);
        assert_eq!(ds.cities(), vec!["Fort Collins", "Loveland"]);
    }

    #[test]
    fn dataset_date_range_and_filter() {
        let ds = Dataset::new(vec![
            record((2020, 3, 5), "Loveland"),
            record((2020, 3, 1), "Fort Collins"),
        ]);
        assert_eq!(
            ds.date_range(),
            Some((
                NaiveDate::from_ymd_opt(2020, 3, 1).unwrap(),
                NaiveDate::from_ymd_opt(2020, 3, 5).unwrap()
            ))
        );

        let filtered = ds.filter_cities(&["Loveland".to_string()]);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered.records()[0].city, "Loveland");

        let missing = ds.filter_cities(&["Berthoud".to_string()]);
        assert!(missing.is_empty());
    }
}
