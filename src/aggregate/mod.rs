//! Aggregate views over a normalized dataset.
//!
//! Every function here is pure: it takes a read-only `Dataset` (or rows
//! derived from one) and produces a new ordered result value. Daily series
//! are gap-filled so every calendar day in range appears, and histograms with
//! a reference category order emit every reference category.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::domain::{
    CaseRecord, CategoryCount, CityCategoryCount, CityCumulativeCount, CityDailyCount, CityTotal,
    CumulativeCount, DailyCount, Dataset, MovingAveragePoint,
};

/// Trailing window for the daily moving average, current day included.
pub const MOVING_AVERAGE_WINDOW: usize = 7;

/// Which categorical field a histogram groups by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryField {
    Age,
    Sex,
    City,
}

impl CategoryField {
    fn value_of(self, record: &CaseRecord) -> String {
        match self {
            CategoryField::Age => record.age_bucket.label().to_string(),
            CategoryField::Sex => record.sex.label().to_string(),
            CategoryField::City => record.city.clone(),
        }
    }
}

/// Count rows per city, ordered by descending count (city ascending on ties).
///
/// The ordering serves chart rendering; it is not a data contract. Unknown
/// (empty) cities are excluded.
pub fn top_cities(dataset: &Dataset) -> Vec<CityTotal> {
    let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
    for record in dataset.records() {
        if record.city.is_empty() {
            continue;
        }
        *counts.entry(record.city.as_str()).or_insert(0) += 1;
    }

    let mut totals: Vec<CityTotal> = counts
        .into_iter()
        .map(|(city, count)| CityTotal {
            city: city.to_string(),
            count,
        })
        .collect();
    totals.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.city.cmp(&b.city)));
    totals
}

/// Count rows per calendar day over `[min, max]` of the dataset's dates.
///
/// Days with no rows get count 0; dates are contiguous and strictly
/// increasing. An empty dataset yields an empty series.
pub fn daily_counts(dataset: &Dataset) -> Vec<DailyCount> {
    let Some((start, end)) = dataset.date_range() else {
        return Vec::new();
    };

    let mut counts: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    for record in dataset.records() {
        *counts.entry(record.reported_date).or_insert(0) += 1;
    }

    fill_days(&counts, start, end)
}

/// Daily counts plus a running total.
pub fn cumulative_daily(dataset: &Dataset) -> Vec<CumulativeCount> {
    accumulate(&daily_counts(dataset))
}

/// Count rows per (city, day) for every city in `cities`.
///
/// Each city's series independently spans the full date range of the rows
/// matching the city set, so a listed city with no rows still emits a full
/// zero series rather than disappearing. Output is ordered by (city, date)
/// ascending.
pub fn daily_by_city(dataset: &Dataset, cities: &[String]) -> Vec<CityDailyCount> {
    let subset = dataset.filter_cities(cities);
    let Some((start, end)) = subset.date_range() else {
        return Vec::new();
    };

    let mut per_city: BTreeMap<&str, BTreeMap<NaiveDate, u64>> = BTreeMap::new();
    for city in cities {
        per_city.entry(city.as_str()).or_default();
    }
    for record in subset.records() {
        *per_city
            .entry(record.city.as_str())
            .or_default()
            .entry(record.reported_date)
            .or_insert(0) += 1;
    }

    let mut out = Vec::new();
    for (city, counts) in &per_city {
        for day in fill_days(counts, start, end) {
            out.push(CityDailyCount {
                city: city.to_string(),
                date: day.date,
                count: day.count,
            });
        }
    }
    out
}

/// Per-city daily counts plus a per-city running total (resets per city).
pub fn cumulative_by_city(dataset: &Dataset, cities: &[String]) -> Vec<CityCumulativeCount> {
    let daily = daily_by_city(dataset, cities);

    let mut out = Vec::with_capacity(daily.len());
    let mut current_city: Option<&str> = None;
    let mut running = 0u64;
    for row in &daily {
        if current_city != Some(row.city.as_str()) {
            current_city = Some(row.city.as_str());
            running = 0;
        }
        running += row.count;
        out.push(CityCumulativeCount {
            city: row.city.clone(),
            date: row.date,
            count: row.count,
            cumulative: running,
        });
    }
    out
}

/// Count rows per category value.
///
/// With a `reference` ordering, every reference category appears (count 0 when
/// absent from the data) in the supplied order; data categories outside the
/// reference follow in ascending order. Without one, categories sort
/// ascending.
pub fn histogram(
    dataset: &Dataset,
    field: CategoryField,
    reference: Option<&[&str]>,
) -> Vec<CategoryCount> {
    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
    for record in dataset.records() {
        *counts.entry(field.value_of(record)).or_insert(0) += 1;
    }
    ordered_bins(counts, reference)
}

/// Count rows per (city, category), independently per city.
///
/// Every city in `cities` gets a full bin set when a reference ordering is
/// supplied. Output is ordered by city ascending, then category.
pub fn histogram_by_city(
    dataset: &Dataset,
    cities: &[String],
    field: CategoryField,
    reference: Option<&[&str]>,
) -> Vec<CityCategoryCount> {
    let mut sorted_cities: Vec<&String> = cities.iter().collect();
    sorted_cities.sort();
    sorted_cities.dedup();

    let mut out = Vec::new();
    for city in sorted_cities {
        let subset = dataset.filter_cities(std::slice::from_ref(city));
        for bin in histogram(&subset, field, reference) {
            out.push(CityCategoryCount {
                city: city.clone(),
                category: bin.category,
                count: bin.count,
            });
        }
    }
    out
}

/// Trailing moving average over a gap-filled daily series.
///
/// The average is undefined (`None`) for the first `window - 1` entries.
pub fn moving_average(daily: &[DailyCount], window: usize) -> Vec<MovingAveragePoint> {
    let window = window.max(1);
    let mut out = Vec::with_capacity(daily.len());
    let mut sum = 0u64;

    for (i, day) in daily.iter().enumerate() {
        sum += day.count;
        if i >= window {
            sum -= daily[i - window].count;
        }
        let average = if i + 1 >= window {
            Some(sum as f64 / window as f64)
        } else {
            None
        };
        out.push(MovingAveragePoint {
            date: day.date,
            count: day.count,
            average,
        });
    }
    out
}

fn fill_days(counts: &BTreeMap<NaiveDate, u64>, start: NaiveDate, end: NaiveDate) -> Vec<DailyCount> {
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .map(|date| DailyCount {
            date,
            count: counts.get(&date).copied().unwrap_or(0),
        })
        .collect()
}

fn accumulate(daily: &[DailyCount]) -> Vec<CumulativeCount> {
    let mut running = 0u64;
    daily
        .iter()
        .map(|day| {
            running += day.count;
            CumulativeCount {
                date: day.date,
                count: day.count,
                cumulative: running,
            }
        })
        .collect()
}

fn ordered_bins(mut counts: BTreeMap<String, u64>, reference: Option<&[&str]>) -> Vec<CategoryCount> {
    match reference {
        Some(order) => {
            let mut out: Vec<CategoryCount> = order
                .iter()
                .map(|category| CategoryCount {
                    category: category.to_string(),
                    count: counts.remove(*category).unwrap_or(0),
                })
                .collect();
            // Pass-through categories outside the reference still appear,
            // after it, in ascending order.
            out.extend(
                counts
                    .into_iter()
                    .map(|(category, count)| CategoryCount { category, count }),
            );
            out
        }
        None => counts
            .into_iter()
            .map(|(category, count)| CategoryCount { category, count })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AGE_BUCKET_ORDER, AgeBucket, SEX_ORDER, Sex};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(d: NaiveDate, city: &str, age: &str, sex: &str) -> CaseRecord {
        CaseRecord {
            reported_date: d,
            city: city.to_string(),
            age_bucket: AgeBucket::from_age_field(age),
            sex: Sex::from_raw(sex),
        }
    }

    fn sample() -> Dataset {
        Dataset::new(vec![
            record(date(2020, 3, 1), "Fort Collins", "34", "M"),
            record(date(2020, 3, 1), "Fort Collins", "70", "F"),
            record(date(2020, 3, 1), "Loveland", "51", "F"),
            // 3/2 has no rows at all.
            record(date(2020, 3, 3), "Loveland", "x", "F"),
            record(date(2020, 3, 4), "Fort Collins", "22", "M"),
        ])
    }

    #[test]
    fn daily_counts_gap_fill() {
        let daily = daily_counts(&sample());
        let dates: Vec<NaiveDate> = daily.iter().map(|d| d.date).collect();
        assert_eq!(
            dates,
            vec![
                date(2020, 3, 1),
                date(2020, 3, 2),
                date(2020, 3, 3),
                date(2020, 3, 4)
            ]
        );
        let counts: Vec<u64> = daily.iter().map(|d| d.count).collect();
        assert_eq!(counts, vec![3, 0, 1, 1]);

        // Gap-filling only adds zeros; days with rows are untouched.
        let nonzero: Vec<NaiveDate> = daily
            .iter()
            .filter(|d| d.count > 0)
            .map(|d| d.date)
            .collect();
        assert_eq!(
            nonzero,
            vec![date(2020, 3, 1), date(2020, 3, 3), date(2020, 3, 4)]
        );
    }

    #[test]
    fn cumulative_matches_daily_prefix_sums() {
        let cumulative = cumulative_daily(&sample());
        assert_eq!(cumulative[0].cumulative, cumulative[0].count);
        for i in 1..cumulative.len() {
            assert_eq!(
                cumulative[i].cumulative,
                cumulative[i - 1].cumulative + cumulative[i].count
            );
            assert!(cumulative[i].cumulative >= cumulative[i - 1].cumulative);
        }
        assert_eq!(cumulative.last().unwrap().cumulative, 5);
    }

    #[test]
    fn single_day_dataset_is_trivial() {
        let ds = Dataset::new(vec![
            record(date(2020, 3, 1), "Fort Collins", "34", "M"),
            record(date(2020, 3, 1), "Fort Collins", "70", "F"),
        ]);
        let daily = daily_counts(&ds);
        assert_eq!(daily.len(), 1);
        assert_eq!(daily[0].count, 2);

        let cumulative = cumulative_daily(&ds);
        assert_eq!(cumulative.len(), 1);
        assert_eq!(cumulative[0].cumulative, 2);
    }

    #[test]
    fn per_city_series_sum_to_county_series() {
        let ds = sample();
        let cities = ds.cities();
        let per_city = daily_by_city(&ds, &cities);
        let county = daily_counts(&ds);

        for day in &county {
            let sum: u64 = per_city
                .iter()
                .filter(|row| row.date == day.date)
                .map(|row| row.count)
                .sum();
            assert_eq!(sum, day.count, "mismatch on {}", day.date);
        }
    }

    #[test]
    fn per_city_series_span_full_range() {
        let ds = sample();
        let cities = ds.cities();
        let per_city = daily_by_city(&ds, &cities);
        // 2 cities x 4 days.
        assert_eq!(per_city.len(), 8);

        // Ordered (city, date) ascending.
        let mut sorted = per_city.clone();
        sorted.sort_by(|a, b| a.city.cmp(&b.city).then(a.date.cmp(&b.date)));
        assert_eq!(per_city, sorted);
    }

    #[test]
    fn filter_set_city_without_rows_emits_zero_series() {
        let ds = sample();
        let cities = vec!["Berthoud".to_string(), "Loveland".to_string()];
        let per_city = daily_by_city(&ds, &cities);

        let berthoud: Vec<&CityDailyCount> =
            per_city.iter().filter(|r| r.city == "Berthoud").collect();
        // The range comes from Loveland's rows (3/1 to 3/3).
        assert_eq!(berthoud.len(), 3);
        assert!(berthoud.iter().all(|r| r.count == 0));
    }

    #[test]
    fn unknown_filter_city_alone_yields_empty_views() {
        let ds = sample();
        let cities = vec!["Berthoud".to_string()];
        assert!(daily_by_city(&ds, &cities).is_empty());
        assert!(cumulative_by_city(&ds, &cities).is_empty());
        let hist = histogram_by_city(&ds, &cities, CategoryField::Sex, Some(&SEX_ORDER));
        assert!(hist.iter().all(|bin| bin.count == 0));
    }

    #[test]
    fn cumulative_by_city_resets_per_city() {
        let ds = sample();
        let cities = ds.cities();
        let rows = cumulative_by_city(&ds, &cities);

        let fc: Vec<&CityCumulativeCount> =
            rows.iter().filter(|r| r.city == "Fort Collins").collect();
        assert_eq!(fc.last().unwrap().cumulative, 3);

        let loveland: Vec<&CityCumulativeCount> =
            rows.iter().filter(|r| r.city == "Loveland").collect();
        assert_eq!(loveland[0].cumulative, 1);
        assert_eq!(loveland.last().unwrap().cumulative, 2);
    }

    #[test]
    fn sex_histogram_gap_fills_reference() {
        let ds = Dataset::new(vec![
            record(date(2020, 3, 1), "Loveland", "51", "F"),
            record(date(2020, 3, 2), "Loveland", "60", "F"),
        ]);
        let bins = histogram(&ds, CategoryField::Sex, Some(&SEX_ORDER));
        assert_eq!(
            bins,
            vec![
                CategoryCount {
                    category: "Female".to_string(),
                    count: 2
                },
                CategoryCount {
                    category: "Male".to_string(),
                    count: 0
                },
            ]
        );
    }

    #[test]
    fn age_histogram_follows_reference_order_with_na_last() {
        let bins = histogram(&sample(), CategoryField::Age, Some(&AGE_BUCKET_ORDER));
        let labels: Vec<&str> = bins.iter().map(|b| b.category.as_str()).collect();
        assert_eq!(labels, AGE_BUCKET_ORDER.to_vec());

        let by_label: std::collections::HashMap<&str, u64> =
            bins.iter().map(|b| (b.category.as_str(), b.count)).collect();
        assert_eq!(by_label["30s"], 1);
        assert_eq!(by_label["50s"], 1);
        assert_eq!(by_label["NA"], 1);
        assert_eq!(by_label["90s"], 0);
    }

    #[test]
    fn histogram_without_reference_sorts_ascending() {
        let bins = histogram(&sample(), CategoryField::City, None);
        let labels: Vec<&str> = bins.iter().map(|b| b.category.as_str()).collect();
        assert_eq!(labels, vec!["Fort Collins", "Loveland"]);
    }

    #[test]
    fn unrecognized_sex_values_still_appear_after_reference() {
        let ds = Dataset::new(vec![
            record(date(2020, 3, 1), "Loveland", "51", "F"),
            record(date(2020, 3, 1), "Loveland", "62", "Unknown"),
        ]);
        let bins = histogram(&ds, CategoryField::Sex, Some(&SEX_ORDER));
        let labels: Vec<&str> = bins.iter().map(|b| b.category.as_str()).collect();
        assert_eq!(labels, vec!["Female", "Male", "Unknown"]);
    }

    #[test]
    fn top_cities_descending_with_name_tiebreak() {
        let ds = sample();
        let totals = top_cities(&ds);
        assert_eq!(
            totals,
            vec![
                CityTotal {
                    city: "Fort Collins".to_string(),
                    count: 3
                },
                CityTotal {
                    city: "Loveland".to_string(),
                    count: 2
                },
            ]
        );
    }

    #[test]
    fn top_cities_excludes_unknown() {
        let ds = Dataset::new(vec![
            record(date(2020, 3, 1), "", "34", "M"),
            record(date(2020, 3, 1), "Loveland", "51", "F"),
        ]);
        let totals = top_cities(&ds);
        assert_eq!(totals.len(), 1);
        assert_eq!(totals[0].city, "Loveland");
    }

    #[test]
    fn moving_average_window_edges() {
        let daily: Vec<DailyCount> = (0..9)
            .map(|i| DailyCount {
                date: date(2020, 3, 1 + i as u32),
                count: (i + 1) as u64,
            })
            .collect();
        let ma = moving_average(&daily, MOVING_AVERAGE_WINDOW);

        for point in &ma[..6] {
            assert_eq!(point.average, None);
        }
        // Days 1..=7 average to 4, days 2..=8 to 5, days 3..=9 to 6.
        assert_eq!(ma[6].average, Some(4.0));
        assert_eq!(ma[7].average, Some(5.0));
        assert_eq!(ma[8].average, Some(6.0));
    }

    #[test]
    fn moving_average_of_empty_series_is_empty() {
        assert!(moving_average(&[], MOVING_AVERAGE_WINDOW).is_empty());
    }
}
