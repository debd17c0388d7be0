//! Runtime configuration, resolved from environment variables.
//!
//! Everything here has a hardcoded default so `cvd` runs with no setup. A
//! `.env` file (or real environment variables) overrides the defaults; the
//! upstream feed URLs in particular are per-feed adapter configuration, not
//! code.

use std::path::PathBuf;

use chrono::Datelike;

use crate::data::fetch::{Feed, FeedFormat};
use crate::domain::FeedKind;
use crate::error::AppError;

const DEFAULT_CASES_URL: &str =
    "https://www.larimer.org/health/communicable-disease/coronavirus-covid-19/larimer-county-positive-covid-19-numbers";
const DEFAULT_DEATHS_URL: &str =
    "https://www.larimer.org/health/communicable-disease/coronavirus-covid-19/larimer-county-covid-19-deaths";

/// Raw bytes are served from cache until this many seconds old.
const DEFAULT_CACHE_TTL_SECS: u64 = 13 * 60;

/// How often the TUI re-runs the pipeline. The cache TTL gates whether a
/// recompute actually hits the network.
const DEFAULT_UPDATE_INTERVAL_SECS: u64 = 15 * 60;

/// Resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct DashConfig {
    pub cases_url: String,
    pub deaths_url: String,
    /// Explicit feed formats; `None` means sniff CSV vs HTML from the bytes.
    pub cases_format: Option<FeedFormat>,
    pub deaths_format: Option<FeedFormat>,
    pub cache_dir: PathBuf,
    pub cache_ttl_secs: u64,
    pub update_interval_secs: u64,
    /// Year assumed when an upstream date arrives without one.
    pub reporting_year: i32,
}

impl DashConfig {
    /// Load configuration from the environment (and `.env`, if present).
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let cases_url = env_str("COVID_CASES_URL", DEFAULT_CASES_URL);
        let deaths_url = env_str("COVID_DEATHS_URL", DEFAULT_DEATHS_URL);
        let cases_format = env_format("COVID_CASES_FORMAT")?;
        let deaths_format = env_format("COVID_DEATHS_FORMAT")?;

        let cache_dir = std::env::var("CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| std::env::temp_dir().join("covid-dash-cache"));

        let cache_ttl_secs = env_u64("CACHE_TTL_SECS", DEFAULT_CACHE_TTL_SECS)?;
        let update_interval_secs =
            env_u64("UPDATE_INTERVAL_SECS", DEFAULT_UPDATE_INTERVAL_SECS)?;

        let reporting_year = match std::env::var("REPORTING_YEAR") {
            Ok(raw) => raw.trim().parse::<i32>().map_err(|e| {
                AppError::schema(format!("Invalid REPORTING_YEAR '{raw}': {e}"))
            })?,
            Err(_) => chrono::Local::now().year(),
        };

        Ok(Self {
            cases_url,
            deaths_url,
            cases_format,
            deaths_format,
            cache_dir,
            cache_ttl_secs,
            update_interval_secs,
            reporting_year,
        })
    }

    /// Feed adapter for the requested dataset.
    pub fn feed(&self, kind: FeedKind) -> Feed {
        match kind {
            FeedKind::Cases => Feed {
                key: FeedKind::Cases.cache_key(),
                url: self.cases_url.clone(),
                format: self.cases_format,
            },
            FeedKind::Deaths => Feed {
                key: FeedKind::Deaths.cache_key(),
                url: self.deaths_url.clone(),
                format: self.deaths_format,
            },
        }
    }
}

fn env_str(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_u64(name: &str, default: u64) -> Result<u64, AppError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|e| AppError::schema(format!("Invalid {name} '{raw}': {e}"))),
        Err(_) => Ok(default),
    }
}

fn env_format(name: &str) -> Result<Option<FeedFormat>, AppError> {
    match std::env::var(name) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Ok(None),
            "csv" => Ok(Some(FeedFormat::Csv)),
            "html" => Ok(Some(FeedFormat::HtmlTable)),
            other => Err(AppError::schema(format!(
                "Invalid {name} '{other}': expected one of auto, csv, html."
            ))),
        },
        Err(_) => Ok(None),
    }
}
