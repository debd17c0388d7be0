//! Upstream feed fetching.
//!
//! Each feed is described by a small adapter (`Feed`) naming its URL and wire
//! format; the client itself is format-agnostic and just returns bytes. Feed
//! quirks (exact URL, CSV vs HTML table) live in configuration, not code.

use std::time::Duration;

use reqwest::blocking::Client;

use crate::error::AppError;

const USER_AGENT: &str = concat!("covid-dash/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Wire format of a feed's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedFormat {
    Csv,
    HtmlTable,
}

impl FeedFormat {
    /// Guess the format from the payload itself.
    ///
    /// The county page is an HTML document; the alternate exports are plain
    /// CSV. Anything starting with a `<` after leading whitespace is treated
    /// as HTML.
    pub fn sniff(bytes: &[u8]) -> FeedFormat {
        let head = bytes.iter().copied().find(|b| !b.is_ascii_whitespace());
        match head {
            Some(b'<') => FeedFormat::HtmlTable,
            _ => FeedFormat::Csv,
        }
    }
}

/// One upstream feed: cache key, URL, and (optionally) a pinned format.
#[derive(Debug, Clone)]
pub struct Feed {
    pub key: &'static str,
    pub url: String,
    /// `None` means sniff the format from the fetched bytes.
    pub format: Option<FeedFormat>,
}

/// Blocking HTTP client for feed downloads.
pub struct FeedClient {
    client: Client,
}

impl FeedClient {
    pub fn new() -> Result<Self, AppError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AppError::fetch(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Download a feed's raw bytes.
    ///
    /// Transport errors and non-success statuses both surface as fetch errors;
    /// the caller decides whether to fall back to cached bytes.
    pub fn fetch_bytes(&self, feed: &Feed) -> Result<Vec<u8>, AppError> {
        let resp = self
            .client
            .get(&feed.url)
            .send()
            .map_err(|e| AppError::fetch(format!("Fetch of {} feed failed: {e}", feed.key)))?;

        if !resp.status().is_success() {
            return Err(AppError::fetch(format!(
                "Fetch of {} feed failed with status {}.",
                feed.key,
                resp.status()
            )));
        }

        let bytes = resp
            .bytes()
            .map_err(|e| AppError::fetch(format!("Failed to read {} feed body: {e}", feed.key)))?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniff_detects_html_and_csv() {
        assert_eq!(
            FeedFormat::sniff(b"  \n<!DOCTYPE html><table>"),
            FeedFormat::HtmlTable
        );
        assert_eq!(FeedFormat::sniff(b"city,reported_date\n"), FeedFormat::Csv);
        assert_eq!(FeedFormat::sniff(b""), FeedFormat::Csv);
    }
}
