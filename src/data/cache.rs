//! Filesystem TTL cache over raw feed bytes.
//!
//! The cache owns the refresh policy so the pipeline never has to: callers
//! ask for `fetch(key, refresh)` and get bytes back, whether they came from
//! disk or from the refresh closure.
//!
//! Policy:
//! - bytes younger than the TTL are served from disk without calling refresh
//! - expired (or missing) bytes trigger the refresh closure; its output is
//!   written back before being returned
//! - if refresh fails and a stale file exists, the stale bytes are served
//!   instead of the error (stale-while-error)
//!
//! The process is single-threaded, so at-most-one refresh per key holds
//! without locking.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::AppError;

pub struct FileCache {
    dir: PathBuf,
    ttl: Duration,
}

/// Where a cache result came from, for status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Fresh,
    Refreshed,
    StaleServed,
}

impl FileCache {
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            dir: dir.into(),
            ttl,
        }
    }

    /// Fetch bytes for `key`, refreshing through `refresh` when expired.
    pub fn fetch<F>(&self, key: &str, refresh: F) -> Result<(Vec<u8>, CacheStatus), AppError>
    where
        F: FnOnce() -> Result<Vec<u8>, AppError>,
    {
        let path = self.entry_path(key);

        if self.is_fresh(&path) {
            let bytes = fs::read(&path).map_err(|e| {
                AppError::fetch(format!("Failed to read cache '{}': {e}", path.display()))
            })?;
            return Ok((bytes, CacheStatus::Fresh));
        }

        match refresh() {
            Ok(bytes) => {
                self.store(&path, &bytes)?;
                Ok((bytes, CacheStatus::Refreshed))
            }
            Err(err) => {
                // Refresh failed; a stale copy is better than nothing.
                if path.exists() {
                    let bytes = fs::read(&path).map_err(|e| {
                        AppError::fetch(format!(
                            "Failed to read stale cache '{}': {e}",
                            path.display()
                        ))
                    })?;
                    return Ok((bytes, CacheStatus::StaleServed));
                }
                Err(err)
            }
        }
    }

    /// Remove every entry (used by tests and the TUI's force refresh).
    pub fn clear(&self) -> Result<(), AppError> {
        if self.dir.exists() {
            fs::remove_dir_all(&self.dir).map_err(|e| {
                AppError::fetch(format!("Failed to clear cache '{}': {e}", self.dir.display()))
            })?;
        }
        Ok(())
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        // Keys come from feed adapters; sanitize anyway so a configured key
        // can never escape the cache dir.
        let safe: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{safe}.cache"))
    }

    fn is_fresh(&self, path: &Path) -> bool {
        let Ok(meta) = fs::metadata(path) else {
            return false;
        };
        let Ok(modified) = meta.modified() else {
            return false;
        };
        match modified.elapsed() {
            Ok(age) => age < self.ttl,
            // Clock skew puts the mtime in the future; treat as expired.
            Err(_) => false,
        }
    }

    fn store(&self, path: &Path, bytes: &[u8]) -> Result<(), AppError> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            AppError::fetch(format!(
                "Failed to create cache dir '{}': {e}",
                self.dir.display()
            ))
        })?;
        fs::write(path, bytes).map_err(|e| {
            AppError::fetch(format!("Failed to write cache '{}': {e}", path.display()))
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_cache(name: &str, ttl: Duration) -> FileCache {
        let dir = std::env::temp_dir().join(format!("covid-dash-test-{name}-{}", std::process::id()));
        let cache = FileCache::new(dir, ttl);
        let _ = cache.clear();
        cache
    }

    #[test]
    fn refresh_then_fresh_hit() {
        let cache = temp_cache("fresh", Duration::from_secs(3600));

        let (bytes, status) = cache.fetch("cases", || Ok(b"abc".to_vec())).unwrap();
        assert_eq!(bytes, b"abc");
        assert_eq!(status, CacheStatus::Refreshed);

        // Second fetch must not call the closure.
        let (bytes, status) = cache
            .fetch("cases", || {
                panic!("refresh called while cache entry was fresh")
            })
            .unwrap();
        assert_eq!(bytes, b"abc");
        assert_eq!(status, CacheStatus::Fresh);

        cache.clear().unwrap();
    }

    #[test]
    fn zero_ttl_always_refreshes() {
        let cache = temp_cache("expired", Duration::from_secs(0));

        let (bytes, _) = cache.fetch("cases", || Ok(b"one".to_vec())).unwrap();
        assert_eq!(bytes, b"one");
        let (bytes, status) = cache.fetch("cases", || Ok(b"two".to_vec())).unwrap();
        assert_eq!(bytes, b"two");
        assert_eq!(status, CacheStatus::Refreshed);

        cache.clear().unwrap();
    }

    #[test]
    fn stale_bytes_served_when_refresh_fails() {
        let cache = temp_cache("stale", Duration::from_secs(0));

        cache.fetch("cases", || Ok(b"old".to_vec())).unwrap();
        let (bytes, status) = cache
            .fetch("cases", || Err(AppError::fetch("upstream down")))
            .unwrap();
        assert_eq!(bytes, b"old");
        assert_eq!(status, CacheStatus::StaleServed);

        cache.clear().unwrap();
    }

    #[test]
    fn refresh_failure_without_stale_copy_propagates() {
        let cache = temp_cache("nofile", Duration::from_secs(60));

        let err = cache
            .fetch("cases", || Err(AppError::fetch("upstream down")))
            .unwrap_err();
        assert_eq!(err.exit_code(), 4);

        cache.clear().unwrap();
    }
}
