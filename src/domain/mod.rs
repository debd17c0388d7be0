//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - normalized case/death records (`CaseRecord`, `Dataset`)
//! - categorical value types (`AgeBucket`, `Sex`)
//! - aggregate view rows (`DailyCount`, `CumulativeCount`, histograms, etc.)
//! - runtime configuration (`DashConfig`)

pub mod config;
pub mod types;

pub use config::*;
pub use types::*;
