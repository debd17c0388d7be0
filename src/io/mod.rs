//! Input/output helpers.
//!
//! - raw tabular decode from CSV bytes or an HTML `<table>` (`table`)
//! - normalization into typed datasets (`ingest`)
//! - aggregate view exports (CSV/JSON) (`export`)

pub mod export;
pub mod ingest;
pub mod table;

pub use export::*;
pub use ingest::*;
pub use table::*;
