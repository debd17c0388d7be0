//! External data collaborators.
//!
//! - upstream HTTP fetch + per-feed adapters (`fetch`)
//! - filesystem TTL cache over raw feed bytes (`cache`)

pub mod cache;
pub mod fetch;

pub use cache::*;
pub use fetch::*;
