//! Terminal plotting helpers.

pub mod ascii;

pub use ascii::*;
