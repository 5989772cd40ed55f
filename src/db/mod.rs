//! Embedded relational store: targets, raw probe results, and the
//! time-window views statistics are derived from.

mod models;
mod store;

pub use models::*;
pub use store::*;
