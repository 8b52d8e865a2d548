//! Core types and the rollup engine of the election results updater.
//!
//! Vote counts are entered per ballot box. A pass recomputes every quarter
//! from its boxes, every district from its quarters, every constituency
//! from its districts and every city from its constituencies, writing each
//! level back through a [`GeoDataPort`] before the next one reads it.

/// Per-level recomputation and the bottom-up pass.
pub mod aggregator;
/// The parent/child relations the pass walks through.
pub mod level;
/// Records exchanged with the data service.
pub mod model;
/// Trait describing the data service.
pub mod ports;
/// Loop that runs passes on a fixed interval.
pub mod scheduler;
/// Summing children into a parent.
pub mod tally;

#[cfg(test)]
mod fake;

pub use aggregator::*;
pub use level::*;
pub use model::*;
pub use ports::*;
pub use scheduler::*;
pub use tally::*;
