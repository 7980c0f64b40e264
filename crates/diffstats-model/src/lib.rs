//! Consensus diff size model
//!
//! Holds ingested consensuses, derives the per-client effective relay sets
//! for a retention depth and estimates mean diff and microdescriptor
//! re-download sizes across a `(retention, interval)` grid.

pub mod byte_size;
pub mod estimator;
pub mod report;
pub mod store;
pub mod sweep;
pub mod symbols;
pub mod window;

#[cfg(test)]
mod fixtures;

pub use byte_size::ByteSize;
pub use estimator::{CellEstimate, CostModel, PairDelta, UnitSizes};
pub use report::Report;
pub use store::{DatasetSummary, SnapshotStore, SpacingHistogram, StoredSnapshot};
pub use sweep::{CellReport, KeepReport, SweepConfig, run_sweep, sweep_keep};
pub use window::{EffectiveWindowSet, WindowSets, effective_set};
