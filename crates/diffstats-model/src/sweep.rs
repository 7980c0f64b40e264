use std::{collections::VecDeque, time::Instant};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::{
    byte_size::ByteSize,
    estimator::{CellAccumulator, CellEstimate, CostModel, UnitSizes, compare},
    store::{DatasetSummary, SnapshotStore},
    window::{EffectiveWindowSet, WindowSets, mean_consensus_size},
};

pub const MAX_KEEP: usize = 12;
pub const MAX_INTERVAL: usize = 12;
/// Upper bound accepted for either sweep dimension: 30 days of hourly
/// consensuses. One effective set is held per interval.
pub const HOURS_LIMIT: usize = 24 * 30;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SweepConfig {
    /// Largest retention depth `K`; the sweep covers `0..=max_keep`.
    pub max_keep: usize,
    /// Largest comparison interval `I`; the sweep covers `1..=max_interval`.
    pub max_interval: usize,
    pub cost: CostModel,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            max_keep: MAX_KEEP,
            max_interval: MAX_INTERVAL,
            cost: CostModel::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellReport {
    pub interval: usize,
    /// `None` when no two consensuses are `interval` apart.
    pub estimate: Option<CellEstimate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeepReport {
    pub keep: usize,
    pub mean_consensus_size: ByteSize,
    pub cells: Vec<CellReport>,
}

impl From<&DatasetSummary> for UnitSizes {
    fn from(summary: &DatasetSummary) -> Self {
        UnitSizes {
            entry: summary.mean_entry_size,
            aux: summary.mean_aux_size,
        }
    }
}

/// Runs every interval for one retention depth in a single pass.
///
/// Only the last `max_interval` effective sets are held, in a ring.
pub fn sweep_keep(
    store: &SnapshotStore,
    summary: &DatasetSummary,
    keep: usize,
    config: &SweepConfig,
) -> KeepReport {
    let start = Instant::now();
    let max_interval = config.max_interval;
    let mut ring: VecDeque<EffectiveWindowSet> = VecDeque::with_capacity(max_interval);
    let mut cells = vec![CellAccumulator::default(); max_interval];
    let mut total_effective = 0u64;

    for set in WindowSets::new(store, keep) {
        total_effective += set.len() as u64;
        for interval in 1..=max_interval.min(ring.len()) {
            cells[interval - 1].add(compare(&ring[ring.len() - interval], &set));
        }
        if max_interval == 0 {
            continue;
        }
        if ring.len() == max_interval {
            ring.pop_front();
        }
        ring.push_back(set);
    }

    let sizes = UnitSizes::from(summary);
    let cells = cells
        .iter()
        .enumerate()
        .map(|(i, acc)| CellReport {
            interval: i + 1,
            estimate: acc.finish(keep, i + 1, sizes, config.cost),
        })
        .collect();

    debug!(
        keep,
        effective_entries = total_effective,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "sweep keep done"
    );
    KeepReport {
        keep,
        mean_consensus_size: mean_consensus_size(
            total_effective,
            summary.mean_entry_size,
            summary.snapshot_count,
        ),
        cells,
    }
}

/// Full `(K, I)` sweep; one rayon task per retention depth, results in `K`
/// order.
pub fn run_sweep(
    store: &SnapshotStore,
    summary: &DatasetSummary,
    config: &SweepConfig,
) -> Vec<KeepReport> {
    let start = Instant::now();
    let reports: Vec<KeepReport> = (0..=config.max_keep)
        .into_par_iter()
        .map(|keep| sweep_keep(store, summary, keep, config))
        .collect();
    info!(
        keeps = reports.len(),
        intervals = config.max_interval,
        elapsed_s = start.elapsed().as_secs_f64(),
        "sweep done"
    );
    reports
}
