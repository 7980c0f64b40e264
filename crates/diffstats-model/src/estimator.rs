use serde::Serialize;

use crate::{byte_size::ByteSize, window::EffectiveWindowSet};

/// Framing bytes added to every relay entry that appears in a diff.
pub const ADD_OVERHEAD: f64 = 3.0;
/// Bytes needed to tell a client to drop one relay.
pub const REMOVE_COST: f64 = 6.0;

/// Linear size model for consensus diffs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CostModel {
    pub add_overhead: f64,
    pub remove_cost: f64,
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            add_overhead: ADD_OVERHEAD,
            remove_cost: REMOVE_COST,
        }
    }
}

/// Mean sizes the estimator scales entry counts by.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitSizes {
    pub entry: ByteSize,
    pub aux: ByteSize,
}

/// What changed between two effective sets.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PairDelta {
    pub added: u64,
    pub removed: u64,
    pub new_digests: u64,
}

impl PairDelta {
    pub fn diff_bytes(&self, sizes: UnitSizes, cost: CostModel) -> f64 {
        self.added as f64 * (sizes.entry.0 + cost.add_overhead)
            + self.removed as f64 * cost.remove_cost
    }

    pub fn aux_bytes(&self, sizes: UnitSizes) -> f64 {
        self.new_digests as f64 * sizes.aux.0
    }
}

/// Compares the set a client held (`old`) with the one it needs (`new`).
pub fn compare(old: &EffectiveWindowSet, new: &EffectiveWindowSet) -> PairDelta {
    let (added, removed) = diff_counts(&old.identities, &new.identities);
    let (new_digests, _) = diff_counts(&old.digests, &new.digests);
    PairDelta {
        added,
        removed,
        new_digests,
    }
}

/// Counts of `new \ old` and `old \ new` for sorted, unique slices.
fn diff_counts(old: &[u32], new: &[u32]) -> (u64, u64) {
    let (mut i, mut j) = (0, 0);
    let (mut only_new, mut only_old) = (0u64, 0u64);
    while i < old.len() && j < new.len() {
        match old[i].cmp(&new[j]) {
            std::cmp::Ordering::Less => {
                only_old += 1;
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                only_new += 1;
                j += 1;
            }
            std::cmp::Ordering::Equal => {
                i += 1;
                j += 1;
            }
        }
    }
    only_old += (old.len() - i) as u64;
    only_new += (new.len() - j) as u64;
    (only_new, only_old)
}

/// Totals for one `(keep, interval)` cell.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CellAccumulator {
    pub pairs: u64,
    pub added: u64,
    pub removed: u64,
    pub new_digests: u64,
}

impl CellAccumulator {
    #[inline]
    pub fn add(&mut self, delta: PairDelta) {
        self.pairs += 1;
        self.added += delta.added;
        self.removed += delta.removed;
        self.new_digests += delta.new_digests;
    }

    /// Amortizes the totals over the compared pairs; `None` without pairs.
    pub fn finish(
        &self,
        keep: usize,
        interval: usize,
        sizes: UnitSizes,
        cost: CostModel,
    ) -> Option<CellEstimate> {
        if self.pairs == 0 {
            return None;
        }
        let total = PairDelta {
            added: self.added,
            removed: self.removed,
            new_digests: self.new_digests,
        };
        let pairs = self.pairs as f64;
        Some(CellEstimate {
            keep,
            interval,
            pairs: self.pairs,
            added: self.added,
            removed: self.removed,
            new_digests: self.new_digests,
            mean_diff_size: ByteSize(total.diff_bytes(sizes, cost) / pairs),
            mean_aux_refetch_size: ByteSize(total.aux_bytes(sizes) / pairs),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CellEstimate {
    pub keep: usize,
    pub interval: usize,
    pub pairs: u64,
    pub added: u64,
    pub removed: u64,
    pub new_digests: u64,
    pub mean_diff_size: ByteSize,
    pub mean_aux_refetch_size: ByteSize,
}

/// Estimates one cell from precomputed effective sets, comparing every
/// index `i >= interval` with `i - interval`.
pub fn estimate_cell(
    sets: &[EffectiveWindowSet],
    keep: usize,
    interval: usize,
    sizes: UnitSizes,
    cost: CostModel,
) -> Option<CellEstimate> {
    let mut acc = CellAccumulator::default();
    if interval > 0 {
        for i in interval..sets.len() {
            acc.add(compare(&sets[i - interval], &sets[i]));
        }
    }
    acc.finish(keep, interval, sizes, cost)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{fixtures::hourly_store, window::WindowSets};

    const SIZES: UnitSizes = UnitSizes {
        entry: ByteSize(100.0),
        aux: ByteSize(400.0),
    };

    fn set(ids: &[u32], digests: &[u32]) -> EffectiveWindowSet {
        EffectiveWindowSet {
            identities: ids.to_vec(),
            digests: digests.to_vec(),
        }
    }

    #[test]
    fn test_diff_counts() {
        assert_eq!(diff_counts(&[1, 2, 3], &[2, 3, 4, 5]), (2, 1));
        assert_eq!(diff_counts(&[], &[1]), (1, 0));
        assert_eq!(diff_counts(&[1], &[]), (0, 1));
        assert_eq!(diff_counts(&[1, 2], &[1, 2]), (0, 0));
    }

    #[test]
    fn test_identical_sets_cost_nothing() {
        let a = set(&[1, 2, 3], &[10, 11, 12]);
        let delta = compare(&a, &a.clone());
        assert_eq!(delta, PairDelta::default());
        assert_eq!(delta.diff_bytes(SIZES, CostModel::default()), 0.0);
        assert_eq!(delta.aux_bytes(SIZES), 0.0);

        let est = estimate_cell(&[a.clone(), a], 0, 1, SIZES, CostModel::default()).unwrap();
        assert_eq!(est.mean_diff_size, ByteSize(0.0));
        assert_eq!(est.mean_aux_refetch_size, ByteSize(0.0));
    }

    #[test]
    fn test_pair_costs() {
        let old = set(&[1, 2], &[10, 20]);
        let new = set(&[1, 3, 4], &[10, 30, 40]);
        let delta = compare(&old, &new);
        assert_eq!(
            delta,
            PairDelta {
                added: 2,
                removed: 1,
                new_digests: 2
            }
        );
        assert_eq!(delta.diff_bytes(SIZES, CostModel::default()), 2.0 * 103.0 + 6.0);
        assert_eq!(delta.aux_bytes(SIZES), 800.0);
    }

    #[test]
    fn test_changed_digest_without_relay_change() {
        let old = set(&[1], &[10]);
        let new = set(&[1], &[11]);
        let delta = compare(&old, &new);
        assert_eq!((delta.added, delta.removed, delta.new_digests), (0, 0, 1));
    }

    #[test]
    fn test_three_consensus_scenario() {
        // {A,B}, {A}, {A,C} at 100 bytes per entry
        let mut store = hourly_store(&[&["A", "B"], &["A"], &["A", "C"]], 100);
        let summary = store.finalize().unwrap();
        assert_eq!(summary.mean_entry_size, ByteSize(100.0));

        let sets: Vec<_> = WindowSets::new(&store, 0).collect();
        assert_eq!(
            compare(&sets[0], &sets[1]),
            PairDelta {
                added: 0,
                removed: 1,
                new_digests: 0
            }
        );
        assert_eq!(
            compare(&sets[1], &sets[2]),
            PairDelta {
                added: 1,
                removed: 0,
                new_digests: 1
            }
        );

        let sizes = UnitSizes {
            entry: summary.mean_entry_size,
            aux: ByteSize(50.0),
        };
        let est = estimate_cell(&sets, 0, 1, sizes, CostModel::default()).unwrap();
        assert_eq!(est.pairs, 2);
        assert_eq!((est.added, est.removed, est.new_digests), (1, 1, 1));
        assert_eq!(est.mean_diff_size, ByteSize((103.0 + 6.0) / 2.0));
        assert_eq!(est.mean_aux_refetch_size, ByteSize(50.0 / 2.0));
    }

    #[test]
    fn test_no_comparable_pairs() {
        let sets = vec![set(&[1], &[1]); 3];
        assert!(estimate_cell(&sets, 0, 3, SIZES, CostModel::default()).is_none());
        assert!(estimate_cell(&sets, 0, 0, SIZES, CostModel::default()).is_none());
        assert!(estimate_cell(&[], 0, 1, SIZES, CostModel::default()).is_none());
    }

    #[test]
    fn test_accumulator_totals() {
        let mut acc = CellAccumulator::default();
        acc.add(PairDelta {
            added: 1,
            removed: 2,
            new_digests: 3,
        });
        acc.add(PairDelta {
            added: 4,
            removed: 0,
            new_digests: 1,
        });
        assert_eq!(
            acc,
            CellAccumulator {
                pairs: 2,
                added: 5,
                removed: 2,
                new_digests: 4
            }
        );
    }
}
