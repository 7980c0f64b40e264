use crate::{
    byte_size::ByteSize,
    store::{SnapshotStore, StoredSnapshot},
};

/// What a client that trusts relays seen in the last `keep` consensuses
/// knows at one point in time. Both vectors are sorted and unique.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EffectiveWindowSet {
    pub identities: Vec<u32>,
    pub digests: Vec<u32>,
}

impl EffectiveWindowSet {
    #[inline]
    pub fn len(&self) -> usize {
        self.identities.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    #[inline]
    pub fn contains_identity(&self, id: u32) -> bool {
        self.identities.binary_search(&id).is_ok()
    }

    pub fn is_superset_of(&self, other: &EffectiveWindowSet) -> bool {
        is_subset(&other.identities, &self.identities) && is_subset(&other.digests, &self.digests)
    }
}

/// Union of the consensuses `[index - keep, index]`, clamped at the first one.
///
/// Recomputes from scratch; [`WindowSets`] is the incremental form.
pub fn effective_set(
    snapshots: &[StoredSnapshot],
    index: usize,
    keep: usize,
) -> EffectiveWindowSet {
    let window = &snapshots[index.saturating_sub(keep)..=index];
    EffectiveWindowSet {
        identities: sorted_unique(window.iter().flat_map(|s| s.identities())),
        digests: sorted_unique(window.iter().flat_map(|s| s.digests())),
    }
}

/// Yields the effective set of every consensus in order, for one `keep`.
///
/// Keeps a per-symbol count of how many consensuses in the window list it,
/// so each step only touches the consensus entering and the one leaving.
pub struct WindowSets<'a> {
    snapshots: &'a [StoredSnapshot],
    keep: usize,
    next: usize,
    identities: RollingUnion,
    digests: RollingUnion,
}

impl<'a> WindowSets<'a> {
    pub fn new(store: &'a SnapshotStore, keep: usize) -> Self {
        Self {
            snapshots: store.snapshots(),
            keep,
            next: 0,
            identities: RollingUnion::new(store.identity_count()),
            digests: RollingUnion::new(store.digest_count()),
        }
    }
}

impl Iterator for WindowSets<'_> {
    type Item = EffectiveWindowSet;

    fn next(&mut self) -> Option<Self::Item> {
        let snapshots = self.snapshots;
        let entering = snapshots.get(self.next)?;
        let leaving = self.next.checked_sub(self.keep.saturating_add(1)).map(|i| &snapshots[i]);

        self.identities
            .step(entering.identities(), leaving.into_iter().flat_map(|s| s.identities()));
        self.digests
            .step(entering.digests(), leaving.into_iter().flat_map(|s| s.digests()));
        self.next += 1;

        Some(EffectiveWindowSet {
            identities: self.identities.live.clone(),
            digests: self.digests.live.clone(),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.snapshots.len() - self.next;
        (n, Some(n))
    }
}

struct RollingUnion {
    counts: Vec<u32>,
    live: Vec<u32>,
    born: Vec<u32>,
    died: Vec<u32>,
}

impl RollingUnion {
    fn new(symbols: usize) -> Self {
        Self {
            counts: vec![0; symbols],
            live: Vec::new(),
            born: Vec::new(),
            died: Vec::new(),
        }
    }

    fn step(&mut self, add: impl Iterator<Item = u32>, remove: impl Iterator<Item = u32>) {
        self.born.clear();
        self.died.clear();
        for id in add {
            let c = &mut self.counts[id as usize];
            if *c == 0 {
                self.born.push(id);
            }
            *c += 1;
        }
        for id in remove {
            let c = &mut self.counts[id as usize];
            *c -= 1;
            if *c == 0 {
                self.died.push(id);
            }
        }
        if self.born.is_empty() && self.died.is_empty() {
            return;
        }
        self.born.sort_unstable();
        self.died.sort_unstable();
        self.live = merge_step(&self.live, &self.born, &self.died);
    }
}

/// `(live \ died) ∪ born` for sorted inputs; `born` is disjoint from `live`.
fn merge_step(live: &[u32], born: &[u32], died: &[u32]) -> Vec<u32> {
    let mut out = Vec::with_capacity(live.len() + born.len() - died.len().min(live.len()));
    let mut d = died.iter().peekable();
    let mut b = born.iter().peekable();
    for &id in live {
        if d.next_if_eq(&&id).is_some() {
            continue;
        }
        while let Some(&&n) = b.peek() {
            if n >= id {
                break;
            }
            out.push(n);
            b.next();
        }
        out.push(id);
    }
    out.extend(b);
    out
}

fn sorted_unique(ids: impl Iterator<Item = u32>) -> Vec<u32> {
    let mut v: Vec<u32> = ids.collect();
    v.sort_unstable();
    v.dedup();
    v
}

/// Both slices sorted and unique.
fn is_subset(small: &[u32], big: &[u32]) -> bool {
    let mut it = big.iter();
    small.iter().all(|x| it.any(|y| y == x))
}

/// Mean effective consensus size: `Σ|set| · mean_entry_size / snapshot_count`.
pub fn mean_consensus_size(
    total_effective_entries: u64,
    mean_entry_size: ByteSize,
    snapshot_count: usize,
) -> ByteSize {
    if snapshot_count == 0 {
        return ByteSize(0.0);
    }
    ByteSize(total_effective_entries as f64 * (mean_entry_size.0 / snapshot_count as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::hourly_store;

    fn ids(store: &SnapshotStore, set: &EffectiveWindowSet) -> Vec<String> {
        let mut names: Vec<String> = ["A", "B", "C", "D", "E"]
            .iter()
            .filter(|n| store.identity_id(n).is_some_and(|id| set.contains_identity(id)))
            .map(|n| n.to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_effective_set_unions_trailing_window() {
        let mut store = hourly_store(&[&["A", "B"], &["A"], &["A", "C"], &["D"]], 100);
        store.finalize().unwrap();
        let snaps = store.snapshots();

        assert_eq!(ids(&store, &effective_set(snaps, 1, 0)), ["A"]);
        assert_eq!(ids(&store, &effective_set(snaps, 1, 1)), ["A", "B"]);
        assert_eq!(ids(&store, &effective_set(snaps, 3, 1)), ["A", "C", "D"]);
        // clamped at the first consensus
        assert_eq!(ids(&store, &effective_set(snaps, 1, 12)), ["A", "B"]);
        assert_eq!(ids(&store, &effective_set(snaps, 3, 3)), ["A", "B", "C", "D"]);
    }

    #[test]
    fn test_effective_set_grows_with_keep() {
        let sets: &[&[&str]] = &[&["A", "B"], &["C"], &["A", "D"], &["E"], &["B"], &["C", "E"]];
        let mut store = hourly_store(sets, 100);
        store.finalize().unwrap();
        let snaps = store.snapshots();
        for i in 0..snaps.len() {
            for k1 in 0..8 {
                for k2 in k1 + 1..=8 {
                    let small = effective_set(snaps, i, k1);
                    let big = effective_set(snaps, i, k2);
                    assert!(big.is_superset_of(&small), "i={i} k1={k1} k2={k2}");
                }
            }
        }
    }

    #[test]
    fn test_rolling_matches_recomputation() {
        let sets: &[&[&str]] = &[
            &["A", "B"],
            &["A"],
            &["A", "C"],
            &[],
            &["D", "E", "B"],
            &["A", "E"],
            &["C"],
        ];
        let mut store = hourly_store(sets, 100);
        store.finalize().unwrap();
        for keep in 0..=sets.len() + 1 {
            let rolled: Vec<_> = WindowSets::new(&store, keep).collect();
            assert_eq!(rolled.len(), sets.len());
            for (i, set) in rolled.iter().enumerate() {
                assert_eq!(set, &effective_set(store.snapshots(), i, keep), "i={i} keep={keep}");
            }
        }
    }

    #[test]
    fn test_unbounded_keep_covers_everything_seen() {
        let sets: &[&[&str]] = &[&["A", "B"], &["C"], &["D"]];
        let mut store = hourly_store(sets, 100);
        store.finalize().unwrap();
        let rolled: Vec<_> = WindowSets::new(&store, usize::MAX).collect();
        assert_eq!(rolled.len(), 3);
        assert_eq!(ids(&store, &rolled[2]), ["A", "B", "C", "D"]);
        assert_eq!(rolled[2], effective_set(store.snapshots(), 2, usize::MAX));
    }

    #[test]
    fn test_merge_step() {
        assert_eq!(merge_step(&[1, 3, 5], &[0, 4, 9], &[3]), [0, 1, 4, 5, 9]);
        assert_eq!(merge_step(&[], &[2, 7], &[]), [2, 7]);
        assert_eq!(merge_step(&[2, 7], &[], &[2, 7]), Vec::<u32>::new());
    }

    #[test]
    fn test_mean_consensus_size() {
        assert_eq!(mean_consensus_size(6, ByteSize(100.0), 3), ByteSize(200.0));
        assert_eq!(mean_consensus_size(6, ByteSize(100.0), 0), ByteSize(0.0));
    }
}
