use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use consensus_reader::{ArchiveItem, AuxDescriptorBatch, Snapshot};
use serde::Serialize;
use tracing::{debug, warn};

use crate::{byte_size::ByteSize, symbols::SymbolTable};

/// A consensus as kept by the store: identities and hashes interned, in
/// document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSnapshot {
    pub time: NaiveDateTime,
    pub byte_size: u64,
    /// `(identity, hash)` symbol pairs
    pub entries: Vec<(u32, u32)>,
}

impl StoredSnapshot {
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn identities(&self) -> impl Iterator<Item = u32> + '_ {
        self.entries.iter().map(|&(id, _)| id)
    }

    #[inline]
    pub fn digests(&self) -> impl Iterator<Item = u32> + '_ {
        self.entries.iter().map(|&(_, h)| h)
    }
}

/// Hour gaps between consecutive consensuses and how often each occurs.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SpacingHistogram {
    pub buckets: BTreeMap<i64, u64>,
}

impl SpacingHistogram {
    pub fn from_times<'a>(times: impl IntoIterator<Item = &'a NaiveDateTime>) -> Self {
        let mut hist = SpacingHistogram::default();
        let mut prev: Option<&NaiveDateTime> = None;
        for t in times {
            if let Some(p) = prev {
                *hist.buckets.entry((*t - *p).num_hours()).or_default() += 1;
            }
            prev = Some(t);
        }
        hist
    }

    /// True when every gap is exactly one hour (or there are no gaps).
    pub fn is_hourly(&self) -> bool {
        self.buckets.keys().all(|&h| h == 1)
    }
}

/// Dataset-wide figures, available once the store has been finalized.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetSummary {
    pub snapshot_count: usize,
    pub total_bytes: u64,
    pub total_entries: u64,
    pub mean_entry_size: ByteSize,
    pub aux_count: u64,
    pub aux_total_bytes: u64,
    pub mean_aux_size: ByteSize,
    pub first: NaiveDateTime,
    pub last: NaiveDateTime,
    pub spacing: SpacingHistogram,
}

/// Every consensus ingested during a run plus the microdescriptor tally.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    snapshots: Vec<StoredSnapshot>,
    identities: SymbolTable,
    digests: SymbolTable,
    aux: AuxDescriptorBatch,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, snapshot: Snapshot) {
        let entries = snapshot
            .entries
            .iter()
            .map(|e| (self.identities.intern(&e.identity), self.digests.intern(&e.digest)))
            .collect();
        self.snapshots.push(StoredSnapshot {
            time: snapshot.time,
            byte_size: snapshot.byte_size,
            entries,
        });
    }

    #[inline]
    pub fn add_aux(&mut self, bytes: u64) {
        self.aux.add(bytes);
    }

    /// Routes one archive item; returns true if it was a consensus.
    pub fn ingest(&mut self, item: ArchiveItem) -> bool {
        match item {
            ArchiveItem::Snapshot(s) => {
                self.push(s);
                true
            }
            ArchiveItem::AuxDescriptor { bytes, .. } => {
                self.add_aux(bytes);
                false
            }
            ArchiveItem::Ignored { path } => {
                debug!(path, "ignored archive entry");
                false
            }
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    #[inline]
    pub fn snapshots(&self) -> &[StoredSnapshot] {
        &self.snapshots
    }

    #[inline]
    pub fn aux(&self) -> AuxDescriptorBatch {
        self.aux
    }

    /// Number of distinct identities seen so far.
    #[inline]
    pub fn identity_count(&self) -> usize {
        self.identities.len()
    }

    #[inline]
    pub fn digest_count(&self) -> usize {
        self.digests.len()
    }

    pub fn identity_id(&self, identity: &str) -> Option<u32> {
        self.identities.get(identity)
    }

    pub fn digest_id(&self, digest: &str) -> Option<u32> {
        self.digests.get(digest)
    }

    /// Sorts consensuses by time (stable, so equal timestamps keep ingestion
    /// order) and computes the dataset means.
    ///
    /// Returns `None` when there is nothing to model: no consensus at all, or
    /// consensuses without a single relay.
    pub fn finalize(&mut self) -> Option<DatasetSummary> {
        self.snapshots.sort_by_key(|s| s.time);

        let (first, last) = match (self.snapshots.first(), self.snapshots.last()) {
            (Some(f), Some(l)) => (f.time, l.time),
            _ => return None,
        };

        let total_bytes: u64 = self.snapshots.iter().map(|s| s.byte_size).sum();
        let total_entries: u64 = self.snapshots.iter().map(|s| s.len() as u64).sum();
        if total_entries == 0 {
            warn!(
                snapshots = self.snapshots.len(),
                "consensuses list no relays"
            );
            return None;
        }

        let mean_aux_size = self.aux.mean().unwrap_or_else(|| {
            warn!("no microdescriptors found; descriptor sizes will be zero");
            0.0
        });

        let spacing = SpacingHistogram::from_times(self.snapshots.iter().map(|s| &s.time));
        if !spacing.is_hourly() {
            warn!(gaps = ?spacing.buckets, "consensuses are not evenly spaced one hour apart");
        }

        Some(DatasetSummary {
            snapshot_count: self.snapshots.len(),
            total_bytes,
            total_entries,
            mean_entry_size: ByteSize(total_bytes as f64 / total_entries as f64),
            aux_count: self.aux.count,
            aux_total_bytes: self.aux.total_bytes,
            mean_aux_size: ByteSize(mean_aux_size),
            first,
            last,
            spacing,
        })
    }
}
