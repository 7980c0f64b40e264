use chrono::{Duration, NaiveDate};
use consensus_reader::{Entry, Snapshot};

use crate::store::SnapshotStore;

/// Consensus `hour` hours after 2014-01-01 00:00, each relay's hash being
/// `h-<identity>`.
pub(crate) fn snapshot(hour: u32, ids: &[&str], byte_size: u64) -> Snapshot {
    snapshot_with_digests(
        hour,
        &ids.iter()
            .map(|id| (*id, format!("h-{id}")))
            .collect::<Vec<_>>(),
        byte_size,
    )
}

pub(crate) fn snapshot_with_digests<S: AsRef<str>>(
    hour: u32,
    entries: &[(&str, S)],
    byte_size: u64,
) -> Snapshot {
    let time = NaiveDate::from_ymd_opt(2014, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .expect("valid date")
        + Duration::hours(hour as i64);
    Snapshot {
        time,
        entries: entries
            .iter()
            .map(|(id, digest)| Entry {
                identity: id.to_string(),
                digest: digest.as_ref().to_string(),
            })
            .collect(),
        byte_size,
    }
}

/// Hourly store over the given identity sets with `entry_size` bytes per relay.
pub(crate) fn hourly_store(sets: &[&[&str]], entry_size: u64) -> SnapshotStore {
    let mut store = SnapshotStore::new();
    for (hour, ids) in sets.iter().enumerate() {
        store.push(snapshot(hour as u32, ids, ids.len() as u64 * entry_size));
    }
    store
}
