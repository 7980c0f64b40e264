use serde::Serialize;

use crate::{
    store::{DatasetSummary, SnapshotStore},
    sweep::{KeepReport, SweepConfig, run_sweep},
};

/// Everything a run produces, in one serializable value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub summary: DatasetSummary,
    pub config: SweepConfig,
    pub keeps: Vec<KeepReport>,
}

impl Report {
    /// Finalizes the store and runs the sweep. `None` means "no data".
    pub fn build(store: &mut SnapshotStore, config: SweepConfig) -> Option<Report> {
        let summary = store.finalize()?;
        let keeps = run_sweep(store, &summary, &config);
        Some(Report {
            summary,
            config,
            keeps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::hourly_store;

    #[test]
    fn test_no_data_skips_sweep() {
        let mut store = SnapshotStore::new();
        assert!(Report::build(&mut store, SweepConfig::default()).is_none());
    }

    #[test]
    fn test_build_report() {
        let mut store = hourly_store(&[&["A", "B"], &["A"], &["A", "C"]], 100);
        store.add_aux(40);
        let config = SweepConfig {
            max_keep: 2,
            max_interval: 3,
            ..SweepConfig::default()
        };
        let report = Report::build(&mut store, config).unwrap();
        assert_eq!(report.summary.snapshot_count, 3);
        assert_eq!(report.keeps.len(), 3);
        assert!(report.keeps.iter().all(|k| k.cells.len() == 3));

        let cell = report.keeps[0].cells[0].estimate.unwrap();
        assert_eq!((cell.added, cell.removed), (1, 1));
        // with keep = 2 relay B is still known at hour 2
        let cell = report.keeps[2].cells[0].estimate.unwrap();
        assert_eq!((cell.added, cell.removed), (1, 0));
    }
}
