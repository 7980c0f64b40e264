use anyhow::{Context, Result};
use std::io::{self, BufWriter, Write};
use tracing::info;

use diffstats_model::{ByteSize, KeepReport, Report, SweepConfig};

use crate::{
    InputArgs, OutputFormat,
    commands::ingest::{ingest_archives, resolve_inputs},
};

pub(crate) fn run_analyze(
    input: &InputArgs,
    config: SweepConfig,
    format: OutputFormat,
    progress_every: u64,
) -> Result<()> {
    let paths = resolve_inputs(input)?;
    let mut store = ingest_archives(&paths, &input.parse_options(), progress_every)?;

    info!(
        max_keep = config.max_keep,
        max_interval = config.max_interval,
        "sweeping"
    );
    let report = Report::build(&mut store, config);

    let mut out = BufWriter::new(io::stdout().lock());
    match (report, format) {
        (None, OutputFormat::Text) => writeln!(out, "No data to show.")?,
        (None, OutputFormat::Json) => writeln!(out, "null")?,
        (Some(report), OutputFormat::Text) => print_report(&report, &mut out)?,
        (Some(report), OutputFormat::Json) => {
            serde_json::to_writer_pretty(&mut out, &report).context("encode report")?;
            writeln!(out)?;
        }
    }
    out.flush().context("flush output")
}

pub(crate) fn print_report<W: Write>(report: &Report, out: &mut W) -> io::Result<()> {
    let s = &report.summary;

    writeln!(out, "== Global data ==")?;
    writeln!(out, "Note that ALL of the sizes shown are in uncompressed bytes")?;
    writeln!(out, "Number of consensuses: {}", s.snapshot_count)?;
    writeln!(out, "Period: {} .. {}", s.first, s.last)?;
    writeln!(out, "Mean consensus entry size: {}", s.mean_entry_size)?;
    writeln!(
        out,
        "Mean microdescriptor size: {} ({} microdescriptors)",
        s.mean_aux_size, s.aux_count
    )?;
    if !s.spacing.buckets.is_empty() {
        let gaps: Vec<String> = s
            .spacing
            .buckets
            .iter()
            .map(|(h, n)| format!("{h}h x{n}"))
            .collect();
        writeln!(out, "Consensus spacing: {}", gaps.join(", "))?;
    }

    for keep in &report.keeps {
        writeln!(out)?;
        print_keep(keep, out)?;
    }
    Ok(())
}

fn print_keep<W: Write>(keep: &KeepReport, out: &mut W) -> io::Result<()> {
    writeln!(
        out,
        "When keeping non-running relays for {} hours...",
        keep.keep
    )?;
    writeln!(out, "Mean consensus size: {}", keep.mean_consensus_size)?;
    for cell in &keep.cells {
        let Some(est) = cell.estimate else {
            writeln!(
                out,
                "No consensus pairs {}h apart, nothing to estimate",
                cell.interval
            )?;
            continue;
        };
        writeln!(
            out,
            "Mean consensus diff size when interval is {}h: {}",
            cell.interval, est.mean_diff_size
        )?;
        writeln!(
            out,
            "Mean microdescriptor download size when interval is {}h: {}",
            cell.interval, est.mean_aux_refetch_size
        )?;
    }

    let with_data: Vec<_> = keep.cells.iter().filter_map(|c| c.estimate).collect();
    if with_data.is_empty() {
        return Ok(());
    }
    writeln!(
        out,
        "{:>9} {:>8} {:>10} {:>10} {:>10} {:>12} {:>12}",
        "interval", "pairs", "added", "removed", "new_hashes", "diff", "microdescs"
    )?;
    for est in with_data {
        writeln!(
            out,
            "{:>8}h {:>8} {:>10} {:>10} {:>10} {:>12} {:>12}",
            est.interval,
            est.pairs,
            est.added,
            est.removed,
            est.new_digests,
            est.mean_diff_size.to_string(),
            est.mean_aux_refetch_size.to_string()
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use consensus_reader::{Entry, Snapshot};
    use diffstats_model::SnapshotStore;

    fn store() -> SnapshotStore {
        let mut store = SnapshotStore::new();
        let sets: [&[&str]; 3] = [&["A", "B"], &["A"], &["A", "C"]];
        for (hour, ids) in sets.iter().enumerate() {
            let time = consensus_reader::parse_snapshot_time(&format!(
                "c/2014-01-01-{hour:02}-00-00-consensus"
            ))
            .unwrap();
            store.push(Snapshot {
                time,
                entries: ids
                    .iter()
                    .map(|id| Entry {
                        identity: id.to_string(),
                        digest: format!("h-{id}"),
                    })
                    .collect(),
                byte_size: ids.len() as u64 * 100,
            });
        }
        store.add_aux(2048);
        store
    }

    #[test]
    fn test_text_report() {
        let config = SweepConfig {
            max_keep: 1,
            max_interval: 3,
            ..SweepConfig::default()
        };
        let report = Report::build(&mut store(), config).unwrap();
        let mut buf = Vec::new();
        print_report(&report, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert!(text.contains("Number of consensuses: 3"));
        assert!(text.contains("Mean consensus entry size: 100.00B"));
        assert!(text.contains("Mean microdescriptor size: 2.00KB (1 microdescriptors)"));
        assert!(text.contains("Consensus spacing: 1h x2"));
        assert!(text.contains("When keeping non-running relays for 0 hours..."));
        assert!(text.contains("When keeping non-running relays for 1 hours..."));
        // (103 + 6) / 2
        assert!(text.contains("Mean consensus diff size when interval is 1h: 54.50B"));
        assert!(text.contains("No consensus pairs 3h apart"));
    }

    #[test]
    fn test_report_serializes() {
        let report = Report::build(&mut store(), SweepConfig::default()).unwrap();
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["summary"]["snapshot_count"], 3);
        assert_eq!(value["keeps"].as_array().map(|k| k.len()), Some(13));
        assert_eq!(value["keeps"][0]["cells"][0]["estimate"]["added"], 1);
        assert!(value["keeps"][0]["cells"][11]["estimate"].is_null());
        assert_eq!(value["summary"]["mean_entry_size"], 100.0);
    }

    #[test]
    fn test_byte_size_column() {
        assert_eq!(format!("{:>12}", ByteSize(1.0).to_string()), "       1.00B");
    }
}
